/// Project model and database operations
///
/// A project owns a Kanban board and a roster. The roster is stored inline as two
/// Postgres arrays and is only ever rewritten through [`Project::modify_roster`],
/// which holds a row lock for the duration of the read-modify-write.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     admin_id UUID NOT NULL REFERENCES users(id),
///     members UUID[] NOT NULL DEFAULT '{}',
///     invitations TEXT[] NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT projects_admin_is_member CHECK (admin_id = ANY(members))
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::models::project::{CreateProject, Project};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, admin: Uuid, bob: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let project = Project::create(&pool, CreateProject {
///     name: "Launch".to_string(),
///     admin_id: admin,
/// }).await?;
/// assert_eq!(project.members, vec![admin]);
///
/// let change = Project::modify_roster(&pool, project.id, |roster| {
///     Ok::<_, sqlx::Error>(roster.join(bob, "bob@example.com"))
/// }).await;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::membership::Roster;

const PROJECT_COLUMNS: &str =
    "id, name, admin_id, members, invitations, created_at, updated_at";

/// Project document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,

    pub name: String,

    /// Creator; always a member
    pub admin_id: Uuid,

    /// Member user ids, no duplicates
    pub members: Vec<Uuid>,

    /// Pending invitation emails, lower-cased, no duplicates
    pub invitations: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub admin_id: Uuid,
}

/// Outcome of a locked roster update
#[derive(Debug, Clone)]
pub struct RosterChange<T> {
    /// Members before the update
    pub previous_members: Vec<Uuid>,

    /// Project as stored after the update
    pub project: Project,

    /// Whether anything was written
    pub changed: bool,

    /// Value returned by the update closure
    pub outcome: T,
}

impl<T> RosterChange<T> {
    /// Every user who could see the project before or after the update
    pub fn audience(&self) -> Vec<Uuid> {
        let mut audience = self.previous_members.clone();
        for id in &self.project.members {
            if !audience.contains(id) {
                audience.push(*id);
            }
        }
        audience
    }
}

impl Project {
    /// Creates a project with the admin as its only member
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let roster = Roster::new(data.admin_id);
        let query = format!(
            "INSERT INTO projects (name, admin_id, members, invitations) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            PROJECT_COLUMNS
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(data.name.trim())
            .bind(roster.admin_id)
            .bind(&roster.members)
            .bind(&roster.invitations)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM projects WHERE id = $1", PROJECT_COLUMNS);

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Projects whose member set contains `user_id`, newest first
    pub async fn list_for_member(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM projects WHERE members @> ARRAY[$1]::UUID[] \
             ORDER BY created_at DESC",
            PROJECT_COLUMNS
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Loads a project and locks its row until the surrounding transaction ends
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM projects WHERE id = $1 FOR UPDATE",
            PROJECT_COLUMNS
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Writes both roster sets back in one statement
    pub async fn save_roster(
        conn: &mut PgConnection,
        id: Uuid,
        roster: &Roster,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET members = $2, invitations = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            PROJECT_COLUMNS
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(&roster.members)
            .bind(&roster.invitations)
            .fetch_one(&mut *conn)
            .await
    }

    /// Applies `update` to the project's roster under a row lock
    ///
    /// Returns `Ok(None)` if the project does not exist. If the closure fails
    /// the transaction is rolled back and nothing is written; if it leaves the
    /// roster unchanged no write happens and `changed` is false.
    pub async fn modify_roster<T, E, F>(
        pool: &PgPool,
        id: Uuid,
        update: F,
    ) -> Result<Option<RosterChange<T>>, E>
    where
        F: FnOnce(&mut Roster) -> Result<T, E>,
        E: From<sqlx::Error>,
    {
        let mut tx = pool.begin().await?;

        let Some(current) = Self::lock_for_update(&mut tx, id).await? else {
            return Ok(None);
        };

        let before = current.roster();
        let mut roster = before.clone();
        let outcome = update(&mut roster)?;

        let changed = roster != before;
        let project = if changed {
            Self::save_roster(&mut tx, id, &roster).await?
        } else {
            current
        };

        tx.commit().await?;

        Ok(Some(RosterChange {
            previous_members: before.members,
            project,
            changed,
            outcome,
        }))
    }

    /// Roster view of this project
    pub fn roster(&self) -> Roster {
        Roster::from_parts(
            self.admin_id,
            self.members.clone(),
            self.invitations.clone(),
        )
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }

    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_id == user_id
    }
}
