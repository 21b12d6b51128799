/// Team model and database operations
///
/// Teams are named groups of users with a privacy flag. The creator becomes the
/// team's `admin`; everybody added later is a `member`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE team_privacy AS ENUM ('public', 'private');
/// CREATE TYPE team_role AS ENUM ('admin', 'member');
///
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     privacy team_privacy NOT NULL DEFAULT 'public',
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE team_members (
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role team_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (team_id, user_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::models::team::{CreateTeam, Team, TeamPrivacy};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let team = Team::create(&pool, CreateTeam {
///     name: "Platform".to_string(),
///     privacy: TeamPrivacy::Private,
///     created_by: user_id,
/// }).await?;
///
/// let mine = Team::list_for_user(&pool, user_id).await?;
/// assert!(mine.iter().any(|t| t.id == team.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_privacy", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamPrivacy {
    /// Visible to everyone
    Public,

    /// Visible to members only
    Private,
}

impl Default for TeamPrivacy {
    fn default() -> Self {
        TeamPrivacy::Public
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Admin,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
        }
    }

    pub fn can_manage_members(&self) -> bool {
        matches!(self, TeamRole::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub privacy: TeamPrivacy,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Team as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamWithRole {
    pub id: Uuid,
    pub name: String,
    pub privacy: TeamPrivacy,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,

    /// Caller's role in the team
    pub role: TeamRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    pub name: String,

    #[serde(default)]
    pub privacy: TeamPrivacy,

    pub created_by: Uuid,
}

impl Team {
    /// Creates a team and adds its creator as admin
    pub async fn create(pool: &PgPool, data: CreateTeam) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name, privacy, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, name, privacy, created_by, created_at
            "#,
        )
        .bind(data.name.trim())
        .bind(data.privacy)
        .bind(data.created_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO team_members (team_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(team.id)
            .bind(data.created_by)
            .bind(TeamRole::Admin)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(team)
    }

    /// Teams the user belongs to, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<TeamWithRole>, sqlx::Error> {
        sqlx::query_as::<_, TeamWithRole>(
            r#"
            SELECT t.id, t.name, t.privacy, t.created_by, t.created_at, m.role
            FROM teams t
            JOIN team_members m ON m.team_id = t.id
            WHERE m.user_id = $1
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn members(pool: &PgPool, team_id: Uuid) -> Result<Vec<TeamMember>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, role, created_at
            FROM team_members
            WHERE team_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_defaults_to_public() {
        assert_eq!(TeamPrivacy::default(), TeamPrivacy::Public);

        let data: CreateTeam = serde_json::from_value(serde_json::json!({
            "name": "Design",
            "created_by": Uuid::nil(),
        }))
        .unwrap();
        assert_eq!(data.privacy, TeamPrivacy::Public);
    }

    #[test]
    fn test_role_permissions() {
        assert!(TeamRole::Admin.can_manage_members());
        assert!(!TeamRole::Member.can_manage_members());
        assert_eq!(TeamRole::Member.as_str(), "member");
    }
}
