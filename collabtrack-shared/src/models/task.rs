/// Task model and database operations
///
/// Tasks are the cards on a project's Kanban board. Each task sits in exactly one
/// of three status columns and is ordered within it by a fractional `rank`
/// (see `crate::board`).
///
/// # Columns
///
/// ```text
/// todo ⇄ in-progress ⇄ done
/// ```
///
/// Any column can move to any other; there is no state machine beyond the
/// three values.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in-progress', 'done');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status task_status NOT NULL DEFAULT 'todo',
///     priority task_priority,
///     assignees UUID[] NOT NULL DEFAULT '{}',
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     rank DOUBLE PRECISION NOT NULL DEFAULT 0,
///     due_date TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::models::task::{CreateTask, Task, TaskStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, project_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, CreateTask {
///     project_id,
///     title: "Draft announcement".to_string(),
///     description: String::new(),
///     status: TaskStatus::Todo,
///     priority: None,
///     assignees: vec![user_id],
///     created_by: Some(user_id),
///     due_date: None,
/// }).await?;
///
/// // Drop it at the top of the done column
/// Task::move_to(&pool, project_id, task.id, TaskStatus::Done, 0).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::board::{plan_move, MovePlan, RankedCard, RANK_STEP};

const TASK_COLUMNS: &str = "id, project_id, title, description, status, priority, assignees, \
                            created_by, rank, due_date, created_at, updated_at";

/// Board column a task sits in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Columns in board order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in-progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Task card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    pub project_id: Uuid,

    pub title: String,

    /// Empty when not provided
    pub description: String,

    pub status: TaskStatus,

    pub priority: Option<TaskPriority>,

    /// Assigned user ids; always members of the project when written
    pub assignees: Vec<Uuid>,

    /// Nullable if the creator was deleted
    pub created_by: Option<Uuid>,

    /// Position within the status column
    pub rank: f64,

    pub due_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Option<TaskPriority>,
    pub assignees: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Fields an edit may change
///
/// `None` leaves a field untouched; for nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Option<TaskPriority>>,
    pub assignees: Option<Vec<Uuid>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignees.is_none()
            && self.due_date.is_none()
    }
}

/// Result of a drag-and-drop move
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub task: Task,

    /// False when the drop left the card where it was
    pub changed: bool,
}

impl Task {
    /// Creates a task at the end of its column
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks \
                 (project_id, title, description, status, priority, assignees, created_by, due_date, rank) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                 COALESCE((SELECT MAX(rank) FROM tasks WHERE project_id = $1 AND status = $4), 0) + $9) \
             RETURNING {}",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(data.project_id)
            .bind(data.title.trim())
            .bind(data.description)
            .bind(data.status)
            .bind(data.priority)
            .bind(&data.assignees)
            .bind(data.created_by)
            .bind(data.due_date)
            .bind(RANK_STEP)
            .fetch_one(pool)
            .await
    }

    /// Finds a task, scoped to its project
    pub async fn find_in_project(
        pool: &PgPool,
        project_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND project_id = $2",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// Every task of a project in board order
    pub async fn list_for_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM tasks WHERE project_id = $1 \
             ORDER BY status, rank ASC, created_at ASC",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Applies an edit; returns None if the task is not in the project
    ///
    /// A status change through an edit appends the task to its new column.
    pub async fn update(
        pool: &PgPool,
        project_id: Uuid,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(
                ", status = ${n}, rank = CASE WHEN status = ${n} THEN rank ELSE \
                 COALESCE((SELECT MAX(t.rank) FROM tasks t \
                           WHERE t.project_id = tasks.project_id AND t.status = ${n}), 0) + {step} END",
                n = bind_count,
                step = RANK_STEP
            ));
        }
        if data.priority.is_some() {
            bind_count += 1;
            query.push_str(&format!(", priority = ${}", bind_count));
        }
        if data.assignees.is_some() {
            bind_count += 1;
            query.push_str(&format!(", assignees = ${}", bind_count));
        }
        if data.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND project_id = $2 RETURNING {}",
            TASK_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(id).bind(project_id);

        if let Some(title) = data.title {
            q = q.bind(title.trim().to_string());
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(priority) = data.priority {
            q = q.bind(priority);
        }
        if let Some(assignees) = data.assignees {
            q = q.bind(assignees);
        }
        if let Some(due_date) = data.due_date {
            q = q.bind(due_date);
        }

        q.fetch_optional(pool).await
    }

    /// Drops a task into `destination` at `index`
    ///
    /// Only `status`, `rank` and `updated_at` of the task change. Returns None
    /// if the task is not in the project.
    ///
    /// Moves within one project are serialized on the project row before any
    /// task row is locked, so crossing drags wait for each other instead of
    /// deadlocking. The later move wins.
    pub async fn move_to(
        pool: &PgPool,
        project_id: Uuid,
        id: Uuid,
        destination: TaskStatus,
        index: usize,
    ) -> Result<Option<MoveOutcome>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let project = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM projects WHERE id = $1 FOR NO KEY UPDATE",
        )
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?;
        if project.is_none() {
            return Ok(None);
        }

        let query = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND project_id = $2 FOR UPDATE",
            TASK_COLUMNS
        );
        let Some(task) = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let column: Vec<RankedCard> = sqlx::query_as::<_, (Uuid, f64)>(
            r#"
            SELECT id, rank FROM tasks
            WHERE project_id = $1 AND status = $2
            ORDER BY rank ASC, created_at ASC
            FOR UPDATE
            "#,
        )
        .bind(project_id)
        .bind(destination)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id, rank)| RankedCard { id, rank })
        .collect();

        let plan = plan_move(&column, id, task.status == destination, index);

        let Some(rank) = plan.rank_of(id) else {
            tx.commit().await?;
            return Ok(Some(MoveOutcome {
                task,
                changed: false,
            }));
        };

        if let MovePlan::Renumber { ranks } = &plan {
            tracing::debug!(project_id = %project_id, column = destination.as_str(), "Renumbering column");
            for (card, card_rank) in ranks.iter().filter(|(card, _)| *card != id) {
                sqlx::query("UPDATE tasks SET rank = $2 WHERE id = $1")
                    .bind(card)
                    .bind(card_rank)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let query = format!(
            "UPDATE tasks SET status = $3, rank = $4, updated_at = NOW() \
             WHERE id = $1 AND project_id = $2 RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(project_id)
            .bind(destination)
            .bind(rank)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(MoveOutcome {
            task,
            changed: true,
        }))
    }

    pub async fn delete(pool: &PgPool, project_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_as_str() {
        assert_eq!(TaskStatus::Todo.as_str(), "todo");
        assert_eq!(TaskStatus::InProgress.as_str(), "in-progress");
        assert_eq!(TaskStatus::Done.as_str(), "done");
    }

    #[test]
    fn test_task_status_from_str() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("in_progress"), None);
        assert_eq!(TaskStatus::from_str("blocked"), None);
    }

    #[test]
    fn test_task_status_serde_matches_database_labels() {
        for status in TaskStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!(serde_json::from_str::<TaskStatus>("\"review\"").is_err());
    }

    #[test]
    fn test_default_status_is_todo() {
        assert_eq!(TaskStatus::default(), TaskStatus::Todo);
    }

    #[test]
    fn test_update_task_is_empty() {
        assert!(UpdateTask::default().is_empty());

        let update = UpdateTask {
            priority: Some(None),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
