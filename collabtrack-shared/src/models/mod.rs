/// Database models for CollabTrack
///
/// Each model owns its table and exposes async CRUD functions taking a `PgPool`
/// (or a `PgConnection` when the caller holds a transaction).
///
/// # Models
///
/// - `user`: accounts, profiles and verification state
/// - `auth_token`: one-time email verification and password reset tokens
/// - `project`: projects and their roster (members + pending invitations)
/// - `task`: Kanban cards
/// - `team`: teams and team membership
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::models::project::{CreateProject, Project};
/// use collabtrack_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(admin_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::with_url("postgresql://localhost/collabtrack")).await?;
///
/// let project = Project::create(&pool, CreateProject {
///     name: "Website relaunch".to_string(),
///     admin_id,
/// }).await?;
///
/// let mine = Project::list_for_member(&pool, admin_id).await?;
/// assert!(mine.iter().any(|p| p.id == project.id));
/// # Ok(())
/// # }
/// ```

pub mod auth_token;
pub mod project;
pub mod task;
pub mod team;
pub mod user;
