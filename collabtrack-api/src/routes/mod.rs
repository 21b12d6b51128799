/// API route handlers, by resource
///
/// - `health`: health check
/// - `navigation`: page navigation gate
/// - `auth`: sign-up, sign-in, sessions, email verification, password reset
/// - `projects`: project list, creation, detail, join-by-link
/// - `members`: invitations and member removal
/// - `tasks`: Kanban board and task writes
/// - `teams`: team creation and listing
/// - `live`: server-sent snapshot streams

pub mod auth;
pub mod health;
pub mod live;
pub mod members;
pub mod navigation;
pub mod projects;
pub mod tasks;
pub mod teams;
