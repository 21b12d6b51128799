/// Project-level authorization
///
/// Projects have two roles: the admin (creator) and members. Reading a project,
/// working on its board and inviting people need membership; removing someone
/// else or withdrawing an invitation needs the admin.
///
/// `require_project_member` loads the project and checks the caller; the
/// `ensure_*` functions check an already loaded roster, which is what the roster
/// updates do while holding the row lock.
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::auth::authorization::require_project_member;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, project_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let project = require_project_member(&pool, project_id, user_id).await?;
/// println!("{} has {} members", project.name, project.members.len());
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::membership::Roster;
use crate::models::project::Project;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Project not found")]
    NotFound,

    #[error("You are not a member of this project")]
    NotMember,

    #[error("Only the project admin can do that")]
    NotAdmin,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

pub fn ensure_member(roster: &Roster, user_id: Uuid) -> Result<(), AuthzError> {
    if !roster.is_member(user_id) {
        return Err(AuthzError::NotMember);
    }
    Ok(())
}

pub fn ensure_admin(roster: &Roster, user_id: Uuid) -> Result<(), AuthzError> {
    ensure_member(roster, user_id)?;
    if roster.admin_id != user_id {
        return Err(AuthzError::NotAdmin);
    }
    Ok(())
}

/// The admin may remove anyone; a member may only remove themselves
pub fn ensure_can_remove(roster: &Roster, caller: Uuid, target: Uuid) -> Result<(), AuthzError> {
    ensure_member(roster, caller)?;
    if caller != target && roster.admin_id != caller {
        return Err(AuthzError::NotAdmin);
    }
    Ok(())
}

/// Loads the project if `user_id` is a member
pub async fn require_project_member(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<Project, AuthzError> {
    let project = Project::find_by_id(pool, project_id)
        .await?
        .ok_or(AuthzError::NotFound)?;

    if !project.is_member(user_id) {
        return Err(AuthzError::NotMember);
    }

    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_member() {
        let admin = Uuid::new_v4();
        let roster = Roster::new(admin);

        assert!(ensure_member(&roster, admin).is_ok());
        assert!(matches!(
            ensure_member(&roster, Uuid::new_v4()),
            Err(AuthzError::NotMember)
        ));
    }

    #[test]
    fn test_ensure_admin() {
        let admin = Uuid::new_v4();
        let member = Uuid::new_v4();
        let mut roster = Roster::new(admin);
        roster.add_member(member);

        assert!(ensure_admin(&roster, admin).is_ok());
        assert!(matches!(ensure_admin(&roster, member), Err(AuthzError::NotAdmin)));
        assert!(matches!(
            ensure_admin(&roster, Uuid::new_v4()),
            Err(AuthzError::NotMember)
        ));
    }

    #[test]
    fn test_ensure_can_remove() {
        let admin = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut roster = Roster::new(admin);
        roster.add_member(alice);
        roster.add_member(bob);

        // Admin removes anyone, members remove themselves
        assert!(ensure_can_remove(&roster, admin, bob).is_ok());
        assert!(ensure_can_remove(&roster, alice, alice).is_ok());
        assert!(matches!(
            ensure_can_remove(&roster, alice, bob),
            Err(AuthzError::NotAdmin)
        ));
        assert!(matches!(
            ensure_can_remove(&roster, Uuid::new_v4(), bob),
            Err(AuthzError::NotMember)
        ));
    }
}
