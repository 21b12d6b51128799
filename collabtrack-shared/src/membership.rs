/// Project roster rules
///
/// A project's roster is two sets: member user ids and pending invitation
/// emails. Every roster mutation (invite, join, remove) is decided here on a
/// plain value; `models::project` loads the roster under a row lock, applies one
/// of these operations and writes the result back.
///
/// # Rules
///
/// - The admin is always a member and can never be removed.
/// - Both sets behave as sets: adding an existing entry is a no-op.
/// - Invitation emails are stored trimmed and lower-cased.
/// - Joining adds the user and drops their email from the invitations.
///
/// # Example
///
/// ```
/// use collabtrack_shared::membership::{InviteOutcome, Roster};
/// use uuid::Uuid;
///
/// let admin = Uuid::new_v4();
/// let mut roster = Roster::new(admin);
///
/// // Unregistered email becomes a pending invitation
/// let outcome = roster.invite("Bob@Example.com", None).unwrap();
/// assert_eq!(outcome, InviteOutcome::Invited("bob@example.com".to_string()));
///
/// // Bob signs up and follows the link
/// let bob = Uuid::new_v4();
/// roster.join(bob, "bob@example.com");
/// assert!(roster.is_member(bob));
/// assert!(roster.invitations.is_empty());
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type for roster operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// Invite without an email address
    #[error("Email address is required")]
    MissingEmail,

    /// Attempt to remove the project admin
    #[error("The project admin cannot be removed")]
    CannotRemoveAdmin,
}

/// Result of resolving an invite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InviteOutcome {
    /// The email belongs to a registered user, who is now a member
    AddedMember(Uuid),

    /// Nobody has registered with the email yet; it is now pending
    Invited(String),
}

/// Normalizes an email for storage in the invitation set
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Members and pending invitations of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub admin_id: Uuid,
    pub members: Vec<Uuid>,
    pub invitations: Vec<String>,
}

impl Roster {
    /// Roster of a freshly created project: the admin is the only member
    pub fn new(admin_id: Uuid) -> Self {
        Self {
            admin_id,
            members: vec![admin_id],
            invitations: Vec::new(),
        }
    }

    /// Rebuilds a roster from stored columns, restoring the admin-is-member rule
    pub fn from_parts(admin_id: Uuid, members: Vec<Uuid>, invitations: Vec<String>) -> Self {
        let mut roster = Self {
            admin_id,
            members: Vec::with_capacity(members.len() + 1),
            invitations: Vec::with_capacity(invitations.len()),
        };
        roster.add_member(admin_id);
        for id in members {
            roster.add_member(id);
        }
        for email in invitations {
            roster.add_invitation(&email);
        }
        roster
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }

    pub fn is_invited(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.invitations.iter().any(|e| *e == email)
    }

    /// Set-union insert; returns true if the member was new
    pub fn add_member(&mut self, user_id: Uuid) -> bool {
        if self.is_member(user_id) {
            return false;
        }
        self.members.push(user_id);
        true
    }

    /// Set-union insert of a normalized email; returns true if it was new
    pub fn add_invitation(&mut self, email: &str) -> bool {
        let email = normalize_email(email);
        if email.is_empty() || self.invitations.contains(&email) {
            return false;
        }
        self.invitations.push(email);
        true
    }

    /// Resolves an invite
    ///
    /// `registered` is the id of the user whose email matches, if any. A
    /// registered user goes to `members` and never to `invitations`; an
    /// unregistered email goes to `invitations` only.
    pub fn invite(
        &mut self,
        email: &str,
        registered: Option<Uuid>,
    ) -> Result<InviteOutcome, RosterError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(RosterError::MissingEmail);
        }

        match registered {
            Some(user_id) => {
                self.add_member(user_id);
                Ok(InviteOutcome::AddedMember(user_id))
            }
            None => {
                self.add_invitation(&email);
                Ok(InviteOutcome::Invited(email))
            }
        }
    }

    /// Join by link: add the user, drop their pending invitation
    ///
    /// Idempotent; returns true if anything changed.
    pub fn join(&mut self, user_id: Uuid, email: &str) -> bool {
        let added = self.add_member(user_id);
        let removed = self.remove_invitation(email);
        added || removed
    }

    /// Removes a member; returns false if they were not a member
    pub fn remove_member(&mut self, user_id: Uuid) -> Result<bool, RosterError> {
        if user_id == self.admin_id {
            return Err(RosterError::CannotRemoveAdmin);
        }
        let before = self.members.len();
        self.members.retain(|id| *id != user_id);
        Ok(self.members.len() != before)
    }

    /// Removes a pending invitation; returns false if none matched
    pub fn remove_invitation(&mut self, email: &str) -> bool {
        let email = normalize_email(email);
        let before = self.invitations.len();
        self.invitations.retain(|e| *e != email);
        self.invitations.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_roster_contains_admin() {
        let admin = Uuid::new_v4();
        let roster = Roster::new(admin);

        assert_eq!(roster.members, vec![admin]);
        assert!(roster.invitations.is_empty());
    }

    #[test]
    fn test_from_parts_restores_admin_and_dedupes() {
        let admin = Uuid::new_v4();
        let other = Uuid::new_v4();
        let roster = Roster::from_parts(
            admin,
            vec![other, other],
            vec!["A@x.io".to_string(), "a@x.io".to_string()],
        );

        assert_eq!(roster.members, vec![admin, other]);
        assert_eq!(roster.invitations, vec!["a@x.io".to_string()]);
    }

    #[test]
    fn test_invite_registered_user_adds_member_only() {
        let admin = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut roster = Roster::new(admin);

        let outcome = roster.invite("bob@example.com", Some(bob)).unwrap();

        assert_eq!(outcome, InviteOutcome::AddedMember(bob));
        assert!(roster.is_member(bob));
        assert!(roster.invitations.is_empty());
    }

    #[test]
    fn test_invite_unregistered_email_adds_invitation_only() {
        let admin = Uuid::new_v4();
        let mut roster = Roster::new(admin);

        let outcome = roster.invite("  Carol@Example.COM ", None).unwrap();

        assert_eq!(
            outcome,
            InviteOutcome::Invited("carol@example.com".to_string())
        );
        assert_eq!(roster.members, vec![admin]);
        assert_eq!(roster.invitations, vec!["carol@example.com".to_string()]);
    }

    #[test]
    fn test_invite_is_set_union() {
        let admin = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut roster = Roster::new(admin);

        roster.invite("bob@example.com", Some(bob)).unwrap();
        roster.invite("bob@example.com", Some(bob)).unwrap();
        roster.invite("dan@example.com", None).unwrap();
        roster.invite("DAN@example.com", None).unwrap();

        assert_eq!(roster.members, vec![admin, bob]);
        assert_eq!(roster.invitations.len(), 1);
    }

    #[test]
    fn test_invite_requires_email() {
        let mut roster = Roster::new(Uuid::new_v4());
        assert_eq!(roster.invite("   ", None), Err(RosterError::MissingEmail));
    }

    #[test]
    fn test_join_removes_invitation_and_is_idempotent() {
        let admin = Uuid::new_v4();
        let erin = Uuid::new_v4();
        let mut roster = Roster::new(admin);
        roster.invite("erin@example.com", None).unwrap();

        assert!(roster.join(erin, "Erin@Example.com"));
        let after_first = roster.clone();

        assert!(!roster.join(erin, "erin@example.com"));
        assert_eq!(roster, after_first);
        assert!(roster.is_member(erin));
        assert!(!roster.is_invited("erin@example.com"));
    }

    #[test]
    fn test_join_without_invitation_still_adds_member() {
        let admin = Uuid::new_v4();
        let frank = Uuid::new_v4();
        let mut roster = Roster::new(admin);

        assert!(roster.join(frank, "frank@example.com"));
        assert_eq!(roster.members, vec![admin, frank]);
    }

    #[test]
    fn test_admin_cannot_be_removed() {
        let admin = Uuid::new_v4();
        let mut roster = Roster::new(admin);

        assert_eq!(
            roster.remove_member(admin),
            Err(RosterError::CannotRemoveAdmin)
        );
        assert!(roster.is_member(admin));
    }

    #[test]
    fn test_remove_member_and_invitation() {
        let admin = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut roster = Roster::new(admin);
        roster.add_member(bob);
        roster.add_invitation("gone@example.com");

        assert_eq!(roster.remove_member(bob), Ok(true));
        assert_eq!(roster.remove_member(bob), Ok(false));
        assert!(roster.remove_invitation("GONE@example.com"));
        assert!(!roster.remove_invitation("gone@example.com"));
        assert_eq!(roster.members, vec![admin]);
    }
}
