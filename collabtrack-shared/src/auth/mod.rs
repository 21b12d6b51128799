/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: access/refresh session tokens
/// - [`token`]: one-time tokens for email links
/// - [`middleware`]: bearer authentication for axum
/// - [`authorization`]: project membership and admin checks
/// - [`gate`]: page navigation decisions from the session state
/// - [`federated`]: sign-in through an external identity provider
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::auth::password::{hash_password, verify_password};
/// use collabtrack_shared::auth::jwt::{create_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Kanban!Board9")?;
/// assert!(verify_password("Kanban!Board9", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "ada@example.com", true, TokenType::Access);
/// let token = create_token(&claims, "secret-key-at-least-32-bytes-long!!")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod federated;
pub mod gate;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod token;
