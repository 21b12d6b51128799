/// Navigation gate
///
/// Decides, for one page navigation, whether the client may render the
/// requested path or must go somewhere else first. The decision only looks at
/// the session token (present and valid or not, and its `email_verified`
/// claim) and the path, so it is a pure function.
///
/// | token | verified | path              | result                  |
/// |-------|----------|-------------------|-------------------------|
/// | any   | any      | public route      | allow                   |
/// | no    | any      | anything else     | redirect `/signin` (with `return_to`) |
/// | yes   | no       | not `/verify-email` | redirect `/verify-email` |
/// | yes   | yes      | `/verify-email`   | redirect `/projects`    |
/// | yes   | any      | otherwise         | allow                   |
///
/// Static assets (`/_next/...`, `/favicon.ico`, images) are never gated.
///
/// # Example
///
/// ```
/// use collabtrack_shared::auth::gate::{resolve, GateDecision, Session};
///
/// let decision = resolve(Some(Session { email_verified: false }), "/projects");
/// assert_eq!(decision.target(), Some("/verify-email"));
/// ```

use serde::{Deserialize, Serialize};

/// Paths reachable without a session; matched by prefix
pub const PUBLIC_ROUTES: [&str; 3] = ["/signin", "/signup", "/reset-password"];

pub const SIGN_IN_ROUTE: &str = "/signin";
pub const EMAIL_VERIFICATION_ROUTE: &str = "/verify-email";
pub const HOME_ROUTE: &str = "/projects";

const ASSET_PREFIXES: [&str; 3] = ["/_next/static", "/_next/image", "/favicon.ico"];
const ASSET_EXTENSIONS: [&str; 6] = [".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// What the gate knows about a valid session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    Redirect {
        to: String,

        /// Where to continue after signing in
        #[serde(default, skip_serializing_if = "Option::is_none")]
        return_to: Option<String>,
    },
}

impl GateDecision {
    fn redirect(to: &str) -> Self {
        GateDecision::Redirect {
            to: to.to_string(),
            return_to: None,
        }
    }

    fn sign_in(requested: &str) -> Self {
        GateDecision::Redirect {
            to: SIGN_IN_ROUTE.to_string(),
            return_to: Some(requested.to_string()),
        }
    }

    /// Redirect target, or None for allow
    pub fn target(&self) -> Option<&str> {
        match self {
            GateDecision::Allow => None,
            GateDecision::Redirect { to, .. } => Some(to),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

pub fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTES.iter().any(|route| path.starts_with(route))
}

pub fn is_static_asset(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    ASSET_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
        || ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Decides a navigation to `path`
///
/// `session` is None when the client has no token or its token failed
/// validation.
pub fn resolve(session: Option<Session>, path: &str) -> GateDecision {
    if is_static_asset(path) || is_public_route(path) {
        return GateDecision::Allow;
    }

    let Some(session) = session else {
        return GateDecision::sign_in(path);
    };

    match (session.email_verified, path == EMAIL_VERIFICATION_ROUTE) {
        (false, false) => GateDecision::redirect(EMAIL_VERIFICATION_ROUTE),
        (true, true) => GateDecision::redirect(HOME_ROUTE),
        _ => GateDecision::Allow,
    }
}
