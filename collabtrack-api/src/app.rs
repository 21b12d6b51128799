/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use collabtrack_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = collabtrack_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use collabtrack_shared::{
    auth::middleware::{authenticate, AuthContext, AuthError},
    live::{ChangeEvent, LiveHub},
    mail::{LogMailer, Mail, Mailer, WebhookMailer},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler through the `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Change notifications for live queries
    pub live: LiveHub,

    pub mailer: Arc<dyn Mailer>,

    /// Outgoing HTTP (identity provider, mail relay)
    pub http: reqwest::Client,
}

impl AppState {
    /// Creates state with the mailer the configuration asks for
    pub fn new(db: PgPool, config: Config) -> Self {
        let http = reqwest::Client::new();

        let mailer: Arc<dyn Mailer> = match &config.mail.webhook_url {
            Some(url) => Arc::new(WebhookMailer::new(
                http.clone(),
                url.clone(),
                config.mail.from.clone(),
            )),
            None => Arc::new(LogMailer),
        };

        Self {
            db,
            config: Arc::new(config),
            live: LiveHub::default(),
            mailer,
            http,
        }
    }

    /// Replaces the mailer
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Sends mail; a failure is logged and otherwise ignored
    pub async fn send_mail(&self, mail: Mail) {
        if let Err(e) = self.mailer.send(&mail).await {
            tracing::warn!(to = %mail.to, subject = %mail.subject, error = %e, "Failed to send mail");
        }
    }

    pub fn publish(&self, event: ChangeEvent) {
        self.live.publish(event);
    }
}

/// Builds the router with all routes and middleware
///
/// ```text
/// /health
/// /v1/navigation/resolve            public, optional bearer
/// /v1/auth/...                      public, except session and profile
/// /v1/projects/...                  bearer + verified email
/// /v1/teams                         bearer + verified email
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/federated", post(routes::auth::federated))
        .route("/verify-email", post(routes::auth::verify_email))
        .route("/verify-email/resend", post(routes::auth::resend_verification))
        .route("/password-reset", post(routes::auth::request_password_reset))
        .route("/password-reset/confirm", post(routes::auth::confirm_password_reset));

    let session_routes = Router::new()
        .route("/session", get(routes::auth::session))
        .route("/profile", patch(routes::auth::update_profile))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let project_routes = Router::new()
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route("/projects/live", get(routes::projects::live_projects))
        .route("/projects/:id", get(routes::projects::get_project))
        .route("/projects/:id/join", post(routes::projects::join_project))
        .route("/projects/:id/board", get(routes::tasks::get_board))
        .route("/projects/:id/board/live", get(routes::tasks::live_board))
        .route("/projects/:id/tasks", post(routes::tasks::create_task))
        .route(
            "/projects/:id/tasks/:task_id",
            patch(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route("/projects/:id/tasks/:task_id/move", post(routes::tasks::move_task))
        .route("/projects/:id/members", post(routes::members::invite_member))
        .route(
            "/projects/:id/members/:user_id",
            delete(routes::members::remove_member),
        )
        .route(
            "/projects/:id/invitations/:email",
            delete(routes::members::remove_invitation),
        )
        .route(
            "/teams",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .layer(from_fn(verified_layer))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .route("/navigation/resolve", post(routes::navigation::resolve))
        .nest("/auth", public_auth_routes.merge(session_routes))
        .merge(project_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// CORS: any origin when none are configured, otherwise the configured list
fn cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [header::AUTHORIZATION, header::CONTENT_TYPE];

    if config.api.cors_origins.is_empty() || config.api.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Validates the bearer token and stores the [`AuthContext`] in the request
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}

/// Rejects callers whose token carries `email_verified = false`
async fn verified_layer(req: Request, next: Next) -> Result<Response, ApiError> {
    let verified = req
        .extensions()
        .get::<AuthContext>()
        .map(|auth| auth.email_verified);

    match verified {
        Some(true) => Ok(next.run(req).await),
        Some(false) => Err(AuthError::Unverified.into()),
        None => Err(AuthError::MissingCredentials.into()),
    }
}

