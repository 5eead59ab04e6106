use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    docs::ApiDoc,
    error::AppError,
    handlers::{auth, pages, profile, race_results},
    middleware::{self, rate_limit::AuthRateLimiter},
    state::AppState,
};

/// Builds the full application. `auth_limiter` guards the unauthenticated
/// auth endpoints; it needs `ConnectInfo<SocketAddr>` on the request.
pub fn router(state: AppState, auth_limiter: Option<AuthRateLimiter>) -> Router {
    let mut public_auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password));
    if let Some(limiter) = auth_limiter {
        public_auth_routes = public_auth_routes.route_layer(limiter);
    }

    let public_routes = Router::new()
        .route("/race-results", get(race_results::list_race_results))
        .route("/race-results/{id}", get(race_results::get_race_result))
        .route(
            "/users/{id}/race-results",
            get(race_results::list_user_race_results),
        );

    let upload_limit = state.profiles.policy().upload_body_limit();
    let user_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/user", get(auth::me))
        .route(
            "/auth/email/resend-verification",
            post(auth::resend_verification),
        )
        .route(
            "/user/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/user/profile/avatar", post(profile::set_avatar))
        .route(
            "/user/photos",
            get(profile::list_photos)
                .post(profile::upload_photos)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/user/photos/{id}", delete(profile::delete_photo))
        .route("/race-results", post(race_results::create_race_result))
        .route(
            "/race-results/{id}",
            put(race_results::update_race_result).delete(race_results::delete_race_result),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    let api_routes = Router::new()
        .merge(public_auth_routes)
        .merge(public_routes)
        .merge(user_routes);

    let page_routes = Router::new()
        .route("/verify-email/{id}/{hash}", get(pages::verify_email))
        .route("/reset-password", get(pages::reset_password_form))
        .route("/reset-password/success", get(pages::reset_password_success));

    let cors = cors_layer(&state.config);
    let storage = ServeDir::new(&state.config.storage_root);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(page_routes)
        .nest_service("/storage", storage)
        .merge(SwaggerUi::new("/api/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .layer(axum_middleware::from_fn(middleware::log_error_responses))
        .layer(axum_middleware::from_fn(middleware::request_id))
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::not_found("resource", "Resource not found.")
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = &config.cors_allow_origins;
    let allow_origin = if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(24 * 60 * 60))
}
