//! HTTP router.
//!
//! Returns a composable `Router`. Handlers use `State(ApiContext)`;
//! the auth middleware reads the same context from an `Extension`
//! layer, which must therefore be outermost.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::Config;
use crate::mailer::Mailer;

pub fn api_router(config: Config, mailer: Arc<dyn Mailer>) -> Router {
    build_router(ApiContext::new(config, mailer))
}

#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    let max_upload = ctx.config.max_upload_bytes;

    let protected = Router::new()
        .route("/patients", post(endpoints::patients::register))
        .route("/patients", get(endpoints::patients::list))
        .route(
            "/patients/idNumber/:id_number",
            get(endpoints::patients::get_by_id_number),
        )
        .route("/patients/:id", put(endpoints::patients::update))
        .route("/patients/:id", delete(endpoints::patients::delete))
        .route("/staff/create", post(endpoints::staff::create))
        .route("/staff/all", get(endpoints::staff::list))
        .route("/staff/doctors", get(endpoints::staff::doctors))
        .route("/appointments", post(endpoints::appointments::create))
        .route("/appointments/today", get(endpoints::appointments::today))
        .route("/appointments/queue", get(endpoints::appointments::queue))
        .route(
            "/appointments/queue/next",
            post(endpoints::appointments::call_next),
        )
        .route(
            "/appointments/walkin",
            post(endpoints::appointments::walk_in),
        )
        .route(
            "/appointments/:id/checkin",
            post(endpoints::appointments::check_in),
        )
        .route(
            "/appointments/:id/start",
            post(endpoints::appointments::start),
        )
        .route(
            "/appointments/:id/complete",
            post(endpoints::appointments::complete),
        )
        .route(
            "/appointments/:id/noshow",
            post(endpoints::appointments::no_show),
        )
        .route(
            "/appointments/:id/cancel",
            post(endpoints::appointments::cancel),
        )
        .route("/files/upload", post(endpoints::files::upload))
        .route(
            "/files/patient/:id",
            get(endpoints::files::list_for_patient),
        )
        .route(
            "/files/check-duplicate",
            post(endpoints::files::check_duplicate),
        )
        .route("/files/:id/signed-url", get(endpoints::files::signed_url))
        .route("/files/:id/status", post(endpoints::files::report_status))
        .route("/files/stats", get(endpoints::files::stats))
        .route("/onboarding/invite", post(endpoints::onboarding::invite))
        .route(
            "/onboarding/practice",
            get(endpoints::onboarding::practice_info),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    // Entry points that cannot carry a bearer token yet, plus the
    // signature-checked download.
    let unprotected = Router::new()
        .route("/auth/login", post(endpoints::auth::login))
        .route(
            "/auth/forgot-password",
            post(endpoints::auth::forgot_password),
        )
        .route(
            "/auth/reset-password",
            post(endpoints::auth::reset_password),
        )
        .route(
            "/onboarding/practice",
            post(endpoints::onboarding::create_practice),
        )
        .route("/onboarding/join", post(endpoints::onboarding::join))
        .route("/files/download", get(endpoints::files::download))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(axum::Extension(ctx));

    Router::new()
        .merge(protected)
        .merge(unprotected)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CorsLayer::permissive())
}
