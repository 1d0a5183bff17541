//! API router.
//!
//! Returns a composable `Router` mounted under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Trace + `Cache-Control: no-store` → 2. Auth validator → 3. Audit
//!    logger → 4. Per-route operation check

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{delete, get, post, put, MethodRouter};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints::{accounts, assistants, auth, health, patients, transfer, visits};
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::authorization::Operation;
use crate::core_state::CoreState;
use crate::pipeline::import::MAX_UPLOAD_BYTES;

/// Multipart framing allowance on top of the workbook itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Bind a route to the operation it performs.
fn guarded(route: MethodRouter<ApiContext>, operation: Operation) -> MethodRouter<ApiContext> {
    route.route_layer(axum::middleware::from_fn_with_state(
        operation,
        middleware::authorize::permit,
    ))
}

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    use Operation::*;

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", guarded(post(auth::logout), ViewOwnAccount))
        .route("/auth/me", guarded(get(auth::me), ViewOwnAccount))
        .route("/auth/password", guarded(post(auth::change_password), ChangeOwnPassword))
        .route(
            "/accounts",
            guarded(get(accounts::list), ManageUsers).merge(guarded(post(accounts::create), ManageUsers)),
        )
        .route("/accounts/:id", guarded(put(accounts::update), ManageUsers))
        .route(
            "/assistants",
            guarded(get(assistants::list), ManageAssistants)
                .merge(guarded(post(assistants::create), ManageAssistants)),
        )
        .route("/assistants/:id", guarded(put(assistants::update), ManageAssistants))
        .route(
            "/patients",
            guarded(get(patients::list), ListPatients).merge(guarded(post(patients::create), CreatePatient)),
        )
        .route("/patients/export", guarded(get(transfer::export), ExportPatients))
        .route(
            "/patients/import",
            guarded(
                post(transfer::import).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + UPLOAD_OVERHEAD_BYTES)),
                ImportPatients,
            ),
        )
        .route(
            "/patients/:id",
            guarded(get(patients::detail), ViewPatient)
                .merge(guarded(put(patients::update), EditPatient))
                .merge(guarded(delete(patients::delete), DeletePatient)),
        )
        .route("/patients/:id/visits", guarded(post(patients::create_visit), RecordVisit))
        .route(
            "/visits/:id",
            guarded(get(visits::detail), ViewVisit).merge(guarded(delete(visits::delete), DeleteVisit)),
        )
        .route("/visits/:id/diagnoses", guarded(post(visits::add_diagnosis), AddDiagnosis))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (no session required)
    let open = Router::new()
        .route("/health", get(health::check))
        .route("/auth/login", post(auth::login))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected.merge(open))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
}
