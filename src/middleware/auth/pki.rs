//! Proxy certificate headers -> gate -> `AuthCtx` in request extensions.
//!
//! Requests the gate has no opinion on (or refuses) continue without an
//! `AuthCtx`; handlers that need one reject via `AuthCtxExtractor` with a
//! plain 401, so a refused client can't tell it apart from an anonymous one.
//! Store failures stop the request with a 500.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};
use tracing::debug;

use crate::api::v1::extractors::auth_ctx::AuthCtx;
use crate::error::AppError;
use crate::services::pki::{AuthOutcome, RequestContext};
use crate::state::AppState;

/// Run pki authentication in front of every route of `router`.
///
/// ```ignore
/// let v1 = api::v1::routes();
/// let v1 = middleware::auth::pki::apply(v1, state.clone());
/// app = app.nest("/api/v1", v1);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, pki_middleware))
}

async fn pki_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = RequestContext::from_parts(req.uri(), req.headers(), &state.transport);

    match state.pki.authenticate(&ctx).await? {
        AuthOutcome::Authenticated(profile) => {
            req.extensions_mut().insert(AuthCtx::from(&profile));
        }
        AuthOutcome::NotApplicable(reason) => {
            debug!(?reason, "pki authentication not applicable");
        }
        AuthOutcome::Denied(reason) => {
            debug!(?reason, "pki authentication denied");
        }
    }

    Ok(next.run(req).await)
}
