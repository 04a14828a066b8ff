/*
 * Responsibility
 * - URL layout of v1
 * - /health stays public; everything else runs behind pki authentication
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, profile::get_self_profile};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let authenticated = Router::new().route("/self/profile", get(get_self_profile));
    let authenticated = middleware::auth::pki::apply(authenticated, state);

    Router::new()
        .route("/health", get(health))
        .merge(authenticated)
}
