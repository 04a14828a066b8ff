/*
 * Responsibility
 * - Public interface of the middleware layers
 * - auth::pki (identity), http (request id / tracing / limits)
 */
pub mod auth;
pub mod http;
