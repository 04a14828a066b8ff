/*
 * Responsibility
 * - Certificate-header authentication (gate) and just-in-time profile provisioning (resolver)
 * - dn: pure DN / username helpers shared by both
 */
pub mod dn;
pub mod gate;
pub mod resolver;

pub use gate::{AuthOutcome, PkiAuthenticator, RequestContext, SecureTransport};
pub use resolver::IdentityResolver;
