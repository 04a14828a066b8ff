/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - profile store, pki authenticator, secure-transport policy
 * - Cheap to Clone (everything inside is Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::repos::profile_repo::ProfileStore;
use crate::services::pki::{PkiAuthenticator, SecureTransport};

#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileStore>,
    pub pki: Arc<PkiAuthenticator>,
    pub transport: SecureTransport,
}

impl AppState {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        pki: Arc<PkiAuthenticator>,
        transport: SecureTransport,
    ) -> Self {
        Self {
            profiles,
            pki,
            transport,
        }
    }
}
