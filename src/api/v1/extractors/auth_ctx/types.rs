/*
 * Responsibility
 * - The "authenticated request" type handlers see
 * - The pki middleware resolves it and stores it in request extensions;
 *   handlers receive only this type
 *
 * Notes
 * - Header checks and profile provisioning belong to services::pki
 */

use uuid::Uuid;

use crate::repos::profile_repo::Profile;

/// Context attached to a request whose client certificate mapped to an active profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCtx {
    pub profile_id: Uuid,
    pub account_id: Uuid,
    pub username: String,
    pub dn: String,
}

impl From<&Profile> for AuthCtx {
    fn from(profile: &Profile) -> Self {
        Self {
            profile_id: profile.id,
            account_id: profile.account.id,
            username: profile.account.username.clone(),
            dn: profile.dn.clone(),
        }
    }
}
