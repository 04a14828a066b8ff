/*
 * Responsibility
 * - Response DTO for the caller's own profile
 */
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::repos::profile_repo::Profile;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub dn: String,
    pub issuer_dn: String,
    pub display_name: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            dn: p.dn,
            issuer_dn: p.issuer_dn,
            display_name: p.display_name,
            username: p.account.username,
            created_at: p.created_at,
        }
    }
}
