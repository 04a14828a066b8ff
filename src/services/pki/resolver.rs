use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::profile_repo::{NewProfile, Profile, ProfileStore};
use crate::services::events::{EventPublisher, ProfileCreated};
use crate::services::pki::dn;

/// Result of mapping a certificate DN onto a profile.
///
/// Store failures are not a variant: they travel as `Err(RepoError)` so the
/// caller can't mistake them for an anonymous request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Existing(Profile),
    Created(Profile),
    Inactive { dn: String },
    UsernameUnavailable { dn: String, username: String },
}

/// Finds or provisions the profile for a verified certificate identity.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn ProfileStore>,
    events: EventPublisher,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn ProfileStore>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    pub async fn resolve_or_create(&self, dn: &str, issuer_dn: &str) -> RepoResult<Resolution> {
        if let Some(profile) = self.store.find_by_dn(dn).await? {
            return self.refresh_existing(profile, issuer_dn).await;
        }

        info!(dn = %dn, "creating new user for dn");

        let display_name = dn::display_name(dn).to_string();
        let username = match self.available_username(&display_name).await? {
            Ok(username) => username,
            Err(username) => {
                error!(
                    dn = %dn,
                    username = %username,
                    "cannot create new user: username already exists"
                );
                return Ok(Resolution::UsernameUnavailable {
                    dn: dn.to_string(),
                    username,
                });
            }
        };

        let new = NewProfile {
            username: username.clone(),
            dn: dn.to_string(),
            issuer_dn: issuer_dn.to_string(),
            display_name,
        };

        let profile = match self.store.create_account_and_profile(new).await {
            Ok(profile) => profile,
            Err(RepoError::Conflict) => {
                // Someone else provisioned this dn (or took the username) first.
                warn!(dn = %dn, username = %username, "profile creation lost a uniqueness race");
                return match self.store.find_by_dn(dn).await? {
                    Some(profile) => self.refresh_existing(profile, issuer_dn).await,
                    None => {
                        error!(
                            dn = %dn,
                            username = %username,
                            "cannot create new user: username already exists"
                        );
                        Ok(Resolution::UsernameUnavailable {
                            dn: dn.to_string(),
                            username,
                        })
                    }
                };
            }
            Err(e) => return Err(e),
        };

        info!(
            profile_id = %profile.id,
            username = %profile.account.username,
            "created new profile"
        );

        self.events.profile_created(ProfileCreated {
            profile_id: profile.id,
            dn: profile.dn.clone(),
            timestamp: Utc::now(),
        });

        Ok(Resolution::Created(profile))
    }

    async fn refresh_existing(
        &self,
        mut profile: Profile,
        issuer_dn: &str,
    ) -> RepoResult<Resolution> {
        if !profile.account.is_active {
            warn!(dn = %profile.dn, "inactive user tried to login");
            return Ok(Resolution::Inactive { dn: profile.dn });
        }

        if profile.issuer_dn != issuer_dn {
            info!(
                username = %profile.account.username,
                "updating issuer dn"
            );
            self.store.update_issuer_dn(profile.id, issuer_dn).await?;
            profile.issuer_dn = issuer_dn.to_string();
        }

        Ok(Resolution::Existing(profile))
    }

    /// `Ok(Ok(name))` when free, `Ok(Err(name))` with the last candidate tried
    /// when the single collision-avoidance pass did not find a free name.
    async fn available_username(
        &self,
        display_name: &str,
    ) -> RepoResult<Result<String, String>> {
        let mut username = dn::base_username(display_name);

        if self.store.username_exists(&username).await? {
            let prefix = dn::collision_prefix(&username);
            let existing = self.store.count_usernames_with_prefix(&prefix).await?;
            username = dn::suffixed_username(&prefix, existing);
        }

        if self.store.username_exists(&username).await? {
            return Ok(Err(username));
        }

        Ok(Ok(username))
    }
}
