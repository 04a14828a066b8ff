//! In-memory `ProfileStore` used by unit and router tests.
//!
//! Mirrors the Postgres uniqueness rules (case-insensitive dn, unique username)
//! so conflict paths behave the same way.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::profile_repo::{Account, NewProfile, Profile, ProfileStore};

#[derive(Debug, Default)]
struct Inner {
    accounts: Vec<Account>,
    profiles: Vec<Profile>,
    creates: usize,
    issuer_updates: usize,
    fail_next_create_with_conflict: bool,
    hide_next_dn_lookup: bool,
    fail_next_with_db_error: bool,
}

impl Inner {
    fn take_db_failure(&mut self) -> RepoResult<()> {
        if std::mem::take(&mut self.fail_next_with_db_error) {
            return Err(RepoError::Db(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    inner: Mutex<Inner>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account that has no profile (e.g. created by an admin).
    pub async fn insert_account(&self, username: &str) {
        let mut inner = self.inner.lock().await;
        inner.accounts.push(Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            is_active: true,
        });
    }

    pub async fn set_active(&self, dn: &str, is_active: bool) {
        let mut inner = self.inner.lock().await;
        let needle = dn.to_lowercase();
        let mut account_id = None;
        for p in inner.profiles.iter_mut() {
            if p.dn.to_lowercase() == needle {
                p.account.is_active = is_active;
                account_id = Some(p.account.id);
            }
        }
        if let Some(id) = account_id {
            for a in inner.accounts.iter_mut().filter(|a| a.id == id) {
                a.is_active = is_active;
            }
        }
    }

    /// Next create fails with `Conflict` without writing, simulating a lost race.
    pub async fn fail_next_create_with_conflict(&self) {
        self.inner.lock().await.fail_next_create_with_conflict = true;
    }

    /// Next `find_by_dn` misses even if the profile exists, so the caller goes
    /// on to create it and runs into the existing row.
    pub async fn hide_next_dn_lookup(&self) {
        self.inner.lock().await.hide_next_dn_lookup = true;
    }

    /// Next store call of any kind fails as if the pool were exhausted.
    pub async fn fail_next_with_db_error(&self) {
        self.inner.lock().await.fail_next_with_db_error = true;
    }

    pub async fn create_count(&self) -> usize {
        self.inner.lock().await.creates
    }

    pub async fn issuer_update_count(&self) -> usize {
        self.inner.lock().await.issuer_updates
    }

    pub async fn usernames(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.accounts.iter().map(|a| a.username.clone()).collect()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_dn(&self, dn: &str) -> RepoResult<Option<Profile>> {
        let mut inner = self.inner.lock().await;
        inner.take_db_failure()?;
        if std::mem::take(&mut inner.hide_next_dn_lookup) {
            return Ok(None);
        }
        let needle = dn.to_lowercase();
        Ok(inner
            .profiles
            .iter()
            .find(|p| p.dn.to_lowercase() == needle)
            .cloned())
    }

    async fn find_by_id(&self, profile_id: Uuid) -> RepoResult<Option<Profile>> {
        let mut inner = self.inner.lock().await;
        inner.take_db_failure()?;
        Ok(inner.profiles.iter().find(|p| p.id == profile_id).cloned())
    }

    async fn create_account_and_profile(&self, new: NewProfile) -> RepoResult<Profile> {
        let mut inner = self.inner.lock().await;
        inner.take_db_failure()?;

        if std::mem::take(&mut inner.fail_next_create_with_conflict) {
            return Err(RepoError::Conflict);
        }

        let dn_taken = inner
            .profiles
            .iter()
            .any(|p| p.dn.to_lowercase() == new.dn.to_lowercase());
        let username_taken = inner.accounts.iter().any(|a| a.username == new.username);
        if dn_taken || username_taken {
            return Err(RepoError::Conflict);
        }

        let account = Account {
            id: Uuid::new_v4(),
            username: new.username,
            is_active: true,
        };
        let profile = Profile {
            id: Uuid::new_v4(),
            dn: new.dn,
            issuer_dn: new.issuer_dn,
            display_name: new.display_name,
            account: account.clone(),
            created_at: Utc::now(),
        };

        inner.accounts.push(account);
        inner.profiles.push(profile.clone());
        inner.creates += 1;

        Ok(profile)
    }

    async fn update_issuer_dn(&self, profile_id: Uuid, issuer_dn: &str) -> RepoResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.take_db_failure()?;
        let mut updated = 0;
        for p in inner.profiles.iter_mut().filter(|p| p.id == profile_id) {
            p.issuer_dn = issuer_dn.to_string();
            updated += 1;
        }
        inner.issuer_updates += updated as usize;
        Ok(updated)
    }

    async fn username_exists(&self, username: &str) -> RepoResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.take_db_failure()?;
        Ok(inner.accounts.iter().any(|a| a.username == username))
    }

    async fn count_usernames_with_prefix(&self, prefix: &str) -> RepoResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.take_db_failure()?;
        Ok(inner
            .accounts
            .iter()
            .filter(|a| a.username.starts_with(prefix))
            .count() as u64)
    }
}
