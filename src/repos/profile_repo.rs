/*
 * Responsibility
 * - Profile / Account persistence behind the `ProfileStore` interface
 * - Postgres implementation over sqlx (PgProfileStore)
 * - The store's unique constraints are the final authority on duplicates:
 *   - accounts.username UNIQUE
 *   - profiles.account_id UNIQUE (one profile per account)
 *   - UNIQUE INDEX ON profiles (lower(dn))
 *
 * Assumed schema (migrations live outside this service):
 *   accounts(id uuid, username text, is_active bool, created_at timestamptz)
 *   profiles(id uuid, account_id uuid, dn text, issuer_dn text,
 *            display_name text, created_at timestamptz)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub is_active: bool,
}

/// Application record binding a certificate DN to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub dn: String,
    pub issuer_dn: String,
    pub display_name: String,
    pub account: Account,
    pub created_at: DateTime<Utc>,
}

/// Input for provisioning a new account + profile pair.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub username: String,
    pub dn: String,
    pub issuer_dn: String,
    pub display_name: String,
}

#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    /// Case-insensitive exact match on `dn`.
    async fn find_by_dn(&self, dn: &str) -> RepoResult<Option<Profile>>;

    async fn find_by_id(&self, profile_id: Uuid) -> RepoResult<Option<Profile>>;

    // Returns `RepoError::Conflict` when a unique constraint rejects the insert.
    async fn create_account_and_profile(&self, new: NewProfile) -> RepoResult<Profile>;

    async fn update_issuer_dn(&self, profile_id: Uuid, issuer_dn: &str) -> RepoResult<u64>;

    async fn username_exists(&self, username: &str) -> RepoResult<bool>;

    /// Number of accounts whose username starts with `prefix` (literal match, no wildcards).
    async fn count_usernames_with_prefix(&self, prefix: &str) -> RepoResult<u64>;
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    id: Uuid,
    dn: String,
    issuer_dn: String,
    display_name: String,
    created_at: DateTime<Utc>,
    account_id: Uuid,
    username: String,
    is_active: bool,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            dn: row.dn,
            issuer_dn: row.issuer_dn,
            display_name: row.display_name,
            account: Account {
                id: row.account_id,
                username: row.username,
                is_active: row.is_active,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    username: String,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct InsertedProfileRow {
    id: Uuid,
    dn: String,
    issuer_dn: String,
    display_name: String,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_by_dn(&self, dn: &str) -> RepoResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT
                p.id, p.dn, p.issuer_dn, p.display_name, p.created_at,
                a.id AS account_id, a.username, a.is_active
            FROM profiles p
            JOIN accounts a ON a.id = p.account_id
            WHERE lower(p.dn) = lower($1)
            LIMIT 1
            "#,
        )
        .bind(dn)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.map(Profile::from))
    }

    async fn find_by_id(&self, profile_id: Uuid) -> RepoResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT
                p.id, p.dn, p.issuer_dn, p.display_name, p.created_at,
                a.id AS account_id, a.username, a.is_active
            FROM profiles p
            JOIN accounts a ON a.id = p.account_id
            WHERE p.id = $1
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.map(Profile::from))
    }

    async fn create_account_and_profile(&self, new: NewProfile) -> RepoResult<Profile> {
        // account + profile commit together or not at all
        let mut tx = self.pool.begin().await.map_err(RepoError::from_sqlx)?;

        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (id, username, is_active)
            VALUES ($1, $2, true)
            RETURNING id, username, is_active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        let profile = sqlx::query_as::<_, InsertedProfileRow>(
            r#"
            INSERT INTO profiles (id, account_id, dn, issuer_dn, display_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, dn, issuer_dn, display_name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account.id)
        .bind(&new.dn)
        .bind(&new.issuer_dn)
        .bind(&new.display_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;

        tx.commit().await.map_err(RepoError::from_sqlx)?;

        Ok(Profile {
            id: profile.id,
            dn: profile.dn,
            issuer_dn: profile.issuer_dn,
            display_name: profile.display_name,
            account: Account {
                id: account.id,
                username: account.username,
                is_active: account.is_active,
            },
            created_at: profile.created_at,
        })
    }

    async fn update_issuer_dn(&self, profile_id: Uuid, issuer_dn: &str) -> RepoResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE profiles
            SET issuer_dn = $2
            WHERE id = $1
            "#,
        )
        .bind(profile_id)
        .bind(issuer_dn)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(res.rows_affected())
    }

    async fn username_exists(&self, username: &str) -> RepoResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM accounts WHERE username = $1)
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(exists)
    }

    async fn count_usernames_with_prefix(&self, prefix: &str) -> RepoResult<u64> {
        // left() instead of LIKE: usernames contain '_', which LIKE treats as a wildcard
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM accounts
            WHERE left(username, char_length($1)) = $1
            "#,
        )
        .bind(prefix)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(count.max(0) as u64)
    }
}
