//! Persistence contract
//!
//! The services only see these two traits. Every read excludes soft-deleted
//! rows. A missing row is `Ok(None)` (or `Ok(false)` for mutations), an
//! insert that hits a live-row unique index is `Err(UniqueViolation)`, and
//! anything else the backend cannot do is `Err(Storage)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::policy::Plan;
use crate::errors::Result;

pub mod memory;
pub mod models;

pub use memory::MemoryStorage;
pub use models::{ApiKey, Link, NewLink, NewUser, OwnerRef, User};

/// Unique index over live short codes
pub const LINK_CODE_CONSTRAINT: &str = "links.code";
/// Unique index over live (account, long URL) pairs, when enabled
pub const LINK_OWNER_URL_CONSTRAINT: &str = "links.owner_long_url";

/// Account-level limits, checked in the same critical section as the insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkInsertGuard {
    /// Reject with `LimitExceeded` when the account already has this many live links
    pub max_active_links: Option<u64>,
    /// Reject with `UniqueViolation(LINK_OWNER_URL_CONSTRAINT)` when the account
    /// already has a live link to the same long URL
    pub unique_long_url: bool,
}

#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Insert a link; the short code must be unique among live links and
    /// the account must satisfy `guard`.
    async fn create_link(&self, link: NewLink, guard: LinkInsertGuard) -> Result<Link>;

    async fn get_link_by_code(&self, code: &str) -> Result<Option<Link>>;

    /// Links visible to `owner` (see [`OwnerRef::covers`]), newest first.
    async fn list_links_by_owner(&self, owner: &OwnerRef) -> Result<Vec<Link>>;

    /// Live links of the account, across all of its keys.
    async fn count_active_links(&self, user_id: i64) -> Result<u64>;

    async fn count_links_by_long_url(&self, owner: &OwnerRef, long_url: &str) -> Result<u64>;

    async fn soft_delete_link(&self, id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// Atomically add one click to the live link with this code and move
    /// `last_clicked_at` forward. Returns the updated link.
    async fn increment_click(&self, code: &str, at: DateTime<Utc>) -> Result<Option<Link>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; the email must be unique among live users.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn update_plan(
        &self,
        id: i64,
        plan: Plan,
        plan_expires_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<Option<User>>;

    async fn soft_delete_user(&self, id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// Insert a key; the key string must be unique among live keys.
    async fn create_api_key(&self, user_id: i64, key: &str, at: DateTime<Utc>) -> Result<ApiKey>;

    /// Live key whose owning user is also live.
    async fn get_api_key(&self, key: &str) -> Result<Option<ApiKey>>;

    async fn get_api_key_by_id(&self, id: i64) -> Result<Option<ApiKey>>;

    async fn list_api_keys(&self, user_id: i64) -> Result<Vec<ApiKey>>;

    async fn soft_delete_api_key(&self, id: i64, at: DateTime<Utc>) -> Result<bool>;
}
