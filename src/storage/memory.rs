//! In-process storage backend
//!
//! Keeps every table behind one `RwLock`; each trait method takes the lock
//! once, so a uniqueness check and the insert it guards happen in the same
//! critical section, the same guarantee a database unique index gives.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::trace;

use super::models::{ApiKey, Link, NewLink, NewUser, OwnerRef, User};
use super::{
    LINK_CODE_CONSTRAINT, LINK_OWNER_URL_CONSTRAINT, LinkInsertGuard, LinkRepository,
    UserRepository,
};
use crate::auth::policy::Plan;
use crate::errors::{LinkhubError, Result};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    api_keys: Vec<ApiKey>,
    links: Vec<Link>,
}

impl Tables {
    fn live_user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id && !u.is_deleted())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Storage` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LinkhubError::storage("storage unavailable"))
        } else {
            Ok(())
        }
    }

    /// Rows including soft-deleted ones, for inspection in tests and tooling.
    pub fn all_links(&self) -> Vec<Link> {
        self.tables.read().links.clone()
    }
}

#[async_trait]
impl LinkRepository for MemoryStorage {
    async fn create_link(&self, link: NewLink, guard: LinkInsertGuard) -> Result<Link> {
        self.ensure_available()?;
        let mut tables = self.tables.write();

        let user_id = link.owner.user_id;
        if let Some(max) = guard.max_active_links {
            let active = tables
                .links
                .iter()
                .filter(|l| !l.is_deleted() && l.owner.user_id == user_id)
                .count() as u64;
            if active >= max {
                return Err(LinkhubError::limit_exceeded(format!(
                    "link limit of {} reached",
                    max
                )));
            }
        }
        if guard.unique_long_url
            && tables.links.iter().any(|l| {
                !l.is_deleted() && l.owner.user_id == user_id && l.long_url == link.long_url
            })
        {
            return Err(LinkhubError::unique_violation(LINK_OWNER_URL_CONSTRAINT));
        }
        if tables
            .links
            .iter()
            .any(|l| !l.is_deleted() && l.code == link.code)
        {
            return Err(LinkhubError::unique_violation(LINK_CODE_CONSTRAINT));
        }

        let created = Link {
            id: tables.links.len() as i64 + 1,
            owner: link.owner,
            code: link.code,
            long_url: link.long_url,
            password_hash: link.password_hash,
            click_count: 0,
            last_clicked_at: None,
            deleted_at: None,
            created_at: link.created_at,
        };
        tables.links.push(created.clone());
        trace!("memory: inserted link {} ({})", created.id, created.code);
        Ok(created)
    }

    async fn get_link_by_code(&self, code: &str) -> Result<Option<Link>> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .links
            .iter()
            .find(|l| !l.is_deleted() && l.code == code)
            .cloned())
    }

    async fn list_links_by_owner(&self, owner: &OwnerRef) -> Result<Vec<Link>> {
        self.ensure_available()?;
        let mut links: Vec<Link> = self
            .tables
            .read()
            .links
            .iter()
            .filter(|l| !l.is_deleted() && owner.covers(&l.owner))
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(links)
    }

    async fn count_active_links(&self, user_id: i64) -> Result<u64> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .links
            .iter()
            .filter(|l| !l.is_deleted() && l.owner.user_id == user_id)
            .count() as u64)
    }

    async fn count_links_by_long_url(&self, owner: &OwnerRef, long_url: &str) -> Result<u64> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .links
            .iter()
            .filter(|l| !l.is_deleted() && owner.covers(&l.owner) && l.long_url == long_url)
            .count() as u64)
    }

    async fn soft_delete_link(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        match tables
            .links
            .iter_mut()
            .find(|l| l.id == id && !l.is_deleted())
        {
            Some(link) => {
                link.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_click(&self, code: &str, at: DateTime<Utc>) -> Result<Option<Link>> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        Ok(tables
            .links
            .iter_mut()
            .find(|l| !l.is_deleted() && l.code == code)
            .map(|link| {
                link.click_count += 1;
                link.last_clicked_at = Some(link.last_clicked_at.map_or(at, |prev| prev.max(at)));
                link.clone()
            }))
    }
}

#[async_trait]
impl UserRepository for MemoryStorage {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.ensure_available()?;
        let mut tables = self.tables.write();

        if tables
            .users
            .iter()
            .any(|u| !u.is_deleted() && u.email == user.email)
        {
            return Err(LinkhubError::unique_violation("users.email"));
        }

        let created = User {
            id: tables.users.len() as i64 + 1,
            email: user.email,
            password_hash: user.password_hash,
            plan: user.plan,
            role: user.role,
            plan_expires_at: user.plan_expires_at,
            deleted_at: None,
            created_at: user.created_at,
            updated_at: None,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .users
            .iter()
            .find(|u| !u.is_deleted() && u.email == email)
            .cloned())
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.ensure_available()?;
        Ok(self.tables.read().live_user(id).cloned())
    }

    async fn update_plan(
        &self,
        id: i64,
        plan: Plan,
        plan_expires_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        Ok(tables
            .users
            .iter_mut()
            .find(|u| u.id == id && !u.is_deleted())
            .map(|user| {
                user.plan = plan;
                user.plan_expires_at = plan_expires_at;
                user.updated_at = Some(at);
                user.clone()
            }))
    }

    async fn soft_delete_user(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        match tables
            .users
            .iter_mut()
            .find(|u| u.id == id && !u.is_deleted())
        {
            Some(user) => {
                user.deleted_at = Some(at);
                user.updated_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_api_key(&self, user_id: i64, key: &str, at: DateTime<Utc>) -> Result<ApiKey> {
        self.ensure_available()?;
        let mut tables = self.tables.write();

        if tables
            .api_keys
            .iter()
            .any(|k| k.deleted_at.is_none() && k.key == key)
        {
            return Err(LinkhubError::unique_violation("api_keys.key"));
        }
        if tables.live_user(user_id).is_none() {
            return Err(LinkhubError::storage(format!(
                "foreign key violation: user {} does not exist",
                user_id
            )));
        }

        let created = ApiKey {
            id: tables.api_keys.len() as i64 + 1,
            user_id,
            key: key.to_string(),
            deleted_at: None,
            created_at: at,
        };
        tables.api_keys.push(created.clone());
        Ok(created)
    }

    async fn get_api_key(&self, key: &str) -> Result<Option<ApiKey>> {
        self.ensure_available()?;
        let tables = self.tables.read();
        Ok(tables
            .api_keys
            .iter()
            .find(|k| k.deleted_at.is_none() && k.key == key)
            .filter(|k| tables.live_user(k.user_id).is_some())
            .cloned())
    }

    async fn get_api_key_by_id(&self, id: i64) -> Result<Option<ApiKey>> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .api_keys
            .iter()
            .find(|k| k.id == id && k.deleted_at.is_none())
            .cloned())
    }

    async fn list_api_keys(&self, user_id: i64) -> Result<Vec<ApiKey>> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .api_keys
            .iter()
            .filter(|k| k.user_id == user_id && k.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn soft_delete_api_key(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        match tables
            .api_keys
            .iter_mut()
            .find(|k| k.id == id && k.deleted_at.is_none())
        {
            Some(key) => {
                key.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
