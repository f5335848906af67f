//! Link management service
//!
//! Owns the link lifecycle: creation with collision-avoiding code
//! generation, resolution with click tracking, owner-scoped listing and
//! soft deletion.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::auth::policy::Requirement;
use crate::config::LinkSettings;
use crate::errors::{LinkhubError, Result};
use crate::storage::{
    LINK_OWNER_URL_CONSTRAINT, Link, LinkInsertGuard, LinkRepository, NewLink, OwnerRef,
    UserRepository,
};
use crate::utils::password::{is_argon2_hash, process_new_password, verify_password};
use crate::utils::{
    CodeSource, RandomCodeSource, generate_unique, is_valid_short_code, validate_long_url,
};

// ============ Request DTOs ============

/// Request to create a new link
#[derive(Debug, Clone, Default)]
pub struct CreateLinkRequest {
    /// Target URL
    pub long_url: String,
    /// Short code (optional, will be generated if not provided)
    pub custom_code: Option<String>,
    /// Access password (plaintext, hashed before storage)
    pub password: Option<String>,
}

impl CreateLinkRequest {
    pub fn new(long_url: impl Into<String>) -> Self {
        Self {
            long_url: long_url.into(),
            ..Default::default()
        }
    }

    pub fn with_custom_code(mut self, code: impl Into<String>) -> Self {
        self.custom_code = Some(code.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

fn duplicate_url_conflict(long_url: &str) -> LinkhubError {
    LinkhubError::conflict(format!(
        "a link to '{}' already exists for this account",
        long_url
    ))
}

// ============ LinkService Implementation ============

pub struct LinkService {
    links: Arc<dyn LinkRepository>,
    users: Arc<dyn UserRepository>,
    settings: LinkSettings,
    codes: Arc<dyn CodeSource>,
}

impl LinkService {
    pub fn new(
        links: Arc<dyn LinkRepository>,
        users: Arc<dyn UserRepository>,
        settings: LinkSettings,
    ) -> Self {
        Self {
            links,
            users,
            settings,
            codes: Arc::new(RandomCodeSource),
        }
    }

    /// Replace the random candidate source
    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Validate a user-provided code
    fn check_custom_code(&self, code: &str) -> Result<()> {
        if !is_valid_short_code(code) {
            return Err(LinkhubError::validation(format!(
                "Invalid short code '{}'. Only 1-64 letters, digits, underscores and hyphens are allowed.",
                code
            )));
        }
        if self.settings.is_reserved(code) {
            return Err(LinkhubError::validation(format!(
                "Short code '{}' is reserved",
                code
            )));
        }
        Ok(())
    }

    // ============ Operations ============

    /// Create a new short link owned by `owner`
    pub async fn create_short_link(&self, owner: &OwnerRef, req: CreateLinkRequest) -> Result<Link> {
        let long_url = req.long_url.trim().to_string();
        validate_long_url(&long_url)?;

        let custom_code = req
            .custom_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if let Some(code) = custom_code {
            self.check_custom_code(code)?;
        }

        let user = self
            .users
            .get_user_by_id(owner.user_id)
            .await?
            .ok_or_else(|| LinkhubError::unauthorized("account not found"))?;

        // 预检查只用于尽早拒绝，真正的约束由 guard 在插入时保证
        let now = Utc::now();
        let capabilities = user.capabilities();
        let active_links = self.links.count_active_links(user.id).await?;
        capabilities.check(
            Requirement::LinkQuota {
                active_links,
                limits: &self.settings.plans,
            },
            now,
        )?;

        if self.settings.reject_duplicate_urls {
            let existing = self
                .links
                .count_links_by_long_url(&OwnerRef::account(user.id), &long_url)
                .await?;
            if existing > 0 {
                return Err(duplicate_url_conflict(&long_url));
            }
        }

        let guard = LinkInsertGuard {
            max_active_links: capabilities.link_cap(&self.settings.plans, now),
            unique_long_url: self.settings.reject_duplicate_urls,
        };

        let password_hash = process_new_password(req.password.as_deref())?;

        let template = NewLink {
            owner: *owner,
            code: String::new(),
            long_url,
            password_hash,
            created_at: now,
        };

        let link = match custom_code {
            Some(code) => self.insert_custom(template, code, guard).await?,
            None => self.insert_generated(template, guard).await?,
        };

        info!(
            "LinkService: user {} created '{}' -> '{}'",
            link.owner.user_id, link.code, link.long_url
        );
        Ok(link)
    }

    async fn insert_custom(
        &self,
        template: NewLink,
        code: &str,
        guard: LinkInsertGuard,
    ) -> Result<Link> {
        if self.links.get_link_by_code(code).await?.is_some() {
            return Err(LinkhubError::conflict(format!(
                "short code '{}' already exists",
                code
            )));
        }

        let link = NewLink {
            code: code.to_string(),
            ..template
        };
        let long_url = link.long_url.clone();
        self.links
            .create_link(link, guard)
            .await
            .map_err(|e| match e {
                LinkhubError::UniqueViolation(c) if c == LINK_OWNER_URL_CONSTRAINT => {
                    duplicate_url_conflict(&long_url)
                }
                LinkhubError::UniqueViolation(_) => {
                    LinkhubError::conflict(format!("short code '{}' already exists", code))
                }
                other => other,
            })
    }

    /// Random code path; reserved words count as taken
    async fn insert_generated(&self, template: NewLink, guard: LinkInsertGuard) -> Result<Link> {
        generate_unique(
            self.codes.as_ref(),
            self.settings.code_probe(),
            "short code",
            |code| async move {
                if self.settings.is_reserved(&code) {
                    return Ok(true);
                }
                Ok(self.links.get_link_by_code(&code).await?.is_some())
            },
            |code| {
                let link = NewLink {
                    code,
                    ..template.clone()
                };
                async move {
                    let long_url = link.long_url.clone();
                    // 只有短码冲突才交给 generate_unique 重试
                    self.links
                        .create_link(link, guard)
                        .await
                        .map_err(|e| match e {
                            LinkhubError::UniqueViolation(c) if c == LINK_OWNER_URL_CONSTRAINT => {
                                duplicate_url_conflict(&long_url)
                            }
                            other => other,
                        })
                }
            },
        )
        .await
    }

    /// Resolve a code to its target URL, counting the click
    pub async fn resolve_link(&self, code: &str) -> Result<String> {
        self.resolve_protected_link(code, None).await
    }

    /// Resolve a code, checking the access password when the link has one
    ///
    /// Unknown codes and failed password checks leave the link untouched.
    /// A successful resolution always counts exactly one click; if the
    /// increment fails the resolution fails with it.
    pub async fn resolve_protected_link(&self, code: &str, password: Option<&str>) -> Result<String> {
        let link = self
            .links
            .get_link_by_code(code)
            .await?
            .ok_or_else(|| LinkhubError::not_found(format!("short code '{}' not found", code)))?;

        if let Some(hash) = link.password_hash.as_deref() {
            let unlocked = match password {
                Some(p) if !p.is_empty() && is_argon2_hash(hash) => verify_password(p, hash)?,
                Some(p) if !p.is_empty() => {
                    warn!("Link '{}' has a stored password that is not an Argon2 hash", code);
                    false
                }
                _ => false,
            };
            if !unlocked {
                debug!("Rejected resolution of protected link '{}'", code);
                return Err(LinkhubError::unauthorized(
                    "this link requires a valid password",
                ));
            }
        }

        let tracked = self
            .links
            .increment_click(code, Utc::now())
            .await?
            .ok_or_else(|| LinkhubError::not_found(format!("short code '{}' not found", code)))?;

        Ok(tracked.long_url)
    }

    /// Links visible to `owner`, newest first
    pub async fn list_links_by_owner(&self, owner: &OwnerRef) -> Result<Vec<Link>> {
        self.links.list_links_by_owner(owner).await
    }

    /// A single link, if `owner` may see it
    pub async fn get_link(&self, owner: &OwnerRef, code: &str) -> Result<Link> {
        let link = self
            .links
            .get_link_by_code(code)
            .await?
            .ok_or_else(|| LinkhubError::not_found(format!("short code '{}' not found", code)))?;

        if !owner.covers(&link.owner) {
            return Err(LinkhubError::unauthorized("link belongs to another owner"));
        }
        Ok(link)
    }

    /// Soft-delete a link owned by `owner`
    pub async fn soft_delete_by_code(&self, owner: &OwnerRef, code: &str) -> Result<()> {
        let link = self
            .links
            .get_link_by_code(code)
            .await?
            .ok_or_else(|| LinkhubError::not_found(format!("short code '{}' not found", code)))?;

        if !owner.covers(&link.owner) {
            info!(
                "User {} attempted to delete '{}' owned by user {}",
                owner.user_id, code, link.owner.user_id
            );
            return Err(LinkhubError::unauthorized("link belongs to another owner"));
        }

        if !self.links.soft_delete_link(link.id, Utc::now()).await? {
            return Err(LinkhubError::not_found(format!(
                "short code '{}' not found",
                code
            )));
        }

        info!("LinkService: deleted '{}'", code);
        Ok(())
    }
}
