//! Account administration service
//!
//! Registration, login, admin-side user provisioning and API key
//! management. Every caller-facing operation takes the [`Identity`]
//! produced by the credential resolver.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::policy::{Plan, Requirement, Role};
use crate::auth::{Identity, JwtService};
use crate::config::AuthSettings;
use crate::errors::{LinkhubError, Result};
use crate::storage::{NewUser, User, UserRepository};
use crate::utils::password::{
    dummy_verify, hash_password, is_argon2_hash, process_new_password, verify_password,
};
use crate::utils::validation::is_acceptable_password;
use crate::utils::{CodeSource, RandomCodeSource, generate_unique, is_valid_email, normalize_email};

// ============ DTOs ============

/// 登录/注册成功后的会话
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// 管理员创建用户的结果；只有设置了密码才签发 token
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUser {
    pub user: User,
    pub token: Option<String>,
}

/// 新签发的 API Key，明文只在这里出现一次
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKey {
    pub id: i64,
    pub user_id: i64,
    pub key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeySummary {
    pub id: i64,
    pub masked_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: Option<String>,
    pub plan: Plan,
    pub role: Role,
    pub plan_expires_at: Option<DateTime<Utc>>,
}

// ============ AccountService ============

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    jwt: Arc<JwtService>,
    settings: AuthSettings,
    keys: Arc<dyn CodeSource>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, jwt: Arc<JwtService>, settings: AuthSettings) -> Self {
        Self {
            users,
            jwt,
            settings,
            keys: Arc::new(RandomCodeSource),
        }
    }

    /// Replace the random API key source
    pub fn with_code_source(mut self, keys: Arc<dyn CodeSource>) -> Self {
        self.keys = keys;
        self
    }

    fn require_admin(caller: &Identity) -> Result<()> {
        caller
            .capabilities
            .check(Requirement::Admin, Utc::now())
            .inspect_err(|_| {
                info!("User {} denied admin operation", caller.user_id);
            })
    }

    fn checked_email(email: &str) -> Result<String> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(LinkhubError::validation(format!(
                "invalid email address '{}'",
                email
            )));
        }
        Ok(email)
    }

    fn checked_password(password: &str) -> Result<()> {
        if !is_acceptable_password(password) {
            return Err(LinkhubError::validation(
                "password must be at least 6 characters",
            ));
        }
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let email = user.email.clone();
        if self.users.get_user_by_email(&email).await?.is_some() {
            return Err(LinkhubError::conflict(format!(
                "email '{}' is already registered",
                email
            )));
        }
        self.users.create_user(user).await.map_err(|e| match e {
            LinkhubError::UniqueViolation(_) => {
                LinkhubError::conflict(format!("email '{}' is already registered", email))
            }
            other => other,
        })
    }

    // ============ Self-service ============

    /// Register a new free-plan user and sign them in
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = Self::checked_email(email)?;
        Self::checked_password(password)?;

        let user = self
            .insert_user(NewUser {
                email,
                password_hash: Some(hash_password(password)?),
                plan: Plan::Free,
                role: Role::User,
                plan_expires_at: None,
                created_at: Utc::now(),
            })
            .await?;

        let token = self.jwt.issue_token(user.id, &user.email)?;
        info!("AccountService: registered user {} ({})", user.id, user.email);
        Ok(AuthSession { user, token })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = normalize_email(email);
        let user = match self.users.get_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                dummy_verify(password);
                warn!("Login failed: unknown account");
                return Err(LinkhubError::unauthorized("invalid email or password"));
            }
        };

        let verified = match user.password_hash.as_deref() {
            Some(hash) if is_argon2_hash(hash) => verify_password(password, hash)?,
            Some(_) => {
                warn!("User {} has a stored password that is not an Argon2 hash", user.id);
                dummy_verify(password);
                false
            }
            None => {
                dummy_verify(password);
                false
            }
        };
        if !verified {
            warn!("Login failed for user {}", user.id);
            return Err(LinkhubError::unauthorized("invalid email or password"));
        }

        let token = self.jwt.issue_token(user.id, &user.email)?;
        info!("AccountService: user {} logged in", user.id);
        Ok(AuthSession { user, token })
    }

    // ============ API keys ============

    /// Issue a new API key for `user_id`; the caller must be that user or an admin
    pub async fn create_api_key(&self, caller: &Identity, user_id: i64) -> Result<IssuedApiKey> {
        if caller.user_id != user_id {
            Self::require_admin(caller)?;
        }

        if self.users.get_user_by_id(user_id).await?.is_none() {
            return Err(LinkhubError::not_found(format!("user {} not found", user_id)));
        }

        let now = Utc::now();
        let api_key = generate_unique(
            self.keys.as_ref(),
            self.settings.api_key_probe(),
            "API key",
            |key| async move { Ok(self.users.get_api_key(&key).await?.is_some()) },
            |key| async move { self.users.create_api_key(user_id, &key, now).await },
        )
        .await?;

        info!(
            "AccountService: issued API key {} for user {}",
            api_key.id, api_key.user_id
        );
        Ok(IssuedApiKey {
            id: api_key.id,
            user_id: api_key.user_id,
            key: api_key.key,
            created_at: api_key.created_at,
        })
    }

    /// The caller's live keys, masked
    pub async fn list_api_keys(&self, caller: &Identity) -> Result<Vec<ApiKeySummary>> {
        let keys = self.users.list_api_keys(caller.user_id).await?;
        Ok(keys
            .iter()
            .map(|k| ApiKeySummary {
                id: k.id,
                masked_key: k.masked(),
                created_at: k.created_at,
            })
            .collect())
    }

    pub async fn revoke_api_key(&self, caller: &Identity, key_id: i64) -> Result<()> {
        let api_key = self
            .users
            .get_api_key_by_id(key_id)
            .await?
            .ok_or_else(|| LinkhubError::not_found(format!("API key {} not found", key_id)))?;

        if api_key.user_id != caller.user_id && !caller.is_admin() {
            info!(
                "User {} attempted to revoke API key {} of user {}",
                caller.user_id, key_id, api_key.user_id
            );
            return Err(LinkhubError::unauthorized("API key belongs to another account"));
        }

        if !self.users.soft_delete_api_key(key_id, Utc::now()).await? {
            return Err(LinkhubError::not_found(format!("API key {} not found", key_id)));
        }

        info!("AccountService: revoked API key {}", key_id);
        Ok(())
    }

    // ============ Admin ============

    pub async fn create_user(&self, caller: &Identity, req: CreateUserRequest) -> Result<CreatedUser> {
        Self::require_admin(caller)?;

        let email = Self::checked_email(&req.email)?;
        let password = req.password.as_deref().filter(|p| !p.is_empty());
        if let Some(password) = password {
            Self::checked_password(password)?;
        }

        let user = self
            .insert_user(NewUser {
                email,
                password_hash: process_new_password(password)?,
                plan: req.plan,
                role: req.role,
                plan_expires_at: req.plan_expires_at,
                created_at: Utc::now(),
            })
            .await?;

        let token = match password {
            Some(_) => Some(self.jwt.issue_token(user.id, &user.email)?),
            None => None,
        };

        info!(
            "AccountService: admin {} created user {} (role={}, plan={})",
            caller.user_id, user.id, user.role, user.plan
        );
        Ok(CreatedUser { user, token })
    }

    pub async fn update_plan(
        &self,
        caller: &Identity,
        user_id: i64,
        plan: Plan,
        plan_expires_at: Option<DateTime<Utc>>,
    ) -> Result<User> {
        Self::require_admin(caller)?;

        let user = self
            .users
            .update_plan(user_id, plan, plan_expires_at, Utc::now())
            .await?
            .ok_or_else(|| LinkhubError::not_found(format!("user {} not found", user_id)))?;

        info!(
            "AccountService: user {} moved to plan {} (expires {:?})",
            user.id, user.plan, user.plan_expires_at
        );
        Ok(user)
    }

    /// Soft-delete an account; its API keys stop resolving with it
    pub async fn soft_delete_user(&self, caller: &Identity, user_id: i64) -> Result<()> {
        Self::require_admin(caller)?;

        if caller.user_id == user_id {
            return Err(LinkhubError::validation(
                "administrators cannot delete their own account",
            ));
        }

        if !self.users.soft_delete_user(user_id, Utc::now()).await? {
            return Err(LinkhubError::not_found(format!("user {} not found", user_id)));
        }

        info!("AccountService: admin {} deleted user {}", caller.user_id, user_id);
        Ok(())
    }
}
