//! Request credential resolution
//!
//! A request moves through `Unauthenticated -> Resolved(identity) ->
//! Authorized`, or is rejected with 401 (no/bad credential) or 403 (role
//! gate). Resolution is one-shot; nothing is retried.

use std::sync::Arc;

use actix_web::{HttpRequest, http::header::{AUTHORIZATION, HeaderMap}};
use chrono::Utc;
use tracing::{debug, info, trace};

use super::jwt::JwtService;
use super::policy::{Capabilities, Requirement};
use crate::errors::{LinkhubError, Result};
use crate::storage::{OwnerRef, User, UserRepository};

/// 认证方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    ApiKey,
}

/// 路由接受哪些认证方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemePolicy {
    BearerOnly,
    ApiKeyOnly,
    /// 两者都带时优先使用 Bearer
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGate {
    Any,
    Admin,
}

/// 已认证的调用方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub owner: OwnerRef,
    pub capabilities: Capabilities,
    pub scheme: AuthScheme,
}

impl Identity {
    fn from_user(user: &User, owner: OwnerRef, scheme: AuthScheme) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            owner,
            capabilities: user.capabilities(),
            scheme,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.capabilities.is_admin()
    }
}

/// 从请求头中取出的原始凭据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// `Authorization` 头的原始值
    pub authorization: Option<String>,
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap, api_key_header: &str) -> Self {
        let read = |value: Option<&actix_web::http::header::HeaderValue>| {
            value
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            authorization: read(headers.get(AUTHORIZATION)),
            api_key: read(headers.get(api_key_header)),
        }
    }

    pub fn from_request(req: &HttpRequest, api_key_header: &str) -> Self {
        Self::from_headers(req.headers(), api_key_header)
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            authorization: Some(format!("Bearer {}", token.into())),
            api_key: None,
        }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            authorization: None,
            api_key: Some(key.into()),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.authorization.is_none() && self.api_key.is_none()
    }
}

/// 从 `Authorization` 头提取 Bearer token
fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub struct CredentialResolver {
    jwt: Arc<JwtService>,
    users: Arc<dyn UserRepository>,
}

impl CredentialResolver {
    pub fn new(jwt: Arc<JwtService>, users: Arc<dyn UserRepository>) -> Self {
        Self { jwt, users }
    }

    /// Authenticate, then apply the role gate.
    pub async fn authorize(
        &self,
        credentials: &Credentials,
        policy: SchemePolicy,
        gate: RoleGate,
    ) -> Result<Identity> {
        let identity = self.authenticate(credentials, policy).await?;
        Self::apply_gate(&identity, gate)?;
        Ok(identity)
    }

    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        policy: SchemePolicy,
    ) -> Result<Identity> {
        let authorization = credentials.authorization.as_deref();
        let api_key = credentials.api_key.as_deref();

        match (policy, authorization, api_key) {
            (SchemePolicy::BearerOnly | SchemePolicy::Either, Some(header), _) => {
                self.resolve_bearer(header, api_key).await
            }
            (SchemePolicy::ApiKeyOnly | SchemePolicy::Either, None, Some(key))
            | (SchemePolicy::ApiKeyOnly, Some(_), Some(key)) => self.resolve_api_key(key).await,
            (SchemePolicy::BearerOnly, None, _) => {
                debug!("Rejected request without authorization header");
                Err(LinkhubError::unauthorized("authorization header required"))
            }
            (SchemePolicy::ApiKeyOnly, _, None) => {
                debug!("Rejected request without API key");
                Err(LinkhubError::unauthorized("API key required"))
            }
            (SchemePolicy::Either, None, None) => {
                debug!("Rejected request without credentials");
                Err(LinkhubError::unauthorized("credentials required"))
            }
        }
    }

    pub fn apply_gate(identity: &Identity, gate: RoleGate) -> Result<()> {
        match gate {
            RoleGate::Any => Ok(()),
            RoleGate::Admin => identity
                .capabilities
                .check(Requirement::Admin, Utc::now())
                .inspect_err(|_| {
                    info!("User {} denied admin access", identity.user_id);
                }),
        }
    }

    async fn resolve_api_key(&self, key: &str) -> Result<Identity> {
        let api_key = self
            .users
            .get_api_key(key)
            .await?
            .ok_or_else(|| LinkhubError::unauthorized("invalid API key"))?;

        let user = self
            .users
            .get_user_by_id(api_key.user_id)
            .await?
            .ok_or_else(|| LinkhubError::unauthorized("invalid API key"))?;

        trace!("Authenticated user {} via API key {}", user.id, api_key.id);
        Ok(Identity::from_user(
            &user,
            OwnerRef::api_key(user.id, api_key.id),
            AuthScheme::ApiKey,
        ))
    }

    async fn resolve_bearer(&self, header: &str, secondary_key: Option<&str>) -> Result<Identity> {
        let token = extract_bearer_token(header)
            .ok_or_else(|| LinkhubError::invalid_token("invalid authorization header format"))?;

        let claims = self.jwt.validate_token(token).inspect_err(|e| {
            info!("Bearer token validation failed: {}", e);
        })?;
        let user_id = claims.user_id()?;

        let user = self
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| LinkhubError::unauthorized("account no longer exists"))?;

        let mut owner = OwnerRef::account(user.id);
        if let Some(key) = secondary_key {
            let api_key = self
                .users
                .get_api_key(key)
                .await?
                .ok_or_else(|| LinkhubError::unauthorized("invalid API key"))?;
            if api_key.user_id != user.id {
                info!(
                    "User {} presented API key {} owned by another account",
                    user.id, api_key.id
                );
                return Err(LinkhubError::unauthorized(
                    "API key does not belong to this account",
                ));
            }
            owner.api_key_id = Some(api_key.id);
        }

        trace!("Authenticated user {} via bearer token", user.id);
        Ok(Identity::from_user(&user, owner, AuthScheme::Bearer))
    }
}
