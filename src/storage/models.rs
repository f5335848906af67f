use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::policy::{Capabilities, Plan, Role};

/// 链接归属
///
/// 账户始终是所有者；`api_key_id` 记录创建链接时使用的 Key。
/// 作为调用方身份时，`api_key_id` 为 Some 表示只能看到该 Key 创建的链接。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub user_id: i64,
    pub api_key_id: Option<i64>,
}

impl OwnerRef {
    pub fn account(user_id: i64) -> Self {
        Self {
            user_id,
            api_key_id: None,
        }
    }

    pub fn api_key(user_id: i64, api_key_id: i64) -> Self {
        Self {
            user_id,
            api_key_id: Some(api_key_id),
        }
    }

    /// 调用方（self）是否有权操作归属为 `other` 的资源
    pub fn covers(&self, other: &OwnerRef) -> bool {
        if self.user_id != other.user_id {
            return false;
        }
        match self.api_key_id {
            None => true,
            Some(key_id) => other.api_key_id == Some(key_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub owner: OwnerRef,
    pub code: String,
    pub long_url: String,
    /// Argon2 哈希，不对外序列化
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub click_count: u64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn short_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.code)
    }
}

/// 待插入的链接
#[derive(Debug, Clone)]
pub struct NewLink {
    pub owner: OwnerRef,
    pub code: String,
    pub long_url: String,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub plan: Plan,
    pub role: Role,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            role: self.role,
            plan: self.plan,
            plan_expires_at: self.plan_expires_at,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub plan: Plan,
    pub role: Role,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub id: i64,
    pub user_id: i64,
    pub key: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// 只保留前 6 位用于展示
    pub fn masked(&self) -> String {
        let prefix: String = self.key.chars().take(6).collect();
        format!("{}…", prefix)
    }
}
