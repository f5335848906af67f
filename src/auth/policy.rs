//! 账户能力策略
//!
//! 角色、套餐及其过期时间组成一条能力记录，所有权限判断
//! （管理员门槛、链接配额）都通过 [`Capabilities::check`] 完成。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::config::PlanLimits;
use crate::errors::{LinkhubError, Result};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Plan {
    #[default]
    Free,
    Pro,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub role: Role,
    pub plan: Plan,
    pub plan_expires_at: Option<DateTime<Utc>>,
}

/// 需要检查的权限
#[derive(Debug, Clone, Copy)]
pub enum Requirement<'a> {
    /// 管理员接口
    Admin,
    /// 再创建一条链接，`active_links` 为当前未删除链接数
    LinkQuota {
        active_links: u64,
        limits: &'a PlanLimits,
    },
}

impl Capabilities {
    /// 在 `now` 时刻实际生效的套餐；过期的付费套餐按免费套餐计算
    pub fn effective_plan(&self, now: DateTime<Utc>) -> Plan {
        match self.plan_expires_at {
            Some(expires_at) if expires_at <= now => Plan::Free,
            _ => self.plan,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 当前生效套餐的有效链接上限；`None` 表示不限
    pub fn link_cap(&self, limits: &PlanLimits, now: DateTime<Utc>) -> Option<u64> {
        if !limits.enforce {
            return None;
        }
        limits.max_links(self.effective_plan(now))
    }

    /// 唯一的权限判断入口
    pub fn check(&self, requirement: Requirement<'_>, now: DateTime<Utc>) -> Result<()> {
        match requirement {
            Requirement::Admin => {
                if self.is_admin() {
                    Ok(())
                } else {
                    Err(LinkhubError::forbidden("admin role required"))
                }
            }
            Requirement::LinkQuota {
                active_links,
                limits,
            } => match self.link_cap(limits, now) {
                Some(max) if active_links >= max => Err(LinkhubError::limit_exceeded(format!(
                    "{} plan link limit of {} reached",
                    self.effective_plan(now),
                    max
                ))),
                _ => Ok(()),
            },
        }
    }
}
