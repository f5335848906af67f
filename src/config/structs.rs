use serde::{Deserialize, Serialize};

use crate::auth::policy::Plan;
use crate::errors::{LinkhubError, Result};
use crate::utils::ProbeSettings;

/// 应用配置
///
/// 启动时加载一次，之后以显式参数的形式传给各个服务：
/// - auth: JWT 密钥、令牌有效期、API Key 生成参数
/// - links: 短码生成参数、保留短码、套餐配额
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub links: LinkSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 从 `linkhub.toml`（可选）和环境变量加载配置
    ///
    /// 优先级：ENV > linkhub.toml > 默认值
    /// ENV 前缀：LINKHUB，分隔符：__
    /// 示例：LINKHUB__LINKS__CODE_LENGTH=8
    pub fn load() -> Result<Self> {
        // .env 只是便利，不存在时忽略
        let _ = dotenvy::dotenv();
        Self::load_from("linkhub.toml")
    }

    pub fn load_from<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        use config::{Config, Environment, File};

        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("LINKHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 检查取值范围，不合法的配置属于启动期致命错误
    pub fn validate(&self) -> Result<()> {
        if self.links.code_length == 0 {
            return Err(LinkhubError::config("links.code_length must be positive"));
        }
        if self.links.max_attempts == 0 {
            return Err(LinkhubError::config("links.max_attempts must be positive"));
        }
        if self.auth.api_key_length < 16 {
            return Err(LinkhubError::config(
                "auth.api_key_length must be at least 16",
            ));
        }
        if self.auth.api_key_max_attempts == 0 {
            return Err(LinkhubError::config(
                "auth.api_key_max_attempts must be positive",
            ));
        }
        if self.auth.token_ttl_minutes == 0 {
            return Err(LinkhubError::config(
                "auth.token_ttl_minutes must be positive",
            ));
        }
        if self.auth.api_key_header.trim().is_empty() {
            return Err(LinkhubError::config("auth.api_key_header must not be empty"));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("# Error generating sample config: {}", e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HS256 对称密钥；为空时启动会生成随机密钥
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default = "default_api_key_length")]
    pub api_key_length: usize,
    #[serde(default = "default_max_attempts")]
    pub api_key_max_attempts: u32,
}

impl AuthSettings {
    pub fn api_key_probe(&self) -> ProbeSettings {
        ProbeSettings {
            length: self.api_key_length,
            max_attempts: self.api_key_max_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 同一所有者对同一目标 URL 只允许一条有效链接
    #[serde(default)]
    pub reject_duplicate_urls: bool,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_reserved_codes")]
    pub reserved_codes: Vec<String>,
    #[serde(default)]
    pub plans: PlanLimits,
}

impl LinkSettings {
    pub fn code_probe(&self) -> ProbeSettings {
        ProbeSettings {
            length: self.code_length,
            max_attempts: self.max_attempts,
        }
    }

    pub fn is_reserved(&self, code: &str) -> bool {
        self.reserved_codes
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(code))
    }
}

/// 各套餐的有效链接上限，`None` 表示不限
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLimits {
    #[serde(default = "default_true")]
    pub enforce: bool,
    #[serde(default = "default_free_max_links")]
    pub free_max_links: Option<u64>,
    #[serde(default)]
    pub pro_max_links: Option<u64>,
}

impl PlanLimits {
    pub fn max_links(&self, plan: Plan) -> Option<u64> {
        match plan {
            Plan::Free => self.free_max_links,
            Plan::Pro => self.pro_max_links,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default)]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_token_ttl_minutes() -> u64 {
    24 * 60
}

fn default_api_key_header() -> String {
    "X-API-KEY".to_string()
}

fn default_api_key_length() -> usize {
    32
}

fn default_max_attempts() -> u32 {
    5
}

fn default_code_length() -> usize {
    6
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_reserved_codes() -> Vec<String> {
    ["api", "admin", "health", "login", "register", "shorten"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_free_max_links() -> Option<u64> {
    Some(10)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_minutes: default_token_ttl_minutes(),
            api_key_header: default_api_key_header(),
            api_key_length: default_api_key_length(),
            api_key_max_attempts: default_max_attempts(),
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            max_attempts: default_max_attempts(),
            reject_duplicate_urls: false,
            public_base_url: default_public_base_url(),
            reserved_codes: default_reserved_codes(),
            plans: PlanLimits::default(),
        }
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            enforce: default_true(),
            free_max_links: default_free_max_links(),
            pro_max_links: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: false,
        }
    }
}
