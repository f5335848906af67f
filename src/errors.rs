use std::fmt;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkhubError {
    Conflict(String),
    RetriesExhausted(String),
    NotFound(String),
    Unauthorized(String),
    ExpiredToken(String),
    InvalidToken(String),
    Forbidden(String),
    LimitExceeded(String),
    Validation(String),
    UniqueViolation(String),
    Storage(String),
    PasswordHash(String),
    TokenSigning(String),
    Config(String),
}

/// 对外暴露的错误分类，每个分类对应一个稳定的 HTTP 状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    RetriesExhausted,
    NotFound,
    Unauthorized,
    Forbidden,
    Validation,
    Infrastructure,
}

impl LinkhubError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkhubError::Conflict(_) => "E001",
            LinkhubError::RetriesExhausted(_) => "E002",
            LinkhubError::NotFound(_) => "E003",
            LinkhubError::Unauthorized(_) => "E004",
            LinkhubError::ExpiredToken(_) => "E005",
            LinkhubError::InvalidToken(_) => "E006",
            LinkhubError::Forbidden(_) => "E007",
            LinkhubError::LimitExceeded(_) => "E008",
            LinkhubError::Validation(_) => "E009",
            LinkhubError::UniqueViolation(_) => "E010",
            LinkhubError::Storage(_) => "E011",
            LinkhubError::PasswordHash(_) => "E012",
            LinkhubError::TokenSigning(_) => "E013",
            LinkhubError::Config(_) => "E014",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkhubError::Conflict(_) => "Conflict",
            LinkhubError::RetriesExhausted(_) => "Retries Exhausted",
            LinkhubError::NotFound(_) => "Resource Not Found",
            LinkhubError::Unauthorized(_) => "Unauthorized",
            LinkhubError::ExpiredToken(_) => "Expired Token",
            LinkhubError::InvalidToken(_) => "Invalid Token",
            LinkhubError::Forbidden(_) => "Forbidden",
            LinkhubError::LimitExceeded(_) => "Limit Exceeded",
            LinkhubError::Validation(_) => "Validation Error",
            LinkhubError::UniqueViolation(_) => "Unique Constraint Violation",
            LinkhubError::Storage(_) => "Storage Error",
            LinkhubError::PasswordHash(_) => "Password Hash Error",
            LinkhubError::TokenSigning(_) => "Token Signing Error",
            LinkhubError::Config(_) => "Configuration Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkhubError::Conflict(msg)
            | LinkhubError::RetriesExhausted(msg)
            | LinkhubError::NotFound(msg)
            | LinkhubError::Unauthorized(msg)
            | LinkhubError::ExpiredToken(msg)
            | LinkhubError::InvalidToken(msg)
            | LinkhubError::Forbidden(msg)
            | LinkhubError::LimitExceeded(msg)
            | LinkhubError::Validation(msg)
            | LinkhubError::UniqueViolation(msg)
            | LinkhubError::Storage(msg)
            | LinkhubError::PasswordHash(msg)
            | LinkhubError::TokenSigning(msg)
            | LinkhubError::Config(msg) => msg,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkhubError::Conflict(_) | LinkhubError::UniqueViolation(_) => ErrorKind::Conflict,
            LinkhubError::RetriesExhausted(_) => ErrorKind::RetriesExhausted,
            LinkhubError::NotFound(_) => ErrorKind::NotFound,
            LinkhubError::Unauthorized(_)
            | LinkhubError::ExpiredToken(_)
            | LinkhubError::InvalidToken(_) => ErrorKind::Unauthorized,
            LinkhubError::Forbidden(_) | LinkhubError::LimitExceeded(_) => ErrorKind::Forbidden,
            LinkhubError::Validation(_) => ErrorKind::Validation,
            LinkhubError::Storage(_)
            | LinkhubError::PasswordHash(_)
            | LinkhubError::TokenSigning(_)
            | LinkhubError::Config(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkhubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkhubError {}

// 便捷的构造函数
impl LinkhubError {
    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        LinkhubError::Conflict(msg.into())
    }

    pub fn retries_exhausted<T: Into<String>>(msg: T) -> Self {
        LinkhubError::RetriesExhausted(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkhubError::NotFound(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        LinkhubError::Unauthorized(msg.into())
    }

    pub fn expired_token<T: Into<String>>(msg: T) -> Self {
        LinkhubError::ExpiredToken(msg.into())
    }

    pub fn invalid_token<T: Into<String>>(msg: T) -> Self {
        LinkhubError::InvalidToken(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        LinkhubError::Forbidden(msg.into())
    }

    pub fn limit_exceeded<T: Into<String>>(msg: T) -> Self {
        LinkhubError::LimitExceeded(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkhubError::Validation(msg.into())
    }

    pub fn unique_violation<T: Into<String>>(msg: T) -> Self {
        LinkhubError::UniqueViolation(msg.into())
    }

    pub fn storage<T: Into<String>>(msg: T) -> Self {
        LinkhubError::Storage(msg.into())
    }

    pub fn password_hash<T: Into<String>>(msg: T) -> Self {
        LinkhubError::PasswordHash(msg.into())
    }

    pub fn token_signing<T: Into<String>>(msg: T) -> Self {
        LinkhubError::TokenSigning(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        LinkhubError::Config(msg.into())
    }
}

/// HTTP 错误响应体
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    error: &'a str,
}

impl ResponseError for LinkhubError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::RetriesExhausted => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // 基础设施错误不暴露内部细节
        let error = if self.is_infrastructure() {
            "Internal server error"
        } else {
            self.message()
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            code: self.code(),
            error,
        })
    }
}

// 为常见的错误类型实现 From trait
impl From<serde_json::Error> for LinkhubError {
    fn from(err: serde_json::Error) -> Self {
        LinkhubError::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for LinkhubError {
    fn from(err: config::ConfigError) -> Self {
        LinkhubError::Config(err.to_string())
    }
}

impl From<crate::utils::password::PasswordError> for LinkhubError {
    fn from(err: crate::utils::password::PasswordError) -> Self {
        LinkhubError::PasswordHash(err.to_string())
    }
}

impl From<crate::utils::validation::UrlValidationError> for LinkhubError {
    fn from(err: crate::utils::validation::UrlValidationError) -> Self {
        LinkhubError::Validation(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for LinkhubError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
        match err.kind() {
            JwtErrorKind::ExpiredSignature => LinkhubError::ExpiredToken("token expired".into()),
            _ => LinkhubError::InvalidToken(format!("invalid token: {}", err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkhubError>;
