//! Service layer for business logic
//!
//! - `link_service`: link lifecycle (create, resolve, list, delete)
//! - `account_service`: registration, login, users and API keys

mod account_service;
mod link_service;

pub use account_service::*;
pub use link_service::*;
