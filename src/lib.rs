//! Linkhub - multi-tenant URL shortener core
//!
//! This library provides link lifecycle management, credential resolution
//! and account administration for a URL shortening service. HTTP routing,
//! database mapping and process bootstrap live outside this crate; the
//! services here are wired with explicit configuration and any storage
//! implementing the repository traits.
//!
//! # Architecture
//! - `auth`: bearer token / API key resolution and the capability policy
//! - `services`: link and account operations
//! - `storage`: repository traits, models and the in-memory backend
//! - `config`: configuration loading
//! - `system`: logging setup
//! - `utils`: code generation, password hashing, input validation

pub mod auth;
pub mod config;
pub mod errors;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
