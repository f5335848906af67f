//! Authentication and authorization
//!
//! - `jwt`: bearer token issuing and validation
//! - `resolver`: turns request credentials into an [`Identity`]
//! - `policy`: role/plan capability checks

pub mod jwt;
pub mod policy;
pub mod resolver;

pub use jwt::{Claims, JwtService};
pub use policy::{Capabilities, Plan, Requirement, Role};
pub use resolver::{
    AuthScheme, CredentialResolver, Credentials, Identity, RoleGate, SchemePolicy,
};
