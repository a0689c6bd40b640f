//! Authentication and authorization module
//!
//! - Field checks on account input (`validation`)
//! - Token generation and validation (`jwt`)
//! - Password hashing with Argon2id (`password`)
//! - Token, session and account services (`service`)
//! - Identity resolution and role-tier gates (`middleware`)

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;
pub mod validation;

pub use jwt::{generate_access_token, validate_access_token, JwtConfig, JwtError};
pub use middleware::{
    user_authorized, user_has_permission, user_identity, CurrentIdentity, Gate,
};
pub use password::{hash_password, verify_password};
pub use service::{
    AccountService, ClientInfo, CreatedAccount, RefreshRequest, RefreshResponse, SignInRequest,
    SignInResponse, SignUpRequest, TokenPair, TokenService,
};
pub use validation::{CredentialPolicy, ValidationError};
