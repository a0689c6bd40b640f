//! Field-level checks on account creation input
//!
//! Fields are checked in a fixed order (email, password, phone number) and the
//! first failure is reported. Lengths are counted in characters.

use super::service::SignUpRequest;
use thiserror::Error;
use validator::{ValidateEmail, ValidateLength};

/// The first sign-up field that failed its check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid email")]
    Email,

    #[error("password must be at least {0} characters")]
    Password(u64),

    #[error("phone_number must be at least {0} characters")]
    PhoneNumber(u64),
}

impl ValidationError {
    /// Name of the offending request field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Email => "email",
            ValidationError::Password(_) => "password",
            ValidationError::PhoneNumber(_) => "phone_number",
        }
    }
}

/// Length thresholds applied to sign-up input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub min_password_len: u64,
    pub min_phone_len: u64,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            min_password_len: 4,
            min_phone_len: 10,
        }
    }
}

impl CredentialPolicy {
    /// Check a sign-up request, shared by user and moderator creation
    pub fn validate(&self, request: &SignUpRequest) -> Result<(), ValidationError> {
        if !request.email.validate_email() {
            return Err(ValidationError::Email);
        }
        if !request
            .password
            .validate_length(Some(self.min_password_len), None, None)
        {
            return Err(ValidationError::Password(self.min_password_len));
        }
        if !request
            .phone_number
            .validate_length(Some(self.min_phone_len), None, None)
        {
            return Err(ValidationError::PhoneNumber(self.min_phone_len));
        }
        Ok(())
    }
}
