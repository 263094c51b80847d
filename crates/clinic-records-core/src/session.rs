//! Single-credential sign-in gate.
//!
//! This is a convenience gate for a single clinician, not an access-control
//! system. Signing in yields a [`SessionContext`] value that the UI shell
//! holds and passes around; nothing is stored by the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

/// Email accepted when none is configured.
pub const DEFAULT_LOGIN_EMAIL: &str = "doc@gmail.com";
/// Password accepted when none is configured.
pub const DEFAULT_LOGIN_PASSWORD: &str = "Admin-Doc";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid email or password")]
    InvalidCredentials,
}

/// The one credential pair that may sign in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_EMAIL, DEFAULT_LOGIN_PASSWORD)
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Check a sign-in attempt. Email is compared case-insensitively, the
    /// password exactly.
    pub fn sign_in(
        &self,
        email: &str,
        password: &str,
        clock: &dyn Clock,
    ) -> Result<SessionContext, SessionError> {
        if email.to_lowercase() != self.email.to_lowercase() || password != self.password {
            tracing::warn!("rejected sign-in attempt");
            return Err(SessionError::InvalidCredentials);
        }

        tracing::info!("clinician signed in");
        Ok(SessionContext {
            email: self.email.clone(),
            signed_in_at: clock.now(),
        })
    }
}

/// Proof of a successful sign-in, owned by the UI shell.
///
/// Dropping the value is signing out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionContext {
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}
