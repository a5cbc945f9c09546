//! Auth credential, classified once at sign-in.
//!
//! The platform ships a "demo" credential that lets the product be explored
//! without a real account: every mutation is simulated and every
//! authenticated read returns placeholder data.  The variant is decided a
//! single time from the raw token and then threaded through as data, so no
//! call site ever re-derives demo-ness by string sniffing.

use serde::{Deserialize, Serialize};

use crate::constants::DEMO_TOKEN_PREFIX;

/// A bearer credential for the events platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Credential {
    /// A real token obtained via email-PIN verification or OAuth.
    Real(String),
    /// A synthetic demo token; the gateway short-circuits all calls.
    Demo(String),
}

impl Credential {
    /// Classify a raw token string.
    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.starts_with(DEMO_TOKEN_PREFIX) {
            Self::Demo(token)
        } else {
            Self::Real(token)
        }
    }

    /// The raw token value, regardless of variant.
    pub fn token(&self) -> &str {
        match self {
            Self::Real(t) | Self::Demo(t) => t,
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Self::Demo(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_prefix_classifies_once() {
        let demo = Credential::from_token("demo_auth_token_123");
        assert!(demo.is_demo());
        assert_eq!(demo.token(), "demo_auth_token_123");

        let real = Credential::from_token("eyJhbGciOi");
        assert!(!real.is_demo());
    }
}
