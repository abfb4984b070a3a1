//! The account under verification.

use std::fmt;

/// An account address and its secret.
///
/// Held only for the duration of one verification. The secret never appears
/// in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    address: String,
    secret: String,
}

impl Credential {
    #[must_use]
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The domain part of the address, if it has a non-empty one.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        let (local, domain) = self.address.rsplit_once('@')?;
        (!local.is_empty() && !domain.is_empty() && !domain.contains(char::is_whitespace))
            .then_some(domain)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .field("secret", &"***")
            .finish()
    }
}
