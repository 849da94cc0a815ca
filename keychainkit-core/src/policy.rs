//! Access-control policy derivation.
//!
//! An [`AccessPolicy`] is derived from an account's protection level and
//! constraints right before a write. Backends that build a native policy object
//! (e.g. `SecAccessControl`) start from a validated `AccessPolicy`.

use thiserror::Error;

use crate::descriptor::{AccessConstraint, AccessConstraints, ProtectionLevel};
use crate::service::status;

/// The platform refused to build an access-control policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access control rejected ({code}): {message}")]
pub struct AccessControlError {
    code: i32,
    message: String,
}

impl AccessControlError {
    /// Creates an error from a native status code and message.
    pub fn new<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Native status code reported while building the policy.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Human readable reason.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A validated description of what authentication an item requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    protection_level: ProtectionLevel,
    constraints: AccessConstraints,
}

impl AccessPolicy {
    /// Derives a policy, rejecting constraint combinations the keychain refuses.
    ///
    /// # Rules
    ///
    /// - a conjunction needs at least one constraint
    /// - two or more constraints need an explicit conjunction
    /// - `UserPresence` already means "biometry or passcode" and is not combinable
    ///
    /// # Errors
    ///
    /// Returns an [`AccessControlError`] with the invalid-parameter status (`-50`).
    pub fn new(
        protection_level: ProtectionLevel,
        constraints: &AccessConstraints,
    ) -> Result<Self, AccessControlError> {
        Self::validate(constraints)?;
        Ok(Self {
            protection_level,
            constraints: constraints.clone(),
        })
    }

    fn validate(constraints: &AccessConstraints) -> Result<(), AccessControlError> {
        let count = constraints.len();
        if count == 0 && constraints.conjunction().is_some() {
            return Err(AccessControlError::new(
                status::PARAM,
                "conjunction given without constraints",
            ));
        }
        if count > 1 && constraints.conjunction().is_none() {
            return Err(AccessControlError::new(
                status::PARAM,
                "multiple constraints require an explicit conjunction",
            ));
        }
        if count > 1 && constraints.contains(AccessConstraint::UserPresence) {
            return Err(AccessControlError::new(
                status::PARAM,
                "user_presence cannot be combined with other constraints",
            ));
        }
        Ok(())
    }

    /// Accessibility level of the item.
    #[must_use]
    pub const fn protection_level(&self) -> ProtectionLevel {
        self.protection_level
    }

    /// Authentication requirements of the item.
    #[must_use]
    pub const fn constraints(&self) -> &AccessConstraints {
        &self.constraints
    }

    /// Whether reading the item may challenge the user.
    #[must_use]
    pub fn requires_authentication(&self) -> bool {
        !self.constraints.is_empty()
    }
}
