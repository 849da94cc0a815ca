//! Error taxonomy for keychain operations.
//!
//! Every operation surfaces its outcome synchronously as a [`KeychainResult`].
//! Absence of an item on lookup is not an error (it is `Ok(None)`); the only
//! deliberately swallowed status is "not found" on delete.

use thiserror::Error;

use crate::codec::CodecError;
use crate::policy::AccessControlError;

/// Result type alias for keychain operations.
pub type KeychainResult<T> = Result<T, KeychainError>;

/// Error outputs from `KeychainKit`.
///
/// None of these are retried by the facade. Whether an
/// [`KeychainError::AuthenticationFailed`] warrants re-prompting is the caller's
/// decision.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum KeychainError {
    /// The user or device failed, cancelled, or was blocked from an
    /// authentication challenge.
    #[error("authentication_failed")]
    AuthenticationFailed,
    /// No item is stored for the key. Only produced where absence is treated
    /// as a failure (see `CredentialStore::fetch`).
    #[error("item_not_found")]
    ItemNotFound,
    /// An item already exists for the exact scoped key.
    #[error("duplicate_item")]
    DuplicateItem,
    /// Bytes were present but malformed for the requested interpretation.
    #[error("invalid_data: {context}")]
    InvalidData {
        /// What was being interpreted.
        context: String,
    },
    /// A descriptor was rejected at construction.
    #[error("invalid_input '{parameter}': {reason}")]
    InvalidInput {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of the issue.
        reason: String,
    },
    /// A wrapped failure from a collaborator (access control or codec).
    #[error(transparent)]
    Underlying(#[from] UnderlyingError),
    /// Any other status reported by the secure-item service, carried opaquely.
    #[error("platform_status: {0}")]
    PlatformStatus(i32),
}

/// Failures raised by collaborators of the store rather than the store itself.
#[derive(Debug, Error)]
pub enum UnderlyingError {
    /// The platform refused to build an access-control policy.
    #[error("access_control: {0}")]
    AccessControl(#[from] AccessControlError),
    /// The codec could not encode or decode a value.
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
}

impl KeychainError {
    /// Creates an invalid data error.
    pub fn invalid_data<S: Into<String>>(context: S) -> Self {
        Self::InvalidData {
            context: context.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input<P: Into<String>, R: Into<String>>(parameter: P, reason: R) -> Self {
        Self::InvalidInput {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Returns the raw service status if this error carries one.
    #[must_use]
    pub const fn platform_status(&self) -> Option<i32> {
        match self {
            Self::PlatformStatus(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<AccessControlError> for KeychainError {
    fn from(error: AccessControlError) -> Self {
        Self::Underlying(error.into())
    }
}

impl From<CodecError> for KeychainError {
    fn from(error: CodecError) -> Self {
        Self::Underlying(error.into())
    }
}
