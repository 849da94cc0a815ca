//! The secure-item service the store talks to.
//!
//! This module defines the primitive operations the facade depends on. The
//! service owns persistence, encryption at rest, access-group isolation and
//! user authentication; the facade only builds scoped queries and interprets
//! status codes.
//!
//! # Implementations
//!
//! - [`MemoryService`]: in-process emulation of keychain semantics, for tests
//!   and hosts without a native keychain
//! - `AppleKeychain`: Keychain Services (`SecItem*`), behind the
//!   `platform-apple` feature on Apple targets
//! - `ForeignServiceAdapter`: a host-supplied service over UniFFI, behind the
//!   `ffi` feature

use std::fmt;
use std::sync::Arc;

use crate::auth::AuthContext;
use crate::descriptor::{AccessConstraints, AccountDescriptor, ProtectionLevel, ServiceDescriptor};
use crate::policy::AccessControlError;

pub mod memory;

pub use memory::{
    ApproveAll, AuthOutcome, Authenticator, DeviceLock, MemoryService, MAX_AUTHENTICATED_SESSIONS,
};

/// Keychain backend using Keychain Services.
#[cfg(all(feature = "platform-apple", target_vendor = "apple"))]
pub mod apple;

#[cfg(all(feature = "platform-apple", target_vendor = "apple"))]
pub use apple::AppleKeychain;

/// Raw status codes, numbered as Apple `OSStatus` values.
pub mod status {
    /// `errSecSuccess`
    pub const SUCCESS: i32 = 0;
    /// `errSecItemNotFound`
    pub const ITEM_NOT_FOUND: i32 = -25300;
    /// `errSecDuplicateItem`
    pub const DUPLICATE_ITEM: i32 = -25299;
    /// `errSecAuthFailed`
    pub const AUTH_FAILED: i32 = -25293;
    /// `errSecInteractionNotAllowed`
    pub const INTERACTION_NOT_ALLOWED: i32 = -25308;
    /// `errSecUserCanceled`
    pub const USER_CANCELED: i32 = -128;
    /// `errSecParam`
    pub const PARAM: i32 = -50;
    /// `errSecInternal`
    pub const INTERNAL: i32 = -26276;
}

/// A non-success status reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    /// No item matches the query.
    ItemNotFound,
    /// An item already exists for the scoped key.
    DuplicateItem,
    /// The authentication challenge failed.
    AuthFailed,
    /// Satisfying the query would require user interaction, which was disallowed.
    InteractionNotAllowed,
    /// The user dismissed the authentication prompt.
    UserCanceled,
    /// Any other status, kept verbatim.
    Other(i32),
}

impl ServiceStatus {
    /// Interprets a raw status code. `0` means success.
    ///
    /// # Errors
    ///
    /// Returns the decoded status for every non-zero code.
    pub const fn check(code: i32) -> Result<(), Self> {
        if code == status::SUCCESS {
            Ok(())
        } else {
            Err(Self::from_code(code))
        }
    }

    /// Decodes a non-success code. `0` maps to `Other(0)`.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            status::ITEM_NOT_FOUND => Self::ItemNotFound,
            status::DUPLICATE_ITEM => Self::DuplicateItem,
            status::AUTH_FAILED => Self::AuthFailed,
            status::INTERACTION_NOT_ALLOWED => Self::InteractionNotAllowed,
            status::USER_CANCELED => Self::UserCanceled,
            other => Self::Other(other),
        }
    }

    /// The raw status code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ItemNotFound => status::ITEM_NOT_FOUND,
            Self::DuplicateItem => status::DUPLICATE_ITEM,
            Self::AuthFailed => status::AUTH_FAILED,
            Self::InteractionNotAllowed => status::INTERACTION_NOT_ALLOWED,
            Self::UserCanceled => status::USER_CANCELED,
            Self::Other(code) => code,
        }
    }

    /// Auth failed, interaction not allowed, or user cancelled.
    #[must_use]
    pub const fn is_authentication_failure(self) -> bool {
        matches!(
            self,
            Self::AuthFailed | Self::InteractionNotAllowed | Self::UserCanceled
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemNotFound => write!(f, "item not found"),
            Self::DuplicateItem => write!(f, "duplicate item"),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::InteractionNotAllowed => write!(f, "interaction not allowed"),
            Self::UserCanceled => write!(f, "user canceled"),
            Self::Other(code) => write!(f, "status {code}"),
        }
    }
}

/// Scoped key addressing one generic-credential item.
///
/// Every field takes part in matching: the same account identifier under a
/// different service, access group or sync flag is a different item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemQuery<'a> {
    /// Account identifier.
    pub account: &'a str,
    /// Service identifier, `None` for the platform default namespace.
    pub service: Option<&'a str>,
    /// Access group, `None` for no sharing.
    pub access_group: Option<&'a str>,
    /// Whether the item is cloud-synchronized.
    pub synchronizable: bool,
}

impl<'a> ItemQuery<'a> {
    /// Builds the scoped key for `account` inside `service`.
    pub fn scoped<A, S>(account: &'a A, service: Option<&'a S>) -> Self
    where
        A: AccountDescriptor + ?Sized,
        S: ServiceDescriptor + ?Sized,
    {
        Self {
            account: account.identifier(),
            service: service.map(ServiceDescriptor::identifier),
            access_group: service.and_then(ServiceDescriptor::access_group),
            synchronizable: account.synchronizable(),
        }
    }
}

/// Primitive operations of a secure-credential service.
///
/// Methods return `Err(ServiceStatus)` for every non-success status; mapping
/// statuses onto the store's error taxonomy happens in the facade.
pub trait SecureItemService: Send + Sync {
    /// Native access-control object attached to items on write.
    type AccessControl;

    /// Builds the access-control object for a protection level and constraints.
    ///
    /// # Errors
    ///
    /// Returns an [`AccessControlError`] if the platform rejects the combination.
    fn create_access_control(
        &self,
        protection_level: ProtectionLevel,
        constraints: &AccessConstraints,
    ) -> Result<Self::AccessControl, AccessControlError>;

    /// Looks up one item and returns its data.
    ///
    /// `Ok(None)` means the lookup succeeded without a data payload.
    ///
    /// # Errors
    ///
    /// Returns the service status for not-found, authentication and other failures.
    fn copy_matching(
        &self,
        query: &ItemQuery<'_>,
        context: Option<&AuthContext>,
    ) -> Result<Option<Vec<u8>>, ServiceStatus>;

    /// Adds a new item. Never replaces an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceStatus::DuplicateItem`] if the key is taken.
    fn add(
        &self,
        query: &ItemQuery<'_>,
        value: &[u8],
        access_control: &Self::AccessControl,
    ) -> Result<(), ServiceStatus>;

    /// Deletes the item at the scoped key.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceStatus::ItemNotFound`] if nothing matched.
    fn delete(
        &self,
        query: &ItemQuery<'_>,
        context: Option<&AuthContext>,
    ) -> Result<(), ServiceStatus>;

    /// Looks up one item without returning data.
    ///
    /// # Errors
    ///
    /// Returns the service status for not-found and gated items.
    fn contains(&self, query: &ItemQuery<'_>, context: &AuthContext)
        -> Result<(), ServiceStatus>;
}

impl<S: SecureItemService> SecureItemService for Arc<S> {
    type AccessControl = S::AccessControl;

    fn create_access_control(
        &self,
        protection_level: ProtectionLevel,
        constraints: &AccessConstraints,
    ) -> Result<Self::AccessControl, AccessControlError> {
        (**self).create_access_control(protection_level, constraints)
    }

    fn copy_matching(
        &self,
        query: &ItemQuery<'_>,
        context: Option<&AuthContext>,
    ) -> Result<Option<Vec<u8>>, ServiceStatus> {
        (**self).copy_matching(query, context)
    }

    fn add(
        &self,
        query: &ItemQuery<'_>,
        value: &[u8],
        access_control: &Self::AccessControl,
    ) -> Result<(), ServiceStatus> {
        (**self).add(query, value, access_control)
    }

    fn delete(
        &self,
        query: &ItemQuery<'_>,
        context: Option<&AuthContext>,
    ) -> Result<(), ServiceStatus> {
        (**self).delete(query, context)
    }

    fn contains(
        &self,
        query: &ItemQuery<'_>,
        context: &AuthContext,
    ) -> Result<(), ServiceStatus> {
        (**self).contains(query, context)
    }
}
