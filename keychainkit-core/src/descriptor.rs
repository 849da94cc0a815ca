//! Account and service descriptors.
//!
//! Descriptors identify stored items; they are not stored objects. The
//! persisted state lives entirely inside the secure-item service.

use std::collections::BTreeSet;

use strum::{Display, EnumString};

use crate::error::{KeychainError, KeychainResult};

/// When the service is allowed to release an item's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum ProtectionLevel {
    /// Readable once the device has been unlocked after boot.
    #[default]
    AfterFirstUnlock,
    /// As [`ProtectionLevel::AfterFirstUnlock`], never migrated to another device.
    AfterFirstUnlockThisDeviceOnly,
    /// Readable only while the device is unlocked.
    WhenUnlocked,
    /// As [`ProtectionLevel::WhenUnlocked`], never migrated to another device.
    WhenUnlockedThisDeviceOnly,
    /// Readable while unlocked, only if a passcode is set. Removed when the
    /// passcode is removed.
    WhenPasscodeSetThisDeviceOnly,
}

impl ProtectionLevel {
    /// Whether items at this level are bound to the current device.
    #[must_use]
    pub const fn is_this_device_only(self) -> bool {
        matches!(
            self,
            Self::AfterFirstUnlockThisDeviceOnly
                | Self::WhenUnlockedThisDeviceOnly
                | Self::WhenPasscodeSetThisDeviceOnly
        )
    }

    /// Whether the device must currently be unlocked to read items at this level.
    #[must_use]
    pub const fn requires_unlocked_device(self) -> bool {
        matches!(
            self,
            Self::WhenUnlocked | Self::WhenUnlockedThisDeviceOnly | Self::WhenPasscodeSetThisDeviceOnly
        )
    }
}

/// A single authentication requirement gating access to an item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum AccessConstraint {
    /// Biometry or passcode, whichever the device offers.
    UserPresence,
    /// Any enrolled biometry, surviving enrollment changes.
    BiometryAny,
    /// Biometry, invalidated when enrollment changes.
    BiometryCurrentSet,
    /// The device passcode.
    DevicePasscode,
}

/// How multiple [`AccessConstraint`]s combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Conjunction {
    /// Any one constraint satisfies the gate.
    Or,
    /// Every constraint must be satisfied.
    And,
}

/// The set of authentication requirements attached to an item at write time.
///
/// Defaults to no constraints. Whether a combination is acceptable is decided
/// when the access policy is built, not here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessConstraints {
    constraints: BTreeSet<AccessConstraint>,
    conjunction: Option<Conjunction>,
}

impl AccessConstraints {
    /// No authentication requirements.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A single requirement.
    #[must_use]
    pub fn single(constraint: AccessConstraint) -> Self {
        Self {
            constraints: BTreeSet::from([constraint]),
            conjunction: None,
        }
    }

    /// Satisfied by any one of `constraints`.
    pub fn any_of<I: IntoIterator<Item = AccessConstraint>>(constraints: I) -> Self {
        Self::from_parts(constraints, Some(Conjunction::Or))
    }

    /// Satisfied only when all of `constraints` are.
    pub fn all_of<I: IntoIterator<Item = AccessConstraint>>(constraints: I) -> Self {
        Self::from_parts(constraints, Some(Conjunction::And))
    }

    /// Builds a constraint set from raw parts without validation.
    pub fn from_parts<I: IntoIterator<Item = AccessConstraint>>(
        constraints: I,
        conjunction: Option<Conjunction>,
    ) -> Self {
        Self {
            constraints: constraints.into_iter().collect(),
            conjunction,
        }
    }

    /// Returns `true` if no authentication is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Number of distinct requirements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns `true` if `constraint` is part of the set.
    #[must_use]
    pub fn contains(&self, constraint: AccessConstraint) -> bool {
        self.constraints.contains(&constraint)
    }

    /// Iterates the requirements in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = AccessConstraint> + '_ {
        self.constraints.iter().copied()
    }

    /// The conjunction, if one was given.
    #[must_use]
    pub const fn conjunction(&self) -> Option<Conjunction> {
        self.conjunction
    }
}

/// Descriptor fields required to address and protect one stored item.
pub trait AccountDescriptor {
    /// Stable, non-empty identifier of the credential.
    fn identifier(&self) -> &str;

    /// Accessibility policy applied at write time.
    fn protection_level(&self) -> ProtectionLevel;

    /// Authentication requirements applied at write time.
    fn access_constraints(&self) -> &AccessConstraints;

    /// Whether the item replicates across the user's devices.
    fn synchronizable(&self) -> bool;
}

/// Descriptor fields required to scope items into a namespace.
pub trait ServiceDescriptor {
    /// Namespace identifier.
    fn identifier(&self) -> &str;

    /// Access group shared between isolated application contexts, if any.
    fn access_group(&self) -> Option<&str>;
}

/// Default-valued [`AccountDescriptor`].
///
/// ```
/// use keychainkit_core::{AccessConstraint, AccessConstraints, Account, ProtectionLevel};
///
/// let account = Account::new("refresh-token")?
///     .with_protection_level(ProtectionLevel::WhenUnlockedThisDeviceOnly)
///     .with_access_constraints(AccessConstraints::single(AccessConstraint::BiometryAny));
/// # Ok::<(), keychainkit_core::KeychainError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    identifier: String,
    protection_level: ProtectionLevel,
    access_constraints: AccessConstraints,
    synchronizable: bool,
}

impl Account {
    /// Creates an account with default protection, no constraints, not synchronized.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::InvalidInput`] if `identifier` is empty.
    pub fn new<S: Into<String>>(identifier: S) -> KeychainResult<Self> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(KeychainError::invalid_input(
                "account.identifier",
                "must not be empty",
            ));
        }
        Ok(Self {
            identifier,
            protection_level: ProtectionLevel::default(),
            access_constraints: AccessConstraints::none(),
            synchronizable: false,
        })
    }

    /// Sets the accessibility policy.
    #[must_use]
    pub const fn with_protection_level(mut self, level: ProtectionLevel) -> Self {
        self.protection_level = level;
        self
    }

    /// Sets the authentication requirements.
    #[must_use]
    pub fn with_access_constraints(mut self, constraints: AccessConstraints) -> Self {
        self.access_constraints = constraints;
        self
    }

    /// Sets whether the item replicates through the platform's cloud sync.
    #[must_use]
    pub const fn with_synchronizable(mut self, synchronizable: bool) -> Self {
        self.synchronizable = synchronizable;
        self
    }
}

impl AccountDescriptor for Account {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn protection_level(&self) -> ProtectionLevel {
        self.protection_level
    }

    fn access_constraints(&self) -> &AccessConstraints {
        &self.access_constraints
    }

    fn synchronizable(&self) -> bool {
        self.synchronizable
    }
}

/// Default-valued [`ServiceDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    identifier: String,
    access_group: Option<String>,
}

impl Service {
    /// Creates a service namespace without an access group.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::InvalidInput`] if `identifier` is empty.
    pub fn new<S: Into<String>>(identifier: S) -> KeychainResult<Self> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(KeychainError::invalid_input(
                "service.identifier",
                "must not be empty",
            ));
        }
        Ok(Self {
            identifier,
            access_group: None,
        })
    }

    /// Shares the namespace through `access_group`.
    #[must_use]
    pub fn with_access_group<S: Into<String>>(mut self, access_group: S) -> Self {
        self.access_group = Some(access_group.into());
        self
    }
}

impl ServiceDescriptor for Service {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn access_group(&self) -> Option<&str> {
        self.access_group.as_deref()
    }
}
