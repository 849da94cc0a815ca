//! FFI-safe records exchanged with Swift and Kotlin.
//!
//! The internal descriptor types keep their fields private and validate on
//! construction; these records are plain data that convert into them.

use crate::auth::AuthContext;
use crate::descriptor::{AccessConstraint, AccessConstraints, Account, Conjunction, ProtectionLevel};
use crate::error::KeychainResult;
use crate::policy::AccessPolicy;
use crate::service::ItemQuery;

/// Account descriptor as seen from the host.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AccountRecord {
    /// Non-empty account identifier.
    pub identifier: String,
    /// Accessibility policy applied at write time.
    pub protection_level: ProtectionLevel,
    /// Authentication requirements applied at write time.
    pub constraints: Vec<AccessConstraint>,
    /// How `constraints` combine when there is more than one.
    pub conjunction: Option<Conjunction>,
    /// Whether the item replicates through cloud sync.
    pub synchronizable: bool,
}

impl AccountRecord {
    /// Validates the record into an [`Account`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the identifier is empty.
    pub fn to_account(&self) -> KeychainResult<Account> {
        Ok(Account::new(self.identifier.clone())?
            .with_protection_level(self.protection_level)
            .with_access_constraints(AccessConstraints::from_parts(
                self.constraints.iter().copied(),
                self.conjunction,
            ))
            .with_synchronizable(self.synchronizable))
    }
}

/// Scoped key handed to the host service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, uniffi::Record)]
pub struct ItemQueryRecord {
    /// `kSecAttrAccount`
    pub account: String,
    /// `kSecAttrService`
    pub service: Option<String>,
    /// `kSecAttrAccessGroup`
    pub access_group: Option<String>,
    /// `kSecAttrSynchronizable`
    pub synchronizable: bool,
}

impl From<&ItemQuery<'_>> for ItemQueryRecord {
    fn from(query: &ItemQuery<'_>) -> Self {
        Self {
            account: query.account.to_string(),
            service: query.service.map(str::to_string),
            access_group: query.access_group.map(str::to_string),
            synchronizable: query.synchronizable,
        }
    }
}

/// Authentication session hints handed to the host service.
///
/// The host keeps one `LAContext` per `session` so repeated calls with the
/// same context reuse an authentication.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AuthHints {
    /// Session identity, shared by clones of one context.
    pub session: u64,
    /// `false` means the host must set `interactionNotAllowed` on its context.
    pub interaction_allowed: bool,
    /// Prompt text.
    pub localized_reason: Option<String>,
}

impl From<&AuthContext> for AuthHints {
    fn from(context: &AuthContext) -> Self {
        Self {
            session: context.session(),
            interaction_allowed: context.interaction_allowed(),
            localized_reason: context.localized_reason().map(str::to_string),
        }
    }
}

/// Access policy the host turns into a `SecAccessControl`.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AccessControlRecord {
    /// Accessibility level.
    pub protection_level: ProtectionLevel,
    /// Authentication requirements.
    pub constraints: Vec<AccessConstraint>,
    /// Combination of the requirements.
    pub conjunction: Option<Conjunction>,
}

impl From<&AccessPolicy> for AccessControlRecord {
    fn from(policy: &AccessPolicy) -> Self {
        Self {
            protection_level: policy.protection_level(),
            constraints: policy.constraints().iter().collect(),
            conjunction: policy.constraints().conjunction(),
        }
    }
}

/// Outcome of a host lookup: a raw status code plus the data, if any.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct LookupResult {
    /// `OSStatus` of the lookup; `0` on success.
    pub status: i32,
    /// Item data when the lookup succeeded.
    pub data: Option<Vec<u8>>,
}
