//! Host-implemented secure-item service.

use std::sync::Arc;

use super::types::{AccessControlRecord, AuthHints, ItemQueryRecord, LookupResult};
use crate::auth::AuthContext;
use crate::descriptor::{AccessConstraints, ProtectionLevel};
use crate::policy::{AccessControlError, AccessPolicy};
use crate::service::{ItemQuery, SecureItemService, ServiceStatus};

/// Secure-item service implemented by the host (typically over `SecItem*`).
///
/// Every method returns the raw `OSStatus` of the underlying call; the store
/// translates statuses into `KeychainError`s.
///
/// # Swift
///
/// ```swift
/// final class SecItemService: ForeignItemService {
///     func delete(query: ItemQueryRecord, auth: AuthHints?) -> Int32 {
///         SecItemDelete(query.dictionary(auth: auth) as CFDictionary)
///     }
///     // ...
/// }
/// ```
#[uniffi::export(with_foreign)]
pub trait ForeignItemService: Send + Sync {
    /// `SecItemCopyMatching` returning data for one item.
    fn copy_matching(&self, query: ItemQueryRecord, auth: Option<AuthHints>) -> LookupResult;

    /// `SecItemAdd` with `kSecAttrAccessControl` built from `access_control`.
    fn add(&self, query: ItemQueryRecord, value: Vec<u8>, access_control: AccessControlRecord)
        -> i32;

    /// `SecItemDelete`.
    fn delete(&self, query: ItemQueryRecord, auth: Option<AuthHints>) -> i32;

    /// `SecItemCopyMatching` without returning data.
    fn contains(&self, query: ItemQueryRecord, auth: AuthHints) -> i32;
}

/// Adapts a [`ForeignItemService`] to [`SecureItemService`].
///
/// Access policies are validated on the Rust side; the host receives them as
/// [`AccessControlRecord`]s.
pub struct ForeignServiceAdapter {
    inner: Arc<dyn ForeignItemService>,
}

impl ForeignServiceAdapter {
    /// Wraps a host service.
    #[must_use]
    pub fn new(inner: Arc<dyn ForeignItemService>) -> Self {
        Self { inner }
    }
}

impl SecureItemService for ForeignServiceAdapter {
    type AccessControl = AccessPolicy;

    fn create_access_control(
        &self,
        protection_level: ProtectionLevel,
        constraints: &AccessConstraints,
    ) -> Result<AccessPolicy, AccessControlError> {
        AccessPolicy::new(protection_level, constraints)
    }

    fn copy_matching(
        &self,
        query: &ItemQuery<'_>,
        context: Option<&AuthContext>,
    ) -> Result<Option<Vec<u8>>, ServiceStatus> {
        let result = self
            .inner
            .copy_matching(query.into(), context.map(AuthHints::from));
        ServiceStatus::check(result.status)?;
        Ok(result.data)
    }

    fn add(
        &self,
        query: &ItemQuery<'_>,
        value: &[u8],
        access_control: &AccessPolicy,
    ) -> Result<(), ServiceStatus> {
        ServiceStatus::check(self.inner.add(
            query.into(),
            value.to_vec(),
            access_control.into(),
        ))
    }

    fn delete(
        &self,
        query: &ItemQuery<'_>,
        context: Option<&AuthContext>,
    ) -> Result<(), ServiceStatus> {
        ServiceStatus::check(
            self.inner
                .delete(query.into(), context.map(AuthHints::from)),
        )
    }

    fn contains(
        &self,
        query: &ItemQuery<'_>,
        context: &AuthContext,
    ) -> Result<(), ServiceStatus> {
        ServiceStatus::check(self.inner.contains(query.into(), context.into()))
    }
}
