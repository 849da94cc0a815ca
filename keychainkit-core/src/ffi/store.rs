//! FFI entry point: the keychain store object.

use std::sync::Arc;

use uuid::Uuid;

use super::service::{ForeignItemService, ForeignServiceAdapter};
use super::types::AccountRecord;
use crate::auth::AuthContext;
use crate::descriptor::Service;
use crate::error::{KeychainError, KeychainResult};
use crate::store::{CredentialStore, Keychain};

/// Credential store over a host-supplied secure-item service.
///
/// # Example (Swift)
///
/// ```swift
/// let store = try KeychainStore(
///     service: SecItemService(),
///     serviceIdentifier: "com.example.app",
///     accessGroup: nil,
///     promptReason: "Unlock your account"
/// )
/// let account = AccountRecord(identifier: "refresh-token", protectionLevel: .whenUnlockedThisDeviceOnly,
///                             constraints: [.biometryAny], conjunction: nil, synchronizable: false)
/// try store.insertText(value: token, account: account)
/// ```
#[derive(uniffi::Object)]
pub struct KeychainStore {
    inner: Keychain<ForeignServiceAdapter>,
}

#[uniffi::export]
impl KeychainStore {
    /// Creates a store bound to an optional service namespace.
    ///
    /// A `prompt_reason` binds an interactive authentication context carrying
    /// that reason; without one, lookups run without a bound context.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty service identifier, or an access
    /// group without a service identifier.
    #[uniffi::constructor]
    pub fn new(
        service: Arc<dyn ForeignItemService>,
        service_identifier: Option<String>,
        access_group: Option<String>,
        prompt_reason: Option<String>,
    ) -> KeychainResult<Arc<Self>> {
        let mut builder = Keychain::builder(ForeignServiceAdapter::new(service));
        match (service_identifier, access_group) {
            (Some(identifier), group) => {
                let mut descriptor = Service::new(identifier)?;
                if let Some(group) = group {
                    descriptor = descriptor.with_access_group(group);
                }
                builder = builder.service(descriptor);
            }
            (None, Some(_)) => {
                return Err(KeychainError::invalid_input(
                    "access_group",
                    "requires a service identifier",
                ));
            }
            (None, None) => {}
        }
        if let Some(reason) = prompt_reason {
            builder = builder.auth_context(AuthContext::interactive().with_localized_reason(reason));
        }
        Ok(Arc::new(Self {
            inner: builder.build(),
        }))
    }

    /// Raw bytes for `account`, or `None`.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::get`.
    pub fn get(&self, account: AccountRecord) -> KeychainResult<Option<Vec<u8>>> {
        self.inner.get(&account.to_account()?)
    }

    /// Raw bytes for `account`; absence is `ItemNotFound`.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::fetch`.
    pub fn fetch(&self, account: AccountRecord) -> KeychainResult<Vec<u8>> {
        self.inner.fetch(&account.to_account()?)
    }

    /// Inserts a new item. Fails with `DuplicateItem` if one exists.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::insert`.
    pub fn insert(&self, value: Vec<u8>, account: AccountRecord) -> KeychainResult<()> {
        self.inner.insert(&value, &account.to_account()?)
    }

    /// Deletes any existing item, then inserts.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::replace`.
    pub fn replace(&self, value: Vec<u8>, account: AccountRecord) -> KeychainResult<()> {
        self.inner.replace(&value, &account.to_account()?)
    }

    /// Deletes the item; succeeds when there is none.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::delete`.
    pub fn delete(&self, account: AccountRecord) -> KeychainResult<()> {
        self.inner.delete(&account.to_account()?)
    }

    /// Whether an item exists, without prompting.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::exists`.
    pub fn exists(&self, account: AccountRecord) -> KeychainResult<bool> {
        self.inner.exists(&account.to_account()?)
    }

    /// The stored value as UTF-8 text.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::get_text`.
    pub fn get_text(&self, account: AccountRecord) -> KeychainResult<Option<String>> {
        self.inner.get_text(&account.to_account()?)
    }

    /// Stores UTF-8 text.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::insert_text`.
    pub fn insert_text(&self, value: String, account: AccountRecord) -> KeychainResult<()> {
        self.inner.insert_text(&value, &account.to_account()?)
    }

    /// The stored value as a canonical UUID string.
    ///
    /// # Errors
    ///
    /// See `CredentialStore::get_uuid`.
    pub fn get_uuid(&self, account: AccountRecord) -> KeychainResult<Option<String>> {
        Ok(self
            .inner
            .get_uuid(&account.to_account()?)?
            .map(|uuid| uuid.hyphenated().to_string()))
    }

    /// Stores a UUID given in any form `uuid` parses, normalized to canonical text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `value` is not a UUID, plus see
    /// `CredentialStore::insert_uuid`.
    pub fn insert_uuid(&self, value: String, account: AccountRecord) -> KeychainResult<()> {
        let uuid = Uuid::try_parse(&value)
            .map_err(|e| KeychainError::invalid_input("value", e.to_string()))?;
        self.inner.insert_uuid(uuid, &account.to_account()?)
    }
}
