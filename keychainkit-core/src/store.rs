//! The credential store facade.
//!
//! [`CredentialStore`] exposes four raw-bytes primitives (`get`, `insert`,
//! `delete`, `exists`) and derives every typed convenience from them.
//! [`Keychain`] implements the primitives on top of any
//! [`SecureItemService`].
//!
//! # Insert semantics
//!
//! `insert` is strict create: it never deletes or overwrites an existing item
//! and fails with [`KeychainError::DuplicateItem`] instead. Callers wanting
//! overwrite semantics call [`CredentialStore::replace`], which is a separate,
//! non-atomic delete followed by insert.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::auth::{non_interactive_context, AuthContext};
use crate::codec::Codec;
use crate::descriptor::{Account, AccountDescriptor, Service, ServiceDescriptor};
use crate::error::{KeychainError, KeychainResult};
use crate::service::{ItemQuery, SecureItemService, ServiceStatus};

/// Store of opaque byte blobs keyed by account within an optional service.
///
/// Implementors provide the four primitives; every other method is derived.
pub trait CredentialStore {
    /// Account descriptor type accepted by this store.
    type Account: AccountDescriptor;
    /// Service descriptor type this store is bound to.
    type Service: ServiceDescriptor;

    /// The service namespace every item is scoped to, `None` for the platform
    /// default namespace.
    fn service(&self) -> Option<&Self::Service>;

    /// Fetches the bytes stored for `account`. `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// - [`KeychainError::InvalidData`] if the service returned no payload
    /// - [`KeychainError::AuthenticationFailed`] if a challenge failed or was blocked
    /// - [`KeychainError::PlatformStatus`] for any other status
    fn get(&self, account: &Self::Account) -> KeychainResult<Option<Vec<u8>>>;

    /// Stores `value` as a new item for `account`.
    ///
    /// # Errors
    ///
    /// - [`KeychainError::Underlying`] if the access policy is rejected (nothing is written)
    /// - [`KeychainError::DuplicateItem`] if an item already exists for the key
    /// - [`KeychainError::PlatformStatus`] for any other status
    fn insert(&self, value: &[u8], account: &Self::Account) -> KeychainResult<()>;

    /// Removes the item for `account`. Succeeds if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// - [`KeychainError::AuthenticationFailed`] if a challenge failed or was blocked
    /// - [`KeychainError::PlatformStatus`] for any other status
    fn delete(&self, account: &Self::Account) -> KeychainResult<()>;

    /// Reports whether an item exists for `account` without reading it and
    /// without ever prompting the user.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::PlatformStatus`] for unexpected statuses.
    fn exists(&self, account: &Self::Account) -> KeychainResult<bool>;

    /// Like [`CredentialStore::get`], with absence reported as
    /// [`KeychainError::ItemNotFound`].
    ///
    /// # Errors
    ///
    /// Everything `get` returns, plus `ItemNotFound`.
    fn fetch(&self, account: &Self::Account) -> KeychainResult<Vec<u8>> {
        self.get(account)?.ok_or(KeychainError::ItemNotFound)
    }

    /// Deletes any existing item, then inserts `value`.
    ///
    /// The two steps are not atomic: a concurrent writer can slip in between,
    /// in which case the insert fails with `DuplicateItem`.
    ///
    /// # Errors
    ///
    /// Everything `delete` and `insert` return.
    fn replace(&self, value: &[u8], account: &Self::Account) -> KeychainResult<()> {
        self.delete(account)?;
        self.insert(value, account)
    }

    /// Fetches the stored value as UTF-8 text.
    ///
    /// # Errors
    ///
    /// [`KeychainError::InvalidData`] if the bytes are not UTF-8, plus
    /// everything `get` returns.
    fn get_text(&self, account: &Self::Account) -> KeychainResult<Option<String>> {
        self.get(account)?
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|e| {
                    KeychainError::invalid_data(format!("stored value is not UTF-8: {e}"))
                })
            })
            .transpose()
    }

    /// Fetches the stored value as a UUID in canonical hyphenated form.
    ///
    /// # Errors
    ///
    /// [`KeychainError::InvalidData`] if the text is not a canonical UUID, plus
    /// everything `get_text` returns.
    fn get_uuid(&self, account: &Self::Account) -> KeychainResult<Option<Uuid>> {
        self.get_text(account)?
            .map(|text| parse_canonical_uuid(&text))
            .transpose()
    }

    /// Fetches and decodes a structured value with `codec`.
    ///
    /// # Errors
    ///
    /// [`KeychainError::Underlying`] if decoding fails, plus everything `get`
    /// returns.
    fn get_value<T, C>(&self, account: &Self::Account, codec: &C) -> KeychainResult<Option<T>>
    where
        T: DeserializeOwned,
        C: Codec,
    {
        self.get(account)?
            .map(|bytes| codec.decode(&bytes).map_err(KeychainError::from))
            .transpose()
    }

    /// Stores `value` as UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// Everything `insert` returns.
    fn insert_text(&self, value: &str, account: &Self::Account) -> KeychainResult<()> {
        self.insert(value.as_bytes(), account)
    }

    /// Stores `value` as its canonical hyphenated text.
    ///
    /// # Errors
    ///
    /// Everything `insert` returns.
    fn insert_uuid(&self, value: Uuid, account: &Self::Account) -> KeychainResult<()> {
        self.insert_text(&value.hyphenated().to_string(), account)
    }

    /// Encodes `value` with `codec` and stores the bytes.
    ///
    /// # Errors
    ///
    /// [`KeychainError::Underlying`] if encoding fails, plus everything
    /// `insert` returns.
    fn insert_value<T, C>(&self, value: &T, account: &Self::Account, codec: &C) -> KeychainResult<()>
    where
        T: Serialize + ?Sized,
        C: Codec,
    {
        let bytes = codec.encode(value)?;
        self.insert(&bytes, account)
    }
}

fn parse_canonical_uuid(text: &str) -> KeychainResult<Uuid> {
    let uuid = Uuid::try_parse(text)
        .map_err(|e| KeychainError::invalid_data(format!("stored value is not a UUID: {e}")))?;
    let mut buffer = Uuid::encode_buffer();
    if !uuid
        .hyphenated()
        .encode_lower(&mut buffer)
        .eq_ignore_ascii_case(text)
    {
        return Err(KeychainError::invalid_data(
            "stored UUID is not in canonical hyphenated form",
        ));
    }
    Ok(uuid)
}

/// A [`CredentialStore`] backed by a [`SecureItemService`].
///
/// Immutable after construction: the bound service descriptor and
/// authentication context are fixed. Every call is a fresh round trip; nothing
/// is cached.
///
/// # Example
///
/// ```
/// use keychainkit_core::{Account, CredentialStore, Keychain, MemoryService, Service};
///
/// let keychain = Keychain::builder(MemoryService::new())
///     .service(Service::new("com.example.app")?)
///     .build();
///
/// let account = Account::new("session-token")?;
/// keychain.insert_text("s3cr3t", &account)?;
/// assert_eq!(keychain.get_text(&account)?.as_deref(), Some("s3cr3t"));
/// # Ok::<(), keychainkit_core::KeychainError>(())
/// ```
pub struct Keychain<S, A = Account, Sv = Service> {
    backend: S,
    service: Option<Sv>,
    auth_context: Option<AuthContext>,
    _account: PhantomData<fn(&A)>,
}

impl<S: SecureItemService> Keychain<S> {
    /// Starts building a keychain over `backend` with the default descriptor types.
    #[must_use]
    pub fn builder(backend: S) -> KeychainBuilder<S> {
        KeychainBuilder::new(backend)
    }
}

impl<S, A, Sv> Keychain<S, A, Sv>
where
    S: SecureItemService,
    A: AccountDescriptor,
    Sv: ServiceDescriptor,
{
    /// A keychain in the platform default namespace with no bound context.
    #[must_use]
    pub const fn new(backend: S) -> Self {
        Self {
            backend,
            service: None,
            auth_context: None,
            _account: PhantomData,
        }
    }

    /// The bound authentication context, if any.
    #[must_use]
    pub const fn auth_context(&self) -> Option<&AuthContext> {
        self.auth_context.as_ref()
    }

    /// The underlying secure-item service.
    #[must_use]
    pub const fn backend(&self) -> &S {
        &self.backend
    }

    /// Scoped key for `account`. Descriptors with an empty identifier never
    /// reach the backend.
    fn query<'a>(&'a self, account: &'a A) -> KeychainResult<ItemQuery<'a>> {
        if account.identifier().is_empty() {
            return Err(KeychainError::invalid_input(
                "account.identifier",
                "must not be empty",
            ));
        }
        if self
            .service
            .as_ref()
            .is_some_and(|service| service.identifier().is_empty())
        {
            return Err(KeychainError::invalid_input(
                "service.identifier",
                "must not be empty",
            ));
        }
        Ok(ItemQuery::scoped(account, self.service.as_ref()))
    }

    fn unexpected(operation: &str, account: &A, status: ServiceStatus) -> KeychainError {
        log::warn!(
            "keychain {operation} for account '{}' returned {status}",
            account.identifier()
        );
        KeychainError::PlatformStatus(status.code())
    }

    fn authentication_failed(operation: &str, account: &A, status: ServiceStatus) -> KeychainError {
        log::warn!(
            "keychain {operation} for account '{}' was not authenticated: {status}",
            account.identifier()
        );
        KeychainError::AuthenticationFailed
    }
}

impl<S, A, Sv> CredentialStore for Keychain<S, A, Sv>
where
    S: SecureItemService,
    A: AccountDescriptor,
    Sv: ServiceDescriptor,
{
    type Account = A;
    type Service = Sv;

    fn service(&self) -> Option<&Sv> {
        self.service.as_ref()
    }

    fn get(&self, account: &A) -> KeychainResult<Option<Vec<u8>>> {
        let query = self.query(account)?;
        log::debug!("keychain get account='{}'", account.identifier());
        match self
            .backend
            .copy_matching(&query, self.auth_context.as_ref())
        {
            Ok(Some(bytes)) => Ok(Some(bytes)),
            Ok(None) => Err(KeychainError::invalid_data(
                "lookup succeeded without a data payload",
            )),
            Err(ServiceStatus::ItemNotFound) => Ok(None),
            Err(status) if status.is_authentication_failure() => {
                Err(Self::authentication_failed("get", account, status))
            }
            Err(status) => Err(Self::unexpected("get", account, status)),
        }
    }

    fn insert(&self, value: &[u8], account: &A) -> KeychainResult<()> {
        let query = self.query(account)?;
        log::debug!("keychain insert account='{}'", account.identifier());
        let access_control = self
            .backend
            .create_access_control(account.protection_level(), account.access_constraints())?;
        match self
            .backend
            .add(&query, value, &access_control)
        {
            Ok(()) => Ok(()),
            Err(ServiceStatus::DuplicateItem) => Err(KeychainError::DuplicateItem),
            Err(status) => Err(Self::unexpected("insert", account, status)),
        }
    }

    fn delete(&self, account: &A) -> KeychainResult<()> {
        let query = self.query(account)?;
        log::debug!("keychain delete account='{}'", account.identifier());
        match self.backend.delete(&query, self.auth_context.as_ref()) {
            Ok(()) | Err(ServiceStatus::ItemNotFound) => Ok(()),
            Err(status) if status.is_authentication_failure() => {
                Err(Self::authentication_failed("delete", account, status))
            }
            Err(status) => Err(Self::unexpected("delete", account, status)),
        }
    }

    fn exists(&self, account: &A) -> KeychainResult<bool> {
        let query = self.query(account)?;
        log::debug!("keychain exists account='{}'", account.identifier());
        let context = non_interactive_context();
        match self.backend.contains(&query, &context) {
            // A gated item answers "interaction not allowed": it exists.
            Ok(()) | Err(ServiceStatus::InteractionNotAllowed) => Ok(true),
            Err(ServiceStatus::ItemNotFound) => Ok(false),
            Err(status) => Err(Self::unexpected("exists", account, status)),
        }
    }
}

/// Builder for [`Keychain`].
pub struct KeychainBuilder<S, A = Account, Sv = Service> {
    backend: S,
    service: Option<Sv>,
    auth_context: Option<AuthContext>,
    _account: PhantomData<fn(&A)>,
}

impl<S, A, Sv> KeychainBuilder<S, A, Sv>
where
    S: SecureItemService,
    A: AccountDescriptor,
    Sv: ServiceDescriptor,
{
    /// Starts a builder over `backend`.
    #[must_use]
    pub const fn new(backend: S) -> Self {
        Self {
            backend,
            service: None,
            auth_context: None,
            _account: PhantomData,
        }
    }

    /// Binds every item to `service`.
    #[must_use]
    pub fn service(mut self, service: Sv) -> Self {
        self.service = Some(service);
        self
    }

    /// Threads `context` through lookups and deletes.
    #[must_use]
    pub fn auth_context(mut self, context: AuthContext) -> Self {
        self.auth_context = Some(context);
        self
    }

    /// Finishes the keychain.
    #[must_use]
    pub fn build(self) -> Keychain<S, A, Sv> {
        Keychain {
            backend: self.backend,
            service: self.service,
            auth_context: self.auth_context,
            _account: PhantomData,
        }
    }
}
