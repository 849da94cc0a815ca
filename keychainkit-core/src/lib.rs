#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Typed facade over a platform secure-credential store.
//!
//! A [`Keychain`] binds a [`SecureItemService`] backend to an optional
//! [`Service`] namespace and exposes raw, text, UUID and codec-encoded values
//! per [`Account`]. Every failure is reported as a [`KeychainError`].
//!
//! ```rust
//! use keychainkit_core::{Account, CredentialStore, Keychain, MemoryService, Service};
//!
//! let keychain = Keychain::builder(MemoryService::new())
//!     .service(Service::new("com.example.app").unwrap())
//!     .build();
//! let account = Account::new("api-token").unwrap();
//!
//! keychain.insert_text("s3cret", &account).unwrap();
//! assert!(keychain.exists(&account).unwrap());
//! assert_eq!(keychain.get_text(&account).unwrap().as_deref(), Some("s3cret"));
//! ```

mod auth;
pub use auth::*;

mod codec;
pub use codec::*;

mod descriptor;
pub use descriptor::*;

mod error;
pub use error::*;

mod policy;
pub use policy::*;

pub mod service;
pub use service::{
    status, ApproveAll, AuthOutcome, Authenticator, DeviceLock, ItemQuery, MemoryService,
    SecureItemService, ServiceStatus, MAX_AUTHENTICATED_SESSIONS,
};
#[cfg(all(feature = "platform-apple", target_vendor = "apple"))]
pub use service::AppleKeychain;

mod store;
pub use store::*;

pub mod logger;

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("keychainkit_core");
