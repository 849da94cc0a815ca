//! `UniFFI` surface for Swift and Kotlin hosts.
//!
//! The host implements [`ForeignItemService`] over its native keychain and
//! receives a [`KeychainStore`] exposing the raw and text/UUID operations.
//! Structured values are encoded on the host side.

mod service;
mod store;
mod types;

pub use service::{ForeignItemService, ForeignServiceAdapter};
pub use store::KeychainStore;
pub use types::{AccessControlRecord, AccountRecord, AuthHints, ItemQueryRecord, LookupResult};
