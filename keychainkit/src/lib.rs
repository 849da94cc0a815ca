//! Bindings entry point for `keychainkit-core`.
//!
//! Re-exports the core crate and its `UniFFI` scaffolding so a single
//! `staticlib`/`cdylib` carries the whole foreign surface.

pub use keychainkit_core::*;

keychainkit_core::uniffi_reexport_scaffolding!();
