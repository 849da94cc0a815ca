//! Common test utilities shared across integration tests.

#![allow(dead_code, missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use keychainkit_core::{
    AccessConstraint, AccessConstraints, AccessPolicy, Account, AuthOutcome, Authenticator,
    Keychain, MemoryService, ProtectionLevel, Service,
};

/// Authenticator that counts prompts and replays scripted outcomes,
/// approving once the script runs out.
#[derive(Default)]
pub struct CountingAuthenticator {
    prompts: AtomicUsize,
    script: Mutex<VecDeque<AuthOutcome>>,
    reasons: Mutex<Vec<Option<String>>>,
}

impl CountingAuthenticator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = AuthOutcome>) -> Arc<Self> {
        let authenticator = Self::default();
        authenticator.script.lock().unwrap().extend(outcomes);
        Arc::new(authenticator)
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn reasons(&self) -> Vec<Option<String>> {
        self.reasons.lock().unwrap().clone()
    }
}

impl Authenticator for CountingAuthenticator {
    fn authenticate(&self, _policy: &AccessPolicy, reason: Option<&str>) -> AuthOutcome {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.reasons
            .lock()
            .unwrap()
            .push(reason.map(str::to_string));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AuthOutcome::Approved)
    }
}

/// A backend plus the authenticator watching it.
pub fn memory_backend() -> (Arc<MemoryService>, Arc<CountingAuthenticator>) {
    let authenticator = CountingAuthenticator::new();
    let backend = Arc::new(MemoryService::with_authenticator(authenticator.clone()));
    (backend, authenticator)
}

pub fn keychain(backend: &Arc<MemoryService>, service: &str) -> Keychain<Arc<MemoryService>> {
    Keychain::builder(Arc::clone(backend))
        .service(Service::new(service).expect("service"))
        .build()
}

pub fn account(identifier: &str) -> Account {
    Account::new(identifier).expect("account")
}

/// Account gated behind biometry, readable only while unlocked.
pub fn biometric_account(identifier: &str) -> Account {
    account(identifier)
        .with_protection_level(ProtectionLevel::WhenUnlockedThisDeviceOnly)
        .with_access_constraints(AccessConstraints::single(AccessConstraint::BiometryAny))
}
