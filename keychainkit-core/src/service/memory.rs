//! In-memory implementation of [`SecureItemService`].
//!
//! **NOT a secure store.** Values live in process memory (zeroized on removal).
//! It reproduces the keychain behaviours the facade relies on so the facade can
//! be exercised without a device:
//!
//! - exact scoped-key matching (account, service, access group, sync flag)
//! - duplicate rejection on add, not-found on delete of a missing item
//! - authentication gating through a pluggable [`Authenticator`]
//! - non-interactive contexts fail with "interaction not allowed" instead of prompting
//! - a context that passed a challenge is not challenged again, for the
//!   [`MAX_AUTHENTICATED_SESSIONS`] most recent contexts
//! - device lock state gating `WhenUnlocked*` items
//! - synchronizable items cannot be device-bound or constrained (`errSecParam`)

#![allow(clippy::significant_drop_tightening)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use zeroize::Zeroizing;

use super::{status, ItemQuery, SecureItemService, ServiceStatus};
use crate::auth::AuthContext;
use crate::descriptor::{AccessConstraints, ProtectionLevel};
use crate::policy::{AccessControlError, AccessPolicy};

/// Result of presenting an authentication challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The user satisfied the challenge.
    Approved,
    /// Biometry or passcode did not match.
    Denied,
    /// The user dismissed the prompt.
    Canceled,
}

/// Presents authentication challenges on behalf of [`MemoryService`].
pub trait Authenticator: Send + Sync {
    /// Challenges the user for an item protected by `policy`.
    fn authenticate(&self, policy: &AccessPolicy, reason: Option<&str>) -> AuthOutcome;
}

/// Authenticator that approves every challenge.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

impl Authenticator for ApproveAll {
    fn authenticate(&self, _policy: &AccessPolicy, _reason: Option<&str>) -> AuthOutcome {
        AuthOutcome::Approved
    }
}

/// Emulated device lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceLock {
    /// Booted, never unlocked. No item is readable.
    BeforeFirstUnlock,
    /// Unlocked. Every protection level is readable.
    #[default]
    Unlocked,
    /// Locked after a first unlock. `AfterFirstUnlock*` items stay readable.
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    account: String,
    service: Option<String>,
    access_group: Option<String>,
    synchronizable: bool,
}

impl From<&ItemQuery<'_>> for ItemKey {
    fn from(query: &ItemQuery<'_>) -> Self {
        Self {
            account: query.account.to_string(),
            service: query.service.map(str::to_string),
            access_group: query.access_group.map(str::to_string),
            synchronizable: query.synchronizable,
        }
    }
}

struct StoredItem {
    value: Zeroizing<Vec<u8>>,
    policy: AccessPolicy,
}

/// Number of authenticated contexts remembered before the oldest is evicted.
pub const MAX_AUTHENTICATED_SESSIONS: usize = 64;

/// Authenticated session ids, oldest first, capped at
/// [`MAX_AUTHENTICATED_SESSIONS`].
#[derive(Default)]
struct SessionCache {
    order: VecDeque<u64>,
    members: HashSet<u64>,
}

impl SessionCache {
    fn contains(&self, session: u64) -> bool {
        self.members.contains(&session)
    }

    fn insert(&mut self, session: u64) {
        if !self.members.insert(session) {
            return;
        }
        self.order.push_back(session);
        while self.order.len() > MAX_AUTHENTICATED_SESSIONS {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    fn remove(&mut self, session: u64) -> bool {
        if !self.members.remove(&session) {
            return false;
        }
        self.order.retain(|&s| s != session);
        true
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    fn len(&self) -> usize {
        self.members.len()
    }
}

#[derive(Default)]
struct State {
    items: HashMap<ItemKey, StoredItem>,
    authenticated_sessions: SessionCache,
    device: DeviceLock,
}

/// In-memory secure-item service.
///
/// Thread-safe; all operations serialize on one mutex, including the time an
/// [`Authenticator`] spends deciding. An authenticator must not call back into
/// the same service.
pub struct MemoryService {
    state: Mutex<State>,
    authenticator: Arc<dyn Authenticator>,
}

impl MemoryService {
    /// Creates an empty service that approves every challenge.
    #[must_use]
    pub fn new() -> Self {
        Self::with_authenticator(Arc::new(ApproveAll))
    }

    /// Creates an empty service that delegates challenges to `authenticator`.
    #[must_use]
    pub fn with_authenticator(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            authenticator,
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, ServiceStatus> {
        self.state
            .lock()
            .map_err(|_| ServiceStatus::Other(status::INTERNAL))
    }

    /// Number of stored items across all scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().map_or(0, |state| state.items.len())
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every item and forgets every authenticated session.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state() {
            state.items.clear();
            state.authenticated_sessions.clear();
        }
    }

    /// Forgets the authentication of `context`, so its next gated read
    /// challenges again. Returns `false` if the session was not remembered.
    pub fn end_session(&self, context: &AuthContext) -> bool {
        self.state()
            .is_ok_and(|mut state| state.authenticated_sessions.remove(context.session()))
    }

    /// Number of authenticated sessions currently remembered.
    #[must_use]
    pub fn authenticated_session_count(&self) -> usize {
        self.state()
            .map_or(0, |state| state.authenticated_sessions.len())
    }

    /// Changes the emulated device lock state.
    ///
    /// Locking the device also invalidates authenticated sessions.
    pub fn set_device_lock(&self, device: DeviceLock) {
        if let Ok(mut state) = self.state() {
            if device != DeviceLock::Unlocked {
                state.authenticated_sessions.clear();
            }
            state.device = device;
        }
    }

    /// Decides whether the item guarded by `policy` may be released.
    fn authorize(
        &self,
        state: &mut State,
        policy: &AccessPolicy,
        context: Option<&AuthContext>,
    ) -> Result<(), ServiceStatus> {
        let readable = match state.device {
            DeviceLock::Unlocked => true,
            DeviceLock::Locked => !policy.protection_level().requires_unlocked_device(),
            DeviceLock::BeforeFirstUnlock => false,
        };
        if !readable {
            return Err(ServiceStatus::InteractionNotAllowed);
        }
        if !policy.requires_authentication() {
            return Ok(());
        }

        if let Some(context) = context {
            if state.authenticated_sessions.contains(context.session()) {
                return Ok(());
            }
            if !context.interaction_allowed() {
                return Err(ServiceStatus::InteractionNotAllowed);
            }
        }

        let reason = context.and_then(AuthContext::localized_reason);
        match self.authenticator.authenticate(policy, reason) {
            AuthOutcome::Approved => {
                if let Some(context) = context {
                    state.authenticated_sessions.insert(context.session());
                }
                Ok(())
            }
            AuthOutcome::Denied => Err(ServiceStatus::AuthFailed),
            AuthOutcome::Canceled => Err(ServiceStatus::UserCanceled),
        }
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureItemService for MemoryService {
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
        let mut state = self.state()?;
        let key = ItemKey::from(query);
        let policy = state
            .items
            .get(&key)
            .map(|item| item.policy.clone())
            .ok_or(ServiceStatus::ItemNotFound)?;
        self.authorize(&mut state, &policy, context)?;
        Ok(state.items.get(&key).map(|item| item.value.to_vec()))
    }

    fn add(
        &self,
        query: &ItemQuery<'_>,
        value: &[u8],
        access_control: &AccessPolicy,
    ) -> Result<(), ServiceStatus> {
        if query.synchronizable
            && (access_control.protection_level().is_this_device_only()
                || access_control.requires_authentication())
        {
            return Err(ServiceStatus::Other(status::PARAM));
        }

        let mut state = self.state()?;
        let key = ItemKey::from(query);
        if state.items.contains_key(&key) {
            return Err(ServiceStatus::DuplicateItem);
        }
        state.items.insert(
            key,
            StoredItem {
                value: Zeroizing::new(value.to_vec()),
                policy: access_control.clone(),
            },
        );
        Ok(())
    }

    fn delete(
        &self,
        query: &ItemQuery<'_>,
        _context: Option<&AuthContext>,
    ) -> Result<(), ServiceStatus> {
        self.state()?
            .items
            .remove(&ItemKey::from(query))
            .map(drop)
            .ok_or(ServiceStatus::ItemNotFound)
    }

    fn contains(
        &self,
        query: &ItemQuery<'_>,
        context: &AuthContext,
    ) -> Result<(), ServiceStatus> {
        let mut state = self.state()?;
        let policy = state
            .items
            .get(&ItemKey::from(query))
            .map(|item| item.policy.clone())
            .ok_or(ServiceStatus::ItemNotFound)?;
        self.authorize(&mut state, &policy, Some(context))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::descriptor::AccessConstraint;

    struct Fixed {
        outcome: AuthOutcome,
        prompts: AtomicUsize,
    }

    impl Authenticator for Fixed {
        fn authenticate(&self, _policy: &AccessPolicy, _reason: Option<&str>) -> AuthOutcome {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.outcome
        }
    }

    fn fixed(outcome: AuthOutcome) -> Arc<Fixed> {
        Arc::new(Fixed {
            outcome,
            prompts: AtomicUsize::new(0),
        })
    }

    fn query(account: &str) -> ItemQuery<'_> {
        ItemQuery {
            account,
            service: Some("svc"),
            access_group: None,
            synchronizable: false,
        }
    }

    fn biometric() -> AccessPolicy {
        AccessPolicy::new(
            ProtectionLevel::WhenUnlockedThisDeviceOnly,
            &AccessConstraints::single(AccessConstraint::BiometryAny),
        )
        .unwrap()
    }

    fn open() -> AccessPolicy {
        AccessPolicy::new(ProtectionLevel::AfterFirstUnlock, &AccessConstraints::none()).unwrap()
    }

    #[test]
    fn test_add_then_copy() {
        let service = MemoryService::new();
        service.add(&query("a"), b"secret", &open()).unwrap();
        assert_eq!(
            service.copy_matching(&query("a"), None).unwrap(),
            Some(b"secret".to_vec())
        );
        assert_eq!(service.len(), 1);
    }

    #[test]
    fn test_add_rejects_duplicates_and_delete_reports_missing() {
        let service = MemoryService::new();
        service.add(&query("a"), b"1", &open()).unwrap();
        assert_eq!(
            service.add(&query("a"), b"2", &open()),
            Err(ServiceStatus::DuplicateItem)
        );
        service.delete(&query("a"), None).unwrap();
        assert_eq!(
            service.delete(&query("a"), None),
            Err(ServiceStatus::ItemNotFound)
        );
        assert!(service.is_empty());
    }

    #[test]
    fn test_sync_flag_is_part_of_the_key() {
        let service = MemoryService::new();
        service.add(&query("a"), b"local", &open()).unwrap();
        let synced = ItemQuery {
            synchronizable: true,
            ..query("a")
        };
        assert_eq!(
            service.copy_matching(&synced, None),
            Err(ServiceStatus::ItemNotFound)
        );
    }

    #[test]
    fn test_synchronizable_items_cannot_be_device_bound() {
        let service = MemoryService::new();
        let synced = ItemQuery {
            synchronizable: true,
            ..query("a")
        };
        assert_eq!(
            service.add(&synced, b"x", &biometric()),
            Err(ServiceStatus::Other(status::PARAM))
        );
    }

    #[test]
    fn test_denied_and_canceled_prompts() {
        let denied = MemoryService::with_authenticator(fixed(AuthOutcome::Denied));
        denied.add(&query("a"), b"x", &biometric()).unwrap();
        assert_eq!(
            denied.copy_matching(&query("a"), None),
            Err(ServiceStatus::AuthFailed)
        );

        let canceled = MemoryService::with_authenticator(fixed(AuthOutcome::Canceled));
        canceled.add(&query("a"), b"x", &biometric()).unwrap();
        assert_eq!(
            canceled.copy_matching(&query("a"), None),
            Err(ServiceStatus::UserCanceled)
        );
    }

    #[test]
    fn test_authenticated_session_is_reused() {
        let authenticator = fixed(AuthOutcome::Approved);
        let service = MemoryService::with_authenticator(authenticator.clone());
        service.add(&query("a"), b"x", &biometric()).unwrap();

        let context = AuthContext::interactive();
        service.copy_matching(&query("a"), Some(&context)).unwrap();
        service.copy_matching(&query("a"), Some(&context.clone())).unwrap();
        assert_eq!(authenticator.prompts.load(Ordering::SeqCst), 1);

        // No context means a fresh session every time.
        service.copy_matching(&query("a"), None).unwrap();
        assert_eq!(authenticator.prompts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_interactive_context_never_prompts() {
        let authenticator = fixed(AuthOutcome::Approved);
        let service = MemoryService::with_authenticator(authenticator.clone());
        service.add(&query("a"), b"x", &biometric()).unwrap();

        let context = AuthContext::non_interactive();
        assert_eq!(
            service.copy_matching(&query("a"), Some(&context)),
            Err(ServiceStatus::InteractionNotAllowed)
        );
        assert_eq!(
            service.contains(&query("a"), &context),
            Err(ServiceStatus::InteractionNotAllowed)
        );
        assert_eq!(authenticator.prompts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_device_lock_gates_when_unlocked_items() {
        let service = MemoryService::new();
        service.add(&query("open"), b"1", &open()).unwrap();
        let when_unlocked =
            AccessPolicy::new(ProtectionLevel::WhenUnlocked, &AccessConstraints::none()).unwrap();
        service.add(&query("gated"), b"2", &when_unlocked).unwrap();

        service.set_device_lock(DeviceLock::Locked);
        assert!(service.copy_matching(&query("open"), None).is_ok());
        assert_eq!(
            service.copy_matching(&query("gated"), None),
            Err(ServiceStatus::InteractionNotAllowed)
        );

        service.set_device_lock(DeviceLock::BeforeFirstUnlock);
        assert_eq!(
            service.copy_matching(&query("open"), None),
            Err(ServiceStatus::InteractionNotAllowed)
        );

        service.set_device_lock(DeviceLock::Unlocked);
        assert!(service.copy_matching(&query("gated"), None).is_ok());
    }

    #[test]
    fn test_authenticated_sessions_stay_bounded() {
        let service = MemoryService::new();
        service.add(&query("a"), b"x", &biometric()).unwrap();

        let first = AuthContext::interactive();
        service.copy_matching(&query("a"), Some(&first)).unwrap();
        for _ in 0..10_000 {
            service
                .copy_matching(&query("a"), Some(&AuthContext::interactive()))
                .unwrap();
        }
        assert_eq!(
            service.authenticated_session_count(),
            MAX_AUTHENTICATED_SESSIONS
        );
        // The oldest session was evicted and has to authenticate again.
        assert!(!service.end_session(&first));
    }

    #[test]
    fn test_end_session_requires_a_new_challenge() {
        let authenticator = fixed(AuthOutcome::Approved);
        let service = MemoryService::with_authenticator(authenticator.clone());
        service.add(&query("a"), b"x", &biometric()).unwrap();

        let context = AuthContext::interactive();
        service.copy_matching(&query("a"), Some(&context)).unwrap();
        assert_eq!(service.authenticated_session_count(), 1);
        assert!(service.end_session(&context));
        assert_eq!(service.authenticated_session_count(), 0);

        service.copy_matching(&query("a"), Some(&context)).unwrap();
        assert_eq!(authenticator.prompts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear() {
        let service = MemoryService::new();
        service.add(&query("a"), b"1", &open()).unwrap();
        service.add(&query("b"), b"2", &open()).unwrap();
        service.clear();
        assert!(service.is_empty());
    }
}
