//! Keychain Services implementation of [`SecureItemService`].
//!
//! Items are `kSecClassGenericPassword` entries scoped by `kSecAttrAccount`,
//! `kSecAttrService`, `kSecAttrAccessGroup` and `kSecAttrSynchronizable`.
//!
//! # Authentication contexts
//!
//! Keychain Services takes an `LAContext` through `kSecUseAuthenticationContext`.
//! Without an Objective-C bridge this backend maps an [`AuthContext`] onto the
//! query flags it controls instead:
//!
//! - non-interactive contexts set `kSecUseAuthenticationUI` to
//!   `kSecUseAuthenticationUIFail`, so gated items answer
//!   `errSecInteractionNotAllowed` rather than prompting
//! - a localized reason is passed as `kSecUseOperationPrompt`
//!
//! Session reuse is left to the system's own biometric reuse window.

use core_foundation::base::{CFOptionFlags, CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::data::CFData;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;
use core_foundation_sys::string::CFStringRef;
use security_framework::access_control::{ProtectionMode, SecAccessControl};
use security_framework_sys::access_control::{
    kSecAccessControlAnd, kSecAccessControlBiometryAny, kSecAccessControlBiometryCurrentSet,
    kSecAccessControlDevicePasscode, kSecAccessControlOr, kSecAccessControlUserPresence,
};
use security_framework_sys::item::{
    kSecAttrAccessControl, kSecAttrAccessGroup, kSecAttrAccount, kSecAttrService,
    kSecAttrSynchronizable, kSecClass, kSecClassGenericPassword, kSecMatchLimit,
    kSecMatchLimitOne, kSecReturnData, kSecValueData,
};
use security_framework_sys::keychain_item::{SecItemAdd, SecItemCopyMatching, SecItemDelete};

use super::{ItemQuery, SecureItemService, ServiceStatus};
use crate::auth::AuthContext;
use crate::descriptor::{AccessConstraint, AccessConstraints, Conjunction, ProtectionLevel};
use crate::policy::{AccessControlError, AccessPolicy};

#[link(name = "Security", kind = "framework")]
extern "C" {
    static kSecUseAuthenticationUI: CFStringRef;
    static kSecUseAuthenticationUIFail: CFStringRef;
    static kSecUseOperationPrompt: CFStringRef;
}

/// Keychain Services backend.
///
/// Thread-safe; the keychain daemon serializes `SecItem*` calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppleKeychain;

impl AppleKeychain {
    /// Creates the backend. Holds no state.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Wraps a `kSec*` constant without taking ownership.
fn cf_key(raw: CFStringRef) -> CFString {
    // SAFETY: `kSec*` constants are static CFStrings owned by Security.framework.
    unsafe { CFString::wrap_under_get_rule(raw) }
}

const fn protection_mode(level: ProtectionLevel) -> ProtectionMode {
    match level {
        ProtectionLevel::AfterFirstUnlock => ProtectionMode::AccessibleAfterFirstUnlock,
        ProtectionLevel::AfterFirstUnlockThisDeviceOnly => {
            ProtectionMode::AccessibleAfterFirstUnlockThisDeviceOnly
        }
        ProtectionLevel::WhenUnlocked => ProtectionMode::AccessibleWhenUnlocked,
        ProtectionLevel::WhenUnlockedThisDeviceOnly => {
            ProtectionMode::AccessibleWhenUnlockedThisDeviceOnly
        }
        ProtectionLevel::WhenPasscodeSetThisDeviceOnly => {
            ProtectionMode::AccessibleWhenPasscodeSetThisDeviceOnly
        }
    }
}

fn access_control_flags(constraints: &AccessConstraints) -> CFOptionFlags {
    let mut flags = constraints.iter().fold(0, |flags, constraint| {
        flags
            | match constraint {
                AccessConstraint::UserPresence => kSecAccessControlUserPresence,
                AccessConstraint::BiometryAny => kSecAccessControlBiometryAny,
                AccessConstraint::BiometryCurrentSet => kSecAccessControlBiometryCurrentSet,
                AccessConstraint::DevicePasscode => kSecAccessControlDevicePasscode,
            }
    });
    match constraints.conjunction() {
        Some(Conjunction::Or) => flags |= kSecAccessControlOr,
        Some(Conjunction::And) => flags |= kSecAccessControlAnd,
        None => {}
    }
    flags
}

/// Attributes shared by every query: class plus the scoped key.
fn scoped_attributes(query: &ItemQuery<'_>) -> Vec<(CFString, CFType)> {
    let mut pairs = vec![
        (
            cf_key(unsafe { kSecClass }),
            cf_key(unsafe { kSecClassGenericPassword }).into_CFType(),
        ),
        (
            cf_key(unsafe { kSecAttrAccount }),
            CFString::new(query.account).into_CFType(),
        ),
        (
            cf_key(unsafe { kSecAttrSynchronizable }),
            CFBoolean::from(query.synchronizable).into_CFType(),
        ),
    ];
    if let Some(service) = query.service {
        pairs.push((
            cf_key(unsafe { kSecAttrService }),
            CFString::new(service).into_CFType(),
        ));
    }
    if let Some(access_group) = query.access_group {
        pairs.push((
            cf_key(unsafe { kSecAttrAccessGroup }),
            CFString::new(access_group).into_CFType(),
        ));
    }
    pairs
}

fn apply_context(pairs: &mut Vec<(CFString, CFType)>, context: Option<&AuthContext>) {
    let Some(context) = context else {
        return;
    };
    if !context.interaction_allowed() {
        pairs.push((
            cf_key(unsafe { kSecUseAuthenticationUI }),
            cf_key(unsafe { kSecUseAuthenticationUIFail }).into_CFType(),
        ));
    }
    if let Some(reason) = context.localized_reason() {
        pairs.push((
            cf_key(unsafe { kSecUseOperationPrompt }),
            CFString::new(reason).into_CFType(),
        ));
    }
}

fn single_match(pairs: &mut Vec<(CFString, CFType)>) {
    pairs.push((
        cf_key(unsafe { kSecMatchLimit }),
        cf_key(unsafe { kSecMatchLimitOne }).into_CFType(),
    ));
}

impl SecureItemService for AppleKeychain {
    type AccessControl = SecAccessControl;

    fn create_access_control(
        &self,
        protection_level: ProtectionLevel,
        constraints: &AccessConstraints,
    ) -> Result<SecAccessControl, AccessControlError> {
        let policy = AccessPolicy::new(protection_level, constraints)?;
        SecAccessControl::create_with_protection(
            Some(protection_mode(policy.protection_level())),
            access_control_flags(policy.constraints()),
        )
        .map_err(|e| AccessControlError::new(e.code(), e.to_string()))
    }

    fn copy_matching(
        &self,
        query: &ItemQuery<'_>,
        context: Option<&AuthContext>,
    ) -> Result<Option<Vec<u8>>, ServiceStatus> {
        let mut pairs = scoped_attributes(query);
        single_match(&mut pairs);
        pairs.push((
            cf_key(unsafe { kSecReturnData }),
            CFBoolean::true_value().into_CFType(),
        ));
        apply_context(&mut pairs, context);
        let dictionary = CFDictionary::from_CFType_pairs(&pairs);

        let mut result: CFTypeRef = std::ptr::null();
        // SAFETY: `dictionary` outlives the call and `result` is a valid out pointer.
        let code = unsafe { SecItemCopyMatching(dictionary.as_concrete_TypeRef(), &mut result) };
        ServiceStatus::check(code)?;
        if result.is_null() {
            return Ok(None);
        }

        // SAFETY: SecItemCopyMatching follows the create rule for `result`.
        let value = unsafe { CFType::wrap_under_create_rule(result) };
        Ok(value.downcast::<CFData>().map(|data| data.bytes().to_vec()))
    }

    fn add(
        &self,
        query: &ItemQuery<'_>,
        value: &[u8],
        access_control: &SecAccessControl,
    ) -> Result<(), ServiceStatus> {
        let mut pairs = scoped_attributes(query);
        pairs.push((
            cf_key(unsafe { kSecValueData }),
            CFData::from_buffer(value).into_CFType(),
        ));
        pairs.push((
            cf_key(unsafe { kSecAttrAccessControl }),
            access_control.as_CFType(),
        ));
        let dictionary = CFDictionary::from_CFType_pairs(&pairs);

        // SAFETY: `dictionary` outlives the call; no result is requested.
        let code = unsafe { SecItemAdd(dictionary.as_concrete_TypeRef(), std::ptr::null_mut()) };
        ServiceStatus::check(code)
    }

    fn delete(
        &self,
        query: &ItemQuery<'_>,
        context: Option<&AuthContext>,
    ) -> Result<(), ServiceStatus> {
        let mut pairs = scoped_attributes(query);
        apply_context(&mut pairs, context);
        let dictionary = CFDictionary::from_CFType_pairs(&pairs);

        // SAFETY: `dictionary` outlives the call.
        let code = unsafe { SecItemDelete(dictionary.as_concrete_TypeRef()) };
        ServiceStatus::check(code)
    }

    fn contains(
        &self,
        query: &ItemQuery<'_>,
        context: &AuthContext,
    ) -> Result<(), ServiceStatus> {
        let mut pairs = scoped_attributes(query);
        single_match(&mut pairs);
        apply_context(&mut pairs, Some(context));
        let dictionary = CFDictionary::from_CFType_pairs(&pairs);

        let mut result: CFTypeRef = std::ptr::null();
        // SAFETY: `dictionary` outlives the call and `result` is a valid out pointer.
        let code = unsafe { SecItemCopyMatching(dictionary.as_concrete_TypeRef(), &mut result) };
        if !result.is_null() {
            // SAFETY: any returned object follows the create rule.
            drop(unsafe { CFType::wrap_under_create_rule(result) });
        }
        ServiceStatus::check(code)
    }
}
