//! Integration tests for the keychain store.

mod common;

use std::sync::Arc;

use keychainkit_core::{
    AccessConstraint, AccessConstraints, AuthContext, AuthOutcome, CborCodec, CredentialStore,
    DeviceLock, JsonCodec, Keychain, KeychainError, MemoryService, Service, UnderlyingError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    refresh_token: String,
    scopes: Vec<String>,
}

fn session() -> Session {
    Session {
        user_id: 42,
        refresh_token: "rt-0f9e".to_string(),
        scopes: vec!["read".to_string(), "write".to_string()],
    }
}

#[test]
fn test_raw_round_trip_and_delete() {
    let (backend, _) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");
    let account = common::account("device-key");

    assert_eq!(keychain.get(&account).expect("get"), None);
    assert!(!keychain.exists(&account).expect("exists"));

    keychain.insert(&[0, 159, 146, 150], &account).expect("insert");
    assert_eq!(
        keychain.get(&account).expect("get"),
        Some(vec![0, 159, 146, 150])
    );
    assert!(keychain.exists(&account).expect("exists"));

    keychain.delete(&account).expect("delete");
    assert_eq!(keychain.get(&account).expect("get"), None);
    // Deleting again is a no-op.
    keychain.delete(&account).expect("second delete");
    assert!(backend.is_empty());
}

#[test]
fn test_fetch_reports_absence_as_error() {
    let (backend, _) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");

    assert!(matches!(
        keychain.fetch(&common::account("missing")),
        Err(KeychainError::ItemNotFound)
    ));
}

#[test]
fn test_insert_is_strict_create() {
    let (backend, _) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");
    let account = common::account("api-token");

    keychain.insert_text("v1", &account).expect("insert");
    let err = keychain.insert_text("v2", &account).unwrap_err();
    assert!(matches!(err, KeychainError::DuplicateItem));
    assert_eq!(
        keychain.get_text(&account).expect("get").as_deref(),
        Some("v1")
    );

    keychain.replace(b"v2", &account).expect("replace");
    assert_eq!(
        keychain.get_text(&account).expect("get").as_deref(),
        Some("v2")
    );
    assert_eq!(backend.len(), 1);
}

#[test]
fn test_text_and_uuid_values() {
    let (backend, _) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");

    let text = common::account("greeting");
    keychain.insert_text("héllo wörld", &text).expect("insert text");
    assert_eq!(
        keychain.get_text(&text).expect("get text").as_deref(),
        Some("héllo wörld")
    );

    let id = common::account("installation-id");
    let uuid = Uuid::new_v4();
    keychain.insert_uuid(uuid, &id).expect("insert uuid");
    assert_eq!(keychain.get_uuid(&id).expect("get uuid"), Some(uuid));
    assert_eq!(
        keychain.get_text(&id).expect("get text"),
        Some(uuid.hyphenated().to_string())
    );
}

#[test]
fn test_non_utf8_and_non_uuid_payloads_are_invalid_data() {
    let (backend, _) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");

    let binary = common::account("binary");
    keychain.insert(&[0xff, 0xfe, 0xfd], &binary).expect("insert");
    assert!(matches!(
        keychain.get_text(&binary),
        Err(KeychainError::InvalidData { .. })
    ));

    let simple = common::account("simple-uuid");
    keychain
        .insert_text("67e5504410b1426f9247bb680e5fe0c8", &simple)
        .expect("insert");
    assert!(matches!(
        keychain.get_uuid(&simple),
        Err(KeychainError::InvalidData { .. })
    ));

    let garbage = common::account("garbage");
    keychain.insert_text("not-a-uuid", &garbage).expect("insert");
    assert!(matches!(
        keychain.get_uuid(&garbage),
        Err(KeychainError::InvalidData { .. })
    ));
}

#[test]
fn test_codec_values() {
    let (backend, _) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");

    let json = common::account("session.json");
    keychain
        .insert_value(&session(), &json, &JsonCodec)
        .expect("insert json");
    assert_eq!(
        keychain
            .get_value::<Session, _>(&json, &JsonCodec)
            .expect("get json"),
        Some(session())
    );

    let cbor = common::account("session.cbor");
    keychain
        .insert_value(&session(), &cbor, &CborCodec)
        .expect("insert cbor");
    assert_eq!(
        keychain
            .get_value::<Session, _>(&cbor, &CborCodec)
            .expect("get cbor"),
        Some(session())
    );

    // JSON text is not a valid `Session` in CBOR.
    let err = keychain
        .get_value::<Session, _>(&json, &CborCodec)
        .unwrap_err();
    assert!(matches!(
        err,
        KeychainError::Underlying(UnderlyingError::Codec(_))
    ));
}

#[test]
fn test_items_are_scoped() {
    let (backend, _) = common::memory_backend();
    let app = common::keychain(&backend, "com.example.app");
    let widget = common::keychain(&backend, "com.example.widget");
    let grouped = Keychain::builder(Arc::clone(&backend))
        .service(
            Service::new("com.example.app")
                .expect("service")
                .with_access_group("TEAMID.shared"),
        )
        .build();
    let default_namespace: Keychain<Arc<MemoryService>> = Keychain::new(Arc::clone(&backend));

    let local = common::account("token");
    let synced = common::account("token").with_synchronizable(true);

    app.insert_text("app", &local).expect("app insert");
    widget.insert_text("widget", &local).expect("widget insert");
    grouped.insert_text("grouped", &local).expect("grouped insert");
    default_namespace
        .insert_text("default", &local)
        .expect("default insert");
    app.insert_text("synced", &synced).expect("synced insert");
    assert_eq!(backend.len(), 5);

    assert_eq!(app.get_text(&local).expect("get").as_deref(), Some("app"));
    assert_eq!(
        widget.get_text(&local).expect("get").as_deref(),
        Some("widget")
    );
    assert_eq!(
        grouped.get_text(&local).expect("get").as_deref(),
        Some("grouped")
    );
    assert_eq!(
        default_namespace.get_text(&local).expect("get").as_deref(),
        Some("default")
    );
    assert_eq!(
        app.get_text(&synced).expect("get").as_deref(),
        Some("synced")
    );

    widget.delete(&local).expect("delete");
    assert!(!widget.exists(&local).expect("exists"));
    assert!(app.exists(&local).expect("exists"));
    assert!(app.exists(&synced).expect("exists"));
}

#[test]
fn test_exists_never_prompts() {
    let (backend, authenticator) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");
    let account = common::biometric_account("refresh-token");

    keychain.insert_text("secret", &account).expect("insert");
    assert!(keychain.exists(&account).expect("exists"));
    assert!(!keychain
        .exists(&common::biometric_account("other"))
        .expect("exists"));
    assert_eq!(authenticator.prompts(), 0);

    assert_eq!(
        keychain.get_text(&account).expect("get").as_deref(),
        Some("secret")
    );
    assert_eq!(authenticator.prompts(), 1);
}

#[test]
fn test_exists_while_locked() {
    let (backend, authenticator) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");
    let account = common::biometric_account("refresh-token");

    keychain.insert_text("secret", &account).expect("insert");
    backend.set_device_lock(DeviceLock::Locked);

    assert!(keychain.exists(&account).expect("exists"));
    assert!(matches!(
        keychain.get(&account),
        Err(KeychainError::AuthenticationFailed)
    ));
    assert_eq!(authenticator.prompts(), 0);
}

#[test]
fn test_failed_authentication() {
    let authenticator = common::CountingAuthenticator::scripted([
        AuthOutcome::Denied,
        AuthOutcome::Canceled,
    ]);
    let backend = Arc::new(MemoryService::with_authenticator(authenticator.clone()));
    let keychain = common::keychain(&backend, "com.example.app");
    let account = common::biometric_account("refresh-token");
    keychain.insert_text("secret", &account).expect("insert");

    assert!(matches!(
        keychain.get(&account),
        Err(KeychainError::AuthenticationFailed)
    ));
    assert!(matches!(
        keychain.get(&account),
        Err(KeychainError::AuthenticationFailed)
    ));
    assert_eq!(
        keychain.get_text(&account).expect("get").as_deref(),
        Some("secret")
    );
    assert_eq!(authenticator.prompts(), 3);
}

#[test]
fn test_bound_context_reuses_authentication() {
    let (backend, authenticator) = common::memory_backend();
    let keychain = Keychain::builder(Arc::clone(&backend))
        .service(Service::new("com.example.app").expect("service"))
        .auth_context(AuthContext::interactive().with_localized_reason("Unlock your account"))
        .build();
    let account = common::biometric_account("refresh-token");
    keychain.insert_text("secret", &account).expect("insert");

    for _ in 0..3 {
        assert_eq!(
            keychain.get_text(&account).expect("get").as_deref(),
            Some("secret")
        );
    }
    assert_eq!(authenticator.prompts(), 1);
    assert_eq!(
        authenticator.reasons(),
        vec![Some("Unlock your account".to_string())]
    );
}

#[test]
fn test_non_interactive_context_blocks_gated_reads() {
    let (backend, authenticator) = common::memory_backend();
    let keychain = Keychain::builder(Arc::clone(&backend))
        .service(Service::new("com.example.app").expect("service"))
        .auth_context(AuthContext::non_interactive())
        .build();
    let gated = common::biometric_account("refresh-token");
    let plain = common::account("settings");
    keychain.insert_text("secret", &gated).expect("insert");
    keychain.insert_text("dark-mode", &plain).expect("insert");

    assert!(matches!(
        keychain.get(&gated),
        Err(KeychainError::AuthenticationFailed)
    ));
    assert_eq!(
        keychain.get_text(&plain).expect("get").as_deref(),
        Some("dark-mode")
    );
    assert_eq!(authenticator.prompts(), 0);
}

#[test]
fn test_rejected_policies_write_nothing() {
    let (backend, _) = common::memory_backend();
    let keychain = common::keychain(&backend, "com.example.app");

    let mixed = common::account("mixed").with_access_constraints(AccessConstraints::any_of([
        AccessConstraint::UserPresence,
        AccessConstraint::BiometryAny,
    ]));
    assert!(matches!(
        keychain.insert_text("value", &mixed),
        Err(KeychainError::Underlying(UnderlyingError::AccessControl(_)))
    ));

    // Sync is incompatible with authentication constraints.
    let synced_biometric = common::biometric_account("synced").with_synchronizable(true);
    assert!(matches!(
        keychain.insert_text("value", &synced_biometric),
        Err(KeychainError::PlatformStatus(-50))
    ));
    assert!(backend.is_empty());
}
