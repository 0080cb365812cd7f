//! Integration test: credential vault — AES-128-GCM encrypted storage.
//!
//! Verifies that:
//! 1. Token records land in sled as ciphertext (raw bytes ≠ plaintext).
//! 2. Records survive an engine restart and decrypt to the original.
//! 3. A wrong key surfaces an integrity error instead of garbage.
//! 4. An engine without a key refuses to start.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use voxline_core::{CallEngine, EngineConfig, EngineError, TokenRecord, VaultError, KEY_LEN};

/// Deterministic test key (16 bytes). NOT for production.
fn test_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    for (i, b) in key.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(7).wrapping_add(42);
    }
    key
}

fn config_with_key(dir: &std::path::Path, key: &[u8; KEY_LEN]) -> EngineConfig {
    EngineConfig::new(dir.to_string_lossy().to_string(), Some(BASE64.encode(key)))
}

#[test]
fn tokens_are_ciphertext_on_disk_and_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = test_key();
    let secret = "super-secret-access-token";

    // Write with key, then release the database.
    {
        let engine = CallEngine::open(config_with_key(dir.path(), &key)).unwrap();
        let record = TokenRecord::new(secret)
            .with_refresh_token("refresh-me")
            .with_expiry(1_900_000_000);
        engine.tokens().set("alice", &record).unwrap();
        engine.flush().unwrap();
    }

    // Inspect the raw sled bytes, bypassing the vault entirely.
    {
        let db = sled::open(dir.path()).unwrap();
        let tree = db.open_tree("tokens").unwrap();
        let mut scanned = 0;
        for item in tree.iter() {
            let (_, value) = item.unwrap();
            let raw = String::from_utf8_lossy(&value);
            assert!(
                !raw.contains(secret),
                "raw sled data should be ciphertext, not plaintext"
            );
            assert!(
                !raw.contains("refresh-me"),
                "refresh token should be ciphertext too"
            );
            scanned += 1;
        }
        assert_eq!(scanned, 1, "exactly one token record on disk");
    }

    // Reopen with the same key: the record decrypts to the original.
    {
        let engine = CallEngine::open(config_with_key(dir.path(), &key)).unwrap();
        let record = engine.tokens().get("alice").unwrap().expect("record kept");
        assert_eq!(record.access_token, secret);
        assert_eq!(record.refresh_token.as_deref(), Some("refresh-me"));
        assert_eq!(record.expires_at, Some(1_900_000_000));
    }
}

#[test]
fn wrong_key_surfaces_an_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let key = test_key();

    {
        let engine = CallEngine::open(config_with_key(dir.path(), &key)).unwrap();
        engine.tokens().set("alice", &TokenRecord::new("at")).unwrap();
        engine.flush().unwrap();
    }

    let mut wrong_key = test_key();
    wrong_key[0] ^= 0xFF;
    let engine = CallEngine::open(config_with_key(dir.path(), &wrong_key)).unwrap();
    match engine.tokens().get("alice") {
        Err(EngineError::Vault(VaultError::DecryptionFailed(_))) => {}
        other => panic!("expected DecryptionFailed, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn engine_without_key_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::new(dir.path().to_string_lossy().to_string(), None);
    assert!(matches!(
        CallEngine::open(config),
        Err(EngineError::Vault(VaultError::KeyMissing))
    ));
}
