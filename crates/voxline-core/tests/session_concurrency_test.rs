//! Integration test: concurrent session writes.
//!
//! Verifies that:
//! 1. Parallel history appends for one call all land, each exactly once.
//! 2. Interleaved field updates never clobber each other's keys.
//! 3. The escalation flag stays raised across concurrent writes.

use std::collections::HashSet;
use voxline_core::{CallEngine, EngineConfig};

const WRITERS: usize = 6;
const APPENDS_PER_WRITER: usize = 20;

fn open_engine(dir: &tempfile::TempDir) -> CallEngine {
    let mut config = EngineConfig::new(
        dir.path().to_string_lossy().to_string(),
        Some("AAAAAAAAAAAAAAAAAAAAAA==".to_string()),
    );
    // Six writers hammering one record need more headroom than a live call.
    config.history_retry_limit = 1_000;
    CallEngine::open(config).expect("engine opens")
}

#[test]
fn concurrent_appends_land_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&dir);
    let sessions = engine.sessions();

    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let store = sessions.clone();
            scope.spawn(move || {
                for n in 0..APPENDS_PER_WRITER {
                    store
                        .append_history("call1", &format!("writer{}", writer), &format!("line {}", n))
                        .expect("append");
                }
            });
        }
    });

    let history = sessions.history("call1").unwrap();
    assert_eq!(history.len(), WRITERS * APPENDS_PER_WRITER);

    let unique: HashSet<(String, String)> = history
        .iter()
        .map(|entry| (entry.speaker.clone(), entry.text.clone()))
        .collect();
    assert_eq!(
        unique.len(),
        WRITERS * APPENDS_PER_WRITER,
        "every append appears exactly once, none duplicated or lost"
    );
}

#[test]
fn interleaved_field_updates_do_not_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&dir);
    let sessions = engine.sessions();

    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let store = sessions.clone();
            scope.spawn(move || {
                let key = format!("field{}", writer);
                store.update_field("call1", &key, "set").expect("update");
            });
        }
    });

    let fields = sessions.get("call1").unwrap();
    for writer in 0..WRITERS {
        assert_eq!(
            fields.get(&format!("field{}", writer)).map(String::as_str),
            Some("set"),
            "field{} must survive the other writers",
            writer
        );
    }
}

#[test]
fn escalation_flag_survives_concurrent_traffic() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&dir);
    let sessions = engine.sessions();

    sessions.flag_escalation("call1").unwrap();

    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let store = sessions.clone();
            scope.spawn(move || {
                for n in 0..APPENDS_PER_WRITER {
                    store
                        .append_history("call1", &format!("writer{}", writer), &format!("line {}", n))
                        .expect("append");
                }
            });
        }
    });

    assert!(
        sessions.is_escalation_required("call1").unwrap(),
        "the flag is monotonic: no concurrent write may lower it"
    );
}
