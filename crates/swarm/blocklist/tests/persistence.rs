//! Blocklist behaviour over a durable store.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use vertex_clock::ManualClock;
use vertex_storage::StateStore;
use vertex_storage_redb::RedbStateStore;
use vertex_swarm_blocklist::{Blocklist, KEY_PREFIX};

const MINUTE: Duration = Duration::from_secs(60);

fn peer(n: u8) -> B256 {
    B256::with_last_byte(n)
}

#[test]
fn blocks_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("blocklist.redb");
    let clock = ManualClock::default();

    {
        let store = RedbStateStore::open_with_create_dir(&path).unwrap();
        let blocklist = Blocklist::with_clock(store, clock.clone());
        blocklist.add(&peer(1), 5 * MINUTE).unwrap();
        blocklist.add(&peer(2), Duration::ZERO).unwrap();
    }

    clock.advance(4 * MINUTE);
    let store = RedbStateStore::open(&path).unwrap();
    let blocklist = Blocklist::with_clock(store, clock.clone());
    assert!(blocklist.exists(&peer(1)).unwrap());
    assert!(blocklist.exists(&peer(2)).unwrap());
    assert_eq!(blocklist.peers().unwrap(), [peer(1), peer(2)]);

    clock.advance(2 * MINUTE);
    assert_eq!(blocklist.peers().unwrap(), [peer(2)]);
    assert!(!blocklist.exists(&peer(1)).unwrap());
    assert!(blocklist.entry(&peer(1)).unwrap().is_none());
}

#[test]
fn shares_a_store_with_other_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RedbStateStore::open(dir.path().join("state.redb")).unwrap());
    store.put("addressbook-01", b"entry").unwrap();
    store.put("zzz", b"last").unwrap();

    let blocklist = Blocklist::with_clock(store.clone(), ManualClock::default());
    blocklist.add(&peer(7), MINUTE).unwrap();

    assert_eq!(blocklist.peers().unwrap(), [peer(7)]);

    let mut keys = Vec::new();
    store
        .iterate(KEY_PREFIX, &mut |key, _| {
            keys.push(key.to_owned());
            Ok(false)
        })
        .unwrap();
    assert_eq!(keys, [format!("{KEY_PREFIX}{}", alloy_primitives::hex::encode(peer(7)))]);
}

#[test]
fn concurrent_readers_and_writers() {
    let dir = tempfile::tempdir().unwrap();
    let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();
    let clock = ManualClock::default();
    let blocklist = Blocklist::with_clock(store, clock.clone());

    std::thread::scope(|s| {
        for n in 0..4u8 {
            let blocklist = &blocklist;
            s.spawn(move || {
                for i in 0..8u8 {
                    blocklist.add(&peer(n * 8 + i), MINUTE).unwrap();
                }
            });
        }
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..16 {
                    let peers = blocklist.peers().unwrap();
                    assert!(peers.len() <= 32);
                }
            });
        }
    });

    assert_eq!(blocklist.peers().unwrap().len(), 32);

    clock.advance(2 * MINUTE);
    assert!(blocklist.peers().unwrap().is_empty());
}
