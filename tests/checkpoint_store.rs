// Copyright (c) 2026 Namechain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

use namechain::core::state::checkpoint_store::{
    Checkpoint, CheckpointError, CheckpointStore, CHECKPOINT_TREE, KEY_LAST_COMMITMENT,
    KEY_SCANNED_HEIGHT,
};
use namechain::core::state::kv::open_db;
use namechain::core::types::Txid;

fn cp(h: u64, t: u8) -> Checkpoint {
    Checkpoint {
        scanned_height: h,
        last_commitment: Txid::from_bytes([t; 32]),
    }
}

#[test]
fn absent_checkpoint_falls_back_to_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).unwrap();
    let store = CheckpointStore::open(&db).unwrap();
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(store.load_or(cp(670_000, 0xaa)).unwrap(), cp(670_000, 0xaa));
}

#[test]
fn save_then_load_round_trips_both_fields() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).unwrap();
    let store = CheckpointStore::open(&db).unwrap();
    store.save(&cp(670_001, 1)).unwrap();
    store.save(&cp(670_001, 2)).unwrap();
    store.save(&cp(670_005, 3)).unwrap();
    assert_eq!(store.load().unwrap(), Some(cp(670_005, 3)));
    assert_eq!(store.load_or(cp(0, 0)).unwrap(), cp(670_005, 3));
}

#[test]
fn height_never_moves_backwards() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).unwrap();
    let store = CheckpointStore::open(&db).unwrap();
    store.save(&cp(10, 1)).unwrap();
    assert_eq!(
        store.save(&cp(9, 2)),
        Err(CheckpointError::Regression { stored: 10, new: 9 })
    );
    assert_eq!(store.load().unwrap(), Some(cp(10, 1)));
}

#[test]
fn partial_checkpoint_is_an_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).unwrap();
    let tree = db.open_tree(CHECKPOINT_TREE).unwrap();
    tree.insert(KEY_SCANNED_HEIGHT, 670_010u64.to_be_bytes().to_vec()).unwrap();

    let store = CheckpointStore::open(&db).unwrap();
    assert!(matches!(store.load(), Err(CheckpointError::Partial { .. })));
    assert!(matches!(
        store.load_or(cp(670_000, 0xaa)),
        Err(CheckpointError::Partial { .. })
    ));

    tree.remove(KEY_SCANNED_HEIGHT).unwrap();
    tree.insert(KEY_LAST_COMMITMENT, [1u8; 32].to_vec()).unwrap();
    assert!(matches!(store.load(), Err(CheckpointError::Partial { .. })));
}

#[test]
fn malformed_fields_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).unwrap();
    let tree = db.open_tree(CHECKPOINT_TREE).unwrap();
    tree.insert(KEY_SCANNED_HEIGHT, vec![1u8, 2, 3]).unwrap();
    tree.insert(KEY_LAST_COMMITMENT, [1u8; 32].to_vec()).unwrap();
    let store = CheckpointStore::open(&db).unwrap();
    assert_eq!(
        store.load(),
        Err(CheckpointError::Malformed("scanned height"))
    );
}
