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

mod common;

use common::*;
use namechain::core::codec::transaction::name_hash;
use namechain::core::codec::{BlockError, DecodeError, Name, Transaction, TxKind};
use namechain::core::state::engine::{Applied, DenyAll, EngineError, Rejection, RENEW_WINDOW};
use namechain::core::types::PublishHash;
use std::sync::Arc;

fn allow(recipient: u8) -> Arc<AllowAll> {
    Arc::new(AllowAll {
        recipient: key(recipient),
    })
}

#[test]
fn acquire_registers_owner() {
    let n = node(Arc::new(DenyAll));
    let b = block(1, vec![acquire(7, "alice")]);
    let applied = n.engine.add_block(&b.encode()).unwrap();
    assert_eq!(
        applied,
        Applied::Accepted {
            height: 1,
            content_id: *b.content_id()
        }
    );
    let rec = n.engine.name(&name_hash("alice")).unwrap().unwrap();
    assert_eq!(rec.owner, key(7));
    assert!(rec.name.is_empty());
    assert_eq!(rec.publish_hash, PublishHash::default());
    assert_eq!(n.engine.height().unwrap(), 1);
    assert_eq!(n.engine.content_id_at(1).unwrap(), Some(*b.content_id()));
}

#[test]
fn authorized_transfer_changes_owner() {
    let n = node(allow(9));
    n.engine.add_block(&block(1, vec![acquire(7, "alice")]).encode()).unwrap();
    n.engine.add_block(&block(2, vec![transfer("alice")]).encode()).unwrap();
    assert_eq!(n.engine.name(&name_hash("alice")).unwrap().unwrap().owner, key(9));
    assert_eq!(n.engine.height().unwrap(), 2);
}

#[test]
fn denied_transfer_rejects_block_and_keeps_state() {
    let n = node(Arc::new(DenyAll));
    n.engine.add_block(&block(1, vec![acquire(7, "alice")]).encode()).unwrap();
    let err = n
        .engine
        .add_block(&block(2, vec![transfer("alice")]).encode())
        .unwrap_err();
    match err {
        EngineError::Invalid(v) => {
            assert_eq!(v.index, 0);
            assert_eq!(v.kind, TxKind::Transfer);
            assert!(matches!(v.reason, Rejection::Unauthorized(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(n.engine.name(&name_hash("alice")).unwrap().unwrap().owner, key(7));
    assert_eq!(n.engine.height().unwrap(), 1);
}

#[test]
fn rejection_at_index_k_leaves_registry_untouched() {
    let n = node(Arc::new(DenyAll));
    n.engine.add_block(&block(1, vec![acquire(1, "taken")]).encode()).unwrap();
    let before_height = n.engine.height().unwrap();

    let b = block(
        2,
        vec![acquire(2, "bob"), acquire(3, "carol"), acquire(4, "taken")],
    );
    match n.engine.add_block(&b.encode()) {
        Err(EngineError::Invalid(v)) => {
            assert_eq!(v.index, 2);
            assert_eq!(v.reason, Rejection::NameTaken(name_hash("taken")));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(n.engine.height().unwrap(), before_height);
    assert!(n.engine.name(&name_hash("bob")).unwrap().is_none());
    assert!(n.engine.name(&name_hash("carol")).unwrap().is_none());
    assert_eq!(n.engine.name(&name_hash("taken")).unwrap().unwrap().owner, key(1));
    assert!(n.engine.block_bytes(b.content_id()).unwrap().is_none());
}

#[test]
fn duplicate_acquire_within_one_block_is_rejected() {
    let n = node(Arc::new(DenyAll));
    let b = block(1, vec![acquire(1, "dup"), acquire(2, "dup")]);
    match n.engine.add_block(&b.encode()) {
        Err(EngineError::Invalid(v)) => assert_eq!(v.index, 1),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(n.engine.height().unwrap(), 0);
}

#[test]
fn later_transactions_see_earlier_effects() {
    let n = node(allow(5));
    let b = block(1, vec![acquire(1, "alice"), publish("alice", 0xcd)]);
    n.engine.add_block(&b.encode()).unwrap();
    let rec = n.engine.name(&name_hash("alice")).unwrap().unwrap();
    assert_eq!(rec.owner, key(1));
    assert_eq!(rec.name, b"alice");
    assert_eq!(rec.publish_hash, PublishHash::from_bytes([0xcd; 20]));
}

#[test]
fn non_utf8_name_is_published_as_bytes() {
    let n = node(allow(5));
    let raw = [0xffu8, 0xfe, b'x'];
    let b = block(
        1,
        vec![
            Transaction::Acquire {
                owner: key(1),
                name_hash: name_hash(raw),
            },
            Transaction::Publish {
                publish_hash: PublishHash::from_bytes([0xab; 20]),
                name: Name::new(&raw[..]).unwrap(),
            },
        ],
    );
    n.engine.add_block(&b.encode()).unwrap();
    let rec = n.engine.name(&name_hash(raw)).unwrap().unwrap();
    assert_eq!(rec.name, raw);
    assert_eq!(rec.publish_hash, PublishHash::from_bytes([0xab; 20]));
}

#[test]
fn publish_of_unknown_name_is_rejected() {
    let n = node(allow(5));
    match n.engine.add_block(&block(1, vec![publish("ghost", 1)]).encode()) {
        Err(EngineError::Invalid(v)) => {
            assert_eq!(v.reason, Rejection::UnknownName(name_hash("ghost")))
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn reapplying_a_block_is_acknowledged_without_changes() {
    let n = node(Arc::new(DenyAll));
    let b = block(1, vec![acquire(7, "alice")]);
    n.engine.add_block(&b.encode()).unwrap();
    let again = n.engine.add_block(&b.encode()).unwrap();
    assert_eq!(
        again,
        Applied::AlreadyKnown {
            content_id: *b.content_id()
        }
    );
    assert_eq!(n.engine.height().unwrap(), 1);
}

#[test]
fn renew_must_reference_a_recent_block() {
    let n = node(allow(1));
    let first = block(1, vec![acquire(1, "alice")]);
    n.engine.add_block(&first.encode()).unwrap();
    for salt in 2..=RENEW_WINDOW as u8 {
        n.engine.add_block(&block(salt, vec![]).encode()).unwrap();
    }
    assert_eq!(n.engine.height().unwrap(), RENEW_WINDOW as u64);

    // The first block is still the oldest of the last ten.
    let fresh = block(100, vec![renew("alice", *first.block_hash())]);
    n.engine.add_block(&fresh.encode()).unwrap();

    // One more block pushes it out of the window.
    let stale = block(101, vec![renew("alice", *first.block_hash())]);
    match n.engine.add_block(&stale.encode()) {
        Err(EngineError::Invalid(v)) => {
            assert_eq!(v.reason, Rejection::StaleReference(*first.block_hash()))
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn renew_is_owner_gated() {
    let n = node(Arc::new(DenyAll));
    let first = block(1, vec![acquire(1, "alice")]);
    n.engine.add_block(&first.encode()).unwrap();
    let r = n
        .engine
        .add_block(&block(2, vec![renew("alice", *first.block_hash())]).encode());
    assert!(matches!(
        r,
        Err(EngineError::Invalid(v)) if matches!(v.reason, Rejection::Unauthorized(_))
    ));
}

#[test]
fn malformed_bytes_are_decode_errors() {
    let n = node(Arc::new(DenyAll));
    assert_eq!(
        n.engine.add_block(&[0u8; 10]),
        Err(EngineError::Block(BlockError::Decode(DecodeError::BlockTooShort(10))))
    );
    let mut bytes = block(1, vec![acquire(1, "a")]).encode();
    bytes[0] ^= 1;
    assert!(matches!(
        n.engine.add_block(&bytes),
        Err(EngineError::Block(BlockError::HashMismatch { .. }))
    ));
    assert_eq!(n.engine.height().unwrap(), 0);
}

#[test]
fn check_block_is_a_dry_run() {
    let n = node(Arc::new(DenyAll));
    let b = block(1, vec![acquire(1, "alice")]);
    let checked = n.engine.check_block(&b.encode()).unwrap();
    assert_eq!(checked.content_id(), b.content_id());
    assert_eq!(n.engine.height().unwrap(), 0);
    assert!(n.engine.name(&name_hash("alice")).unwrap().is_none());
}

#[test]
fn undo_restores_previous_state() {
    let n = node(allow(9));
    let b1 = block(1, vec![acquire(7, "alice")]);
    let b2 = block(2, vec![transfer("alice"), acquire(3, "bob")]);
    n.engine.add_block(&b1.encode()).unwrap();
    n.engine.add_block(&b2.encode()).unwrap();
    assert_eq!(n.engine.name(&name_hash("alice")).unwrap().unwrap().owner, key(9));

    assert_eq!(n.engine.undo_block().unwrap(), 1);
    assert_eq!(n.engine.height().unwrap(), 1);
    assert_eq!(n.engine.name(&name_hash("alice")).unwrap().unwrap().owner, key(7));
    assert!(n.engine.name(&name_hash("bob")).unwrap().is_none());
    assert!(n.engine.block_bytes(b2.content_id()).unwrap().is_none());
    assert_eq!(n.engine.content_id_at(2).unwrap(), None);

    // The rolled-back block can be applied again.
    assert!(matches!(
        n.engine.add_block(&b2.encode()).unwrap(),
        Applied::Accepted { height: 2, .. }
    ));

    n.engine.undo_block().unwrap();
    n.engine.undo_block().unwrap();
    assert_eq!(n.engine.undo_block(), Err(EngineError::NothingToUndo));
    assert!(n.engine.name(&name_hash("alice")).unwrap().is_none());
}

#[test]
fn block_index_replays_in_height_order() {
    let n = node(Arc::new(DenyAll));
    let blocks: Vec<_> = (1..=3u8)
        .map(|i| block(i, vec![acquire(i, &format!("name{i}"))]))
        .collect();
    for b in &blocks {
        n.engine.add_block(&b.encode()).unwrap();
    }
    for (h, b) in (1u64..).zip(&blocks) {
        let stored = n.engine.block_at(h).unwrap().unwrap();
        assert_eq!(stored.content_id(), b.content_id());
        assert_eq!(stored.encode(), b.encode());
    }
    assert!(n.engine.block_at(4).unwrap().is_none());
}
