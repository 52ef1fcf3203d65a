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
#![warn(missing_docs)]

//! Content identifiers.
//!
//! A block is addressed by the BitTorrent v1 info-hash of a single-file torrent
//! holding its bytes. The id is info-hash compatible; transfer itself runs over
//! the node's own block protocol. The info dictionary is bencoded with sorted
//! keys:
//!
//! ```text
//! d5:filesld6:lengthi<N>e4:pathl64:<hex sha256(bytes)>eee
//!  4:name0:12:piece lengthi262144e6:pieces<20 * pieces>:<sha1 of each piece>e
//! ```

use crate::core::crypto::{sha1, sha256};
use crate::core::types::ContentId;

/// Torrent piece length.
pub const PIECE_LENGTH: usize = 256 * 1024;

/// Content id of serialized block bytes.
pub fn content_id(bytes: &[u8]) -> ContentId {
    ContentId::from_bytes(sha1(&info_dict(bytes)))
}

/// Bencoded info dictionary for `bytes`.
pub fn info_dict(bytes: &[u8]) -> Vec<u8> {
    let file_name = hex::encode(sha256(bytes));
    let pieces: Vec<u8> = bytes.chunks(PIECE_LENGTH).flat_map(sha1).collect();

    let mut out = Vec::with_capacity(160 + pieces.len());
    out.push(b'd');
    bstr(&mut out, b"files");
    out.push(b'l');
    out.push(b'd');
    bstr(&mut out, b"length");
    bint(&mut out, bytes.len() as u64);
    bstr(&mut out, b"path");
    out.push(b'l');
    bstr(&mut out, file_name.as_bytes());
    out.push(b'e');
    out.push(b'e');
    out.push(b'e');
    bstr(&mut out, b"name");
    bstr(&mut out, b"");
    bstr(&mut out, b"piece length");
    bint(&mut out, PIECE_LENGTH as u64);
    bstr(&mut out, b"pieces");
    bstr(&mut out, &pieces);
    out.push(b'e');
    out
}

fn bstr(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(s.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(s);
}

fn bint(out: &mut Vec<u8>, v: u64) {
    out.push(b'i');
    out.extend_from_slice(v.to_string().as_bytes());
    out.push(b'e');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_dict_layout() {
        let data = b"abcdefghijklmnopq";
        let dict = info_dict(data);
        let expected_prefix = format!(
            "d5:filesld6:lengthi17e4:pathl64:{}eee4:name0:12:piece lengthi262144e6:pieces20:",
            hex::encode(sha256(data))
        );
        assert!(dict.starts_with(expected_prefix.as_bytes()));
        assert_eq!(&dict[expected_prefix.len()..dict.len() - 1], &sha1(data));
        assert_eq!(dict.last(), Some(&b'e'));
    }

    #[test]
    fn deterministic_and_sensitive() {
        assert_eq!(content_id(b"block"), content_id(b"block"));
        assert_ne!(content_id(b"block"), content_id(b"blocl"));
    }
}
