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

//! Persistent swarm identity, so the node keeps its peer id (and the provider
//! records others hold for it) across restarts.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use libp2p::{identity, PeerId};
use thiserror::Error;

/// Identity file name inside the data directory.
pub const IDENTITY_FILE: &str = "swarm_identity.key";

/// Identity errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity io: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity key is not a valid protobuf keypair")]
    Decode,
}

/// Load the keypair under `data_dir`, generating and storing an ed25519 one
/// on first start.
pub fn load_or_create_identity(
    data_dir: impl AsRef<Path>,
) -> Result<(PeerId, identity::Keypair), IdentityError> {
    let dir = data_dir.as_ref();
    fs::create_dir_all(dir)?;

    let path: PathBuf = dir.join(IDENTITY_FILE);
    if path.exists() {
        let bytes = fs::read(&path)?;
        let kp =
            identity::Keypair::from_protobuf_encoding(&bytes).map_err(|_| IdentityError::Decode)?;
        return Ok((PeerId::from(kp.public()), kp));
    }

    let kp = identity::Keypair::generate_ed25519();
    let bytes = kp
        .to_protobuf_encoding()
        .map_err(|_| IdentityError::Decode)?;

    // Write then rename so a crash never leaves a truncated key behind.
    let tmp = dir.join(format!("{IDENTITY_FILE}.tmp"));
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, &path)?;

    Ok((PeerId::from(kp.public()), kp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_stable_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = load_or_create_identity(dir.path()).unwrap();
        let (b, _) = load_or_create_identity(dir.path()).unwrap();
        assert_eq!(a, b);
        assert!(dir.path().join(IDENTITY_FILE).exists());
    }

    #[test]
    fn corrupt_identity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(IDENTITY_FILE), b"garbage").unwrap();
        assert!(matches!(
            load_or_create_identity(dir.path()),
            Err(IdentityError::Decode)
        ));
    }
}
