//! Shard snapshot storage.
//!
//! An account's users are split across `NPARTITION` horizontal shards; each
//! `(account, index, version)` triple names one immutable snapshot file,
//! `{account}_{index}_v{version}.dat`, holding one JSON user record per
//! line. Queries read whichever version the caller pins; a missing file is
//! simply an empty shard, since small accounts rarely populate all
//! partitions.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::model::User;

/// Snapshot file name for one partition of an account.
pub fn shard_file(account_id: &str, index: usize, version: u64) -> String {
    format!("{}_{}_v{}.dat", account_id, index, version)
}

/// Reject anything that could escape the data root. Snapshot names are flat:
/// no separators, no parent references.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("empty shard file name");
    }
    if name.contains("..")
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        bail!("invalid shard file name: {:?}", name);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ShardStore {
    root: PathBuf,
}

impl ShardStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating shard root {}", root.display()))?;
        Ok(ShardStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Load a shard snapshot. A missing file is an empty shard.
    pub fn load(&self, name: &str) -> Result<Vec<User>> {
        let path = self.resolve(name)?;
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("opening {}", path.display())),
        };
        let mut users = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let user: User = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid user record", path.display(), lineno + 1))?;
            users.push(user);
        }
        debug!(target: "segcore::storage", "loaded {} users from {}", users.len(), name);
        Ok(users)
    }

    /// Write a snapshot; used by ingest tooling and tests.
    pub fn write(&self, name: &str, users: &[User]) -> Result<()> {
        let path = self.resolve(name)?;
        let mut buf = String::new();
        for u in users {
            buf.push_str(&serde_json::to_string(u)?);
            buf.push('\n');
        }
        fs::write(&path, buf).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
