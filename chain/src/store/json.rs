//! JSON-file-backed chain store.
//!
//! Persists the full block sequence as a single `chain.json` array under a
//! per-node data directory. Writes are atomic (write-temp, then rename);
//! a missing, empty, or malformed file at load time is backed up with a
//! timestamped suffix and the store restarts from genesis.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{ChainStore, StoreError, validate_append};
use crate::types::Block;

/// File-backed implementation of [`ChainStore`].
///
/// Keeps the full decoded chain in memory (mirroring what is on disk) so
/// reads never touch the filesystem; only `append` writes through.
pub struct JsonChainStore {
    path: PathBuf,
    blocks: Vec<Block>,
}

impl JsonChainStore {
    /// Opens (or creates) the chain file at `dir/chain.json`.
    ///
    /// If the file is missing, empty, or fails to parse, it is backed up
    /// (when present) as `chain.json.bak.<unix-seconds>` and a fresh store
    /// seeded with the deterministic genesis block is returned.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let path = dir.join("chain.json");

        match Self::load(&path) {
            Ok(blocks) if !blocks.is_empty() => Ok(Self { path, blocks }),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "chain file empty, reinitializing from genesis");
                Self::backup_and_reset(&path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "chain file unreadable, reinitializing from genesis");
                Self::backup_and_reset(&path)
            }
        }
    }

    fn load(path: &Path) -> Result<Vec<Block>, StoreError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let blocks: Vec<Block> =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(blocks)
    }

    fn backup_and_reset(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let backup = path.with_file_name(format!(
                "{}.bak.{ts}",
                path.file_name().and_then(|n| n.to_str()).unwrap_or("chain.json")
            ));
            fs::rename(path, &backup)?;
            tracing::warn!(backup = %backup.display(), "backed up corrupt/unreadable chain file");
        }
        let store = Self {
            path: path.to_path_buf(),
            blocks: vec![Block::genesis()],
        };
        store.save()?;
        Ok(store)
    }

    fn tip(&self) -> &Block {
        self.blocks.last().expect("store always has at least genesis")
    }

    /// Writes the full block list atomically: serialize to a temp file in
    /// the same directory, then rename it over the real path. A crash
    /// mid-write leaves the previous `chain.json` intact.
    fn save(&self) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&self.blocks)
            .expect("Vec<Block> is always JSON-serializable");
        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl ChainStore for JsonChainStore {
    fn height(&self) -> u64 {
        self.tip().height
    }

    fn head_hash(&self) -> crate::types::Hash256 {
        self.tip().block_hash
    }

    fn get(&self, height: u64) -> Option<Block> {
        self.blocks.get(height as usize).cloned()
    }

    fn append(&mut self, block: Block) -> Result<(), StoreError> {
        validate_append(self.tip(), &block)?;
        // Append in memory first, then persist; on write failure roll
        // the in-memory state back so the store reflects only what is
        // durably on disk.
        self.blocks.push(block);
        if let Err(e) = self.save() {
            self.blocks.pop();
            return Err(e);
        }
        Ok(())
    }
}
