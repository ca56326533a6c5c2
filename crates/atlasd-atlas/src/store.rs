//! Zone-file blob storage: content-addressed files under `zonefile_dir`,
//! keyed by the hex-encoded value hash the chain commits to (invariant I2
//! in the core is enforced by the caller; this store only persists bytes
//! once a commitment has already been checked).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub struct ZonefileStore {
    dir: PathBuf,
}

impl ZonefileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, hash_hex: &str) -> PathBuf {
        self.dir.join(format!("{hash_hex}.zf"))
    }

    pub fn has(&self, hash_hex: &str) -> bool {
        self.path_for(hash_hex).is_file()
    }

    pub fn get(&self, hash_hex: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(hash_hex);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    pub fn put(&self, hash_hex: &str, bytes: &[u8]) -> Result<()> {
        fs::write(self.path_for(hash_hex), bytes)?;
        Ok(())
    }

    pub fn count(&self) -> Result<u64> {
        let mut n = 0u64;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some("zf") {
                n += 1;
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ZonefileStore::open(dir.path()).unwrap();
        store.put("abcd", b"hello").unwrap();
        assert!(store.has("abcd"));
        assert_eq!(store.get("abcd").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ZonefileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn count_tracks_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ZonefileStore::open(dir.path()).unwrap();
        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }
}
