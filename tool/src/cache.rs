//! The intermediate state root cache: `block number => root`, persisted as a
//! flat JSON object (`{"0": "0x…", "1": "0x…"}`).
//!
//! The cache always covers a prefix `0..len` of the chain, so its length is
//! the block to resume from.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use ethereum_types::H256;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cache file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("cache has no root for block {0} but has later blocks")]
    Hole(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImRootCache {
    roots: BTreeMap<u64, H256>,
}

impl ImRootCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `roots` only if they cover `0..roots.len()` exactly.
    pub fn from_map(roots: BTreeMap<u64, H256>) -> Result<Self, CacheError> {
        match first_missing(&roots) {
            Some(missing) => Err(CacheError::Hole(missing)),
            None => Ok(Self { roots }),
        }
    }

    /// Keeps the longest gap-free prefix of `roots`, dropping everything past
    /// the first missing block.
    pub fn from_prefix(mut roots: BTreeMap<u64, H256>) -> Self {
        if let Some(missing) = first_missing(&roots) {
            let dropped = roots.split_off(&missing);
            warn!(
                missing,
                dropped = dropped.len(),
                "dropping intermediate state roots past a missing block"
            );
        }
        Self { roots }
    }

    /// Loads the cache at `path`. A missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "cache file does not exist");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let de = &mut serde_json::Deserializer::from_slice(&bytes);
        let roots = serde_path_to_error::deserialize(de).map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let cache = Self::from_map(roots)?;
        info!(path = %path.display(), len = cache.len(), "cache file loaded");
        Ok(cache)
    }

    /// Rewrites the file at `path` with the full cache.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let io = |source: std::io::Error| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_vec(&self.roots).map_err(|e| io(e.into()))?;
        fs::write(path, json).map_err(io)?;
        info!(path = %path.display(), len = self.len(), "cache file written");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn get(&self, block: u64) -> Option<H256> {
        self.roots.get(&block).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, H256)> + '_ {
        self.roots.iter().map(|(block, root)| (*block, *root))
    }

    pub fn into_map(self) -> BTreeMap<u64, H256> {
        self.roots
    }
}

fn first_missing(roots: &BTreeMap<u64, H256>) -> Option<u64> {
    (0u64..)
        .zip(roots.keys())
        .find(|(expected, found)| expected != *found)
        .map(|(expected, _)| expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots(blocks: impl IntoIterator<Item = u64>) -> BTreeMap<u64, H256> {
        blocks
            .into_iter()
            .map(|block| (block, H256::from_low_u64_be(block + 1)))
            .collect()
    }

    #[test]
    fn file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roots.json");

        let cache = ImRootCache::from_map(roots(0..2)).unwrap();
        cache.save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            concat!(
                r#"{"0":"0x0000000000000000000000000000000000000000000000000000000000000001","#,
                r#""1":"0x0000000000000000000000000000000000000000000000000000000000000002"}"#
            )
        );
        assert_eq!(ImRootCache::load(&path).unwrap(), cache);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImRootCache::load(&dir.path().join("nope.json"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn holes_are_rejected() {
        assert!(matches!(
            ImRootCache::from_map(roots([0, 1, 3])),
            Err(CacheError::Hole(2))
        ));
        assert!(matches!(
            ImRootCache::from_map(roots([1])),
            Err(CacheError::Hole(0))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roots.json");
        let mut with_hole = roots(0..2);
        with_hole.insert(5, H256::zero());
        fs::write(&path, serde_json::to_vec(&with_hole).unwrap()).unwrap();
        assert!(matches!(
            ImRootCache::load(&path),
            Err(CacheError::Hole(2))
        ));
    }

    #[test]
    fn prefix_stops_at_first_hole() {
        let cache = ImRootCache::from_prefix(roots([0, 1, 2, 5, 6]));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(2), Some(H256::from_low_u64_be(3)));
        assert_eq!(cache.get(5), None);
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roots.json");
        fs::write(&path, r#"{"0":"not hex"}"#).unwrap();
        assert!(matches!(
            ImRootCache::load(&path),
            Err(CacheError::Json { .. })
        ));
    }
}
