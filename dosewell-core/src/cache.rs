//! Fingerprinted persistence for raw analysis results.
//!
//! Recomputing per-well scores from images is the slow half of a run, so the
//! raw label-keyed results are cached as JSON under a fingerprint of every
//! input that could change them. Reads are permissive: a missing or corrupt
//! cache file just means recomputation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use sha1::{Digest, Sha1};

use crate::condition::RawResults;

/// The inputs whose change must invalidate a cached result set.
#[derive(Clone, Debug)]
pub struct CacheKey<'a> {
    pub imagefiles: &'a [String],
    pub cap: i64,
    pub group_pattern: &'a str,
    pub platefile: Option<&'a str>,
    pub plate_control: &'a [String],
    pub plate_ignore: &'a [String],
}

impl CacheKey<'_> {
    /// Deterministic fingerprint: set-like inputs are sorted first, so
    /// argument order does not thrash the cache.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha1::new();
        let mut feed = |name: &str, values: &[String]| {
            let mut values: Vec<&String> = values.iter().collect();
            values.sort();
            hasher.update(name.as_bytes());
            for value in values {
                hasher.update(b"\x1f");
                hasher.update(value.as_bytes());
            }
            hasher.update(b"\x1e");
        };
        feed("imagefiles", self.imagefiles);
        feed("plate_control", self.plate_control);
        feed("plate_ignore", self.plate_ignore);
        hasher.update(format!("cap={}\x1e", self.cap).as_bytes());
        hasher.update(format!("group_pattern={}\x1e", self.group_pattern).as_bytes());
        hasher.update(format!("platefile={}\x1e", self.platefile.unwrap_or("")).as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// A directory of fingerprint-named JSON result files.
#[derive(Clone, Debug)]
pub struct ResultsCache {
    dir: PathBuf,
}

impl ResultsCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        ResultsCache { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }

    /// Load the cached results for a fingerprint. Any failure (absent file,
    /// unreadable file, malformed JSON) is a cache miss, not an error.
    pub fn load(&self, fingerprint: &str) -> Option<RawResults> {
        let path = self.path(fingerprint);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!("cache miss at {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<BTreeMap<String, Vec<f64>>>(&text) {
            Ok(results) => {
                debug!("cache hit at {} ({} conditions)", path.display(), results.len());
                Some(results)
            }
            Err(e) => {
                warn!("ignoring corrupt cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Overwrite the cache entry for a fingerprint. Failure to persist is
    /// warned about but never fails the run.
    pub fn store(&self, fingerprint: &str, results: &RawResults) {
        let path = self.path(fingerprint);
        let write = || -> std::io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let text = serde_json::to_string(results)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            fs::write(&path, text)
        };
        if let Err(e) = write() {
            warn!("failed to write cache file {}: {}", path.display(), e);
        }
    }
}
