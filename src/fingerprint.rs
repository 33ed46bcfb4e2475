use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
#[error("failed to read '{}' for hashing: {source}", path.display())]
pub struct FingerprintError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Lowercase hex SHA-256 digest of a file's raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex comparison ignoring case and surrounding whitespace of the stored text.
    pub fn matches(&self, recorded: &str) -> bool {
        self.0.eq_ignore_ascii_case(recorded.trim())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Streams the file through the hasher; never holds the whole file in memory.
pub fn compute_fingerprint(path: &Path) -> Result<Fingerprint, FingerprintError> {
    let to_error = |source| FingerprintError {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(to_error)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(to_error)?;

    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Decides whether a source changed since the last successful run.
///
/// Every uncertainty resolves towards "changed": a missing record, an unreadable record
/// or an unreadable source all mean the source gets processed.
#[derive(Debug, Clone, Default)]
pub struct FingerprintGate {
    record: Option<PathBuf>,
}

impl FingerprintGate {
    /// A blank record path disables the gate.
    pub fn new(record: Option<PathBuf>) -> Self {
        let record = record.filter(|p| !p.as_os_str().is_empty());
        Self { record }
    }

    pub fn is_enabled(&self) -> bool {
        self.record.is_some()
    }

    pub fn record(&self) -> Option<&Path> {
        self.record.as_deref()
    }

    pub fn matches_saved(&self, source: &Path) -> bool {
        let Some(record) = self.record.as_deref() else {
            return false;
        };

        // first run, nothing to compare against
        if !record.exists() {
            debug!("No fingerprint record at '{}'", record.display());
            return false;
        }

        let saved = match fs::read_to_string(record) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to read fingerprint from '{}': {}", record.display(), e);
                return false;
            }
        };

        match compute_fingerprint(source) {
            Ok(current) => current.matches(&saved),
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Best-effort; a failed save is logged and reported as `false`.
    pub fn save(&self, source: &Path) -> bool {
        let Some(record) = self.record.as_deref() else {
            return false;
        };

        let fingerprint = match compute_fingerprint(source) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };

        match fs::write(record, fingerprint.as_str()) {
            Ok(()) => {
                debug!("Saved fingerprint {} to '{}'", fingerprint, record.display());
                true
            }
            Err(e) => {
                warn!("Failed to write fingerprint to '{}': {}", record.display(), e);
                false
            }
        }
    }
}
