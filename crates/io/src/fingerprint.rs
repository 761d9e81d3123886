//! Input fingerprints: `sha256:<hex>` of each source file's bytes.

use std::fs;
use std::path::Path;

use icr_core::{InputFingerprint, SourceKind};
use sha2::{Digest, Sha256};

use crate::ingest::SourcePaths;

/// Hash recorded for a source whose bytes could not be read. Ingestion
/// reports the file as unreadable; the run context still gets an entry.
pub const UNREADABLE: &str = "unreadable";

pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("sha256:{:x}", Sha256::digest(&bytes)))
}

/// One fingerprint per source, in source order.
pub fn fingerprint_sources(paths: &SourcePaths) -> Vec<InputFingerprint> {
    SourceKind::ALL
        .into_iter()
        .map(|source| {
            let path = paths.path(source);
            let hash = match fingerprint_file(path) {
                Ok(hash) => hash,
                Err(e) => {
                    log::warn!("cannot fingerprint {source} at {}: {e}", path.display());
                    UNREADABLE.to_string()
                }
            };
            InputFingerprint { source, hash }
        })
        .collect()
}
