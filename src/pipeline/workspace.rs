//! Per-request scratch storage and the identity that names it.
//!
//! ## Why identity-derived paths instead of random temp files?
//!
//! Scratch paths are derived from a hash of the source URL, not from a random
//! token. Two requests for *different* sources can never collide, and two
//! requests for the *same* source converge on the same transient and durable
//! names — which is exactly what makes a retried request overwrite its
//! predecessor's object instead of accumulating duplicates. The narrow race
//! between concurrent identical requests (one request's cleanup deleting a
//! file the other still reads) is accepted: it surfaces as a fetch/read error
//! on the loser and never corrupts the durable store, because publishing only
//! happens from a request's own fully-produced local artifact.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of hex characters kept from the digest for the request identity.
const ID_LEN: usize = 16;

/// Derive the stable request identity for a source reference.
///
/// Same input, same output — within a request and across requests. The value
/// names both transient artifacts and the durable object key.
pub fn request_id(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest
        .iter()
        .take(ID_LEN / 2)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Scratch paths owned by a single request.
///
/// Created before the fetch, destroyed (best-effort) after the request
/// terminates — successful or not.
#[derive(Debug)]
pub struct Workspace {
    /// Where the fetched source bytes land.
    pub input_path: PathBuf,
    /// Where the transform must leave its result.
    pub output_path: PathBuf,
}

impl Workspace {
    /// Derive the workspace for a request identity under `work_dir`.
    pub fn for_request(work_dir: &Path, id: &str) -> Self {
        Self {
            input_path: work_dir.join(format!("in-{id}")),
            output_path: work_dir.join(format!("out-{id}.png")),
        }
    }

    /// Delete both transient artifacts, best-effort.
    ///
    /// Cleanup failures cannot affect the correctness of the response that is
    /// already being returned, so they are logged and swallowed. A path that
    /// was never created (e.g. the fetch failed before writing) is not an
    /// error either.
    pub async fn cleanup(&self) {
        for path in [&self.input_path, &self.output_path] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!("removed scratch artifact {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!("leaving scratch artifact {}: {}", path.display(), e),
            }
        }
    }
}
