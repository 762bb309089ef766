// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile persistence: load-or-template on open, RFC-6902 patching
//! against the cached copy, atomic write-temp-then-rename persistence.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use mnemos_core::Error;

use crate::document::{ProfileDocument, MAX_MEMORABLE_EVENTS};

/// Owner of the profile document. The cache is the single source of
/// truth for prompt assembly; disk is only read at open.
pub struct ProfileStore {
    path: PathBuf,
    cache: RwLock<ProfileDocument>,
}

impl ProfileStore {
    /// Open the profile at `path`, writing the template on first use.
    pub fn open(path: &Path) -> Result<ProfileStore, Error> {
        let document = if path.exists() {
            let raw = fs::read_to_string(path).map_err(io_err)?;
            serde_json::from_str(&raw).map_err(|e| {
                Error::Conflict(format!("profile file is not a valid document: {e}"))
            })?
        } else {
            let template = ProfileDocument::default();
            write_atomic(path, &template)?;
            info!(path = %path.display(), "profile template created");
            template
        };

        Ok(ProfileStore {
            path: path.to_path_buf(),
            cache: RwLock::new(document),
        })
    }

    /// Deep copy of the current document for prompt assembly.
    pub fn snapshot(&self) -> ProfileDocument {
        self.cache.read().expect("profile lock poisoned").clone()
    }

    /// Apply an RFC-6902 patch (given as its JSON array) to a copy of
    /// the document, validate the result, then atomically swap cache
    /// and disk. On any failure the current document is left untouched.
    pub fn apply_patch(&self, operations: &serde_json::Value) -> Result<(), Error> {
        let patch: json_patch::Patch = serde_json::from_value(operations.clone())
            .map_err(|e| Error::BadArgument(format!("not a JSON Patch array: {e}")))?;

        let current = self.snapshot();
        let mut value =
            serde_json::to_value(&current).expect("profile document serializes");
        json_patch::patch(&mut value, &patch)
            .map_err(|e| Error::BadArgument(format!("patch does not apply: {e}")))?;

        let mut updated: ProfileDocument = serde_json::from_value(value).map_err(|e| {
            Error::BadArgument(format!("patched document violates profile shape: {e}"))
        })?;

        if updated.memorable_events.len() > MAX_MEMORABLE_EVENTS {
            warn!(
                count = updated.memorable_events.len(),
                "memorable_events over limit, truncating oldest"
            );
            let excess = updated.memorable_events.len() - MAX_MEMORABLE_EVENTS;
            updated.memorable_events.drain(..excess);
        }

        write_atomic(&self.path, &updated)?;
        *self.cache.write().expect("profile lock poisoned") = updated;
        info!(ops = patch.0.len(), "profile patch applied");
        Ok(())
    }
}

fn io_err(e: std::io::Error) -> Error {
    Error::StoreUnavailable {
        source: Box::new(e),
    }
}

/// Write the document next to its destination and rename into place,
/// fsyncing the file and (where the platform allows) the directory.
fn write_atomic(path: &Path, document: &ProfileDocument) -> Result<(), Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    use std::io::Write;
    tmp.write_all(document.to_pretty_json().as_bytes())
        .map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path)
        .map_err(|e| io_err(e.error))?;

    if let Ok(dir_handle) = fs::File::open(dir) {
        let _ = dir_handle.sync_all();
    }
    Ok(())
}
