//! Snapshot file - the reconciliation baseline for the next session

use std::fs;
use std::path::{Path, PathBuf};

use claimwatch_core::{ClaimError, ClaimResult};
use claimwatch_state::OwnershipSnapshot;
use tracing::debug;

use crate::{
    decode_snapshot_row, encode_snapshot_row, is_header, read_text, split_lines, SNAPSHOT_HEADER,
};

/// Full ownership table persisted by overwrite
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the baseline. A missing file yields an empty table; bad rows,
    /// including ones with invalid UTF-8, are skipped one line at a time.
    pub fn load(&self) -> ClaimResult<OwnershipSnapshot> {
        let Some(text) = read_text(&self.path)? else {
            return Ok(OwnershipSnapshot::new());
        };

        let mut snapshot = OwnershipSnapshot::new();
        let mut skipped = 0usize;
        for line in split_lines(&text) {
            if is_header(line) {
                continue;
            }
            match decode_snapshot_row(line) {
                Ok((dimension, pos, owner)) => {
                    snapshot.insert(dimension, pos, owner);
                }
                Err(_) => skipped += 1,
            }
        }
        debug!(
            path = %self.path.display(),
            claims = snapshot.total(),
            skipped,
            "loaded ownership snapshot"
        );
        Ok(snapshot)
    }

    /// Overwrite the file with `snapshot`, rows ordered by dimension then position
    pub fn save(&self, snapshot: &OwnershipSnapshot) -> ClaimResult<()> {
        let mut buf = String::from(SNAPSHOT_HEADER);
        buf.push('\n');
        for dimension in snapshot.dimensions() {
            for (pos, owner) in snapshot.claims_in(&dimension) {
                buf.push_str(&encode_snapshot_row(&dimension, pos, owner));
                buf.push('\n');
            }
        }
        self.write(buf)?;
        debug!(path = %self.path.display(), claims = snapshot.total(), "saved ownership snapshot");
        Ok(())
    }

    /// Create a header-only file if none exists. Returns whether it wrote.
    pub fn ensure_exists(&self) -> ClaimResult<bool> {
        if self.exists() {
            return Ok(false);
        }
        self.write(format!("{SNAPSHOT_HEADER}\n"))?;
        Ok(true)
    }

    fn write(&self, contents: String) -> ClaimResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|err| ClaimError::io(dir, err))?;
        }
        fs::write(&self.path, contents).map_err(|err| ClaimError::io(&self.path, err))
    }
}
