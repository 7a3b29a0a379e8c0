//! Session identity and on-disk file layout
//!
//! Each distinct session identity gets one change log (`.csv`) and one
//! snapshot (`.cache`), named `<sanitized name>-<first 8 id chars>`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use claimwatch_core::{ClaimError, ClaimResult, Timestamp};
use uuid::Uuid;

pub const CHANGE_LOG_EXTENSION: &str = "csv";
pub const SNAPSHOT_EXTENSION: &str = "cache";

const LOCAL_FALLBACK_NAME: &str = "singleplayer";
const REMOTE_FALLBACK_NAME: &str = "unknown";

/// Identity of the session being tracked, as reported by the host on join
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_id: Uuid,
    /// Local (single-player) world rather than a remote server
    pub is_local: bool,
    /// World name for local sessions, server address for remote ones
    pub address_hint: Option<String>,
}

impl SessionIdentity {
    pub fn new(session_id: Uuid, is_local: bool, address_hint: Option<String>) -> Self {
        SessionIdentity {
            session_id,
            is_local,
            address_hint,
        }
    }

    /// Sanitized human part of the file name
    pub fn name(&self) -> String {
        let hint = self
            .address_hint
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty());
        match hint {
            Some(hint) => sanitize_file_name(hint),
            None if self.is_local => LOCAL_FALLBACK_NAME.to_string(),
            None => REMOTE_FALLBACK_NAME.to_string(),
        }
    }

    pub fn short_id(&self) -> String {
        let mut id = self.session_id.hyphenated().to_string();
        id.truncate(8);
        id
    }

    /// Shared stem of both session files
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.name(), self.short_id())
    }
}

/// Replace everything outside `[A-Za-z0-9.-]` with `_` and lowercase
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Paths of the two files belonging to one session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionFiles {
    pub change_log: PathBuf,
    pub snapshot: PathBuf,
}

/// Where session files live
#[derive(Clone, Debug)]
pub struct StorageLayout {
    /// Directory for remote sessions (and local ones without `local_dir`)
    pub base_dir: PathBuf,
    /// Directory for local sessions, typically inside the world save
    pub local_dir: Option<PathBuf>,
}

impl Default for StorageLayout {
    fn default() -> Self {
        StorageLayout {
            base_dir: PathBuf::from("claimwatch-changes"),
            local_dir: None,
        }
    }
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        StorageLayout {
            base_dir: base_dir.into(),
            local_dir: None,
        }
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    pub fn dir_for(&self, session: &SessionIdentity) -> &Path {
        match (&self.local_dir, session.is_local) {
            (Some(local), true) => local,
            _ => &self.base_dir,
        }
    }

    pub fn files_for(&self, session: &SessionIdentity) -> SessionFiles {
        let dir = self.dir_for(session);
        let stem = session.file_stem();
        SessionFiles {
            change_log: dir.join(format!("{stem}.{CHANGE_LOG_EXTENSION}")),
            snapshot: dir.join(format!("{stem}.{SNAPSHOT_EXTENSION}")),
        }
    }
}

/// A stored change log found on disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionFileInfo {
    pub name: String,
    pub short_id: String,
    pub path: PathBuf,
    pub last_modified: Option<Timestamp>,
}

/// Enumerate stored change logs in `dir`, most recently modified first.
///
/// A missing directory has no sessions.
pub fn list_sessions(dir: &Path) -> ClaimResult<Vec<SessionFileInfo>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(ClaimError::io(dir, err)),
    };

    let mut sessions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ClaimError::io(dir, err))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(CHANGE_LOG_EXTENSION) || !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let (name, short_id) = match stem.rsplit_once('-') {
            Some((name, short)) if !name.is_empty() => (name.to_string(), short.to_string()),
            _ => (stem.to_string(), String::new()),
        };
        let last_modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .map(|at| DateTime::<Local>::from(at).naive_local());

        sessions.push(SessionFileInfo {
            name,
            short_id,
            path,
            last_modified,
        });
    }

    sessions.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Uuid {
        Uuid::from_u128(0x9f3c_a1b2_0000_0000_0000_0000_0000_0001)
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_file_name("Play.Example-Net:25565"), "play.example-net_25565");
        assert_eq!(sanitize_file_name("My World!"), "my_world_");
    }

    #[test]
    fn test_session_names() {
        let remote = SessionIdentity::new(id(), false, Some("mc.Example.org".into()));
        assert_eq!(remote.file_stem(), "mc.example.org-9f3ca1b2");

        let local = SessionIdentity::new(id(), true, None);
        assert_eq!(local.name(), "singleplayer");
        let unknown = SessionIdentity::new(id(), false, Some("  ".into()));
        assert_eq!(unknown.name(), "unknown");
    }

    #[test]
    fn test_layout_local_dir() {
        let layout = StorageLayout::new("/data/changes").with_local_dir("/saves/world/data");
        let local = SessionIdentity::new(id(), true, Some("world".into()));
        let remote = SessionIdentity::new(id(), false, Some("host".into()));

        let files = layout.files_for(&local);
        assert_eq!(files.change_log, PathBuf::from("/saves/world/data/world-9f3ca1b2.csv"));
        assert_eq!(files.snapshot, PathBuf::from("/saves/world/data/world-9f3ca1b2.cache"));
        assert_eq!(layout.dir_for(&remote), Path::new("/data/changes"));
        assert_eq!(
            StorageLayout::new("/data/changes").dir_for(&local),
            Path::new("/data/changes")
        );
    }

    #[test]
    fn test_list_sessions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alpha.net-12345678.csv"), "h\n").unwrap();
        fs::write(dir.path().join("alpha.net-12345678.cache"), "h\n").unwrap();
        fs::write(dir.path().join("beta-abcdef01.csv"), "h\n").unwrap();

        let mut sessions = list_sessions(dir.path()).unwrap();
        sessions.sort_by(|a, b| a.name.cmp(&b.name));
        let names: Vec<_> = sessions.iter().map(|s| (s.name.as_str(), s.short_id.as_str())).collect();
        assert_eq!(names, vec![("alpha.net", "12345678"), ("beta", "abcdef01")]);

        assert!(list_sessions(&dir.path().join("missing")).unwrap().is_empty());
    }
}
