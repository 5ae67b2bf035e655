//! Session-scoped artifact store.
//!
//! Layout on disk is flat and fully determined by two validated names:
//!
//! ```text
//! <root>/<session_id>/page_<n>.png
//! ```
//!
//! * `session_id`: a random v4 UUID in canonical lowercase hyphenated form
//! * `n`: 1-based page number, contiguous, no leading zeros
//!
//! Client-supplied segments are parsed into [`SessionId`] and [`PageName`]
//! before any path is joined. Parsing is an allow-list, so separators,
//! `..`, absolute paths and alternate UUID spellings are all rejected, and
//! a rejected name is reported as not found without touching the disk.
//!
//! Sessions are write-once: the directory is created with `create_dir`
//! (never reusing an existing one) and each page file with `create_new`.
//! Nothing here deletes sessions; expiry belongs to an external sweeper.

use crate::error::Pdf2PngError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// URL prefix under which stored pages are served.
pub const DOWNLOAD_PREFIX: &str = "/download";

/// Unique identifier of one conversion's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random (v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied identifier.
    ///
    /// Only the canonical lowercase hyphenated form is accepted, so every
    /// session has exactly one spelling and one directory.
    pub fn parse(s: &str) -> Result<Self, Pdf2PngError> {
        let uuid = Uuid::try_parse(s).map_err(|_| Pdf2PngError::SessionNotFound)?;
        let id = Self(uuid);
        if id.to_string() != s {
            return Err(Pdf2PngError::SessionNotFound);
        }
        Ok(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for SessionId {
    type Err = Pdf2PngError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Deterministic file name of one page artifact: `page_<n>.png`, `n ≥ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageName(usize);

impl PageName {
    /// Name for zero-based page `index`.
    pub fn for_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// Parse a client-supplied file name against the `page_<n>.png` pattern.
    pub fn parse(s: &str) -> Result<Self, Pdf2PngError> {
        let digits = s
            .strip_prefix("page_")
            .and_then(|rest| rest.strip_suffix(".png"))
            .ok_or(Pdf2PngError::ArtifactNotFound)?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Pdf2PngError::ArtifactNotFound);
        }
        let n: usize = digits.parse().map_err(|_| Pdf2PngError::ArtifactNotFound)?;
        Ok(Self(n))
    }

    pub fn page_num(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page_{}.png", self.0)
    }
}

/// Public URL path of a stored page.
pub fn locator(session: &SessionId, page: &PageName) -> String {
    format!("{DOWNLOAD_PREFIX}/{session}/{page}")
}

/// Filesystem-backed store of conversion sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `root`, creating the root if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, Pdf2PngError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Pdf2PngError::storage(&root, e))?;
        info!("Session store rooted at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one session's pages.
    pub fn session_dir(&self, session: &SessionId) -> PathBuf {
        self.root.join(session.to_string())
    }

    fn artifact_path(&self, session: &SessionId, page: &PageName) -> PathBuf {
        self.session_dir(session).join(page.to_string())
    }

    /// Allocate a new session and create its empty directory.
    ///
    /// Fails with [`Pdf2PngError::StorageFailed`] if the directory cannot be
    /// created, including when it already exists.
    pub async fn create_session(&self) -> Result<SessionId, Pdf2PngError> {
        let session = SessionId::generate();
        let dir = self.session_dir(&session);
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| Pdf2PngError::storage(&dir, e))?;
        debug!(session_id = %session, "Session directory created");
        Ok(session)
    }

    /// Write one page under its deterministic name and return its locator.
    ///
    /// Artifacts are write-once; writing the same page twice fails.
    pub async fn put(
        &self,
        session: &SessionId,
        page: PageName,
        bytes: &[u8],
    ) -> Result<String, Pdf2PngError> {
        let path = self.artifact_path(session, &page);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| Pdf2PngError::storage(&path, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| Pdf2PngError::storage(&path, e))?;
        file.flush()
            .await
            .map_err(|e| Pdf2PngError::storage(&path, e))?;

        debug!(session_id = %session, file = %page, bytes = bytes.len(), "Page stored");
        Ok(locator(session, &page))
    }

    /// Read a stored page by client-supplied session id and file name.
    ///
    /// Malformed names, unknown sessions and missing files are all
    /// not-found errors.
    pub async fn get(&self, session_id: &str, filename: &str) -> Result<Vec<u8>, Pdf2PngError> {
        let session = SessionId::parse(session_id)?;
        let page = PageName::parse(filename)?;

        let dir = self.session_dir(&session);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(Pdf2PngError::SessionNotFound),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Pdf2PngError::SessionNotFound)
            }
            Err(e) => return Err(Pdf2PngError::storage(&dir, e)),
        }

        let path = dir.join(page.to_string());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Pdf2PngError::ArtifactNotFound)
            }
            Err(e) => Err(Pdf2PngError::storage(&path, e)),
        }
    }

    /// Page files present in a session, in page order.
    ///
    /// The directory listing is the only record of a session, so this is how
    /// callers that kept a session id (but not its manifest) recover it.
    pub async fn list(&self, session: &SessionId) -> Result<Vec<PageName>, Pdf2PngError> {
        let dir = self.session_dir(session);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Pdf2PngError::SessionNotFound)
            }
            Err(e) => return Err(Pdf2PngError::storage(&dir, e)),
        };

        let mut pages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Pdf2PngError::storage(&dir, e))?
        {
            if let Some(page) = entry.file_name().to_str().and_then(|n| PageName::parse(n).ok()) {
                pages.push(page);
            }
        }
        pages.sort();
        Ok(pages)
    }
}
