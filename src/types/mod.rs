use std::fmt;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

/// A single deletable item: a key, optionally pinned to a version.
///
/// Listed object versions and delete markers are both represented this way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier {
    pub key: String,
    pub version_id: Option<String>,
}

impl ObjectIdentifier {
    pub fn new(key: impl Into<String>, version_id: Option<String>) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.filter(|v| !v.is_empty()),
        }
    }
}

/// One page of a versioned listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionPage {
    pub versions: Vec<ObjectIdentifier>,
    pub delete_markers: Vec<ObjectIdentifier>,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_version_id_marker: Option<String>,
}

impl VersionPage {
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty() && self.delete_markers.is_empty()
    }
}

/// An in-progress multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartUpload {
    pub key: String,
    pub upload_id: String,
}

/// One page of a multipart upload listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadPage {
    pub uploads: Vec<MultipartUpload>,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_upload_id_marker: Option<String>,
}

/// Per-key failure reported by a batched delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteError {
    pub key: String,
    pub version_id: Option<String>,
    pub code: String,
    pub message: String,
}

/// AWS configuration file locations.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

/// Where credentials come from.
#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

/// Access key pair with secure zeroization.
///
/// The secret_access_key and session_token are cleared from memory
/// when this struct is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AccessKeys {
    pub fn new(access_key: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Session token, if one is present and non-empty.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref().filter(|t| !t.is_empty())
    }
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}

/// Counters shared by every task of one drain.
#[derive(Debug)]
pub struct DrainStatsReport {
    pub deleted_ops: AtomicU64,
    pub deleted_objects: AtomicU64,
    pub failed_objects: AtomicU64,
    pub listed_objects: AtomicU64,
    pub aborted_uploads: AtomicU64,
    started_at: Instant,
}

/// Point-in-time copy of [`DrainStatsReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub deleted_ops: u64,
    pub deleted_objects: u64,
    pub failed_objects: u64,
    pub listed_objects: u64,
    pub aborted_uploads: u64,
    pub elapsed: Duration,
}

impl DrainStatsReport {
    pub fn new() -> Self {
        Self {
            deleted_ops: AtomicU64::new(0),
            deleted_objects: AtomicU64::new(0),
            failed_objects: AtomicU64::new(0),
            listed_objects: AtomicU64::new(0),
            aborted_uploads: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record one successful delete request covering `requested` objects,
    /// `failed` of which were reported back as per-key errors.
    pub fn record_delete_op(&self, requested: u64, failed: u64) {
        self.deleted_ops.fetch_add(1, Ordering::SeqCst);
        self.deleted_objects
            .fetch_add(requested.saturating_sub(failed), Ordering::SeqCst);
        self.failed_objects.fetch_add(failed, Ordering::SeqCst);
    }

    pub fn record_failed_objects(&self, count: u64) {
        self.failed_objects.fetch_add(count, Ordering::SeqCst);
    }

    pub fn record_listed(&self, count: u64) {
        self.listed_objects.fetch_add(count, Ordering::SeqCst);
    }

    pub fn record_aborted_upload(&self) {
        self.aborted_uploads.fetch_add(1, Ordering::SeqCst);
    }

    pub fn deleted_ops(&self) -> u64 {
        self.deleted_ops.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> DrainStats {
        DrainStats {
            deleted_ops: self.deleted_ops.load(Ordering::SeqCst),
            deleted_objects: self.deleted_objects.load(Ordering::SeqCst),
            failed_objects: self.failed_objects.load(Ordering::SeqCst),
            listed_objects: self.listed_objects.load(Ordering::SeqCst),
            aborted_uploads: self.aborted_uploads.load(Ordering::SeqCst),
            elapsed: self.started_at.elapsed(),
        }
    }
}

impl Default for DrainStatsReport {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedDrainStats = Arc<DrainStatsReport>;
