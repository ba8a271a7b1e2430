//! Object storage.
//!
//! The pipeline only needs three operations from a bucket store: put an
//! object, list keys under a prefix, and hand out a download URL. They sit
//! behind [`ObjectStore`]; [`LocalStore`] keeps objects on the filesystem
//! under `{root}/{bucket}/{key}` and serves them from a configured base URL.
//!
//! Every artifact is written twice, see [`ArtifactKeys`]:
//!
//! ```text
//! ecdc/
//! ├── 2022-07-01_overall-by-date-of-notification.csv   # dated archive
//! └── ecdc_overall-by-date-of-notification_latest.csv  # overwritten each run
//! ```

use crate::error::{IngestError, Result};
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};
use url::Url;

pub trait ObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()>;

    /// Keys in `bucket` starting with `prefix`, sorted.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Download URL for `key`. Calling this twice for the same key yields
    /// the same URL.
    fn presigned_url(&self, bucket: &str, key: &str) -> Result<String>;
}

/// Join a folder and a file name into a storage key.
pub fn join_key(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    let name = name.trim_start_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

/// The dated archive key and the "latest" alias for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub dated: String,
    pub latest: String,
}

impl ArtifactKeys {
    pub fn new(folder: &str, dated_name: &str, latest_name: &str) -> Self {
        Self {
            dated: join_key(folder, dated_name),
            latest: join_key(folder, latest_name),
        }
    }
}

/// Write `body` under the dated key, then under the latest key.
#[instrument(level = "info", skip(store, body), fields(bytes = body.len()))]
pub async fn store_artifact<S: ObjectStore>(
    store: &S,
    bucket: &str,
    keys: &ArtifactKeys,
    body: &[u8],
) -> Result<()> {
    for key in [&keys.dated, &keys.latest] {
        if let Err(e) = store.put(bucket, key, body).await {
            error!(%bucket, %key, error = %e, "Upload failed");
            return Err(e);
        }
        info!(%bucket, %key, "Stored artifact");
    }
    Ok(())
}

/// Filesystem-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    public_base_url: Option<Url>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, base: &str) -> Result<Self> {
        let url = Url::parse(base)
            .map_err(|e| IngestError::Config(format!("invalid public_base_url {base}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(IngestError::Config(format!(
                "public_base_url {base} cannot be used as a base"
            )));
        }
        self.public_base_url = Some(url);
        Ok(self)
    }

    /// Resolve `bucket`/`key` to a path under the root, rejecting keys that
    /// would escape it.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let invalid = |what: &str| IngestError::Storage {
            key: format!("{bucket}/{key}"),
            source: io::Error::new(io::ErrorKind::InvalidInput, what.to_string()),
        };
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." || bucket == "." {
            return Err(invalid("invalid bucket name"));
        }
        let rel = Path::new(key);
        if key.is_empty()
            || key.ends_with('/')
            || !rel.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid("invalid object key"));
        }
        Ok(self.root.join(bucket).join(rel))
    }
}

const PARTIAL_SUFFIX: &str = ".partial";

fn storage_err(key: String) -> impl FnOnce(io::Error) -> IngestError {
    move |source| IngestError::Storage { key, source }
}

impl ObjectStore for LocalStore {
    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(storage_err(key.to_string()))?;
        }
        // Write beside the target and rename so readers never see a partial
        // "latest" object.
        let mut tmp = path.clone().into_os_string();
        tmp.push(PARTIAL_SUFFIX);
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body)
            .await
            .map_err(storage_err(key.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(storage_err(key.to_string()))?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_root = self.root.join(bucket);
        let mut keys = Vec::new();
        let mut pending = vec![bucket_root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(storage_err(prefix.to_string())(e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(storage_err(prefix.to_string()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(storage_err(prefix.to_string()))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.to_string_lossy().ends_with(PARTIAL_SUFFIX) {
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&bucket_root) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn presigned_url(&self, bucket: &str, key: &str) -> Result<String> {
        self.object_path(bucket, key)?;
        let base = self
            .public_base_url
            .as_ref()
            .ok_or_else(|| IngestError::Config("missing required setting `public_base_url`".into()))?;
        let mut url = base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                IngestError::Config("public_base_url cannot be used as a base".into())
            })?;
            segments.pop_if_empty().push(bucket).extend(key.split('/'));
        }
        Ok(url.to_string())
    }
}
