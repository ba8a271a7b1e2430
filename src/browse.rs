//! Browsing stored artifacts.
//!
//! A folder index built from the configured agency folders, the files
//! directly inside a folder, and a download URL per file. The `list` command
//! prints these.

use crate::config::Config;
use crate::error::Result;
use crate::models::Agency;
use crate::storage::{ObjectStore, join_key};
use tracing::{debug, instrument};

/// One row of the folder index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: &'static str,
    pub folder: String,
}

/// Folder index for every agency with a configured folder.
pub fn folders(config: &Config) -> Vec<FolderEntry> {
    Agency::ALL
        .into_iter()
        .filter_map(|agency| {
            let folder = config.folder(agency)?.trim().trim_matches('/');
            (!folder.is_empty()).then(|| FolderEntry {
                name: agency.display_name(),
                folder: folder.to_string(),
            })
        })
        .collect()
}

/// File names directly under `folder`, sorted. Nested keys are not listed.
#[instrument(level = "info", skip(store))]
pub async fn list_files<S: ObjectStore>(store: &S, bucket: &str, folder: &str) -> Result<Vec<String>> {
    let folder = folder.trim_matches('/');
    let prefix = if folder.is_empty() {
        String::new()
    } else {
        format!("{folder}/")
    };
    let mut files: Vec<String> = store
        .list(bucket, &prefix)
        .await?
        .into_iter()
        .filter_map(|key| {
            let name = key.strip_prefix(&prefix)?;
            (!name.is_empty() && !name.contains('/')).then(|| name.to_string())
        })
        .collect();
    files.sort();
    debug!(count = files.len(), "Listed folder");
    Ok(files)
}

/// Download URL for `file` in `folder`.
pub fn object_url<S: ObjectStore>(store: &S, bucket: &str, folder: &str, file: &str) -> Result<String> {
    store.presigned_url(bucket, &join_key(folder, file))
}

/// Time-limited style download URL for `file` in `folder`. The local store
/// does not sign, so this is the same URL as [`object_url`].
pub fn presigned_url<S: ObjectStore>(
    store: &S,
    bucket: &str,
    folder: &str,
    file: &str,
) -> Result<String> {
    object_url(store, bucket, folder, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use crate::storage::memory::MemoryStore;
    use tempfile::tempdir;

    #[test]
    fn test_folders_only_configured() {
        let config = Config {
            ecdc_data_folder: Some("/ecdc/".into()),
            who_data_folder: Some("who".into()),
            cdc_data_folder: Some("  ".into()),
            ..Default::default()
        };
        let index = folders(&config);
        assert_eq!(
            index,
            vec![
                FolderEntry { name: "ECDC", folder: "ecdc".into() },
                FolderEntry { name: "WHO", folder: "who".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_files_direct_children_sorted() {
        let store = MemoryStore::default();
        for key in [
            "ecdc/b.csv",
            "ecdc/a.csv",
            "ecdc/archive/old.csv",
            "ecdc2/x.csv",
            "who/c.csv",
        ] {
            store.put("data", key, b"x").await.unwrap();
        }
        let files = list_files(&store, "data", "ecdc").await.unwrap();
        assert_eq!(files, vec!["a.csv", "b.csv"]);
        assert!(list_files(&store, "data", "paho").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_urls_agree_and_are_stable() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path())
            .with_public_base_url("https://files.example.org/")
            .unwrap();
        store.put("data", "ecdc/ecdc_x_latest.csv", b"x").await.unwrap();

        let a = object_url(&store, "data", "ecdc", "ecdc_x_latest.csv").unwrap();
        let b = presigned_url(&store, "data", "ecdc", "ecdc_x_latest.csv").unwrap();
        let c = presigned_url(&store, "data", "ecdc", "ecdc_x_latest.csv").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a, "https://files.example.org/data/ecdc/ecdc_x_latest.csv");
    }
}
