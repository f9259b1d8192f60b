//! Persistent slug → CurseForge project id mapping.
//!
//! Some projects cannot be found by slug through the search API; an
//! administrator registers them with `/add-mapping` and the CurseForge client
//! consults this store first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
struct MappingFile {
    #[serde(default)]
    mapping: BTreeMap<String, u64>,
}

pub struct MappingStore {
    path: PathBuf,
    state: Mutex<MappingFile>,
}

impl MappingStore {
    /// Load the store from `path`. A missing file is an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse mapping store {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MappingFile::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read mapping store {}", path.display()))
            }
        };
        info!(
            "Loaded {} mod id mappings from {}",
            state.mapping.len(),
            path.display()
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub async fn get(&self, slug: &str) -> Option<u64> {
        self.state.lock().await.mapping.get(slug).copied()
    }

    /// Insert or replace a mapping and persist the whole store.
    pub async fn insert(&self, slug: &str, project_id: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.mapping.insert(slug.to_string(), project_id);
        let json = serde_json::to_vec_pretty(&*state).context("Failed to serialize mappings")?;
        write_atomically(&self.path, &json).await?;
        info!("Mapped {} to project {}", slug, project_id);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.mapping.len()
    }
}

/// Write to a sibling temp file and rename it over `path`, so readers never
/// observe a partially written file.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}
