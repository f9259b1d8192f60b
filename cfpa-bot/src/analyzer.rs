//! Scans every branch of an external repository for localization files.
//!
//! Results are cached per owner/repo and never recomputed. Calls for the same
//! repository are serialized through the [`LockRegistry`] and the cache is
//! checked only after the lock is held, so a repository is cloned at most once.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cfpa_core::{classify_file_name, LangType, RepoAnalyzeResult, RepoFileAnalyzeResult, RepoLink};
use tracing::{error, info};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::git::Vcs;
use crate::lock_registry::LockRegistry;
use crate::mapping::write_atomically;

pub struct RepoAnalyzer {
    vcs: Arc<dyn Vcs>,
    locks: Arc<LockRegistry>,
    cache_dir: PathBuf,
    scratch_dir: PathBuf,
}

/// A localization file found in one checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FoundFile {
    file_path: String,
    file_name: String,
    lang: LangType,
}

impl RepoAnalyzer {
    pub fn new(
        vcs: Arc<dyn Vcs>,
        locks: Arc<LockRegistry>,
        cache_dir: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            vcs,
            locks,
            cache_dir: cache_dir.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn cache_path(&self, link: &RepoLink) -> PathBuf {
        self.cache_dir.join(link.cache_file_name())
    }

    /// Return the cached scan of `link`, scanning it first if there is none.
    pub async fn analyze(&self, link: &str) -> Result<RepoAnalyzeResult> {
        let link = RepoLink::parse(link)?;
        let _guard = self.locks.acquire(&link.link).await;

        let cache_path = self.cache_path(&link);
        if let Some(cached) = read_cache(&cache_path).await? {
            info!("Using cached analysis of {}", link.link);
            return Ok(cached);
        }

        let workdir = self.scratch_dir.join(Uuid::new_v4().simple().to_string());
        info!("Analyzing {} in {}", link.link, workdir.display());
        let outcome = self.scan_and_persist(&link, &workdir, &cache_path).await;
        if let Err(e) = tokio::fs::remove_dir_all(&workdir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                error!("Failed to delete clone of {}: {}", link.link, e);
            }
        }
        outcome
    }

    /// Scan a fresh clone and write the result to the cache.
    async fn scan_and_persist(
        &self,
        link: &RepoLink,
        workdir: &Path,
        cache_path: &Path,
    ) -> Result<RepoAnalyzeResult> {
        let result = RepoAnalyzeResult {
            repo_link: link.link.clone(),
            results: self.scan(link, workdir).await?,
            owner: link.owner.clone(),
            repo_name: link.repo_name.clone(),
        };
        let json = serde_json::to_vec_pretty(&result).context("Failed to serialize analysis")?;
        write_atomically(cache_path, &json).await?;
        info!(
            "Found {} localization file(s) in {}",
            result.results.len(),
            link.link
        );
        Ok(result)
    }

    async fn scan(&self, link: &RepoLink, workdir: &Path) -> Result<Vec<RepoFileAnalyzeResult>> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.scratch_dir.display()))?;
        self.vcs
            .clone_repo(&link.clone_url(), None, workdir)
            .await
            .with_context(|| format!("Failed to clone {}", link.link))?;

        let mut results = Vec::new();
        for branch in self.vcs.remote_branches(workdir).await? {
            self.vcs
                .checkout(workdir, &branch)
                .await
                .with_context(|| format!("Failed to check out {}", branch))?;
            let commit_sha = self.vcs.head_commit(workdir).await?;

            let root = workdir.to_path_buf();
            let found = tokio::task::spawn_blocking(move || find_lang_files(&root))
                .await
                .context("spawn_blocking panicked")??;
            results.extend(found.into_iter().map(|file| RepoFileAnalyzeResult {
                branch: branch.clone(),
                file_path: file.file_path,
                file_name: file.file_name,
                lang: file.lang,
                commit_sha: commit_sha.clone(),
            }));
        }
        Ok(results)
    }
}

async fn read_cache(path: &Path) -> Result<Option<RepoAnalyzeResult>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .with_context(|| format!("Failed to parse cached analysis {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn find_lang_files(root: &Path) -> Result<Vec<FoundFile>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");
    for entry in walker {
        let entry = entry.context("Failed to walk working copy")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(lang) = classify_file_name(&file_name) else {
            continue;
        };
        let relative = entry
            .path()
            .strip_prefix(root)
            .context("Walked outside the working copy")?;
        found.push(FoundFile {
            file_path: relative.to_string_lossy().replace('\\', "/"),
            file_name,
            lang,
        });
    }
    Ok(found)
}
