//! Abstraction over the mod-hosting service (CurseForge).

use anyhow::Result;
use async_trait::async_trait;
use cfpa_core::McVersion;
use serde::{Deserialize, Serialize};

/// A project on the mod-hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    pub id: u64,
    pub slug: String,
    pub name: String,
}

/// One `assets/<modid>/lang/<file>` entry of a mod archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnglishFile {
    /// The `assets/<modid>` namespace the file was found under.
    pub mod_id: String,
    pub content: String,
}

/// English localization files found in a mod's published archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnglishFiles {
    /// Every matching file. Empty when the archive ships none, and more than
    /// one means the archive is ambiguous.
    pub files: Vec<EnglishFile>,
    /// Name of the downloaded archive.
    pub download_file_name: String,
}

#[async_trait]
pub trait ModHost: Send + Sync {
    /// Resolve a project from a numeric id or a slug.
    async fn get_addon(&self, identifier: &str) -> Result<Addon>;

    async fn get_addon_by_id(&self, id: u64) -> Result<Addon>;

    /// Download the latest archive for a version and collect its English files.
    async fn get_english_files(&self, addon: &Addon, version: McVersion) -> Result<EnglishFiles>;
}
