use std::io::{Cursor, Read};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cfpa_core::{LangType, McVersion, ModLoader};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{error, info};

use crate::mapping::MappingStore;
use crate::modhost::{Addon, EnglishFile, EnglishFiles, ModHost};

const CURSEFORGE_API: &str = "https://api.curseforge.com";
const MINECRAFT_GAME_ID: u32 = 432;
const MODS_CLASS_ID: u32 = 6;

#[derive(Clone)]
pub struct CurseForgeClient {
    client: Client,
    api_key: String,
    base_url: String,
    mappings: Arc<MappingStore>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModResponse {
    id: u64,
    slug: String,
    name: String,
    #[serde(default)]
    latest_files_indexes: Vec<FileIndex>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileIndex {
    game_version: String,
    file_id: u64,
    filename: String,
    #[serde(default)]
    mod_loader: Option<u32>,
}

/// A mod archive downloaded for one version.
struct ModArchive {
    file_name: String,
    bytes: Vec<u8>,
}

impl From<ModResponse> for Addon {
    fn from(m: ModResponse) -> Self {
        Addon {
            id: m.id,
            slug: m.slug,
            name: m.name,
        }
    }
}

fn loader_matches(index: &FileIndex, loader: ModLoader) -> bool {
    match (index.mod_loader, loader) {
        (None, _) => true,
        (Some(1), ModLoader::Forge) => true,
        (Some(4), ModLoader::Fabric) => true,
        _ => false,
    }
}

/// The first published file for the version's game version and loader.
fn select_file(indexes: &[FileIndex], version: McVersion) -> Option<&FileIndex> {
    let game_version = version.game_version();
    indexes.iter().find(|index| {
        (index.game_version == game_version
            || index.game_version.starts_with(&format!("{}.", game_version)))
            && loader_matches(index, version.loader())
    })
}

/// Every `assets/<modid>/lang/<file_name>` entry, matched case-insensitively.
fn scan_archive(bytes: &[u8], file_name: &str) -> Result<Vec<EnglishFile>> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Failed to open mod archive")?;
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("Failed to read mod archive entry")?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().to_string();
        let segments: Vec<&str> = name.split('/').collect();
        let [assets, mod_id, lang, entry_name] = segments.as_slice() else {
            continue;
        };
        if *assets != "assets" || *lang != "lang" || !entry_name.eq_ignore_ascii_case(file_name)
        {
            continue;
        }
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .with_context(|| format!("Failed to extract {}", name))?;
        entries.push(EnglishFile {
            mod_id: mod_id.to_string(),
            content: String::from_utf8_lossy(&raw).into_owned(),
        });
    }
    Ok(entries)
}

impl CurseForgeClient {
    pub fn new(api_key: String, mappings: Arc<MappingStore>) -> Self {
        let client = Client::builder()
            .user_agent("cfpa-bot/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url: CURSEFORGE_API.to_string(),
            mappings,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send CurseForge request {}", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .context("Failed to read error response body")?;
            error!("CurseForge API error: {} - {}", status, error_text);
            return Err(anyhow!("CurseForge API error {}: {}", status, path));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse CurseForge response for {}", path))
    }

    async fn get_mod(&self, id: u64) -> Result<ModResponse> {
        let response: DataResponse<ModResponse> =
            self.get_json(&format!("/v1/mods/{}", id)).await?;
        Ok(response.data)
    }

    async fn search_slug(&self, slug: &str) -> Result<ModResponse> {
        let response: DataResponse<Vec<ModResponse>> = self
            .get_json(&format!(
                "/v1/mods/search?gameId={}&classId={}&slug={}",
                MINECRAFT_GAME_ID, MODS_CLASS_ID, slug
            ))
            .await?;
        response
            .data
            .into_iter()
            .find(|m| m.slug == slug)
            .ok_or_else(|| anyhow!("No CurseForge project with slug `{}`", slug))
    }

    async fn download_archive(&self, addon: &Addon, version: McVersion) -> Result<ModArchive> {
        let m = self.get_mod(addon.id).await?;
        let file = select_file(&m.latest_files_indexes, version)
            .ok_or_else(|| anyhow!("{} has no file for Minecraft {}", addon.slug, version))?
            .clone();

        let url: DataResponse<Option<String>> = self
            .get_json(&format!("/v1/mods/{}/files/{}/download-url", addon.id, file.file_id))
            .await?;
        let url = url
            .data
            .ok_or_else(|| anyhow!("{} does not allow third-party downloads", file.filename))?;

        info!("Downloading {} for {}", file.filename, addon.slug);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", file.filename))?;
        if !response.status().is_success() {
            bail!("Downloading {} failed: {}", file.filename, response.status());
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {}", file.filename))?;

        Ok(ModArchive {
            file_name: file.filename,
            bytes: bytes.to_vec(),
        })
    }
}

#[async_trait]
impl ModHost for CurseForgeClient {
    async fn get_addon(&self, identifier: &str) -> Result<Addon> {
        if let Ok(id) = identifier.parse::<u64>() {
            return self.get_addon_by_id(id).await;
        }
        if let Some(id) = self.mappings.get(identifier).await {
            return self.get_addon_by_id(id).await;
        }
        Ok(self.search_slug(identifier).await?.into())
    }

    async fn get_addon_by_id(&self, id: u64) -> Result<Addon> {
        Ok(self.get_mod(id).await?.into())
    }

    async fn get_english_files(&self, addon: &Addon, version: McVersion) -> Result<EnglishFiles> {
        let ModArchive { file_name, bytes } = self.download_archive(addon, version).await?;
        let lang_file = version.lang_file(LangType::En);
        let files = tokio::task::spawn_blocking(move || scan_archive(&bytes, lang_file))
            .await
            .context("spawn_blocking panicked")??;
        info!("Found {} English file(s) in {}", files.len(), file_name);
        Ok(EnglishFiles {
            files,
            download_file_name: file_name,
        })
    }
}
