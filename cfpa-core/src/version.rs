//! Minecraft versions tracked by the language package.
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

use crate::lang::LangType;

/// Mod loader a version's files are published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModLoader {
    Forge,
    Fabric,
}

/// A Minecraft version branch of the language package.
///
/// The oldest supported version still uses the legacy `key=value` `.lang`
/// format; every later version uses JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum McVersion {
    V1122,
    V116,
    V118,
    V116Fabric,
    V118Fabric,
}

impl McVersion {
    pub const ALL: [McVersion; 5] = [
        McVersion::V1122,
        McVersion::V116,
        McVersion::V118,
        McVersion::V116Fabric,
        McVersion::V118Fabric,
    ];

    /// The directory name used under `projects/`.
    pub fn as_str(self) -> &'static str {
        match self {
            McVersion::V1122 => "1.12.2",
            McVersion::V116 => "1.16",
            McVersion::V118 => "1.18",
            McVersion::V116Fabric => "1.16-fabric",
            McVersion::V118Fabric => "1.18-fabric",
        }
    }

    /// Game version prefix used to match published files.
    pub fn game_version(self) -> &'static str {
        match self {
            McVersion::V1122 => "1.12.2",
            McVersion::V116 | McVersion::V116Fabric => "1.16",
            McVersion::V118 | McVersion::V118Fabric => "1.18",
        }
    }

    pub fn loader(self) -> ModLoader {
        match self {
            McVersion::V116Fabric | McVersion::V118Fabric => ModLoader::Fabric,
            _ => ModLoader::Forge,
        }
    }

    pub fn uses_legacy_format(self) -> bool {
        self == McVersion::V1122
    }

    /// Localization file name for the given language in this version.
    pub fn lang_file(self, lang: LangType) -> &'static str {
        match (self.uses_legacy_format(), lang) {
            (true, LangType::En) => "en_us.lang",
            (true, LangType::Cn) => "zh_cn.lang",
            (false, LangType::En) => "en_us.json",
            (false, LangType::Cn) => "zh_cn.json",
        }
    }
}

impl fmt::Display for McVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for McVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        McVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown Minecraft version: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        for version in McVersion::ALL {
            assert_eq!(version.to_string().parse::<McVersion>().unwrap(), version);
        }
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let err = "1.7.10".parse::<McVersion>().unwrap_err();
        assert!(err.to_string().contains("1.7.10"));
    }

    #[test]
    fn test_only_oldest_version_uses_lang_files() {
        assert_eq!(McVersion::V1122.lang_file(LangType::En), "en_us.lang");
        assert_eq!(McVersion::V1122.lang_file(LangType::Cn), "zh_cn.lang");
        for version in &McVersion::ALL[1..] {
            assert_eq!(version.lang_file(LangType::En), "en_us.json");
            assert_eq!(version.lang_file(LangType::Cn), "zh_cn.json");
        }
    }

    #[test]
    fn test_fabric_versions_share_game_version() {
        assert_eq!(McVersion::V116Fabric.game_version(), "1.16");
        assert_eq!(McVersion::V116Fabric.loader(), ModLoader::Fabric);
        assert_eq!(McVersion::V116.loader(), ModLoader::Forge);
    }
}
