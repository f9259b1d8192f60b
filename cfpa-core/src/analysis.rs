//! Records produced by scanning an external repository for localization files.
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::lang::LangType;

/// One localization file found on one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFileAnalyzeResult {
    pub branch: String,
    /// Path relative to the repository root, `/`-separated.
    pub file_path: String,
    pub file_name: String,
    pub lang: LangType,
    /// Branch head at scan time.
    pub commit_sha: String,
}

/// Every localization file found across all branches of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoAnalyzeResult {
    pub repo_link: String,
    pub results: Vec<RepoFileAnalyzeResult>,
    pub owner: String,
    pub repo_name: String,
}

/// Owner and name of a repository, parsed from its web link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoLink {
    pub link: String,
    pub owner: String,
    pub repo_name: String,
}

impl RepoLink {
    /// Parse `https://host/owner/repo`, tolerating a trailing `/` or `.git`.
    pub fn parse(link: &str) -> Result<Self> {
        let trimmed = link.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        let mut segments = trimmed.rsplit('/');
        let (Some(repo_name), Some(owner)) = (segments.next(), segments.next()) else {
            bail!("Repository link must end with owner/repo: {}", link);
        };
        if owner.is_empty() || repo_name.is_empty() || owner.ends_with(':') {
            bail!("Repository link must end with owner/repo: {}", link);
        }
        if [owner, repo_name]
            .iter()
            .any(|s| *s == "." || *s == ".." || s.contains('\\'))
        {
            bail!("Invalid repository link: {}", link);
        }
        Ok(Self {
            link: trimmed.to_string(),
            owner: owner.to_string(),
            repo_name: repo_name.to_string(),
        })
    }

    pub fn clone_url(&self) -> String {
        format!("{}.git", self.link)
    }

    /// File name of the cached scan result for this repository.
    pub fn cache_file_name(&self) -> String {
        format!("{}.{}.json", self.owner, self.repo_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_link() {
        let link = RepoLink::parse("https://github.com/CFPAOrg/Minecraft-Mod-Language-Package").unwrap();
        assert_eq!(link.owner, "CFPAOrg");
        assert_eq!(link.repo_name, "Minecraft-Mod-Language-Package");
        assert_eq!(
            link.clone_url(),
            "https://github.com/CFPAOrg/Minecraft-Mod-Language-Package.git"
        );
        assert_eq!(link.cache_file_name(), "CFPAOrg.Minecraft-Mod-Language-Package.json");
    }

    #[test]
    fn test_parse_tolerates_trailing_slash_and_git_suffix() {
        let a = RepoLink::parse("https://github.com/owner/repo/").unwrap();
        let b = RepoLink::parse("https://github.com/owner/repo.git").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.link, "https://github.com/owner/repo");
    }

    #[test]
    fn test_parse_rejects_short_links() {
        assert!(RepoLink::parse("repo").is_err());
        assert!(RepoLink::parse("https://github.com").is_err());
        assert!(RepoLink::parse("https://github.com/owner/..").is_err());
    }

    #[test]
    fn test_result_json_shape() {
        let result = RepoAnalyzeResult {
            repo_link: "https://github.com/o/r".to_string(),
            results: vec![RepoFileAnalyzeResult {
                branch: "main".to_string(),
                file_path: "src/main/resources/assets/m/lang/en_us.json".to_string(),
                file_name: "en_us.json".to_string(),
                lang: LangType::En,
                commit_sha: "abc123".to_string(),
            }],
            owner: "o".to_string(),
            repo_name: "r".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["results"][0]["lang"], "EN");
        let back: RepoAnalyzeResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
