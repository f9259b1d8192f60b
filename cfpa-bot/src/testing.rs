//! In-memory stand-ins for the host, mod-hosting and git seams.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cfpa_core::McVersion;

use crate::git::Vcs;
use crate::host::{HostApi, Identity, PullRequestRef, RepoRef};
use crate::modhost::{Addon, EnglishFile, EnglishFiles, ModHost};

pub fn pull_request(head_owner: &str, author: &str, branch: &str) -> PullRequestRef {
    PullRequestRef {
        number: 42,
        author: author.to_string(),
        head_repo: RepoRef::new(head_owner, "Minecraft-Mod-Language-Package"),
        head_branch: branch.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct FakeBranch {
    pub name: String,
    pub sha: String,
    pub files: Vec<String>,
}

/// Git stand-in working on plain directories.
#[derive(Default)]
pub struct FakeVcs {
    files: Vec<(String, String)>,
    branches: Vec<FakeBranch>,
    fail_clone: bool,
    clone_delay: Option<Duration>,
    clones: AtomicUsize,
    pushes: AtomicUsize,
    commits: Mutex<Vec<String>>,
    runs: Mutex<Vec<Vec<String>>>,
    pushed_tree: Mutex<BTreeMap<String, String>>,
}

impl FakeVcs {
    /// A file present in every clone.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    pub fn with_branch(mut self, name: &str, sha: &str, files: &[&str]) -> Self {
        self.branches.push(FakeBranch {
            name: name.to_string(),
            sha: sha.to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    pub fn failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    pub fn with_clone_delay(mut self, delay: Duration) -> Self {
        self.clone_delay = Some(delay);
        self
    }

    pub fn clone_count(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().unwrap().clone()
    }

    /// Content of a file as of the last push.
    pub fn pushed_file(&self, path: &str) -> Option<String> {
        self.pushed_tree.lock().unwrap().get(path).cloned()
    }

    fn write_tree(root: &Path, files: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        for (path, content) in files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, content)?;
        }
        Ok(())
    }

    fn clear_tree(root: &Path) -> Result<()> {
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_name() == ".git" {
                continue;
            }
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    fn snapshot(root: &Path) -> BTreeMap<String, String> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let relative = e
                    .path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                let content = std::fs::read_to_string(e.path()).unwrap_or_default();
                (relative, content)
            })
            .collect()
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn clone_repo(&self, url: &str, _branch: Option<&str>, dest: &Path) -> Result<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.clone_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_clone {
            bail!("remote not found: {}", url);
        }
        std::fs::create_dir_all(dest.join(".git"))?;
        let mut files = vec![("README.md".to_string(), "# readme\n".to_string())];
        files.extend(self.files.iter().cloned());
        Self::write_tree(dest, files)
    }

    async fn run(&self, workdir: &Path, args: &[String]) -> Result<String> {
        self.runs.lock().unwrap().push(args.to_vec());
        let paths = match args {
            [mv, force, separator, paths @ ..] if mv == "mv" && force == "-f" && separator == "--" => {
                paths
            }
            _ => bail!("unsupported fake git command: {:?}", args),
        };
        let (destination, sources) = paths
            .split_last()
            .ok_or_else(|| anyhow!("mv needs a destination"))?;
        let destination = workdir.join(destination);
        for source in sources {
            let source = workdir.join(source);
            let target = if destination.is_dir() {
                destination.join(source.file_name().context("source has no file name")?)
            } else {
                destination.clone()
            };
            std::fs::rename(&source, &target)
                .with_context(|| format!("fatal: bad source, source={}", source.display()))?;
        }
        Ok(String::new())
    }

    async fn add_all(&self, _workdir: &Path) -> Result<()> {
        Ok(())
    }

    async fn commit(&self, _workdir: &Path, message: &str, _author: &Identity) -> Result<bool> {
        self.commits.lock().unwrap().push(message.to_string());
        Ok(true)
    }

    async fn push(&self, workdir: &Path) -> Result<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        *self.pushed_tree.lock().unwrap() = Self::snapshot(workdir);
        Ok(())
    }

    async fn remote_branches(&self, _workdir: &Path) -> Result<Vec<String>> {
        Ok(self.branches.iter().map(|b| b.name.clone()).collect())
    }

    async fn checkout(&self, workdir: &Path, branch: &str) -> Result<()> {
        let branch = self
            .branches
            .iter()
            .find(|b| b.name == branch)
            .ok_or_else(|| anyhow!("unknown branch {}", branch))?;
        Self::clear_tree(workdir)?;
        Self::write_tree(
            workdir,
            branch.files.iter().map(|f| (f.clone(), String::new())),
        )?;
        std::fs::write(workdir.join(".git").join("HEAD_SHA"), &branch.sha)?;
        Ok(())
    }

    async fn head_commit(&self, workdir: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(workdir.join(".git").join("HEAD_SHA"))?)
    }
}

pub struct FakeHost {
    pub pr: PullRequestRef,
    pub collaborators: Vec<String>,
    comments: Mutex<Vec<(u64, String)>>,
    collaborator_checks: AtomicUsize,
}

impl FakeHost {
    pub fn new(pr: PullRequestRef) -> Self {
        Self {
            pr,
            collaborators: Vec::new(),
            comments: Mutex::new(Vec::new()),
            collaborator_checks: AtomicUsize::new(0),
        }
    }

    pub fn with_collaborator(mut self, login: &str) -> Self {
        self.collaborators.push(login.to_string());
        self
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        self.comments.lock().unwrap().clone()
    }

    pub fn collaborator_checks(&self) -> usize {
        self.collaborator_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostApi for FakeHost {
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRef> {
        if number != self.pr.number {
            bail!("GitHub API error fetching PR: 404 Not Found");
        }
        Ok(self.pr.clone())
    }

    async fn is_collaborator(&self, login: &str) -> Result<bool> {
        self.collaborator_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.collaborators.iter().any(|c| c == login))
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        self.comments.lock().unwrap().push((number, body.to_string()));
        Ok(())
    }

    async fn clone_url(&self, repo: &RepoRef) -> Result<String> {
        Ok(format!("https://github.com/{}/{}.git", repo.owner, repo.name))
    }
}

/// Serves `english_files` as if each were found under `assets/<mod_id>`.
#[derive(Default)]
pub struct FakeModHost {
    pub addons: Vec<Addon>,
    pub mod_id: String,
    pub english_files: Vec<String>,
    pub download_file_name: String,
}

impl FakeModHost {
    fn find(&self, matches: impl Fn(&Addon) -> bool) -> Result<Addon> {
        self.addons
            .iter()
            .find(|a| matches(a))
            .cloned()
            .ok_or_else(|| anyhow!("CurseForge API error: 404 Not Found"))
    }
}

#[async_trait]
impl ModHost for FakeModHost {
    async fn get_addon(&self, identifier: &str) -> Result<Addon> {
        self.find(|a| a.slug == identifier || a.id.to_string() == identifier)
    }

    async fn get_addon_by_id(&self, id: u64) -> Result<Addon> {
        self.find(|a| a.id == id)
    }

    async fn get_english_files(&self, _addon: &Addon, _version: McVersion) -> Result<EnglishFiles> {
        Ok(EnglishFiles {
            files: self
                .english_files
                .iter()
                .map(|content| EnglishFile {
                    mod_id: self.mod_id.clone(),
                    content: content.clone(),
                })
                .collect(),
            download_file_name: self.download_file_name.clone(),
        })
    }
}
