//! Temporary git repositories for tests that run the real `git`

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A working repository on `main` with a bare `origin` next to it
pub struct TempGitRepo {
    _dir: TempDir,
    work: PathBuf,
    origin: PathBuf,
}

impl TempGitRepo {
    /// Create the repositories with one root commit pushed to `origin/main`
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let work = dir.path().join("work");
        let origin = dir.path().join("origin.git");

        git(dir.path(), &["init", "--bare", "-b", "main", "origin.git"]);
        git(dir.path(), &["init", "-b", "main", "work"]);
        git(&work, &["config", "user.name", "Test User"]);
        git(&work, &["config", "user.email", "test@example.com"]);
        git(&work, &["config", "commit.gpgsign", "false"]);
        git(&work, &["remote", "add", "origin", origin.to_str().expect("utf-8 path")]);

        let repo = Self {
            _dir: dir,
            work,
            origin,
        };
        repo.commit_file("README.md", "hello\n", "Initial commit");
        repo.git(&["push", "-q", "origin", "main"]);
        repo.git(&["fetch", "-q", "origin"]);
        repo
    }

    /// Working tree path
    pub fn path(&self) -> &Path {
        &self.work
    }

    /// Bare remote path
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Run git in the working tree, returning trimmed stdout
    pub fn git(&self, args: &[&str]) -> String {
        git(&self.work, args)
    }

    /// Write a file and commit it with `message`, returning the new sha
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> String {
        std::fs::write(self.work.join(name), content).expect("write file");
        self.git(&["add", name]);
        self.git(&["commit", "-q", "-m", message]);
        self.head()
    }

    /// Commit with a Change-Id trailer
    pub fn commit_with_id(&self, name: &str, subject: &str, change_id: &str) -> String {
        let message = format!("{subject}\n\nChange-Id: {change_id}");
        self.commit_file(name, subject, &message)
    }

    /// Current HEAD sha
    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    /// Sha of a branch in the bare remote
    pub fn origin_branch(&self, branch: &str) -> Option<String> {
        let out = Command::new("git")
            .arg("-C")
            .arg(&self.origin)
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .output()
            .expect("run git");
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("run git");
    assert!(
        out.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}
