//! 本地版本控制协作方（git 命令行）
//!
//! 通过 tokio::process::Command 调用 git；输出中的凭据一律经 RemoteUrl::redact 脱敏。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::integrations::RemoteUrl;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("git {command} failed: {detail}")]
    Failed { command: String, detail: String },

    #[error("failed to run git: {0}")]
    Spawn(String),
}

#[async_trait]
pub trait LocalGit: Send + Sync {
    async fn init(&self, dir: &Path) -> Result<(), GitError>;

    async fn add_all(&self, dir: &Path) -> Result<(), GitError>;

    /// 提交暂存区；没有可提交内容时返回 Ok(false)
    async fn commit(&self, dir: &Path, message: &str) -> Result<bool, GitError>;

    /// 确保存在并检出 main 分支（不存在则创建）
    async fn ensure_main_branch(&self, dir: &Path) -> Result<(), GitError>;

    /// 确保远程 name 指向 url（已存在则替换地址）
    async fn set_remote(&self, dir: &Path, name: &str, url: &RemoteUrl) -> Result<(), GitError>;

    /// url 只用于对输出脱敏，远程地址取自 set_remote
    async fn pull_rebase(&self, dir: &Path, remote: &str, branch: &str, url: &RemoteUrl) -> Result<(), GitError>;

    async fn push_upstream(&self, dir: &Path, remote: &str, branch: &str, url: &RemoteUrl) -> Result<(), GitError>;

    async fn clone_repo(&self, url: &RemoteUrl, dest: &Path) -> Result<(), GitError>;
}

struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// git 命令行实现
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// 使用指定的 git 可执行文件
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        secret: Option<&RemoteUrl>,
    ) -> Result<GitOutput, GitError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .await
            .map_err(|e| GitError::Spawn(e.to_string()))?;

        let redact = |bytes: &[u8]| {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            match secret {
                Some(url) => url.redact(&text),
                None => text,
            }
        };
        let out = GitOutput {
            success: output.status.success(),
            stdout: redact(&output.stdout),
            stderr: redact(&output.stderr),
        };
        tracing::debug!(command = args.first().copied().unwrap_or(""), ok = out.success, "git");
        Ok(out)
    }

    async fn run_checked(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        secret: Option<&RemoteUrl>,
    ) -> Result<GitOutput, GitError> {
        let out = self.run(dir, args, secret).await?;
        if out.success {
            Ok(out)
        } else {
            let detail = if out.stderr.is_empty() { out.stdout } else { out.stderr };
            Err(GitError::Failed {
                command: args.first().copied().unwrap_or("").to_string(),
                detail,
            })
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalGit for GitCli {
    async fn init(&self, dir: &Path) -> Result<(), GitError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| GitError::Spawn(format!("cannot create {}: {e}", dir.display())))?;
        self.run_checked(Some(dir), &["init"], None).await.map(drop)
    }

    async fn add_all(&self, dir: &Path) -> Result<(), GitError> {
        self.run_checked(Some(dir), &["add", "-A"], None).await.map(drop)
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<bool, GitError> {
        let out = self.run(Some(dir), &["commit", "-m", message], None).await?;
        if out.success {
            return Ok(true);
        }
        if out.stdout.contains("nothing to commit") || out.stderr.contains("nothing to commit") {
            return Ok(false);
        }
        Err(GitError::Failed {
            command: "commit".to_string(),
            detail: if out.stderr.is_empty() { out.stdout } else { out.stderr },
        })
    }

    async fn ensure_main_branch(&self, dir: &Path) -> Result<(), GitError> {
        let exists = self
            .run(Some(dir), &["rev-parse", "--verify", "--quiet", "refs/heads/main"], None)
            .await?
            .success;
        if exists {
            self.run_checked(Some(dir), &["checkout", "main"], None).await.map(drop)
        } else {
            self.run_checked(Some(dir), &["checkout", "-b", "main"], None).await.map(drop)
        }
    }

    async fn set_remote(&self, dir: &Path, name: &str, url: &RemoteUrl) -> Result<(), GitError> {
        let exists = self.run(Some(dir), &["remote", "get-url", name], Some(url)).await?.success;
        let verb = if exists { "set-url" } else { "add" };
        self.run_checked(Some(dir), &["remote", verb, name, url.expose()], Some(url))
            .await
            .map(drop)
    }

    async fn pull_rebase(&self, dir: &Path, remote: &str, branch: &str, url: &RemoteUrl) -> Result<(), GitError> {
        self.run_checked(Some(dir), &["pull", "--rebase", remote, branch], Some(url))
            .await
            .map(drop)
    }

    async fn push_upstream(&self, dir: &Path, remote: &str, branch: &str, url: &RemoteUrl) -> Result<(), GitError> {
        self.run_checked(Some(dir), &["push", "-u", remote, branch], Some(url))
            .await
            .map(drop)
    }

    async fn clone_repo(&self, url: &RemoteUrl, dest: &Path) -> Result<(), GitError> {
        let dest = dest.to_string_lossy();
        self.run_checked(None, &["clone", url.expose(), dest.as_ref()], Some(url))
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let git = GitCli::with_program("/nonexistent/definitely-not-git");
        let dir = tempfile::tempdir().unwrap();
        let err = git.add_all(dir.path()).await.unwrap_err();
        assert!(matches!(err, GitError::Spawn(_)));
    }

    /// 本地仓库设置提交身份，避免依赖全局 git 配置
    async fn configure_identity(git: &GitCli, dir: &Path) {
        for (key, value) in [("user.name", "Repopilot Test"), ("user.email", "test@example.com")] {
            git.run_checked(Some(dir), &["config", key, value], None).await.unwrap();
        }
    }

    async fn current_branch(git: &GitCli, dir: &Path) -> String {
        git.run_checked(Some(dir), &["rev-parse", "--abbrev-ref", "HEAD"], None)
            .await
            .unwrap()
            .stdout
    }

    #[tokio::test]
    async fn test_real_git_commit_branch_and_remote() {
        let git = GitCli::new();
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("work");

        git.init(&repo).await.unwrap();
        configure_identity(&git, &repo).await;
        tokio::fs::write(repo.join("README.md"), "# demo\n").await.unwrap();
        git.add_all(&repo).await.unwrap();
        assert!(git.commit(&repo, "Initial commit").await.unwrap());

        git.add_all(&repo).await.unwrap();
        assert!(!git.commit(&repo, "Nothing changed").await.unwrap());

        // 第一次创建 main，第二次检出已存在的 main
        git.ensure_main_branch(&repo).await.unwrap();
        assert_eq!(current_branch(&git, &repo).await, "main");
        git.ensure_main_branch(&repo).await.unwrap();
        assert_eq!(current_branch(&git, &repo).await, "main");

        let first = RemoteUrl::new("https://github.com/octo/first.git", None);
        let second = RemoteUrl::new("https://github.com/octo/second.git", None);
        git.set_remote(&repo, "origin", &first).await.unwrap();
        git.set_remote(&repo, "origin", &second).await.unwrap();
        let url = git
            .run_checked(Some(&repo), &["remote", "get-url", "origin"], None)
            .await
            .unwrap()
            .stdout;
        assert_eq!(url, "https://github.com/octo/second.git");
    }

    #[tokio::test]
    async fn test_push_failure_output_is_redacted() {
        let git = GitCli::new();
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("work");
        git.init(&repo).await.unwrap();
        configure_identity(&git, &repo).await;
        tokio::fs::write(repo.join("a.txt"), "a").await.unwrap();
        git.add_all(&repo).await.unwrap();
        git.commit(&repo, "a").await.unwrap();
        git.ensure_main_branch(&repo).await.unwrap();

        // 不存在的本地路径作为远程：git 的报错会原样带出地址
        let missing = dir.path().join("s3cret-token").join("demo.git");
        let remote = RemoteUrl::new(missing.to_string_lossy(), Some("s3cret-token".to_string()));
        git.set_remote(&repo, "origin", &remote).await.unwrap();

        let err = git.push_upstream(&repo, "origin", "main", &remote).await.unwrap_err();
        let GitError::Failed { command, detail } = err else {
            panic!("expected a failed push");
        };
        assert_eq!(command, "push");
        assert!(!detail.contains("s3cret-token"), "{detail}");
        assert!(git.pull_rebase(&repo, "origin", "main", &remote).await.is_err());
    }
}
