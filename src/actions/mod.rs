//! 动作层：强类型动作、注册表、执行器，以及面向远程仓库的固定动作目录

pub mod clone;
pub mod create_repo;
pub mod delete_repo;
pub mod executor;
pub mod list_commits;
pub mod push;
pub mod registry;
pub mod repo_details;
pub mod schema;
pub mod update_repo;
pub mod write_file;

use std::sync::Arc;

pub use clone::CloneAction;
pub use create_repo::CreateRepoAction;
pub use delete_repo::DeleteRepoAction;
pub use executor::{render_output, ActionExecutor, ActionResult};
pub use list_commits::ListCommitsAction;
pub use push::PushAction;
pub use registry::{Action, ActionRegistry, ActionSpec, DynAction};
pub use repo_details::RepoDetailsAction;
pub use schema::ArgIssue;
pub use update_repo::UpdateRepoAction;
pub use write_file::WriteFileAction;

use crate::core::AgentError;
use crate::integrations::{LocalGit, RepoHost};

/// 按固定顺序注册全部仓库动作
pub fn default_registry(
    host: Arc<dyn RepoHost>,
    git: Arc<dyn LocalGit>,
) -> Result<ActionRegistry, AgentError> {
    let mut registry = ActionRegistry::new();
    registry.register(CreateRepoAction::new(host.clone()))?;
    registry.register(DeleteRepoAction::new(host.clone()))?;
    registry.register(RepoDetailsAction::new(host.clone()))?;
    registry.register(UpdateRepoAction::new(host.clone()))?;
    registry.register(ListCommitsAction::new(host.clone()))?;
    registry.register(WriteFileAction::new(host.clone()))?;
    registry.register(PushAction::new(host.clone(), git.clone()))?;
    registry.register(CloneAction::new(host, git))?;
    Ok(registry)
}

/// GitHub 仓库名：非空，只含字母、数字、`-`、`_`、`.`，最长 100
pub(crate) fn check_repo_name(name: &str) -> Result<(), ArgIssue> {
    if name.is_empty() {
        return Err(ArgIssue::new("repoName", "must not be empty"));
    }
    if name.len() > 100 {
        return Err(ArgIssue::new("repoName", "must be at most 100 characters"));
    }
    if name == "." || name == ".." {
        return Err(ArgIssue::new("repoName", format!("'{name}' is reserved")));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ArgIssue::new(
            "repoName",
            format!("contains invalid character {c:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::integrations::{GitError, LocalGit, RemoteUrl};

    /// 记录调用的 LocalGit；可指定某一步失败或工作区无改动
    #[derive(Default)]
    pub struct RecordingGit {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        clean: bool,
    }

    impl RecordingGit {
        pub fn failing(mut self, step: &'static str) -> Self {
            self.fail_on = Some(step);
            self
        }

        pub fn clean_tree(mut self) -> Self {
            self.clean = true;
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, step: &'static str, call: String) -> Result<(), GitError> {
            self.calls.lock().unwrap().push(call);
            if self.fail_on == Some(step) {
                return Err(GitError::Failed {
                    command: step.to_string(),
                    detail: "scripted failure".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LocalGit for RecordingGit {
        async fn init(&self, _dir: &Path) -> Result<(), GitError> {
            self.record("init", "init".to_string())
        }

        async fn add_all(&self, _dir: &Path) -> Result<(), GitError> {
            self.record("add_all", "add_all".to_string())
        }

        async fn commit(&self, _dir: &Path, message: &str) -> Result<bool, GitError> {
            self.record("commit", format!("commit {message}"))?;
            Ok(!self.clean)
        }

        async fn ensure_main_branch(&self, _dir: &Path) -> Result<(), GitError> {
            self.record("ensure_main_branch", "ensure_main_branch".to_string())
        }

        async fn set_remote(&self, _dir: &Path, name: &str, url: &RemoteUrl) -> Result<(), GitError> {
            self.record("set_remote", format!("set_remote {name} {url}"))
        }

        async fn pull_rebase(
            &self,
            _dir: &Path,
            remote: &str,
            branch: &str,
            _url: &RemoteUrl,
        ) -> Result<(), GitError> {
            self.record("pull_rebase", format!("pull_rebase {remote} {branch}"))
        }

        async fn push_upstream(
            &self,
            _dir: &Path,
            remote: &str,
            branch: &str,
            _url: &RemoteUrl,
        ) -> Result<(), GitError> {
            self.record("push_upstream", format!("push_upstream {remote} {branch}"))
        }

        async fn clone_repo(&self, url: &RemoteUrl, dest: &Path) -> Result<(), GitError> {
            self.record("clone", format!("clone {url} {}", dest.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::InMemoryRepoHost;

    #[test]
    fn test_default_registry_order() {
        let registry = default_registry(
            Arc::new(InMemoryRepoHost::new("octo")),
            Arc::new(testing::RecordingGit::default()),
        )
        .unwrap();
        assert_eq!(
            registry.names(),
            [
                "create_repo",
                "delete_repo",
                "get_repo_details",
                "update_repo",
                "list_commits",
                "create_or_update_file",
                "push_to_repo",
                "clone_repo",
            ]
        );
        for spec in registry.specs() {
            assert_eq!(spec.input_schema["type"], "object", "{}", spec.name);
            assert!(spec.input_schema["required"]
                .as_array()
                .unwrap()
                .contains(&serde_json::json!("repoName")));
        }
    }

    #[test]
    fn test_repo_name_rules() {
        assert!(check_repo_name("my-repo_1.x").is_ok());
        assert_eq!(check_repo_name("").unwrap_err().field, "repoName");
        assert!(check_repo_name("owner/repo").is_err());
        assert!(check_repo_name("has space").is_err());
        assert!(check_repo_name("..").is_err());
    }
}
