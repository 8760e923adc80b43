use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::actions::{check_repo_name, Action, ArgIssue};
use crate::core::AgentError;
use crate::integrations::RepoHost;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileArgs {
    /// Name of the repository
    pub repo_name: String,
    /// File path inside the repository, e.g. "docs/README.md"
    pub path: String,
    /// Full new file content (UTF-8 text)
    pub content: String,
    /// Commit message (default "Update <path>")
    pub commit_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WrittenFile {
    pub url: String,
}

pub struct WriteFileAction {
    host: Arc<dyn RepoHost>,
}

impl WriteFileAction {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Action for WriteFileAction {
    type Args = WriteFileArgs;
    type Output = WrittenFile;

    fn name(&self) -> &'static str {
        "create_or_update_file"
    }

    fn description(&self) -> &'static str {
        "Create a file in a repository, or overwrite it if it already exists, as a single commit. Returns the file URL."
    }

    fn validate_args(&self, args: &WriteFileArgs) -> Result<(), ArgIssue> {
        check_repo_name(&args.repo_name)?;
        let path = args.path.trim_matches('/');
        if path.is_empty() {
            return Err(ArgIssue::new("path", "must not be empty"));
        }
        if path.split('/').any(|seg| seg == "..") {
            return Err(ArgIssue::new("path", "must not contain '..'"));
        }
        Ok(())
    }

    async fn call(&self, args: WriteFileArgs) -> Result<WrittenFile, AgentError> {
        let path = args.path.trim_matches('/');
        let message = args
            .commit_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Update {path}"));
        let url = self
            .host
            .put_file(&args.repo_name, path, &args.content, &message)
            .await
            .map_err(|e| AgentError::collaborator(self.name(), e))?;
        Ok(WrittenFile { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{InMemoryRepoHost, Visibility};

    #[tokio::test]
    async fn test_write_uses_default_message() {
        let host = Arc::new(InMemoryRepoHost::new("octo"));
        host.create_repo("demo", None, Visibility::Public).await.unwrap();
        let out = WriteFileAction::new(host.clone())
            .call(WriteFileArgs {
                repo_name: "demo".to_string(),
                path: "/notes/todo.md".to_string(),
                content: "- ship".to_string(),
                commit_message: None,
            })
            .await
            .unwrap();
        assert_eq!(out.url, "https://github.com/octo/demo/blob/main/notes/todo.md");
        assert_eq!(host.file("demo", "notes/todo.md").as_deref(), Some("- ship"));
        let commits = host.list_commits("demo", 10, 1).await.unwrap();
        assert_eq!(commits[0].message, "Update notes/todo.md");
    }

    #[test]
    fn test_parent_segments_rejected() {
        let action = WriteFileAction::new(Arc::new(InMemoryRepoHost::new("octo")));
        let issue = action
            .validate_args(&WriteFileArgs {
                repo_name: "demo".to_string(),
                path: "../escape".to_string(),
                content: String::new(),
                commit_message: None,
            })
            .unwrap_err();
        assert_eq!(issue.field, "path");
    }
}
