use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::actions::{check_repo_name, Action, ArgIssue};
use crate::core::AgentError;
use crate::integrations::{CommitSummary, RepoHost};

pub const DEFAULT_PER_PAGE: u8 = 10;
pub const MAX_PER_PAGE: u8 = 100;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListCommitsArgs {
    /// Name of the repository
    pub repo_name: String,
    /// Commits per page, 1-100 (default 10)
    pub per_page: Option<u8>,
    /// Page number starting at 1 (default 1)
    pub page: Option<u32>,
}

pub struct ListCommitsAction {
    host: Arc<dyn RepoHost>,
}

impl ListCommitsAction {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Action for ListCommitsAction {
    type Args = ListCommitsArgs;
    type Output = Vec<CommitSummary>;

    fn name(&self) -> &'static str {
        "list_commits"
    }

    fn description(&self) -> &'static str {
        "List commits of a repository, newest first. Each entry has commitId, sha, message, committerName and date."
    }

    fn validate_args(&self, args: &ListCommitsArgs) -> Result<(), ArgIssue> {
        check_repo_name(&args.repo_name)?;
        if let Some(per_page) = args.per_page {
            if per_page == 0 || per_page > MAX_PER_PAGE {
                return Err(ArgIssue::new(
                    "perPage",
                    format!("must be between 1 and {MAX_PER_PAGE}, got {per_page}"),
                ));
            }
        }
        if args.page == Some(0) {
            return Err(ArgIssue::new("page", "must be at least 1"));
        }
        Ok(())
    }

    async fn call(&self, args: ListCommitsArgs) -> Result<Vec<CommitSummary>, AgentError> {
        let per_page = args.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let page = args.page.unwrap_or(1);
        self.host
            .list_commits(&args.repo_name, per_page, page)
            .await
            .map_err(|e| AgentError::collaborator(self.name(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{InMemoryRepoHost, Visibility};

    fn args(per_page: Option<u8>, page: Option<u32>) -> ListCommitsArgs {
        ListCommitsArgs {
            repo_name: "demo".to_string(),
            per_page,
            page,
        }
    }

    #[tokio::test]
    async fn test_defaults_to_ten_per_page() {
        let host = Arc::new(InMemoryRepoHost::new("octo"));
        host.create_repo("demo", None, Visibility::Public).await.unwrap();
        host.seed_commits("demo", 12).unwrap();
        let commits = ListCommitsAction::new(host).call(args(None, None)).await.unwrap();
        assert_eq!(commits.len(), 10);
        assert_eq!(commits[0].message, "Commit 12");
    }

    #[test]
    fn test_page_bounds() {
        let action = ListCommitsAction::new(Arc::new(InMemoryRepoHost::new("octo")));
        assert_eq!(action.validate_args(&args(Some(0), None)).unwrap_err().field, "perPage");
        assert_eq!(action.validate_args(&args(Some(101), None)).unwrap_err().field, "perPage");
        assert_eq!(action.validate_args(&args(None, Some(0))).unwrap_err().field, "page");
        assert!(action.validate_args(&args(Some(100), Some(3))).is_ok());
    }
}
