use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::actions::{check_repo_name, Action, ArgIssue};
use crate::core::AgentError;
use crate::integrations::{RepoDetails, RepoHost};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepoDetailsArgs {
    /// Name of the repository
    pub repo_name: String,
}

pub struct RepoDetailsAction {
    host: Arc<dyn RepoHost>,
}

impl RepoDetailsAction {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Action for RepoDetailsAction {
    type Args = RepoDetailsArgs;
    type Output = RepoDetails;

    fn name(&self) -> &'static str {
        "get_repo_details"
    }

    fn description(&self) -> &'static str {
        "Get details of a repository: id, name, description, owner, visibility, url, createdAt, avatarUrl, ownerViewType."
    }

    fn validate_args(&self, args: &RepoDetailsArgs) -> Result<(), ArgIssue> {
        check_repo_name(&args.repo_name)
    }

    async fn call(&self, args: RepoDetailsArgs) -> Result<RepoDetails, AgentError> {
        self.host
            .repo_details(&args.repo_name)
            .await
            .map_err(|e| AgentError::collaborator(self.name(), e))
    }
}
