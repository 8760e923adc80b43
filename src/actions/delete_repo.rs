use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::actions::{check_repo_name, Action, ArgIssue};
use crate::core::AgentError;
use crate::integrations::RepoHost;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRepoArgs {
    /// Name of the repository to delete
    pub repo_name: String,
}

pub struct DeleteRepoAction {
    host: Arc<dyn RepoHost>,
}

impl DeleteRepoAction {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Action for DeleteRepoAction {
    type Args = DeleteRepoArgs;
    type Output = String;

    fn name(&self) -> &'static str {
        "delete_repo"
    }

    fn description(&self) -> &'static str {
        "Permanently delete a repository owned by the authenticated account."
    }

    fn validate_args(&self, args: &DeleteRepoArgs) -> Result<(), ArgIssue> {
        check_repo_name(&args.repo_name)
    }

    async fn call(&self, args: DeleteRepoArgs) -> Result<String, AgentError> {
        self.host
            .delete_repo(&args.repo_name)
            .await
            .map_err(|e| AgentError::collaborator(self.name(), e))?;
        tracing::info!(repo = %args.repo_name, "repository deleted");
        Ok(format!(
            "Deleted repository {}/{}",
            self.host.owner(),
            args.repo_name
        ))
    }
}
