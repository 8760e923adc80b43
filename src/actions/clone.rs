use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::actions::{check_repo_name, Action, ArgIssue};
use crate::core::AgentError;
use crate::integrations::{LocalGit, RepoHost};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloneArgs {
    /// Name of the repository to clone
    pub repo_name: String,
    /// Local directory to clone into; must not exist yet or be empty
    pub destination: String,
}

pub struct CloneAction {
    host: Arc<dyn RepoHost>,
    git: Arc<dyn LocalGit>,
}

impl CloneAction {
    pub fn new(host: Arc<dyn RepoHost>, git: Arc<dyn LocalGit>) -> Self {
        Self { host, git }
    }
}

#[async_trait]
impl Action for CloneAction {
    type Args = CloneArgs;
    type Output = String;

    fn name(&self) -> &'static str {
        "clone_repo"
    }

    fn description(&self) -> &'static str {
        "Clone a repository of the authenticated account into a local directory."
    }

    fn validate_args(&self, args: &CloneArgs) -> Result<(), ArgIssue> {
        check_repo_name(&args.repo_name)?;
        if args.destination.trim().is_empty() {
            return Err(ArgIssue::new("destination", "must not be empty"));
        }
        Ok(())
    }

    async fn call(&self, args: CloneArgs) -> Result<String, AgentError> {
        let dest = PathBuf::from(&args.destination);
        let url = self.host.remote_url(&args.repo_name);
        self.git
            .clone_repo(&url, &dest)
            .await
            .map_err(|e| AgentError::collaborator(self.name(), e))?;
        Ok(format!(
            "Cloned {}/{} into {}",
            self.host.owner(),
            args.repo_name,
            dest.display()
        ))
    }
}
