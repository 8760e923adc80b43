use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::actions::{check_repo_name, Action, ArgIssue};
use crate::core::AgentError;
use crate::integrations::{RepoHost, Visibility};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepoArgs {
    /// Name of the new repository
    pub repo_name: String,
    /// Short description shown on the repository page
    pub description: Option<String>,
    /// "public" (default) or "private"
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Serialize)]
pub struct CreatedRepo {
    pub name: String,
    pub url: String,
    pub visibility: Visibility,
}

pub struct CreateRepoAction {
    host: Arc<dyn RepoHost>,
}

impl CreateRepoAction {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Action for CreateRepoAction {
    type Args = CreateRepoArgs;
    type Output = CreatedRepo;

    fn name(&self) -> &'static str {
        "create_repo"
    }

    fn description(&self) -> &'static str {
        "Create a new GitHub repository under the authenticated account. Returns its name, URL and visibility."
    }

    fn validate_args(&self, args: &CreateRepoArgs) -> Result<(), ArgIssue> {
        check_repo_name(&args.repo_name)
    }

    async fn call(&self, args: CreateRepoArgs) -> Result<CreatedRepo, AgentError> {
        let visibility = args.visibility.unwrap_or_default();
        let repo = self
            .host
            .create_repo(&args.repo_name, args.description.as_deref(), visibility)
            .await
            .map_err(|e| AgentError::collaborator(self.name(), e))?;
        tracing::info!(repo = %repo.name, url = %repo.url, "repository created");
        Ok(CreatedRepo {
            name: repo.name,
            url: repo.url,
            visibility: repo.visibility,
        })
    }
}
