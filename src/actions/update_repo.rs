use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::actions::{check_repo_name, Action, ArgIssue};
use crate::core::AgentError;
use crate::integrations::{RepoDetails, RepoHost, RepoUpdate, Visibility};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRepoArgs {
    /// Name of the repository to update
    pub repo_name: String,
    /// New description; omit to keep the current one
    pub description: Option<String>,
    /// New visibility ("public" or "private"); omit to keep the current one
    pub visibility: Option<Visibility>,
}

pub struct UpdateRepoAction {
    host: Arc<dyn RepoHost>,
}

impl UpdateRepoAction {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Action for UpdateRepoAction {
    type Args = UpdateRepoArgs;
    type Output = RepoDetails;

    fn name(&self) -> &'static str {
        "update_repo"
    }

    fn description(&self) -> &'static str {
        "Change the description and/or visibility of a repository. Returns the updated details."
    }

    fn validate_args(&self, args: &UpdateRepoArgs) -> Result<(), ArgIssue> {
        check_repo_name(&args.repo_name)?;
        if args.description.is_none() && args.visibility.is_none() {
            return Err(ArgIssue::new(
                "description",
                "or visibility must be provided",
            ));
        }
        Ok(())
    }

    async fn call(&self, args: UpdateRepoArgs) -> Result<RepoDetails, AgentError> {
        let update = RepoUpdate {
            description: args.description,
            visibility: args.visibility,
        };
        self.host
            .update_repo(&args.repo_name, update)
            .await
            .map_err(|e| AgentError::collaborator(self.name(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::InMemoryRepoHost;

    #[test]
    fn test_empty_update_rejected() {
        let action = UpdateRepoAction::new(Arc::new(InMemoryRepoHost::new("octo")));
        let issue = action
            .validate_args(&UpdateRepoArgs {
                repo_name: "demo".to_string(),
                description: None,
                visibility: None,
            })
            .unwrap_err();
        assert_eq!(issue.field, "description");
    }

    #[tokio::test]
    async fn test_visibility_only_keeps_description() {
        let host = Arc::new(InMemoryRepoHost::new("octo"));
        host.create_repo("demo", Some("test"), Visibility::Public).await.unwrap();
        let details = UpdateRepoAction::new(host)
            .call(UpdateRepoArgs {
                repo_name: "demo".to_string(),
                description: None,
                visibility: Some(Visibility::Private),
            })
            .await
            .unwrap();
        assert_eq!(details.visibility, Visibility::Private);
        assert_eq!(details.description.as_deref(), Some("test"));
    }
}
