use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::actions::{check_repo_name, Action, ArgIssue};
use crate::core::AgentError;
use crate::integrations::{GitError, LocalGit, RepoHost};

pub const DEFAULT_COMMIT_MESSAGE: &str = "Initial commit";
const REMOTE: &str = "origin";
const BRANCH: &str = "main";

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushArgs {
    /// Name of the (existing) remote repository to push to
    pub repo_name: String,
    /// Local directory whose contents are committed and pushed
    pub local_path: String,
    /// Commit message (default "Initial commit")
    pub commit_message: Option<String>,
}

pub struct PushAction {
    host: Arc<dyn RepoHost>,
    git: Arc<dyn LocalGit>,
}

impl PushAction {
    pub fn new(host: Arc<dyn RepoHost>, git: Arc<dyn LocalGit>) -> Self {
        Self { host, git }
    }
}

#[async_trait]
impl Action for PushAction {
    type Args = PushArgs;
    type Output = String;

    fn name(&self) -> &'static str {
        "push_to_repo"
    }

    fn description(&self) -> &'static str {
        "Commit everything in a local directory and push it to the main branch of a remote repository \
         (initializes git and sets the origin remote if needed)."
    }

    fn validate_args(&self, args: &PushArgs) -> Result<(), ArgIssue> {
        check_repo_name(&args.repo_name)?;
        if args.local_path.trim().is_empty() {
            return Err(ArgIssue::new("localPath", "must not be empty"));
        }
        Ok(())
    }

    async fn call(&self, args: PushArgs) -> Result<String, AgentError> {
        let fail = |e: GitError| AgentError::collaborator(self.name(), e);
        let dir = PathBuf::from(&args.local_path);
        let message = args
            .commit_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string());
        let remote = self.host.remote_url(&args.repo_name);

        self.git.init(&dir).await.map_err(fail)?;
        self.git.add_all(&dir).await.map_err(fail)?;
        let committed = self.git.commit(&dir, &message).await.map_err(fail)?;
        if !committed {
            tracing::info!(path = %dir.display(), "nothing to commit, pushing existing history");
        }
        self.git.ensure_main_branch(&dir).await.map_err(fail)?;
        self.git.set_remote(&dir, REMOTE, &remote).await.map_err(fail)?;
        // 空仓库没有 main 可拉取
        if let Err(e) = self.git.pull_rebase(&dir, REMOTE, BRANCH, &remote).await {
            tracing::warn!(error = %e, "pull --rebase failed, continuing with push");
        }
        self.git.push_upstream(&dir, REMOTE, BRANCH, &remote).await.map_err(fail)?;

        Ok(format!(
            "Pushed {} to {} (branch {BRANCH}){}",
            dir.display(),
            remote,
            if committed { "" } else { "; no new changes were committed" }
        ))
    }
}
