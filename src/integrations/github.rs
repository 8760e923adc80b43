//! 远程仓库托管 API（GitHub）
//!
//! RepoHost 是动作层依赖的协作方接口；GitHubHost 通过 octocrab 调用 GitHub REST API，
//! 启动时用 who-am-I 解析出当前账号，之后所有操作都限定在该账号下。

use std::fmt;

use async_trait::async_trait;
use octocrab::Octocrab;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("repository '{0}' not found")]
    NotFound(String),

    #[error("repository '{0}' already exists")]
    AlreadyExists(String),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    Transport(String),

    #[error("missing GitHub token: set GITHUB_TOKEN or [github].token")]
    MissingToken,
}

/// 仓库可见性
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn is_private(self) -> bool {
        matches!(self, Visibility::Private)
    }
}

/// 仓库详情（动作输出，camelCase 序列化）
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoDetails {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub visibility: Visibility,
    pub url: String,
    pub created_at: Option<String>,
    pub avatar_url: Option<String>,
    pub owner_view_type: Option<String>,
}

/// 仓库更新字段；None 表示保持不变
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RepoUpdate {
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
}

impl RepoUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.visibility.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub commit_id: String,
    pub sha: String,
    pub message: String,
    pub committer_name: Option<String>,
    pub date: Option<String>,
}

/// 带凭据的远程地址：Display / Debug 只输出脱敏形式，expose() 才返回真实 URL
#[derive(Clone)]
pub struct RemoteUrl {
    url: String,
    secret: Option<String>,
}

impl RemoteUrl {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            url: url.into(),
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn expose(&self) -> &str {
        &self.url
    }

    /// 把文本中出现的凭据替换为 ***（git 的报错里可能带着完整 URL）
    pub fn redact(&self, text: &str) -> String {
        match &self.secret {
            Some(secret) => text.replace(secret.as_str(), "***"),
            None => text.to_string(),
        }
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redact(&self.url))
    }
}

impl fmt::Debug for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteUrl({self})")
    }
}

/// 远程仓库托管接口：所有仓库名都相对于 owner()
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// 当前认证账号（who-am-I 的结果）
    fn owner(&self) -> &str;

    /// 供 git clone / push 使用的带凭据地址
    fn remote_url(&self, repo: &str) -> RemoteUrl;

    async fn create_repo(
        &self,
        name: &str,
        description: Option<&str>,
        visibility: Visibility,
    ) -> Result<RepoDetails, HostError>;

    async fn delete_repo(&self, name: &str) -> Result<(), HostError>;

    async fn repo_details(&self, name: &str) -> Result<RepoDetails, HostError>;

    async fn update_repo(&self, name: &str, update: RepoUpdate) -> Result<RepoDetails, HostError>;

    /// 分页列出提交（page 从 1 开始，新提交在前）
    async fn list_commits(
        &self,
        name: &str,
        per_page: u8,
        page: u32,
    ) -> Result<Vec<CommitSummary>, HostError>;

    /// 创建或更新文件，返回文件的网页地址
    async fn put_file(
        &self,
        name: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, HostError>;
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
    avatar_url: Option<String>,
    user_view_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    id: u64,
    name: String,
    description: Option<String>,
    owner: ApiOwner,
    #[serde(default)]
    private: bool,
    visibility: Option<String>,
    html_url: String,
    created_at: Option<String>,
}

impl From<ApiRepo> for RepoDetails {
    fn from(repo: ApiRepo) -> Self {
        let visibility = match repo.visibility.as_deref() {
            Some("private") | Some("internal") => Visibility::Private,
            Some(_) => Visibility::Public,
            None if repo.private => Visibility::Private,
            None => Visibility::Public,
        };
        Self {
            id: repo.id,
            name: repo.name,
            description: repo.description,
            owner: repo.owner.login,
            visibility,
            url: repo.html_url,
            created_at: repo.created_at,
            avatar_url: repo.owner.avatar_url,
            owner_view_type: repo.owner.user_view_type,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiCommitter {
    name: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitBody {
    message: String,
    committer: Option<ApiCommitter>,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    node_id: String,
    commit: ApiCommitBody,
}

impl From<ApiCommit> for CommitSummary {
    fn from(c: ApiCommit) -> Self {
        let (committer_name, date) = match c.commit.committer {
            Some(committer) => (committer.name, committer.date),
            None => (None, None),
        };
        Self {
            commit_id: c.node_id,
            sha: c.sha,
            message: c.commit.message,
            committer_name,
            date,
        }
    }
}

#[derive(Serialize)]
struct Paging {
    per_page: u8,
    page: u32,
}

/// octocrab 的非 API 错误带有 backtrace，只保留第一行给用户看
fn map_octocrab_error(err: octocrab::Error, repo: &str) -> HostError {
    match &err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            let already_exists = source
                .errors
                .iter()
                .flatten()
                .any(|e| e.to_string().contains("already exists"));
            match status {
                404 => HostError::NotFound(repo.to_string()),
                422 if already_exists => HostError::AlreadyExists(repo.to_string()),
                _ => HostError::Api {
                    status,
                    message: source.message.clone(),
                },
            }
        }
        other => HostError::Transport(
            other
                .to_string()
                .lines()
                .next()
                .unwrap_or("unknown error")
                .to_string(),
        ),
    }
}

pub struct GitHubHost {
    octocrab: Octocrab,
    owner: String,
    token: String,
}

impl GitHubHost {
    /// 用个人访问令牌连接 GitHub，并通过 who-am-I 解析当前账号
    pub async fn connect(token: impl Into<String>) -> Result<Self, HostError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(HostError::MissingToken);
        }
        let octocrab = Octocrab::builder()
            .personal_token(token.clone())
            .build()
            .map_err(|e| map_octocrab_error(e, ""))?;
        let me = octocrab
            .current()
            .user()
            .await
            .map_err(|e| map_octocrab_error(e, ""))?;
        tracing::info!(owner = %me.login, "Authenticated to GitHub");
        Ok(Self {
            octocrab,
            owner: me.login,
            token,
        })
    }

    fn repo_route(&self, name: &str) -> String {
        format!("/repos/{}/{}", self.owner, name)
    }
}

#[async_trait]
impl RepoHost for GitHubHost {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn remote_url(&self, repo: &str) -> RemoteUrl {
        RemoteUrl::new(
            format!("https://{}@github.com/{}/{}.git", self.token, self.owner, repo),
            Some(self.token.clone()),
        )
    }

    async fn create_repo(
        &self,
        name: &str,
        description: Option<&str>,
        visibility: Visibility,
    ) -> Result<RepoDetails, HostError> {
        let body = serde_json::json!({
            "name": name,
            "description": description.unwrap_or_default(),
            "private": visibility.is_private(),
        });
        let repo: ApiRepo = self
            .octocrab
            .post("/user/repos", Some(&body))
            .await
            .map_err(|e| map_octocrab_error(e, name))?;
        Ok(repo.into())
    }

    async fn delete_repo(&self, name: &str) -> Result<(), HostError> {
        self.octocrab
            .repos(self.owner.as_str(), name)
            .delete()
            .await
            .map_err(|e| map_octocrab_error(e, name))
    }

    async fn repo_details(&self, name: &str) -> Result<RepoDetails, HostError> {
        let repo: ApiRepo = self
            .octocrab
            .get(self.repo_route(name), None::<&()>)
            .await
            .map_err(|e| map_octocrab_error(e, name))?;
        Ok(repo.into())
    }

    async fn update_repo(&self, name: &str, update: RepoUpdate) -> Result<RepoDetails, HostError> {
        let mut body = serde_json::Map::new();
        if let Some(description) = update.description {
            body.insert("description".to_string(), description.into());
        }
        if let Some(visibility) = update.visibility {
            body.insert("private".to_string(), visibility.is_private().into());
        }
        let repo: ApiRepo = self
            .octocrab
            .patch(self.repo_route(name), Some(&body))
            .await
            .map_err(|e| map_octocrab_error(e, name))?;
        Ok(repo.into())
    }

    async fn list_commits(
        &self,
        name: &str,
        per_page: u8,
        page: u32,
    ) -> Result<Vec<CommitSummary>, HostError> {
        let commits: Vec<ApiCommit> = self
            .octocrab
            .get(
                format!("{}/commits", self.repo_route(name)),
                Some(&Paging { per_page, page }),
            )
            .await
            .map_err(|e| map_octocrab_error(e, name))?;
        Ok(commits.into_iter().map(CommitSummary::from).collect())
    }

    async fn put_file(
        &self,
        name: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, HostError> {
        let repos = self.octocrab.repos(self.owner.as_str(), name);

        // 已存在的文件需要带上 blob sha 才能覆盖
        let existing_sha = match repos.get_content().path(path).send().await {
            Ok(mut items) => items.take_items().into_iter().next().map(|c| c.sha),
            Err(e) => match map_octocrab_error(e, name) {
                HostError::NotFound(_) => None,
                other => return Err(other),
            },
        };

        let update = match existing_sha {
            Some(sha) => repos.update_file(path, message, content, sha).send().await,
            None => repos.create_file(path, message, content).send().await,
        }
        .map_err(|e| map_octocrab_error(e, name))?;

        Ok(update.content.html_url.unwrap_or(update.content.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_url_never_displays_token() {
        let url = RemoteUrl::new(
            "https://ghp_secret@github.com/me/demo.git",
            Some("ghp_secret".to_string()),
        );
        assert_eq!(url.to_string(), "https://***@github.com/me/demo.git");
        assert!(!format!("{url:?}").contains("ghp_secret"));
        assert!(url.expose().contains("ghp_secret"));
        assert_eq!(
            url.redact("fatal: could not read from https://ghp_secret@github.com"),
            "fatal: could not read from https://***@github.com"
        );
    }

    #[test]
    fn test_api_repo_maps_to_details() {
        let raw = serde_json::json!({
            "id": 42,
            "name": "demo",
            "description": "test",
            "owner": {
                "login": "me",
                "avatar_url": "https://avatars.example/me",
                "user_view_type": "public"
            },
            "private": true,
            "html_url": "https://github.com/me/demo",
            "created_at": "2024-01-01T00:00:00Z"
        });
        let repo: ApiRepo = serde_json::from_value(raw).unwrap();
        let details = RepoDetails::from(repo);
        assert_eq!(details.visibility, Visibility::Private);
        assert_eq!(details.owner, "me");
        assert_eq!(details.owner_view_type.as_deref(), Some("public"));
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["avatarUrl"], "https://avatars.example/me");
        assert_eq!(json["createdAt"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_api_commit_maps_to_summary() {
        let raw = serde_json::json!({
            "sha": "abc123",
            "node_id": "C_kwD",
            "commit": {
                "message": "Initial commit",
                "committer": {"name": "Me", "email": "me@example.com", "date": "2024-01-02T00:00:00Z"}
            }
        });
        let commit: ApiCommit = serde_json::from_value(raw).unwrap();
        let summary = CommitSummary::from(commit);
        assert_eq!(summary.sha, "abc123");
        assert_eq!(summary.commit_id, "C_kwD");
        assert_eq!(summary.committer_name.as_deref(), Some("Me"));
    }

    #[test]
    fn test_visibility_schema_is_string_enum() {
        let schema = serde_json::to_value(schemars::schema_for!(Visibility)).unwrap();
        assert_eq!(schema["type"], "string");
        assert_eq!(schema["enum"], serde_json::json!(["public", "private"]));
    }
}
