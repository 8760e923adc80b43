//! 内存版仓库托管（离线模式 / 测试）
//!
//! 没有 GitHub Token 时作为后备；语义与 GitHubHost 对齐：重名创建报 AlreadyExists，
//! 不存在的仓库报 NotFound，提交按新到旧分页。

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::integrations::{CommitSummary, HostError, RemoteUrl, RepoDetails, RepoHost, RepoUpdate, Visibility};

#[derive(Debug, Clone)]
struct RepoRecord {
    details: RepoDetails,
    files: BTreeMap<String, String>,
    /// 旧到新
    commits: Vec<CommitSummary>,
}

#[derive(Debug, Default)]
struct State {
    repos: BTreeMap<String, RepoRecord>,
    next_id: u64,
    commit_seq: u64,
}

#[derive(Debug)]
pub struct InMemoryRepoHost {
    owner: String,
    token: Option<String>,
    state: Mutex<State>,
}

impl InMemoryRepoHost {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            token: None,
            state: Mutex::new(State::default()),
        }
    }

    /// 让 remote_url 带上凭据（与 GitHubHost 的地址形式相同）
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        // 锁只在同步代码中持有；中毒时沿用内部数据
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    fn url(&self, name: &str) -> String {
        format!("https://github.com/{}/{}", self.owner, name)
    }

    /// 为仓库追加 n 个提交（测试或演示用）
    pub fn seed_commits(&self, name: &str, n: usize) -> Result<(), HostError> {
        self.with_state(|state| {
            for i in 0..n {
                state.commit_seq += 1;
                let seq = state.commit_seq;
                let record = state
                    .repos
                    .get_mut(name)
                    .ok_or_else(|| HostError::NotFound(name.to_string()))?;
                record.commits.push(commit(seq, format!("Commit {}", i + 1)));
            }
            Ok(())
        })
    }

    pub fn file(&self, name: &str, path: &str) -> Option<String> {
        self.with_state(|state| state.repos.get(name)?.files.get(path).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.with_state(|state| state.repos.contains_key(name))
    }
}

fn commit(seq: u64, message: String) -> CommitSummary {
    CommitSummary {
        commit_id: format!("C_{seq:06}"),
        sha: format!("{seq:040x}"),
        message,
        committer_name: Some("offline".to_string()),
        date: Some(chrono::Utc::now().to_rfc3339()),
    }
}

#[async_trait]
impl RepoHost for InMemoryRepoHost {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn remote_url(&self, repo: &str) -> RemoteUrl {
        match &self.token {
            Some(token) => RemoteUrl::new(
                format!("https://{token}@github.com/{}/{repo}.git", self.owner),
                Some(token.clone()),
            ),
            None => RemoteUrl::new(format!("{}.git", self.url(repo)), None),
        }
    }

    async fn create_repo(
        &self,
        name: &str,
        description: Option<&str>,
        visibility: Visibility,
    ) -> Result<RepoDetails, HostError> {
        let url = self.url(name);
        let owner = self.owner.clone();
        self.with_state(|state| {
            if state.repos.contains_key(name) {
                return Err(HostError::AlreadyExists(name.to_string()));
            }
            state.next_id += 1;
            let details = RepoDetails {
                id: state.next_id,
                name: name.to_string(),
                description: description.map(str::to_string),
                owner,
                visibility,
                url,
                created_at: Some(chrono::Utc::now().to_rfc3339()),
                avatar_url: None,
                owner_view_type: Some("public".to_string()),
            };
            state.repos.insert(
                name.to_string(),
                RepoRecord {
                    details: details.clone(),
                    files: BTreeMap::new(),
                    commits: Vec::new(),
                },
            );
            Ok(details)
        })
    }

    async fn delete_repo(&self, name: &str) -> Result<(), HostError> {
        self.with_state(|state| {
            state
                .repos
                .remove(name)
                .map(drop)
                .ok_or_else(|| HostError::NotFound(name.to_string()))
        })
    }

    async fn repo_details(&self, name: &str) -> Result<RepoDetails, HostError> {
        self.with_state(|state| {
            state
                .repos
                .get(name)
                .map(|r| r.details.clone())
                .ok_or_else(|| HostError::NotFound(name.to_string()))
        })
    }

    async fn update_repo(&self, name: &str, update: RepoUpdate) -> Result<RepoDetails, HostError> {
        self.with_state(|state| {
            let record = state
                .repos
                .get_mut(name)
                .ok_or_else(|| HostError::NotFound(name.to_string()))?;
            if let Some(description) = update.description {
                record.details.description = Some(description);
            }
            if let Some(visibility) = update.visibility {
                record.details.visibility = visibility;
            }
            Ok(record.details.clone())
        })
    }

    async fn list_commits(
        &self,
        name: &str,
        per_page: u8,
        page: u32,
    ) -> Result<Vec<CommitSummary>, HostError> {
        self.with_state(|state| {
            let record = state
                .repos
                .get(name)
                .ok_or_else(|| HostError::NotFound(name.to_string()))?;
            let per_page = per_page.max(1) as usize;
            let skip = (page.max(1) as usize - 1) * per_page;
            Ok(record
                .commits
                .iter()
                .rev()
                .skip(skip)
                .take(per_page)
                .cloned()
                .collect())
        })
    }

    async fn put_file(
        &self,
        name: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, HostError> {
        let url = format!("{}/blob/main/{}", self.url(name), path);
        self.with_state(|state| {
            state.commit_seq += 1;
            let seq = state.commit_seq;
            let record = state
                .repos
                .get_mut(name)
                .ok_or_else(|| HostError::NotFound(name.to_string()))?;
            record.files.insert(path.to_string(), content.to_string());
            record.commits.push(commit(seq, message.to_string()));
            Ok(url)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let host = InMemoryRepoHost::new("me");
        host.create_repo("demo", Some("test"), Visibility::Public).await.unwrap();
        let err = host.create_repo("demo", None, Visibility::Public).await.unwrap_err();
        assert_eq!(err, HostError::AlreadyExists("demo".to_string()));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let host = InMemoryRepoHost::new("me");
        let err = host.delete_repo("ghost").await.unwrap_err();
        assert_eq!(err, HostError::NotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_commits_page_newest_first() {
        let host = InMemoryRepoHost::new("me");
        host.create_repo("demo", None, Visibility::Public).await.unwrap();
        host.seed_commits("demo", 25).unwrap();

        let first = host.list_commits("demo", 10, 1).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].message, "Commit 25");

        let third = host.list_commits("demo", 10, 3).await.unwrap();
        assert_eq!(third.len(), 5);
        assert_eq!(third.last().unwrap().message, "Commit 1");
    }

    #[tokio::test]
    async fn test_put_file_overwrites_and_commits() {
        let host = InMemoryRepoHost::new("me");
        host.create_repo("demo", None, Visibility::Public).await.unwrap();
        host.put_file("demo", "README.md", "v1", "add readme").await.unwrap();
        let url = host.put_file("demo", "README.md", "v2", "update readme").await.unwrap();
        assert_eq!(url, "https://github.com/me/demo/blob/main/README.md");
        assert_eq!(host.file("demo", "README.md").as_deref(), Some("v2"));
        assert_eq!(host.list_commits("demo", 30, 1).await.unwrap().len(), 2);
    }
}
