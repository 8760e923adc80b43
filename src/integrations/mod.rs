//! 外部协作方：远程仓库托管 API 与本地 git

pub mod git;
pub mod github;
pub mod offline;

pub use git::{GitCli, GitError, LocalGit};
pub use github::{
    CommitSummary, GitHubHost, HostError, RemoteUrl, RepoDetails, RepoHost, RepoUpdate, Visibility,
};
pub use offline::InMemoryRepoHost;
