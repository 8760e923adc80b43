//! 组装：按配置创建决策引擎、仓库托管、会话存储，并组装成 Assistant

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::actions::{default_registry, ActionExecutor};
use crate::agent::Assistant;
use crate::config::{load_config, AppConfig, StoreBackend};
use crate::core::TaskScheduler;
use crate::integrations::{GitCli, GitHubHost, InMemoryRepoHost, RepoHost};
use crate::llm::{create_deepseek_engine, DecisionEngine, OfflineEngine, OpenAiEngine};
use crate::memory::{ConversationStore, InMemoryStore, SqliteStore};

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|k| !k.trim().is_empty())
}

/// 根据配置与环境变量选择决策引擎（DeepSeek / OpenAI 兼容 / 离线）
pub fn create_engine_from_config(cfg: &AppConfig) -> Arc<dyn DecisionEngine> {
    let provider = cfg.llm.provider.to_lowercase();
    let deepseek_key = env_key("DEEPSEEK_API_KEY");
    let openai_key = env_key("OPENAI_API_KEY");
    let timeout = Duration::from_secs(cfg.llm.timeouts.request.max(1));
    let prompt = cfg.system_prompt();

    let engine = match (provider.as_str(), deepseek_key, openai_key) {
        ("deepseek", Some(key), _) | ("deepseek", None, Some(key)) => {
            let engine = create_deepseek_engine(&key, cfg.llm.model.as_deref(), cfg.llm.base_url.as_deref());
            tracing::info!("Using DeepSeek engine ({})", engine.model());
            engine
        }
        (_, _, Some(key)) => {
            let model = cfg.llm.model.as_deref().unwrap_or(OPENAI_DEFAULT_MODEL);
            tracing::info!("Using OpenAI-compatible engine ({})", model);
            OpenAiEngine::new(cfg.llm.base_url.as_deref(), model, &key)
        }
        (_, Some(key), None) => {
            let engine = create_deepseek_engine(&key, cfg.llm.model.as_deref(), cfg.llm.base_url.as_deref());
            tracing::info!("Only DEEPSEEK_API_KEY set, using DeepSeek engine ({})", engine.model());
            engine
        }
        _ => {
            tracing::warn!("No API key set, using offline engine");
            return Arc::new(OfflineEngine);
        }
    };

    let engine = engine.with_request_timeout(timeout);
    match prompt {
        Some(p) => Arc::new(engine.with_system_prompt(p)),
        None => Arc::new(engine),
    }
}

/// 仓库托管：离线模式或没有 Token 时用内存实现；有 Token 时连接 GitHub 并解析当前账号
pub async fn create_repo_host(cfg: &AppConfig) -> anyhow::Result<Arc<dyn RepoHost>> {
    if cfg.github.offline {
        tracing::info!("GitHub offline mode, repositories live in memory");
        return Ok(Arc::new(InMemoryRepoHost::new("offline")));
    }
    match cfg.github.resolve_token() {
        Some(token) => {
            let host = GitHubHost::connect(token)
                .await
                .context("cannot authenticate with GitHub")?;
            tracing::info!(owner = %host.owner(), "connected to GitHub");
            Ok(Arc::new(host))
        }
        None => {
            tracing::warn!("GITHUB_TOKEN not set, falling back to in-memory repositories");
            Ok(Arc::new(InMemoryRepoHost::new("offline")))
        }
    }
}

pub fn create_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn ConversationStore>> {
    match cfg.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&cfg.store.path)
                .with_context(|| format!("cannot open {}", cfg.store.path.display()))?;
            tracing::info!(path = %cfg.store.path.display(), "conversation store opened");
            Ok(Arc::new(store))
        }
    }
}

/// 加载配置并组装 Assistant；返回配置供调用方读取会话 id 等
pub async fn create_assistant(config_path: Option<PathBuf>) -> anyhow::Result<(Assistant, AppConfig)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let engine = create_engine_from_config(&cfg);
    let host = create_repo_host(&cfg).await?;
    let store = create_store(&cfg)?;

    let registry = default_registry(host, Arc::new(GitCli::new()))?;
    let executor = ActionExecutor::new(registry, cfg.actions.timeout_secs)
        .with_scheduler(TaskScheduler::new(cfg.actions.max_concurrent));

    let assistant = Assistant::new(engine, executor, store)
        .with_max_rounds(cfg.app.max_action_rounds)
        .with_turn_timeout(cfg.app.turn_timeout_secs.map(Duration::from_secs));
    Ok((assistant, cfg))
}
