//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `REPOPILOT__*` 覆盖（双下划线表示嵌套，
//! 如 `REPOPILOT__APP__MAX_ACTION_ROUNDS=12`）。API Key 与 GitHub Token 走各自的环境变量。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub actions: ActionsSection,
    pub store: StoreSection,
    pub github: GitHubSection,
}

/// [app] 段：会话 id、每轮往返上限、轮次期限、系统提示词
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// REPL 使用的固定会话 id
    pub session_id: String,
    pub max_action_rounds: usize,
    /// 单轮期限（秒），未设置时不限
    pub turn_timeout_secs: Option<u64>,
    /// 直接给出系统提示词（优先于 prompt_path）
    pub system_prompt: Option<String>,
    pub prompt_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            session_id: "default".to_string(),
            max_action_rounds: crate::react::DEFAULT_MAX_ROUNDS,
            turn_timeout_secs: None,
            system_prompt: None,
            prompt_path: None,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek
    pub provider: String,
    /// 为空时用各后端的默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次推理请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [actions] 段：单次动作超时与并发上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActionsSection {
    pub timeout_secs: u64,
    pub max_concurrent: usize,
}

impl Default for ActionsSection {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_concurrent: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
}

/// [store] 段：会话存储后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("data/conversations.db"),
        }
    }
}

/// [github] 段：Token 后备（优先 GITHUB_TOKEN）与离线模式
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GitHubSection {
    pub token: Option<String>,
    /// 使用内存仓库托管，不访问 GitHub
    pub offline: bool,
}

impl GitHubSection {
    /// GITHUB_TOKEN 优先，其次配置文件；空串视为未设置
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var("GITHUB_TOKEN")
            .ok()
            .or_else(|| self.token.clone())
            .filter(|t| !t.trim().is_empty())
    }
}

impl AppConfig {
    /// 系统提示词：[app].system_prompt > prompt_path 文件 > None（用内置默认）
    pub fn system_prompt(&self) -> Option<String> {
        if let Some(p) = &self.app.system_prompt {
            return Some(p.clone());
        }
        let path = self.app.prompt_path.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read prompt file, using default");
                None
            }
        }
    }
}

/// 从 config 目录加载配置，环境变量 REPOPILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("REPOPILOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
