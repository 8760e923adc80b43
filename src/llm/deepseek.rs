//! DeepSeek 推理服务（OpenAI 兼容格式，支持 function tools）
//!
//! - Base URL: https://api.deepseek.com
//! - 模型: deepseek-chat（默认）；deepseek-reasoner 不支持 tools，不建议用于本助手

use crate::llm::OpenAiEngine;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 DeepSeek 决策引擎
///
/// - 模型可通过 `model` 参数或 `DEEPSEEK_MODEL` 环境变量指定，默认 `deepseek-chat`
/// - `base_url` 为空时使用官方地址
pub fn create_deepseek_engine(api_key: &str, model: Option<&str>, base_url: Option<&str>) -> OpenAiEngine {
    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    OpenAiEngine::new(Some(base_url.unwrap_or(DEEPSEEK_BASE_URL)), &model, api_key)
}
