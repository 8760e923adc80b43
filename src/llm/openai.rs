//! OpenAI 兼容推理服务（function tools）
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）：动作目录作为 tools 下发，
//! 返回的 tool_calls 转为 ActionRequest；没有 tool_calls 时取 content 作为最终回答。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionResponseMessage, ChatCompletionTool,
    ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;

use crate::actions::ActionSpec;
use crate::llm::{DecisionEngine, DecisionOutcome};
use crate::memory::{ActionRequest, Message, Role};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a GitHub repository assistant. \
You manage repositories of the authenticated account by calling the provided actions: \
create, delete, inspect and update repositories, list commits, write files, push a local \
directory and clone. Call an action whenever the user asks for something it can do; \
when an action fails, explain the failure or try a different approach. \
Answer concisely and include URLs returned by actions.";

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容决策引擎：system prompt 每次请求时前置，不写入会话历史
pub struct OpenAiEngine {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
    request_timeout: Duration,
    pub usage: TokenUsage,
}

impl OpenAiEngine {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout: Duration::from_secs(60),
            usage: TokenUsage::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// 会话历史转为 chat/completions 消息；action_result 对应 role=tool
pub fn to_request_messages(
    system_prompt: &str,
    history: &[Message],
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut out: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 1);
    if !system_prompt.is_empty() {
        out.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()?
                .into(),
        );
    }
    for m in history {
        let msg: ChatCompletionRequestMessage = match m.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(m.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(m.content.clone())
                .build()?
                .into(),
            Role::Assistant => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if !m.content.is_empty() || !m.has_requests() {
                    args.content(m.content.clone());
                }
                if m.has_requests() {
                    let calls: Vec<ChatCompletionMessageToolCalls> = m
                        .action_requests
                        .iter()
                        .map(|r| {
                            ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                                id: r.id.clone(),
                                function: FunctionCall {
                                    name: r.name.clone(),
                                    arguments: r.arguments.to_string(),
                                },
                            })
                        })
                        .collect();
                    args.tool_calls(calls);
                }
                args.build()?.into()
            }
            Role::ActionResult => ChatCompletionRequestToolMessageArgs::default()
                .content(m.content.clone())
                .tool_call_id(m.correlation_id.clone().unwrap_or_default())
                .build()?
                .into(),
        };
        out.push(msg);
    }
    Ok(out)
}

pub fn to_tools(actions: &[ActionSpec]) -> Vec<ChatCompletionTools> {
    actions
        .iter()
        .map(|a| {
            ChatCompletionTools::Function(ChatCompletionTool {
                function: FunctionObject {
                    name: a.name.clone(),
                    description: Some(a.description.clone()),
                    parameters: Some(a.input_schema.clone()),
                    strict: None,
                },
            })
        })
        .collect()
}

/// 模型给出的参数不一定是合法 JSON：解析失败时原样保留为字符串，交给参数校验报错
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn to_outcome(message: ChatCompletionResponseMessage) -> DecisionOutcome {
    let requests: Vec<ActionRequest> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| match call {
            ChatCompletionMessageToolCalls::Function(c) => {
                ActionRequest::new(c.id, c.function.name, parse_arguments(&c.function.arguments))
            }
            ChatCompletionMessageToolCalls::Custom(c) => {
                ActionRequest::new(c.id, c.custom_tool.name, Value::String(c.custom_tool.input))
            }
        })
        .collect();

    if requests.is_empty() {
        DecisionOutcome::FinalAnswer(message.content.unwrap_or_default())
    } else {
        DecisionOutcome::ActionsRequested(requests)
    }
}

#[async_trait]
impl DecisionEngine for OpenAiEngine {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn decide(
        &self,
        history: &[Message],
        actions: &[ActionSpec],
    ) -> Result<DecisionOutcome, String> {
        let messages = to_request_messages(&self.system_prompt, history).map_err(|e| e.to_string())?;
        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(messages);
        if !actions.is_empty() {
            request.tools(to_tools(actions));
        }
        let request = request.build().map_err(|e| e.to_string())?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| format!("request timed out after {}s", self.request_timeout.as_secs()))?
            .map_err(|e| e.to_string())?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| "response contained no choices".to_string())?;
        Ok(to_outcome(choice.message))
    }
}
