//! 对话消息模型
//!
//! Message 追加后不可变；assistant 消息可携带若干 ActionRequest，action_result 消息携带对应的关联 ID。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ActionResult,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ActionResult => "action_result",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "action_result" => Some(Role::ActionResult),
            _ => None,
        }
    }
}

/// 模型请求执行的一次动作：名称 + 参数 + 关联 ID（与结果配对）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_requests: Vec<ActionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// action_result 消息：产生结果的动作名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// action_result 消息：动作是否失败
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            action_requests: Vec::new(),
            correlation_id: None,
            action: None,
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// 携带动作请求的 assistant 消息（content 通常为空或模型的附带说明）
    pub fn assistant_with_requests(content: impl Into<String>, requests: Vec<ActionRequest>) -> Self {
        Self {
            action_requests: requests,
            ..Self::new(Role::Assistant, content.into())
        }
    }

    pub fn action_result(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..Self::new(Role::ActionResult, content.into())
        }
    }

    /// 标注结果来自哪个动作以及是否失败
    pub fn with_outcome(mut self, action: impl Into<String>, is_error: bool) -> Self {
        self.action = Some(action.into());
        self.is_error = is_error;
        self
    }

    pub fn has_requests(&self) -> bool {
        !self.action_requests.is_empty()
    }
}

/// 会话标识：不透明字符串键
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
