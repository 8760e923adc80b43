//! 动作注册表
//!
//! 每个动作实现强类型的 Action trait（参数类型即输入契约）；注册时擦除为 DynAction，
//! 由 ActionRegistry 按声明顺序保存、按名查找。注册表在启动后不再修改。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::actions::schema::{self, ArgIssue};
use crate::core::AgentError;

/// 强类型动作：名称、描述（供模型选择）、参数类型、异步执行
#[async_trait]
pub trait Action: Send + Sync + 'static {
    type Args: DeserializeOwned + JsonSchema + Send + 'static;
    type Output: Serialize + Send + 'static;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Schema 之外的取值约束（如分页范围）；默认不限制
    fn validate_args(&self, _args: &Self::Args) -> Result<(), ArgIssue> {
        Ok(())
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, AgentError>;
}

/// 类型擦除后的动作，供注册表与执行器统一处理
#[async_trait]
pub trait DynAction: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> &Value;

    /// 只校验不执行
    fn validate(&self, args: &Value) -> Result<(), AgentError>;

    async fn invoke(&self, args: Value) -> Result<Value, AgentError>;
}

struct TypedAction<A: Action> {
    action: A,
    schema: Value,
}

impl<A: Action> TypedAction<A> {
    fn issue(&self, issue: ArgIssue) -> AgentError {
        AgentError::Validation {
            action: self.action.name().to_string(),
            field: issue.field,
            reason: issue.reason,
        }
    }

    fn parse(&self, args: Value) -> Result<A::Args, AgentError> {
        schema::check(&self.schema, &args).map_err(|i| self.issue(i))?;
        let parsed: A::Args = schema::parse(args).map_err(|i| self.issue(i))?;
        self.action.validate_args(&parsed).map_err(|i| self.issue(i))?;
        Ok(parsed)
    }
}

#[async_trait]
impl<A: Action> DynAction for TypedAction<A> {
    fn name(&self) -> &str {
        self.action.name()
    }

    fn description(&self) -> &str {
        self.action.description()
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn validate(&self, args: &Value) -> Result<(), AgentError> {
        self.parse(args.clone()).map(drop)
    }

    async fn invoke(&self, args: Value) -> Result<Value, AgentError> {
        let parsed = self.parse(args)?;
        let output = self.action.call(parsed).await?;
        serde_json::to_value(output).map_err(|e| AgentError::collaborator(self.action.name(), e))
    }
}

/// 告知推理服务的动作描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// 动作注册表：保持声明顺序，名称唯一
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Arc<dyn DynAction>>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A: Action>(&mut self, action: A) -> Result<(), AgentError> {
        let name = action.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::DuplicateAction(name));
        }
        let schema = schema::input_schema::<A::Args>();
        let typed = TypedAction { action, schema };
        self.index.insert(name, self.actions.len());
        self.actions.push(Arc::new(typed));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn DynAction>, AgentError> {
        self.index
            .get(name)
            .map(|&i| self.actions[i].clone())
            .ok_or_else(|| AgentError::UnknownAction(name.to_string()))
    }

    pub fn specs(&self) -> Vec<ActionSpec> {
        self.actions
            .iter()
            .map(|a| ActionSpec {
                name: a.name().to_string(),
                description: a.description().to_string(),
                input_schema: a.input_schema().clone(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
    }

    struct Echo(&'static str);

    #[async_trait]
    impl Action for Echo {
        type Args = EchoArgs;
        type Output = String;

        fn name(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "Echo text back"
        }

        fn validate_args(&self, args: &EchoArgs) -> Result<(), ArgIssue> {
            if args.text.is_empty() {
                return Err(ArgIssue::new("text", "must not be empty"));
            }
            Ok(())
        }

        async fn call(&self, args: EchoArgs) -> Result<String, AgentError> {
            Ok(args.text)
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ActionRegistry::new();
        registry.register(Echo("echo")).unwrap();
        let err = registry.register(Echo("echo")).unwrap_err();
        assert_eq!(err, AgentError::DuplicateAction("echo".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_keeps_declaration_order() {
        let mut registry = ActionRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(Echo(name)).unwrap();
        }
        assert_eq!(registry.names(), ["zeta", "alpha", "mid"]);
        assert_eq!(registry.specs()[1].input_schema["required"], serde_json::json!(["text"]));
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ActionRegistry::new();
        let err = registry.resolve("nope").err().unwrap();
        assert_eq!(err, AgentError::UnknownAction("nope".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_validates_before_running() {
        let mut registry = ActionRegistry::new();
        registry.register(Echo("echo")).unwrap();
        let echo = registry.resolve("echo").unwrap();

        let out = echo.invoke(serde_json::json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, serde_json::json!("hi"));

        let err = echo.validate(&serde_json::json!({"text": ""})).unwrap_err();
        assert!(matches!(err, AgentError::Validation { ref field, .. } if field == "text"));
    }
}
