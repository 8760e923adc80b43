//! 动作输入契约：schemars 生成 JSON Schema，并在派发前按 Schema 校验参数
//!
//! 生成的 Schema 同时用于告知推理服务（function parameters）与执行前校验，保证二者一致。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 参数校验失败：出错的字段与原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgIssue {
    pub field: String,
    pub reason: String,
}

impl ArgIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 为参数类型生成内联（无 $ref）的 object Schema；Option 字段只是「非必填」，不额外加 null 类型
pub fn input_schema<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.option_add_null_type = false;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let mut schema = serde_json::to_value(root).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
        obj.entry("type").or_insert_with(|| Value::String("object".to_string()));
        obj.entry("properties").or_insert_with(|| Value::Object(Default::default()));
    }
    schema
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "number" => value.is_number(),
        other => type_name(value) == other,
    }
}

/// 整数 format 对应的取值范围（schemars 为 u8/u32 等只给出 format 与 minimum）
fn format_range(format: &str) -> Option<(i128, i128)> {
    let range = match format {
        "uint8" => (0, u8::MAX as i128),
        "uint16" => (0, u16::MAX as i128),
        "uint32" => (0, u32::MAX as i128),
        "uint64" | "uint" => (0, u64::MAX as i128),
        "int8" => (i8::MIN as i128, i8::MAX as i128),
        "int16" => (i16::MIN as i128, i16::MAX as i128),
        "int32" => (i32::MIN as i128, i32::MAX as i128),
        "int64" | "int" => (i64::MIN as i128, i64::MAX as i128),
        _ => return None,
    };
    Some(range)
}

/// 数值超出 minimum / maximum 或整数 format 的范围时给出原因
fn out_of_range(prop: &Value, value: &Value) -> Option<String> {
    let n = value.as_f64()?;
    let mut low = prop.get("minimum").and_then(Value::as_f64);
    let mut high = prop.get("maximum").and_then(Value::as_f64);
    if let Some((lo, hi)) = prop.get("format").and_then(Value::as_str).and_then(format_range) {
        low = Some(low.map_or(lo as f64, |l| l.max(lo as f64)));
        high = Some(high.map_or(hi as f64, |h| h.min(hi as f64)));
    }
    match (low, high) {
        (Some(lo), _) if n < lo => Some(format!("must be at least {lo}, got {value}")),
        (_, Some(hi)) if n > hi => Some(format!("must be at most {hi}, got {value}")),
        _ => None,
    }
}

/// 按 Schema 的 required / properties.type / 数值范围 / enum 校验参数对象
pub fn check(schema: &Value, args: &Value) -> Result<(), ArgIssue> {
    let obj = args
        .as_object()
        .ok_or_else(|| ArgIssue::new("(arguments)", format!("must be a JSON object, got {}", type_name(args))))?;

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for name in &required {
        match obj.get(*name) {
            None | Some(Value::Null) => return Err(ArgIssue::new(*name, "is required")),
            Some(_) => {}
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, value) in obj {
        let Some(prop) = properties.get(name) else {
            continue;
        };
        if value.is_null() && !required.contains(&name.as_str()) {
            continue;
        }
        if let Some(expected) = prop.get("type") {
            let ok = match expected {
                Value::String(t) => matches_type(t, value),
                Value::Array(ts) => ts.iter().filter_map(Value::as_str).any(|t| matches_type(t, value)),
                _ => true,
            };
            if !ok {
                return Err(ArgIssue::new(
                    name.as_str(),
                    format!("must be {}, got {}", expected_label(expected), type_name(value)),
                ));
            }
        }
        if let Some(reason) = out_of_range(prop, value) {
            return Err(ArgIssue::new(name.as_str(), reason));
        }
        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
                return Err(ArgIssue::new(
                    name.as_str(),
                    format!("must be one of {}, got {value}", options.join(", ")),
                ));
            }
        }
    }
    Ok(())
}

fn expected_label(expected: &Value) -> String {
    match expected {
        Value::String(t) => t.clone(),
        Value::Array(ts) => ts
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

/// 反序列化为参数类型；serde 的报错里带反引号的字段名会被提取出来
pub fn parse<T: DeserializeOwned>(args: Value) -> Result<T, ArgIssue> {
    serde_json::from_value(args).map_err(|e| {
        let msg = e.to_string();
        let field = msg
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next())
            .unwrap_or("(arguments)")
            .to_string();
        ArgIssue::new(field, msg)
    })
}
