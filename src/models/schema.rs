//! 函数声明与输出结构校验
//!
//! 每个阶段向模型声明一个函数（名称、描述、JSON Schema 参数），
//! 并强制模型以调用该函数的方式作答。模型返回的参数先经过 schema 校验，
//! 再转换为阶段自己的类型化结果。

use std::sync::OnceLock;

use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionNamedToolChoice, ChatCompletionTool, ChatCompletionToolChoiceOption,
    ChatCompletionTools, FunctionName, FunctionObjectArgs,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SchemaError;

/// 单条校验错误信息最多保留的数量
const MAX_VIOLATIONS: usize = 10;

/// 函数声明
pub struct FunctionDeclaration {
    name: &'static str,
    description: &'static str,
    parameters: Value,
    validator: OnceLock<Result<jsonschema::Validator, String>>,
}

impl FunctionDeclaration {
    pub fn new(name: &'static str, description: &'static str, parameters: Value) -> Self {
        Self {
            name,
            description,
            parameters,
            validator: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// OpenAI 兼容的 `tools` 条目
    pub fn to_tool(&self) -> Result<ChatCompletionTools, OpenAIError> {
        let function = FunctionObjectArgs::default()
            .name(self.name)
            .description(self.description)
            .parameters(self.parameters.clone())
            .build()?;

        Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
    }

    /// 强制调用本函数的 `tool_choice`
    pub fn to_tool_choice(&self) -> ChatCompletionToolChoiceOption {
        ChatCompletionToolChoiceOption::Function(ChatCompletionNamedToolChoice {
            function: FunctionName {
                name: self.name.to_string(),
            },
        })
    }

    fn compiled(&self) -> Result<&jsonschema::Validator, SchemaError> {
        self.validator
            .get_or_init(|| jsonschema::validator_for(&self.parameters).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|message| SchemaError::CompileFailed {
                function: self.name.to_string(),
                message: message.clone(),
            })
    }

    /// 按声明的 schema 校验模型输出
    pub fn validate(&self, instance: &Value) -> Result<(), SchemaError> {
        let validator = self.compiled()?;
        if validator.is_valid(instance) {
            return Ok(());
        }

        let violations = validator
            .iter_errors(instance)
            .take(MAX_VIOLATIONS)
            .map(|e| e.to_string())
            .collect();

        Err(SchemaError::Violation {
            function: self.name.to_string(),
            violations,
        })
    }

    /// 校验并转换为类型化结果
    pub fn decode<T: DeserializeOwned>(&self, instance: Value) -> Result<T, SchemaError> {
        self.validate(&instance)?;
        serde_json::from_value(instance).map_err(|source| SchemaError::Deserialize {
            function: self.name.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for FunctionDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDeclaration")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn declaration() -> FunctionDeclaration {
        FunctionDeclaration::new(
            "rate",
            "Rate something.",
            json!({
                "type": "object",
                "properties": {
                    "score": { "type": "number", "minimum": 0, "maximum": 10 },
                    "kind": { "type": "string", "enum": ["a", "b"] }
                },
                "required": ["score", "kind"]
            }),
        )
    }

    #[derive(Debug, Deserialize)]
    struct Rating {
        score: f64,
        kind: String,
    }

    #[test]
    fn test_decode_valid_instance() {
        let rating: Rating = declaration()
            .decode(json!({ "score": 7, "kind": "a" }))
            .unwrap();
        assert_eq!(rating.score, 7.0);
        assert_eq!(rating.kind, "a");
    }

    #[test]
    fn test_out_of_range_and_enum_violations() {
        let err = declaration()
            .validate(&json!({ "score": 11, "kind": "c" }))
            .unwrap_err();
        match err {
            SchemaError::Violation { function, violations } => {
                assert_eq!(function, "rate");
                assert_eq!(violations.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_required_field() {
        assert!(declaration().validate(&json!({ "score": 1 })).is_err());
    }

    #[test]
    fn test_tool_shape() {
        let decl = declaration();
        let tool = serde_json::to_value(decl.to_tool().unwrap()).unwrap();
        assert_eq!(tool["type"], "function");
        assert_eq!(tool["function"]["name"], "rate");
        assert_eq!(tool["function"]["parameters"]["required"], json!(["score", "kind"]));

        let choice = serde_json::to_value(decl.to_tool_choice()).unwrap();
        assert_eq!(choice, json!({ "type": "function", "function": { "name": "rate" } }));
    }
}
