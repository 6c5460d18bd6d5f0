use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Tool {
    #[serde(rename = "function")]
    Function(FunctionTool),
}

impl Tool {
    pub fn name(&self) -> &str {
        match self {
            Tool::Function(function) => function.name(),
        }
    }
}

impl From<FunctionTool> for Tool {
    fn from(tool: FunctionTool) -> Self {
        Tool::Function(tool)
    }
}

/// A function the model may call, declared with a JSON Schema object for
/// its arguments.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

impl FunctionTool {
    /// A function taking no arguments.
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    /// Declares a string argument, optionally listing it under `required`.
    pub fn with_string_param(mut self, name: &str, description: &str, required: bool) -> Self {
        if let Some(schema) = self.parameters.as_object_mut() {
            if let Some(Value::Object(properties)) = schema.get_mut("properties") {
                properties.insert(
                    name.to_string(),
                    json!({ "type": "string", "description": description }),
                );
            }
            if required {
                let list = schema
                    .entry("required")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(names) = list {
                    names.push(Value::String(name.to_string()));
                }
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.parameters.get("properties").and_then(Value::as_object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_params_extend_the_schema() {
        let tool = FunctionTool::new("send_user_response", "append text")
            .with_string_param("message", "text to add", true)
            .with_string_param("section", "optional heading", false);

        assert_eq!(
            tool.parameters(),
            &json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "text to add" },
                    "section": { "type": "string", "description": "optional heading" }
                },
                "required": ["message"]
            })
        );
    }

    #[test]
    fn tool_is_tagged_as_function() {
        let tool = Tool::from(FunctionTool::new("display_patent", "show the draft"));
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["name"], "display_patent");
        assert_eq!(tool.name(), "display_patent");
    }
}
