//! Current time tool

use anyhow::Result;
use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use serde_json::{json, Value};

use crate::llm::ToolInputSchema;
use crate::tools::{Tool, ToolResult};

const DEFAULT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Reports the current UTC time, optionally in a strftime format
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new().with_properties(json!({
            "format": {
                "type": "string",
                "description": "Optional strftime format, defaults to RFC 3339"
            }
        }))
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let format = input
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FORMAT);

        let items: Vec<Item> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Ok(ToolResult::error(format!("Invalid time format: {}", format)));
        }

        let now = Utc::now();
        Ok(ToolResult::success(
            now.format_with_items(items.into_iter()).to_string(),
        ))
    }
}
