//! Calculator tool - evaluates arithmetic expressions

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::ToolInputSchema;
use crate::tools::{Tool, ToolResult};

/// Longest accepted expression, in characters
const MAX_EXPRESSION_LEN: usize = 4096;

/// Deepest accepted nesting of parentheses, signs and exponents
const MAX_DEPTH: usize = 256;

/// Evaluates `+ - * / % ^` expressions with parentheses and unary minus
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^ and parentheses."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
            .with_properties(json!({
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. \"(2 + 3) * 4\""
                }
            }))
            .with_required(vec!["expression".to_string()])
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let expression = match input {
            Value::String(s) => s.as_str(),
            _ => match input.get("expression").and_then(Value::as_str) {
                Some(s) => s,
                None => bail!("Missing 'expression' parameter"),
            },
        };

        let value = evaluate(expression)?;
        Ok(ToolResult::success(format_number(value)))
    }
}

/// Evaluate an arithmetic expression
///
/// Input comes from the model, so length and nesting are bounded before the
/// recursive descent can exhaust the stack.
pub fn evaluate(expression: &str) -> Result<f64> {
    if expression.chars().count() > MAX_EXPRESSION_LEN {
        bail!("Expression longer than {} characters", MAX_EXPRESSION_LEN);
    }
    let mut parser = ExprParser {
        chars: expression.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
        depth: 0,
    };
    if parser.chars.is_empty() {
        bail!("Empty expression");
    }

    let value = parser.expr()?;
    if let Some(c) = parser.peek() {
        bail!("Unexpected '{}' at position {}", c, parser.pos);
    }
    if !value.is_finite() {
        bail!("Result is not a finite number");
    }
    Ok(value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

struct ExprParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value *= self.unary()?;
            } else if self.eat('/') {
                let divisor = self.unary()?;
                if divisor == 0.0 {
                    bail!("Division by zero");
                }
                value /= divisor;
            } else if self.eat('%') {
                let divisor = self.unary()?;
                if divisor == 0.0 {
                    bail!("Modulo by zero");
                }
                value %= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    // unary := ('-' | '+') unary | power
    //
    // Every recursive path (parentheses, signs, exponents) passes through
    // here, so this is where nesting is counted.
    fn unary(&mut self) -> Result<f64> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            bail!("Expression nested too deeply");
        }
        let value = if self.eat('-') {
            self.unary().map(|v| -v)
        } else if self.eat('+') {
            self.unary()
        } else {
            self.power()
        };
        self.depth -= 1;
        value
    }

    // power := primary ('^' unary)?
    fn power(&mut self) -> Result<f64> {
        let base = self.primary()?;
        if self.eat('^') {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64> {
        if self.eat('(') {
            let value = self.expr()?;
            if !self.eat(')') {
                bail!("Missing closing parenthesis");
            }
            return Ok(value);
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if start == self.pos {
            match self.peek() {
                Some(c) => bail!("Unexpected '{}' at position {}", c, self.pos),
                None => bail!("Unexpected end of expression"),
            }
        }

        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| anyhow::anyhow!("Invalid number '{}'", literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(evaluate("2+2").unwrap(), 4.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("2^3^2").unwrap(), 512.0);
        assert_eq!(evaluate("-2^2").unwrap(), -4.0);
        assert_eq!(evaluate("2^-1").unwrap(), 0.5);
        assert_eq!(evaluate("7 % 3").unwrap(), 1.0);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("").is_err());
        assert!(evaluate("1/0").unwrap_err().to_string().contains("Division by zero"));
        assert!(evaluate("(1+2").is_err());
        assert!(evaluate("1+").is_err());
        assert!(evaluate("2x").is_err());
        assert!(evaluate("1.2.3").is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.5), "0.5");
    }

    #[tokio::test]
    async fn test_accepts_bare_string_and_object_input() {
        let tool = CalculatorTool;
        let bare = tool.execute(&Value::String("2+2".into())).await.unwrap();
        assert_eq!(bare.output, "4");

        let object = tool.execute(&json!({"expression": "6 / 4"})).await.unwrap();
        assert_eq!(object.output, "1.5");

        assert!(tool.execute(&json!({})).await.is_err());
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nested = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        let err = evaluate(&nested).unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));

        let signs = format!("{}1", "-".repeat(1000));
        assert!(evaluate(&signs).unwrap_err().to_string().contains("nested too deeply"));

        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&shallow).unwrap(), 1.0);
        assert_eq!(evaluate(&vec!["1"; 1000].join("+")).unwrap(), 1000.0);
    }

    #[tokio::test]
    async fn test_huge_nested_input_is_an_error() {
        let nested = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let err = CalculatorTool
            .execute(&json!({ "expression": nested }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("longer than"));
    }
}
