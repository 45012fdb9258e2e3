//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+ - * / % ^`, parentheses, unary minus, and decimals.
//! `^` is right-associative and binds tighter than unary minus, so
//! `-2^2` is `-4`.

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolOutput};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports +, -, *, /, %, ^, parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let expr = crate::string_arg(&arguments, "expression")?;
        let value = evaluate(expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason,
        })?;
        Ok(ToolOutput::text(format_number(value))
            .with_payload(serde_json::json!({ "result": value })))
    }
}

/// Whole numbers print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut cursor = Cursor {
        src: expr.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = cursor.expression(0)?;
    cursor.skip_ws();
    if let Some(&b) = cursor.src.get(cursor.pos) {
        return Err(format!(
            "unexpected '{}' at offset {}",
            b as char, cursor.pos
        ));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".into());
    }
    Ok(value)
}

#[derive(Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl Op {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'+' => Self::Add,
            b'-' => Self::Sub,
            b'*' => Self::Mul,
            b'/' => Self::Div,
            b'%' => Self::Rem,
            b'^' => Self::Pow,
            _ => return None,
        })
    }

    /// (binding power, right associative)
    fn precedence(self) -> (u8, bool) {
        match self {
            Self::Add | Self::Sub => (1, false),
            Self::Mul | Self::Div | Self::Rem => (2, false),
            Self::Pow => (4, true),
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> Result<f64, String> {
        match self {
            Self::Add => Ok(lhs + rhs),
            Self::Sub => Ok(lhs - rhs),
            Self::Mul => Ok(lhs * rhs),
            Self::Div | Self::Rem if rhs == 0.0 => Err("division by zero".into()),
            Self::Div => Ok(lhs / rhs),
            Self::Rem => Ok(lhs % rhs),
            Self::Pow => Ok(lhs.powf(rhs)),
        }
    }
}

/// Unary minus sits between multiplicative operators and `^`.
const UNARY_BP: u8 = 3;

/// Deepest nesting of groups, signs, and `^` chains accepted.
const MAX_DEPTH: usize = 256;

struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Cursor<'_> {
    fn skip_ws(&mut self) {
        while self.src.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    /// Precedence climbing: parse operands joined by operators binding at
    /// least as tightly as `min_bp`.
    fn expression(&mut self, min_bp: u8) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        self.depth += 1;
        let value = self.climb(min_bp);
        self.depth -= 1;
        value
    }

    fn climb(&mut self, min_bp: u8) -> Result<f64, String> {
        let mut lhs = self.operand()?;
        while let Some(op) = self.peek().and_then(Op::from_byte) {
            let (bp, right_assoc) = op.precedence();
            if bp < min_bp {
                break;
            }
            self.pos += 1;
            let next_bp = if right_assoc { bp } else { bp + 1 };
            let rhs = self.expression(next_bp)?;
            lhs = op.apply(lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.expression(UNARY_BP)?)
            }
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expression(0)?;
                if self.peek() != Some(b')') {
                    return Err("expected ')'".into());
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(b) if b.is_ascii_digit() || b == b'.' => self.number(),
            Some(b) => Err(format!("unexpected '{}' at offset {}", b as char, self.pos)),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_digit() || *b == b'.')
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        text.parse()
            .map_err(|_| format!("invalid number '{text}'"))
    }
}
