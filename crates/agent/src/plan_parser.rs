//! Extracts the structured plan object from free-form model text.
//!
//! The model is asked to embed `{"reasoning": "...", "tool_calls": [...]}`
//! somewhere in its reply. The object may sit in a fenced ```json block or
//! inline among prose. Only objects that carry a `tool_calls` key count.

use serde_json::Value;

/// A plan object as the model wrote it, before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub reasoning: Option<String>,
    /// Text surrounding the object
    pub commentary: String,
    pub calls: Vec<RawCall>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// No object with a `tool_calls` key anywhere in the text
    NoPlanObject,
    /// An object was found but its shape is wrong
    Invalid(String),
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPlanObject => f.write_str("no JSON object with a \"tool_calls\" field was found"),
            Self::Invalid(reason) => f.write_str(reason),
        }
    }
}

/// Parse a model reply into a plan.
pub fn parse_plan(text: &str) -> Result<ParsedPlan, ParseFailure> {
    let (value, span) = find_plan_object(text).ok_or(ParseFailure::NoPlanObject)?;

    let mut commentary = String::with_capacity(text.len());
    commentary.push_str(text[..span.0].trim());
    let tail = text[span.1..].trim();
    if !tail.is_empty() {
        if !commentary.is_empty() {
            commentary.push('\n');
        }
        commentary.push_str(tail);
    }

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from);

    let calls: Vec<RawCall> = match value.get("tool_calls") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| raw_call(i, item))
            .collect::<Result<_, _>>()?,
        Some(_) => {
            return Err(ParseFailure::Invalid("\"tool_calls\" must be a list".into()));
        }
    };

    Ok(ParsedPlan {
        reasoning,
        commentary,
        calls,
    })
}

fn raw_call(index: usize, item: &Value) -> Result<RawCall, ParseFailure> {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            ParseFailure::Invalid(format!("tool_calls[{index}] has no \"name\""))
        })?;
    Ok(RawCall {
        name: name.to_string(),
        arguments: normalize_arguments(item.get("arguments").cloned().unwrap_or(Value::Null)),
    })
}

/// Arguments may arrive as an object, as a JSON string, or not at all.
///
/// A missing value becomes `{}`. A string holding JSON is decoded. Anything
/// else is passed through for schema validation to reject.
pub fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::Null => Value::Object(Default::default()),
        Value::String(s) if s.trim().is_empty() => Value::Object(Default::default()),
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

/// Locate the plan object. Returns it with the byte span to cut from the text.
fn find_plan_object(text: &str) -> Option<(Value, (usize, usize))> {
    fenced_candidates(text)
        .into_iter()
        .chain(brace_candidates(text))
        .find_map(|(start, end, body)| {
            let value: Value = serde_json::from_str(body).ok()?;
            value
                .as_object()
                .is_some_and(|o| o.contains_key("tool_calls"))
                .then_some((value, (start, end)))
        })
}

/// Bodies of fenced code blocks, with the span of the whole fence.
fn fenced_candidates(text: &str) -> Vec<(usize, usize, &str)> {
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some(open) = text[offset..].find("```") {
        let open = offset + open;
        let after_ticks = open + 3;
        let Some(line_end) = text[after_ticks..].find('\n') else {
            break;
        };
        let body_start = after_ticks + line_end + 1;
        let Some(close) = text[body_start..].find("```") else {
            break;
        };
        let body_end = body_start + close;
        found.push((open, body_end + 3, &text[body_start..body_end]));
        offset = body_end + 3;
    }
    found
}

/// Balanced `{...}` regions in order of appearance, found on demand.
fn brace_candidates(text: &str) -> impl Iterator<Item = (usize, usize, &str)> {
    text.match_indices('{').filter_map(move |(start, _)| {
        let end = matching_brace(text.as_bytes(), start)?;
        Some((start, end + 1, &text[start..=end]))
    })
}

/// Index of the `}` closing the `{` at `open`, skipping braces inside strings.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
