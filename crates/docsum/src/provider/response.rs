//! Parsing of free-form model output into a summary body.

use serde::Deserialize;

use crate::job::ActionItem;

/// Maximum characters kept from an unstructured response.
const DEGRADED_SUMMARY_CHARS: usize = 500;

pub const DEGRADED_KEY_POINT: &str = "Summary generated from unstructured response";

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryBody {
    /// The response contained the requested JSON object.
    Structured {
        summary: String,
        key_points: Vec<String>,
        action_items: Vec<ActionItem>,
    },
    /// The response was salvaged as plain text.
    Degraded {
        summary: String,
        key_points: Vec<String>,
        action_items: Vec<ActionItem>,
    },
}

impl SummaryBody {
    /// Never fails: anything that does not parse becomes `Degraded`.
    pub fn parse(raw: &str) -> Self {
        match parse_structured(raw) {
            Some(body) => body,
            None => {
                log::warn!("AI response not in expected JSON format; using degraded summary");
                Self::degraded(raw)
            }
        }
    }

    fn degraded(raw: &str) -> Self {
        let head: String = raw.chars().take(DEGRADED_SUMMARY_CHARS).collect();
        Self::Degraded {
            summary: format!("{}...", head),
            key_points: vec![DEGRADED_KEY_POINT.to_string()],
            action_items: Vec::new(),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }

    pub fn into_parts(self) -> (String, Vec<String>, Vec<ActionItem>) {
        match self {
            Self::Structured {
                summary,
                key_points,
                action_items,
            }
            | Self::Degraded {
                summary,
                key_points,
                action_items,
            } => (summary, key_points, action_items),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredPayload {
    summary: String,
    #[serde(default, alias = "key_points")]
    key_points: Vec<String>,
    #[serde(default, alias = "action_items")]
    action_items: Vec<RawActionItem>,
}

/// Models sometimes send `null`, a bare string, or a stray number for these.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawActionItem {
    Object {
        #[serde(alias = "description", alias = "action")]
        task: String,
        #[serde(default, alias = "owner")]
        assignee: Option<serde_json::Value>,
        #[serde(default, alias = "due", alias = "dueDate", alias = "due_date")]
        deadline: Option<serde_json::Value>,
    },
    Text(String),
}

impl RawActionItem {
    fn into_action_item(self) -> Option<ActionItem> {
        match self {
            Self::Object {
                task,
                assignee,
                deadline,
            } => {
                let task = task.trim().to_string();
                (!task.is_empty()).then(|| ActionItem {
                    task,
                    assignee: assignee.and_then(non_null_text),
                    deadline: deadline.and_then(non_null_text),
                })
            }
            Self::Text(task) => {
                let task = task.trim();
                (!task.is_empty()).then(|| ActionItem::unassigned(task))
            }
        }
    }
}

fn non_null_text(value: serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_structured(raw: &str) -> Option<SummaryBody> {
    let cleaned = strip_code_fences(raw);
    let json = extract_json(cleaned)?;
    let payload: StructuredPayload = serde_json::from_str(json).ok()?;

    let summary = payload.summary.trim().to_string();
    if summary.is_empty() {
        return None;
    }

    Some(SummaryBody::Structured {
        summary,
        key_points: payload
            .key_points
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        action_items: payload
            .action_items
            .into_iter()
            .filter_map(RawActionItem::into_action_item)
            .collect(),
    })
}

/// Removes a surrounding ```/```json fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Locates the first balanced JSON object in `text`, skipping braces that
/// appear inside string literals.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
