//! Tolerant parsing of vision-model replies
//!
//! The vision adapter returns free text that nominally contains a JSON
//! object. Two-phase strategy: strip code fences and parse strictly; on
//! failure, extract the first balanced JSON object from the text and retry.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("No JSON object found in analysis response")]
    NoJsonObject,

    #[error("Invalid JSON in analysis response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Analysis response missing required field: {0}")]
    MissingField(&'static str),
}

/// Structured analysis result persisted onto a synced media record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisData {
    pub description: String,
    pub topics: Vec<String>,
    pub mood: String,
    pub objects: Vec<String>,
    pub context: Option<String>,
}

/// Topics and objects may arrive as a proper array or as one delimited
/// string ("food, travel; sunset").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    List(Vec<String>),
    Single(String),
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    description: Option<String>,
    topics: Option<StringOrList>,
    mood: Option<String>,
    objects: Option<StringOrList>,
    context: Option<String>,
}

pub fn parse_analysis(raw: &str) -> Result<AnalysisData, ParseError> {
    let stripped = strip_code_fences(raw);
    let parsed: RawAnalysis = match serde_json::from_str(stripped) {
        Ok(parsed) => parsed,
        Err(_) => match extract_json_object(raw) {
            Some(candidate) => serde_json::from_str(candidate)?,
            None => return Err(ParseError::NoJsonObject),
        },
    };

    let description = parsed
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or(ParseError::MissingField("description"))?;
    let topics = normalize_list(parsed.topics);
    if topics.is_empty() {
        return Err(ParseError::MissingField("topics"));
    }
    let mood = parsed
        .mood
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .ok_or(ParseError::MissingField("mood"))?;

    Ok(AnalysisData {
        description,
        topics,
        mood,
        objects: normalize_list(parsed.objects),
        context: parsed
            .context
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    })
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// First balanced `{ ... }` block, tracking string literals and escapes so
/// braces inside values do not truncate the object.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Lowercase, trim, split delimited strings on `,`/`;`, drop empties and
/// duplicates while preserving first-seen order.
fn normalize_list(value: Option<StringOrList>) -> Vec<String> {
    let items: Vec<String> = match value {
        None => return Vec::new(),
        Some(StringOrList::List(list)) => list,
        Some(StringOrList::Single(s)) => s
            .split([',', ';'])
            .map(|part| part.to_string())
            .collect(),
    };

    let mut seen = Vec::new();
    for item in items {
        let normalized = item.trim().to_lowercase();
        if !normalized.is_empty() && !seen.contains(&normalized) {
            seen.push(normalized);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "description": "A team gathered around a conference table",
        "topics": ["teamwork", "office", "meeting"],
        "mood": "Focused",
        "objects": ["table", "laptop"],
        "context": "team meeting"
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let data = parse_analysis(VALID).unwrap();
        assert_eq!(data.description, "A team gathered around a conference table");
        assert_eq!(data.topics, vec!["teamwork", "office", "meeting"]);
        assert_eq!(data.mood, "focused");
        assert_eq!(data.context.as_deref(), Some("team meeting"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{VALID}\n```");
        assert!(parse_analysis(&fenced).is_ok());
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let wrapped = format!("Here is the analysis you asked for:\n{VALID}\nLet me know!");
        let data = parse_analysis(&wrapped).unwrap();
        assert_eq!(data.mood, "focused");
    }

    #[test]
    fn test_braces_inside_strings_do_not_truncate() {
        let tricky = r#"noise {"description": "a {weird} \"sign\"", "topics": ["signs"], "mood": "odd"} trailing"#;
        let data = parse_analysis(tricky).unwrap();
        assert_eq!(data.description, "a {weird} \"sign\"");
    }

    #[test]
    fn test_delimited_string_topics_are_split() {
        let raw = r#"{"description": "d", "topics": "Food, Travel; sunset,  food", "mood": "calm"}"#;
        let data = parse_analysis(raw).unwrap();
        assert_eq!(data.topics, vec!["food", "travel", "sunset"]);
    }

    #[test]
    fn test_missing_mood_is_an_error() {
        let raw = r#"{"description": "d", "topics": ["a"]}"#;
        assert!(matches!(
            parse_analysis(raw),
            Err(ParseError::MissingField("mood"))
        ));
    }

    #[test]
    fn test_missing_topics_is_an_error() {
        let raw = r#"{"description": "d", "mood": "calm", "topics": []}"#;
        assert!(matches!(
            parse_analysis(raw),
            Err(ParseError::MissingField("topics"))
        ));
    }

    #[test]
    fn test_no_json_at_all() {
        assert!(parse_analysis("I cannot analyze this image.").is_err());
    }

    #[test]
    fn test_objects_and_context_are_optional() {
        let raw = r#"{"description": "d", "topics": ["a"], "mood": "calm"}"#;
        let data = parse_analysis(raw).unwrap();
        assert!(data.objects.is_empty());
        assert!(data.context.is_none());
    }
}
