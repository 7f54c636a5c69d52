use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::string_or_number;
use super::text::clean_field_text;

/// One respondent's submission as listed by the survey platform.
///
/// Skipped questions are absent. Listing metadata the pipeline does not use
/// is kept in `extra` so the stored copy matches what was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub collector_id: Option<String>,
    #[serde(default)]
    pub pages: Vec<ResponsePage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub questions: Vec<AnsweredQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub answers: Vec<AnswerFragment>,
}

impl RawResponse {
    pub fn questions(&self) -> impl Iterator<Item = &AnsweredQuestion> {
        self.pages.iter().flat_map(|page| page.questions.iter())
    }

    pub fn question_ids(&self) -> impl Iterator<Item = &str> {
        self.questions().map(|question| question.id.as_str())
    }

    /// Text of the first answer to the last answered question.
    pub fn last_answer_text(&self) -> Option<&str> {
        self.questions()
            .last()
            .and_then(|question| question.answers.first())
            .and_then(AnswerFragment::text)
    }
}

/// A single given answer, classified by the keys it carries.
///
/// `Unrecognized` keeps any other shape verbatim so it can be reported as
/// schema drift instead of being coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerFragment {
    Choice {
        choice_id: String,
        row_id: Option<String>,
    },
    Other {
        other_id: String,
        text: String,
    },
    Row {
        row_id: String,
        text: String,
    },
    Text {
        text: String,
        tag_data: Option<Value>,
    },
    Unrecognized(Value),
}

impl AnswerFragment {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Other { text, .. } | Self::Row { text, .. } | Self::Text { text, .. } => {
                Some(text)
            }
            Self::Choice { .. } | Self::Unrecognized(_) => None,
        }
    }

    /// Same fragment with any free text passed through [`clean_field_text`].
    pub fn with_clean_text(self) -> Self {
        match self {
            Self::Other { other_id, text } => Self::Other {
                other_id,
                text: clean_field_text(&text),
            },
            Self::Row { row_id, text } => Self::Row {
                row_id,
                text: clean_field_text(&text),
            },
            Self::Text { text, tag_data } => Self::Text {
                text: clean_field_text(&text),
                tag_data,
            },
            Self::Unrecognized(Value::Object(mut fields)) => {
                if let Some(Value::String(text)) = fields.get_mut("text") {
                    *text = clean_field_text(text);
                }
                Self::Unrecognized(Value::Object(fields))
            }
            other => other,
        }
    }
}

fn identifier(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn text(fields: &Map<String, Value>) -> Option<String> {
    fields.get("text").and_then(Value::as_str).map(str::to_string)
}

impl From<Value> for AnswerFragment {
    fn from(value: Value) -> Self {
        let Value::Object(fields) = &value else {
            return Self::Unrecognized(value);
        };

        if let (Some(other_id), Some(text)) = (identifier(fields, "other_id"), text(fields)) {
            return Self::Other { other_id, text };
        }
        if let Some(choice_id) = identifier(fields, "choice_id") {
            return Self::Choice {
                choice_id,
                row_id: identifier(fields, "row_id"),
            };
        }
        if let (Some(row_id), Some(text)) = (identifier(fields, "row_id"), text(fields)) {
            return Self::Row { row_id, text };
        }
        if fields.keys().all(|key| key == "text" || key == "tag_data") {
            if let Some(text) = text(fields) {
                return Self::Text {
                    text,
                    tag_data: fields.get("tag_data").cloned(),
                };
            }
        }
        Self::Unrecognized(value)
    }
}

impl From<AnswerFragment> for Value {
    fn from(fragment: AnswerFragment) -> Self {
        let mut fields = Map::new();
        match fragment {
            AnswerFragment::Choice { choice_id, row_id } => {
                fields.insert("choice_id".into(), Value::String(choice_id));
                if let Some(row_id) = row_id {
                    fields.insert("row_id".into(), Value::String(row_id));
                }
            }
            AnswerFragment::Other { other_id, text } => {
                fields.insert("other_id".into(), Value::String(other_id));
                fields.insert("text".into(), Value::String(text));
            }
            AnswerFragment::Row { row_id, text } => {
                fields.insert("row_id".into(), Value::String(row_id));
                fields.insert("text".into(), Value::String(text));
            }
            AnswerFragment::Text { text, tag_data } => {
                if let Some(tag_data) = tag_data {
                    fields.insert("tag_data".into(), tag_data);
                }
                fields.insert("text".into(), Value::String(text));
            }
            AnswerFragment::Unrecognized(value) => return value,
        }
        Value::Object(fields)
    }
}

impl Serialize for AnswerFragment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnswerFragment {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_fragment_shapes() {
        let fragment = |value: Value| AnswerFragment::from(value);

        assert_eq!(
            fragment(json!({"choice_id": "1149785640"})),
            AnswerFragment::Choice { choice_id: "1149785640".into(), row_id: None }
        );
        assert_eq!(
            fragment(json!({"other_id": "1149785635", "text": "Online"})),
            AnswerFragment::Other { other_id: "1149785635".into(), text: "Online".into() }
        );
        assert_eq!(
            fragment(json!({"row_id": "r1", "text": "01/02/1990"})),
            AnswerFragment::Row { row_id: "r1".into(), text: "01/02/1990".into() }
        );
        assert!(matches!(
            fragment(json!({"text": "me@example.com", "tag_data": []})),
            AnswerFragment::Text { .. }
        ));
        assert!(matches!(
            fragment(json!({"download_url": "https://files.test/1"})),
            AnswerFragment::Unrecognized(_)
        ));
    }

    #[test]
    fn serializes_back_to_platform_shape() {
        let raw = json!({"other_id": "9", "text": "Online"});
        let fragment: AnswerFragment = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&fragment).unwrap(), raw);

        let unknown = json!({"image": {"url": "x"}});
        let fragment: AnswerFragment = serde_json::from_value(unknown.clone()).unwrap();
        assert_eq!(serde_json::to_value(&fragment).unwrap(), unknown);
    }

    #[test]
    fn keeps_listing_metadata_and_finds_last_answer() {
        let response: RawResponse = serde_json::from_value(json!({
            "id": 42,
            "collector_id": "c-1",
            "date_modified": "2024-03-01T10:00:00+00:00",
            "pages": [
                {"id": "p1", "questions": [{"id": "Q1", "answers": [{"choice_id": "A"}]}]},
                {"id": "p2", "questions": [{"id": "E1", "answers": [{"text": " me@example.com "}]}]}
            ]
        }))
        .expect("response decodes");

        assert_eq!(response.id, "42");
        assert_eq!(response.extra["date_modified"], json!("2024-03-01T10:00:00+00:00"));
        assert_eq!(response.question_ids().collect::<Vec<_>>(), vec!["Q1", "E1"]);
        assert_eq!(response.last_answer_text(), Some(" me@example.com "));
    }

    #[test]
    fn cleans_free_text_only() {
        let cleaned = AnswerFragment::Text {
            text: "<p>Hello&nbsp;there</p>".into(),
            tag_data: None,
        }
        .with_clean_text();
        assert_eq!(cleaned.text(), Some("Hello there"));

        let choice = AnswerFragment::Choice { choice_id: "A".into(), row_id: None };
        assert_eq!(choice.clone().with_clean_text(), choice);
    }
}
