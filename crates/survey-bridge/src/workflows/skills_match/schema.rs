//! Wire shapes of the two externally owned question schemas.
//!
//! Only the fields the translation map needs are modelled; everything else the
//! services return is ignored on decode and preserved verbatim in the cache.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Survey platform `/details` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurveyDetails {
    #[serde(default)]
    pub pages: Vec<SurveyPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyPage {
    pub position: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<SurveyQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyQuestion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub family: QuestionFamily,
    #[serde(default)]
    pub headings: Vec<QuestionHeading>,
    #[serde(default)]
    pub answers: Option<DeclaredAnswers>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionHeading {
    #[serde(default)]
    pub heading: String,
}

/// Options a question declares: plain choices, an optional free-text "other"
/// entry, and rows (used by datetime questions).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclaredAnswers {
    #[serde(default)]
    pub choices: Vec<DeclaredOption>,
    #[serde(default)]
    pub other: Option<DeclaredOption>,
    #[serde(default)]
    pub rows: Vec<DeclaredOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredOption {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub text: String,
}

/// Answer-shape category of a survey question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionFamily {
    SingleChoice,
    MultipleChoice,
    Datetime,
    OpenEnded,
    Other(String),
}

impl QuestionFamily {
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultipleChoice)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultipleChoice => "multiple_choice",
            Self::Datetime => "datetime",
            Self::OpenEnded => "open_ended",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for QuestionFamily {
    fn from(value: String) -> Self {
        match value.as_str() {
            "single_choice" => Self::SingleChoice,
            "multiple_choice" => Self::MultipleChoice,
            "datetime" => Self::Datetime,
            "open_ended" => Self::OpenEnded,
            _ => Self::Other(value),
        }
    }
}

impl From<QuestionFamily> for String {
    fn from(value: QuestionFamily) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for QuestionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Skills-matcher schema: a flat, ordered skill list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillsCatalog {
    #[serde(rename = "Skills", default)]
    pub skills: Vec<SkillDefinition>,
}

/// One skill with its five ordinal proficiency anchors, lowest first.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillDefinition {
    #[serde(rename = "ElementId", deserialize_with = "string_or_number")]
    pub element_id: String,
    #[serde(rename = "Question", default)]
    pub question: String,
    #[serde(rename = "DataPoint20", deserialize_with = "string_or_number")]
    pub data_point_20: String,
    #[serde(rename = "DataPoint35", deserialize_with = "string_or_number")]
    pub data_point_35: String,
    #[serde(rename = "DataPoint50", deserialize_with = "string_or_number")]
    pub data_point_50: String,
    #[serde(rename = "DataPoint65", deserialize_with = "string_or_number")]
    pub data_point_65: String,
    #[serde(rename = "DataPoint80", deserialize_with = "string_or_number")]
    pub data_point_80: String,
    #[serde(rename = "AnchorFirst", default)]
    pub anchor_first: String,
    #[serde(rename = "AnchorSecond", default)]
    pub anchor_second: String,
    // The live service spells this field "AnchorThrid".
    #[serde(rename = "AnchorThrid", alias = "AnchorThird", default)]
    pub anchor_third: String,
    #[serde(rename = "AnchorFourth", default)]
    pub anchor_fourth: String,
    #[serde(rename = "AnchorLast", default)]
    pub anchor_last: String,
}

/// Number of ordinal anchors every skill carries.
pub const SKILL_ANCHOR_COUNT: usize = 5;

impl SkillDefinition {
    /// `(answer id, anchor text)` pairs from lowest to highest proficiency.
    pub fn anchors(&self) -> [(&str, &str); SKILL_ANCHOR_COUNT] {
        [
            (self.data_point_20.as_str(), self.anchor_first.as_str()),
            (self.data_point_35.as_str(), self.anchor_second.as_str()),
            (self.data_point_50.as_str(), self.anchor_third.as_str()),
            (self.data_point_65.as_str(), self.anchor_fourth.as_str()),
            (self.data_point_80.as_str(), self.anchor_last.as_str()),
        ]
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(value),
        serde_json::Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn family_round_trips_known_and_unknown_values() {
        let family: QuestionFamily = serde_json::from_value(json!("single_choice")).unwrap();
        assert_eq!(family, QuestionFamily::SingleChoice);
        assert!(family.is_choice());

        let family: QuestionFamily = serde_json::from_value(json!("matrix")).unwrap();
        assert_eq!(family, QuestionFamily::Other("matrix".to_string()));
        assert_eq!(serde_json::to_value(&family).unwrap(), json!("matrix"));

        for raw in ["open_ended", "open_text", "Single_Choice"] {
            let family: QuestionFamily = serde_json::from_value(json!(raw)).unwrap();
            assert_eq!(serde_json::to_value(&family).unwrap(), json!(raw));
        }
        let family: QuestionFamily = serde_json::from_value(json!("open_text")).unwrap();
        assert!(!family.is_choice());
    }

    #[test]
    fn skill_anchors_accept_numeric_ids_and_misspelled_field() {
        let skill: SkillDefinition = serde_json::from_value(json!({
            "ElementId": "2.A.1.a",
            "Question": "Reading Comprehension",
            "DataPoint20": 10, "DataPoint35": 20, "DataPoint50": 30,
            "DataPoint65": 40, "DataPoint80": 50,
            "AnchorFirst": "Read a memo", "AnchorSecond": "Read a policy",
            "AnchorThrid": "Read a contract", "AnchorFourth": "Read a brief",
            "AnchorLast": "Read a thesis"
        }))
        .expect("skill decodes");

        let anchors = skill.anchors();
        assert_eq!(anchors[0], ("10", "Read a memo"));
        assert_eq!(anchors[2], ("30", "Read a contract"));
        assert_eq!(anchors[4], ("50", "Read a thesis"));
    }
}
