use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use super::mapping::{
    AnswerOption, QuestionType, ServiceKeyed, TranslationMap, TranslationMapEntry,
};
use super::response::{AnswerFragment, RawResponse};
use super::schema::QuestionFamily;
use super::text::clean_field_text;

/// A raw response re-expressed against the translation map, one record per
/// mapped question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedResponse {
    pub response_id: String,
    pub collector_id: Option<String>,
    pub questions: Vec<TranslatedQuestion>,
}

impl TranslatedResponse {
    pub fn skills_matcher(&self) -> impl Iterator<Item = &TranslatedQuestion> {
        self.questions
            .iter()
            .filter(|question| question.question_type == QuestionType::SkillsMatcher)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedQuestion {
    pub question_id: ServiceKeyed<String>,
    pub page_number: u32,
    pub question_number: ServiceKeyed<u32>,
    pub question_family: QuestionFamily,
    pub question_text: ServiceKeyed<String>,
    pub question_type: QuestionType,
    /// `None` only for a skipped background question.
    pub answers: Option<Vec<TranslatedAnswer>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_filled: bool,
}

impl TranslatedQuestion {
    fn from_entry(entry: &TranslationMapEntry, answers: Option<Vec<TranslatedAnswer>>) -> Self {
        Self {
            question_id: entry.question_id.clone(),
            page_number: entry.page_number,
            question_number: entry.question_number.clone(),
            question_family: entry.question_family.clone(),
            question_text: entry.question_text.clone(),
            question_type: entry.question_type,
            answers,
            auto_filled: false,
        }
    }

    pub fn first_option(&self) -> Option<&AnswerOption> {
        match self.answers.as_deref()?.first()? {
            TranslatedAnswer::Option(option) => Some(option),
            TranslatedAnswer::Fragment(_) => None,
        }
    }
}

/// Either a resolved map option or a fragment passed through as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslatedAnswer {
    Option(AnswerOption),
    Fragment(AnswerFragment),
}

/// Translates `response` against `map`, auto-filling skipped questions.
///
/// Background questions come first, then skills-matcher questions, each in
/// map order.
pub fn translate(response: &RawResponse, map: &TranslationMap) -> TranslatedResponse {
    let given: HashMap<&str, &[AnswerFragment]> = response
        .questions()
        .map(|question| (question.id.as_str(), question.answers.as_slice()))
        .collect();

    let questions = map
        .entries()
        .map(|entry| match given.get(entry.question_id.sm.as_str()) {
            None => auto_fill(entry),
            Some(fragments) if entry.answers.is_empty() => TranslatedQuestion::from_entry(
                entry,
                Some(
                    fragments
                        .iter()
                        .cloned()
                        .map(|fragment| TranslatedAnswer::Fragment(fragment.with_clean_text()))
                        .collect(),
                ),
            ),
            Some(fragments) => TranslatedQuestion::from_entry(
                entry,
                Some(
                    fragments
                        .iter()
                        .map(|fragment| resolve(&response.id, entry, fragment))
                        .collect(),
                ),
            ),
        })
        .collect();

    TranslatedResponse {
        response_id: response.id.clone(),
        collector_id: response.collector_id.clone(),
        questions,
    }
}

/// Skipped skills default to the lowest anchor; skipped background
/// questions have no sensible default.
fn auto_fill(entry: &TranslationMapEntry) -> TranslatedQuestion {
    let answers = match entry.question_type {
        QuestionType::SkillsMatcher => Some(
            entry
                .answers
                .first()
                .cloned()
                .map(TranslatedAnswer::Option)
                .into_iter()
                .collect(),
        ),
        QuestionType::NonSkillsMatcher => None,
    };
    TranslatedQuestion {
        auto_filled: true,
        ..TranslatedQuestion::from_entry(entry, answers)
    }
}

fn resolve(
    response_id: &str,
    entry: &TranslationMapEntry,
    fragment: &AnswerFragment,
) -> TranslatedAnswer {
    match fragment {
        AnswerFragment::Choice { choice_id, .. } => {
            match entry.answers.iter().find(|option| &option.id.sm == choice_id) {
                Some(option) => TranslatedAnswer::Option(option.clone()),
                None => {
                    warn!(
                        response_id,
                        question_id = %entry.question_id.sm,
                        choice_id = %choice_id,
                        "answer choice missing from translation map, survey may have changed"
                    );
                    TranslatedAnswer::Fragment(fragment.clone())
                }
            }
        }
        AnswerFragment::Other { other_id: id, text } | AnswerFragment::Row { row_id: id, text } => {
            TranslatedAnswer::Option(AnswerOption {
                id: ServiceKeyed::survey(id.clone()),
                text: ServiceKeyed::survey(clean_field_text(text)),
            })
        }
        AnswerFragment::Text { .. } | AnswerFragment::Unrecognized(_) => {
            warn!(
                response_id,
                question_id = %entry.question_id.sm,
                answer = ?fragment,
                "new kind of answer for a question with declared options, survey may have changed"
            );
            TranslatedAnswer::Fragment(fragment.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::skills_match::fixtures;
    use crate::workflows::skills_match::mapping::build_translation_map;
    use serde_json::json;

    fn map() -> TranslationMap {
        build_translation_map(&fixtures::survey_details(), &fixtures::skills_catalog())
            .expect("map builds")
    }

    fn question<'a>(translated: &'a TranslatedResponse, id: &str) -> &'a TranslatedQuestion {
        translated
            .questions
            .iter()
            .find(|question| question.question_id.sm == id)
            .expect("question translated")
    }

    #[test]
    fn emits_every_mapped_question_background_first() {
        let map = map();
        let translated = translate(&fixtures::raw_response("r-1"), &map);

        assert_eq!(translated.questions.len(), map.len());
        let order: Vec<_> = translated
            .questions
            .iter()
            .map(|question| question.question_id.sm.as_str())
            .collect();
        assert_eq!(order, vec!["Q1", "D1", "E1", "C1", "S1", "S2"]);
        assert_eq!(translated.response_id, "r-1");
        assert_eq!(translated.collector_id.as_deref(), Some("collector-1"));
    }

    #[test]
    fn resolves_choice_to_map_option() {
        let map = map();
        let translated = translate(&fixtures::raw_response("r-1"), &map);
        let q1 = question(&translated, "Q1");

        assert!(!q1.auto_filled);
        assert_eq!(q1.first_option().map(|option| option.id.sm.as_str()), Some("A"));
        let value = serde_json::to_value(q1).unwrap();
        assert!(value.get("auto_filled").is_none());

        let s2 = question(&translated, "S2");
        assert_eq!(s2.first_option().and_then(|option| option.id.cos.as_deref()), Some("51"));
    }

    #[test]
    fn synthesizes_options_for_free_text_fragments() {
        let mut response = fixtures::raw_response("r-1");
        let other = json!({"other_id": "Q1-other", "text": "<b>Radio</b>"});
        response.pages[0].questions[0].answers = vec![serde_json::from_value(other).unwrap()];

        let translated = translate(&response, &map());
        let q1 = question(&translated, "Q1");
        assert_eq!(
            q1.answers,
            Some(vec![TranslatedAnswer::Option(AnswerOption {
                id: ServiceKeyed::survey("Q1-other".to_string()),
                text: ServiceKeyed::survey("Radio".to_string()),
            })])
        );

        let d1 = question(&translated, "D1");
        assert_eq!(
            d1.first_option().map(|option| option.text.sm.as_str()),
            Some("01/02/1990")
        );
    }

    #[test]
    fn passes_open_text_through_cleaned() {
        let translated = translate(&fixtures::raw_response("r-1"), &map());
        let c1 = question(&translated, "C1");

        assert_eq!(
            serde_json::to_value(&c1.answers).unwrap(),
            json!([{"text": "person@example.com"}])
        );
    }

    #[test]
    fn auto_fills_skipped_questions() {
        let mut response = fixtures::raw_response("r-1");
        response.pages[1].questions.retain(|question| question.id != "S1");
        response.pages[0].questions.retain(|question| question.id != "Q1");

        let map = map();
        let translated = translate(&response, &map);

        let s1 = question(&translated, "S1");
        assert!(s1.auto_filled);
        let expected = map.get("S1").expect("S1 mapped").answers[0].clone();
        assert_eq!(s1.answers, Some(vec![TranslatedAnswer::Option(expected)]));
        assert_eq!(s1.first_option().and_then(|option| option.id.cos.as_deref()), Some("10"));

        let q1 = question(&translated, "Q1");
        assert!(q1.auto_filled);
        assert_eq!(q1.answers, None);
        assert_eq!(serde_json::to_value(q1).unwrap()["auto_filled"], json!(true));
    }

    #[test]
    fn passes_through_unknown_shapes() {
        let mut response = fixtures::raw_response("r-1");
        response.pages[0].questions[0].answers = vec![
            serde_json::from_value(json!({"choice_id": "Z"})).unwrap(),
            serde_json::from_value(json!({"image": "x.png"})).unwrap(),
        ];

        let translated = translate(&response, &map());
        let answers = question(&translated, "Q1").answers.clone().expect("answers kept");
        assert_eq!(answers.len(), 2);
        assert!(answers
            .iter()
            .all(|answer| matches!(answer, TranslatedAnswer::Fragment(_))));
    }

    #[test]
    fn translation_is_deterministic() {
        let map = map();
        let response = fixtures::raw_response("r-1");
        assert_eq!(translate(&response, &map), translate(&response, &map));
    }
}
