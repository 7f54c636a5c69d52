//! Schema and response payloads shared by the unit tests in this workflow.

use serde_json::{json, Value};

use super::response::RawResponse;
use super::schema::{SkillsCatalog, SurveyDetails};

pub(crate) fn survey_details_json() -> Value {
    let skill_question = |id: &str, heading: &str| {
        json!({
            "id": id,
            "family": "single_choice",
            "headings": [{"heading": heading}],
            "answers": {
                "choices": (1..=5)
                    .map(|level| json!({"id": format!("{id}-{level}"), "text": format!("Level {level}")}))
                    .collect::<Vec<_>>()
            }
        })
    };

    json!({
        "pages": [
            {
                "position": 1,
                "title": "About you",
                "questions": [
                    {
                        "id": "Q1",
                        "family": "single_choice",
                        "headings": [{"heading": "<p>How did you hear&nbsp;about us?</p>"}],
                        "answers": {
                            "choices": [{"id": "A", "text": "Friend"}, {"id": "B", "text": "Flyer"}],
                            "other": {"id": "Q1-other", "text": "Other (please specify)"}
                        }
                    },
                    {
                        "id": "D1",
                        "family": "datetime",
                        "headings": [{"heading": "Date of birth"}],
                        "answers": {"rows": [{"id": "D1-row", "text": "MM/DD/YYYY"}]}
                    },
                    {
                        "id": "E1",
                        "family": "open_ended",
                        "headings": [{"heading": "Anything else?"}]
                    }
                ]
            },
            {
                "position": 2,
                "title": "CWC Skills Matcher",
                "questions": [
                    skill_question("S1", "Reading"),
                    skill_question("S2", "Listening")
                ]
            },
            {
                "position": 3,
                "title": "Contact",
                "questions": [
                    {
                        "id": "C1",
                        "family": "open_ended",
                        "headings": [{"heading": "Email address"}]
                    }
                ]
            }
        ]
    })
}

pub(crate) fn skills_catalog_json() -> Value {
    let skill = |element_id: &str, question: &str, offset: u32| {
        json!({
            "ElementId": element_id,
            "Question": question,
            "DataPoint20": 10 + offset,
            "DataPoint35": 20 + offset,
            "DataPoint50": 30 + offset,
            "DataPoint65": 40 + offset,
            "DataPoint80": 50 + offset,
            "AnchorFirst": "Level 1",
            "AnchorSecond": "Level 2",
            "AnchorThrid": "Level 3",
            "AnchorFourth": "Level 4",
            "AnchorLast": "Level 5"
        })
    };

    json!({
        "Skills": [
            skill("2.A.1.a", "Reading Comprehension", 0),
            skill("2.A.1.b", "Active\u{a0}Listening", 1)
        ]
    })
}

pub(crate) fn survey_details() -> SurveyDetails {
    serde_json::from_value(survey_details_json()).expect("survey fixture decodes")
}

pub(crate) fn skills_catalog() -> SkillsCatalog {
    serde_json::from_value(skills_catalog_json()).expect("skills fixture decodes")
}

/// A complete response: background answers, both skills, and an email.
pub(crate) fn raw_response(id: &str) -> RawResponse {
    serde_json::from_value(json!({
        "id": id,
        "collector_id": "collector-1",
        "pages": [
            {
                "id": "1",
                "questions": [
                    {"id": "Q1", "answers": [{"choice_id": "A"}]},
                    {"id": "D1", "answers": [{"row_id": "D1-row", "text": "01/02/1990"}]}
                ]
            },
            {
                "id": "2",
                "questions": [
                    {"id": "S1", "answers": [{"choice_id": "S1-3"}]},
                    {"id": "S2", "answers": [{"choice_id": "S2-5"}]}
                ]
            },
            {
                "id": "3",
                "questions": [
                    {"id": "C1", "answers": [{"text": "person@example.com"}]}
                ]
            }
        ]
    }))
    .expect("response fixture decodes")
}
