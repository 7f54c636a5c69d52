use serde::{Deserialize, Serialize};

use super::translate::TranslatedResponse;

/// Scoring payload for the skills-matcher service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsRequest {
    #[serde(rename = "SKAValueList")]
    pub values: Vec<SkillValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillValue {
    #[serde(rename = "ElementId")]
    pub element_id: String,
    #[serde(rename = "DataValue")]
    pub data_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("skills-matcher question {question_id} has no answer mapped to the skills service")]
    MissingSkillAnswer { question_id: String },
}

/// One `ElementId`/`DataValue` pair per skills-matcher question, in
/// translated order.
///
/// Auto-fill guarantees every skill an answer, so a gap here means the
/// translation map itself was incomplete.
pub fn build_request(translated: &TranslatedResponse) -> Result<SkillsRequest, RequestError> {
    let values = translated
        .skills_matcher()
        .map(|question| {
            let missing = || RequestError::MissingSkillAnswer {
                question_id: question.question_id.sm.clone(),
            };
            let element_id = question.question_id.cos.clone().ok_or_else(missing)?;
            let data_value = question
                .first_option()
                .and_then(|option| option.id.cos.clone())
                .ok_or_else(missing)?;
            Ok(SkillValue {
                element_id,
                data_value,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SkillsRequest { values })
}
