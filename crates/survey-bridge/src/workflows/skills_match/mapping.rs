//! Translation map between the survey schema and the skills-matcher schema.
//!
//! The map is built from one pair of schema snapshots and never patched
//! afterwards: a drifted map is replaced wholesale by a freshly built one.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::error;

use super::fetcher::{SchemaError, SchemaFetcher, SchemaService};
use super::schema::{
    QuestionFamily, SkillsCatalog, SurveyDetails, SurveyQuestion, SKILL_ANCHOR_COUNT,
};
use super::text::clean_field_text;

const SKILLS_MATCHER_MARKER: &str = "skills matcher";

/// A value known under the survey platform and, once merged, the skills service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceKeyed<T> {
    pub sm: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cos: Option<T>,
}

impl<T> ServiceKeyed<T> {
    pub fn survey(sm: T) -> Self {
        Self { sm, cos: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "skills-matcher")]
    SkillsMatcher,
    #[serde(rename = "non-skills-matcher")]
    NonSkillsMatcher,
}

impl QuestionType {
    fn for_page_title(title: &str) -> Self {
        if title.to_lowercase().contains(SKILLS_MATCHER_MARKER) {
            Self::SkillsMatcher
        } else {
            Self::NonSkillsMatcher
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: ServiceKeyed<String>,
    pub text: ServiceKeyed<String>,
}

impl AnswerOption {
    pub(crate) fn survey(id: &str, text: &str) -> Self {
        Self {
            id: ServiceKeyed::survey(id.to_string()),
            text: ServiceKeyed::survey(clean_field_text(text)),
        }
    }
}

/// Canonical record for one logical question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationMapEntry {
    pub question_id: ServiceKeyed<String>,
    pub page_number: u32,
    pub question_number: ServiceKeyed<u32>,
    pub question_family: QuestionFamily,
    pub question_text: ServiceKeyed<String>,
    pub question_type: QuestionType,
    pub answers: Vec<AnswerOption>,
}

/// Entries keyed by survey question id, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionIndex {
    entries: Vec<TranslationMapEntry>,
    positions: HashMap<String, usize>,
}

impl QuestionIndex {
    fn from_entries(entries: Vec<TranslationMapEntry>) -> Self {
        let positions = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.question_id.sm.clone(), position))
            .collect();
        Self { entries, positions }
    }

    pub fn get(&self, question_id: &str) -> Option<&TranslationMapEntry> {
        self.positions
            .get(question_id)
            .map(|&position| &self.entries[position])
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.positions.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranslationMapEntry> {
        self.entries.iter()
    }
}

impl Serialize for QuestionIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.question_id.sm, entry)?;
        }
        map.end()
    }
}

/// Immutable snapshot consumed by every translation in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslationMap {
    #[serde(rename = "non-skills-matcher")]
    non_skills_matcher: QuestionIndex,
    #[serde(rename = "skills-matcher")]
    skills_matcher: QuestionIndex,
}

impl TranslationMap {
    pub fn skills_matcher(&self) -> &QuestionIndex {
        &self.skills_matcher
    }

    pub fn non_skills_matcher(&self) -> &QuestionIndex {
        &self.non_skills_matcher
    }

    /// Background questions first, then skills-matcher questions.
    pub fn entries(&self) -> impl Iterator<Item = &TranslationMapEntry> {
        self.non_skills_matcher.iter().chain(self.skills_matcher.iter())
    }

    pub fn get(&self, question_id: &str) -> Option<&TranslationMapEntry> {
        self.non_skills_matcher
            .get(question_id)
            .or_else(|| self.skills_matcher.get(question_id))
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.non_skills_matcher.contains(question_id) || self.skills_matcher.contains(question_id)
    }

    pub fn len(&self) -> usize {
        self.non_skills_matcher.len() + self.skills_matcher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Structural disagreement between the two schemas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaMismatch {
    #[error("{survey} skills-matcher questions in the survey but {skills} skills in the skills schema")]
    SkillCount { survey: usize, skills: usize },
    #[error(
        "survey question #{question_number} has {options} answer options, expected {expected}"
    )]
    AnchorCount {
        question_number: u32,
        options: usize,
        expected: usize,
    },
}

/// Builds the translation map from decoded schema snapshots.
pub fn build_translation_map(
    survey: &SurveyDetails,
    skills: &SkillsCatalog,
) -> Result<TranslationMap, SchemaError> {
    let mut non_skills_matcher = Vec::new();
    let mut skills_matcher = Vec::new();
    let mut seen = BTreeSet::new();
    let mut question_number = 1u32;

    for page in &survey.pages {
        let question_type = QuestionType::for_page_title(&page.title);
        for question in &page.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(SchemaError::Malformed {
                    service: SchemaService::Survey,
                    reason: format!("question id {} appears more than once", question.id),
                });
            }

            let entry = TranslationMapEntry {
                question_id: ServiceKeyed::survey(question.id.clone()),
                page_number: page.position,
                question_number: ServiceKeyed::survey(question_number),
                question_family: question.family.clone(),
                question_text: ServiceKeyed::survey(heading_text(question)?),
                question_type,
                answers: declared_answers(question)?,
            };

            match question_type {
                QuestionType::SkillsMatcher => skills_matcher.push(entry),
                QuestionType::NonSkillsMatcher => non_skills_matcher.push(entry),
            }
            question_number += 1;
        }
    }

    if skills_matcher.len() != skills.skills.len() {
        let mismatch = SchemaMismatch::SkillCount {
            survey: skills_matcher.len(),
            skills: skills.skills.len(),
        };
        error!(%mismatch, "cannot merge schemas");
        return Err(mismatch.into());
    }

    for (position, (entry, skill)) in skills_matcher.iter_mut().zip(&skills.skills).enumerate() {
        if entry.answers.len() != SKILL_ANCHOR_COUNT {
            let mismatch = SchemaMismatch::AnchorCount {
                question_number: entry.question_number.sm,
                options: entry.answers.len(),
                expected: SKILL_ANCHOR_COUNT,
            };
            error!(%mismatch, "cannot merge schemas");
            return Err(mismatch.into());
        }

        entry.question_id.cos = Some(skill.element_id.clone());
        entry.question_number.cos = Some(position as u32 + 1);
        entry.question_text.cos = Some(clean_field_text(&skill.question));

        for (answer, (anchor_id, anchor_text)) in entry.answers.iter_mut().zip(skill.anchors()) {
            answer.id.cos = Some(anchor_id.to_string());
            answer.text.cos = Some(clean_field_text(anchor_text));
        }
    }

    Ok(TranslationMap {
        non_skills_matcher: QuestionIndex::from_entries(non_skills_matcher),
        skills_matcher: QuestionIndex::from_entries(skills_matcher),
    })
}

fn heading_text(question: &SurveyQuestion) -> Result<String, SchemaError> {
    question
        .headings
        .first()
        .map(|heading| clean_field_text(&heading.heading))
        .ok_or_else(|| SchemaError::Malformed {
            service: SchemaService::Survey,
            reason: format!("question {} has no heading", question.id),
        })
}

fn declared_answers(question: &SurveyQuestion) -> Result<Vec<AnswerOption>, SchemaError> {
    let declared = question.answers.clone().unwrap_or_default();

    if question.family.is_choice() {
        let mut answers: Vec<AnswerOption> = declared
            .choices
            .iter()
            .map(|choice| AnswerOption::survey(&choice.id, &choice.text))
            .collect();
        if let Some(other) = &declared.other {
            answers.push(AnswerOption::survey(&other.id, &other.text));
        }
        return Ok(answers);
    }

    if question.family == QuestionFamily::Datetime {
        let row = declared.rows.first().ok_or_else(|| SchemaError::Malformed {
            service: SchemaService::Survey,
            reason: format!("datetime question {} declares no rows", question.id),
        })?;
        return Ok(vec![AnswerOption::survey(&row.id, &row.text)]);
    }

    Ok(Vec::new())
}

/// Anything able to produce a translation map on demand.
pub trait TranslationMapSource: Send + Sync {
    fn build_translation_map(&self, force_refresh: bool) -> Result<TranslationMap, SchemaError>;
}

/// Fetches both schemas and merges them.
pub struct SchemaCombiner {
    fetcher: SchemaFetcher,
}

impl SchemaCombiner {
    pub fn new(fetcher: SchemaFetcher) -> Self {
        Self { fetcher }
    }
}

impl fmt::Debug for SchemaCombiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCombiner").finish_non_exhaustive()
    }
}

impl TranslationMapSource for SchemaCombiner {
    fn build_translation_map(&self, force_refresh: bool) -> Result<TranslationMap, SchemaError> {
        let survey_raw = self.fetcher.fetch_schema(SchemaService::Survey, force_refresh)?;
        let skills_raw = self.fetcher.fetch_schema(SchemaService::Skills, force_refresh)?;

        let survey: SurveyDetails =
            serde_json::from_value(survey_raw).map_err(|source| SchemaError::Decode {
                service: SchemaService::Survey,
                source,
            })?;
        let skills: SkillsCatalog =
            serde_json::from_value(skills_raw).map_err(|source| SchemaError::Decode {
                service: SchemaService::Skills,
                source,
            })?;

        build_translation_map(&survey, &skills)
    }
}
