use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::fetcher::SchemaError;
use super::mapping::{TranslationMap, TranslationMapSource};
use super::response::RawResponse;

/// Question ids present in the response that the map does not know about.
pub fn find_unexpected_ids(response: &RawResponse, map: &TranslationMap) -> BTreeSet<String> {
    response
        .question_ids()
        .filter(|id| !map.contains(id))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Consistent,
    Refreshed { refreshes: u32 },
    Unreconciled {
        unexpected: BTreeSet<String>,
        refreshes: u32,
    },
}

impl Reconciliation {
    pub fn is_translatable(&self) -> bool {
        !matches!(self, Self::Unreconciled { .. })
    }
}

/// Checks each response against the current map and rebuilds the map from
/// live schemas when the response carries ids the map cannot explain.
pub struct Reconciler {
    source: Arc<dyn TranslationMapSource>,
    max_refreshes: u32,
}

impl Reconciler {
    pub fn new(source: Arc<dyn TranslationMapSource>, max_refreshes: u32) -> Self {
        Self {
            source,
            max_refreshes,
        }
    }

    pub fn source(&self) -> &Arc<dyn TranslationMapSource> {
        &self.source
    }

    /// Replaces `map` with each rebuilt snapshot. A rebuild failure is returned
    /// as-is since it invalidates every remaining response in the batch.
    pub fn reconcile(
        &self,
        response: &RawResponse,
        map: &mut Arc<TranslationMap>,
    ) -> Result<Reconciliation, SchemaError> {
        let mut unexpected = find_unexpected_ids(response, map);
        if unexpected.is_empty() {
            return Ok(Reconciliation::Consistent);
        }

        let mut refreshes = 0;
        while !unexpected.is_empty() && refreshes < self.max_refreshes {
            refreshes += 1;
            warn!(
                response_id = %response.id,
                unexpected = ?unexpected,
                refresh = refreshes,
                "response has question ids missing from the translation map, refreshing schemas"
            );
            *map = Arc::new(self.source.build_translation_map(true)?);
            unexpected = find_unexpected_ids(response, map);
        }

        if unexpected.is_empty() {
            info!(response_id = %response.id, refreshes, "translation map refreshed");
            Ok(Reconciliation::Refreshed { refreshes })
        } else {
            warn!(
                response_id = %response.id,
                unexpected = ?unexpected,
                refreshes,
                "question ids still unexpected after refreshing schemas"
            );
            Ok(Reconciliation::Unreconciled {
                unexpected,
                refreshes,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::skills_match::fixtures;
    use crate::workflows::skills_match::mapping::build_translation_map;
    use crate::workflows::skills_match::response::{AnsweredQuestion, ResponsePage};
    use std::sync::Mutex;

    /// Serves the fixture map, optionally extended with a new question after
    /// a given number of refreshes.
    struct CountingSource {
        refreshes: Mutex<u32>,
        adds_question_after: Option<u32>,
    }

    impl CountingSource {
        fn new(adds_question_after: Option<u32>) -> Arc<Self> {
            Arc::new(Self {
                refreshes: Mutex::new(0),
                adds_question_after,
            })
        }

        fn refreshes(&self) -> u32 {
            *self.refreshes.lock().expect("refresh mutex poisoned")
        }
    }

    impl TranslationMapSource for CountingSource {
        fn build_translation_map(
            &self,
            force_refresh: bool,
        ) -> Result<TranslationMap, SchemaError> {
            let mut refreshes = self.refreshes.lock().expect("refresh mutex poisoned");
            if force_refresh {
                *refreshes += 1;
            }
            let mut survey = fixtures::survey_details();
            if self.adds_question_after.is_some_and(|after| *refreshes >= after) {
                let mut added = survey.pages[0].questions[2].clone();
                added.id = "N1".to_string();
                survey.pages[0].questions.push(added);
            }
            build_translation_map(&survey, &fixtures::skills_catalog())
        }
    }

    fn with_new_question(id: &str) -> RawResponse {
        let mut response = fixtures::raw_response("r-1");
        response.pages.push(ResponsePage {
            id: None,
            questions: vec![AnsweredQuestion {
                id: id.to_string(),
                answers: Vec::new(),
            }],
        });
        response
    }

    fn initial_map(source: &CountingSource) -> Arc<TranslationMap> {
        Arc::new(source.build_translation_map(false).expect("initial map"))
    }

    #[test]
    fn unexpected_ids_is_empty_for_known_questions() {
        let map = build_translation_map(&fixtures::survey_details(), &fixtures::skills_catalog())
            .expect("map builds");
        assert!(find_unexpected_ids(&fixtures::raw_response("r-1"), &map).is_empty());

        let unexpected = find_unexpected_ids(&with_new_question("N1"), &map);
        assert_eq!(unexpected, BTreeSet::from(["N1".to_string()]));
    }

    #[test]
    fn consistent_response_does_not_refresh() {
        let source = CountingSource::new(None);
        let mut map = initial_map(&source);
        let reconciler = Reconciler::new(source.clone(), 2);

        let outcome = reconciler
            .reconcile(&fixtures::raw_response("r-1"), &mut map)
            .expect("reconciles");
        assert_eq!(outcome, Reconciliation::Consistent);
        assert_eq!(source.refreshes(), 0);
    }

    #[test]
    fn refresh_that_explains_drift_replaces_the_map() {
        let source = CountingSource::new(Some(1));
        let mut map = initial_map(&source);
        let before = Arc::clone(&map);
        let reconciler = Reconciler::new(source.clone(), 2);

        let outcome = reconciler
            .reconcile(&with_new_question("N1"), &mut map)
            .expect("reconciles");

        assert_eq!(outcome, Reconciliation::Refreshed { refreshes: 1 });
        assert!(map.contains("N1"));
        assert!(!before.contains("N1"), "previous snapshot is untouched");
    }

    #[test]
    fn persistent_drift_is_unreconciled_after_bound() {
        let source = CountingSource::new(None);
        let mut map = initial_map(&source);
        let reconciler = Reconciler::new(source.clone(), 2);

        let outcome = reconciler
            .reconcile(&with_new_question("N9"), &mut map)
            .expect("reconciles");

        assert_eq!(
            outcome,
            Reconciliation::Unreconciled {
                unexpected: BTreeSet::from(["N9".to_string()]),
                refreshes: 2,
            }
        );
        assert!(!outcome.is_translatable());
        assert_eq!(source.refreshes(), 2);
    }
}
