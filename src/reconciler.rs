// ⚖️ Intent Reconciler
// Merges the classifier's reading of a message with the deterministic
// temporal extraction of the same text.
//
// Policy, single pass:
//   1. classifier fails            → fallback task intent, extractor not consulted
//   2. normalize literal "null"s, validate vocabulary (failure → fallback)
//   3. extract date/time from the original text
//   4. only for action = inserir: fill the classifier's missing date/time
//   5. the classifier's own values are never overwritten

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classifier::{IntentClassifier, LlmClient};
use crate::clock::{Clock, SystemClock};
use crate::intent::StructuredIntent;
use crate::temporal::{TemporalCandidate, TemporalExtractor};

pub struct IntentReconciler<C: LlmClient> {
    classifier: IntentClassifier<C>,
    extractor: TemporalExtractor,
    clock: Arc<dyn Clock>,
}

impl<C: LlmClient> IntentReconciler<C> {
    /// Reconciler on the system clock with the "assume today" extractor
    pub fn new(classifier: IntentClassifier<C>) -> Self {
        IntentReconciler {
            classifier,
            extractor: TemporalExtractor::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn classifier(&self) -> &IntentClassifier<C> {
        &self.classifier
    }

    /// Interpret a message relative to the reconciler's clock
    pub async fn interpret(&self, message: &str) -> StructuredIntent {
        let now = self.clock.now();
        self.interpret_at(message, now).await
    }

    /// Interpret a message relative to an explicit "now"
    ///
    /// Never fails: every failure mode degrades to `StructuredIntent::fallback`.
    pub async fn interpret_at(&self, message: &str, now: NaiveDateTime) -> StructuredIntent {
        let request_id = Uuid::new_v4();
        let span = info_span!("interpret", %request_id);

        async move {
            info!(message_len = message.len(), "interpreting message");

            let raw = match self.classifier.classify_raw(message).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "classifier failed, using fallback intent");
                    return StructuredIntent::fallback(message);
                }
            };

            let intent = match raw.normalize_nulls().into_intent(message) {
                Ok(intent) => intent,
                Err(e) => {
                    warn!(error = %e, "classifier output rejected, using fallback intent");
                    return StructuredIntent::fallback(message);
                }
            };

            let candidate = self.extractor.extract(message, now);

            let intent = if intent.is_insert() {
                merge_temporal(intent, candidate)
            } else {
                debug!(action = intent.action.code(), "temporal merge skipped");
                intent
            };

            info!(
                tipo = intent.entity_type.code(),
                acao = intent.action.code(),
                data = ?intent.date,
                hora = ?intent.time,
                "message interpreted"
            );
            intent
        }
        .instrument(span)
        .await
    }
}

/// Fill absent date/time from the extractor; present values are kept
pub fn merge_temporal(mut intent: StructuredIntent, candidate: TemporalCandidate) -> StructuredIntent {
    if intent.date.is_none() {
        intent.date = candidate.date;
    }
    if intent.time.is_none() {
        intent.time = candidate.time;
    }
    intent
}

// ============================================================================
// TESTS
// ============================================================================
