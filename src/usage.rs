//! Best-effort usage accounting for terminal transcription attempts
//!
//! Recording must never block or fail a successful transcription response:
//! persistence errors are logged and swallowed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::registry::ProviderRegistry;
use crate::storage::Storage;
use crate::types::{TranscriptionOutcome, UsageRecord, UsageStatus};

pub struct UsageRecorder {
    storage: Arc<Storage>,
    registry: Arc<ProviderRegistry>,
}

impl UsageRecorder {
    pub fn new(storage: Arc<Storage>, registry: Arc<ProviderRegistry>) -> Self {
        Self { storage, registry }
    }

    /// Append a completed usage record for a successful outcome
    pub fn record_success(&self, user_id: i64, outcome: &TranscriptionOutcome) {
        let record = UsageRecord {
            id: Uuid::new_v4(),
            user_id,
            provider: outcome.provider.clone(),
            language: outcome.language.clone(),
            duration_ms: outcome.duration_ms,
            text_length: outcome.text.len() as u32,
            confidence: outcome.confidence,
            cost: self.cost_for(&outcome.provider, outcome.duration_ms),
            status: UsageStatus::Completed,
            created_at: Utc::now(),
        };

        match self.storage.append_usage(&record) {
            Ok(()) => debug!(
                "Recorded usage for user {} provider {}",
                user_id, record.provider
            ),
            Err(e) => error!("Failed to record transcription usage: {e}"),
        }
    }

    /// Cost from the provider's per-minute pricing rule; None for free or
    /// unknown providers
    pub fn cost_for(&self, provider: &str, duration_ms: u64) -> Option<f64> {
        let adapter = self.registry.get(provider)?;
        let per_minute = adapter.descriptor().cost_per_minute?;
        let minutes = duration_ms as f64 / 60_000.0;
        Some(per_minute * minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn recorder() -> (UsageRecorder, Arc<Storage>) {
        let storage = Arc::new(Storage::in_memory().unwrap());
        let registry = Arc::new(ProviderRegistry::standard(&Settings::default()));
        (UsageRecorder::new(storage.clone(), registry), storage)
    }

    fn outcome(provider: &str) -> TranscriptionOutcome {
        TranscriptionOutcome {
            id: Uuid::new_v4(),
            text: "hello world".to_string(),
            language: "en".to_string(),
            confidence: 0.95,
            duration_ms: 120_000,
            provider: provider.to_string(),
            tokens: 0,
            completed_at: Utc::now(),
            used_fallback: false,
        }
    }

    #[test]
    fn test_priced_provider_cost() {
        let (recorder, _) = recorder();
        // two minutes at $0.006/min
        let cost = recorder.cost_for("OpenAIWhisper", 120_000).unwrap();
        assert!((cost - 0.012).abs() < 1e-9);
    }

    #[test]
    fn test_free_and_unknown_providers_unpriced() {
        let (recorder, _) = recorder();
        assert!(recorder.cost_for("GroqWhisper", 60_000).is_none());
        assert!(recorder.cost_for("WhisperCpp", 60_000).is_none());
        assert!(recorder.cost_for("NoSuchProvider", 60_000).is_none());
    }

    #[test]
    fn test_record_success_appends() {
        let (recorder, storage) = recorder();
        recorder.record_success(9, &outcome("OpenAIWhisper"));

        let records = storage.recent_usage(9, 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provider, "OpenAIWhisper");
        assert_eq!(records[0].status, UsageStatus::Completed);
        assert_eq!(records[0].text_length, 11);
        assert!(records[0].cost.is_some());
    }

    #[test]
    fn test_free_provider_record_has_no_cost() {
        let (recorder, storage) = recorder();
        recorder.record_success(9, &outcome("WhisperCpp"));

        let records = storage.recent_usage(9, 10).unwrap();
        assert!(records[0].cost.is_none());
    }
}
