/*!
 * Tests for batch orchestration and retry behaviour
 */

use std::sync::Arc;
use std::time::Duration;

use autosubs::providers::mock::MockBackend;
use autosubs::providers::TranslationBackend;
use autosubs::subtitle_processor::parse;
use autosubs::translation::{BatchTranslator, RetryPolicy};
use autosubs::{ProviderError, TranslationError};

const FIVE_BLOCKS: &str = "1\n00:00:01,000 --> 00:00:02,000\none\n\n2\n00:00:03,000 --> 00:00:04,000\ntwo\n\n3\n00:00:05,000 --> 00:00:06,000\nthree\n\n4\n00:00:07,000 --> 00:00:08,000\nfour\n\n5\n00:00:09,000 --> 00:00:10,000\nfive\n";

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(2))
}

fn translator(backend: &MockBackend, batch_size: usize, attempts: u32) -> BatchTranslator {
    let backend: Arc<dyn TranslationBackend> = Arc::new(backend.clone());
    BatchTranslator::new(backend, batch_size, fast_policy(attempts))
}

#[tokio::test]
async fn test_translate_withIntermittentBackend_shouldRetryOnlyFailingBatches() {
    let doc = parse(FIVE_BLOCKS).unwrap();
    let backend = MockBackend::intermittent(2).with_custom_response(crate::common::shout);

    let translated = translator(&backend, 2, 3).translate(&doc, "fr").await.unwrap();

    assert_eq!(translated.texts(), vec!["ONE", "TWO", "THREE", "FOUR", "FIVE"]);
    // three batches, two of which failed once
    assert_eq!(backend.request_count(), 5);
}

#[tokio::test]
async fn test_translate_withPersistentRateLimit_shouldGiveUpAfterMaxAttempts() {
    let doc = parse(FIVE_BLOCKS).unwrap();
    let backend = MockBackend::failing(ProviderError::RateLimitExceeded("429".to_string()));

    let err = translator(&backend, 10, 4).translate(&doc, "fr").await.unwrap_err();

    match err {
        TranslationError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*last, TranslationError::RateLimited(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(backend.request_count(), 4);
}

#[tokio::test]
async fn test_translate_withQuotaError_shouldStopImmediately() {
    let doc = parse(FIVE_BLOCKS).unwrap();
    let backend = MockBackend::failing(ProviderError::QuotaExceeded("quota".to_string()));

    let err = translator(&backend, 2, 5).translate(&doc, "fr").await.unwrap_err();

    assert!(matches!(err, TranslationError::Quota(_)));
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn test_translate_withSingleAttemptPolicy_shouldNotRetry() {
    let doc = parse(FIVE_BLOCKS).unwrap();
    let backend = MockBackend::wrong_count();

    let err = translator(&backend, 5, 1).translate(&doc, "fr").await.unwrap_err();

    assert!(matches!(err.root(), TranslationError::CountMismatch { expected: 5, actual: 4 }));
    assert_eq!(backend.request_count(), 1);
}

#[test]
fn test_delayForRetry_shouldDoubleUntilCap() {
    let policy = RetryPolicy::new(6, Duration::from_millis(1000), Duration::from_millis(10_000));

    assert_eq!(policy.delay_for_retry(1), Duration::from_millis(1000));
    assert_eq!(policy.delay_for_retry(2), Duration::from_millis(2000));
    assert_eq!(policy.delay_for_retry(3), Duration::from_millis(4000));
    assert_eq!(policy.delay_for_retry(4), Duration::from_millis(8000));
    assert_eq!(policy.delay_for_retry(5), Duration::from_millis(10_000));
    assert_eq!(policy.delay_for_retry(60), Duration::from_millis(10_000));
}
