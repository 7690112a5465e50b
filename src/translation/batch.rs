/*!
 * Batch translation processing.
 *
 * This module walks a subtitle document in order, sends its texts to the
 * backend in fixed-size batches, validates every reply and reassembles a
 * translated document. Batches run one after another; only the failing batch
 * is retried.
 */

use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

use crate::errors::TranslationError;
use crate::providers::TranslationBackend;
use crate::subtitle_processor::SubtitleDocument;

use super::retry::RetryPolicy;

/// Batch translator for processing subtitle documents in batches
#[derive(Debug, Clone)]
pub struct BatchTranslator {
    /// The backend to translate with
    backend: Arc<dyn TranslationBackend>,

    /// Texts per backend call
    batch_size: usize,

    /// Retry policy applied to each batch
    retry: RetryPolicy,
}

impl BatchTranslator {
    /// Create a new batch translator
    pub fn new(backend: Arc<dyn TranslationBackend>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            backend,
            batch_size,
            retry,
        }
    }

    /// Translate every block of `document` into `target_language`.
    ///
    /// Counter and timing lines are copied unchanged. A batch that keeps failing
    /// fails the whole document; translations of earlier batches are discarded.
    pub async fn translate(
        &self,
        document: &SubtitleDocument,
        target_language: &str,
    ) -> Result<SubtitleDocument, TranslationError> {
        if self.batch_size == 0 {
            return Err(TranslationError::Config("Batch size must be greater than zero".to_string()));
        }

        let texts = document.texts();
        let total_batches = texts.len().div_ceil(self.batch_size);
        let start_time = Instant::now();
        info!(
            "Translating {} blocks to {} with {} in {} batch(es)",
            texts.len(),
            target_language,
            self.backend.name(),
            total_batches
        );

        let mut translated = Vec::with_capacity(texts.len());
        for (batch_index, chunk) in texts.chunks(self.batch_size).enumerate() {
            let output = self
                .translate_chunk(chunk, target_language, batch_index + 1, total_batches)
                .await?;
            translated.extend(output);
        }

        info!("Translation completed in {:?}", start_time.elapsed());
        document.with_texts(translated)
    }

    // Sends one batch, retrying it until the reply has the right length
    async fn translate_chunk(
        &self,
        chunk: &[String],
        target_language: &str,
        batch_number: usize,
        total_batches: usize,
    ) -> Result<Vec<String>, TranslationError> {
        let label = format!("Batch {}/{}", batch_number, total_batches);
        let backend = &self.backend;

        self.retry
            .run(&label, |attempt| async move {
                debug!("Sending batch {}/{} (attempt {})", batch_number, total_batches, attempt);
                let output = backend.translate_batch(chunk, target_language).await?;
                if output.len() != chunk.len() {
                    return Err(TranslationError::CountMismatch {
                        expected: chunk.len(),
                        actual: output.len(),
                    });
                }
                Ok(output)
            })
            .await
    }
}

/// Translate a document with the default retry policy
pub async fn translate(
    document: &SubtitleDocument,
    target_language: &str,
    backend: Arc<dyn TranslationBackend>,
    batch_size: usize,
) -> Result<SubtitleDocument, TranslationError> {
    BatchTranslator::new(backend, batch_size, RetryPolicy::default())
        .translate(document, target_language)
        .await
}
