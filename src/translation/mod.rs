/*!
 * Subtitle translation pipeline.
 *
 * The pipeline turns a subtitle request into a file on disk. It is split into
 * several submodules:
 *
 * - `batch`: Batch orchestration against a translation backend
 * - `retry`: Retry policy with capped exponential backoff
 * - `registry`: Job registry and deduplication guard
 * - `cache_state`: Placeholder and completed file states
 * - `pipeline`: Request handling that ties the pieces together
 */

// Re-export main types for easier usage
pub use self::batch::BatchTranslator;
pub use self::cache_state::{CacheDecision, CacheState, PlaceholderMarker};
pub use self::pipeline::{
    BackendFactory, CacheReport, JobHandle, PipelineOutcome, ResponseStatus, SubtitlePipeline,
    SubtitleRequest, SubtitleResponse,
};
pub use self::registry::{InMemoryJobRegistry, Job, JobGuard, JobKey, JobRegistry};
pub use self::retry::RetryPolicy;

// Submodules
pub mod batch;
pub mod cache_state;
pub mod pipeline;
pub mod registry;
pub mod retry;
