//! OCR necessity decision and layout reconstruction.
//!
//! - `quality` / `trigger`: decide which pages need recognition
//! - `backend` / `azure`: submit them as one batch to the recognition service
//! - `reconcile`: map results back onto original page indices
//! - `layout` / `handwriting`: turn recognized fragments into page text and
//!   a handwritten-content ratio

mod api_backend;
mod azure;
mod backend;
mod handwriting;
mod layout;
mod quality;
mod rate_limit;
mod reconcile;
mod trigger;

pub use api_backend::encode_document_base64;
pub use azure::{parse_operation, AzureReadBackend};
pub use backend::{
    BackendFactory, RawRecognition, RecognitionBackend, RecognitionClient, RecognitionError,
    RecognitionOutcome,
};
pub use handwriting::handwritten_ratio;
pub use layout::{LayoutGridBuilder, LayoutParams};
pub use quality::{line_count, QualityAssessor};
pub use rate_limit::{backoff_delay, parse_retry_after, RetryPolicy};
pub use reconcile::{reconcile, PageRecognition, Reconciliation};
pub use trigger::TriggerPolicy;
