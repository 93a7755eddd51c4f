//! Recognition backend abstraction and the client adapter that owns it.
//!
//! The adapter builds its backend lazily on first use and shares it across
//! every document processed afterwards. A failed construction (typically
//! missing credentials) leaves the adapter uninitialized so a later call can
//! succeed once credentials appear.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::azure::AzureReadBackend;
use crate::config::ExtractConfig;
use crate::models::RecognizedPage;

/// Errors from recognition backends.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Recognition credentials not configured (endpoint and subscription key required)")]
    MissingCredentials,

    #[error("Recognition client not created and automatic creation is disabled")]
    ClientNotCreated,

    #[error("Recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RecognitionError {
    fn from(err: reqwest::Error) -> Self {
        RecognitionError::Transport(err.to_string())
    }
}

/// Raw output of one batch submission.
#[derive(Debug, Clone, Default)]
pub struct RawRecognition {
    /// Pages in the order the service returned them. `page_index` carries
    /// the service's own page numbering, converted to zero-based.
    pub pages: Vec<RecognizedPage>,
    /// Untouched service payload, kept for debug artifacts.
    pub raw: Option<serde_json::Value>,
}

/// Trait for recognition backends.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Submit one document in a single request.
    ///
    /// `pages` holds zero-based page indices; `None` submits the whole document.
    async fn recognize(
        &self,
        pdf: &[u8],
        pages: Option<&[usize]>,
    ) -> Result<RawRecognition, RecognitionError>;
}

/// What happened to the recognition step of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecognitionOutcome {
    /// No page needed recognition (or it was disabled).
    NotRequested,
    /// The batch returned; `recognized` may be lower than `submitted`.
    Completed { submitted: usize, recognized: usize },
    /// Recognition was needed but no client could be created.
    SkippedNoCredentials,
    /// The batch exceeded the configured timeout.
    TimedOut { after_ms: u64 },
    /// The batch failed for any other reason.
    Failed { message: String },
}

impl RecognitionOutcome {
    pub fn from_error(err: &RecognitionError) -> Self {
        match err {
            RecognitionError::MissingCredentials | RecognitionError::ClientNotCreated => {
                RecognitionOutcome::SkippedNoCredentials
            }
            RecognitionError::Timeout(after) => RecognitionOutcome::TimedOut {
                after_ms: after.as_millis() as u64,
            },
            other => RecognitionOutcome::Failed {
                message: other.to_string(),
            },
        }
    }

    /// Whether a submission was actually sent.
    pub fn was_attempted(&self) -> bool {
        matches!(
            self,
            RecognitionOutcome::Completed { .. }
                | RecognitionOutcome::TimedOut { .. }
                | RecognitionOutcome::Failed { .. }
        )
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RecognitionOutcome::Completed { .. })
    }
}

/// Builds a backend on first use.
pub type BackendFactory =
    Arc<dyn Fn() -> Result<Arc<dyn RecognitionBackend>, RecognitionError> + Send + Sync>;

/// Owns the lifecycle of the connection to the recognition service.
pub struct RecognitionClient {
    backend: OnceCell<Arc<dyn RecognitionBackend>>,
    factory: BackendFactory,
    timeout: Duration,
    auto_client: bool,
}

impl RecognitionClient {
    pub fn new(factory: BackendFactory, timeout: Duration) -> Self {
        Self {
            backend: OnceCell::new(),
            factory,
            timeout,
            auto_client: true,
        }
    }

    /// Adapter around an already constructed backend.
    pub fn with_backend(backend: Arc<dyn RecognitionBackend>, timeout: Duration) -> Self {
        let factory_backend = backend.clone();
        let factory: BackendFactory =
            Arc::new(move || Ok::<_, RecognitionError>(factory_backend.clone()));
        let client = Self::new(factory, timeout);
        // A fresh cell cannot already be set.
        let _ = client.backend.set(backend);
        client
    }

    /// Adapter that builds an Azure Read backend from `config` on first use.
    ///
    /// Credentials are resolved when the backend is built, not now, so
    /// environment variables set after construction are honoured.
    pub fn from_config(config: &ExtractConfig) -> Self {
        let timeout = config.timeout();
        let auto_client = config.auto_client;
        let config = config.clone();
        let factory: BackendFactory = Arc::new(
            move || -> Result<Arc<dyn RecognitionBackend>, RecognitionError> {
                let backend = AzureReadBackend::from_config(&config)?;
                Ok(Arc::new(backend))
            },
        );
        let mut client = Self::new(factory, timeout);
        client.auto_client = auto_client;
        client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.initialized()
    }

    /// Build the backend now instead of on first submission.
    ///
    /// Concurrent callers never construct twice. A failure leaves the adapter
    /// empty so the next caller tries again.
    pub async fn connect(&self) -> Result<Arc<dyn RecognitionBackend>, RecognitionError> {
        let backend = self
            .backend
            .get_or_try_init(|| async {
                let result = (self.factory)();
                if let Err(e) = &result {
                    warn!("Failed to create recognition client: {}", e);
                }
                result
            })
            .await?;
        Ok(backend.clone())
    }

    async fn backend(&self) -> Result<Arc<dyn RecognitionBackend>, RecognitionError> {
        if let Some(backend) = self.backend.get() {
            return Ok(backend.clone());
        }
        if !self.auto_client {
            return Err(RecognitionError::ClientNotCreated);
        }
        self.connect().await
    }

    /// Submit one batch, bounded by the configured timeout.
    pub async fn recognize(
        &self,
        pdf: &[u8],
        pages: Option<&[usize]>,
    ) -> Result<RawRecognition, RecognitionError> {
        let backend = self.backend().await?;
        debug!(
            "Submitting {} to {} ({} bytes)",
            pages.map_or_else(|| "whole document".to_string(), |p| format!("{} pages", p.len())),
            backend.name(),
            pdf.len()
        );
        tokio::time::timeout(self.timeout, backend.recognize(pdf, pages))
            .await
            .map_err(|_| RecognitionError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct EchoBackend {
        delay: Duration,
    }

    #[async_trait]
    impl RecognitionBackend for EchoBackend {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn recognize(
            &self,
            _pdf: &[u8],
            pages: Option<&[usize]>,
        ) -> Result<RawRecognition, RecognitionError> {
            tokio::time::sleep(self.delay).await;
            let pages = pages
                .unwrap_or(&[0])
                .iter()
                .map(|&i| RecognizedPage::new(i, Vec::new()))
                .collect();
            Ok(RawRecognition { pages, raw: None })
        }
    }

    fn counting_factory(builds: Arc<AtomicUsize>, ready: Arc<AtomicBool>) -> BackendFactory {
        Arc::new(move || {
            builds.fetch_add(1, Ordering::SeqCst);
            if ready.load(Ordering::SeqCst) {
                Ok(Arc::new(EchoBackend {
                    delay: Duration::ZERO,
                }) as Arc<dyn RecognitionBackend>)
            } else {
                Err(RecognitionError::MissingCredentials)
            }
        })
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let ready = Arc::new(AtomicBool::new(true));
        let client = Arc::new(RecognitionClient::new(
            counting_factory(builds.clone(), ready),
            Duration::from_secs(5),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.recognize(b"%PDF", Some(&[1])).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_construction_does_not_poison() {
        let builds = Arc::new(AtomicUsize::new(0));
        let ready = Arc::new(AtomicBool::new(false));
        let client =
            RecognitionClient::new(counting_factory(builds.clone(), ready.clone()), Duration::from_secs(5));

        let err = client.recognize(b"%PDF", None).await.unwrap_err();
        assert!(matches!(err, RecognitionError::MissingCredentials));
        assert!(!client.is_initialized());

        ready.store(true, Ordering::SeqCst);
        assert!(client.recognize(b"%PDF", None).await.is_ok());
        assert!(client.is_initialized());
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_aborts_submission() {
        let backend = Arc::new(EchoBackend {
            delay: Duration::from_secs(10),
        });
        let client = RecognitionClient::with_backend(backend, Duration::from_millis(50));
        let err = client.recognize(b"%PDF", Some(&[0])).await.unwrap_err();
        assert!(matches!(err, RecognitionError::Timeout(_)));
        assert_eq!(
            RecognitionOutcome::from_error(&err),
            RecognitionOutcome::TimedOut { after_ms: 50 }
        );
    }

    #[tokio::test]
    async fn test_auto_client_disabled_skips() {
        let config = ExtractConfig {
            endpoint: "https://example.invalid".to_string(),
            subscription_key: "key".to_string(),
            auto_client: false,
            ..ExtractConfig::default()
        };
        let client = RecognitionClient::from_config(&config);
        let err = client.recognize(b"%PDF", None).await.unwrap_err();
        assert!(matches!(err, RecognitionError::ClientNotCreated));
        assert_eq!(
            RecognitionOutcome::from_error(&err),
            RecognitionOutcome::SkippedNoCredentials
        );

        // An explicit connect still works.
        assert!(client.connect().await.is_ok());
        assert!(client.is_initialized());
    }

    #[test]
    fn test_outcome_attempted() {
        assert!(!RecognitionOutcome::NotRequested.was_attempted());
        assert!(!RecognitionOutcome::SkippedNoCredentials.was_attempted());
        assert!(RecognitionOutcome::Failed {
            message: "boom".into()
        }
        .was_attempted());
        let failed = RecognitionOutcome::from_error(&RecognitionError::Service {
            status: 500,
            message: "oops".into(),
        });
        assert!(matches!(failed, RecognitionOutcome::Failed { .. }));
    }
}
