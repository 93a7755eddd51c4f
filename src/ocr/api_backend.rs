//! HTTP plumbing shared by cloud recognition backends.

use std::future::Future;

use base64::Engine;
use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use tracing::warn;

use super::backend::RecognitionError;
use super::rate_limit::RetryPolicy;

/// Encode a document as standard base64 for JSON request bodies.
pub fn encode_document_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Send a request, re-sending it while the service answers 429.
///
/// `make_request` is called once per attempt. The first response that is not
/// rate limited is returned as-is; running out of retries is
/// `RecognitionError::RateLimited`.
pub async fn send_with_retry<F, Fut>(
    policy: &RetryPolicy,
    backend_name: &str,
    make_request: F,
) -> Result<Response, RecognitionError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, RecognitionError>>,
{
    let mut attempt = 0;
    loop {
        let response = make_request().await?;
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok());
        let Some(wait) = policy.delay_for(attempt, retry_after) else {
            return Err(RecognitionError::RateLimited {
                retry_after_secs: retry_after.and_then(|s| s.trim().parse().ok()),
            });
        };
        warn!(
            "{} rate limited, retry {}/{} in {:?}",
            backend_name,
            attempt + 1,
            policy.max_retries,
            wait
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

/// Turn a non-success response into a service error, keeping the body as context.
pub async fn error_for_status(response: Response) -> Result<Response, RecognitionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RecognitionError::Service {
        status: status.as_u16(),
        message,
    })
}
