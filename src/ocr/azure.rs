//! Azure Document Intelligence "prebuilt-read" backend.
//!
//! One analyze request per document: the PDF is posted as base64 JSON, then
//! the returned operation URL is polled until the service reports success
//! or failure. Every recognized line becomes one [`TextFragment`].
//!
//! Requires `AZURE_DOCINTEL_ENDPOINT` and `AZURE_DOCINTEL_SUBSCRIPTION_KEY`
//! (or the matching config fields).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::api_backend::{encode_document_base64, error_for_status, send_with_retry};
use super::rate_limit::RetryPolicy;
use super::backend::{RawRecognition, RecognitionBackend, RecognitionError};
use crate::config::{ExtractConfig, DEFAULT_API_VERSION};
use crate::models::{BoundingRegion, RecognizedPage, TextFragment};

const MODEL_ID: &str = "prebuilt-read";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "operation-location";

/// Azure Read backend using the Document Intelligence REST API.
pub struct AzureReadBackend {
    client: Client,
    endpoint: String,
    subscription_key: String,
    api_version: String,
    poll_interval: Duration,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    #[serde(rename = "base64Source")]
    base64_source: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: Option<String>,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<DocumentPage>,
    #[serde(default)]
    styles: Vec<DocumentStyle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentPage {
    page_number: usize,
    angle: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    #[serde(default)]
    lines: Vec<DocumentLine>,
    #[serde(default)]
    words: Vec<DocumentWord>,
}

#[derive(Debug, Deserialize)]
struct DocumentLine {
    content: String,
    #[serde(default)]
    polygon: Vec<f64>,
    #[serde(default)]
    spans: Vec<Span>,
}

#[derive(Debug, Deserialize)]
struct DocumentWord {
    confidence: f32,
    span: Span,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentStyle {
    is_handwritten: Option<bool>,
    confidence: f32,
    #[serde(default)]
    spans: Vec<Span>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Span {
    offset: usize,
    length: usize,
}

impl Span {
    fn end(&self) -> usize {
        self.offset + self.length
    }

    fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.end()
    }

    fn overlaps(&self, other: &Span) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

impl AzureReadBackend {
    /// Create a backend for the given endpoint and key.
    pub fn new(
        endpoint: impl Into<String>,
        subscription_key: impl Into<String>,
    ) -> Result<Self, RecognitionError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Url::parse(&endpoint)
            .map_err(|e| RecognitionError::Transport(format!("Invalid endpoint {}: {}", endpoint, e)))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                RecognitionError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;

        info!("Azure OCR client created: endpoint={}", endpoint);
        Ok(Self {
            client,
            endpoint,
            subscription_key: subscription_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a backend from config, falling back to environment credentials.
    pub fn from_config(config: &ExtractConfig) -> Result<Self, RecognitionError> {
        let (endpoint, key) = config
            .credentials()
            .ok_or(RecognitionError::MissingCredentials)?;
        Ok(Self::new(endpoint, key)?
            .with_api_version(config.api_version.clone())
            .with_poll_interval(config.poll_interval()))
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Analyze URL, with a 1-based page filter when only some pages are wanted.
    fn analyze_url(&self, pages: Option<&[usize]>) -> Result<Url, RecognitionError> {
        let base = format!(
            "{}/documentintelligence/documentModels/{}:analyze",
            self.endpoint, MODEL_ID
        );
        let mut params = vec![("api-version", self.api_version.clone())];
        if let Some(pages) = pages {
            let list = pages
                .iter()
                .map(|idx| (idx + 1).to_string())
                .collect::<Vec<_>>()
                .join(",");
            params.push(("pages", list));
        }
        Url::parse_with_params(&base, &params)
            .map_err(|e| RecognitionError::Transport(format!("Invalid analyze URL: {}", e)))
    }

    /// Post the document and return the operation URL to poll.
    async fn submit(&self, pdf: &[u8], pages: Option<&[usize]>) -> Result<String, RecognitionError> {
        let url = self.analyze_url(pages)?;
        let encoded = encode_document_base64(pdf);
        let body = AnalyzeRequest {
            base64_source: &encoded,
        };

        let (client, key, url, body) = (&self.client, self.subscription_key.as_str(), &url, &body);
        let response = send_with_retry(&self.retry, self.name(), || async move {
            Ok::<_, RecognitionError>(
                client
                    .post(url.clone())
                    .header(KEY_HEADER, key)
                    .json(body)
                    .send()
                    .await?,
            )
        })
        .await?;
        let response = error_for_status(response).await?;

        response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                RecognitionError::InvalidResponse("missing Operation-Location header".to_string())
            })
    }

    /// Poll until the operation finishes. The caller bounds total time.
    async fn poll(&self, location: &str) -> Result<serde_json::Value, RecognitionError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let (client, key) = (&self.client, self.subscription_key.as_str());
            let response = send_with_retry(&self.retry, self.name(), || async move {
                Ok::<_, RecognitionError>(
                    client
                        .get(location)
                        .header(KEY_HEADER, key)
                        .send()
                        .await?,
                )
            })
            .await?;
            let response = error_for_status(response).await?;
            let value: serde_json::Value = response.json().await?;

            let status = value
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or_default()
                .to_string();
            match status.as_str() {
                "succeeded" | "failed" | "canceled" => return Ok(value),
                other => debug!("Azure analyze operation status: {}", other),
            }
        }
    }
}

#[async_trait]
impl RecognitionBackend for AzureReadBackend {
    fn name(&self) -> &'static str {
        "azure-read"
    }

    async fn recognize(
        &self,
        pdf: &[u8],
        pages: Option<&[usize]>,
    ) -> Result<RawRecognition, RecognitionError> {
        let location = self.submit(pdf, pages).await?;
        debug!("Azure analyze accepted, polling {}", location);
        let raw = self.poll(&location).await?;
        let pages = parse_operation(&raw)?;
        Ok(RawRecognition {
            pages,
            raw: Some(raw),
        })
    }
}

/// Convert a finished analyze operation into recognized pages.
pub fn parse_operation(value: &serde_json::Value) -> Result<Vec<RecognizedPage>, RecognitionError> {
    let operation: AnalyzeOperation = serde_json::from_value(value.clone())
        .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))?;

    if operation.status != "succeeded" {
        let message = match operation.error {
            Some(err) => format!(
                "{}: {}",
                err.code.as_deref().unwrap_or("error"),
                err.message
            ),
            None => format!("operation {}", operation.status),
        };
        return Err(RecognitionError::Service {
            status: 200,
            message,
        });
    }

    let result = operation.analyze_result.unwrap_or_default();
    let handwriting: Vec<&DocumentStyle> = result
        .styles
        .iter()
        .filter(|s| s.is_handwritten == Some(true))
        .collect();

    Ok(result
        .pages
        .iter()
        .map(|page| convert_page(page, &handwriting))
        .collect())
}

fn convert_page(page: &DocumentPage, handwriting: &[&DocumentStyle]) -> RecognizedPage {
    let page_index = page.page_number.saturating_sub(1);
    let angle = page.angle.unwrap_or(0.0);

    let fragments = page
        .lines
        .iter()
        .filter_map(|line| {
            let region = BoundingRegion::from_polygon(&line.polygon, angle)?;
            let mut fragment = TextFragment::new(page_index, line.content.clone(), region)
                .with_confidence(line_confidence(line, &page.words));
            if let Some(confidence) = handwritten_confidence(line, handwriting) {
                fragment = fragment.with_handwriting(confidence);
            }
            Some(fragment)
        })
        .collect();

    RecognizedPage {
        page_index,
        angle,
        width: page.width.unwrap_or(RecognizedPage::DEFAULT_WIDTH),
        height: page.height.unwrap_or(RecognizedPage::DEFAULT_HEIGHT),
        fragments,
    }
}

/// Mean confidence of the words inside the line's spans.
fn line_confidence(line: &DocumentLine, words: &[DocumentWord]) -> f32 {
    let (sum, count) = words
        .iter()
        .filter(|w| line.spans.iter().any(|s| s.contains(w.span.offset)))
        .fold((0.0f32, 0usize), |(sum, n), w| (sum + w.confidence, n + 1));
    if count == 0 {
        1.0
    } else {
        sum / count as f32
    }
}

/// Highest confidence of any handwritten style touching the line.
fn handwritten_confidence(line: &DocumentLine, handwriting: &[&DocumentStyle]) -> Option<f32> {
    handwriting
        .iter()
        .filter(|style| {
            style
                .spans
                .iter()
                .any(|hs| line.spans.iter().any(|ls| ls.overlaps(hs)))
        })
        .map(|style| style.confidence)
        .fold(None, |best: Option<f32>, c| Some(best.map_or(c, |b| b.max(c))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> serde_json::Value {
        json!({
            "status": "succeeded",
            "analyzeResult": {
                "content": "Invoice 42\nTotal 9.99\nJ. Smith",
                "pages": [
                    {
                        "pageNumber": 2,
                        "angle": 0.0,
                        "width": 8.5,
                        "height": 11.0,
                        "unit": "inch",
                        "words": [
                            {"content": "Invoice", "polygon": [], "confidence": 0.9, "span": {"offset": 0, "length": 7}},
                            {"content": "42", "polygon": [], "confidence": 0.7, "span": {"offset": 8, "length": 2}},
                            {"content": "Total", "polygon": [], "confidence": 1.0, "span": {"offset": 11, "length": 5}},
                            {"content": "9.99", "polygon": [], "confidence": 1.0, "span": {"offset": 17, "length": 4}}
                        ],
                        "lines": [
                            {"content": "Invoice 42", "polygon": [1.0, 1.0, 3.0, 1.0, 3.0, 1.2, 1.0, 1.2], "spans": [{"offset": 0, "length": 10}]},
                            {"content": "Total 9.99", "polygon": [1.0, 2.0, 3.0, 2.0, 3.0, 2.2, 1.0, 2.2], "spans": [{"offset": 11, "length": 10}]}
                        ]
                    },
                    {
                        "pageNumber": 4,
                        "angle": -12.5,
                        "words": [
                            {"content": "J.", "polygon": [], "confidence": 0.6, "span": {"offset": 22, "length": 2}},
                            {"content": "Smith", "polygon": [], "confidence": 0.8, "span": {"offset": 25, "length": 5}}
                        ],
                        "lines": [
                            {"content": "J. Smith", "polygon": [2.0, 5.0, 4.0, 5.0, 4.0, 5.4, 2.0, 5.4], "spans": [{"offset": 22, "length": 8}]},
                            {"content": "no polygon", "spans": [{"offset": 31, "length": 10}]}
                        ]
                    }
                ],
                "styles": [
                    {"isHandwritten": true, "confidence": 0.6, "spans": [{"offset": 22, "length": 4}]},
                    {"isHandwritten": true, "confidence": 0.95, "spans": [{"offset": 25, "length": 5}]},
                    {"isHandwritten": false, "confidence": 0.99, "spans": [{"offset": 0, "length": 21}]}
                ]
            }
        })
    }

    #[test]
    fn test_parse_pages_and_lines() {
        let pages = parse_operation(&fixture()).unwrap();
        assert_eq!(pages.len(), 2);

        let first = &pages[0];
        assert_eq!(first.page_index, 1);
        assert_eq!(first.fragments.len(), 2);
        assert_eq!(first.fragments[0].text, "Invoice 42");
        assert!((first.fragments[0].confidence - 0.8).abs() < 1e-6);
        assert!(!first.fragments[0].handwritten);
        assert!((first.fragments[1].region.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_handwriting_and_defaults() {
        let pages = parse_operation(&fixture()).unwrap();
        let second = &pages[1];
        assert_eq!(second.page_index, 3);
        assert_eq!(second.angle, -12.5);
        assert_eq!(second.width, RecognizedPage::DEFAULT_WIDTH);
        // Line without a polygon is dropped.
        assert_eq!(second.fragments.len(), 1);

        let signature = &second.fragments[0];
        assert!(signature.handwritten);
        assert!((signature.handwritten_confidence - 0.95).abs() < 1e-6);
        assert_eq!(signature.region.rotation, -12.5);
    }

    #[test]
    fn test_failed_operation_is_service_error() {
        let value = json!({
            "status": "failed",
            "error": {"code": "InvalidRequest", "message": "bad pdf"}
        });
        match parse_operation(&value) {
            Err(RecognitionError::Service { message, .. }) => {
                assert_eq!(message, "InvalidRequest: bad pdf")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payload() {
        let value = json!({"analyzeResult": {}});
        assert!(matches!(
            parse_operation(&value),
            Err(RecognitionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_analyze_url() {
        let backend = AzureReadBackend::new("https://unit.example.com/", "key").unwrap();

        let whole = backend.analyze_url(None).unwrap();
        assert_eq!(
            whole.path(),
            "/documentintelligence/documentModels/prebuilt-read:analyze"
        );
        let pairs: Vec<(String, String)> = whole.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("api-version".to_string(), DEFAULT_API_VERSION.to_string())]
        );

        let subset = backend.analyze_url(Some(&[0, 2, 4])).unwrap();
        let pages = subset
            .query_pairs()
            .find(|(k, _)| k == "pages")
            .map(|(_, v)| v.into_owned());
        assert_eq!(pages.as_deref(), Some("1,3,5"));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(AzureReadBackend::new("not a url", "key").is_err());
    }

    #[test]
    fn test_span_overlap() {
        let a = Span {
            offset: 0,
            length: 5,
        };
        let b = Span {
            offset: 5,
            length: 2,
        };
        assert!(!a.overlaps(&b));
        assert!(a.contains(4));
        assert!(!a.contains(5));
    }
}
