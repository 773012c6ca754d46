use std::fmt;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::sync::mpsc;

const VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Classified Cloud Vision failure. Surfaced to the user as-is; the
/// caller never retries silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    Permission(String),
    InvalidCredentials(String),
    QuotaExceeded(String),
    Other(String),
}

impl fmt::Display for OcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrError::Permission(detail) => write!(
                f,
                "Cloud Vision permission error: {detail}. Check that the Vision API is enabled and the key has access to it."
            ),
            OcrError::InvalidCredentials(detail) => write!(
                f,
                "Cloud Vision credentials are invalid: {detail}. Check the key file path and regenerate the key if needed."
            ),
            OcrError::QuotaExceeded(detail) => write!(
                f,
                "Cloud Vision quota exceeded: {detail}. Check quotas and billing in the Cloud console, then retry later."
            ),
            OcrError::Other(detail) => write!(f, "Cloud Vision OCR error: {detail}"),
        }
    }
}

impl std::error::Error for OcrError {}

fn classify(status: Option<u16>, detail: &str) -> OcrError {
    let lower = detail.to_lowercase();
    if status == Some(403) || lower.contains("permission") || lower.contains("forbidden") {
        return OcrError::Permission(detail.to_string());
    }
    if status == Some(401) || lower.contains("invalid") || lower.contains("not found") {
        return OcrError::InvalidCredentials(detail.to_string());
    }
    if status == Some(429) || lower.contains("quota") || lower.contains("limit") {
        return OcrError::QuotaExceeded(detail.to_string());
    }
    OcrError::Other(detail.to_string())
}

/// Extract the ordered text lines from an `images:annotate` response:
/// the first annotation carries the full text, split on newlines.
fn parse_text_lines(body: &Value) -> Result<Vec<String>, OcrError> {
    let response = body
        .get("responses")
        .and_then(|responses| responses.get(0))
        .ok_or_else(|| OcrError::Other("empty Vision response".to_string()))?;

    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let code = error
            .get("code")
            .and_then(Value::as_u64)
            .map(|code| code as u16);
        return Err(classify(code, message));
    }

    let full_text = response
        .get("textAnnotations")
        .and_then(|annotations| annotations.get(0))
        .and_then(|annotation| annotation.get("description"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(full_text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Run TEXT_DETECTION over the whole image and return the extracted
/// lines in reading order.
pub async fn extract_text_lines(image_bytes: &[u8], api_key: &str) -> Result<Vec<String>, OcrError> {
    let body = json!({
        "requests": [{
            "image": {"content": BASE64.encode(image_bytes)},
            "features": [{"type": "TEXT_DETECTION"}]
        }]
    });

    let client = reqwest::Client::new();
    let response = client
        .post(VISION_ENDPOINT)
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await
        .map_err(|err| OcrError::Other(err.to_string()))?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(text);
        return Err(classify(Some(status.as_u16()), &detail));
    }

    let parsed: Value =
        serde_json::from_str(&text).map_err(|err| OcrError::Other(err.to_string()))?;
    parse_text_lines(&parsed)
}

/// Outcome of a background OCR run, delivered to the interaction thread.
#[derive(Debug)]
pub enum OcrEvent {
    Completed(Vec<String>),
    Failed(OcrError),
}

/// Fire-and-forget OCR on a background task. The task only ever produces
/// strings; it never touches region state. Completion or failure comes
/// back over the returned channel.
pub fn spawn_ocr(image_path: PathBuf, api_key: String) -> mpsc::Receiver<OcrEvent> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let event = match std::fs::read(&image_path) {
            Ok(bytes) => match extract_text_lines(&bytes, &api_key).await {
                Ok(lines) => OcrEvent::Completed(lines),
                Err(err) => OcrEvent::Failed(err),
            },
            Err(err) => OcrEvent::Failed(OcrError::Other(format!(
                "failed to read image {}: {}",
                image_path.display(),
                err
            ))),
        };
        let _ = tx.send(event).await;
    });
    rx
}
