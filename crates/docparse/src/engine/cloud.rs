//! Cloud OCR engine backed by the Google Cloud Vision `images:annotate`
//! endpoint. The HTTP client is built once with the configured timeout and
//! reused across recognitions, so connections are pooled rather than
//! created per call.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::config::CloudOcrConfig;
use crate::error::EngineError;

use super::{EngineKind, OcrEngine, Recognition};

pub struct CloudVisionEngine {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    timeout_ms: u64,
}

impl CloudVisionEngine {
    pub fn new(config: &CloudOcrConfig) -> Result<Self, EngineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EngineError::Unavailable {
                engine: EngineKind::CloudVision.as_str().to_string(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout_ms: config.timeout_ms,
        })
    }

    fn engine_name(&self) -> String {
        EngineKind::CloudVision.as_str().to_string()
    }
}

impl OcrEngine for CloudVisionEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::CloudVision
    }

    fn recognize(
        &self,
        image: &[u8],
        _page_hint: Option<u32>,
    ) -> Result<Recognition, EngineError> {
        let _span = tracing::info_span!("engine.cloud_vision").entered();

        let body = json!({
            "requests": [{
                "image": { "content": BASE64.encode(image) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
            }]
        });

        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout {
                        engine: self.engine_name(),
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    EngineError::Unavailable {
                        engine: self.engine_name(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(EngineError::QuotaExceeded {
                engine: self.engine_name(),
            });
        }
        if status.is_server_error() {
            return Err(EngineError::Unavailable {
                engine: self.engine_name(),
                reason: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            return Err(EngineError::Recognition {
                engine: self.engine_name(),
                reason: format!("HTTP {}", status),
            });
        }

        let payload: Value = response.json().map_err(|e| EngineError::Recognition {
            engine: self.engine_name(),
            reason: format!("Invalid response body: {}", e),
        })?;

        parse_annotate_response(&payload).map_err(|reason| EngineError::Recognition {
            engine: self.engine_name(),
            reason,
        })
    }
}

/// Pulls the full text and page confidence out of an `images:annotate`
/// response. A `RESOURCE_EXHAUSTED` error inside the body maps to quota
/// exhaustion upstream, so it is reported distinctly.
fn parse_annotate_response(payload: &Value) -> Result<Recognition, String> {
    let response = payload
        .get("responses")
        .and_then(|r| r.get(0))
        .ok_or_else(|| "Missing responses[0]".to_string())?;

    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(format!("Vision API error: {}", message));
    }

    let annotation = response
        .get("fullTextAnnotation")
        .ok_or_else(|| "No text detected".to_string())?;

    let text = annotation
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    // Page confidences averaged into one document score.
    let confidence = annotation
        .get("pages")
        .and_then(Value::as_array)
        .and_then(|pages| {
            let scores: Vec<f64> = pages
                .iter()
                .filter_map(|p| p.get("confidence").and_then(Value::as_f64))
                .collect();
            if scores.is_empty() {
                None
            } else {
                Some((scores.iter().sum::<f64>() / scores.len() as f64) as f32)
            }
        });

    Ok(Recognition {
        text,
        confidence,
        engine: EngineKind::CloudVision,
    })
}
