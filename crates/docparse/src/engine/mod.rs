//! Text recognition engines and the fallback adapter.
//!
//! The primary engine is the cloud one (higher accuracy, network-bound);
//! the local Tesseract engine is the fallback. Fallback is strictly
//! sequential and happens at most once per request; the two engines never
//! run concurrently for the same image.

pub mod cloud;
pub mod local;

pub use cloud::CloudVisionEngine;
pub use local::LocalOcrEngine;

use crate::config::OcrConfig;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    CloudVision,
    LocalTesseract,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::CloudVision => "cloud-vision",
            EngineKind::LocalTesseract => "local-tesseract",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful recognition result. `confidence` is the engine's
/// self-reported score in 0–1; engines that cannot report one return
/// `None` rather than fabricating a number.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub text: String,
    pub confidence: Option<f32>,
    pub engine: EngineKind,
}

pub trait OcrEngine: Send + Sync {
    fn kind(&self) -> EngineKind;
    fn recognize(&self, image: &[u8], page_hint: Option<u32>)
        -> Result<Recognition, EngineError>;
}

/// Primary-then-fallback adapter over two engines.
pub struct OcrAdapter {
    primary: Box<dyn OcrEngine>,
    fallback: Option<Box<dyn OcrEngine>>,
}

impl OcrAdapter {
    pub fn new(primary: Box<dyn OcrEngine>, fallback: Option<Box<dyn OcrEngine>>) -> Self {
        Self { primary, fallback }
    }

    /// Builds the adapter from configuration: cloud primary with local
    /// fallback when cloud credentials are present, local only otherwise.
    pub fn from_config(config: &OcrConfig) -> Result<Self, EngineError> {
        let local = LocalOcrEngine::new(&config.languages);
        match &config.cloud {
            Some(cloud) => {
                let primary = CloudVisionEngine::new(cloud)?;
                Ok(Self::new(Box::new(primary), Some(Box::new(local))))
            }
            None => Ok(Self::new(Box::new(local), None)),
        }
    }

    /// Recognizes text with the fallback policy: the fallback engine is
    /// invoked exactly once, and only after a recoverable primary failure.
    pub fn recognize(
        &self,
        image: &[u8],
        page_hint: Option<u32>,
    ) -> Result<Recognition, EngineError> {
        let _span = tracing::info_span!("ocr.recognize", page = page_hint).entered();

        let primary_err = match self.primary.recognize(image, page_hint) {
            Ok(recognition) => return Ok(recognition),
            Err(e) => e,
        };

        if !primary_err.is_recoverable() {
            return Err(primary_err);
        }

        let Some(fallback) = &self.fallback else {
            return Err(primary_err);
        };

        log::warn!(
            "Primary engine '{}' failed ({}), falling back to '{}'",
            self.primary.kind(),
            primary_err,
            fallback.kind()
        );

        match fallback.recognize(image, page_hint) {
            Ok(recognition) => Ok(recognition),
            Err(fallback_err) => Err(EngineError::Exhausted {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubEngine {
        kind: EngineKind,
        calls: Arc<AtomicUsize>,
        outcome: fn() -> Result<Recognition, EngineError>,
    }

    impl OcrEngine for StubEngine {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        fn recognize(
            &self,
            _image: &[u8],
            _page_hint: Option<u32>,
        ) -> Result<Recognition, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn ok_cloud() -> Result<Recognition, EngineError> {
        Ok(Recognition {
            text: "cloud text".to_string(),
            confidence: Some(0.97),
            engine: EngineKind::CloudVision,
        })
    }

    fn ok_local() -> Result<Recognition, EngineError> {
        Ok(Recognition {
            text: "local text".to_string(),
            confidence: None,
            engine: EngineKind::LocalTesseract,
        })
    }

    fn timeout() -> Result<Recognition, EngineError> {
        Err(EngineError::Timeout {
            engine: "cloud-vision".to_string(),
            timeout_ms: 100,
        })
    }

    fn recognition_failure() -> Result<Recognition, EngineError> {
        Err(EngineError::Recognition {
            engine: "cloud-vision".to_string(),
            reason: "bad image".to_string(),
        })
    }

    fn stub(
        kind: EngineKind,
        outcome: fn() -> Result<Recognition, EngineError>,
    ) -> (Box<dyn OcrEngine>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = StubEngine {
            kind,
            calls: Arc::clone(&calls),
            outcome,
        };
        (Box::new(engine), calls)
    }

    #[test]
    fn test_primary_success_skips_fallback() {
        let (primary, primary_calls) = stub(EngineKind::CloudVision, ok_cloud);
        let (fallback, fallback_calls) = stub(EngineKind::LocalTesseract, ok_local);
        let adapter = OcrAdapter::new(primary, Some(fallback));

        let result = adapter.recognize(b"img", None).unwrap();
        assert_eq!(result.engine, EngineKind::CloudVision);
        assert_eq!(result.confidence, Some(0.97));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_recoverable_failure_invokes_fallback_exactly_once() {
        let (primary, _) = stub(EngineKind::CloudVision, timeout);
        let (fallback, fallback_calls) = stub(EngineKind::LocalTesseract, ok_local);
        let adapter = OcrAdapter::new(primary, Some(fallback));

        let result = adapter.recognize(b"img", Some(3)).unwrap();
        assert_eq!(result.engine, EngineKind::LocalTesseract);
        assert_eq!(result.confidence, None);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unrecoverable_failure_skips_fallback() {
        let (primary, _) = stub(EngineKind::CloudVision, recognition_failure);
        let (fallback, fallback_calls) = stub(EngineKind::LocalTesseract, ok_local);
        let adapter = OcrAdapter::new(primary, Some(fallback));

        let result = adapter.recognize(b"img", None);
        assert!(matches!(result, Err(EngineError::Recognition { .. })));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_both_failing_surfaces_exhausted() {
        let (primary, _) = stub(EngineKind::CloudVision, timeout);
        let (fallback, fallback_calls) = stub(EngineKind::LocalTesseract, timeout);
        let adapter = OcrAdapter::new(primary, Some(fallback));

        match adapter.recognize(b"img", None) {
            Err(EngineError::Exhausted { primary, fallback }) => {
                assert!(primary.contains("timed out"));
                assert!(fallback.contains("timed out"));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_fallback_propagates_primary_error() {
        let (primary, _) = stub(EngineKind::LocalTesseract, timeout);
        let adapter = OcrAdapter::new(primary, None);

        assert!(matches!(
            adapter.recognize(b"img", None),
            Err(EngineError::Timeout { .. })
        ));
    }
}
