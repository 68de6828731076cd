//! Local Tesseract engine. No network dependency; lower accuracy than the
//! cloud engine, used as the fallback. Confidence is reported as
//! unavailable rather than fabricated.

use std::io::Cursor;

use crate::error::EngineError;

use super::{EngineKind, OcrEngine, Recognition};

pub struct LocalOcrEngine {
    languages: String,
}

impl LocalOcrEngine {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self { languages }
    }
}

impl OcrEngine for LocalOcrEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::LocalTesseract
    }

    fn recognize(
        &self,
        image: &[u8],
        _page_hint: Option<u32>,
    ) -> Result<Recognition, EngineError> {
        let _span = tracing::info_span!("engine.local_tesseract").entered();

        let engine = EngineKind::LocalTesseract.as_str().to_string();

        let img = image::load_from_memory(image).map_err(|e| EngineError::Recognition {
            engine: engine.clone(),
            reason: format!("Failed to load image: {}", e),
        })?;

        // Normalize to PNG in memory for leptess.
        let mut png_data = Vec::new();
        let mut cursor = Cursor::new(&mut png_data);
        img.write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| EngineError::Recognition {
                engine: engine.clone(),
                reason: format!("Failed to convert image: {}", e),
            })?;

        // Missing tesseract or language data means the engine itself is
        // unavailable, not that this image failed to recognize.
        let mut lt =
            leptess::LepTess::new(None, &self.languages).map_err(|e| EngineError::Unavailable {
                engine: engine.clone(),
                reason: format!("Failed to initialize Tesseract: {}", e),
            })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| EngineError::Recognition {
                engine: engine.clone(),
                reason: format!("Failed to set image: {}", e),
            })?;

        let text = lt.get_utf8_text().map_err(|e| EngineError::Recognition {
            engine,
            reason: format!("OCR failed: {}", e),
        })?;

        Ok(Recognition {
            text,
            confidence: None,
            engine: EngineKind::LocalTesseract,
        })
    }
}
