//! Vision model abstraction and request assembly.

mod gemini;

pub use gemini::GeminiClient;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::VisionError;
use crate::invoice::Schema;

/// Instruction sent alongside the invoice pages.
pub const INVOICE_PROMPT: &str = "Parse this invoice and provide the output as a JSON object according to the schema.\n\
Extract all relevant details including line items.";

/// One page image.
#[derive(Debug, Clone)]
pub struct ImagePart {
    /// Source path, for logging.
    pub path: PathBuf,
    /// MIME type guessed from the extension.
    pub mime_type: String,
    /// Raw file contents.
    pub data: Vec<u8>,
}

/// Everything the model needs for one invoice.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// Page images in page order.
    pub images: Vec<ImagePart>,
    /// Instruction text, sent after the images.
    pub prompt: String,
    /// Structured output schema.
    pub schema: Schema,
}

/// A hosted model that turns invoice images into JSON text.
#[allow(async_fn_in_trait)]
pub trait VisionModel {
    /// Run the request and return the model's raw text output.
    async fn generate(&self, request: &VisionRequest) -> Result<String, VisionError>;
}

impl<T: VisionModel> VisionModel for &T {
    async fn generate(&self, request: &VisionRequest) -> Result<String, VisionError> {
        (**self).generate(request).await
    }
}

/// Read the pages of one invoice into a request.
///
/// Unreadable pages are logged and skipped; the request fails only when no
/// page could be read.
pub fn build_request(
    invoice_id: &str,
    images: &[PathBuf],
    prompt: &str,
    schema: &Schema,
) -> Result<VisionRequest, VisionError> {
    let mut parts = Vec::with_capacity(images.len());

    for path in images {
        match fs::read(path) {
            Ok(data) => {
                debug!("Read page {} ({} bytes)", path.display(), data.len());
                parts.push(ImagePart {
                    path: path.clone(),
                    mime_type: mime_type_for(path),
                    data,
                });
            }
            Err(e) => warn!("Skipping unreadable page {}: {}", path.display(), e),
        }
    }

    if parts.is_empty() {
        return Err(VisionError::NoImages(invoice_id.to_string()));
    }

    Ok(VisionRequest {
        images: parts,
        prompt: prompt.to_string(),
        schema: schema.clone(),
    })
}

/// MIME type from the file extension, `application/octet-stream` if unknown.
pub fn mime_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::invoice_schema;

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for(Path::new("a/page.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("page.jpg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("page.unknownext")), "application/octet-stream");
    }

    #[test]
    fn test_build_request_skips_missing_pages() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("p1.png");
        fs::write(&present, b"\x89PNG").unwrap();
        let missing = dir.path().join("p2.png");

        let schema = invoice_schema(&["SAWTELLE"]);
        let request = build_request("inv", &[present.clone(), missing], INVOICE_PROMPT, &schema).unwrap();

        assert_eq!(request.images.len(), 1);
        assert_eq!(request.images[0].path, present);
        assert_eq!(request.images[0].data, b"\x89PNG".to_vec());
        assert_eq!(request.prompt, INVOICE_PROMPT);
    }

    #[test]
    fn test_build_request_without_pages_fails() {
        let schema = invoice_schema(&["SAWTELLE"]);
        let err = build_request("inv-7", &[PathBuf::from("/nonexistent/p.png")], INVOICE_PROMPT, &schema)
            .unwrap_err();

        assert!(matches!(err, VisionError::NoImages(ref id) if id == "inv-7"));
    }
}
