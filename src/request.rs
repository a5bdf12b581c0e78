//! Per-invocation request: prompt, images, schema, retry budget, timeout.
//!
//! A [`CallRequest`] is immutable once built. Fields are private and read
//! through accessors, so the retry loop can hand the same request to every
//! attempt without any chance of one attempt altering the next.

use crate::error::CallError;
use crate::schema::OutputSchema;
use image::DynamicImage;
use std::path::Path;
use std::time::Duration;

/// One image attached to a request.
#[derive(Debug, Clone)]
pub enum RequestImage {
    /// An in-memory bitmap, compressed with the caller's configured
    /// [`crate::config::ImageFormat`] before sending.
    Bitmap(DynamicImage),
    /// Bytes already in a format the endpoint accepts; only base64-wrapped.
    Encoded { bytes: Vec<u8>, mime_type: String },
}

impl RequestImage {
    /// Load an image file.
    ///
    /// PNG and JPEG files are forwarded byte-for-byte; GIF, BMP, WebP and
    /// TIFF are decoded into a bitmap and re-encoded at call time.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CallError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            CallError::InvalidRequest(format!("cannot read image '{}': {}", path.display(), e))
        })?;
        Self::from_bytes(bytes).map_err(|e| match e {
            CallError::InvalidRequest(detail) => {
                CallError::InvalidRequest(format!("'{}': {}", path.display(), detail))
            }
            other => other,
        })
    }

    /// Wrap raw image bytes, sniffing the format from the magic number.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CallError> {
        match image::guess_format(&bytes) {
            Ok(fmt @ (image::ImageFormat::Png | image::ImageFormat::Jpeg)) => {
                Ok(RequestImage::Encoded {
                    bytes,
                    mime_type: fmt.to_mime_type().to_string(),
                })
            }
            _ => image::load_from_memory(&bytes)
                .map(RequestImage::Bitmap)
                .map_err(|e| CallError::InvalidRequest(format!("unsupported image: {e}"))),
        }
    }
}

impl From<DynamicImage> for RequestImage {
    fn from(img: DynamicImage) -> Self {
        RequestImage::Bitmap(img)
    }
}

/// Everything one structured call needs.
///
/// # Example
/// ```rust
/// use vision_structured::{CallRequest, FieldType, OutputSchema};
/// use image::{DynamicImage, RgbImage};
///
/// let schema = OutputSchema::new("Summary").field("summary", FieldType::String);
/// let request = CallRequest::builder("Describe the figure.", schema)
///     .image(DynamicImage::ImageRgb8(RgbImage::new(10, 10)))
///     .max_retries(2)
///     .timeout_secs(30.0)
///     .build()
///     .unwrap();
/// assert_eq!(request.attempts(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct CallRequest {
    prompt: String,
    images: Vec<RequestImage>,
    schema: OutputSchema,
    max_retries: u32,
    timeout: Option<Duration>,
}

impl CallRequest {
    /// Start a request with no images, no retries and no timeout.
    pub fn builder(prompt: impl Into<String>, schema: OutputSchema) -> CallRequestBuilder {
        CallRequestBuilder {
            prompt: prompt.into(),
            images: Vec::new(),
            schema,
            max_retries: 0,
            timeout_secs: None,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn images(&self) -> &[RequestImage] {
        &self.images
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total remote attempts this request allows: `max_retries + 1`.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Builder for [`CallRequest`].
#[derive(Debug)]
pub struct CallRequestBuilder {
    prompt: String,
    images: Vec<RequestImage>,
    schema: OutputSchema,
    max_retries: u32,
    timeout_secs: Option<f64>,
}

impl CallRequestBuilder {
    /// Append an image. Images are sent in the order they are added.
    pub fn image(mut self, image: impl Into<RequestImage>) -> Self {
        self.images.push(image.into());
        self
    }

    pub fn images(mut self, images: impl IntoIterator<Item = RequestImage>) -> Self {
        self.images.extend(images);
        self
    }

    /// Append already-encoded image bytes with their MIME type.
    pub fn image_bytes(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.images.push(RequestImage::Encoded {
            bytes,
            mime_type: mime_type.into(),
        });
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Per-attempt timeout for the remote call.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the request, validating constraints.
    pub fn build(self) -> Result<CallRequest, CallError> {
        if self.prompt.trim().is_empty() && self.images.is_empty() {
            return Err(CallError::InvalidRequest(
                "request needs prompt text or at least one image".into(),
            ));
        }
        self.schema.check().map_err(CallError::InvalidRequest)?;

        let timeout = match self.timeout_secs {
            None => None,
            Some(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(d) if !d.is_zero() => Some(d),
                _ => {
                    return Err(CallError::InvalidRequest(format!(
                        "timeout must be a positive number of seconds, got {}",
                        secs
                    )))
                }
            },
        };

        Ok(CallRequest {
            prompt: self.prompt,
            images: self.images,
            schema: self.schema,
            max_retries: self.max_retries,
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use image::{Rgb, RgbImage};

    fn schema() -> OutputSchema {
        OutputSchema::new("Summary").field("summary", FieldType::String)
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn defaults_allow_one_attempt() {
        let r = CallRequest::builder("describe", schema()).build().unwrap();
        assert_eq!(r.max_retries(), 0);
        assert_eq!(r.attempts(), 1);
        assert!(r.timeout().is_none());
    }

    #[test]
    fn rejects_empty_request() {
        let err = CallRequest::builder("  ", schema()).build().unwrap_err();
        assert!(matches!(err, CallError::InvalidRequest(_)));
    }

    #[test]
    fn image_only_request_is_valid() {
        let r = CallRequest::builder("", schema())
            .image_bytes(png_bytes(), "image/png")
            .build()
            .unwrap();
        assert_eq!(r.images().len(), 1);
    }

    #[test]
    fn rejects_non_positive_timeout() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e20, 1e-12] {
            let err = CallRequest::builder("x", schema())
                .timeout_secs(bad)
                .build()
                .unwrap_err();
            assert!(err.to_string().contains("timeout"), "got: {err}");
        }
    }

    #[test]
    fn rejects_invalid_schema() {
        let err = CallRequest::builder("x", OutputSchema::new("Empty"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no fields"), "got: {err}");
    }

    #[test]
    fn from_bytes_passes_png_through() {
        match RequestImage::from_bytes(png_bytes()).unwrap() {
            RequestImage::Encoded { mime_type, .. } => assert_eq!(mime_type, "image/png"),
            other => panic!("expected encoded image, got {other:?}"),
        }
    }

    #[test]
    fn from_bytes_decodes_bmp_to_bitmap() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([0, 255, 0])));
        let mut bmp = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bmp), image::ImageFormat::Bmp)
            .unwrap();
        match RequestImage::from_bytes(bmp).unwrap() {
            RequestImage::Bitmap(decoded) => {
                assert_eq!((decoded.width(), decoded.height()), (3, 2));
            }
            other => panic!("expected bitmap, got {other:?}"),
        }
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        assert!(RequestImage::from_bytes(b"not an image".to_vec()).is_err());
    }

    #[test]
    fn from_path_reads_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut tmp, &png_bytes()).unwrap();
        let img = RequestImage::from_path(tmp.path()).unwrap();
        assert!(matches!(img, RequestImage::Encoded { .. }));
    }

    #[test]
    fn from_path_missing_file() {
        let err = RequestImage::from_path("/definitely/not/here.png").unwrap_err();
        assert!(err.to_string().contains("cannot read image"), "got: {err}");
    }
}
