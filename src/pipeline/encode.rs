//! Image encoding: `RequestImage` → base64 payload plus MIME type.
//!
//! Multimodal endpoints accept images as base64 strings embedded in the JSON
//! request body. Bitmaps are compressed first using the configured
//! [`ImageFormat`]; bytes that are already PNG or JPEG are only wrapped.

use crate::config::ImageFormat;
use crate::request::RequestImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// A transport-ready image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    /// Standard base64 (with padding).
    pub data: String,
    pub mime_type: String,
}

/// Encode one request image for the wire.
pub fn encode_image(
    image: &RequestImage,
    format: ImageFormat,
) -> Result<EncodedImage, image::ImageError> {
    let (bytes, mime_type) = match image {
        RequestImage::Bitmap(img) => (compress(img, format)?, format.mime_type().to_string()),
        RequestImage::Encoded { bytes, mime_type } => (bytes.clone(), mime_type.clone()),
    };

    let data = STANDARD.encode(&bytes);
    debug!("Encoded {} image → {} bytes base64", mime_type, data.len());

    Ok(EncodedImage { data, mime_type })
}

fn compress(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        }
        ImageFormat::Jpeg { quality } => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> RequestImage {
        RequestImage::Bitmap(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            10,
            10,
            Rgba([255, 0, 0, 255]),
        )))
    }

    #[test]
    fn encode_small_png() {
        let data = encode_image(&red_square(), ImageFormat::Png).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(
            image::guess_format(&decoded).unwrap(),
            image::ImageFormat::Png
        );
    }

    #[test]
    fn encode_jpeg_drops_alpha() {
        let data = encode_image(&red_square(), ImageFormat::Jpeg { quality: 80 }).unwrap();
        assert_eq!(data.mime_type, "image/jpeg");
        let decoded = STANDARD.decode(&data.data).unwrap();
        let img = image::load_from_memory(&decoded).unwrap();
        assert_eq!((img.width(), img.height()), (10, 10));
    }

    #[test]
    fn pre_encoded_bytes_are_only_wrapped() {
        let img = RequestImage::Encoded {
            bytes: vec![1, 2, 3],
            mime_type: "image/webp".into(),
        };
        let data = encode_image(&img, ImageFormat::Png).unwrap();
        assert_eq!(data.mime_type, "image/webp");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), vec![1, 2, 3]);
    }
}
