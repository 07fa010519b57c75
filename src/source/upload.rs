use super::{SourceError, SourceImage};
use crate::cv_utils;
use image::ImageFormat;
use std::path::Path;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];
const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            ..Self::default()
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

pub fn decode_upload(file: &UploadedFile) -> Result<SourceImage, SourceError> {
    if file.bytes.is_empty() {
        return Err(SourceError::UnsupportedFormat("empty file".into()));
    }

    check_declared_type(file)?;

    let format = match image::guess_format(&file.bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => format,
        Ok(other) => {
            return Err(SourceError::UnsupportedFormat(format!(
                "{:?} content",
                other
            )))
        }
        Err(_) => return Err(SourceError::UnsupportedFormat("unrecognised content".into())),
    };

    // Pixels come from the canvas so both share one geometry after EXIF rotation.
    let canvas = cv_utils::decode(&file.bytes).map_err(|e| SourceError::Decode(e.to_string()))?;
    let pixels =
        cv_utils::to_rgb_image(&canvas).map_err(|e| SourceError::Decode(e.to_string()))?;
    let jpeg = cv_utils::encode_jpg(&canvas).map_err(|e| SourceError::Decode(e.to_string()))?;

    tracing::debug!(
        "Decoded {:?} upload {:?} ({}x{})",
        format,
        file.file_name,
        pixels.width(),
        pixels.height()
    );

    Ok(SourceImage {
        pixels,
        canvas,
        jpeg,
    })
}

fn check_declared_type(file: &UploadedFile) -> Result<(), SourceError> {
    if let Some(extension) = file
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
    {
        let extension = extension.to_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(SourceError::UnsupportedFormat(format!(".{}", extension)));
        }
    }

    if let Some(content_type) = file.content_type.as_deref() {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if essence != GENERIC_CONTENT_TYPE && !ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
            return Err(SourceError::UnsupportedFormat(essence));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use opencv::prelude::*;
    use std::io::Cursor;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(32, 24, Rgb([200, 30, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_supported_formats_decode() {
        for (format, name, mime) in [
            (ImageFormat::Jpeg, "street.jpg", "image/jpeg"),
            (ImageFormat::Jpeg, "street.JPEG", "image/jpeg"),
            (ImageFormat::Png, "street.png", "image/png"),
        ] {
            let file = UploadedFile::new(encoded(format))
                .with_file_name(name)
                .with_content_type(mime);

            let image = decode_upload(&file).unwrap();

            assert_eq!((image.pixels.width(), image.pixels.height()), (32, 24));
            assert_eq!(image::guess_format(&image.jpeg).unwrap(), ImageFormat::Jpeg);
        }
    }

    #[test]
    fn test_undeclared_upload_is_sniffed() {
        let file = UploadedFile::new(encoded(ImageFormat::Png))
            .with_content_type("application/octet-stream");

        assert!(decode_upload(&file).is_ok());
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        let file = UploadedFile::new(encoded(ImageFormat::Png)).with_file_name("street.gif");

        let err = decode_upload(&file).unwrap_err();

        assert!(matches!(err, SourceError::UnsupportedFormat(ref f) if f == ".gif"));
    }

    #[test]
    fn test_rejects_disallowed_content_type() {
        let file = UploadedFile::new(encoded(ImageFormat::Jpeg))
            .with_file_name("street.jpg")
            .with_content_type("image/webp");

        assert!(matches!(
            decode_upload(&file),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_other_formats_by_content() {
        let file = UploadedFile::new(encoded(ImageFormat::Bmp)).with_file_name("street.png");

        assert!(matches!(
            decode_upload(&file),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_empty_upload() {
        assert!(matches!(
            decode_upload(&UploadedFile::new(Vec::new())),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }

    // Inserts an APP1 segment carrying only the EXIF orientation tag.
    fn with_exif_orientation(jpeg: &[u8], orientation: u8) -> Vec<u8> {
        let mut exif = b"Exif\0\0MM\0\x2a\0\0\0\x08".to_vec();
        exif.extend_from_slice(&[0x00, 0x01]);
        exif.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        exif.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        exif.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let length = (exif.len() + 2) as u16;
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&exif);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn test_rotated_jpeg_pixels_match_canvas() {
        let bytes = with_exif_orientation(&encoded(ImageFormat::Jpeg), 6);
        let file = UploadedFile::new(bytes).with_file_name("portrait.jpg");

        let image = decode_upload(&file).unwrap();

        assert_eq!(
            (image.pixels.width() as i32, image.pixels.height() as i32),
            (image.canvas.cols(), image.canvas.rows())
        );
        assert_eq!(image.pixels.width() * image.pixels.height(), 32 * 24);

        let original = cv_utils::decode(&image.jpeg).unwrap();
        assert_eq!(
            (original.cols(), original.rows()),
            (image.canvas.cols(), image.canvas.rows())
        );
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let mut bytes = encoded(ImageFormat::Png);
        bytes.truncate(40);

        let err = decode_upload(&UploadedFile::new(bytes)).unwrap_err();

        assert!(matches!(err, SourceError::Decode(_)));
    }
}
