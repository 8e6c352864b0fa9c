//! Camera frame handling — decoding, orientation, duplicate suppression.
//!
//! Frames arrive from the acquisition device as encoded bytes (JPEG/PNG) or
//! as browser-style data URLs. Before a frame is worth an OCR call we check
//! that it decodes, that it is large enough to carry legible label text, and
//! that it is not a perceptual duplicate of the previous attempt (a patient
//! holding a pouch still in front of the camera produces near-identical
//! frames every throttle tick).

use base64::Engine as _;
use image::GenericImageView;
use img_hash::{HashAlg, HasherConfig, ImageHash};

use super::OcrError;

/// Frames smaller than this on either edge cannot carry legible label text.
const MIN_FRAME_EDGE: u32 = 64;

/// Hamming distance at or below which two frame hashes are considered the
/// same scene.
const DUPLICATE_HASH_DISTANCE: u32 = 5;

/// A validated, decodable camera frame.
pub struct Frame {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    orientation: Option<u32>,
    hash: ImageHash,
}

impl Frame {
    /// Build a frame from encoded image bytes. Fails if the bytes do not
    /// decode or the image is too small to read.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, OcrError> {
        let img = image::load_from_memory(&bytes)
            .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
        let (width, height) = img.dimensions();
        if width < MIN_FRAME_EDGE || height < MIN_FRAME_EDGE {
            return Err(OcrError::ImageDecode(format!(
                "frame too small for label text: {width}x{height}"
            )));
        }

        let orientation = read_exif_orientation(&bytes);
        let hash = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .to_hasher()
            .hash_image(&img);

        Ok(Self {
            bytes,
            width,
            height,
            orientation,
            hash,
        })
    }

    /// Build a frame from a `data:image/...;base64,` URL as sent by browser
    /// camera capture.
    pub fn from_data_url(url: &str) -> Result<Self, OcrError> {
        let payload = url
            .split_once(";base64,")
            .map(|(_, b64)| b64)
            .unwrap_or(url);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| OcrError::ImageDecode(format!("data URL decode: {e}")))?;
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// EXIF orientation tag (1..=8) when the frame carries one. Phone photos
    /// routinely arrive rotated; the recognition backend needs the hint.
    pub fn orientation(&self) -> Option<u32> {
        self.orientation
    }

    /// Perceptual comparison against the previous attempt's frame. Duplicate
    /// frames are skipped by the capture driver to avoid burning OCR calls
    /// on an unchanged scene.
    pub fn is_duplicate_of(&self, other: &Frame) -> bool {
        self.hash.dist(&other.hash) <= DUPLICATE_HASH_DISTANCE
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("orientation", &self.orientation)
            .finish()
    }
}

fn read_exif_orientation(bytes: &[u8]) -> Option<u32> {
    let mut cursor = std::io::Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32, shade: u8) -> Vec<u8> {
        let img = image::ImageBuffer::from_pixel(w, h, image::Rgb([shade, shade, shade]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out
    }

    /// A frame with enough structure that gradient hashing distinguishes it
    /// from a flat frame.
    fn gradient_png(w: u32, h: u32) -> Vec<u8> {
        let img = image::ImageBuffer::from_fn(w, h, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn decodes_valid_png() {
        let frame = Frame::from_bytes(png_bytes(128, 96, 200)).unwrap();
        assert_eq!(frame.dimensions(), (128, 96));
    }

    #[test]
    fn rejects_garbage_bytes() {
        let err = Frame::from_bytes(vec![0u8; 32]).unwrap_err();
        assert!(matches!(err, OcrError::ImageDecode(_)));
    }

    #[test]
    fn rejects_tiny_frames() {
        let err = Frame::from_bytes(png_bytes(16, 16, 10)).unwrap_err();
        assert!(matches!(err, OcrError::ImageDecode(_)));
    }

    #[test]
    fn data_url_round_trip() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes(128, 128, 80));
        let url = format!("data:image/png;base64,{b64}");
        let frame = Frame::from_data_url(&url).unwrap();
        assert_eq!(frame.dimensions(), (128, 128));
    }

    #[test]
    fn bare_base64_without_prefix_also_accepted() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes(96, 96, 80));
        let frame = Frame::from_data_url(&b64).unwrap();
        assert_eq!(frame.dimensions(), (96, 96));
    }

    #[test]
    fn identical_frames_are_duplicates() {
        let a = Frame::from_bytes(gradient_png(128, 128)).unwrap();
        let b = Frame::from_bytes(gradient_png(128, 128)).unwrap();
        assert!(a.is_duplicate_of(&b));
    }

    #[test]
    fn different_scenes_are_not_duplicates() {
        let a = Frame::from_bytes(gradient_png(128, 128)).unwrap();
        let b = Frame::from_bytes(png_bytes(128, 128, 255)).unwrap();
        assert!(!a.is_duplicate_of(&b));
    }

    #[test]
    fn png_has_no_exif_orientation() {
        let frame = Frame::from_bytes(png_bytes(128, 128, 10)).unwrap();
        assert!(frame.orientation().is_none());
    }
}
