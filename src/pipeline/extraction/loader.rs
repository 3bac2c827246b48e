//! Document image loading.
//!
//! Decodes an upload into an RGB buffer, applies EXIF orientation so phone
//! photos start from their intended pose, and provides cardinal rotations
//! for the rotation search. No OCR happens here.

use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};

use image::{imageops, DynamicImage, GrayImage, ImageOutputFormat, Luma, RgbImage};
use tracing::debug;

use super::types::Rotation;
use super::ExtractionError;

/// Maximum input image size (in bytes) before rejecting.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

/// Decoded, color-normalized document image.
///
/// Immutable: `rotate` returns a new buffer, so rotation attempts never alias.
#[derive(Debug, Clone)]
pub struct DocumentImage {
    pixels: RgbImage,
    rotation: Rotation,
    source: PathBuf,
}

impl DocumentImage {
    /// Load and decode the image at `path`.
    ///
    /// The size limit is checked against file metadata before reading, and the
    /// read itself is capped, so oversized or unbounded inputs never get
    /// buffered in full.
    pub fn load(path: &Path) -> Result<Self, ExtractionError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExtractionError::FileNotFound(path.to_path_buf()),
            _ => ExtractionError::Io(e),
        })?;

        let declared = file.metadata()?.len();
        if declared > MAX_IMAGE_BYTES as u64 {
            return Err(oversized_error());
        }

        let mut bytes = Vec::with_capacity(declared as usize);
        file.take(MAX_IMAGE_BYTES as u64 + 1).read_to_end(&mut bytes)?;
        Self::decode(path, &bytes)
    }

    /// Decode in-memory bytes; `source` is kept for reporting only.
    pub fn decode(source: &Path, bytes: &[u8]) -> Result<Self, ExtractionError> {
        validate_image_bytes(bytes)?;

        let img = image::load_from_memory(bytes).map_err(|e| {
            ExtractionError::ImageDecode(format!("{}: {e}", source.display()))
        })?;
        let orientation = read_exif_orientation(bytes);
        let img = apply_orientation(img, orientation);
        let pixels = img.to_rgb8();

        debug!(
            path = %source.display(),
            size = format!("{}x{}", pixels.width(), pixels.height()),
            exif_orientation = orientation,
            "Document image decoded"
        );

        Ok(Self {
            pixels,
            rotation: Rotation::Deg0,
            source: source.to_path_buf(),
        })
    }

    /// Wrap an already-decoded buffer.
    pub fn from_rgb(source: impl Into<PathBuf>, pixels: RgbImage) -> Self {
        Self {
            pixels,
            rotation: Rotation::Deg0,
            source: source.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Channels per pixel after normalization (always RGB).
    pub fn channels(&self) -> u8 {
        3
    }

    /// Rotation applied relative to the loaded image.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Rotate clockwise by `angle`, returning a new image.
    pub fn rotate(&self, angle: Rotation) -> DocumentImage {
        let pixels = match angle {
            Rotation::Deg0 => self.pixels.clone(),
            Rotation::Deg90 => imageops::rotate90(&self.pixels),
            Rotation::Deg180 => imageops::rotate180(&self.pixels),
            Rotation::Deg270 => imageops::rotate270(&self.pixels),
        };
        DocumentImage {
            pixels,
            rotation: self.rotation.then(angle),
            source: self.source.clone(),
        }
    }

    /// Single-channel intensity (ITU-R BT.601 luminance).
    pub fn to_gray(&self) -> GrayImage {
        let (w, h) = (self.pixels.width(), self.pixels.height());
        let mut gray = GrayImage::new(w, h);
        for (x, y, p) in self.pixels.enumerate_pixels() {
            let luma = (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32)
                as u8;
            gray.put_pixel(x, y, Luma([luma]));
        }
        gray
    }

    /// Encode as PNG bytes for engines that consume encoded images.
    pub fn to_png(&self) -> Result<Vec<u8>, ExtractionError> {
        let dynamic = DynamicImage::ImageRgb8(self.pixels.clone());
        let mut cursor = Cursor::new(Vec::new());
        dynamic
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageDecode(format!("PNG encoding failed: {e}")))?;
        Ok(cursor.into_inner())
    }
}

/// Validate image bytes before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ExtractionError::ImageDecode(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(oversized_error());
    }
    Ok(())
}

fn oversized_error() -> ExtractionError {
    ExtractionError::ImageDecode(format!(
        "Image data exceeds {}MB limit",
        MAX_IMAGE_BYTES / (1024 * 1024)
    ))
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply EXIF orientation transform to a `DynamicImage`.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        1 => img,
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
