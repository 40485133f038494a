//! Source-image decoding and the two/three-image set.
//!
//! Images are decoded eagerly into premultiplied pixmaps before a session
//! starts; decode failures are input errors reported to the caller before
//! any rendering begins.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tiny_skia::Pixmap;

/// A decoded bitmap, immutable for the duration of an animation session.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixmap: Pixmap,
}

impl SourceImage {
    /// Decode an image file (jpeg/png/webp) into a premultiplied pixmap.
    pub fn load(path: &Path) -> Result<Self> {
        let decoded = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?;
        let rgba = decoded.to_rgba8();
        Self::from_rgba(rgba.width(), rgba.height(), rgba.as_raw())
            .with_context(|| format!("unusable image {}", path.display()))
    }

    /// Build a source image from straight (unpremultiplied) RGBA bytes.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("image dimensions must be positive, got {width}x{height}");
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            bail!(
                "RGBA buffer length mismatch: expected {expected} bytes, got {}",
                rgba.len()
            );
        }

        let mut data = rgba.to_vec();
        for px in data.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a < 255 {
                px[0] = ((px[0] as u16 * a) / 255) as u8;
                px[1] = ((px[1] as u16 * a) / 255) as u8;
                px[2] = ((px[2] as u16 * a) / 255) as u8;
            }
        }
        let size = tiny_skia::IntSize::from_wh(width, height)
            .with_context(|| format!("invalid image size {width}x{height}"))?;
        let pixmap = Pixmap::from_vec(data, size).context("failed to build pixmap")?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

/// The active image set: exactly two or exactly three sources. The shape is
/// explicit rather than a runtime-length array so the flash-sequence table
/// and slot mapping are chosen per variant.
#[derive(Debug, Clone)]
pub enum ImageSet {
    Pair(SourceImage, SourceImage),
    Triple(SourceImage, SourceImage, SourceImage),
}

impl ImageSet {
    /// Build from a loaded list. Fewer than two images is an input error;
    /// more than three is rejected rather than silently truncated.
    pub fn from_vec(images: Vec<SourceImage>) -> Result<Self> {
        let count = images.len();
        let mut iter = images.into_iter();
        match (iter.next(), iter.next(), iter.next(), iter.next()) {
            (Some(a), Some(b), None, _) => Ok(Self::Pair(a, b)),
            (Some(a), Some(b), Some(c), None) => Ok(Self::Triple(a, b, c)),
            (_, _, _, Some(_)) => bail!("animation supports at most three images, got {count}"),
            _ => bail!("animation needs at least two images, got {count}"),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Pair(..) => 2,
            Self::Triple(..) => 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The primary image. Canvas dimensions always follow its natural size.
    pub fn primary(&self) -> &SourceImage {
        match self {
            Self::Pair(a, _) | Self::Triple(a, _, _) => a,
        }
    }

    /// Resolve a 1-based sequence slot to an image. Slots beyond the set
    /// size clamp to the last image, matching the original slot mapping.
    pub fn slot(&self, slot: u8) -> &SourceImage {
        let index = slot.max(1) as usize - 1;
        match self {
            Self::Pair(a, b) => {
                if index == 0 {
                    a
                } else {
                    b
                }
            }
            Self::Triple(a, b, c) => match index {
                0 => a,
                1 => b,
                _ => c,
            },
        }
    }

    /// The image that plays overlay against the given base slot: the next
    /// slot in cyclic order.
    pub fn overlay_for(&self, base_slot: u8) -> &SourceImage {
        let next = (base_slot.max(1) as usize % self.len()) as u8 + 1;
        self.slot(next)
    }
}
