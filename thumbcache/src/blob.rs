//! Decoded image types shared by every tier.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Bytes per pixel of an RGBA8 image.
pub const BYTES_PER_PIXEL: usize = 4;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An immutable decoded RGBA8 image.
///
/// Cloning is cheap: the pixel buffer is reference counted.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl ImageBlob {
    /// Creates a blob from a raw RGBA8 buffer.
    ///
    /// Returns `None` if the buffer length does not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: impl Into<Bytes>) -> Option<Self> {
        let pixels = pixels.into();
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(BYTES_PER_PIXEL)?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Raw RGBA8 pixels, row-major.
    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    /// Decoded footprint counted against the memory budget.
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

/// Tier that satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSource {
    Memory,
    Disk,
    Network,
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Successful outcome of a resolve.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub blob: Arc<ImageBlob>,
    pub source: ImageSource,
}

impl LoadedImage {
    pub fn new(blob: Arc<ImageBlob>, source: ImageSource) -> Self {
        Self { blob, source }
    }
}
