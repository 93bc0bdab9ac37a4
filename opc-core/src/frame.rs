//! Frame buffer types read by the encoder.
//!
//! A frame is produced fresh by the renderer each tick and is only ever
//! borrowed immutably by the sampling pass.

use crate::error::{OpcError, Result};

// ── Colours ──────────────────────────────────────────────────────

/// An opaque colour as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A pixel sample as stored in a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Drop the alpha channel.
    pub const fn rgb(self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

impl From<Rgb> for Rgba {
    fn from(c: Rgb) -> Self {
        Rgba::new(c.r, c.g, c.b, 0xFF)
    }
}

// ── PixelFormat ──────────────────────────────────────────────────

/// Byte order of a 4-byte pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// Red, Green, Blue, Alpha (canvas `ImageData` layout).
    #[default]
    Rgba8,
    /// Blue, Green, Red, Alpha (typical OS screen-capture layout).
    Bgra8,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;

    fn decode(self, px: &[u8]) -> Rgba {
        match self {
            PixelFormat::Rgba8 => Rgba::new(px[0], px[1], px[2], px[3]),
            PixelFormat::Bgra8 => Rgba::new(px[2], px[1], px[0], px[3]),
        }
    }

    fn encode(self, c: Rgba) -> [u8; 4] {
        match self {
            PixelFormat::Rgba8 => [c.r, c.g, c.b, c.a],
            PixelFormat::Bgra8 => [c.b, c.g, c.r, c.a],
        }
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// Anything the encoder can sample pixels from.
///
/// Implementations must return a sample for every `x < width()` and
/// `y < height()`; the encoder never asks for anything outside that.
pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn pixel(&self, x: u32, y: u32) -> Rgba;
}

impl<F: FrameSource + ?Sized> FrameSource for &F {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn pixel(&self, x: u32, y: u32) -> Rgba {
        (**self).pixel(x, y)
    }
}

// ── RgbaFrame ────────────────────────────────────────────────────

/// An owned 4-byte-per-pixel frame.
///
/// `data` holds `height` rows of `stride` bytes. `stride` may exceed
/// `width * 4` when rows are padded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl RgbaFrame {
    /// Wrap an existing buffer, checking that it covers every row.
    pub fn new(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        let row = width as usize * PixelFormat::BYTES_PER_PIXEL;
        if (stride as usize) < row {
            return Err(OpcError::FrameTooSmall {
                needed: row,
                actual: stride as usize,
            });
        }
        let needed = stride as usize * height as usize;
        if data.len() < needed {
            return Err(OpcError::FrameTooSmall {
                needed,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    /// Tightly packed RGBA bytes, as returned by `getImageData`.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, width * 4, PixelFormat::Rgba8, data)
    }

    /// Row-major list of pixels.
    pub fn from_pixels(width: u32, height: u32, pixels: &[Rgba]) -> Result<Self> {
        let needed = width as usize * height as usize;
        if pixels.len() < needed {
            return Err(OpcError::FrameTooSmall {
                needed: needed * PixelFormat::BYTES_PER_PIXEL,
                actual: pixels.len() * PixelFormat::BYTES_PER_PIXEL,
            });
        }
        let data = pixels[..needed]
            .iter()
            .flat_map(|&c| PixelFormat::Rgba8.encode(c))
            .collect();
        Self::from_rgba(width, height, data)
    }

    /// A frame of one colour.
    pub fn filled(width: u32, height: u32, colour: Rgba) -> Self {
        let data = PixelFormat::Rgba8
            .encode(colour)
            .repeat(width as usize * height as usize);
        Self {
            width,
            height,
            stride: width * 4,
            format: PixelFormat::Rgba8,
            data,
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// A row slice, including any padding bytes.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        &self.data[start..start + self.stride as usize]
    }

    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, colour: Rgba) {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let offset = self.offset(x, y);
        self.data[offset..offset + 4].copy_from_slice(&self.format.encode(colour));
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride as usize + x as usize * PixelFormat::BYTES_PER_PIXEL
    }
}

impl FrameSource for RgbaFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> Rgba {
        let offset = self.offset(x, y);
        self.format.decode(&self.data[offset..offset + 4])
    }
}
