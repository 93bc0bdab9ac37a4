//! Sample grids: the fixed mapping from LED index to source pixel.
//!
//! A grid is built once at setup and reused for every frame. Its order
//! is the order pixels appear in the outgoing packet.

use serde::{Deserialize, Serialize};

use crate::error::{OpcError, Result};
use crate::header::{HEADER_LENGTH, MAX_PAYLOAD_SIZE};
use crate::packet::packet_len;

// ── SamplePoint ──────────────────────────────────────────────────

/// Integer source coordinate for one output pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: u32,
    pub y: u32,
}

impl SamplePoint {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<(u32, u32)> for SamplePoint {
    fn from((x, y): (u32, u32)) -> Self {
        Self::new(x, y)
    }
}

// ── FitAxis ──────────────────────────────────────────────────────

/// Which view dimension a centered grid's spacing is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitAxis {
    #[default]
    Width,
    Height,
}

// ── GridLayout ───────────────────────────────────────────────────

/// Declarative grid description, as it appears in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GridLayout {
    /// One sample per pixel of a `cols × rows` frame, row-major.
    Matrix { cols: u32, rows: u32 },
    /// `cols × rows` evenly spaced samples centred in a larger view.
    Centered {
        cols: u32,
        rows: u32,
        view_width: f64,
        view_height: f64,
        margin: f64,
        #[serde(default)]
        fit: FitAxis,
    },
    /// Explicit list of `[x, y]` coordinates.
    Points { points: Vec<(u32, u32)> },
}

impl Default for GridLayout {
    fn default() -> Self {
        GridLayout::Matrix { cols: 32, rows: 32 }
    }
}

// ── SampleGrid ───────────────────────────────────────────────────

/// Ordered, non-empty list of sample points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleGrid {
    points: Vec<SamplePoint>,
}

impl SampleGrid {
    pub fn new<I, P>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<SamplePoint>,
    {
        let points: Vec<SamplePoint> = points.into_iter().map(Into::into).collect();
        if points.is_empty() {
            return Err(OpcError::EmptyGrid);
        }
        Ok(Self { points })
    }

    /// Top-down, left-to-right `cols × rows` matrix starting at `(0, 0)`.
    pub fn matrix(cols: u32, rows: u32) -> Result<Self> {
        Self::new((0..rows).flat_map(|y| (0..cols).map(move |x| SamplePoint::new(x, y))))
    }

    /// Fractional positions truncated toward zero.
    pub fn from_positions<I>(positions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let points = positions
            .into_iter()
            .enumerate()
            .map(|(index, (x, y))| truncate(index, x, y))
            .collect::<Result<Vec<_>>>()?;
        Self::new(points)
    }

    /// `cols × rows` samples spaced `(view_width - margin) / cols` apart,
    /// centred on the middle of a `view_width × view_height` frame.
    pub fn centered(cols: u32, rows: u32, view_width: f64, view_height: f64, margin: f64) -> Result<Self> {
        Self::centered_fit(cols, rows, view_width, view_height, margin, FitAxis::Width)
    }

    /// Like [`centered`](Self::centered), with the spacing taken from the
    /// `fit` dimension: `(view_height - margin) / cols` for [`FitAxis::Height`].
    pub fn centered_fit(
        cols: u32,
        rows: u32,
        view_width: f64,
        view_height: f64,
        margin: f64,
        fit: FitAxis,
    ) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(OpcError::EmptyGrid);
        }
        let extent = match fit {
            FitAxis::Width => view_width,
            FitAxis::Height => view_height,
        };
        let spacing = (extent - margin) / cols as f64;
        let (cx, cy) = (view_width / 2.0, view_height / 2.0);
        let (half_cols, half_rows) = ((cols / 2) as f64, (rows / 2) as f64);

        Self::from_positions((0..rows).flat_map(move |y| {
            (0..cols).map(move |x| {
                (
                    cx + spacing * (x as f64 - half_cols),
                    cy + spacing * (y as f64 - half_rows),
                )
            })
        }))
    }

    pub fn from_layout(layout: &GridLayout) -> Result<Self> {
        match layout {
            GridLayout::Matrix { cols, rows } => Self::matrix(*cols, *rows),
            GridLayout::Centered {
                cols,
                rows,
                view_width,
                view_height,
                margin,
                fit,
            } => Self::centered_fit(*cols, *rows, *view_width, *view_height, *margin, *fit),
            GridLayout::Points { points } => Self::new(points.iter().copied()),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`: construction rejects empty grids.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SamplePoint> {
        self.points.iter()
    }

    /// Smallest frame size `(width, height)` that contains every point.
    pub fn required_size(&self) -> (u32, u32) {
        self.points.iter().fold((0, 0), |(w, h), p| {
            (w.max(p.x.saturating_add(1)), h.max(p.y.saturating_add(1)))
        })
    }

    /// Wire length of one packet for this grid.
    pub fn packet_len(&self) -> usize {
        packet_len(self.points.len())
    }

    /// Check that one packet fits the 16-bit length field that byte-stream
    /// links stamp into the header. Message-framed links have no such cap.
    pub fn check_stream_length(&self) -> Result<()> {
        let size = self.packet_len() - HEADER_LENGTH;
        if size > MAX_PAYLOAD_SIZE {
            return Err(OpcError::PayloadTooLarge {
                size,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }

    /// Check every point against a `width × height` frame.
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        match self
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| p.x >= width || p.y >= height)
        {
            Some((index, p)) => Err(OpcError::SampleOutOfBounds {
                index,
                x: p.x,
                y: p.y,
                width,
                height,
            }),
            None => Ok(()),
        }
    }
}

impl<'a> IntoIterator for &'a SampleGrid {
    type Item = &'a SamplePoint;
    type IntoIter = std::slice::Iter<'a, SamplePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn truncate(index: usize, x: f64, y: f64) -> Result<SamplePoint> {
    let valid = |v: f64| v.is_finite() && v > -1.0 && v < u32::MAX as f64;
    if !valid(x) || !valid(y) {
        return Err(OpcError::InvalidPosition { index, x, y });
    }
    // `as` truncates toward zero, so values in (-1, 0) land on 0.
    Ok(SamplePoint::new(x as u32, y as u32))
}
