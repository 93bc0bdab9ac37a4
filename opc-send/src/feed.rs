//! Frame feeds: where the tick loop gets the frame it samples.
//!
//! The built-in pattern is drawn once and reused. Piped frames arrive on
//! a reader thread; the loop always samples the most recent complete
//! frame and never waits for a new one.

use std::io::Read;
use std::thread;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use opc_core::{Rgb, Rgba, RgbaFrame};

use crate::config::{FrameConfig, Pattern, SourceKind};

const BARS: [Rgb; 8] = [
    Rgb::new(255, 255, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 255, 255),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(0, 0, 0),
];

/// Draw a test card.
pub fn render_pattern(pattern: &Pattern, width: u32, height: u32) -> RgbaFrame {
    match *pattern {
        Pattern::Solid { r, g, b } => RgbaFrame::filled(width, height, Rgba::new(r, g, b, 255)),
        Pattern::ColorBars => {
            let mut frame = RgbaFrame::filled(width, height, Rgba::default());
            for x in 0..width {
                let bar = (x as usize * BARS.len()) / width as usize;
                let colour = Rgba::from(BARS[bar]);
                for y in 0..height {
                    frame.set_pixel(x, y, colour);
                }
            }
            frame
        }
    }
}

// ── PipedFrames ──────────────────────────────────────────────────

/// Fixed-size raw RGBA frames read from a byte stream on a helper thread.
pub struct PipedFrames {
    rx: watch::Receiver<Option<RgbaFrame>>,
    current: Option<RgbaFrame>,
    finished: bool,
}

impl PipedFrames {
    pub fn spawn<R>(mut reader: R, width: u32, height: u32) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let frame_len = width as usize * height as usize * 4;

        thread::spawn(move || {
            let mut count: u64 = 0;
            loop {
                let mut buf = vec![0u8; frame_len];
                if let Err(e) = reader.read_exact(&mut buf) {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        warn!("frame pipe read error: {e}");
                    }
                    break;
                }
                let frame = match RgbaFrame::from_rgba(width, height, buf) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!("bad piped frame: {e}");
                        break;
                    }
                };
                count += 1;
                if tx.send(Some(frame)).is_err() {
                    break;
                }
            }
            debug!(frames = count, "frame pipe ended");
        });

        Self {
            rx,
            current: None,
            finished: false,
        }
    }

    fn latest(&mut self) -> Option<&RgbaFrame> {
        match self.rx.has_changed() {
            Ok(true) => self.current = self.rx.borrow_and_update().clone(),
            Ok(false) => {}
            Err(_) if !self.finished => {
                // Writer gone; pick up whatever it sent last.
                if let Some(last) = self.rx.borrow_and_update().clone() {
                    self.current = Some(last);
                }
                self.finished = true;
            }
            Err(_) => {}
        }
        self.current.as_ref()
    }
}

// ── FrameFeed ────────────────────────────────────────────────────

pub enum FrameFeed {
    Pattern(RgbaFrame),
    Piped(PipedFrames),
}

impl FrameFeed {
    pub fn from_config(cfg: &FrameConfig) -> Self {
        match cfg.source {
            SourceKind::Pattern => {
                info!(pattern = ?cfg.pattern, "using built-in test pattern");
                FrameFeed::Pattern(render_pattern(&cfg.pattern, cfg.width, cfg.height))
            }
            SourceKind::Stdin => {
                info!(width = cfg.width, height = cfg.height, "reading raw RGBA frames from stdin");
                FrameFeed::Piped(PipedFrames::spawn(std::io::stdin(), cfg.width, cfg.height))
            }
        }
    }

    /// Most recent frame, or `None` before the first one arrives.
    pub fn latest(&mut self) -> Option<&RgbaFrame> {
        match self {
            FrameFeed::Pattern(frame) => Some(frame),
            FrameFeed::Piped(piped) => piped.latest(),
        }
    }

    /// `true` once a piped source has hit end of input.
    pub fn is_finished(&self) -> bool {
        match self {
            FrameFeed::Pattern(_) => false,
            FrameFeed::Piped(piped) => piped.finished,
        }
    }
}
