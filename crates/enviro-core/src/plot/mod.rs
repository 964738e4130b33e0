//! Differential scrolling plot.
//!
//! [`PlotBuffer`] keeps a bounded history of sample vectors and an indexed
//! pixel grid, and works out which pixels change from one frame to the next.
//! [`PlotRenderer`] pushes those changes to anything implementing
//! [`PlotDisplay`]; [`PaletteFrameBuffer`] is the display adapter for
//! `embedded-graphics` targets.
//!
//! Only changed pixels travel to the panel, which keeps redraw cost
//! proportional to how much the data moved rather than to the plot size.

use thiserror_no_std::Error;

mod buffer;
mod framebuffer;
mod renderer;

pub use buffer::{FrameDelta, PixelWrite, PlotBuffer, remap};
pub use framebuffer::PaletteFrameBuffer;
pub use renderer::{PlotDisplay, PlotRenderer};

/// Most channels a single plot can carry.
pub const MAX_CHANNELS: usize = 3;

/// Palette index of the background color.
pub const BACKGROUND_INDEX: u8 = 0;

/// Error types for plot operations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlotError {
    /// Rejected plot geometry, range or palette
    #[error("Invalid plot configuration: {details}")]
    Config { details: &'static str },

    /// More values pushed than the plot has channels
    #[error("Sample has {given} values but the plot has {channels} channels")]
    Range { given: usize, channels: usize },

    /// Frame requested before any sample was pushed
    #[error("No samples to draw")]
    EmptyBuffer,

    #[error("Display error: {details}")]
    Display { details: &'static str },
}

/// Result type for plot operations
pub type PlotResult<T> = Result<T, PlotError>;
