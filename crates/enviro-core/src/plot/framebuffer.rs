//! Indexed framebuffer in front of an `embedded-graphics` panel.
//!
//! Plot pixels land in a RAM buffer of palette indices. `present()` flushes
//! only the rectangle containing changed pixels, in a single
//! `fill_contiguous` call, so a slow SPI panel sees one short transaction per
//! frame.

use alloc::vec;
use alloc::vec::Vec;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{debug, error};

use super::{BACKGROUND_INDEX, PlotBuffer, PlotDisplay, PlotError, PlotResult};

/// Bounding box of pixels that have changed since the last flush.
#[derive(Debug, Clone, Copy)]
struct DirtyRect {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl DirtyRect {
    fn expand(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn from_point(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }
}

/// Palette-indexed framebuffer implementing [`PlotDisplay`].
///
/// The whole area starts dirty so the first `present()` paints the
/// background onto the panel.
pub struct PaletteFrameBuffer<D> {
    target: D,
    palette: Vec<Rgb565>,
    indices: Vec<u8>,
    width: usize,
    height: usize,
    top_offset: i32,
    dirty: Option<DirtyRect>,
}

impl<D> PaletteFrameBuffer<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    /// Size the framebuffer and palette after `buffer`.
    ///
    /// `top_offset` rows above the plot are left to other drawing.
    pub fn for_plot(target: D, buffer: &PlotBuffer, top_offset: u16) -> Self {
        let width = buffer.width() as usize;
        let height = buffer.height() as usize;
        Self {
            target,
            palette: buffer.palette().iter().map(|&c| Rgb565::from(c)).collect(),
            indices: vec![BACKGROUND_INDEX; width * height],
            width,
            height,
            top_offset: i32::from(top_offset),
            dirty: Some(DirtyRect {
                min_x: 0,
                min_y: 0,
                max_x: width - 1,
                max_y: height - 1,
            }),
        }
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut D {
        &mut self.target
    }

    pub fn into_inner(self) -> D {
        self.target
    }

    /// Flush the dirty region to the target, then reset the dirty state.
    fn flush(&mut self) -> Result<(), D::Error> {
        let Some(rect) = self.dirty.take() else {
            return Ok(());
        };

        let width = rect.max_x - rect.min_x + 1;
        let height = rect.max_y - rect.min_y + 1;

        debug!(
            "Flushing {}x{} plot region at ({}, {})",
            width, height, rect.min_x, rect.min_y
        );

        let area = Rectangle::new(
            Point::new(rect.min_x as i32, rect.min_y as i32 + self.top_offset),
            Size::new(width as u32, height as u32),
        );

        let indices = &self.indices;
        let palette = &self.palette;
        let stride = self.width;
        let colors = (rect.min_y..=rect.max_y).flat_map(move |y| {
            let row_start = y * stride + rect.min_x;
            indices[row_start..row_start + width]
                .iter()
                .map(move |&index| palette.get(index as usize).copied().unwrap_or(Rgb565::BLACK))
        });

        self.target.fill_contiguous(&area, colors)
    }
}

impl<D> PlotDisplay for PaletteFrameBuffer<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: core::fmt::Debug,
{
    fn set_pixel(&mut self, x: u16, y: u16, index: u8) -> PlotResult<()> {
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return Err(PlotError::Display {
                details: "pixel outside the plot area",
            });
        }
        if index as usize >= self.palette.len() {
            return Err(PlotError::Display {
                details: "palette index out of range",
            });
        }

        let idx = y * self.width + x;
        if self.indices[idx] != index {
            self.indices[idx] = index;
            match &mut self.dirty {
                Some(rect) => rect.expand(x, y),
                None => self.dirty = Some(DirtyRect::from_point(x, y)),
            }
        }
        Ok(())
    }

    fn present(&mut self) -> PlotResult<()> {
        self.flush().map_err(|e| {
            error!("Plot flush failed: {:?}", e);
            PlotError::Display {
                details: "draw target rejected the flush",
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlotConfig;
    use alloc::vec;
    use core::convert::Infallible;

    /// Target that records every flushed area.
    struct FlushLog {
        areas: Vec<Rectangle>,
        pixels: Vec<Rgb565>,
    }

    impl OriginDimensions for FlushLog {
        fn size(&self) -> Size {
            Size::new(16, 16)
        }
    }

    impl DrawTarget for FlushLog {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            self.pixels.extend(pixels.into_iter().map(|Pixel(_, c)| c));
            Ok(())
        }

        fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Self::Color>,
        {
            self.areas.push(*area);
            self.pixels.extend(colors);
            Ok(())
        }
    }

    fn framebuffer() -> PaletteFrameBuffer<FlushLog> {
        let buffer = PlotBuffer::configure(&PlotConfig {
            channel_count: 1,
            colors: vec![0xFF0000],
            background: 0x000000,
            value_min: 0.0,
            value_max: 10.0,
            width: 8,
            height: 6,
            top_offset: 2,
        })
        .unwrap();
        let log = FlushLog {
            areas: Vec::new(),
            pixels: Vec::new(),
        };
        PaletteFrameBuffer::for_plot(log, &buffer, 2)
    }

    #[test]
    fn test_first_present_paints_whole_area() {
        let mut fb = framebuffer();
        fb.present().unwrap();

        let target = fb.target();
        assert_eq!(
            target.areas,
            vec![Rectangle::new(Point::new(0, 2), Size::new(8, 6))]
        );
        assert_eq!(target.pixels.len(), 48);
        assert!(target.pixels.iter().all(|&c| c == Rgb565::BLACK));
    }

    #[test]
    fn test_present_flushes_only_dirty_rect() {
        let mut fb = framebuffer();
        fb.present().unwrap();
        fb.target_mut().areas.clear();
        fb.target_mut().pixels.clear();

        fb.set_pixel(2, 1, 1).unwrap();
        fb.set_pixel(4, 3, 1).unwrap();
        fb.present().unwrap();

        let target = fb.target();
        assert_eq!(
            target.areas,
            vec![Rectangle::new(Point::new(2, 3), Size::new(3, 3))]
        );
        assert_eq!(target.pixels.len(), 9);
        assert_eq!(target.pixels[0], Rgb565::RED);
        assert_eq!(target.pixels[8], Rgb565::RED);
    }

    #[test]
    fn test_unchanged_pixels_do_not_dirty() {
        let mut fb = framebuffer();
        fb.present().unwrap();
        fb.target_mut().areas.clear();

        fb.set_pixel(0, 0, 0).unwrap();
        fb.present().unwrap();

        assert!(fb.target().areas.is_empty());
    }

    #[test]
    fn test_out_of_bounds_is_a_display_error() {
        let mut fb = framebuffer();
        assert!(fb.set_pixel(8, 0, 1).is_err());
        assert!(fb.set_pixel(0, 0, 2).is_err());
    }

    /// Panel whose bus has gone away.
    struct DeadPanel;

    #[derive(Debug)]
    struct BusGone;

    impl OriginDimensions for DeadPanel {
        fn size(&self) -> Size {
            Size::new(16, 16)
        }
    }

    impl DrawTarget for DeadPanel {
        type Color = Rgb565;
        type Error = BusGone;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Err(BusGone)
        }

        fn fill_contiguous<I>(&mut self, _area: &Rectangle, _colors: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Self::Color>,
        {
            Err(BusGone)
        }
    }

    #[test]
    fn test_rejected_flush_is_a_display_error() {
        let buffer = PlotBuffer::configure(&PlotConfig::default()).unwrap();
        let mut fb = PaletteFrameBuffer::for_plot(DeadPanel, &buffer, 0);

        assert!(matches!(fb.present(), Err(PlotError::Display { .. })));
    }
}
