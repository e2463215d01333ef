//! Slice rendering.
//!
//! A [`Chef`] turns planned [`Slice`]s into pixels. [`CanvasChef`] is the
//! in-process renderer built on `image`; other backends (GPU, remote) can
//! implement the same trait.

use image::{imageops, GenericImageView, RgbaImage};

use crate::cancel::CancelSignal;
use crate::carving::{Chunk, Slice};
use crate::error::Result;
use crate::source::ImageSource;

/// Renders planned slices into images.
pub trait Chef {
    /// Render every slice in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`](crate::Error::Cancelled) when `signal` fires,
    /// or the first decode error from a source.
    fn cook<S: ImageSource + Sync>(
        &self,
        slices: &[Slice<'_, S>],
        signal: &dyn CancelSignal,
    ) -> Result<Vec<RgbaImage>>;
}

/// Composites chunks onto a transparent RGBA canvas.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasChef;

impl CanvasChef {
    /// Render a single slice.
    ///
    /// # Errors
    ///
    /// See [`Chef::cook`].
    pub fn render_slice<S: ImageSource>(
        &self,
        slice: &Slice<'_, S>,
        signal: &dyn CancelSignal,
    ) -> Result<RgbaImage> {
        let mut canvas = RgbaImage::new(slice.width, slice.height);
        for chunk in &slice.chunks {
            signal.check()?;
            draw_chunk(&mut canvas, chunk)?;
        }
        Ok(canvas)
    }
}

impl Chef for CanvasChef {
    fn cook<S: ImageSource + Sync>(
        &self,
        slices: &[Slice<'_, S>],
        signal: &dyn CancelSignal,
    ) -> Result<Vec<RgbaImage>> {
        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            slices
                .par_iter()
                .map(|slice| self.render_slice(slice, signal))
                .collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            slices
                .iter()
                .map(|slice| self.render_slice(slice, signal))
                .collect()
        }
    }
}

/// Copy one chunk's source rectangle onto `canvas`, clipping at the canvas edge.
fn draw_chunk<S: ImageSource>(canvas: &mut RgbaImage, chunk: &Chunk<'_, S>) -> Result<()> {
    let pixels = chunk.source.decode()?;
    let region = pixels
        .view(chunk.src_x, chunk.src_y, chunk.src_width, chunk.src_height)
        .to_image();
    imageops::replace(
        canvas,
        &region,
        i64::from(chunk.dst_x),
        i64::from(chunk.dst_y),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::NeverCancel;
    use crate::carving::cut;
    use crate::error::Error;
    use image::Rgba;
    use std::sync::atomic::AtomicBool;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn renders_chunks_across_sources() {
        let stack = [solid(4, 3, 10), solid(4, 3, 20)];
        let slices = cut(&stack, &[2]).unwrap();
        let images = CanvasChef.cook(&slices, &NeverCancel).unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].dimensions(), (4, 2));
        assert_eq!(images[1].dimensions(), (4, 4));
        let column: Vec<u8> = (0..4).map(|y| images[1].get_pixel(0, y)[0]).collect();
        assert_eq!(column, vec![10, 20, 20, 20]);
    }

    #[test]
    fn wider_sources_are_clipped() {
        let stack = [solid(2, 2, 10), solid(5, 2, 20)];
        let slices = cut(&stack, &[]).unwrap();
        let images = CanvasChef.cook(&slices, &NeverCancel).unwrap();
        assert_eq!(images[0].dimensions(), (2, 4));
        assert_eq!(images[0].get_pixel(1, 3)[0], 20);
    }

    #[test]
    fn cancellation_aborts_rendering() {
        let stack = [solid(4, 3, 10)];
        let slices = cut(&stack, &[]).unwrap();
        let cancelled = AtomicBool::new(true);
        assert!(matches!(
            CanvasChef.cook(&slices, &cancelled),
            Err(Error::Cancelled)
        ));
    }
}
