//! Source images and the image stack abstraction.
//!
//! The core never owns pixels. It sees each page through [`Dimensions`]
//! (enough for planning) and [`ImageSource`] (enough for sampling and
//! rendering), and decodes on demand.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::{Error, Result};

/// Immutable size of a source image.
pub trait Dimensions {
    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
}

/// A source image that can produce its RGBA pixels on demand.
pub trait ImageSource: Dimensions {
    /// Decode the full image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] (or [`Error::Io`]) when the pixels cannot be produced.
    fn decode(&self) -> Result<Cow<'_, RgbaImage>>;
}

impl Dimensions for (u32, u32) {
    fn width(&self) -> u32 {
        self.0
    }

    fn height(&self) -> u32 {
        self.1
    }
}

impl Dimensions for RgbaImage {
    fn width(&self) -> u32 {
        RgbaImage::width(self)
    }

    fn height(&self) -> u32 {
        RgbaImage::height(self)
    }
}

impl ImageSource for RgbaImage {
    fn decode(&self) -> Result<Cow<'_, RgbaImage>> {
        Ok(Cow::Borrowed(self))
    }
}

impl<T: Dimensions + ?Sized> Dimensions for &T {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }
}

impl<T: ImageSource + ?Sized> ImageSource for &T {
    fn decode(&self) -> Result<Cow<'_, RgbaImage>> {
        (**self).decode()
    }
}

/// An image file on disk whose dimensions are read from its header.
///
/// Pixels are decoded again on every [`decode`](ImageSource::decode) call; the
/// file is not kept in memory between uses.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl FileSource {
    /// Probe `path` for its dimensions without decoding pixel data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the header cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (width, height) = image::image_dimensions(&path).map_err(Error::Decode)?;
        Ok(Self {
            path,
            width,
            height,
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Dimensions for FileSource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl ImageSource for FileSource {
    fn decode(&self) -> Result<Cow<'_, RgbaImage>> {
        let img = image::open(&self.path).map_err(Error::Decode)?;
        Ok(Cow::Owned(img.to_rgba8()))
    }
}

/// Sum of member heights.
///
/// Fails with [`Error::StackTooTall`] if the sum does not fit in a `u32`.
pub(crate) fn total_height<S: Dimensions>(sources: &[S]) -> Result<u32> {
    sources.iter().enumerate().try_fold(0u32, |total, (index, source)| {
        total
            .checked_add(source.height())
            .ok_or(Error::StackTooTall { index })
    })
}

/// Global Y offset of each member in a vertically concatenated stack, plus
/// the total height.
///
/// Fails with [`Error::StackTooTall`] if the sum does not fit in a `u32`.
pub(crate) fn stack_offsets<S: Dimensions>(sources: &[S]) -> Result<(Vec<u32>, u32)> {
    let mut offsets = Vec::with_capacity(sources.len());
    let mut current = 0u32;
    for (index, source) in sources.iter().enumerate() {
        offsets.push(current);
        current = current
            .checked_add(source.height())
            .ok_or(Error::StackTooTall { index })?;
    }
    Ok((offsets, current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate_heights() {
        let stack = [(100, 200), (100, 300), (100, 250)];
        assert_eq!(stack_offsets(&stack).unwrap(), (vec![0, 200, 500], 750));
        assert_eq!(total_height(&stack).unwrap(), 750);
    }

    #[test]
    fn overflowing_stack_is_rejected() {
        let stack = [(10, 5), (10, u32::MAX - 10), (10, 6), (10, 1)];
        assert!(matches!(
            total_height(&stack),
            Err(Error::StackTooTall { index: 2 })
        ));
        assert!(matches!(
            stack_offsets(&stack),
            Err(Error::StackTooTall { index: 2 })
        ));

        let exact = [(10, u32::MAX - 5), (10, 5)];
        assert_eq!(total_height(&exact).unwrap(), u32::MAX);
    }

    #[test]
    fn in_memory_image_decodes_borrowed() {
        let img = RgbaImage::new(4, 3);
        let decoded = img.decode().unwrap();
        assert!(matches!(decoded, Cow::Borrowed(_)));
        assert_eq!(Dimensions::height(&img), 3);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let err = FileSource::open("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
