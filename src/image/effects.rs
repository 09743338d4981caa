// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Transforms that produce new frames.

[`Image::derive`] returns a new image and leaves `self` alone.
[`Image::transform_in_place`] installs the result in `self`, dropping the old
frames only once the engine has succeeded. The named helpers are shorthands
for [`Image::derive`] with one [`Effect`].
*/

use super::Image;
use crate::attributes::{FilterType, NoiseType};
use crate::engine::{Effect, Engine, NativeFrame};
use crate::error::{Error, Result};
use crate::exception;
use crate::frames::ops;
use crate::geometry::{Geometry, Rectangle};
use crate::info::MontageInfo;
use crate::pixel_formats::PixelPacket;

fn check_effect(effect: &Effect) -> Result<()> {
    let finite = |name: &str, v: f64| {
        if v.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!("{name} must be finite, got {v}")))
        }
    };
    match effect {
        Effect::Blur { radius, sigma }
        | Effect::GaussianBlur { radius, sigma }
        | Effect::Charcoal { radius, sigma }
        | Effect::Emboss { radius, sigma }
        | Effect::Sharpen { radius, sigma } => {
            finite("radius", *radius)?;
            finite("sigma", *sigma)
        }
        Effect::UnsharpMask {
            radius,
            sigma,
            amount,
            threshold,
        } => {
            finite("radius", *radius)?;
            finite("sigma", *sigma)?;
            finite("amount", *amount)?;
            finite("threshold", *threshold)
        }
        Effect::Edge { radius }
        | Effect::MedianFilter { radius }
        | Effect::ReduceNoise { radius }
        | Effect::OilPaint { radius }
        | Effect::Spread { radius } => finite("radius", *radius),
        Effect::Rotate { degrees } | Effect::Swirl { degrees } => finite("degrees", *degrees),
        Effect::Shear { x, y } => {
            finite("x", *x)?;
            finite("y", *y)
        }
        Effect::Convolve { order, kernel } => {
            if *order == 0 || order % 2 == 0 {
                return Err(Error::InvalidArgument(format!("kernel order {order} must be odd")));
            }
            let side = *order as usize;
            if kernel.len() != side * side {
                return Err(Error::InvalidArgument(format!(
                    "kernel of order {order} needs {} weights, got {}",
                    side * side,
                    kernel.len()
                )));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

impl<E: Engine> Image<E> {
    /// Applies `effect` and returns the result as a new image.
    pub fn derive(&self, effect: &Effect) -> Result<Image<E>> {
        let frames = self.list(effect.name())?;
        check_effect(effect)?;
        let out = exception::native(self.engine.as_ref(), effect.name(), |e| {
            e.transform(frames, effect)
        })?;
        Ok(self.derived(out))
    }

    /// Applies `effect` and installs the result in `self`.
    pub fn transform_in_place(&mut self, effect: &Effect) -> Result<()> {
        self.list(effect.name())?;
        check_effect(effect)?;
        self.replace_with(|e, current| match current {
            Some(frames) => exception::native(e, effect.name(), |e| e.transform(frames, effect)),
            None => Err(Error::NoHandle {
                operation: effect.name(),
            }),
        })
    }

    /**
    Crops and then resizes the head frame in place.

    `crop` is a geometry such as `"100x80+10+5"`; `resize` is a size such as
    `"50x40"`, where a missing side keeps the aspect ratio.
    */
    pub fn transform(&mut self, crop: Option<&str>, resize: Option<&str>) -> Result<()> {
        let crop = crop.map(Geometry::parse).transpose()?;
        let resize = resize.map(Geometry::parse).transpose()?;
        if let Some(crop) = crop {
            let (columns, rows) = self.columns_rows("transform")?;
            self.transform_in_place(&Effect::Crop(crop.to_rectangle(columns, rows)))?;
        }
        if let Some(resize) = resize {
            let (columns, rows) = self.columns_rows("transform")?;
            let (width, height) = fit(resize, columns, rows)?;
            self.transform_in_place(&Effect::Resize {
                columns: width,
                rows: height,
                filter: FilterType::Undefined,
                blur: 1.0,
            })?;
        }
        Ok(())
    }

    fn columns_rows(&self, operation: &'static str) -> Result<(u32, u32)> {
        let head = self.head(operation)?;
        Ok((head.columns(), head.rows()))
    }

    /// A deep copy of the whole sequence.
    pub fn clone_image(&self) -> Result<Image<E>> {
        let frames = self.list("clone_image")?;
        let copy = ops::clone_list(self.engine.as_ref(), frames, None, true)?;
        Ok(self.derived(copy))
    }

    /// A copy of every frame at `columns` x `rows`. Without `include_pixels`
    /// the frames are blank, filled with their background colour.
    pub fn clone_sized(&self, columns: u32, rows: u32, include_pixels: bool) -> Result<Image<E>> {
        let frames = self.list("clone_image")?;
        if columns == 0 || rows == 0 {
            return Err(Error::InvalidArgument(format!("cannot clone to {columns}x{rows}")));
        }
        let copy = ops::clone_list(self.engine.as_ref(), frames, Some((columns, rows)), include_pixels)?;
        Ok(self.derived(copy))
    }

    pub fn add_noise(&self, noise: NoiseType) -> Result<Image<E>> {
        self.derive(&Effect::AddNoise {
            noise,
            attenuate: None,
        })
    }

    pub fn add_noise_attenuated(&self, noise: NoiseType, attenuate: f64) -> Result<Image<E>> {
        self.derive(&Effect::AddNoise {
            noise,
            attenuate: Some(attenuate),
        })
    }

    pub fn blur(&self, radius: f64, sigma: f64) -> Result<Image<E>> {
        self.derive(&Effect::Blur { radius, sigma })
    }

    pub fn gaussian_blur(&self, radius: f64, sigma: f64) -> Result<Image<E>> {
        self.derive(&Effect::GaussianBlur { radius, sigma })
    }

    pub fn charcoal(&self, radius: f64, sigma: f64) -> Result<Image<E>> {
        self.derive(&Effect::Charcoal { radius, sigma })
    }

    pub fn edge(&self, radius: f64) -> Result<Image<E>> {
        self.derive(&Effect::Edge { radius })
    }

    pub fn emboss(&self, radius: f64, sigma: f64) -> Result<Image<E>> {
        self.derive(&Effect::Emboss { radius, sigma })
    }

    pub fn sharpen(&self, radius: f64, sigma: f64) -> Result<Image<E>> {
        self.derive(&Effect::Sharpen { radius, sigma })
    }

    pub fn unsharp_mask(&self, radius: f64, sigma: f64, amount: f64, threshold: f64) -> Result<Image<E>> {
        self.derive(&Effect::UnsharpMask {
            radius,
            sigma,
            amount,
            threshold,
        })
    }

    pub fn median_filter(&self, radius: f64) -> Result<Image<E>> {
        self.derive(&Effect::MedianFilter { radius })
    }

    pub fn reduce_noise(&self, radius: f64) -> Result<Image<E>> {
        self.derive(&Effect::ReduceNoise { radius })
    }

    pub fn oil_paint(&self, radius: f64) -> Result<Image<E>> {
        self.derive(&Effect::OilPaint { radius })
    }

    pub fn spread(&self, radius: f64) -> Result<Image<E>> {
        self.derive(&Effect::Spread { radius })
    }

    pub fn despeckle(&self) -> Result<Image<E>> {
        self.derive(&Effect::Despeckle)
    }

    pub fn enhance(&self) -> Result<Image<E>> {
        self.derive(&Effect::Enhance)
    }

    pub fn border(&self, width: u32, height: u32) -> Result<Image<E>> {
        self.derive(&Effect::Border { width, height })
    }

    /// Paints a bevel `width` x `height` wide; `raise` chooses lit or sunken.
    pub fn raise(&self, width: u32, height: u32, raise: bool) -> Result<Image<E>> {
        self.derive(&Effect::Raise { width, height, raise })
    }

    pub fn chop(&self, region: Rectangle) -> Result<Image<E>> {
        self.derive(&Effect::Chop(region))
    }

    pub fn crop(&self, region: Rectangle) -> Result<Image<E>> {
        self.derive(&Effect::Crop(region))
    }

    pub fn colorize(&self, color: PixelPacket, opacity: f64) -> Result<Image<E>> {
        if !(0.0..=100.0).contains(&opacity) {
            return Err(Error::InvalidArgument(format!("opacity {opacity} is not a percentage")));
        }
        self.derive(&Effect::Colorize { color, opacity })
    }

    pub fn flip(&self) -> Result<Image<E>> {
        self.derive(&Effect::Flip)
    }

    pub fn flop(&self) -> Result<Image<E>> {
        self.derive(&Effect::Flop)
    }

    pub fn magnify(&self) -> Result<Image<E>> {
        self.derive(&Effect::Magnify)
    }

    pub fn minify(&self) -> Result<Image<E>> {
        self.derive(&Effect::Minify)
    }

    /// `amount` defaults to 0.5.
    pub fn implode(&self, amount: Option<f64>) -> Result<Image<E>> {
        self.derive(&Effect::Implode {
            amount: amount.unwrap_or(0.5),
        })
    }

    pub fn swirl(&self, degrees: f64) -> Result<Image<E>> {
        self.derive(&Effect::Swirl { degrees })
    }

    pub fn wave(&self, amplitude: f64, wavelength: f64) -> Result<Image<E>> {
        self.derive(&Effect::Wave {
            amplitude,
            wavelength,
        })
    }

    pub fn roll(&self, x: i64, y: i64) -> Result<Image<E>> {
        self.derive(&Effect::Roll { x, y })
    }

    pub fn sample(&self, columns: u32, rows: u32) -> Result<Image<E>> {
        self.derive(&Effect::Sample { columns, rows })
    }

    pub fn scale(&self, columns: u32, rows: u32) -> Result<Image<E>> {
        self.derive(&Effect::Scale { columns, rows })
    }

    pub fn resize(&self, columns: u32, rows: u32, filter: FilterType, blur: f64) -> Result<Image<E>> {
        self.derive(&Effect::Resize {
            columns,
            rows,
            filter,
            blur,
        })
    }

    pub fn zoom(&self, columns: u32, rows: u32) -> Result<Image<E>> {
        self.derive(&Effect::Zoom { columns, rows })
    }

    pub fn rotate(&self, degrees: f64) -> Result<Image<E>> {
        self.derive(&Effect::Rotate { degrees })
    }

    pub fn shear(&self, x: f64, y: f64) -> Result<Image<E>> {
        self.derive(&Effect::Shear { x, y })
    }

    /// Convolves with a square, row-major kernel of side `order`.
    pub fn convolve(&self, order: u32, kernel: &[f64]) -> Result<Image<E>> {
        self.derive(&Effect::Convolve {
            order,
            kernel: kernel.to_vec(),
        })
    }

    /// Removes edges that match the top-left corner colour.
    pub fn trim(&self) -> Result<Image<E>> {
        self.derive(&Effect::Trim)
    }

    /// Composites every frame over the previous ones, honouring dispose.
    pub fn coalesce(&self) -> Result<Image<E>> {
        self.derive(&Effect::Coalesce)
    }

    /// The per-pixel mean of all frames, which must share one size.
    pub fn average(&self) -> Result<Image<E>> {
        self.derive(&Effect::Average)
    }

    /// The changed region of each frame relative to the one before it.
    pub fn deconstruct(&self) -> Result<Image<E>> {
        self.derive(&Effect::Deconstruct)
    }

    /// Tiles the frames onto one or more pages.
    pub fn montage(&self, info: &MontageInfo) -> Result<Image<E>> {
        self.derive(&Effect::Montage(info.clone()))
    }
}

/// Resolves a resize geometry against the current size, keeping the aspect
/// ratio when only one side is given.
fn fit(geometry: Geometry, columns: u32, rows: u32) -> Result<(u32, u32)> {
    let scaled = |num: u32, den: u32, v: u32| {
        ((v as u64 * num as u64 + den as u64 / 2) / den.max(1) as u64).max(1) as u32
    };
    let size = match (geometry.width, geometry.height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scaled(w, columns, rows)),
        (None, Some(h)) => (scaled(h, rows, columns), h),
        (None, None) => (columns, rows),
    };
    if size.0 == 0 || size.1 == 0 {
        return Err(Error::InvalidArgument(format!("cannot resize to {}x{}", size.0, size.1)));
    }
    Ok(size)
}
