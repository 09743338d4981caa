// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Operations that change the head frame in place.

use super::Image;
use crate::attributes::{ColorspaceType, CompositeOperator};
use crate::engine::{Adjustment, Analysis, Engine};
use crate::error::{Error, Result};
use crate::geometry::Rectangle;
use crate::info::{DrawInfo, QuantizeInfo};
use crate::pixel_formats::{PixelPacket, QUANTUM_MAX};

fn check_adjustment(adjustment: &Adjustment) -> Result<()> {
    let bad = |what: String| Err(Error::InvalidArgument(what));
    match adjustment {
        Adjustment::Gamma(g) if !(g.is_finite() && *g > 0.0) => bad(format!("gamma {g} must be positive")),
        Adjustment::Level { black, white, gamma }
            if !(black.is_finite() && white.is_finite() && gamma.is_finite()) =>
        {
            bad(format!("levels {black},{white},{gamma} must be finite"))
        }
        Adjustment::Modulate {
            brightness,
            saturation,
            hue,
        } if !(brightness.is_finite() && saturation.is_finite() && hue.is_finite()) => {
            bad("modulate percentages must be finite".into())
        }
        Adjustment::Solarize { threshold } | Adjustment::Threshold { threshold }
            if !threshold.is_finite() =>
        {
            bad(format!("threshold {threshold} must be finite"))
        }
        _ => Ok(()),
    }
}

impl<E: Engine> Image<E> {
    /// Applies `adjustment` to the head frame.
    pub fn adjust(&mut self, adjustment: &Adjustment) -> Result<()> {
        self.list(adjustment.name())?;
        check_adjustment(adjustment)?;
        self.with_head_mut(adjustment.name(), |e, head| e.adjust(head, adjustment))
    }

    /// Increases contrast when `sharpen`, otherwise reduces it.
    pub fn contrast(&mut self, sharpen: bool) -> Result<()> {
        self.adjust(&Adjustment::Contrast { sharpen })
    }

    pub fn equalize(&mut self) -> Result<()> {
        self.adjust(&Adjustment::Equalize)
    }

    pub fn gamma(&mut self, gamma: f64) -> Result<()> {
        self.adjust(&Adjustment::Gamma(gamma))
    }

    /// Maps `black`..`white` (as fractions of full scale) onto the full range.
    pub fn level(&mut self, black: f64, white: f64, gamma: f64) -> Result<()> {
        let q = QUANTUM_MAX as f64;
        self.adjust(&Adjustment::Level {
            black: black * q,
            white: white * q,
            gamma,
        })
    }

    pub fn negate(&mut self, grayscale: bool) -> Result<()> {
        self.adjust(&Adjustment::Negate { grayscale })
    }

    pub fn normalize(&mut self) -> Result<()> {
        self.adjust(&Adjustment::Normalize)
    }

    pub fn modulate(&mut self, brightness: f64, saturation: f64, hue: f64) -> Result<()> {
        self.adjust(&Adjustment::Modulate {
            brightness,
            saturation,
            hue,
        })
    }

    pub fn solarize(&mut self, threshold: f64) -> Result<()> {
        self.adjust(&Adjustment::Solarize { threshold })
    }

    pub fn threshold(&mut self, threshold: f64) -> Result<()> {
        self.adjust(&Adjustment::Threshold { threshold })
    }

    pub fn opaque(&mut self, target: PixelPacket, fill: PixelPacket) -> Result<()> {
        self.adjust(&Adjustment::Opaque { target, fill })
    }

    pub fn transparent(&mut self, color: PixelPacket, alpha: u16) -> Result<()> {
        self.adjust(&Adjustment::Transparent { color, alpha })
    }

    /// Removes profiles and comments.
    pub fn strip(&mut self) -> Result<()> {
        self.adjust(&Adjustment::Strip)
    }

    pub fn cycle_colormap(&mut self, amount: i32) -> Result<()> {
        self.adjust(&Adjustment::CycleColormap { amount })
    }

    pub fn sort_colormap(&mut self) -> Result<()> {
        self.adjust(&Adjustment::SortColormap)
    }

    pub fn transform_colorspace(&mut self, colorspace: ColorspaceType) -> Result<()> {
        self.adjust(&Adjustment::TransformColorspace(colorspace))
    }

    /// Composites the head of `source` onto the head of `self` at `(x, y)`.
    pub fn composite(
        &mut self,
        operator: CompositeOperator,
        source: &Image<E>,
        x: i64,
        y: i64,
    ) -> Result<()> {
        self.list("composite")?;
        let source = source.head("composite")?;
        self.with_head_mut("composite", |e, head| e.composite(head, operator, source, x, y))
    }

    /// Reduces the head frame to a palette of at most `info.number_colors`.
    pub fn quantize(&mut self, info: &QuantizeInfo) -> Result<()> {
        self.list("quantize")?;
        if info.number_colors == 0 {
            return Err(Error::InvalidArgument("number_colors must be positive".into()));
        }
        self.with_head_mut("quantize", |e, head| e.quantize(head, info))
    }

    pub fn draw(&mut self, info: &DrawInfo) -> Result<()> {
        self.list("draw")?;
        if info.primitive.trim().is_empty() {
            return Err(Error::InvalidArgument("no drawing primitive".into()));
        }
        self.with_head_mut("draw", |e, head| e.draw(head, info))
    }

    /// A hex digest of the head frame's pixels.
    pub fn signature(&mut self) -> Result<String> {
        self.with_head_mut("signature", |e, head| e.signature(head))
    }

    pub fn analyze(&self) -> Result<Analysis> {
        self.with_head("analyze", |e, head| e.analyze(head))
    }

    pub fn is_gray(&self) -> Result<bool> {
        Ok(self.analyze()?.gray)
    }

    pub fn is_monochrome(&self) -> Result<bool> {
        Ok(self.analyze()?.monochrome)
    }

    pub fn is_opaque(&self) -> Result<bool> {
        Ok(self.analyze()?.opaque)
    }

    /// The region that differs from the top-left corner colour.
    pub fn bounding_box(&self) -> Result<Rectangle> {
        Ok(self.analyze()?.bounding_box)
    }
}

#[cfg(all(test, feature = "backend_soft"))]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::imp::soft::{FaultPlan, SoftConfig, SoftEngine};
    use std::sync::Arc;

    fn engine() -> Arc<SoftEngine> {
        Arc::new(SoftEngine::new(SoftConfig::default()))
    }

    #[test]
    fn negate_in_place_keeps_generation() {
        let engine = engine();
        let mut img = Image::from_pixels(engine, 1, 1, "RGB", &[0u8, 100, 255]).unwrap();
        let generation = img.generation();
        img.negate(false).unwrap();
        assert_eq!(img.to_pixels::<u8>("RGB").unwrap(), vec![255, 155, 0]);
        assert_eq!(img.generation(), generation);
    }

    #[test]
    fn invalid_gamma_is_precondition() {
        let engine = engine();
        let mut img = Image::from_pixels(engine.clone(), 1, 1, "RGB", &[0u8; 3]).unwrap();
        let calls = engine.counters().native_calls();
        assert!(matches!(img.gamma(-1.0), Err(Error::InvalidArgument(_))));
        assert!(matches!(img.gamma(f64::NAN), Err(Error::InvalidArgument(_))));
        assert_eq!(engine.counters().native_calls(), calls);
    }

    #[test]
    fn composite_over() {
        let engine = engine();
        let mut dest = Image::from_pixels(engine.clone(), 2, 1, "RGB", &[0u8; 6]).unwrap();
        let src = Image::from_pixels(engine, 1, 1, "RGB", &[255u8, 255, 255]).unwrap();
        dest.composite(CompositeOperator::Over, &src, 1, 0).unwrap();
        assert_eq!(dest.to_pixels::<u8>("R").unwrap(), vec![0, 255]);
        let empty = Image::new(dest.engine().clone());
        assert!(matches!(
            dest.composite(CompositeOperator::Over, &empty, 0, 0),
            Err(Error::NoHandle { .. })
        ));
    }

    #[test]
    fn draw_and_analyze() {
        let engine = engine();
        let mut img = Image::from_pixels(engine.clone(), 3, 3, "I", &[255u8; 9]).unwrap();
        assert!(img.is_gray().unwrap());
        img.draw(&DrawInfo::new("point 1,1")).unwrap();
        assert_eq!(img.bounding_box().unwrap(), Rectangle::new(1, 1, 1, 1));
        assert!(img.is_monochrome().unwrap());
        assert!(img.is_opaque().unwrap());
        engine.inject("draw", FaultPlan::once(Severity::Error, 460, "bad primitive"));
        assert!(matches!(
            img.draw(&DrawInfo::new("point 0,0")),
            Err(Error::NativeOperationFailed { code: 460, .. })
        ));
    }

    #[test]
    fn signature_changes_with_pixels() {
        let engine = engine();
        let mut img = Image::from_pixels(engine, 2, 1, "RGB", &[1u8, 2, 3, 4, 5, 6]).unwrap();
        let first = img.signature().unwrap();
        assert_eq!(img.signature().unwrap(), first);
        img.negate(false).unwrap();
        assert_ne!(img.signature().unwrap(), first);
    }
}
