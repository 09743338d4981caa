// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Moving pixel buffers across the engine boundary.
//!
//! Both directions check the caller's slice against
//! `width * height * map.len()` before any engine call. The product is computed
//! in `u128`, so it cannot wrap for any `u32` dimensions; a product that does not
//! fit in `usize` is itself an invalid argument.
//!
//! The slice is borrowed for the duration of the engine call and released when
//! the call returns, whatever the outcome.

use crate::engine::{Engine, Frames};
use crate::error::{Error, Result};
use crate::exception;
use crate::frames::FrameList;
use crate::geometry::Rectangle;
use crate::pixel_formats::{ComponentMap, Element};

/// Number of elements needed for a `width` x `height` region in `map` layout.
///
/// ```
/// use frames_and_handles::marshal::required_len;
/// use frames_and_handles::pixel_formats::ComponentMap;
/// let rgb = ComponentMap::parse("RGB").unwrap();
/// assert_eq!(required_len(2, 2, &rgb).unwrap(), 12);
/// ```
pub fn required_len(width: u32, height: u32, map: &ComponentMap) -> Result<usize> {
    let needed = width as u128 * height as u128 * map.len() as u128;
    usize::try_from(needed).map_err(|_| {
        Error::invalid(format!(
            "{width}x{height} {map} needs {needed} elements, more than addressable"
        ))
    })
}

fn check_len(width: u32, height: u32, map: &ComponentMap, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid(format!("empty region {width}x{height}")));
    }
    let needed = required_len(width, height, map)?;
    if len < needed {
        return Err(Error::invalid(format!(
            "pixel buffer holds {len} elements, {width}x{height} {map} needs {needed}"
        )));
    }
    Ok(())
}

/// Builds a one-frame list from interleaved pixels.
pub fn import_pixels<E: Engine, T: Element>(
    engine: &E,
    width: u32,
    height: u32,
    map: &ComponentMap,
    pixels: &[T],
) -> Result<Frames<E>> {
    check_len(width, height, map, pixels.len())?;
    let frame = exception::native(engine, "constitute", |e| {
        e.constitute(width, height, map, T::wrap(pixels))
    })?;
    Ok(FrameList::single(frame))
}

/// Writes `region` of `frame` into `out`, which is never resized.
pub fn export_pixels<E: Engine, T: Element>(
    engine: &E,
    frame: &E::Frame,
    region: Rectangle,
    map: &ComponentMap,
    out: &mut [T],
) -> Result<()> {
    use crate::engine::NativeFrame;
    check_len(region.width, region.height, map, out.len())?;
    if !region.fits_within(frame.columns(), frame.rows()) {
        return Err(Error::invalid(format!(
            "region {region:?} outside {}x{} frame",
            frame.columns(),
            frame.rows()
        )));
    }
    exception::native(engine, "dispatch", |e| {
        e.export(frame, region, map, T::wrap_mut(out))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widened_arithmetic() {
        let rgba = ComponentMap::parse("RGBA").unwrap();
        let needed = required_len(u32::MAX, u32::MAX, &rgba);
        if usize::BITS >= 128 {
            assert!(needed.is_ok());
        } else {
            assert!(matches!(needed, Err(Error::InvalidArgument(_))));
        }
        assert_eq!(required_len(65536, 65536, &rgba).unwrap(), 1 << 34);
    }

    #[test]
    fn short_buffers_rejected() {
        let rgb = ComponentMap::parse("RGB").unwrap();
        assert!(check_len(2, 2, &rgb, 12).is_ok());
        assert!(matches!(check_len(2, 2, &rgb, 11), Err(Error::InvalidArgument(_))));
        assert!(matches!(check_len(0, 2, &rgb, 100), Err(Error::InvalidArgument(_))));
    }

    #[cfg(feature = "backend_soft")]
    #[test]
    fn undersized_import_skips_engine() {
        use crate::imp::soft::{SoftConfig, SoftEngine};
        let engine = SoftEngine::new(SoftConfig::default());
        let rgb = ComponentMap::parse("RGB").unwrap();
        let err = import_pixels(&engine, 2, 2, &rgb, &[0u8; 11]).unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(engine.counters().native_calls(), 0);
    }
}
