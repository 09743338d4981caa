// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel import and export, single pixels and the colormap.

use super::Image;
use crate::engine::{Effect, Engine, NativeFrame};
use crate::error::{Error, Result};
use crate::geometry::Rectangle;
use crate::marshal;
use crate::pixel_formats::{ComponentMap, Element, PixelPacket};
use std::sync::Arc;

impl<E: Engine> Image<E> {
    /**
    Builds a one-frame image from interleaved pixels.

    `map` names the components of each pixel in order, e.g. `"RGB"` or
    `"BGRA"`. `pixels` must hold at least `width * height * map.len()`
    elements; a shorter slice fails before the engine is called.
    */
    pub fn from_pixels<T: Element>(
        engine: Arc<E>,
        width: u32,
        height: u32,
        map: &str,
        pixels: &[T],
    ) -> Result<Self> {
        let map = ComponentMap::parse(map)?;
        let frames = marshal::import_pixels(engine.as_ref(), width, height, &map, pixels)?;
        Ok(Image::adopt(engine, frames))
    }

    /// Replaces the frames with one built from interleaved pixels.
    pub fn constitute<T: Element>(
        &mut self,
        width: u32,
        height: u32,
        map: &str,
        pixels: &[T],
    ) -> Result<()> {
        let map = ComponentMap::parse(map)?;
        self.replace_with(|e, _| marshal::import_pixels(e, width, height, &map, pixels))
    }

    /// Copies a region of the head frame into `out`, which is never resized.
    pub fn dispatch<T: Element>(
        &self,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        map: &str,
        out: &mut [T],
    ) -> Result<()> {
        let head = self.head("dispatch")?;
        let map = ComponentMap::parse(map)?;
        let region = Rectangle::new(x, y, width, height);
        marshal::export_pixels(self.engine.as_ref(), head, region, &map, out)
    }

    /// The pixel at `(x, y)`. Coordinates outside the frame read the
    /// background colour.
    pub fn one_pixel(&self, x: i64, y: i64) -> Result<PixelPacket> {
        self.with_head("one_pixel", |e, head| e.one_pixel(head, x, y))
    }

    /// The palette of a pseudo-class head frame, or `None` for direct class.
    pub fn colormap(&self) -> Result<Option<Vec<PixelPacket>>> {
        Ok(self.head("colormap")?.colormap().map(<[_]>::to_vec))
    }

    pub fn colormap_entry(&self, index: usize) -> Result<PixelPacket> {
        let head = self.head("colormap_entry")?;
        let colormap = head.colormap().unwrap_or_default();
        colormap.get(index).copied().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "colormap index {index} out of range for {} entries",
                colormap.len()
            ))
        })
    }

    /// A one-row image with one pixel per distinct colour of the head frame.
    pub fn unique_colors(&self) -> Result<Image<E>> {
        self.derive(&Effect::UniqueColors)
    }

    /// Number of distinct colours in the head frame.
    pub fn total_colors(&self) -> Result<u64> {
        let analysis = self.with_head("total_colors", |e, head| e.analyze(head))?;
        Ok(analysis.unique_colors)
    }

    /// Copies the head frame into a new vector.
    pub fn to_pixels<T: Element>(&self, map: &str) -> Result<Vec<T>> {
        let head = self.head("to_pixels")?;
        let map = ComponentMap::parse(map)?;
        let (columns, rows) = (head.columns(), head.rows());
        let mut out = vec![T::default(); marshal::required_len(columns, rows, &map)?];
        marshal::export_pixels(
            self.engine.as_ref(),
            head,
            Rectangle::full(columns, rows),
            &map,
            &mut out,
        )?;
        Ok(out)
    }
}
