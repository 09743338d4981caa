// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Frames of the software engine.

use super::faults::{self, Counters, codes};
use crate::attributes::{
    Attribute, AttributeValue, ColorspaceType, CompressionType, DisposeType, FilterType,
    ImageType, OrientationType, RenderingIntent, ResolutionUnits, StorageClass,
};
use crate::engine::NativeFrame;
use crate::error::NativeFault;
use crate::pixel_formats::{PixelPacket, QUANTUM_MAX};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Scalar fields of a [`SoftFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAttributes {
    pub filter: FilterType,
    pub depth: u32,
    pub compression: CompressionType,
    pub delay: u32,
    pub dispose: DisposeType,
    pub iterations: u32,
    pub units: ResolutionUnits,
    pub x_resolution: f64,
    pub y_resolution: f64,
    pub quality: u32,
    pub rendering_intent: RenderingIntent,
    pub matte: bool,
    pub border_color: PixelPacket,
    pub background_color: PixelPacket,
    pub colorspace: ColorspaceType,
    pub orientation: OrientationType,
    pub filename: String,
    pub magick: String,
    pub fuzz: f64,
}

impl FrameAttributes {
    pub fn with_depth(depth: u32) -> Self {
        FrameAttributes {
            filter: FilterType::Undefined,
            depth,
            compression: CompressionType::Undefined,
            delay: 0,
            dispose: DisposeType::Undefined,
            iterations: 0,
            units: ResolutionUnits::Undefined,
            x_resolution: 72.0,
            y_resolution: 72.0,
            quality: 0,
            rendering_intent: RenderingIntent::Undefined,
            matte: false,
            border_color: PixelPacket::opaque(0xdfdf, 0xdfdf, 0xdfdf),
            background_color: PixelPacket::WHITE,
            colorspace: ColorspaceType::Rgb,
            orientation: OrientationType::Undefined,
            filename: String::new(),
            magick: String::new(),
            fuzz: 0.0,
        }
    }
}

/// One frame: RGBA quanta plus metadata.
pub struct SoftFrame {
    id: u64,
    columns: u32,
    rows: u32,
    pixels: Vec<PixelPacket>,
    pinged: bool,
    pub(crate) attrs: FrameAttributes,
    profiles: BTreeMap<String, Vec<u8>>,
    properties: BTreeMap<String, String>,
    colormap: Option<Vec<PixelPacket>>,
    indexes: Option<Vec<u32>>,
    counters: Arc<Counters>,
}

impl SoftFrame {
    pub(crate) fn from_pixels(
        counters: &Arc<Counters>,
        columns: u32,
        rows: u32,
        pixels: Vec<PixelPacket>,
        attrs: FrameAttributes,
    ) -> Self {
        debug_assert_eq!(pixels.len() as u64, columns as u64 * rows as u64);
        SoftFrame {
            id: counters.frame_created(),
            columns,
            rows,
            pixels,
            pinged: false,
            attrs,
            profiles: BTreeMap::new(),
            properties: BTreeMap::new(),
            colormap: None,
            indexes: None,
            counters: counters.clone(),
        }
    }

    pub(crate) fn blank(
        counters: &Arc<Counters>,
        columns: u32,
        rows: u32,
        fill: PixelPacket,
        attrs: FrameAttributes,
    ) -> Self {
        let len = columns as usize * rows as usize;
        Self::from_pixels(counters, columns, rows, vec![fill; len], attrs)
    }

    /// A frame with dimensions and metadata but no pixels.
    pub(crate) fn pinged(
        counters: &Arc<Counters>,
        columns: u32,
        rows: u32,
        attrs: FrameAttributes,
    ) -> Self {
        let mut frame = Self::from_pixels(counters, 0, 0, Vec::new(), attrs);
        frame.columns = columns;
        frame.rows = rows;
        frame.pinged = true;
        frame
    }

    /// A new frame with this frame's metadata and the given pixels.
    pub(crate) fn derive(&self, columns: u32, rows: u32, pixels: Vec<PixelPacket>) -> SoftFrame {
        let mut frame = SoftFrame::from_pixels(&self.counters, columns, rows, pixels, self.attrs.clone());
        frame.profiles = self.profiles.clone();
        frame.properties = self.properties.clone();
        frame.properties.remove(SIGNATURE_PROPERTY);
        frame
    }

    /// An exact copy under a new id, palette and pinged state included.
    pub(crate) fn duplicate(&self) -> SoftFrame {
        SoftFrame {
            id: self.counters.frame_created(),
            columns: self.columns,
            rows: self.rows,
            pixels: self.pixels.clone(),
            pinged: self.pinged,
            attrs: self.attrs.clone(),
            profiles: self.profiles.clone(),
            properties: self.properties.clone(),
            colormap: self.colormap.clone(),
            indexes: self.indexes.clone(),
            counters: self.counters.clone(),
        }
    }

    /// Unique per engine; never reused.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_pinged(&self) -> bool {
        self.pinged
    }

    pub(crate) fn require_pixels(&self) -> Result<(), NativeFault> {
        if self.pinged {
            return Err(NativeFault::coded(
                codes::IMAGE,
                "pixel data not available for a pinged image",
            ));
        }
        Ok(())
    }

    pub(crate) fn pixels(&self) -> &[PixelPacket] {
        &self.pixels
    }

    /// Mutable pixels. Any palette is dropped: the frame becomes direct class.
    pub(crate) fn pixels_mut(&mut self) -> &mut [PixelPacket] {
        self.colormap = None;
        self.indexes = None;
        self.properties.remove(SIGNATURE_PROPERTY);
        &mut self.pixels
    }

    pub(crate) fn pixel(&self, x: u32, y: u32) -> PixelPacket {
        self.pixels[y as usize * self.columns as usize + x as usize]
    }

    /// Makes the frame pseudo-class: pixels become `colormap[indexes[i]]`.
    pub(crate) fn set_palette(&mut self, colormap: Vec<PixelPacket>, indexes: Vec<u32>) {
        debug_assert_eq!(indexes.len(), self.pixels.len());
        for (pixel, &index) in self.pixels.iter_mut().zip(&indexes) {
            *pixel = colormap[index as usize];
        }
        self.properties.remove(SIGNATURE_PROPERTY);
        self.colormap = Some(colormap);
        self.indexes = Some(indexes);
    }

    pub(crate) fn palette(&self) -> Option<(&[PixelPacket], &[u32])> {
        Some((self.colormap.as_deref()?, self.indexes.as_deref()?))
    }

    pub(crate) fn properties_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.properties
    }

    pub(crate) fn profiles_mut(&mut self) -> &mut BTreeMap<String, Vec<u8>> {
        &mut self.profiles
    }

    pub(crate) fn profiles(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.profiles
    }

    pub(crate) fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub(crate) fn unique_colors(&self) -> BTreeSet<PixelPacket> {
        self.pixels.iter().copied().collect()
    }

    pub(crate) fn is_opaque(&self) -> bool {
        self.pixels.iter().all(|p| p.alpha == QUANTUM_MAX)
    }

    fn image_type(&self) -> ImageType {
        let gray = self.pixels.iter().all(PixelPacket::is_gray);
        let matte = self.attrs.matte && !self.is_opaque();
        if gray
            && !matte
            && self
                .pixels
                .iter()
                .all(|p| p.red == 0 || p.red == QUANTUM_MAX)
        {
            return ImageType::Bilevel;
        }
        match (gray, self.colormap.is_some(), matte) {
            (true, _, false) => ImageType::Grayscale,
            (true, _, true) => ImageType::GrayscaleMatte,
            (false, true, false) => ImageType::Palette,
            (false, true, true) => ImageType::PaletteMatte,
            (false, false, false) => ImageType::TrueColor,
            (false, false, true) => ImageType::TrueColorMatte,
        }
    }
}

pub(crate) const SIGNATURE_PROPERTY: &str = "signature";

/// Euclidean RGBA distance within `fuzz` quanta.
pub(crate) fn similar(a: PixelPacket, b: PixelPacket, fuzz: f64) -> bool {
    if fuzz <= 0.0 {
        return a == b;
    }
    let d = |x: u16, y: u16| {
        let v = x as f64 - y as f64;
        v * v
    };
    let distance = d(a.red, b.red) + d(a.green, b.green) + d(a.blue, b.blue) + d(a.alpha, b.alpha);
    distance.sqrt() <= fuzz
}

impl Drop for SoftFrame {
    fn drop(&mut self) {
        self.counters.frame_destroyed();
    }
}

impl std::fmt::Debug for SoftFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftFrame")
            .field("id", &self.id)
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .field("pinged", &self.pinged)
            .finish_non_exhaustive()
    }
}

fn expect_unsigned(attribute: Attribute, value: &AttributeValue) -> Result<u32, NativeFault> {
    match value {
        AttributeValue::Unsigned(v) => Ok(*v),
        _ => Err(faults::option(format!("{attribute:?} takes an unsigned value"))),
    }
}

fn expect_coded<T>(
    attribute: Attribute,
    value: &AttributeValue,
    from_code: fn(u32) -> Option<T>,
) -> Result<T, NativeFault> {
    let code = expect_unsigned(attribute, value)?;
    from_code(code).ok_or_else(|| faults::option(format!("unrecognized {attribute:?} {code}")))
}

impl NativeFrame for SoftFrame {
    fn columns(&self) -> u32 {
        self.columns
    }

    fn rows(&self) -> u32 {
        self.rows
    }

    fn attribute(&self, attribute: Attribute) -> Result<AttributeValue, NativeFault> {
        let a = &self.attrs;
        Ok(match attribute {
            Attribute::Filter => AttributeValue::Unsigned(a.filter.code()),
            Attribute::Depth => AttributeValue::Unsigned(a.depth),
            Attribute::Compression => AttributeValue::Unsigned(a.compression.code()),
            Attribute::Delay => AttributeValue::Unsigned(a.delay),
            Attribute::Dispose => AttributeValue::Unsigned(a.dispose.code()),
            Attribute::Iterations => AttributeValue::Unsigned(a.iterations),
            Attribute::Colors => {
                AttributeValue::Unsigned(self.colormap.as_ref().map_or(0, |c| c.len() as u32))
            }
            Attribute::TotalColors => {
                self.require_pixels()?;
                AttributeValue::Unsigned(self.unique_colors().len() as u32)
            }
            Attribute::Units => AttributeValue::Unsigned(a.units.code()),
            Attribute::XResolution => AttributeValue::Real(a.x_resolution),
            Attribute::YResolution => AttributeValue::Real(a.y_resolution),
            Attribute::Quality => AttributeValue::Unsigned(a.quality),
            Attribute::RenderingIntent => AttributeValue::Unsigned(a.rendering_intent.code()),
            Attribute::Matte => AttributeValue::Flag(a.matte),
            Attribute::BorderColor => AttributeValue::Color(a.border_color),
            Attribute::BackgroundColor => AttributeValue::Color(a.background_color),
            Attribute::Colorspace => AttributeValue::Unsigned(a.colorspace.code()),
            Attribute::Orientation => AttributeValue::Unsigned(a.orientation.code()),
            Attribute::FileName => AttributeValue::Text(a.filename.clone()),
            Attribute::Magick => AttributeValue::Text(a.magick.clone()),
            Attribute::StorageClass => AttributeValue::Unsigned(if self.colormap.is_some() {
                StorageClass::Pseudo.code()
            } else {
                StorageClass::Direct.code()
            }),
            Attribute::ImageType => {
                self.require_pixels()?;
                AttributeValue::Unsigned(self.image_type().code())
            }
            Attribute::Fuzz => AttributeValue::Real(a.fuzz),
        })
    }

    fn set_attribute(
        &mut self,
        attribute: Attribute,
        value: AttributeValue,
    ) -> Result<(), NativeFault> {
        let a = &mut self.attrs;
        match (attribute, &value) {
            (Attribute::Filter, v) => a.filter = expect_coded(attribute, v, FilterType::from_code)?,
            (Attribute::Depth, v) => {
                let depth = expect_unsigned(attribute, v)?;
                if !matches!(depth, 1 | 2 | 4 | 8 | 16) {
                    return Err(faults::option(format!("unsupported depth {depth}")));
                }
                a.depth = depth;
            }
            (Attribute::Compression, v) => {
                a.compression = expect_coded(attribute, v, CompressionType::from_code)?
            }
            (Attribute::Delay, v) => a.delay = expect_unsigned(attribute, v)?,
            (Attribute::Dispose, v) => a.dispose = expect_coded(attribute, v, DisposeType::from_code)?,
            (Attribute::Iterations, v) => a.iterations = expect_unsigned(attribute, v)?,
            (Attribute::Colors, v) => {
                let colors = expect_unsigned(attribute, v)? as usize;
                match (&mut self.colormap, &self.indexes) {
                    (Some(map), Some(indexes))
                        if colors > 0
                            && colors <= map.len()
                            && indexes.iter().all(|&i| (i as usize) < colors) =>
                    {
                        map.truncate(colors)
                    }
                    _ => {
                        return Err(faults::option(format!(
                            "cannot set colors to {colors} without a palette that holds them"
                        )));
                    }
                }
            }
            (Attribute::Units, v) => a.units = expect_coded(attribute, v, ResolutionUnits::from_code)?,
            (Attribute::XResolution, AttributeValue::Real(r)) => a.x_resolution = *r,
            (Attribute::YResolution, AttributeValue::Real(r)) => a.y_resolution = *r,
            (Attribute::Fuzz, AttributeValue::Real(r)) => a.fuzz = r.max(0.0),
            (Attribute::Quality, v) => a.quality = expect_unsigned(attribute, v)?.min(100),
            (Attribute::RenderingIntent, v) => {
                a.rendering_intent = expect_coded(attribute, v, RenderingIntent::from_code)?
            }
            (Attribute::Matte, AttributeValue::Flag(m)) => a.matte = *m,
            (Attribute::BorderColor, AttributeValue::Color(c)) => a.border_color = *c,
            (Attribute::BackgroundColor, AttributeValue::Color(c)) => a.background_color = *c,
            (Attribute::Colorspace, v) => {
                a.colorspace = expect_coded(attribute, v, ColorspaceType::from_code)?
            }
            (Attribute::Orientation, v) => {
                a.orientation = expect_coded(attribute, v, OrientationType::from_code)?
            }
            (Attribute::FileName, AttributeValue::Text(t)) => a.filename = t.clone(),
            (Attribute::Magick, AttributeValue::Text(t)) => a.magick = t.to_ascii_uppercase(),
            (Attribute::TotalColors | Attribute::StorageClass | Attribute::ImageType, _) => {
                return Err(faults::option(format!("{attribute:?} is read-only")));
            }
            (_, other) => {
                return Err(faults::option(format!(
                    "{attribute:?} cannot hold {:?}",
                    other.kind()
                )));
            }
        }
        Ok(())
    }

    fn profile(&self, name: &str) -> Option<&[u8]> {
        self.profiles.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }

    fn set_profile(&mut self, name: &str, data: Option<&[u8]>) -> Result<(), NativeFault> {
        if name.is_empty() {
            return Err(faults::option("profile name is empty"));
        }
        let key = name.to_ascii_lowercase();
        match data {
            Some(bytes) if !bytes.is_empty() => {
                self.profiles.insert(key, bytes.to_vec());
            }
            _ => {
                self.profiles.remove(&key);
            }
        }
        Ok(())
    }

    fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    fn property(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn set_property(&mut self, name: &str, value: &str) -> Result<(), NativeFault> {
        if name.is_empty() {
            return Err(faults::option("property name is empty"));
        }
        self.properties.insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    fn colormap(&self) -> Option<&[PixelPacket]> {
        self.colormap.as_deref()
    }
}
