// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Type-safe element kinds and component maps for pixel transfer.
//!
//! Pixel buffers cross the engine boundary as raw, component-interleaved
//! slices. Two things describe such a buffer:
//!
//! - the **element kind**, which is the Rust element type of the slice
//!   (`u8`, `u16`, `u32`, `u64`, `f32` or `f64`), and
//! - the **component map**, a short string such as `"RGB"` or `"RGBA"` naming
//!   the channels stored for each pixel, in order.
//!
//! # Design Philosophy
//!
//! Element kinds are expressed as a sealed trait over the primitive types rather
//! than as a runtime enum the caller passes next to a `&[u8]`. This way the
//! element width can never disagree with the buffer, and only the kinds listed
//! here can reach an engine.
//!
//! # Quantum scaling
//!
//! Engines store channels as 16-bit quanta (`0..=65535`). Each element kind
//! knows how to scale to and from a quantum:
//!
//! | Kind  | Range                   | Scaling                          |
//! |-------|-------------------------|----------------------------------|
//! | `u8`  | `0..=255`               | `q / 257`                        |
//! | `u16` | `0..=65535`             | identity                         |
//! | `u32` | `0..=u32::MAX`          | `q * 65537`                      |
//! | `u64` | `0..=u64::MAX`          | `q * 0x0001_0001_0001_0001`      |
//! | `f32` | `0.0..=1.0`             | `q / 65535`                      |
//! | `f64` | `0.0..=1.0`             | `q / 65535`                      |
//!
//! ```
//! use frames_and_handles::pixel_formats::Element;
//!
//! assert_eq!(<u8 as Element>::from_quantum(65535), 255);
//! assert_eq!(<u8 as Element>::to_quantum(128), 128 * 257);
//! assert_eq!(<f32 as Element>::from_quantum(0), 0.0);
//! ```

use crate::error::{Error, Result};
use std::fmt::{Debug, Display};

/// Largest value of a 16-bit channel quantum.
pub const QUANTUM_MAX: u16 = u16::MAX;

/// Sealed marker so that only the element kinds defined here implement [`Element`].
pub(crate) mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Storage type of a pixel buffer element, as engines understand it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// 8-bit unsigned (`CharPixel`).
    Char,
    /// 16-bit unsigned (`ShortPixel`).
    Short,
    /// 32-bit unsigned (`IntegerPixel`).
    Int,
    /// 64-bit unsigned (`LongPixel`).
    Long,
    /// 32-bit float (`FloatPixel`).
    Float,
    /// 64-bit float (`DoublePixel`).
    Double,
}

impl StorageKind {
    /// Width of one element in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            StorageKind::Char => 1,
            StorageKind::Short => 2,
            StorageKind::Int | StorageKind::Float => 4,
            StorageKind::Long | StorageKind::Double => 8,
        }
    }
}

/// A primitive that can be used as a pixel buffer element.
///
/// This trait is sealed and cannot be implemented outside this crate.
pub trait Element: sealed::Sealed + Copy + Debug + Default + PartialEq + Send + Sync + 'static {
    /// The storage kind engines see for this element.
    const KIND: StorageKind;

    /// Scales a 16-bit quantum into this element's range.
    fn from_quantum(q: u16) -> Self;

    /// Scales this element into a 16-bit quantum, clamping out-of-range values.
    fn to_quantum(self) -> u16;

    #[doc(hidden)]
    fn wrap(slice: &[Self]) -> PixelData<'_>;

    #[doc(hidden)]
    fn wrap_mut(slice: &mut [Self]) -> PixelDataMut<'_>;
}

impl Element for u8 {
    const KIND: StorageKind = StorageKind::Char;
    fn from_quantum(q: u16) -> Self {
        ((q as u32 + 128) / 257) as u8
    }
    fn to_quantum(self) -> u16 {
        self as u16 * 257
    }
    fn wrap(slice: &[Self]) -> PixelData<'_> {
        PixelData::Char(slice)
    }
    fn wrap_mut(slice: &mut [Self]) -> PixelDataMut<'_> {
        PixelDataMut::Char(slice)
    }
}

impl Element for u16 {
    const KIND: StorageKind = StorageKind::Short;
    fn from_quantum(q: u16) -> Self {
        q
    }
    fn to_quantum(self) -> u16 {
        self
    }
    fn wrap(slice: &[Self]) -> PixelData<'_> {
        PixelData::Short(slice)
    }
    fn wrap_mut(slice: &mut [Self]) -> PixelDataMut<'_> {
        PixelDataMut::Short(slice)
    }
}

impl Element for u32 {
    const KIND: StorageKind = StorageKind::Int;
    fn from_quantum(q: u16) -> Self {
        q as u32 * 65537
    }
    fn to_quantum(self) -> u16 {
        (self >> 16) as u16
    }
    fn wrap(slice: &[Self]) -> PixelData<'_> {
        PixelData::Int(slice)
    }
    fn wrap_mut(slice: &mut [Self]) -> PixelDataMut<'_> {
        PixelDataMut::Int(slice)
    }
}

impl Element for u64 {
    const KIND: StorageKind = StorageKind::Long;
    fn from_quantum(q: u16) -> Self {
        q as u64 * 0x0001_0001_0001_0001
    }
    fn to_quantum(self) -> u16 {
        (self >> 48) as u16
    }
    fn wrap(slice: &[Self]) -> PixelData<'_> {
        PixelData::Long(slice)
    }
    fn wrap_mut(slice: &mut [Self]) -> PixelDataMut<'_> {
        PixelDataMut::Long(slice)
    }
}

impl Element for f32 {
    const KIND: StorageKind = StorageKind::Float;
    fn from_quantum(q: u16) -> Self {
        q as f32 / QUANTUM_MAX as f32
    }
    fn to_quantum(self) -> u16 {
        (self * QUANTUM_MAX as f32).round().clamp(0.0, QUANTUM_MAX as f32) as u16
    }
    fn wrap(slice: &[Self]) -> PixelData<'_> {
        PixelData::Float(slice)
    }
    fn wrap_mut(slice: &mut [Self]) -> PixelDataMut<'_> {
        PixelDataMut::Float(slice)
    }
}

impl Element for f64 {
    const KIND: StorageKind = StorageKind::Double;
    fn from_quantum(q: u16) -> Self {
        q as f64 / QUANTUM_MAX as f64
    }
    fn to_quantum(self) -> u16 {
        (self * QUANTUM_MAX as f64).round().clamp(0.0, QUANTUM_MAX as f64) as u16
    }
    fn wrap(slice: &[Self]) -> PixelData<'_> {
        PixelData::Double(slice)
    }
    fn wrap_mut(slice: &mut [Self]) -> PixelDataMut<'_> {
        PixelDataMut::Double(slice)
    }
}

/// A borrowed source buffer, tagged with its element kind.
///
/// The borrow is the pin: the caller's buffer cannot move or be freed while an
/// engine holds a `PixelData`.
#[derive(Debug, Clone, Copy)]
pub enum PixelData<'a> {
    Char(&'a [u8]),
    Short(&'a [u16]),
    Int(&'a [u32]),
    Long(&'a [u64]),
    Float(&'a [f32]),
    Double(&'a [f64]),
}

macro_rules! dispatch_data {
    ($data:expr, $slice:ident => $body:expr) => {
        match $data {
            PixelData::Char($slice) => $body,
            PixelData::Short($slice) => $body,
            PixelData::Int($slice) => $body,
            PixelData::Long($slice) => $body,
            PixelData::Float($slice) => $body,
            PixelData::Double($slice) => $body,
        }
    };
}

impl PixelData<'_> {
    pub fn kind(&self) -> StorageKind {
        match self {
            PixelData::Char(_) => StorageKind::Char,
            PixelData::Short(_) => StorageKind::Short,
            PixelData::Int(_) => StorageKind::Int,
            PixelData::Long(_) => StorageKind::Long,
            PixelData::Float(_) => StorageKind::Float,
            PixelData::Double(_) => StorageKind::Double,
        }
    }

    /// Number of elements (not bytes).
    pub fn len(&self) -> usize {
        dispatch_data!(self, s => s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads element `index` as a 16-bit quantum.
    pub fn quantum(&self, index: usize) -> u16 {
        dispatch_data!(self, s => s[index].to_quantum())
    }
}

/// A borrowed destination buffer, tagged with its element kind.
#[derive(Debug)]
pub enum PixelDataMut<'a> {
    Char(&'a mut [u8]),
    Short(&'a mut [u16]),
    Int(&'a mut [u32]),
    Long(&'a mut [u64]),
    Float(&'a mut [f32]),
    Double(&'a mut [f64]),
}

macro_rules! dispatch_data_mut {
    ($data:expr, $slice:ident => $body:expr) => {
        match $data {
            PixelDataMut::Char($slice) => $body,
            PixelDataMut::Short($slice) => $body,
            PixelDataMut::Int($slice) => $body,
            PixelDataMut::Long($slice) => $body,
            PixelDataMut::Float($slice) => $body,
            PixelDataMut::Double($slice) => $body,
        }
    };
}

impl PixelDataMut<'_> {
    pub fn kind(&self) -> StorageKind {
        match self {
            PixelDataMut::Char(_) => StorageKind::Char,
            PixelDataMut::Short(_) => StorageKind::Short,
            PixelDataMut::Int(_) => StorageKind::Int,
            PixelDataMut::Long(_) => StorageKind::Long,
            PixelDataMut::Float(_) => StorageKind::Float,
            PixelDataMut::Double(_) => StorageKind::Double,
        }
    }

    pub fn len(&self) -> usize {
        dispatch_data_mut!(self, s => s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes a 16-bit quantum into element `index`, scaled to the element kind.
    pub fn set_quantum(&mut self, index: usize, q: u16) {
        dispatch_data_mut!(self, s => s[index] = Element::from_quantum(q))
    }
}

/// One channel named in a component map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
    /// Alpha, where the maximum is fully opaque.
    Alpha,
    /// Opacity, the inverse of alpha.
    Opacity,
    Cyan,
    Magenta,
    Yellow,
    Black,
    /// Luminance of the pixel.
    Intensity,
    /// Skipped on import, written as zero on export.
    Pad,
}

impl Channel {
    fn from_char(c: char) -> Option<Self> {
        Some(match c.to_ascii_uppercase() {
            'R' => Channel::Red,
            'G' => Channel::Green,
            'B' => Channel::Blue,
            'A' => Channel::Alpha,
            'O' => Channel::Opacity,
            'C' => Channel::Cyan,
            'M' => Channel::Magenta,
            'Y' => Channel::Yellow,
            'K' => Channel::Black,
            'I' => Channel::Intensity,
            'P' => Channel::Pad,
            _ => return None,
        })
    }

    fn as_char(self) -> char {
        match self {
            Channel::Red => 'R',
            Channel::Green => 'G',
            Channel::Blue => 'B',
            Channel::Alpha => 'A',
            Channel::Opacity => 'O',
            Channel::Cyan => 'C',
            Channel::Magenta => 'M',
            Channel::Yellow => 'Y',
            Channel::Black => 'K',
            Channel::Intensity => 'I',
            Channel::Pad => 'P',
        }
    }
}

/// A validated component map such as `"RGB"`, `"BGRA"` or `"I"`.
///
/// ```
/// use frames_and_handles::pixel_formats::ComponentMap;
///
/// let map = ComponentMap::parse("rgba").unwrap();
/// assert_eq!(map.len(), 4);
/// assert_eq!(map.to_string(), "RGBA");
/// assert!(ComponentMap::parse("").is_err());
/// assert!(ComponentMap::parse("RGX").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentMap {
    channels: Vec<Channel>,
}

impl ComponentMap {
    pub fn parse(map: &str) -> Result<Self> {
        if map.is_empty() {
            return Err(Error::invalid("component map is empty"));
        }
        let channels = map
            .chars()
            .map(|c| {
                Channel::from_char(c)
                    .ok_or_else(|| Error::invalid(format!("unknown component `{c}` in map `{map}`")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ComponentMap { channels })
    }

    /// Number of elements stored per pixel.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always false; a parsed map has at least one channel.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn has_alpha(&self) -> bool {
        self.channels
            .iter()
            .any(|c| matches!(c, Channel::Alpha | Channel::Opacity))
    }
}

impl Display for ComponentMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in &self.channels {
            write!(f, "{}", c.as_char())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ComponentMap {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        ComponentMap::parse(s)
    }
}

/// A colour with 16-bit channels and straight (non-premultiplied) alpha.
///
/// `alpha == QUANTUM_MAX` is fully opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PixelPacket {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub alpha: u16,
}

impl PixelPacket {
    pub const BLACK: PixelPacket = PixelPacket::opaque(0, 0, 0);
    pub const WHITE: PixelPacket = PixelPacket::opaque(QUANTUM_MAX, QUANTUM_MAX, QUANTUM_MAX);
    pub const TRANSPARENT: PixelPacket = PixelPacket {
        red: 0,
        green: 0,
        blue: 0,
        alpha: 0,
    };

    pub const fn new(red: u16, green: u16, blue: u16, alpha: u16) -> Self {
        PixelPacket {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn opaque(red: u16, green: u16, blue: u16) -> Self {
        Self::new(red, green, blue, QUANTUM_MAX)
    }

    /// Builds a packet from 8-bit channels.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(r.to_quantum(), g.to_quantum(), b.to_quantum(), a.to_quantum())
    }

    /// Opacity in the ImageMagick 6 sense: zero is opaque.
    pub const fn opacity(&self) -> u16 {
        QUANTUM_MAX - self.alpha
    }

    /// Rec. 709 luma, as a quantum.
    pub fn intensity(&self) -> u16 {
        let y = 0.212656 * self.red as f64 + 0.715158 * self.green as f64 + 0.072186 * self.blue as f64;
        y.round().clamp(0.0, QUANTUM_MAX as f64) as u16
    }

    pub fn is_gray(&self) -> bool {
        self.red == self.green && self.green == self.blue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_scaling_round_trips() {
        for b in 0..=255u8 {
            assert_eq!(u8::from_quantum(b.to_quantum()), b);
        }
    }

    #[test]
    fn wide_integer_scaling_round_trips() {
        for q in [0u16, 1, 255, 256, 32768, 65534, 65535] {
            assert_eq!(u32::from_quantum(q).to_quantum(), q);
            assert_eq!(u64::from_quantum(q).to_quantum(), q);
            assert_eq!(u16::from_quantum(q).to_quantum(), q);
            assert_eq!(f64::from_quantum(q).to_quantum(), q);
        }
        assert_eq!(u32::from_quantum(QUANTUM_MAX), u32::MAX);
        assert_eq!(u64::from_quantum(QUANTUM_MAX), u64::MAX);
    }

    #[test]
    fn float_scaling_clamps() {
        assert_eq!(2.0f32.to_quantum(), QUANTUM_MAX);
        assert_eq!((-1.0f32).to_quantum(), 0);
    }

    #[test]
    fn component_map_parses_case_insensitively() {
        let map = ComponentMap::parse("bgrP").unwrap();
        assert_eq!(
            map.channels(),
            &[Channel::Blue, Channel::Green, Channel::Red, Channel::Pad]
        );
        assert!(!map.has_alpha());
        assert!(ComponentMap::parse("RGBO").unwrap().has_alpha());
    }

    #[test]
    fn component_map_rejects_unknown() {
        let err = ComponentMap::parse("RGZ").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn pixel_data_reports_kind_and_len() {
        let floats = [0.0f32, 0.5, 1.0];
        let data = f32::wrap(&floats);
        assert_eq!(data.kind(), StorageKind::Float);
        assert_eq!(data.len(), 3);
        assert_eq!(data.quantum(2), QUANTUM_MAX);

        let mut bytes = [0u8; 2];
        let mut out = u8::wrap_mut(&mut bytes);
        out.set_quantum(1, QUANTUM_MAX);
        assert_eq!(out.kind(), StorageKind::Char);
        assert_eq!(bytes, [0, 255]);
    }

    #[test]
    fn packet_helpers() {
        let p = PixelPacket::from_rgba8(255, 255, 255, 0);
        assert_eq!(p.opacity(), QUANTUM_MAX);
        assert!(p.is_gray());
        assert_eq!(PixelPacket::WHITE.intensity(), QUANTUM_MAX);
        assert_eq!(PixelPacket::BLACK.intensity(), 0);
    }
}
