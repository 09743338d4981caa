// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Scalar frame attributes and the enumerations they take.
//!
//! Engines store attributes however they like; at the seam they are exchanged
//! as an [`Attribute`] key plus an [`AttributeValue`]. Enumerated attributes
//! travel as their ImageMagick numeric code and are converted to the typed
//! enums below by [`crate::image`].

use crate::error::{Error, Result};
use crate::pixel_formats::PixelPacket;

/// Declares a fieldless enum with a stable numeric code per variant.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn code(self) -> u32 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub const fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

coded_enum! {
    /// Resampling filter.
    pub enum FilterType {
        Undefined = 0,
        Point = 1,
        Box = 2,
        Triangle = 3,
        Hermite = 4,
        Hanning = 5,
        Hamming = 6,
        Blackman = 7,
        Gaussian = 8,
        Quadratic = 9,
        Cubic = 10,
        Catrom = 11,
        Mitchell = 12,
        Lanczos = 13,
        Bessel = 14,
        Sinc = 15,
    }
}

coded_enum! {
    pub enum CompressionType {
        Undefined = 0,
        None = 1,
        BZip = 2,
        Fax = 3,
        Group4 = 4,
        Jpeg = 5,
        LosslessJpeg = 6,
        Lzw = 7,
        Rle = 8,
        Zip = 9,
    }
}

coded_enum! {
    /// What happens to a frame's area before the next frame is drawn.
    pub enum DisposeType {
        Undefined = 0,
        None = 1,
        Background = 2,
        Previous = 3,
    }
}

coded_enum! {
    pub enum ColorspaceType {
        Undefined = 0,
        Rgb = 1,
        Gray = 2,
        Transparent = 3,
        Ohta = 4,
        Xyz = 5,
        YCbCr = 6,
        Ycc = 7,
        Yiq = 8,
        YPbPr = 9,
        Yuv = 10,
        Cmyk = 11,
        Srgb = 12,
        Hsl = 13,
        Hwb = 14,
    }
}

coded_enum! {
    /// Units of the x/y resolution.
    pub enum ResolutionUnits {
        Undefined = 0,
        PixelsPerInch = 1,
        PixelsPerCentimeter = 2,
    }
}

coded_enum! {
    pub enum RenderingIntent {
        Undefined = 0,
        Saturation = 1,
        Perceptual = 2,
        Absolute = 3,
        Relative = 4,
    }
}

coded_enum! {
    /// EXIF-style orientation of the stored pixels.
    pub enum OrientationType {
        Undefined = 0,
        TopLeft = 1,
        TopRight = 2,
        BottomRight = 3,
        BottomLeft = 4,
        LeftTop = 5,
        RightTop = 6,
        RightBottom = 7,
        LeftBottom = 8,
    }
}

coded_enum! {
    pub enum StorageClass {
        Undefined = 0,
        Direct = 1,
        Pseudo = 2,
    }
}

coded_enum! {
    pub enum ImageType {
        Undefined = 0,
        Bilevel = 1,
        Grayscale = 2,
        GrayscaleMatte = 3,
        Palette = 4,
        PaletteMatte = 5,
        TrueColor = 6,
        TrueColorMatte = 7,
        ColorSeparation = 8,
        ColorSeparationMatte = 9,
        Optimize = 10,
    }
}

coded_enum! {
    pub enum NoiseType {
        Uniform = 0,
        Gaussian = 1,
        MultiplicativeGaussian = 2,
        Impulse = 3,
        Laplacian = 4,
        Poisson = 5,
    }
}

coded_enum! {
    pub enum CompositeOperator {
        Undefined = 0,
        Over = 1,
        In = 2,
        Out = 3,
        Atop = 4,
        Xor = 5,
        Plus = 6,
        Minus = 7,
        Add = 8,
        Subtract = 9,
        Difference = 10,
        Multiply = 11,
        Bumpmap = 12,
        Copy = 13,
        CopyRed = 14,
        CopyGreen = 15,
        CopyBlue = 16,
        CopyOpacity = 17,
        Clear = 18,
        Dissolve = 19,
        Displace = 20,
        Modulate = 21,
        Threshold = 22,
        No = 23,
        Darken = 24,
        Lighten = 25,
        Hue = 26,
        Saturate = 27,
        Colorize = 28,
        Luminize = 29,
        Screen = 30,
        Overlay = 31,
    }
}

/// Keys of the scalar fields of a native frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Filter,
    Depth,
    Compression,
    /// Ticks (1/100 s) before the next frame is shown.
    Delay,
    Dispose,
    /// Animation loop count; zero loops forever.
    Iterations,
    /// Number of colours in the colormap.
    Colors,
    TotalColors,
    Units,
    XResolution,
    YResolution,
    Quality,
    RenderingIntent,
    Matte,
    BorderColor,
    BackgroundColor,
    Colorspace,
    Orientation,
    FileName,
    Magick,
    StorageClass,
    ImageType,
    Fuzz,
}

impl Attribute {
    pub const ALL: &'static [Attribute] = &[
        Attribute::Filter,
        Attribute::Depth,
        Attribute::Compression,
        Attribute::Delay,
        Attribute::Dispose,
        Attribute::Iterations,
        Attribute::Colors,
        Attribute::TotalColors,
        Attribute::Units,
        Attribute::XResolution,
        Attribute::YResolution,
        Attribute::Quality,
        Attribute::RenderingIntent,
        Attribute::Matte,
        Attribute::BorderColor,
        Attribute::BackgroundColor,
        Attribute::Colorspace,
        Attribute::Orientation,
        Attribute::FileName,
        Attribute::Magick,
        Attribute::StorageClass,
        Attribute::ImageType,
        Attribute::Fuzz,
    ];

    /// Attributes computed by the engine that cannot be assigned.
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            Attribute::TotalColors | Attribute::StorageClass | Attribute::ImageType
        )
    }

    /// The kind of value this attribute holds.
    pub const fn kind(self) -> ValueKind {
        match self {
            Attribute::Filter
            | Attribute::Depth
            | Attribute::Compression
            | Attribute::Delay
            | Attribute::Dispose
            | Attribute::Iterations
            | Attribute::Colors
            | Attribute::TotalColors
            | Attribute::Units
            | Attribute::Quality
            | Attribute::RenderingIntent
            | Attribute::Colorspace
            | Attribute::Orientation
            | Attribute::StorageClass
            | Attribute::ImageType => ValueKind::Unsigned,
            Attribute::XResolution | Attribute::YResolution | Attribute::Fuzz => ValueKind::Real,
            Attribute::Matte => ValueKind::Flag,
            Attribute::BorderColor | Attribute::BackgroundColor => ValueKind::Color,
            Attribute::FileName | Attribute::Magick => ValueKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unsigned,
    Real,
    Flag,
    Color,
    Text,
}

/// The value of one [`Attribute`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Unsigned(u32),
    Real(f64),
    Flag(bool),
    Color(PixelPacket),
    Text(String),
}

impl AttributeValue {
    pub const fn kind(&self) -> ValueKind {
        match self {
            AttributeValue::Unsigned(_) => ValueKind::Unsigned,
            AttributeValue::Real(_) => ValueKind::Real,
            AttributeValue::Flag(_) => ValueKind::Flag,
            AttributeValue::Color(_) => ValueKind::Color,
            AttributeValue::Text(_) => ValueKind::Text,
        }
    }

    /// Checks a caller-supplied value before it is handed to an engine.
    pub fn check_assignable(&self, attribute: Attribute) -> Result<()> {
        if attribute.is_read_only() {
            return Err(Error::invalid(format!("{attribute:?} is read-only")));
        }
        if self.kind() != attribute.kind() {
            return Err(Error::invalid(format!(
                "{attribute:?} takes a {:?} value, got {:?}",
                attribute.kind(),
                self.kind()
            )));
        }
        if let AttributeValue::Real(value) = self
            && !value.is_finite()
        {
            return Err(Error::invalid(format!("{attribute:?} must be finite")));
        }
        Ok(())
    }
}

/// Conversion out of an [`AttributeValue`] an engine returned.
///
/// An engine answering with the wrong kind, or an unknown enumeration code, is
/// a [`Error::ConstructionFailed`]: the call itself succeeded.
pub trait FromAttribute: Sized {
    fn from_attribute(attribute: Attribute, value: AttributeValue) -> Result<Self>;
}

/// Conversion into an [`AttributeValue`].
pub trait IntoAttribute {
    fn into_attribute(self) -> AttributeValue;
}

fn wrong_kind(attribute: Attribute, value: &AttributeValue) -> Error {
    crate::exception::construction_failed(
        "from_attribute",
        format!("engine returned a {:?} value for {attribute:?}", value.kind()),
    )
}

impl FromAttribute for u32 {
    fn from_attribute(attribute: Attribute, value: AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Unsigned(v) => Ok(v),
            other => Err(wrong_kind(attribute, &other)),
        }
    }
}

impl IntoAttribute for u32 {
    fn into_attribute(self) -> AttributeValue {
        AttributeValue::Unsigned(self)
    }
}

impl FromAttribute for f64 {
    fn from_attribute(attribute: Attribute, value: AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Real(v) => Ok(v),
            other => Err(wrong_kind(attribute, &other)),
        }
    }
}

impl IntoAttribute for f64 {
    fn into_attribute(self) -> AttributeValue {
        AttributeValue::Real(self)
    }
}

impl FromAttribute for bool {
    fn from_attribute(attribute: Attribute, value: AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Flag(v) => Ok(v),
            other => Err(wrong_kind(attribute, &other)),
        }
    }
}

impl IntoAttribute for bool {
    fn into_attribute(self) -> AttributeValue {
        AttributeValue::Flag(self)
    }
}

impl FromAttribute for PixelPacket {
    fn from_attribute(attribute: Attribute, value: AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Color(v) => Ok(v),
            other => Err(wrong_kind(attribute, &other)),
        }
    }
}

impl IntoAttribute for PixelPacket {
    fn into_attribute(self) -> AttributeValue {
        AttributeValue::Color(self)
    }
}

impl FromAttribute for String {
    fn from_attribute(attribute: Attribute, value: AttributeValue) -> Result<Self> {
        match value {
            AttributeValue::Text(v) => Ok(v),
            other => Err(wrong_kind(attribute, &other)),
        }
    }
}

impl IntoAttribute for String {
    fn into_attribute(self) -> AttributeValue {
        AttributeValue::Text(self)
    }
}

impl IntoAttribute for &str {
    fn into_attribute(self) -> AttributeValue {
        AttributeValue::Text(self.to_owned())
    }
}

macro_rules! coded_attribute {
    ($($ty:ident),+) => {
        $(
            impl FromAttribute for $ty {
                fn from_attribute(attribute: Attribute, value: AttributeValue) -> Result<Self> {
                    let code = u32::from_attribute(attribute, value)?;
                    $ty::from_code(code).ok_or_else(|| {
                        crate::exception::construction_failed(
                            "from_attribute",
                            format!("engine returned unknown {} code {code}", stringify!($ty)),
                        )
                    })
                }
            }

            impl IntoAttribute for $ty {
                fn into_attribute(self) -> AttributeValue {
                    AttributeValue::Unsigned(self.code())
                }
            }
        )+
    };
}

coded_attribute!(
    FilterType,
    CompressionType,
    DisposeType,
    ColorspaceType,
    ResolutionUnits,
    RenderingIntent,
    OrientationType,
    StorageClass,
    ImageType
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for f in FilterType::ALL {
            assert_eq!(FilterType::from_code(f.code()), Some(*f));
        }
        for c in CompositeOperator::ALL {
            assert_eq!(CompositeOperator::from_code(c.code()), Some(*c));
        }
        assert_eq!(DisposeType::from_code(99), None);
    }

    #[test]
    fn assignability() {
        assert!(AttributeValue::Unsigned(8).check_assignable(Attribute::Depth).is_ok());
        assert!(matches!(
            AttributeValue::Real(1.0).check_assignable(Attribute::Depth),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            AttributeValue::Unsigned(3).check_assignable(Attribute::TotalColors),
            Err(Error::InvalidArgument(_))
        ));
        assert!(AttributeValue::Real(f64::NAN)
            .check_assignable(Attribute::XResolution)
            .is_err());
    }

    #[test]
    fn engine_answers_are_checked() {
        let err = ColorspaceType::from_attribute(Attribute::Colorspace, AttributeValue::Unsigned(400))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "construction failed: engine returned unknown ColorspaceType code 400"
        );
        let err = bool::from_attribute(Attribute::Matte, AttributeValue::Text("yes".into())).unwrap_err();
        assert!(matches!(err, Error::ConstructionFailed(ref reason) if reason.contains("Matte")));
        assert_eq!(
            DisposeType::from_attribute(Attribute::Dispose, AttributeValue::Unsigned(2)).unwrap(),
            DisposeType::Background
        );
    }

    #[test]
    fn every_attribute_has_a_kind() {
        for a in Attribute::ALL {
            let _ = a.kind();
        }
        assert_eq!(Attribute::ALL.len(), 23);
    }
}
