// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Typed attribute accessors on the head frame.

use super::Image;
use crate::attributes::{
    Attribute, AttributeValue, ColorspaceType, CompressionType, DisposeType, FilterType,
    FromAttribute, ImageType, IntoAttribute, OrientationType, RenderingIntent, ResolutionUnits,
    StorageClass,
};
use crate::engine::{Engine, NativeFrame};
use crate::error::Result;
use crate::geometry::Dimension;
use crate::pixel_formats::PixelPacket;

/// Generates a getter and setter pair per attribute.
macro_rules! accessors {
    ($($(#[$meta:meta])* $get:ident / $set:ident : $ty:ty => $attr:ident;)+) => {
        impl<E: Engine> Image<E> {
            $(
                $(#[$meta])*
                pub fn $get(&self) -> Result<$ty> {
                    self.attribute(Attribute::$attr)
                }

                pub fn $set(&mut self, value: $ty) -> Result<()> {
                    self.set_attribute(Attribute::$attr, value)
                }
            )+
        }
    };
}

accessors! {
    filter / set_filter: FilterType => Filter;
    /// Bits per sample.
    depth / set_depth: u32 => Depth;
    compression / set_compression: CompressionType => Compression;
    /// Ticks (1/100 s) before the next frame.
    delay / set_delay: u32 => Delay;
    dispose / set_dispose: DisposeType => Dispose;
    iterations / set_iterations: u32 => Iterations;
    /// Colormap size. Setting it may only shrink an existing palette.
    colors / set_colors: u32 => Colors;
    units / set_units: ResolutionUnits => Units;
    x_resolution / set_x_resolution: f64 => XResolution;
    y_resolution / set_y_resolution: f64 => YResolution;
    quality / set_quality: u32 => Quality;
    rendering_intent / set_rendering_intent: RenderingIntent => RenderingIntent;
    matte / set_matte: bool => Matte;
    border_color / set_border_color: PixelPacket => BorderColor;
    background_color / set_background_color: PixelPacket => BackgroundColor;
    colorspace / set_colorspace: ColorspaceType => Colorspace;
    orientation / set_orientation: OrientationType => Orientation;
    file_name / set_file_name: String => FileName;
    /// The format name, upper-cased by the engine.
    magick / set_magick: String => Magick;
    /// Colour distance under which two colours compare equal.
    fuzz / set_fuzz: f64 => Fuzz;
}

impl<E: Engine> Image<E> {
    /// Reads `attribute` from the head frame and converts it.
    pub fn attribute<T: FromAttribute>(&self, attribute: Attribute) -> Result<T> {
        let value = self.with_head("get_attribute", |_, head| head.attribute(attribute))?;
        T::from_attribute(attribute, value)
    }

    /// Checks `value` and assigns it on the head frame.
    pub fn set_attribute<T: IntoAttribute>(&mut self, attribute: Attribute, value: T) -> Result<()> {
        self.list("set_attribute")?;
        let value: AttributeValue = value.into_attribute();
        value.check_assignable(attribute)?;
        logwise::trace_sync!(
            "Image::set_attribute {attribute}",
            attribute = logwise::privacy::LogIt(&attribute)
        );
        self.with_head_mut("set_attribute", |_, head| head.set_attribute(attribute, value))
    }

    pub fn storage_class(&self) -> Result<StorageClass> {
        self.attribute(Attribute::StorageClass)
    }

    pub fn image_type(&self) -> Result<ImageType> {
        self.attribute(Attribute::ImageType)
    }

    /// Width and height of the head frame.
    pub fn dimension(&self) -> Result<Dimension> {
        let head = self.head("dimension")?;
        Ok(Dimension::new(head.columns(), head.rows()))
    }
}
