// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Option objects passed through to engines.

These are owned by the caller and borrowed for the duration of one engine
call. Nothing in this crate keeps a reference to them afterwards.
*/

use crate::attributes::ColorspaceType;
use crate::geometry::{Dimension, Geometry};
use crate::pixel_formats::PixelPacket;

/// Decode and encode options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageInfo {
    /// Path to read from or write to. May carry a `format:` prefix.
    pub filename: String,
    /// Explicit format, overriding the filename.
    pub magick: Option<String>,
    /// Size hint for formats without a header, and for `allocate`.
    pub size: Option<Dimension>,
    pub depth: Option<u32>,
    /// Encoder quality, 0-100.
    pub quality: Option<u32>,
    /// Write all frames into one file (true) or only the first.
    pub adjoin: bool,
    /// Fill for `allocate`.
    pub background: Option<PixelPacket>,
}

impl ImageInfo {
    pub fn new(filename: impl Into<String>) -> Self {
        ImageInfo {
            filename: filename.into(),
            adjoin: true,
            ..Default::default()
        }
    }

    pub fn with_magick(mut self, magick: impl Into<String>) -> Self {
        self.magick = Some(magick.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some(Dimension::new(width, height));
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_adjoin(mut self, adjoin: bool) -> Self {
        self.adjoin = adjoin;
        self
    }

    pub fn with_background(mut self, background: PixelPacket) -> Self {
        self.background = Some(background);
        self
    }

    /**
    The format to use: the explicit `magick` if set, otherwise a
    `format:` prefix of the filename, otherwise the filename extension.

    ```
    use frames_and_handles::info::ImageInfo;
    assert_eq!(ImageInfo::new("a/b.PNG").format().as_deref(), Some("PNG"));
    assert_eq!(ImageInfo::new("seq:out").format().as_deref(), Some("SEQ"));
    assert_eq!(ImageInfo::new("noext").format(), None);
    ```
    */
    pub fn format(&self) -> Option<String> {
        if let Some(magick) = &self.magick {
            return Some(magick.to_ascii_uppercase());
        }
        if let Some((prefix, _)) = self.filename.split_once(':')
            && prefix.len() > 1
            && prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Some(prefix.to_ascii_uppercase());
        }
        let name = self.filename.rsplit(['/', '\\']).next().unwrap_or("");
        name.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_uppercase())
            .filter(|ext| !ext.is_empty())
    }

    /// The filename with any `format:` prefix removed.
    pub fn path(&self) -> &str {
        match self.filename.split_once(':') {
            Some((prefix, rest))
                if prefix.len() > 1 && prefix.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                rest
            }
            _ => &self.filename,
        }
    }
}

/// A drawing primitive plus the paint used for it.
///
/// `primitive` uses MVG-style syntax, e.g. `"line 0,0 10,10"`,
/// `"rectangle 2,2 8,8"` or `"point 3,4"`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInfo {
    pub primitive: String,
    pub fill: PixelPacket,
    pub stroke: PixelPacket,
    pub stroke_width: f64,
}

impl DrawInfo {
    pub fn new(primitive: impl Into<String>) -> Self {
        DrawInfo {
            primitive: primitive.into(),
            ..Default::default()
        }
    }

    pub fn with_fill(mut self, fill: PixelPacket) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_stroke(mut self, stroke: PixelPacket, width: f64) -> Self {
        self.stroke = stroke;
        self.stroke_width = width;
        self
    }
}

impl Default for DrawInfo {
    fn default() -> Self {
        DrawInfo {
            primitive: String::new(),
            fill: PixelPacket::BLACK,
            stroke: PixelPacket::TRANSPARENT,
            stroke_width: 1.0,
        }
    }
}

/// Colour reduction parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizeInfo {
    pub number_colors: u32,
    pub tree_depth: u32,
    pub dither: bool,
    pub colorspace: ColorspaceType,
    /// Compute the quantization error into the frame's attributes.
    pub measure_error: bool,
}

impl Default for QuantizeInfo {
    fn default() -> Self {
        QuantizeInfo {
            number_colors: 256,
            tree_depth: 0,
            dither: false,
            colorspace: ColorspaceType::Rgb,
            measure_error: false,
        }
    }
}

impl QuantizeInfo {
    pub fn with_colors(number_colors: u32) -> Self {
        QuantizeInfo {
            number_colors,
            ..Default::default()
        }
    }
}

/// Layout of a contact sheet built from a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct MontageInfo {
    /// Columns x rows of tiles. `None` fits all frames in one row.
    pub tile: Option<Geometry>,
    /// Size of one tile and spacing between tiles.
    pub geometry: Option<Geometry>,
    pub border_width: u32,
    pub background: PixelPacket,
    pub title: Option<String>,
}

impl Default for MontageInfo {
    fn default() -> Self {
        MontageInfo {
            tile: None,
            geometry: None,
            border_width: 0,
            background: PixelPacket::WHITE,
            title: None,
        }
    }
}
