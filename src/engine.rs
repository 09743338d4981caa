// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The seam to an external imaging engine.

An [`Engine`] owns the actual image algorithms and codecs. This crate never
touches pixels itself; it validates arguments, routes calls through
[`crate::exception`], and manages the ownership of whatever frames the engine
hands back.

Every fallible engine method returns `Result<_, NativeFault>`. The fault is the
whole native error record for that call; there is no ambient error state.

# Implementing an engine

Engines choose their own frame type. The frame type must own its native
resource and release it in `Drop`: the crate destroys frames exclusively by
dropping them, exactly once each.

```
# use frames_and_handles::engine::Capabilities;
let caps = Capabilities::none();
assert!(!caps.properties);
```
*/

use crate::attributes::{
    Attribute, AttributeValue, ColorspaceType, CompositeOperator, FilterType, NoiseType,
};
use crate::error::{Capability, NativeFault};
use crate::frames::FrameList;
use crate::geometry::Rectangle;
use crate::info::{DrawInfo, ImageInfo, MontageInfo, QuantizeInfo};
use crate::pixel_formats::{ComponentMap, PixelData, PixelDataMut, PixelPacket};

/// A frame list owned through engine `E`.
pub type Frames<E> = FrameList<<E as Engine>::Frame>;

/// One native frame.
pub trait NativeFrame: Send + 'static {
    fn columns(&self) -> u32;
    fn rows(&self) -> u32;

    fn attribute(&self, attribute: Attribute) -> Result<AttributeValue, NativeFault>;
    fn set_attribute(
        &mut self,
        attribute: Attribute,
        value: AttributeValue,
    ) -> Result<(), NativeFault>;

    /// The profile stored under `name`, compared case-insensitively.
    fn profile(&self, name: &str) -> Option<&[u8]>;
    /// Stores or, with `None`, removes a profile.
    fn set_profile(&mut self, name: &str, data: Option<&[u8]>) -> Result<(), NativeFault>;
    /// Names of all attached profiles in a stable order.
    fn profile_names(&self) -> Vec<String>;

    fn property(&self, name: &str) -> Option<String>;
    fn set_property(&mut self, name: &str, value: &str) -> Result<(), NativeFault>;

    /// The palette, for pseudo-class frames.
    fn colormap(&self) -> Option<&[PixelPacket]>;
}

/// Which optional features an engine provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub properties: bool,
    pub generic_profiles: bool,
    pub profile_iteration: bool,
    pub ping: bool,
    pub multi_frame_blobs: bool,
}

impl Capabilities {
    pub const fn none() -> Self {
        Capabilities {
            properties: false,
            generic_profiles: false,
            profile_iteration: false,
            ping: false,
            multi_frame_blobs: false,
        }
    }

    pub const fn all() -> Self {
        Capabilities {
            properties: true,
            generic_profiles: true,
            profile_iteration: true,
            ping: true,
            multi_frame_blobs: true,
        }
    }

    pub const fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Properties => self.properties,
            Capability::GenericProfiles => self.generic_profiles,
            Capability::ProfileIteration => self.profile_iteration,
            Capability::Ping => self.ping,
            Capability::MultiFrameBlobs => self.multi_frame_blobs,
        }
    }
}

/// Facts about a frame computed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analysis {
    pub gray: bool,
    pub monochrome: bool,
    pub opaque: bool,
    /// Smallest rectangle containing every pixel that differs from the corner.
    pub bounding_box: Rectangle,
    pub unique_colors: u64,
}

/// A transform that produces a new frame list.
///
/// Frame effects read the head frame and produce one frame. Sequence effects
/// read the whole list.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// `attenuate` defaults to 1.0.
    AddNoise { noise: NoiseType, attenuate: Option<f64> },
    Blur { radius: f64, sigma: f64 },
    GaussianBlur { radius: f64, sigma: f64 },
    Charcoal { radius: f64, sigma: f64 },
    Edge { radius: f64 },
    Emboss { radius: f64, sigma: f64 },
    Sharpen { radius: f64, sigma: f64 },
    UnsharpMask { radius: f64, sigma: f64, amount: f64, threshold: f64 },
    MedianFilter { radius: f64 },
    ReduceNoise { radius: f64 },
    OilPaint { radius: f64 },
    Spread { radius: f64 },
    Despeckle,
    Enhance,
    /// Surrounds the frame with its border colour.
    Border { width: u32, height: u32 },
    /// Paints a frame-coloured bevel; `raise` picks lit or sunken.
    Raise { width: u32, height: u32, raise: bool },
    Chop(Rectangle),
    Crop(Rectangle),
    /// Blends `color` into every pixel by `opacity` percent.
    Colorize { color: PixelPacket, opacity: f64 },
    Flip,
    Flop,
    Magnify,
    Minify,
    Implode { amount: f64 },
    Swirl { degrees: f64 },
    Wave { amplitude: f64, wavelength: f64 },
    Roll { x: i64, y: i64 },
    Sample { columns: u32, rows: u32 },
    Scale { columns: u32, rows: u32 },
    Resize { columns: u32, rows: u32, filter: FilterType, blur: f64 },
    Zoom { columns: u32, rows: u32 },
    Rotate { degrees: f64 },
    Shear { x: f64, y: f64 },
    /// Square kernel of side `order`, row major.
    Convolve { order: u32, kernel: Vec<f64> },
    Trim,
    /// One pixel per distinct colour.
    UniqueColors,
    Coalesce,
    Average,
    Deconstruct,
    Montage(MontageInfo),
}

impl Effect {
    /// A short name, used as the error context.
    pub const fn name(&self) -> &'static str {
        match self {
            Effect::AddNoise { .. } => "add_noise",
            Effect::Blur { .. } => "blur",
            Effect::GaussianBlur { .. } => "gaussian_blur",
            Effect::Charcoal { .. } => "charcoal",
            Effect::Edge { .. } => "edge",
            Effect::Emboss { .. } => "emboss",
            Effect::Sharpen { .. } => "sharpen",
            Effect::UnsharpMask { .. } => "unsharp_mask",
            Effect::MedianFilter { .. } => "median_filter",
            Effect::ReduceNoise { .. } => "reduce_noise",
            Effect::OilPaint { .. } => "oil_paint",
            Effect::Spread { .. } => "spread",
            Effect::Despeckle => "despeckle",
            Effect::Enhance => "enhance",
            Effect::Border { .. } => "border",
            Effect::Raise { .. } => "raise",
            Effect::Chop(_) => "chop",
            Effect::Crop(_) => "crop",
            Effect::Colorize { .. } => "colorize",
            Effect::Flip => "flip",
            Effect::Flop => "flop",
            Effect::Magnify => "magnify",
            Effect::Minify => "minify",
            Effect::Implode { .. } => "implode",
            Effect::Swirl { .. } => "swirl",
            Effect::Wave { .. } => "wave",
            Effect::Roll { .. } => "roll",
            Effect::Sample { .. } => "sample",
            Effect::Scale { .. } => "scale",
            Effect::Resize { .. } => "resize",
            Effect::Zoom { .. } => "zoom",
            Effect::Rotate { .. } => "rotate",
            Effect::Shear { .. } => "shear",
            Effect::Convolve { .. } => "convolve",
            Effect::Trim => "trim",
            Effect::UniqueColors => "unique_colors",
            Effect::Coalesce => "coalesce",
            Effect::Average => "average",
            Effect::Deconstruct => "deconstruct",
            Effect::Montage(_) => "montage",
        }
    }

    /// True for effects that consume the whole sequence.
    pub const fn is_sequence(&self) -> bool {
        matches!(
            self,
            Effect::Coalesce | Effect::Average | Effect::Deconstruct | Effect::Montage(_)
        )
    }
}

/// An in-place change to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment {
    /// Increase (`sharpen`) or reduce contrast.
    Contrast { sharpen: bool },
    Equalize,
    Gamma(f64),
    /// Black and white points in quanta, plus a midtone gamma.
    Level { black: f64, white: f64, gamma: f64 },
    /// Invert colours; `grayscale` restricts to gray pixels.
    Negate { grayscale: bool },
    Normalize,
    /// Percentages; 100 leaves a channel unchanged.
    Modulate { brightness: f64, saturation: f64, hue: f64 },
    Solarize { threshold: f64 },
    Threshold { threshold: f64 },
    /// Replace pixels matching `target` (within the frame's fuzz) by `fill`.
    Opaque { target: PixelPacket, fill: PixelPacket },
    /// Give pixels matching `color` the alpha `alpha`.
    Transparent { color: PixelPacket, alpha: u16 },
    /// Remove profiles and comments.
    Strip,
    CycleColormap { amount: i32 },
    SortColormap,
    /// Relabel the colorspace without touching pixels.
    SetColorspace(ColorspaceType),
    TransformColorspace(ColorspaceType),
}

impl Adjustment {
    pub const fn name(&self) -> &'static str {
        match self {
            Adjustment::Contrast { .. } => "contrast",
            Adjustment::Equalize => "equalize",
            Adjustment::Gamma(_) => "gamma",
            Adjustment::Level { .. } => "level",
            Adjustment::Negate { .. } => "negate",
            Adjustment::Normalize => "normalize",
            Adjustment::Modulate { .. } => "modulate",
            Adjustment::Solarize { .. } => "solarize",
            Adjustment::Threshold { .. } => "threshold",
            Adjustment::Opaque { .. } => "opaque",
            Adjustment::Transparent { .. } => "transparent",
            Adjustment::Strip => "strip",
            Adjustment::CycleColormap { .. } => "cycle_colormap",
            Adjustment::SortColormap => "sort_colormap",
            Adjustment::SetColorspace(_) => "set_colorspace",
            Adjustment::TransformColorspace(_) => "transform_colorspace",
        }
    }
}

/// An external imaging engine.
///
/// `begin_call` and `end_call` bracket every fallible call made through
/// [`crate::exception`], on every exit path. Engines that keep a per-call
/// native error record allocate it in `begin_call` and release it in
/// `end_call`.
pub trait Engine: Send + Sync + Sized + 'static {
    type Frame: NativeFrame;

    fn capabilities(&self) -> Capabilities;

    fn begin_call(&self, _operation: &'static str) {}
    fn end_call(&self, _operation: &'static str) {}

    /// A blank frame of `info.size`, filled with `info.background`.
    fn allocate(&self, info: &ImageInfo) -> Result<Frames<Self>, NativeFault>;
    fn read(&self, info: &ImageInfo) -> Result<Frames<Self>, NativeFault>;
    /// Like `read`, but without decoding pixel data.
    fn ping(&self, info: &ImageInfo) -> Result<Frames<Self>, NativeFault>;
    fn decode_blob(&self, info: &ImageInfo, blob: &[u8]) -> Result<Frames<Self>, NativeFault>;

    /// Writes the head, or every frame when `info.adjoin` is set.
    fn write(&self, info: &ImageInfo, frames: &Frames<Self>) -> Result<(), NativeFault>;
    /// Encodes the head, or every frame when `info.adjoin` is set.
    fn encode_blob(&self, info: &ImageInfo, frames: &Frames<Self>) -> Result<Vec<u8>, NativeFault>;

    /// Builds a frame from interleaved pixel data.
    ///
    /// `pixels` holds at least `columns * rows * map.len()` elements.
    fn constitute(
        &self,
        columns: u32,
        rows: u32,
        map: &ComponentMap,
        pixels: PixelData<'_>,
    ) -> Result<Self::Frame, NativeFault>;

    /// Writes `region` of `frame` into `out`.
    ///
    /// `out` holds at least `region.width * region.height * map.len()`
    /// elements.
    fn export(
        &self,
        frame: &Self::Frame,
        region: Rectangle,
        map: &ComponentMap,
        out: PixelDataMut<'_>,
    ) -> Result<(), NativeFault>;

    /// A deep copy of `frame`, resized to `columns` x `rows`. Without
    /// `include_pixels` the copy keeps the attributes and is filled with the
    /// background colour.
    fn clone_frame(
        &self,
        frame: &Self::Frame,
        columns: u32,
        rows: u32,
        include_pixels: bool,
    ) -> Result<Self::Frame, NativeFault>;

    fn transform(&self, frames: &Frames<Self>, effect: &Effect) -> Result<Frames<Self>, NativeFault>;

    /// Changes `frame` in place. On `Err` the frame must be exactly as it was;
    /// the same holds for [`Engine::composite`], [`Engine::quantize`] and
    /// [`Engine::draw`].
    fn adjust(&self, frame: &mut Self::Frame, adjustment: &Adjustment) -> Result<(), NativeFault>;

    fn composite(
        &self,
        destination: &mut Self::Frame,
        operator: CompositeOperator,
        source: &Self::Frame,
        x: i64,
        y: i64,
    ) -> Result<(), NativeFault>;

    fn quantize(&self, frame: &mut Self::Frame, info: &QuantizeInfo) -> Result<(), NativeFault>;
    fn draw(&self, frame: &mut Self::Frame, info: &DrawInfo) -> Result<(), NativeFault>;

    fn one_pixel(&self, frame: &Self::Frame, x: i64, y: i64) -> Result<PixelPacket, NativeFault>;
    fn analyze(&self, frame: &Self::Frame) -> Result<Analysis, NativeFault>;

    /// A hex digest of the pixel data. Engines may cache it as a property.
    fn signature(&self, frame: &mut Self::Frame) -> Result<String, NativeFault>;
}
