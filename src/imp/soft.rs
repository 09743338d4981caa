// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! A pure-Rust reference engine.

[`SoftEngine`] keeps frames as 16-bit RGBA in memory and implements every
[`Engine`] operation with straightforward algorithms. It reads and writes PNG
and a private multi-frame container (`SEQ`).

It doubles as the crate's test engine: [`Counters`] records call scopes and
frame lifetimes, and [`SoftEngine::inject`] makes chosen operations fail on a
schedule.

```
use frames_and_handles::imp::soft::{SoftConfig, SoftEngine};
let engine = SoftEngine::new(SoftConfig::default());
assert_eq!(engine.counters().live_frames(), 0);
```
*/

mod adjust;
mod codec;
mod config;
mod effects;
mod faults;
mod frame;

pub use config::SoftConfig;
pub use faults::{Counters, FaultPlan, codes};
pub use frame::{FrameAttributes, SoftFrame};

use crate::attributes::CompositeOperator;
use crate::engine::{
    Adjustment, Analysis, Capabilities, Effect, Engine, Frames, NativeFrame,
};
use crate::error::NativeFault;
use crate::frames::FrameList;
use crate::geometry::Rectangle;
use crate::info::{DrawInfo, ImageInfo, QuantizeInfo};
use crate::pixel_formats::{
    Channel, ComponentMap, PixelData, PixelDataMut, PixelPacket, QUANTUM_MAX,
};
use codec::Format;
use frame::SIGNATURE_PROPERTY;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::ThreadId;

/// The software engine.
#[derive(Debug)]
pub struct SoftEngine {
    config: SoftConfig,
    counters: Arc<Counters>,
    faults: Mutex<HashMap<&'static str, FaultPlan>>,
    /// Faults fired by `begin_call`, waiting for the call they belong to.
    pending: Mutex<HashMap<ThreadId, NativeFault>>,
}

impl SoftEngine {
    pub fn new(config: SoftConfig) -> Self {
        logwise::info_sync!(
            "SoftEngine::new max_pixels={max_pixels} max_frames={max_frames}",
            max_pixels = config.max_pixels,
            max_frames = config.max_frames
        );
        SoftEngine {
            config,
            counters: Arc::new(Counters::default()),
            faults: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SoftConfig {
        &self.config
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub(crate) fn counters_arc(&self) -> &Arc<Counters> {
        &self.counters
    }

    /**
    Makes calls routed under `operation` fail according to `plan`.

    `operation` is the context name the crate passes to
    [`crate::exception::native`], such as `"read"`, `"constitute"` or
    `"clone_list"`. A later plan for the same operation replaces the earlier
    one.
    */
    pub fn inject(&self, operation: &'static str, plan: FaultPlan) {
        logwise::trace_sync!(
            "SoftEngine::inject {operation} {plan}",
            operation = operation,
            plan = logwise::privacy::LogIt(&plan)
        );
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation, plan);
    }

    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Fails with the fault armed for this call, if any.
    fn enter(&self) -> Result<(), NativeFault> {
        let fault = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&std::thread::current().id());
        match fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    pub(crate) fn check_size(&self, columns: u32, rows: u32) -> Result<(), NativeFault> {
        let area = columns as u64 * rows as u64;
        if area > self.config.max_pixels {
            return Err(faults::too_large(columns as u64, rows as u64));
        }
        Ok(())
    }

    pub(crate) fn check_frames(&self, count: usize) -> Result<(), NativeFault> {
        if count > self.config.max_frames {
            return Err(NativeFault::coded(
                codes::RESOURCE_LIMIT,
                format!("{count} frames exceed the limit of {}", self.config.max_frames),
            ));
        }
        Ok(())
    }

    fn list(&self, frames: Vec<SoftFrame>) -> Result<Frames<Self>, NativeFault> {
        self.check_frames(frames.len())?;
        FrameList::from_frames(frames)
            .map_err(|_| NativeFault::coded(codes::IMAGE, "operation produced no frames"))
    }

    fn decode_format(info: &ImageInfo, bytes: &[u8]) -> Result<Format, NativeFault> {
        match info.format() {
            Some(name) => Format::from_name(&name).ok_or_else(|| {
                faults::missing_delegate(format!(
                    "no decode delegate for this image format `{name}`"
                ))
            }),
            None => Format::sniff(bytes).ok_or_else(|| {
                faults::missing_delegate("no decode delegate for this image format")
                    .with_description(info.filename.clone())
            }),
        }
    }

    fn encode_format(info: &ImageInfo, frames: &Frames<Self>) -> Result<Format, NativeFault> {
        let name = info
            .format()
            .unwrap_or_else(|| frames.head_frame().attrs.magick.clone());
        Format::from_name(&name).ok_or_else(|| {
            faults::missing_delegate(format!("no encode delegate for this image format `{name}`"))
        })
    }

    fn decode(&self, info: &ImageInfo, bytes: &[u8], ping: bool) -> Result<Frames<Self>, NativeFault> {
        let format = Self::decode_format(info, bytes)?;
        let mut frames = codec::decode(self, format, bytes, ping)?;
        for frame in &mut frames {
            frame.attrs.filename = info.filename.clone();
        }
        self.list(frames)
    }

    fn encode(&self, info: &ImageInfo, frames: &Frames<Self>) -> Result<Vec<u8>, NativeFault> {
        let format = Self::encode_format(info, frames)?;
        let selected: Vec<&SoftFrame> = if info.adjoin && format.adjoins() {
            frames.iter().collect()
        } else {
            vec![frames.head_frame()]
        };
        codec::encode(format, &selected)
    }

    fn read_file(info: &ImageInfo) -> Result<Vec<u8>, NativeFault> {
        std::fs::read(info.path()).map_err(|err| {
            NativeFault::coded(codes::FILE_OPEN, "unable to open image")
                .with_description(format!("{}: {err}", info.path()))
        })
    }
}

impl Engine for SoftEngine {
    type Frame = SoftFrame;

    fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    fn begin_call(&self, operation: &'static str) {
        self.counters.scope_opened();
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(plan) = faults.get_mut(operation) else {
            return;
        };
        let fired = plan.fire();
        if plan.exhausted() {
            faults.remove(operation);
        }
        drop(faults);
        if let Some(fault) = fired {
            logwise::trace_sync!("SoftEngine: injected fault for {operation}", operation = operation);
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(std::thread::current().id(), fault);
        }
    }

    fn end_call(&self, _operation: &'static str) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&std::thread::current().id());
        self.counters.scope_closed();
    }

    fn allocate(&self, info: &ImageInfo) -> Result<Frames<Self>, NativeFault> {
        self.enter()?;
        let Some(size) = info.size else {
            return Err(faults::option("must specify image size"));
        };
        if size.width == 0 || size.height == 0 {
            return Err(faults::option(format!(
                "negative or zero image size {}x{}",
                size.width, size.height
            )));
        }
        self.check_size(size.width, size.height)?;
        let mut attrs = FrameAttributes::with_depth(info.depth.unwrap_or(self.config.default_depth));
        attrs.filename = info.filename.clone();
        attrs.magick = info.format().unwrap_or_default();
        if let Some(quality) = info.quality {
            attrs.quality = quality.min(100);
        }
        let fill = info.background.unwrap_or(attrs.background_color);
        attrs.background_color = fill;
        let frame = SoftFrame::blank(&self.counters, size.width, size.height, fill, attrs);
        Ok(FrameList::single(frame))
    }

    fn read(&self, info: &ImageInfo) -> Result<Frames<Self>, NativeFault> {
        self.enter()?;
        let bytes = Self::read_file(info)?;
        self.decode(info, &bytes, false)
    }

    fn ping(&self, info: &ImageInfo) -> Result<Frames<Self>, NativeFault> {
        self.enter()?;
        if !self.config.capabilities.ping {
            return Err(faults::missing_delegate("ping is not available"));
        }
        let bytes = Self::read_file(info)?;
        self.decode(info, &bytes, true)
    }

    fn decode_blob(&self, info: &ImageInfo, blob: &[u8]) -> Result<Frames<Self>, NativeFault> {
        self.enter()?;
        if blob.is_empty() {
            return Err(NativeFault::coded(codes::BLOB, "zero-length blob not permitted"));
        }
        self.decode(info, blob, false)
    }

    fn write(&self, info: &ImageInfo, frames: &Frames<Self>) -> Result<(), NativeFault> {
        self.enter()?;
        let bytes = self.encode(info, frames)?;
        std::fs::write(info.path(), bytes).map_err(|err| {
            NativeFault::coded(codes::FILE_OPEN, "unable to open image for writing")
                .with_description(format!("{}: {err}", info.path()))
        })
    }

    fn encode_blob(&self, info: &ImageInfo, frames: &Frames<Self>) -> Result<Vec<u8>, NativeFault> {
        self.enter()?;
        if info.adjoin && frames.count() > 1 && !self.config.capabilities.multi_frame_blobs {
            return Err(faults::missing_delegate("multi-frame blobs are not available"));
        }
        self.encode(info, frames)
    }

    fn constitute(
        &self,
        columns: u32,
        rows: u32,
        map: &ComponentMap,
        pixels: PixelData<'_>,
    ) -> Result<SoftFrame, NativeFault> {
        self.enter()?;
        if columns == 0 || rows == 0 {
            return Err(faults::option(format!(
                "negative or zero image size {columns}x{rows}"
            )));
        }
        self.check_size(columns, rows)?;
        let channels = map.channels();
        let stride = channels.len();
        let count = columns as usize * rows as usize;
        if pixels.len() < count * stride {
            return Err(faults::option("pixel buffer is too small"));
        }
        let q = QUANTUM_MAX as u32;
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let mut p = PixelPacket::BLACK;
            let mut black = 0u16;
            for (k, channel) in channels.iter().enumerate() {
                let v = pixels.quantum(i * stride + k);
                match channel {
                    Channel::Red => p.red = v,
                    Channel::Green => p.green = v,
                    Channel::Blue => p.blue = v,
                    Channel::Alpha => p.alpha = v,
                    Channel::Opacity => p.alpha = QUANTUM_MAX - v,
                    Channel::Cyan => p.red = QUANTUM_MAX - v,
                    Channel::Magenta => p.green = QUANTUM_MAX - v,
                    Channel::Yellow => p.blue = QUANTUM_MAX - v,
                    Channel::Black => black = v,
                    Channel::Intensity => {
                        p.red = v;
                        p.green = v;
                        p.blue = v;
                    }
                    Channel::Pad => {}
                }
            }
            if black > 0 {
                let keep = |c: u16| ((c as u32 * (q - black as u32)) / q) as u16;
                p = PixelPacket::new(keep(p.red), keep(p.green), keep(p.blue), p.alpha);
            }
            out.push(p);
        }
        let depth = if pixels.kind().bytes() == 1 { 8 } else { 16 };
        let mut attrs = FrameAttributes::with_depth(depth);
        attrs.matte = map.has_alpha();
        Ok(SoftFrame::from_pixels(&self.counters, columns, rows, out, attrs))
    }

    fn export(
        &self,
        frame: &SoftFrame,
        region: Rectangle,
        map: &ComponentMap,
        mut out: PixelDataMut<'_>,
    ) -> Result<(), NativeFault> {
        self.enter()?;
        frame.require_pixels()?;
        if !region.fits_within(frame.columns(), frame.rows()) {
            return Err(faults::option("region is outside the image"));
        }
        let channels = map.channels();
        let stride = channels.len();
        if out.len() < region.width as usize * region.height as usize * stride {
            return Err(faults::option("pixel buffer is too small"));
        }
        let with_black = channels.contains(&Channel::Black);
        let q = QUANTUM_MAX as u32;
        let mut i = 0;
        for y in 0..region.height {
            for x in 0..region.width {
                let p = frame.pixel(region.x as u32 + x, region.y as u32 + y);
                let black = if with_black {
                    QUANTUM_MAX - p.red.max(p.green).max(p.blue)
                } else {
                    0
                };
                // CMY with the black component taken out
                let ink = |c: u16| -> u16 {
                    let white = q - black as u32;
                    if white == 0 {
                        0
                    } else {
                        ((white - c as u32) * q / white) as u16
                    }
                };
                for channel in channels {
                    let v = match channel {
                        Channel::Red => p.red,
                        Channel::Green => p.green,
                        Channel::Blue => p.blue,
                        Channel::Alpha => p.alpha,
                        Channel::Opacity => p.opacity(),
                        Channel::Cyan => ink(p.red),
                        Channel::Magenta => ink(p.green),
                        Channel::Yellow => ink(p.blue),
                        Channel::Black => black,
                        Channel::Intensity => p.intensity(),
                        Channel::Pad => 0,
                    };
                    out.set_quantum(i, v);
                    i += 1;
                }
            }
        }
        Ok(())
    }

    fn clone_frame(
        &self,
        frame: &SoftFrame,
        columns: u32,
        rows: u32,
        include_pixels: bool,
    ) -> Result<SoftFrame, NativeFault> {
        self.enter()?;
        if columns == 0 || rows == 0 {
            return Err(faults::option(format!(
                "negative or zero image size {columns}x{rows}"
            )));
        }
        self.check_size(columns, rows)?;
        let same_size = columns == frame.columns() && rows == frame.rows();
        if frame.is_pinged() || (include_pixels && same_size) {
            if same_size {
                return Ok(frame.duplicate());
            }
            return Ok(SoftFrame::pinged(&self.counters, columns, rows, frame.attrs.clone()));
        }
        let pixels = if include_pixels {
            let (sc, sr) = (frame.columns() as u64, frame.rows() as u64);
            let mut pixels = Vec::with_capacity(columns as usize * rows as usize);
            for y in 0..rows as u64 {
                for x in 0..columns as u64 {
                    pixels.push(frame.pixel(
                        (x * sc / columns as u64) as u32,
                        (y * sr / rows as u64) as u32,
                    ));
                }
            }
            pixels
        } else {
            vec![frame.attrs.background_color; columns as usize * rows as usize]
        };
        Ok(frame.derive(columns, rows, pixels))
    }

    fn transform(&self, frames: &Frames<Self>, effect: &Effect) -> Result<Frames<Self>, NativeFault> {
        self.enter()?;
        let out = if effect.is_sequence() {
            let all: Vec<&SoftFrame> = frames.iter().collect();
            effects::sequence_effect(self, &all, effect)?
        } else {
            vec![effects::frame_effect(self, frames.head_frame(), effect)?]
        };
        self.list(out)
    }

    fn adjust(&self, frame: &mut SoftFrame, adjustment: &Adjustment) -> Result<(), NativeFault> {
        self.enter()?;
        adjust::adjust(frame, adjustment)
    }

    fn composite(
        &self,
        destination: &mut SoftFrame,
        operator: CompositeOperator,
        source: &SoftFrame,
        x: i64,
        y: i64,
    ) -> Result<(), NativeFault> {
        self.enter()?;
        effects::composite_onto(destination, operator, source, x, y)
    }

    fn quantize(&self, frame: &mut SoftFrame, info: &QuantizeInfo) -> Result<(), NativeFault> {
        self.enter()?;
        adjust::quantize(frame, info)
    }

    fn draw(&self, frame: &mut SoftFrame, info: &DrawInfo) -> Result<(), NativeFault> {
        self.enter()?;
        adjust::draw(frame, info)
    }

    fn one_pixel(&self, frame: &SoftFrame, x: i64, y: i64) -> Result<PixelPacket, NativeFault> {
        self.enter()?;
        frame.require_pixels()?;
        if x < 0 || y < 0 || x >= frame.columns() as i64 || y >= frame.rows() as i64 {
            return Ok(frame.attrs.background_color);
        }
        Ok(frame.pixel(x as u32, y as u32))
    }

    fn analyze(&self, frame: &SoftFrame) -> Result<Analysis, NativeFault> {
        self.enter()?;
        adjust::analyze(frame)
    }

    fn signature(&self, frame: &mut SoftFrame) -> Result<String, NativeFault> {
        self.enter()?;
        frame.require_pixels()?;
        if let Some(cached) = frame.properties().get(SIGNATURE_PROPERTY) {
            return Ok(cached.clone());
        }
        let mut hasher = blake3::Hasher::new();
        for p in frame.pixels() {
            for q in [p.red, p.green, p.blue, p.alpha] {
                hasher.update(&q.to_be_bytes());
            }
        }
        let digest = hasher.finalize().to_hex().to_string();
        frame
            .properties_mut()
            .insert(SIGNATURE_PROPERTY.to_string(), digest.clone());
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::exception;
    use crate::pixel_formats::Element;

    fn rgb(engine: &SoftEngine, bytes: &[u8], columns: u32, rows: u32) -> SoftFrame {
        let map = ComponentMap::parse("RGB").unwrap();
        engine
            .constitute(columns, rows, &map, u8::wrap(bytes))
            .unwrap()
    }

    #[test]
    fn injected_fault_fires_inside_scope_only() {
        let engine = SoftEngine::new(SoftConfig::default());
        engine.inject("constitute", FaultPlan::once(Severity::Fatal, 42, "boom"));
        let map = ComponentMap::parse("RGB").unwrap();
        let data = [0u8; 3];
        let err = exception::native(&engine, "constitute", |e| {
            e.constitute(1, 1, &map, u8::wrap(&data))
        })
        .unwrap_err();
        assert_eq!(err.severity(), Some(Severity::Fatal));
        assert_eq!(engine.counters().open_scopes(), 0);
        // the plan was for one call
        assert!(exception::native(&engine, "constitute", |e| {
            e.constitute(1, 1, &map, u8::wrap(&data))
        })
        .is_ok());
        assert_eq!(engine.counters().frames_created(), 1);
    }

    #[test]
    fn unfired_fault_does_not_leak_to_next_call() {
        let engine = SoftEngine::new(SoftConfig::default());
        engine.inject("noop", FaultPlan::once(Severity::Error, 410, "x"));
        let _: crate::error::Result<()> = exception::native(&engine, "noop", |_| Ok(()));
        assert!(engine.enter().is_ok());
    }

    #[test]
    fn constitute_and_export_cmyk() {
        let engine = SoftEngine::new(SoftConfig::default());
        let frame = rgb(&engine, &[255, 0, 0, 0, 0, 255], 2, 1);
        let map = ComponentMap::parse("CMYK").unwrap();
        let mut out = [0u8; 8];
        engine
            .export(&frame, Rectangle::full(2, 1), &map, u8::wrap_mut(&mut out))
            .unwrap();
        assert_eq!(out, [0, 255, 255, 0, 255, 255, 0, 0]);
        let back = engine.constitute(2, 1, &map, u8::wrap(&out)).unwrap();
        assert_eq!(back.pixels(), frame.pixels());
    }

    #[test]
    fn one_pixel_outside_is_background() {
        let engine = SoftEngine::new(SoftConfig::default());
        let frame = rgb(&engine, &[1, 2, 3], 1, 1);
        assert_eq!(engine.one_pixel(&frame, 5, 5).unwrap(), frame.attrs.background_color);
        assert_eq!(engine.one_pixel(&frame, 0, 0).unwrap(), PixelPacket::from_rgba8(1, 2, 3, 255));
    }

    #[test]
    fn signature_is_cached_until_pixels_change() {
        let engine = SoftEngine::new(SoftConfig::default());
        let mut frame = rgb(&engine, &[1, 2, 3, 4, 5, 6], 2, 1);
        let first = engine.signature(&mut frame).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(frame.property(SIGNATURE_PROPERTY), Some(first.clone()));
        frame.pixels_mut()[0] = PixelPacket::WHITE;
        assert_eq!(frame.property(SIGNATURE_PROPERTY), None);
        assert_ne!(engine.signature(&mut frame).unwrap(), first);
    }

    #[test]
    fn clone_frame_sizes() {
        let engine = SoftEngine::new(SoftConfig::default());
        let frame = rgb(&engine, &[0; 12], 2, 2);
        let blank = engine.clone_frame(&frame, 3, 1, false).unwrap();
        assert_eq!((blank.columns(), blank.rows()), (3, 1));
        assert!(blank.pixels().iter().all(|p| *p == frame.attrs.background_color));
        let exact = engine.clone_frame(&frame, 2, 2, true).unwrap();
        assert_eq!(exact.pixels(), frame.pixels());
        assert_ne!(exact.id(), frame.id());
        assert_eq!(
            engine.clone_frame(&frame, 0, 2, true).unwrap_err().code,
            codes::OPTION
        );
    }

    #[test]
    fn unknown_formats_need_a_delegate() {
        let engine = SoftEngine::new(SoftConfig::default());
        let err = engine
            .decode_blob(&ImageInfo::default(), b"not an image")
            .unwrap_err();
        assert_eq!(err.code, codes::MISSING_DELEGATE);
        let err = engine
            .decode_blob(&ImageInfo::default().with_magick("gif"), b"GIF89a")
            .unwrap_err();
        assert_eq!(err.code, codes::MISSING_DELEGATE);
    }

    #[test]
    fn allocate_requires_a_size() {
        let engine = SoftEngine::new(SoftConfig::default());
        assert_eq!(engine.allocate(&ImageInfo::default()).unwrap_err().code, codes::OPTION);
        let list = engine
            .allocate(&ImageInfo::default().with_size(3, 2).with_background(PixelPacket::BLACK))
            .unwrap();
        assert_eq!(list.head_frame().pixel(2, 1), PixelPacket::BLACK);
        let huge = SoftEngine::new(SoftConfig::default().with_max_pixels(4));
        assert_eq!(
            huge.allocate(&ImageInfo::default().with_size(3, 2)).unwrap_err().code,
            codes::RESOURCE_LIMIT
        );
    }
}
