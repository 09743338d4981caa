// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! File formats of the software engine.

- `PNG`: single frame, 8 or 16 bits per sample, through the `png` crate.
  Decoding expands palettes and low bit depths; the ICC profile, if present,
  is kept as the `icc` profile.
- `SEQ`: the engine's own container. It stores every frame of a list with all
  of its attributes, profiles, properties and palette, so a list survives a
  round trip unchanged.
*/

use super::SoftEngine;
use super::faults::{self, codes};
use super::frame::{FrameAttributes, SoftFrame};
use crate::attributes::{
    ColorspaceType, CompressionType, DisposeType, FilterType, OrientationType, RenderingIntent,
    ResolutionUnits,
};
use crate::engine::NativeFrame;
use crate::error::NativeFault;
use crate::pixel_formats::{Element, PixelPacket};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Png,
    Seq,
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const SEQ_MAGIC: &[u8] = b"FHSEQ1\n\0";

impl Format {
    pub(crate) fn from_name(name: &str) -> Option<Format> {
        match name.to_ascii_uppercase().as_str() {
            "PNG" => Some(Format::Png),
            "SEQ" => Some(Format::Seq),
            _ => None,
        }
    }

    pub(crate) fn sniff(bytes: &[u8]) -> Option<Format> {
        if bytes.starts_with(PNG_SIGNATURE) {
            Some(Format::Png)
        } else if bytes.starts_with(SEQ_MAGIC) {
            Some(Format::Seq)
        } else {
            None
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Format::Png => "PNG",
            Format::Seq => "SEQ",
        }
    }

    /// Whether one file can hold several frames.
    pub(crate) fn adjoins(self) -> bool {
        matches!(self, Format::Seq)
    }
}

pub(crate) fn decode(
    engine: &SoftEngine,
    format: Format,
    bytes: &[u8],
    ping: bool,
) -> Result<Vec<SoftFrame>, NativeFault> {
    let mut frames = match format {
        Format::Png => vec![decode_png(engine, bytes, ping)?],
        Format::Seq => decode_seq(engine, bytes, ping)?,
    };
    for frame in &mut frames {
        frame.attrs.magick = format.name().to_string();
    }
    Ok(frames)
}

/// Encodes `frames`; formats that cannot adjoin take the first frame only.
pub(crate) fn encode(format: Format, frames: &[&SoftFrame]) -> Result<Vec<u8>, NativeFault> {
    let Some(first) = frames.first() else {
        return Err(faults::option("no frames to encode"));
    };
    for frame in frames {
        frame.require_pixels()?;
    }
    match format {
        Format::Png => encode_png(first),
        Format::Seq => Ok(encode_seq(frames)),
    }
}

fn png_decode_fault(err: png::DecodingError) -> NativeFault {
    match err {
        png::DecodingError::IoError(io) => {
            NativeFault::coded(codes::BLOB, "unable to read PNG data").with_description(io.to_string())
        }
        other => faults::corrupt("corrupt PNG image").with_description(other.to_string()),
    }
}

fn png_encode_fault(err: png::EncodingError) -> NativeFault {
    NativeFault::coded(codes::BLOB, "unable to encode PNG image").with_description(err.to_string())
}

fn decode_png(engine: &SoftEngine, bytes: &[u8], ping: bool) -> Result<SoftFrame, NativeFault> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder.read_info().map_err(png_decode_fault)?;
    let (width, height, source_depth, icc) = {
        let info = reader.info();
        (
            info.width,
            info.height,
            info.bit_depth,
            info.icc_profile.as_ref().map(|p| p.to_vec()),
        )
    };
    engine.check_size(width, height)?;

    let mut attrs = FrameAttributes::with_depth(if source_depth == png::BitDepth::Sixteen {
        16
    } else {
        8
    });
    attrs.compression = CompressionType::Zip;

    let (color_type, depth) = reader.output_color_type();
    let channels = match color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        png::ColorType::Indexed => {
            return Err(faults::corrupt("palette was not expanded"));
        }
    };
    attrs.matte = channels == 2 || channels == 4;

    let mut frame = if ping {
        SoftFrame::pinged(engine.counters_arc(), width, height, attrs)
    } else {
        let sample_bytes = if depth == png::BitDepth::Sixteen { 2 } else { 1 };
        let line = width as usize * channels * sample_bytes;
        let mut buf = vec![0u8; line * height as usize];
        let output = reader.next_frame(&mut buf).map_err(png_decode_fault)?;
        let stride = output.line_size.max(line);
        let sample = |row: &[u8], i: usize| -> u16 {
            if sample_bytes == 2 {
                u16::from_be_bytes([row[i * 2], row[i * 2 + 1]])
            } else {
                row[i].to_quantum()
            }
        };
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as usize {
            let row = &buf[y * stride..y * stride + line];
            for x in 0..width as usize {
                let base = x * channels;
                let pixel = match channels {
                    1 => {
                        let g = sample(row, base);
                        PixelPacket::opaque(g, g, g)
                    }
                    2 => {
                        let g = sample(row, base);
                        PixelPacket::new(g, g, g, sample(row, base + 1))
                    }
                    3 => PixelPacket::opaque(
                        sample(row, base),
                        sample(row, base + 1),
                        sample(row, base + 2),
                    ),
                    _ => PixelPacket::new(
                        sample(row, base),
                        sample(row, base + 1),
                        sample(row, base + 2),
                        sample(row, base + 3),
                    ),
                };
                pixels.push(pixel);
            }
        }
        SoftFrame::from_pixels(engine.counters_arc(), width, height, pixels, attrs)
    };
    if let Some(icc) = icc {
        frame.set_profile("icc", Some(&icc))?;
    }
    Ok(frame)
}

fn encode_png(frame: &SoftFrame) -> Result<Vec<u8>, NativeFault> {
    let sixteen = frame.attrs.depth > 8;
    let mut data = Vec::with_capacity(frame.pixels().len() * if sixteen { 8 } else { 4 });
    for p in frame.pixels() {
        for q in [p.red, p.green, p.blue, p.alpha] {
            if sixteen {
                data.extend_from_slice(&q.to_be_bytes());
            } else {
                data.push(u8::from_quantum(q));
            }
        }
    }
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, frame.columns(), frame.rows());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(if sixteen {
            png::BitDepth::Sixteen
        } else {
            png::BitDepth::Eight
        });
        let mut writer = encoder.write_header().map_err(png_encode_fault)?;
        writer.write_image_data(&data).map_err(png_encode_fault)?;
        writer.finish().map_err(png_encode_fault)?;
    }
    Ok(out)
}

struct SeqWriter {
    out: Vec<u8>,
}

impl SeqWriter {
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }
    fn u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn f64(&mut self, v: f64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn bytes(&mut self, v: &[u8]) {
        self.u32(v.len() as u32);
        self.out.extend_from_slice(v);
    }
    fn string(&mut self, v: &str) {
        self.bytes(v.as_bytes());
    }
    fn color(&mut self, p: PixelPacket) {
        for q in [p.red, p.green, p.blue, p.alpha] {
            self.u16(q);
        }
    }
}

fn encode_seq(frames: &[&SoftFrame]) -> Vec<u8> {
    let mut w = SeqWriter { out: SEQ_MAGIC.to_vec() };
    w.u32(frames.len() as u32);
    for frame in frames {
        let a = &frame.attrs;
        w.u32(frame.columns());
        w.u32(frame.rows());
        w.u32(a.filter.code());
        w.u32(a.depth);
        w.u32(a.compression.code());
        w.u32(a.delay);
        w.u32(a.dispose.code());
        w.u32(a.iterations);
        w.u32(a.units.code());
        w.f64(a.x_resolution);
        w.f64(a.y_resolution);
        w.u32(a.quality);
        w.u32(a.rendering_intent.code());
        w.u8(a.matte as u8);
        w.color(a.border_color);
        w.color(a.background_color);
        w.u32(a.colorspace.code());
        w.u32(a.orientation.code());
        w.f64(a.fuzz);
        w.string(&a.filename);

        w.u32(frame.profiles().len() as u32);
        for (name, data) in frame.profiles() {
            w.string(name);
            w.bytes(data);
        }
        w.u32(frame.properties().len() as u32);
        for (name, value) in frame.properties() {
            w.string(name);
            w.string(value);
        }
        match frame.palette() {
            Some((colormap, indexes)) => {
                w.u32(colormap.len() as u32);
                for c in colormap {
                    w.color(*c);
                }
                for i in indexes {
                    w.u32(*i);
                }
            }
            None => {
                w.u32(0);
                for p in frame.pixels() {
                    w.color(*p);
                }
            }
        }
    }
    w.out
}

struct SeqReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SeqReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], NativeFault> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| faults::corrupt("unexpected end of SEQ data"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
    fn u8(&mut self) -> Result<u8, NativeFault> {
        Ok(self.take(1)?[0])
    }
    fn u16(&mut self) -> Result<u16, NativeFault> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
    fn u32(&mut self) -> Result<u32, NativeFault> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
    fn f64(&mut self) -> Result<f64, NativeFault> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_le_bytes(raw))
    }
    fn bytes(&mut self) -> Result<&'a [u8], NativeFault> {
        let len = self.u32()? as usize;
        self.take(len)
    }
    fn string(&mut self) -> Result<String, NativeFault> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| faults::corrupt("SEQ string is not UTF-8"))
    }
    fn color(&mut self) -> Result<PixelPacket, NativeFault> {
        Ok(PixelPacket::new(self.u16()?, self.u16()?, self.u16()?, self.u16()?))
    }
    fn coded<T>(&mut self, from_code: fn(u32) -> Option<T>) -> Result<T, NativeFault> {
        let code = self.u32()?;
        from_code(code).ok_or_else(|| faults::corrupt(format!("unknown code {code} in SEQ data")))
    }
}

fn decode_seq(engine: &SoftEngine, bytes: &[u8], ping: bool) -> Result<Vec<SoftFrame>, NativeFault> {
    let mut r = SeqReader { bytes, pos: 0 };
    if r.take(SEQ_MAGIC.len())? != SEQ_MAGIC {
        return Err(faults::corrupt("not a SEQ container"));
    }
    let count = r.u32()? as usize;
    if count == 0 {
        return Err(faults::corrupt("SEQ container holds no frames"));
    }
    engine.check_frames(count)?;
    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        let columns = r.u32()?;
        let rows = r.u32()?;
        engine.check_size(columns, rows)?;
        let mut attrs = FrameAttributes::with_depth(8);
        attrs.filter = r.coded(FilterType::from_code)?;
        attrs.depth = r.u32()?;
        attrs.compression = r.coded(CompressionType::from_code)?;
        attrs.delay = r.u32()?;
        attrs.dispose = r.coded(DisposeType::from_code)?;
        attrs.iterations = r.u32()?;
        attrs.units = r.coded(ResolutionUnits::from_code)?;
        attrs.x_resolution = r.f64()?;
        attrs.y_resolution = r.f64()?;
        attrs.quality = r.u32()?;
        attrs.rendering_intent = r.coded(RenderingIntent::from_code)?;
        attrs.matte = r.u8()? != 0;
        attrs.border_color = r.color()?;
        attrs.background_color = r.color()?;
        attrs.colorspace = r.coded(ColorspaceType::from_code)?;
        attrs.orientation = r.coded(OrientationType::from_code)?;
        attrs.fuzz = r.f64()?;
        attrs.filename = r.string()?;

        let mut profiles = Vec::new();
        for _ in 0..r.u32()? {
            profiles.push((r.string()?, r.bytes()?.to_vec()));
        }
        let mut properties = Vec::new();
        for _ in 0..r.u32()? {
            properties.push((r.string()?, r.string()?));
        }

        let len = columns as usize * rows as usize;
        let colormap_len = r.u32()? as usize;
        let per_pixel = if colormap_len > 0 { 4 } else { 8 };
        if colormap_len.saturating_mul(8) > r.remaining()
            || len.saturating_mul(per_pixel) > r.remaining()
        {
            return Err(faults::corrupt("SEQ frame is truncated"));
        }
        let mut frame = if colormap_len > 0 {
            let mut colormap = Vec::with_capacity(colormap_len);
            for _ in 0..colormap_len {
                colormap.push(r.color()?);
            }
            let mut indexes = Vec::with_capacity(len);
            for _ in 0..len {
                let index = r.u32()?;
                if index as usize >= colormap_len {
                    return Err(faults::corrupt("SEQ palette index out of range"));
                }
                indexes.push(index);
            }
            if ping {
                SoftFrame::pinged(engine.counters_arc(), columns, rows, attrs)
            } else {
                let mut frame = SoftFrame::blank(
                    engine.counters_arc(),
                    columns,
                    rows,
                    PixelPacket::TRANSPARENT,
                    attrs,
                );
                frame.set_palette(colormap, indexes);
                frame
            }
        } else {
            let mut pixels = Vec::with_capacity(if ping { 0 } else { len });
            for _ in 0..len {
                let p = r.color()?;
                if !ping {
                    pixels.push(p);
                }
            }
            if ping {
                SoftFrame::pinged(engine.counters_arc(), columns, rows, attrs)
            } else {
                SoftFrame::from_pixels(engine.counters_arc(), columns, rows, pixels, attrs)
            }
        };
        for (name, data) in profiles {
            frame.set_profile(&name, Some(&data))?;
        }
        for (name, value) in properties {
            frame.set_property(&name, &value)?;
        }
        frames.push(frame);
    }
    if r.remaining() != 0 {
        logwise::warn_sync!(
            "SEQ container has {extra} trailing bytes",
            extra = r.remaining()
        );
    }
    Ok(frames)
}
