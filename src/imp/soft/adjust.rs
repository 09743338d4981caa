// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! In-place operations of the software engine: adjustments, quantization,
//! drawing and analysis.

use super::effects::{blend, bounding_box};
use super::faults::{self, codes};
use super::frame::{SoftFrame, similar};
use crate::attributes::{ColorspaceType, CompositeOperator};
use crate::engine::{Adjustment, Analysis, NativeFrame};
use crate::error::NativeFault;
use crate::geometry::Rectangle;
use crate::info::{DrawInfo, QuantizeInfo};
use crate::pixel_formats::{PixelPacket, QUANTUM_MAX};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;

const Q: f64 = QUANTUM_MAX as f64;

fn quantum(v: f64) -> u16 {
    v.round().clamp(0.0, Q) as u16
}

/// Applies `f` to the red, green and blue quanta of every pixel.
fn map_channels(frame: &mut SoftFrame, f: impl Fn(u16) -> u16) {
    for p in frame.pixels_mut() {
        *p = PixelPacket::new(f(p.red), f(p.green), f(p.blue), p.alpha);
    }
}

fn map_pixels(frame: &mut SoftFrame, f: impl Fn(PixelPacket) -> PixelPacket) {
    for p in frame.pixels_mut() {
        *p = f(*p);
    }
}

fn rgb_to_hsl(p: PixelPacket) -> (f64, f64, f64) {
    let (r, g, b) = (p.red as f64 / Q, p.green as f64 / Q, p.blue as f64 / Q);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;
    if delta == 0.0 {
        return (0.0, 0.0, l);
    }
    let s = if l <= 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };
    let h = if r == max {
        ((g - b) / delta).rem_euclid(6.0)
    } else if g == max {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    } / 6.0;
    (h, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64, alpha: u16) -> PixelPacket {
    if s == 0.0 {
        let v = quantum(l * Q);
        return PixelPacket::new(v, v, v, alpha);
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    let hue = |h: f64| {
        let h = h.rem_euclid(1.0);
        let v = if h < 1.0 / 6.0 {
            m1 + (m2 - m1) * 6.0 * h
        } else if h < 0.5 {
            m2
        } else if h < 2.0 / 3.0 {
            m1 + (m2 - m1) * (2.0 / 3.0 - h) * 6.0
        } else {
            m1
        };
        quantum(v * Q)
    };
    PixelPacket::new(hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0), alpha)
}

/// Converts the frame to pseudo-class, keeping colours in first-seen order.
fn ensure_palette(frame: &mut SoftFrame) -> Result<(), NativeFault> {
    if frame.palette().is_some() {
        return Ok(());
    }
    let mut slots: HashMap<PixelPacket, u32> = HashMap::new();
    let mut colormap = Vec::new();
    let mut indexes = Vec::with_capacity(frame.pixels().len());
    for p in frame.pixels() {
        let next = colormap.len() as u32;
        let index = *slots.entry(*p).or_insert_with(|| {
            colormap.push(*p);
            next
        });
        indexes.push(index);
    }
    if colormap.len() > u16::MAX as usize + 1 {
        return Err(NativeFault::coded(
            codes::IMAGE,
            format!("{} colours do not fit a colormap", colormap.len()),
        ));
    }
    frame.set_palette(colormap, indexes);
    Ok(())
}

fn equalize_channel(values: &mut dyn Iterator<Item = u16>) -> Vec<u16> {
    let mut histogram = BTreeMap::<u16, u64>::new();
    let mut total = 0u64;
    for v in values {
        *histogram.entry(v).or_default() += 1;
        total += 1;
    }
    let mut table = vec![0u16; QUANTUM_MAX as usize + 1];
    let first = histogram.values().next().copied().unwrap_or(0);
    let mut cumulative = 0u64;
    for (&v, &count) in &histogram {
        cumulative += count;
        table[v as usize] = if total == first {
            v
        } else {
            quantum((cumulative - first) as f64 / (total - first) as f64 * Q)
        };
    }
    table
}

/// Applies `adjustment` to `frame`.
pub(crate) fn adjust(frame: &mut SoftFrame, adjustment: &Adjustment) -> Result<(), NativeFault> {
    frame.require_pixels()?;
    match adjustment {
        Adjustment::Contrast { sharpen } => {
            let sign = if *sharpen { 1.0 } else { -1.0 };
            map_channels(frame, |v| {
                let x = v as f64 / Q;
                let target = 0.5 * ((PI * (x - 0.5)).sin() + 1.0);
                quantum((x + 0.5 * sign * (target - x)) * Q)
            });
        }
        Adjustment::Equalize => {
            let red = equalize_channel(&mut frame.pixels().iter().map(|p| p.red));
            let green = equalize_channel(&mut frame.pixels().iter().map(|p| p.green));
            let blue = equalize_channel(&mut frame.pixels().iter().map(|p| p.blue));
            map_pixels(frame, |p| {
                PixelPacket::new(
                    red[p.red as usize],
                    green[p.green as usize],
                    blue[p.blue as usize],
                    p.alpha,
                )
            });
        }
        Adjustment::Gamma(gamma) => {
            if !(*gamma > 0.0) {
                return Err(faults::option(format!("gamma must be positive, got {gamma}")));
            }
            map_channels(frame, |v| quantum(Q * (v as f64 / Q).powf(1.0 / gamma)));
        }
        Adjustment::Level { black, white, gamma } => {
            if !(white > black) || !(*gamma > 0.0) {
                return Err(faults::option(format!(
                    "invalid levels {black},{white} gamma {gamma}"
                )));
            }
            map_channels(frame, |v| {
                let x = ((v as f64 - black) / (white - black)).clamp(0.0, 1.0);
                quantum(Q * x.powf(1.0 / gamma))
            });
        }
        Adjustment::Negate { grayscale } => {
            let only_gray = *grayscale;
            map_pixels(frame, |p| {
                if only_gray && !p.is_gray() {
                    return p;
                }
                PixelPacket::new(
                    QUANTUM_MAX - p.red,
                    QUANTUM_MAX - p.green,
                    QUANTUM_MAX - p.blue,
                    p.alpha,
                )
            });
        }
        Adjustment::Normalize => {
            let pixels = frame.pixels();
            let bounds = |f: fn(&PixelPacket) -> u16| {
                let lo = pixels.iter().map(f).min().unwrap_or(0);
                let hi = pixels.iter().map(f).max().unwrap_or(QUANTUM_MAX);
                (lo as f64, hi as f64)
            };
            let ranges = [bounds(|p| p.red), bounds(|p| p.green), bounds(|p| p.blue)];
            let stretch = |v: u16, (lo, hi): (f64, f64)| {
                if hi <= lo {
                    v
                } else {
                    quantum((v as f64 - lo) / (hi - lo) * Q)
                }
            };
            map_pixels(frame, |p| {
                PixelPacket::new(
                    stretch(p.red, ranges[0]),
                    stretch(p.green, ranges[1]),
                    stretch(p.blue, ranges[2]),
                    p.alpha,
                )
            });
        }
        Adjustment::Modulate {
            brightness,
            saturation,
            hue,
        } => {
            map_pixels(frame, |p| {
                let (h, s, l) = rgb_to_hsl(p);
                let h = h + (hue - 100.0) / 200.0;
                let s = (s * saturation / 100.0).clamp(0.0, 1.0);
                let l = (l * brightness / 100.0).clamp(0.0, 1.0);
                hsl_to_rgb(h, s, l, p.alpha)
            });
        }
        Adjustment::Solarize { threshold } => {
            map_channels(frame, |v| {
                if v as f64 > *threshold {
                    QUANTUM_MAX - v
                } else {
                    v
                }
            });
        }
        Adjustment::Threshold { threshold } => {
            map_pixels(frame, |p| {
                if p.intensity() as f64 > *threshold {
                    PixelPacket { alpha: p.alpha, ..PixelPacket::WHITE }
                } else {
                    PixelPacket { alpha: p.alpha, ..PixelPacket::BLACK }
                }
            });
        }
        Adjustment::Opaque { target, fill } => {
            let fuzz = frame.attrs.fuzz;
            map_pixels(frame, |p| if similar(p, *target, fuzz) { *fill } else { p });
        }
        Adjustment::Transparent { color, alpha } => {
            let fuzz = frame.attrs.fuzz;
            map_pixels(frame, |p| {
                if similar(p, *color, fuzz) {
                    PixelPacket { alpha: *alpha, ..p }
                } else {
                    p
                }
            });
            frame.attrs.matte = true;
        }
        Adjustment::Strip => {
            frame.profiles_mut().clear();
            frame.properties_mut().remove("comment");
        }
        Adjustment::CycleColormap { amount } => {
            ensure_palette(frame)?;
            let (colormap, indexes) = match frame.palette() {
                Some((map, indexes)) => (map.to_vec(), indexes.to_vec()),
                None => return Err(NativeFault::coded(codes::IMAGE, "no colormap")),
            };
            let len = colormap.len() as i64;
            let shifted = indexes
                .iter()
                .map(|&i| (i as i64 + *amount as i64).rem_euclid(len) as u32)
                .collect();
            frame.set_palette(colormap, shifted);
        }
        Adjustment::SortColormap => {
            let Some((colormap, indexes)) = frame.palette() else {
                return Ok(());
            };
            let mut order: Vec<usize> = (0..colormap.len()).collect();
            order.sort_by_key(|&i| std::cmp::Reverse(colormap[i].intensity()));
            let mut remap = vec![0u32; colormap.len()];
            for (new, &old) in order.iter().enumerate() {
                remap[old] = new as u32;
            }
            let sorted = order.iter().map(|&i| colormap[i]).collect();
            let indexes = indexes.iter().map(|&i| remap[i as usize]).collect();
            frame.set_palette(sorted, indexes);
        }
        Adjustment::SetColorspace(space) => frame.attrs.colorspace = *space,
        Adjustment::TransformColorspace(space) => match space {
            ColorspaceType::Rgb | ColorspaceType::Srgb | ColorspaceType::Transparent => {
                frame.attrs.colorspace = *space
            }
            ColorspaceType::Gray => {
                map_pixels(frame, |p| {
                    let i = p.intensity();
                    PixelPacket::new(i, i, i, p.alpha)
                });
                frame.attrs.colorspace = *space;
            }
            other => {
                return Err(faults::missing_delegate(format!(
                    "no transform to colorspace {other:?}"
                )));
            }
        },
    }
    Ok(())
}

/// Reduces the frame to at most `info.number_colors` colours and makes it
/// pseudo-class.
pub(crate) fn quantize(frame: &mut SoftFrame, info: &QuantizeInfo) -> Result<(), NativeFault> {
    frame.require_pixels()?;
    if info.number_colors == 0 {
        return Err(faults::option("number of colors must be positive"));
    }
    let limit = info.number_colors as usize;
    // the frame changes only once the colormap is complete
    let mut original = frame.pixels().to_vec();
    let gray = info.colorspace == ColorspaceType::Gray;
    if gray {
        for p in &mut original {
            let i = p.intensity();
            *p = PixelPacket::new(i, i, i, p.alpha);
        }
    }

    // drop low bits until few enough buckets remain
    let mut shift = 0u32;
    let buckets = loop {
        let mut buckets: Vec<(PixelPacket, [u64; 5])> = Vec::new();
        let mut slot: HashMap<PixelPacket, usize> = HashMap::new();
        for p in &original {
            let key = PixelPacket::new(p.red >> shift, p.green >> shift, p.blue >> shift, p.alpha >> shift);
            let i = *slot.entry(key).or_insert_with(|| {
                buckets.push((key, [0; 5]));
                buckets.len() - 1
            });
            let acc = &mut buckets[i].1;
            acc[0] += p.red as u64;
            acc[1] += p.green as u64;
            acc[2] += p.blue as u64;
            acc[3] += p.alpha as u64;
            acc[4] += 1;
        }
        if buckets.len() <= limit || shift >= 15 {
            break (buckets, slot);
        }
        shift += 1;
    };
    let (buckets, slot) = buckets;
    let colormap: Vec<PixelPacket> = buckets
        .iter()
        .map(|(_, acc)| {
            let n = acc[4];
            PixelPacket::new(
                (acc[0] / n) as u16,
                (acc[1] / n) as u16,
                (acc[2] / n) as u16,
                (acc[3] / n) as u16,
            )
        })
        .collect();
    let mut indexes: Vec<u32> = original
        .iter()
        .map(|p| {
            let key = PixelPacket::new(p.red >> shift, p.green >> shift, p.blue >> shift, p.alpha >> shift);
            slot.get(&key).copied().unwrap_or(0) as u32
        })
        .collect();
    let mut colormap = colormap;
    if colormap.len() > limit {
        // fewer colours than one bit per channel allows: fold into the nearest kept entry
        colormap.truncate(limit);
        for (index, p) in indexes.iter_mut().zip(&original) {
            if *index as usize >= limit {
                *index = nearest(&colormap, *p);
            }
        }
    }
    let error = if info.measure_error {
        let total: f64 = original
            .iter()
            .zip(&indexes)
            .map(|(p, &i)| {
                let c = colormap[i as usize];
                let d = |a: u16, b: u16| (a as f64 - b as f64).powi(2);
                (d(p.red, c.red) + d(p.green, c.green) + d(p.blue, c.blue)).sqrt()
            })
            .sum();
        Some(total / original.len().max(1) as f64)
    } else {
        None
    };
    frame.set_palette(colormap, indexes);
    if gray {
        frame.attrs.colorspace = ColorspaceType::Gray;
    }
    if let Some(error) = error {
        frame
            .properties_mut()
            .insert("quantize:mean-error".into(), format!("{error:.3}"));
    }
    Ok(())
}

fn nearest(colormap: &[PixelPacket], p: PixelPacket) -> u32 {
    let distance = |c: &PixelPacket| {
        let d = |a: u16, b: u16| (a as i64 - b as i64).pow(2);
        d(c.red, p.red) + d(c.green, p.green) + d(c.blue, p.blue) + d(c.alpha, p.alpha)
    };
    colormap
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| distance(c))
        .map_or(0, |(i, _)| i as u32)
}

fn coordinates(token: &str) -> Option<(f64, f64)> {
    let (x, y) = token.split_once(',')?;
    let point: (f64, f64) = (x.trim().parse().ok()?, y.trim().parse().ok()?);
    (point.0.is_finite() && point.1.is_finite()).then_some(point)
}

enum Primitive {
    Point((f64, f64)),
    Line((f64, f64), (f64, f64)),
    Rectangle((f64, f64), (f64, f64)),
    Circle { center: (f64, f64), radius: f64 },
}

/// Parses every primitive before anything is painted.
fn primitives(text: &str) -> Result<Vec<Primitive>, NativeFault> {
    let mut out = Vec::new();
    for command in text.split([';', '\n']).map(str::trim).filter(|c| !c.is_empty()) {
        let bad = || NativeFault::coded(codes::DRAW, format!("non-conforming drawing primitive `{command}`"));
        let mut words = command.split_whitespace();
        let name = words.next().unwrap_or_default().to_ascii_lowercase();
        let points: Vec<(f64, f64)> = words.map(coordinates).collect::<Option<_>>().ok_or_else(bad)?;
        let spans = |a: (f64, f64), b: (f64, f64)| (b.0 - a.0).is_finite() && (b.1 - a.1).is_finite();
        out.push(match (name.as_str(), points.as_slice()) {
            ("point", [p]) => Primitive::Point(*p),
            ("line", [a, b]) if spans(*a, *b) => Primitive::Line(*a, *b),
            ("rectangle", [a, b]) if spans(*a, *b) => Primitive::Rectangle(*a, *b),
            ("circle", [center, edge]) if spans(*center, *edge) => {
                let radius = (edge.0 - center.0).hypot(edge.1 - center.1);
                if !radius.is_finite() {
                    return Err(bad());
                }
                Primitive::Circle {
                    center: *center,
                    radius,
                }
            }
            _ => return Err(bad()),
        });
    }
    if out.is_empty() {
        return Err(NativeFault::coded(codes::DRAW, "no drawing primitive"));
    }
    Ok(out)
}

/// Scratch copy of a frame's pixels; drawing commits only when every
/// primitive painted.
struct Canvas {
    pixels: Vec<PixelPacket>,
    columns: i64,
    rows: i64,
}

impl Canvas {
    fn paint(&mut self, x: i64, y: i64, color: PixelPacket) -> Result<(), NativeFault> {
        if x < 0 || y < 0 || x >= self.columns || y >= self.rows {
            return Ok(());
        }
        let i = (y * self.columns + x) as usize;
        if let Some(p) = blend(CompositeOperator::Over, self.pixels[i], color)? {
            self.pixels[i] = p;
        }
        Ok(())
    }

    fn line(&mut self, (x0, y0): (f64, f64), (x1, y1): (f64, f64), color: PixelPacket) -> Result<(), NativeFault> {
        let (dx, dy) = (x1 - x0, y1 - y0);
        // walk only the part of the segment within a pixel of the canvas
        let (mut t0, mut t1) = (0.0f64, 1.0f64);
        for (start, delta, limit) in [(x0, dx, self.columns as f64), (y0, dy, self.rows as f64)] {
            if delta == 0.0 {
                if start < -1.0 || start > limit {
                    return Ok(());
                }
                continue;
            }
            let (a, b) = ((-1.0 - start) / delta, (limit - start) / delta);
            t0 = t0.max(a.min(b));
            t1 = t1.min(a.max(b));
        }
        if t0 > t1 {
            return Ok(());
        }
        let steps = (dx.abs().max(dy.abs()) * (t1 - t0)).ceil().max(1.0) as i64;
        for s in 0..=steps {
            let t = t0 + (t1 - t0) * s as f64 / steps as f64;
            self.paint((x0 + dx * t).round() as i64, (y0 + dy * t).round() as i64, color)?;
        }
        Ok(())
    }

    /// Rows or columns of the canvas between `lo` and `hi`, inclusive.
    fn span(lo: f64, hi: f64, limit: i64) -> std::ops::RangeInclusive<i64> {
        let lo = lo.floor().max(0.0);
        let hi = hi.ceil().min((limit - 1) as f64);
        lo as i64..=hi as i64
    }
}

/// Renders the primitives in `info`, one per line.
///
/// Understands `point x,y`, `line x0,y0 x1,y1`, `rectangle x0,y0 x1,y1` and
/// `circle cx,cy px,py`. A bad primitive anywhere leaves the frame untouched.
pub(crate) fn draw(frame: &mut SoftFrame, info: &DrawInfo) -> Result<(), NativeFault> {
    frame.require_pixels()?;
    let primitives = primitives(&info.primitive)?;
    let stroke = if info.stroke.alpha > 0 && info.stroke_width > 0.0 {
        Some(info.stroke)
    } else {
        None
    };
    let fill = (info.fill.alpha > 0).then_some(info.fill);
    let mut canvas = Canvas {
        pixels: frame.pixels().to_vec(),
        columns: frame.columns() as i64,
        rows: frame.rows() as i64,
    };
    for primitive in &primitives {
        match *primitive {
            Primitive::Point(p) => {
                if let Some(c) = fill.or(stroke) {
                    canvas.paint(p.0.round() as i64, p.1.round() as i64, c)?;
                }
            }
            Primitive::Line(a, b) => {
                if let Some(c) = stroke.or(fill) {
                    canvas.line(a, b, c)?;
                }
            }
            Primitive::Rectangle(a, b) => {
                let (x0, x1) = (a.0.min(b.0).round(), a.0.max(b.0).round());
                let (y0, y1) = (a.1.min(b.1).round(), a.1.max(b.1).round());
                if let Some(c) = fill {
                    for y in Canvas::span(y0, y1, canvas.rows) {
                        for x in Canvas::span(x0, x1, canvas.columns) {
                            canvas.paint(x, y, c)?;
                        }
                    }
                }
                if let Some(c) = stroke {
                    let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)];
                    for w in corners.windows(2) {
                        canvas.line(w[0], w[1], c)?;
                    }
                }
            }
            Primitive::Circle { center, radius } => {
                let (cx, cy) = (center.0.round(), center.1.round());
                let band = if stroke.is_some() { (info.stroke_width / 2.0).max(0.0) } else { 0.0 };
                let reach = radius + band;
                for y in Canvas::span(cy - reach, cy + reach, canvas.rows) {
                    for x in Canvas::span(cx - reach, cx + reach, canvas.columns) {
                        let d = (x as f64 - cx).hypot(y as f64 - cy);
                        let color = match stroke {
                            Some(s) if (d - radius).abs() <= band => Some(s),
                            _ if d <= radius => fill,
                            _ => None,
                        };
                        if let Some(c) = color {
                            canvas.paint(x, y, c)?;
                        }
                    }
                }
            }
        }
    }
    frame.pixels_mut().copy_from_slice(&canvas.pixels);
    Ok(())
}

pub(crate) fn analyze(frame: &SoftFrame) -> Result<Analysis, NativeFault> {
    frame.require_pixels()?;
    let pixels = frame.pixels();
    let gray = pixels.iter().all(PixelPacket::is_gray);
    Ok(Analysis {
        gray,
        monochrome: gray && pixels.iter().all(|p| p.red == 0 || p.red == QUANTUM_MAX),
        opaque: frame.is_opaque(),
        bounding_box: bounding_box(frame).unwrap_or(Rectangle::new(0, 0, 0, 0)),
        unique_colors: frame.unique_colors().len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::soft::faults::Counters;
    use crate::imp::soft::frame::FrameAttributes;
    use std::sync::Arc;

    fn frame(pixels: Vec<PixelPacket>, columns: u32) -> SoftFrame {
        let counters = Arc::new(Counters::default());
        let rows = pixels.len() as u32 / columns;
        SoftFrame::from_pixels(&counters, columns, rows, pixels, FrameAttributes::with_depth(16))
    }

    #[test]
    fn negate_twice_is_identity() {
        let original = vec![PixelPacket::opaque(1, 2, 3), PixelPacket::opaque(60000, 0, 5)];
        let mut f = frame(original.clone(), 2);
        adjust(&mut f, &Adjustment::Negate { grayscale: false }).unwrap();
        assert_eq!(f.pixel(0, 0), PixelPacket::opaque(QUANTUM_MAX - 1, QUANTUM_MAX - 2, QUANTUM_MAX - 3));
        adjust(&mut f, &Adjustment::Negate { grayscale: false }).unwrap();
        assert_eq!(f.pixels(), &original[..]);
    }

    #[test]
    fn threshold_splits_on_intensity() {
        let mut f = frame(vec![PixelPacket::opaque(1000, 1000, 1000), PixelPacket::opaque(50000, 50000, 50000)], 2);
        adjust(&mut f, &Adjustment::Threshold { threshold: Q / 2.0 }).unwrap();
        assert_eq!(f.pixels(), &[PixelPacket::BLACK, PixelPacket::WHITE][..]);
    }

    #[test]
    fn gamma_rejects_non_positive() {
        let mut f = frame(vec![PixelPacket::WHITE], 1);
        let err = adjust(&mut f, &Adjustment::Gamma(0.0)).unwrap_err();
        assert_eq!(err.code, codes::OPTION);
    }

    #[test]
    fn modulate_identity_keeps_colors() {
        let original = vec![PixelPacket::opaque(65535, 0, 0), PixelPacket::opaque(0, 32768, 65535)];
        let mut f = frame(original.clone(), 2);
        adjust(&mut f, &Adjustment::Modulate { brightness: 100.0, saturation: 100.0, hue: 100.0 }).unwrap();
        for (a, b) in f.pixels().iter().zip(&original) {
            assert!((a.red as i32 - b.red as i32).abs() <= 1);
            assert!((a.green as i32 - b.green as i32).abs() <= 1);
            assert!((a.blue as i32 - b.blue as i32).abs() <= 1);
        }
    }

    #[test]
    fn quantize_limits_colors() {
        let pixels = (0..64u16).map(|i| PixelPacket::opaque(i * 1000, 0, 0)).collect();
        let mut f = frame(pixels, 8);
        quantize(&mut f, &QuantizeInfo::with_colors(4)).unwrap();
        let colors = f.colormap().map(<[_]>::len).unwrap();
        assert!(colors <= 4 && colors > 0, "{colors}");
        assert!(f.unique_colors().len() <= 4);
    }

    #[test]
    fn rejected_quantize_keeps_pixels_and_colorspace() {
        let pixels = vec![PixelPacket::opaque(60000, 10, 10), PixelPacket::opaque(10, 60000, 10)];
        let mut f = frame(pixels.clone(), 2);
        let info = QuantizeInfo {
            colorspace: ColorspaceType::Gray,
            ..QuantizeInfo::with_colors(0)
        };
        assert_eq!(quantize(&mut f, &info).unwrap_err().code, codes::OPTION);
        assert_eq!(f.pixels(), &pixels[..]);
        assert_ne!(f.attrs.colorspace, ColorspaceType::Gray);
        assert!(f.colormap().is_none());

        quantize(&mut f, &QuantizeInfo { number_colors: 4, ..info }).unwrap();
        assert!(f.pixels().iter().all(PixelPacket::is_gray));
        assert_eq!(f.attrs.colorspace, ColorspaceType::Gray);
    }

    #[test]
    fn cycle_colormap_rotates_indexes() {
        let mut f = frame(vec![PixelPacket::BLACK, PixelPacket::WHITE], 2);
        adjust(&mut f, &Adjustment::CycleColormap { amount: 1 }).unwrap();
        assert_eq!(f.pixels(), &[PixelPacket::WHITE, PixelPacket::BLACK][..]);
    }

    #[test]
    fn draws_rectangles_and_rejects_garbage() {
        let mut f = frame(vec![PixelPacket::WHITE; 16], 4);
        draw(&mut f, &DrawInfo::new("rectangle 1,1 2,2")).unwrap();
        assert_eq!(f.pixel(1, 1), PixelPacket::BLACK);
        assert_eq!(f.pixel(0, 0), PixelPacket::WHITE);
        let err = draw(&mut f, &DrawInfo::new("spiral 1,1")).unwrap_err();
        assert_eq!(err.code, codes::DRAW);
    }

    #[test]
    fn failed_draw_paints_nothing() {
        let mut f = frame(vec![PixelPacket::BLACK; 16], 4);
        let before = f.pixels().to_vec();
        let info = DrawInfo::new("rectangle 0,0 3,3; bogus 1,1").with_fill(PixelPacket::WHITE);
        let err = draw(&mut f, &info).unwrap_err();
        assert_eq!(err.code, codes::DRAW);
        assert_eq!(f.pixels(), &before[..]);

        for text in ["point nan,1", "line 0,0 inf,0", "point 0,0; circle -1e308,0 1e308,0", ""] {
            assert!(draw(&mut f, &DrawInfo::new(text).with_fill(PixelPacket::WHITE)).is_err(), "{text}");
            assert_eq!(f.pixels(), &before[..], "{text}");
        }
    }

    #[test]
    fn huge_shapes_clip_to_the_frame() {
        let mut f = frame(vec![PixelPacket::BLACK; 16], 4);
        draw(&mut f, &DrawInfo::new("circle 1,1 1e300,0").with_fill(PixelPacket::WHITE)).unwrap();
        assert!(f.pixels().iter().all(|p| *p == PixelPacket::WHITE));

        let mut f = frame(vec![PixelPacket::WHITE; 16], 4);
        draw(&mut f, &DrawInfo::new("line -1e6,0 1e6,0")).unwrap();
        assert!((0..4).all(|x| f.pixel(x, 0) == PixelPacket::BLACK));
        assert!((0..4).all(|x| f.pixel(x, 1) == PixelPacket::WHITE));
    }

    #[test]
    fn analysis_reports_gray_and_box() {
        let mut pixels = vec![PixelPacket::WHITE; 9];
        pixels[4] = PixelPacket::BLACK;
        let f = frame(pixels, 3);
        let a = analyze(&f).unwrap();
        assert!(a.gray && a.monochrome && a.opaque);
        assert_eq!(a.bounding_box, Rectangle::new(1, 1, 1, 1));
        assert_eq!(a.unique_colors, 2);
    }
}
