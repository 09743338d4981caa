// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Transforms of the software engine.
//!
//! These are plain reference algorithms: nearest-neighbour sampling for
//! geometry, direct 2D convolution for filters. Every transform produces new
//! frames; the source is never modified.

use super::SoftEngine;
use super::faults::{self, codes};
use super::frame::{SoftFrame, similar};
use crate::attributes::{CompositeOperator, DisposeType, FilterType, NoiseType};
use crate::engine::{Effect, NativeFrame};
use crate::error::NativeFault;
use crate::geometry::Rectangle;
use crate::info::MontageInfo;
use crate::pixel_formats::{PixelPacket, QUANTUM_MAX};
use std::f64::consts::PI;

const Q: f64 = QUANTUM_MAX as f64;
/// Largest convolution kernel side.
const MAX_ORDER: usize = 65;

fn channels(p: PixelPacket) -> [f64; 4] {
    [p.red as f64, p.green as f64, p.blue as f64, p.alpha as f64]
}

fn clamp_q(v: f64) -> u16 {
    v.round().clamp(0.0, Q) as u16
}

fn packet(c: [f64; 4]) -> PixelPacket {
    PixelPacket::new(clamp_q(c[0]), clamp_q(c[1]), clamp_q(c[2]), clamp_q(c[3]))
}

/// The pixel at `(x, y)`, with coordinates clamped to the frame edge.
fn at(frame: &SoftFrame, x: i64, y: i64) -> PixelPacket {
    let x = x.clamp(0, frame.columns() as i64 - 1) as u32;
    let y = y.clamp(0, frame.rows() as i64 - 1) as u32;
    frame.pixel(x, y)
}

/// The pixel at `(x, y)`, or `fill` outside the frame.
fn at_or(frame: &SoftFrame, x: i64, y: i64, fill: PixelPacket) -> PixelPacket {
    if x < 0 || y < 0 || x >= frame.columns() as i64 || y >= frame.rows() as i64 {
        fill
    } else {
        frame.pixel(x as u32, y as u32)
    }
}

fn generate(columns: u32, rows: u32, mut f: impl FnMut(u32, u32) -> PixelPacket) -> Vec<PixelPacket> {
    let mut out = Vec::with_capacity(columns as usize * rows as usize);
    for y in 0..rows {
        for x in 0..columns {
            out.push(f(x, y));
        }
    }
    out
}

fn derive(
    engine: &SoftEngine,
    src: &SoftFrame,
    columns: u32,
    rows: u32,
    pixels: Vec<PixelPacket>,
) -> Result<SoftFrame, NativeFault> {
    engine.check_size(columns, rows)?;
    Ok(src.derive(columns, rows, pixels))
}

fn require_size(columns: u32, rows: u32) -> Result<(), NativeFault> {
    if columns == 0 || rows == 0 {
        return Err(faults::option(format!(
            "negative or zero image size {columns}x{rows}"
        )));
    }
    Ok(())
}

struct Kernel {
    order: usize,
    weights: Vec<f64>,
}

impl Kernel {
    fn half(&self) -> i64 {
        (self.order / 2) as i64
    }

    fn order_for(radius: f64, sigma: f64) -> usize {
        let r = if radius > 0.0 {
            radius.ceil()
        } else {
            (3.0 * sigma).ceil().max(1.0)
        };
        ((2.0 * r + 1.0) as usize).min(MAX_ORDER)
    }

    fn gaussian(radius: f64, sigma: f64) -> Result<Kernel, NativeFault> {
        if !(sigma > 0.0) {
            return Err(faults::option(format!("sigma must be positive, got {sigma}")));
        }
        let order = Self::order_for(radius, sigma);
        let half = (order / 2) as i64;
        let mut weights = Vec::with_capacity(order * order);
        for v in -half..=half {
            for u in -half..=half {
                weights.push((-((u * u + v * v) as f64) / (2.0 * sigma * sigma)).exp());
            }
        }
        let sum: f64 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= sum);
        Ok(Kernel { order, weights })
    }

    fn edge(radius: f64) -> Kernel {
        let order = Self::order_for(radius.max(1.0), 1.0);
        let mut weights = vec![-1.0; order * order];
        weights[order * order / 2] = (order * order - 1) as f64;
        Kernel { order, weights }
    }

    fn emboss(radius: f64, sigma: f64) -> Kernel {
        let sigma = if sigma > 0.0 { sigma } else { 1.0 };
        let order = Self::order_for(radius.max(1.0), sigma);
        let half = (order / 2) as i64;
        let mut weights = Vec::with_capacity(order * order);
        for v in -half..=half {
            for u in -half..=half {
                let w = if u == 0 && v == 0 {
                    1.0
                } else {
                    (u + v) as f64 * (-((u * u + v * v) as f64) / (2.0 * sigma * sigma)).exp()
                };
                weights.push(w);
            }
        }
        Kernel { order, weights }
    }
}

/// Convolves the colour channels; alpha is kept.
fn convolve(src: &SoftFrame, kernel: &Kernel, bias: f64) -> Vec<PixelPacket> {
    let half = kernel.half();
    generate(src.columns(), src.rows(), |x, y| {
        let mut acc = [bias; 3];
        let mut k = 0;
        for v in -half..=half {
            for u in -half..=half {
                let c = channels(at(src, x as i64 + u, y as i64 + v));
                let w = kernel.weights[k];
                acc[0] += w * c[0];
                acc[1] += w * c[1];
                acc[2] += w * c[2];
                k += 1;
            }
        }
        let alpha = src.pixel(x, y).alpha as f64;
        packet([acc[0], acc[1], acc[2], alpha])
    })
}

fn grayscale(pixels: &mut [PixelPacket]) {
    for p in pixels {
        let i = p.intensity();
        *p = PixelPacket::new(i, i, i, p.alpha);
    }
}

fn negate(pixels: &mut [PixelPacket]) {
    for p in pixels {
        *p = PixelPacket::new(
            QUANTUM_MAX - p.red,
            QUANTUM_MAX - p.green,
            QUANTUM_MAX - p.blue,
            p.alpha,
        );
    }
}

/// Per-channel median over a square window.
fn median(src: &SoftFrame, radius: f64) -> Vec<PixelPacket> {
    let half = radius.max(1.0).ceil().min((MAX_ORDER / 2) as f64) as i64;
    let mut window: [Vec<u16>; 4] = Default::default();
    generate(src.columns(), src.rows(), |x, y| {
        for w in window.iter_mut() {
            w.clear();
        }
        for v in -half..=half {
            for u in -half..=half {
                let p = at(src, x as i64 + u, y as i64 + v);
                window[0].push(p.red);
                window[1].push(p.green);
                window[2].push(p.blue);
                window[3].push(p.alpha);
            }
        }
        let mut mid = [0u16; 4];
        for (c, w) in window.iter_mut().enumerate() {
            w.sort_unstable();
            mid[c] = w[w.len() / 2];
        }
        PixelPacket::new(mid[0], mid[1], mid[2], mid[3])
    })
}

/// Deterministic per-pixel noise source.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in `[0, 1)`.
    fn unit(&mut self) -> f64 {
        (self.next() >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn add_noise(src: &SoftFrame, noise: NoiseType, attenuate: f64) -> Vec<PixelPacket> {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15 ^ src.id());
    let spread = attenuate * Q / 16.0;
    src.pixels()
        .iter()
        .map(|p| {
            let mut c = channels(*p);
            for v in c.iter_mut().take(3) {
                let n = match noise {
                    NoiseType::Uniform => (rng.unit() - 0.5) * 2.0 * spread,
                    NoiseType::Gaussian | NoiseType::MultiplicativeGaussian => {
                        let (u1, u2) = (rng.unit().max(1e-12), rng.unit());
                        let g = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * spread;
                        if noise == NoiseType::MultiplicativeGaussian {
                            g * *v / Q
                        } else {
                            g
                        }
                    }
                    NoiseType::Impulse => {
                        let r = rng.unit();
                        if r < 0.05 * attenuate {
                            -Q
                        } else if r > 1.0 - 0.05 * attenuate {
                            Q
                        } else {
                            0.0
                        }
                    }
                    NoiseType::Laplacian => {
                        let u = rng.unit() - 0.5;
                        -u.signum() * (1.0 - 2.0 * u.abs()).max(1e-12).ln() * spread
                    }
                    NoiseType::Poisson => (rng.unit() - 0.5) * (*v).sqrt() * attenuate * 4.0,
                };
                *v += n;
            }
            packet(c)
        })
        .collect()
}

fn bucket(p: PixelPacket) -> usize {
    (p.intensity() >> 8) as usize
}

fn oil_paint(src: &SoftFrame, radius: f64) -> Vec<PixelPacket> {
    let half = radius.max(1.0).ceil().min((MAX_ORDER / 2) as f64) as i64;
    let mut histogram = [0u32; 256];
    generate(src.columns(), src.rows(), |x, y| {
        histogram.fill(0);
        let mut best = (0u32, src.pixel(x, y));
        for v in -half..=half {
            for u in -half..=half {
                let p = at(src, x as i64 + u, y as i64 + v);
                let b = bucket(p);
                histogram[b] += 1;
                if histogram[b] > best.0 {
                    best = (histogram[b], p);
                }
            }
        }
        best.1
    })
}

fn scale_nearest(src: &SoftFrame, columns: u32, rows: u32) -> Vec<PixelPacket> {
    let (sc, sr) = (src.columns() as u64, src.rows() as u64);
    generate(columns, rows, |x, y| {
        let sx = (x as u64 * sc / columns as u64) as u32;
        let sy = (y as u64 * sr / rows as u64) as u32;
        src.pixel(sx, sy)
    })
}

/// Averages the source area covered by each destination pixel.
fn scale_box(src: &SoftFrame, columns: u32, rows: u32) -> Vec<PixelPacket> {
    let (sc, sr) = (src.columns() as f64, src.rows() as f64);
    let (fx, fy) = (sc / columns as f64, sr / rows as f64);
    generate(columns, rows, |x, y| {
        let x0 = (x as f64 * fx).floor() as u32;
        let y0 = (y as f64 * fy).floor() as u32;
        let x1 = (((x + 1) as f64 * fx).ceil() as u32).clamp(x0 + 1, src.columns());
        let y1 = (((y + 1) as f64 * fy).ceil() as u32).clamp(y0 + 1, src.rows());
        let mut acc = [0.0; 4];
        for sy in y0..y1 {
            for sx in x0..x1 {
                let c = channels(src.pixel(sx, sy));
                for i in 0..4 {
                    acc[i] += c[i];
                }
            }
        }
        let n = ((x1 - x0) * (y1 - y0)) as f64;
        packet(acc.map(|v| v / n))
    })
}

fn scale_bilinear(src: &SoftFrame, columns: u32, rows: u32) -> Vec<PixelPacket> {
    let fx = src.columns() as f64 / columns as f64;
    let fy = src.rows() as f64 / rows as f64;
    generate(columns, rows, |x, y| {
        let sx = ((x as f64 + 0.5) * fx - 0.5).max(0.0);
        let sy = ((y as f64 + 0.5) * fy - 0.5).max(0.0);
        let (x0, y0) = (sx.floor() as i64, sy.floor() as i64);
        let (tx, ty) = (sx - x0 as f64, sy - y0 as f64);
        let p00 = channels(at(src, x0, y0));
        let p10 = channels(at(src, x0 + 1, y0));
        let p01 = channels(at(src, x0, y0 + 1));
        let p11 = channels(at(src, x0 + 1, y0 + 1));
        let mut c = [0.0; 4];
        for i in 0..4 {
            let top = p00[i] * (1.0 - tx) + p10[i] * tx;
            let bottom = p01[i] * (1.0 - tx) + p11[i] * tx;
            c[i] = top * (1.0 - ty) + bottom * ty;
        }
        packet(c)
    })
}

/// Clips `rect` to the frame; a zero width or height extends to the edge.
fn clip_region(src: &SoftFrame, rect: Rectangle) -> Option<Rectangle> {
    let mut rect = rect;
    if rect.width == 0 {
        rect.width = (src.columns() as i64).saturating_sub(rect.x).clamp(0, u32::MAX as i64) as u32;
    }
    if rect.height == 0 {
        rect.height = (src.rows() as i64).saturating_sub(rect.y).clamp(0, u32::MAX as i64) as u32;
    }
    rect.clip(src.columns(), src.rows())
}

fn crop_pixels(src: &SoftFrame, r: Rectangle) -> Vec<PixelPacket> {
    generate(r.width, r.height, |x, y| {
        src.pixel(r.x as u32 + x, r.y as u32 + y)
    })
}

/// Bounding box of the pixels that differ from the top-left corner.
pub(crate) fn bounding_box(src: &SoftFrame) -> Option<Rectangle> {
    let corner = src.pixel(0, 0);
    let fuzz = src.attrs.fuzz;
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
    for y in 0..src.rows() {
        for x in 0..src.columns() {
            if !similar(src.pixel(x, y), corner, fuzz) {
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
            }
        }
    }
    (x0 != u32::MAX).then(|| Rectangle::new(x0 as i64, y0 as i64, x1 - x0 + 1, y1 - y0 + 1))
}

/// Rotates by `degrees` clockwise into a canvas that holds the whole result.
fn rotate(
    engine: &SoftEngine,
    src: &SoftFrame,
    degrees: f64,
) -> Result<SoftFrame, NativeFault> {
    let degrees = degrees.rem_euclid(360.0);
    let (c, r) = (src.columns(), src.rows());
    let exact = |d: f64| (degrees - d).abs() < 1e-9;
    if exact(0.0) || exact(360.0) {
        return derive(engine, src, c, r, src.pixels().to_vec());
    }
    if exact(90.0) {
        let pixels = generate(r, c, |x, y| src.pixel(y, r - 1 - x));
        return derive(engine, src, r, c, pixels);
    }
    if exact(180.0) {
        let pixels = generate(c, r, |x, y| src.pixel(c - 1 - x, r - 1 - y));
        return derive(engine, src, c, r, pixels);
    }
    if exact(270.0) {
        let pixels = generate(r, c, |x, y| src.pixel(c - 1 - y, x));
        return derive(engine, src, r, c, pixels);
    }
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (c as f64, r as f64);
    let nw = (w * cos.abs() + h * sin.abs()).ceil().max(1.0) as u32;
    let nh = (w * sin.abs() + h * cos.abs()).ceil().max(1.0) as u32;
    engine.check_size(nw, nh)?;
    let background = src.attrs.background_color;
    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ncx, ncy) = (nw as f64 / 2.0, nh as f64 / 2.0);
    let pixels = generate(nw, nh, |x, y| {
        let dx = x as f64 + 0.5 - ncx;
        let dy = y as f64 + 0.5 - ncy;
        let sx = dx * cos + dy * sin + cx;
        let sy = -dx * sin + dy * cos + cy;
        at_or(src, sx.floor() as i64, sy.floor() as i64, background)
    });
    derive(engine, src, nw, nh, pixels)
}

fn shear(engine: &SoftEngine, src: &SoftFrame, x_deg: f64, y_deg: f64) -> Result<SoftFrame, NativeFault> {
    let bad = |d: f64| (d.rem_euclid(180.0) - 90.0).abs() < 1e-9;
    if bad(x_deg) || bad(y_deg) {
        return Err(faults::option(format!("angle is discontinuous: {x_deg}x{y_deg}")));
    }
    let (tx, ty) = (x_deg.to_radians().tan(), y_deg.to_radians().tan());
    let (w, h) = (src.columns() as f64, src.rows() as f64);
    let nw = (w + h * tx.abs()).ceil() as u32;
    let nh = (h + nw as f64 * ty.abs()).ceil() as u32;
    engine.check_size(nw, nh)?;
    let background = src.attrs.background_color;
    let x_off = if tx < 0.0 { 0.0 } else { h * tx };
    let y_off = if ty < 0.0 { 0.0 } else { nw as f64 * ty };
    let pixels = generate(nw, nh, |x, y| {
        // undo the y shear, then the x shear
        let sy = y as f64 - (x as f64 * ty - y_off + if ty < 0.0 { nw as f64 * ty.abs() } else { 0.0 });
        let sx = x as f64 - (sy * tx - x_off + if tx < 0.0 { h * tx.abs() } else { 0.0 });
        at_or(src, sx.floor() as i64, sy.floor() as i64, background)
    });
    derive(engine, src, nw, nh, pixels)
}

/// Applies a frame effect to `src`.
pub(crate) fn frame_effect(
    engine: &SoftEngine,
    src: &SoftFrame,
    effect: &Effect,
) -> Result<SoftFrame, NativeFault> {
    src.require_pixels()?;
    let (c, r) = (src.columns(), src.rows());
    let same = |pixels| derive(engine, src, c, r, pixels);
    match effect {
        Effect::AddNoise { noise, attenuate } => same(add_noise(src, *noise, attenuate.unwrap_or(1.0))),
        Effect::Blur { radius, sigma } | Effect::GaussianBlur { radius, sigma } => {
            same(convolve(src, &Kernel::gaussian(*radius, *sigma)?, 0.0))
        }
        Effect::Sharpen { radius, sigma } => {
            let blurred = convolve(src, &Kernel::gaussian(*radius, *sigma)?, 0.0);
            let pixels = src
                .pixels()
                .iter()
                .zip(&blurred)
                .map(|(o, b)| {
                    let (o, b) = (channels(*o), channels(*b));
                    packet([2.0 * o[0] - b[0], 2.0 * o[1] - b[1], 2.0 * o[2] - b[2], o[3]])
                })
                .collect();
            same(pixels)
        }
        Effect::UnsharpMask {
            radius,
            sigma,
            amount,
            threshold,
        } => {
            let blurred = convolve(src, &Kernel::gaussian(*radius, *sigma)?, 0.0);
            let limit = threshold * Q;
            let pixels = src
                .pixels()
                .iter()
                .zip(&blurred)
                .map(|(o, b)| {
                    let (o, b) = (channels(*o), channels(*b));
                    let mut c = o;
                    for i in 0..3 {
                        let diff = o[i] - b[i];
                        if diff.abs() >= limit {
                            c[i] = o[i] + amount * diff;
                        }
                    }
                    packet(c)
                })
                .collect();
            same(pixels)
        }
        Effect::Charcoal { radius, sigma } => {
            let edged = src.derive(c, r, convolve(src, &Kernel::edge(*radius), 0.0));
            let mut pixels = convolve(&edged, &Kernel::gaussian(*radius, *sigma)?, 0.0);
            drop(edged);
            negate(&mut pixels);
            grayscale(&mut pixels);
            same(pixels)
        }
        Effect::Edge { radius } => same(convolve(src, &Kernel::edge(*radius), 0.0)),
        Effect::Emboss { radius, sigma } => {
            let mut pixels = convolve(src, &Kernel::emboss(*radius, *sigma), Q / 2.0);
            grayscale(&mut pixels);
            same(pixels)
        }
        Effect::MedianFilter { radius } | Effect::ReduceNoise { radius } => {
            same(median(src, *radius))
        }
        Effect::Despeckle => same(median(src, 1.0)),
        Effect::OilPaint { radius } => same(oil_paint(src, *radius)),
        Effect::Spread { radius } => {
            let reach = radius.max(0.0).ceil().min(c.max(r) as f64) as i64;
            let mut rng = XorShift(0x2545_f491_4f6c_dd1d ^ src.id());
            let span = (2 * reach + 1) as u64;
            same(generate(c, r, |x, y| {
                let dx = (rng.next() % span) as i64 - reach;
                let dy = (rng.next() % span) as i64 - reach;
                at(src, x as i64 + dx, y as i64 + dy)
            }))
        }
        Effect::Enhance => {
            let kernel = Kernel {
                order: 3,
                weights: [1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0]
                    .iter()
                    .map(|w| w / 16.0)
                    .collect(),
            };
            same(convolve(src, &kernel, 0.0))
        }
        Effect::Border { width, height } => {
            let nc = c as u64 + 2 * *width as u64;
            let nr = r as u64 + 2 * *height as u64;
            let (Ok(nc), Ok(nr)) = (u32::try_from(nc), u32::try_from(nr)) else {
                return Err(faults::too_large(nc, nr));
            };
            engine.check_size(nc, nr)?;
            let border = src.attrs.border_color;
            let (w, h) = (*width as i64, *height as i64);
            let pixels = generate(nc, nr, |x, y| at_or(src, x as i64 - w, y as i64 - h, border));
            derive(engine, src, nc, nr, pixels)
        }
        Effect::Raise { width, height, raise } => {
            if *width as u64 * 2 > c as u64 || *height as u64 * 2 > r as u64 {
                return Err(faults::option("bevel width exceeds image"));
            }
            let (light, dark) = if *raise { (0.5, -0.5) } else { (-0.5, 0.5) };
            let pixels = generate(c, r, |x, y| {
                let p = src.pixel(x, y);
                let top_left = x < *width || y < *height;
                let bottom_right = x >= c - width || y >= r - height;
                let shade = if top_left && !bottom_right {
                    light
                } else if bottom_right && !top_left {
                    dark
                } else {
                    return p;
                };
                let mut ch = channels(p);
                for v in ch.iter_mut().take(3) {
                    *v = if shade > 0.0 {
                        *v + (Q - *v) * shade
                    } else {
                        *v * (1.0 + shade)
                    };
                }
                packet(ch)
            });
            same(pixels)
        }
        Effect::Chop(rect) => {
            // columns and rows are removed independently; a zero extent removes none
            let span = |start: i64, len: u32, limit: u32| {
                let lo = start.max(0);
                let hi = start.saturating_add(len as i64).min(limit as i64);
                if hi > lo { (lo as u32, (hi - lo) as u32) } else { (0, 0) }
            };
            let (cx, cw) = span(rect.x, rect.width, c);
            let (cy, ch) = span(rect.y, rect.height, r);
            if cw == 0 && ch == 0 {
                return Err(faults::option("geometry does not contain image"));
            }
            let (nc, nr) = (c - cw, r - ch);
            require_size(nc, nr)?;
            let pixels = generate(nc, nr, |x, y| {
                let sx = if x < cx { x } else { x + cw };
                let sy = if y < cy { y } else { y + ch };
                src.pixel(sx, sy)
            });
            derive(engine, src, nc, nr, pixels)
        }
        Effect::Crop(rect) => {
            let region = clip_region(src, *rect)
                .ok_or_else(|| faults::option("geometry does not contain image"))?;
            derive(engine, src, region.width, region.height, crop_pixels(src, region))
        }
        Effect::Colorize { color, opacity } => {
            let o = (opacity / 100.0).clamp(0.0, 1.0);
            let tint = channels(*color);
            let pixels = src
                .pixels()
                .iter()
                .map(|p| {
                    let mut ch = channels(*p);
                    for i in 0..3 {
                        ch[i] = ch[i] * (1.0 - o) + tint[i] * o;
                    }
                    packet(ch)
                })
                .collect();
            same(pixels)
        }
        Effect::Flip => same(generate(c, r, |x, y| src.pixel(x, r - 1 - y))),
        Effect::Flop => same(generate(c, r, |x, y| src.pixel(c - 1 - x, y))),
        Effect::Magnify => {
            let (nc, nr) = (c.saturating_mul(2), r.saturating_mul(2));
            engine.check_size(nc, nr)?;
            derive(engine, src, nc, nr, scale_nearest(src, nc, nr))
        }
        Effect::Minify => {
            let (nc, nr) = ((c / 2).max(1), (r / 2).max(1));
            derive(engine, src, nc, nr, scale_box(src, nc, nr))
        }
        Effect::Implode { amount } => {
            let (cx, cy) = (c as f64 / 2.0, r as f64 / 2.0);
            let radius = cx.min(cy).max(1.0);
            same(generate(c, r, |x, y| {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt() / radius;
                if d >= 1.0 || d == 0.0 {
                    return src.pixel(x, y);
                }
                let factor = (PI * d / 2.0).sin().powf(-amount);
                at(src, (cx + dx * factor).floor() as i64, (cy + dy * factor).floor() as i64)
            }))
        }
        Effect::Swirl { degrees } => {
            let (cx, cy) = (c as f64 / 2.0, r as f64 / 2.0);
            let radius = cx.max(cy).max(1.0);
            let angle = degrees.to_radians();
            same(generate(c, r, |x, y| {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt() / radius;
                if d >= 1.0 {
                    return src.pixel(x, y);
                }
                let t = angle * (1.0 - d) * (1.0 - d);
                let (s, co) = t.sin_cos();
                at(
                    src,
                    (cx + dx * co - dy * s).floor() as i64,
                    (cy + dx * s + dy * co).floor() as i64,
                )
            }))
        }
        Effect::Wave {
            amplitude,
            wavelength,
        } => {
            if !(*wavelength > 0.0) {
                return Err(faults::option("wavelength must be positive"));
            }
            let extra = (2.0 * amplitude.abs()).ceil() as u32;
            let nr = r.saturating_add(extra);
            engine.check_size(c, nr)?;
            let background = src.attrs.background_color;
            let pixels = generate(c, nr, |x, y| {
                let shift = amplitude.abs() + amplitude * (2.0 * PI * x as f64 / wavelength).sin();
                at_or(src, x as i64, (y as f64 - shift).floor() as i64, background)
            });
            derive(engine, src, c, nr, pixels)
        }
        Effect::Roll { x: dx, y: dy } => {
            let (w, h) = (c as i64, r as i64);
            let (dx, dy) = (dx.rem_euclid(w), dy.rem_euclid(h));
            same(generate(c, r, |x, y| {
                let sx = ((x as i64 + w - dx) % w) as u32;
                let sy = ((y as i64 + h - dy) % h) as u32;
                src.pixel(sx, sy)
            }))
        }
        Effect::Sample { columns, rows } => {
            require_size(*columns, *rows)?;
            engine.check_size(*columns, *rows)?;
            derive(engine, src, *columns, *rows, scale_nearest(src, *columns, *rows))
        }
        Effect::Scale { columns, rows } => {
            require_size(*columns, *rows)?;
            engine.check_size(*columns, *rows)?;
            derive(engine, src, *columns, *rows, scale_box(src, *columns, *rows))
        }
        Effect::Resize {
            columns,
            rows,
            filter,
            blur: _,
        } => {
            require_size(*columns, *rows)?;
            engine.check_size(*columns, *rows)?;
            let pixels = if *filter == FilterType::Point {
                scale_nearest(src, *columns, *rows)
            } else {
                scale_bilinear(src, *columns, *rows)
            };
            derive(engine, src, *columns, *rows, pixels)
        }
        Effect::Zoom { columns, rows } => {
            require_size(*columns, *rows)?;
            engine.check_size(*columns, *rows)?;
            derive(engine, src, *columns, *rows, scale_bilinear(src, *columns, *rows))
        }
        Effect::Rotate { degrees } => rotate(engine, src, *degrees),
        Effect::Shear { x, y } => shear(engine, src, *x, *y),
        Effect::Convolve { order, kernel } => {
            let order = *order as usize;
            if order % 2 == 0 || order > MAX_ORDER || kernel.len() != order * order {
                return Err(faults::option(format!(
                    "kernel of {} weights does not match odd order {order}",
                    kernel.len()
                )));
            }
            let kernel = Kernel {
                order,
                weights: kernel.clone(),
            };
            same(convolve(src, &kernel, 0.0))
        }
        Effect::Trim => match bounding_box(src) {
            Some(region) => derive(engine, src, region.width, region.height, crop_pixels(src, region)),
            None => derive(engine, src, 1, 1, vec![src.pixel(0, 0)]),
        },
        Effect::UniqueColors => {
            let colors: Vec<PixelPacket> = src.unique_colors().into_iter().collect();
            let n = colors.len() as u32;
            derive(engine, src, n, 1, colors)
        }
        Effect::Coalesce | Effect::Average | Effect::Deconstruct | Effect::Montage(_) => {
            Err(faults::option(format!("{} needs a sequence", effect.name())))
        }
    }
}

/// Blends `s` onto `d`. `None` leaves the destination pixel as it was.
pub(crate) fn blend(op: CompositeOperator, d: PixelPacket, s: PixelPacket) -> Result<Option<PixelPacket>, NativeFault> {
    let (dc, sc) = (channels(d), channels(s));
    let (da, sa) = (dc[3] / Q, sc[3] / Q);
    let per_channel = |f: &dyn Fn(f64, f64) -> f64| {
        packet([f(dc[0], sc[0]), f(dc[1], sc[1]), f(dc[2], sc[2]), dc[3].max(sc[3])])
    };
    let porter_duff = |fs: f64, fd: f64| {
        let a = sa * fs + da * fd;
        if a <= 0.0 {
            return PixelPacket::TRANSPARENT;
        }
        let mut out = [0.0; 4];
        for i in 0..3 {
            out[i] = (sc[i] * sa * fs + dc[i] * da * fd) / a;
        }
        out[3] = a * Q;
        packet(out)
    };
    Ok(Some(match op {
        CompositeOperator::Over => porter_duff(1.0, 1.0 - sa),
        CompositeOperator::In => porter_duff(da, 0.0),
        CompositeOperator::Out => porter_duff(1.0 - da, 0.0),
        CompositeOperator::Atop => porter_duff(da, 1.0 - sa),
        CompositeOperator::Xor => porter_duff(1.0 - da, 1.0 - sa),
        CompositeOperator::Copy => s,
        CompositeOperator::Clear => PixelPacket::TRANSPARENT,
        CompositeOperator::No => return Ok(None),
        CompositeOperator::Plus | CompositeOperator::Add => per_channel(&|a, b| a + b),
        CompositeOperator::Minus | CompositeOperator::Subtract => per_channel(&|a, b| a - b),
        CompositeOperator::Difference => per_channel(&|a, b| (a - b).abs()),
        CompositeOperator::Multiply => per_channel(&|a, b| a * b / Q),
        CompositeOperator::Screen => per_channel(&|a, b| Q - (Q - a) * (Q - b) / Q),
        CompositeOperator::Darken => per_channel(&|a, b| a.min(b)),
        CompositeOperator::Lighten => per_channel(&|a, b| a.max(b)),
        CompositeOperator::CopyRed => PixelPacket { red: s.red, ..d },
        CompositeOperator::CopyGreen => PixelPacket { green: s.green, ..d },
        CompositeOperator::CopyBlue => PixelPacket { blue: s.blue, ..d },
        CompositeOperator::CopyOpacity => PixelPacket { alpha: s.alpha, ..d },
        other => {
            return Err(faults::missing_delegate(format!(
                "composite operator {other:?} is not available"
            )));
        }
    }))
}

/// Composites `src` onto `dest` with its top-left corner at `(x, y)`.
pub(crate) fn composite_onto(
    dest: &mut SoftFrame,
    op: CompositeOperator,
    src: &SoftFrame,
    x: i64,
    y: i64,
) -> Result<(), NativeFault> {
    src.require_pixels()?;
    dest.require_pixels()?;
    let Some(area) = Rectangle::new(x, y, src.columns(), src.rows()).clip(dest.columns(), dest.rows())
    else {
        return Ok(());
    };
    // surface unsupported operators before touching the destination
    blend(op, PixelPacket::TRANSPARENT, PixelPacket::TRANSPARENT)?;
    let columns = dest.columns() as usize;
    let pixels = dest.pixels_mut();
    for dy in 0..area.height {
        for dx in 0..area.width {
            let tx = area.x as u32 + dx;
            let ty = area.y as u32 + dy;
            let s = src.pixel((tx as i64 - x) as u32, (ty as i64 - y) as u32);
            let index = ty as usize * columns + tx as usize;
            if let Some(p) = blend(op, pixels[index], s)? {
                pixels[index] = p;
            }
        }
    }
    Ok(())
}

/// Applies a sequence effect to `frames`, in order.
pub(crate) fn sequence_effect(
    engine: &SoftEngine,
    frames: &[&SoftFrame],
    effect: &Effect,
) -> Result<Vec<SoftFrame>, NativeFault> {
    let Some(first) = frames.first() else {
        return Err(faults::option("no images specified"));
    };
    for f in frames {
        f.require_pixels()?;
    }
    match effect {
        Effect::Coalesce => {
            let (c, r) = (first.columns(), first.rows());
            let mut canvas = SoftFrame::blank(
                engine.counters_arc(),
                c,
                r,
                PixelPacket::TRANSPARENT,
                first.attrs.clone(),
            );
            let mut out = Vec::with_capacity(frames.len());
            for frame in frames {
                let before = canvas.pixels().to_vec();
                composite_onto(&mut canvas, CompositeOperator::Over, frame, 0, 0)?;
                let mut coalesced = frame.derive(c, r, canvas.pixels().to_vec());
                coalesced.attrs.dispose = DisposeType::None;
                out.push(coalesced);
                match frame.attrs.dispose {
                    DisposeType::Background => {
                        let clear = Rectangle::full(frame.columns(), frame.rows()).clip(c, r);
                        if let Some(area) = clear {
                            let pixels = canvas.pixels_mut();
                            for y in 0..area.height as usize {
                                for x in 0..area.width as usize {
                                    pixels[y * c as usize + x] = PixelPacket::TRANSPARENT;
                                }
                            }
                        }
                    }
                    DisposeType::Previous => canvas.pixels_mut().copy_from_slice(&before),
                    DisposeType::Undefined | DisposeType::None => {}
                }
            }
            Ok(out)
        }
        Effect::Average => {
            let (c, r) = (first.columns(), first.rows());
            if frames.iter().any(|f| f.columns() != c || f.rows() != r) {
                return Err(faults::option("image widths or heights differ"));
            }
            let n = frames.len() as f64;
            let pixels = (0..first.pixels().len())
                .map(|i| {
                    let mut acc = [0.0; 4];
                    for f in frames {
                        let ch = channels(f.pixels()[i]);
                        for k in 0..4 {
                            acc[k] += ch[k];
                        }
                    }
                    packet(acc.map(|v| v / n))
                })
                .collect();
            Ok(vec![first.derive(c, r, pixels)])
        }
        Effect::Deconstruct => {
            let (c, r) = (first.columns(), first.rows());
            if frames.iter().any(|f| f.columns() != c || f.rows() != r) {
                return Err(faults::option("image widths or heights differ"));
            }
            let mut out = vec![first.derive(c, r, first.pixels().to_vec())];
            for pair in frames.windows(2) {
                let (previous, current) = (pair[0], pair[1]);
                let mut changed: Option<(u32, u32, u32, u32)> = None;
                for y in 0..r {
                    for x in 0..c {
                        if previous.pixel(x, y) != current.pixel(x, y) {
                            changed = Some(match changed {
                                None => (x, y, x, y),
                                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                            });
                        }
                    }
                }
                let region = match changed {
                    Some((x0, y0, x1, y1)) => {
                        Rectangle::new(x0 as i64, y0 as i64, x1 - x0 + 1, y1 - y0 + 1)
                    }
                    None => Rectangle::new(0, 0, 1, 1),
                };
                let mut frame = current.derive(region.width, region.height, crop_pixels(current, region));
                frame
                    .properties_mut()
                    .insert("page".into(), format!("+{}+{}", region.x, region.y));
                out.push(frame);
            }
            Ok(out)
        }
        Effect::Montage(info) => montage(engine, frames, info),
        frame_effect_kind => {
            let head = frame_effect(engine, first, frame_effect_kind)?;
            Ok(vec![head])
        }
    }
}

fn montage(
    engine: &SoftEngine,
    frames: &[&SoftFrame],
    info: &MontageInfo,
) -> Result<Vec<SoftFrame>, NativeFault> {
    let count = frames.len() as u32;
    let (tiles_x, tiles_y) = match info.tile {
        Some(tile) => (tile.width.unwrap_or(count).max(1), tile.height.unwrap_or(1).max(1)),
        None => (count, 1),
    };
    let max_c = frames.iter().map(|f| f.columns()).max().unwrap_or(1);
    let max_r = frames.iter().map(|f| f.rows()).max().unwrap_or(1);
    let (tile_c, tile_r, gap_x, gap_y) = match info.geometry {
        Some(g) => (
            g.width.unwrap_or(max_c),
            g.height.unwrap_or(max_r),
            g.x.clamp(0, u32::MAX as i64) as u32,
            g.y.clamp(0, u32::MAX as i64) as u32,
        ),
        None => (max_c, max_r, 0, 0),
    };
    require_size(tile_c, tile_r)?;
    let bw = info.border_width;
    let cell_c = tile_c as u64 + 2 * bw as u64 + 2 * gap_x as u64;
    let cell_r = tile_r as u64 + 2 * bw as u64 + 2 * gap_y as u64;
    let (page_c, page_r) = (cell_c.saturating_mul(tiles_x as u64), cell_r.saturating_mul(tiles_y as u64));
    let (Ok(page_c), Ok(page_r)) = (u32::try_from(page_c), u32::try_from(page_r)) else {
        return Err(faults::too_large(page_c, page_r));
    };
    engine.check_size(page_c, page_r)?;

    let per_page = (tiles_x as u64 * tiles_y as u64).min(frames.len() as u64) as usize;
    let mut pages = Vec::new();
    for chunk in frames.chunks(per_page) {
        let mut page = SoftFrame::blank(
            engine.counters_arc(),
            page_c,
            page_r,
            info.background,
            chunk[0].attrs.clone(),
        );
        for (i, frame) in chunk.iter().enumerate() {
            let col = i as u64 % tiles_x as u64;
            let row = i as u64 / tiles_x as u64;
            let x0 = (col * cell_c + gap_x as u64) as i64;
            let y0 = (row * cell_r + gap_y as u64) as i64;
            if bw > 0 {
                let bordered = frame_effect(
                    engine,
                    frame,
                    &Effect::Border {
                        width: bw,
                        height: bw,
                    },
                )?;
                composite_onto(&mut page, CompositeOperator::Over, &bordered, x0, y0)?;
            } else {
                composite_onto(&mut page, CompositeOperator::Over, frame, x0, y0)?;
            }
        }
        if let Some(title) = &info.title {
            page.properties_mut().insert("label".into(), title.clone());
        }
        pages.push(page);
    }
    if pages.is_empty() {
        return Err(NativeFault::coded(codes::IMAGE, "montage produced no pages"));
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::soft::SoftConfig;
    use crate::imp::soft::frame::FrameAttributes;

    fn engine() -> SoftEngine {
        SoftEngine::new(SoftConfig::default())
    }

    fn numbered(engine: &SoftEngine, c: u32, r: u32) -> SoftFrame {
        let pixels = (0..c * r).map(|i| PixelPacket::opaque(i as u16, 0, 0)).collect();
        SoftFrame::from_pixels(engine.counters_arc(), c, r, pixels, FrameAttributes::with_depth(8))
    }

    fn reds(frame: &SoftFrame) -> Vec<u16> {
        frame.pixels().iter().map(|p| p.red).collect()
    }

    #[test]
    fn flip_and_flop() {
        let e = engine();
        let f = numbered(&e, 2, 2);
        assert_eq!(reds(&frame_effect(&e, &f, &Effect::Flip).unwrap()), vec![2, 3, 0, 1]);
        assert_eq!(reds(&frame_effect(&e, &f, &Effect::Flop).unwrap()), vec![1, 0, 3, 2]);
    }

    #[test]
    fn crop_and_chop() {
        let e = engine();
        let f = numbered(&e, 3, 3);
        let cropped = frame_effect(&e, &f, &Effect::Crop(Rectangle::new(1, 1, 5, 5))).unwrap();
        assert_eq!((cropped.columns(), cropped.rows()), (2, 2));
        assert_eq!(reds(&cropped), vec![4, 5, 7, 8]);
        let chopped = frame_effect(&e, &f, &Effect::Chop(Rectangle::new(1, 0, 1, 0))).unwrap();
        assert_eq!((chopped.columns(), chopped.rows()), (2, 3));
        assert_eq!(reds(&chopped), vec![0, 2, 3, 5, 6, 8]);
        let miss = frame_effect(&e, &f, &Effect::Crop(Rectangle::new(10, 10, 1, 1))).unwrap_err();
        assert_eq!(miss.code, codes::OPTION);
    }

    #[test]
    fn right_angle_rotation_is_exact() {
        let e = engine();
        let f = numbered(&e, 3, 2);
        let r = frame_effect(&e, &f, &Effect::Rotate { degrees: 90.0 }).unwrap();
        assert_eq!((r.columns(), r.rows()), (2, 3));
        assert_eq!(reds(&r), vec![3, 0, 4, 1, 5, 2]);
        let back = frame_effect(&e, &r, &Effect::Rotate { degrees: -90.0 }).unwrap();
        assert_eq!(reds(&back), reds(&f));
    }

    #[test]
    fn scaling_and_sizes() {
        let e = engine();
        let f = numbered(&e, 4, 4);
        let s = frame_effect(&e, &f, &Effect::Sample { columns: 2, rows: 2 }).unwrap();
        assert_eq!(reds(&s), vec![0, 2, 8, 10]);
        let err = frame_effect(&e, &f, &Effect::Scale { columns: 0, rows: 2 }).unwrap_err();
        assert_eq!(err.code, codes::OPTION);
        let m = frame_effect(&e, &f, &Effect::Magnify).unwrap();
        assert_eq!((m.columns(), m.rows()), (8, 8));
    }

    #[test]
    fn extreme_offsets_clip_instead_of_overflowing() {
        let e = engine();
        let f = numbered(&e, 3, 3);
        for rect in [
            Rectangle::new(i64::MAX, 0, 2, 2),
            Rectangle::new(0, i64::MAX, 0, 0),
            Rectangle::new(i64::MIN, i64::MIN, 2, 2),
        ] {
            let err = frame_effect(&e, &f, &Effect::Crop(rect)).unwrap_err();
            assert_eq!(err.code, codes::OPTION, "{rect:?}");
        }
        let whole = frame_effect(&e, &f, &Effect::Crop(Rectangle::new(i64::MIN, i64::MIN, 0, 0))).unwrap_err();
        assert_eq!(whole.code, codes::OPTION);

        let err = frame_effect(&e, &f, &Effect::Chop(Rectangle::new(i64::MAX, i64::MAX, u32::MAX, u32::MAX)))
            .unwrap_err();
        assert_eq!(err.code, codes::OPTION);
        // the column span lies left of the frame, so only row 1 goes
        let chopped = frame_effect(&e, &f, &Effect::Chop(Rectangle::new(i64::MIN, 1, u32::MAX, 1))).unwrap();
        assert_eq!((chopped.columns(), chopped.rows()), (3, 2));
        assert_eq!(reds(&chopped), vec![0, 1, 2, 6, 7, 8]);
    }

    #[test]
    fn roll_wraps_any_offset() {
        let e = engine();
        let f = numbered(&e, 3, 1);
        let min = frame_effect(&e, &f, &Effect::Roll { x: i64::MIN, y: i64::MIN }).unwrap();
        // i64::MIN is 1 modulo 3
        assert_eq!(reds(&min), vec![2, 0, 1]);
        let max = frame_effect(&e, &f, &Effect::Roll { x: i64::MAX, y: i64::MAX }).unwrap();
        assert_eq!(reds(&max), vec![2, 0, 1]);
        let once = frame_effect(&e, &f, &Effect::Roll { x: 1, y: 0 }).unwrap();
        assert_eq!(reds(&once), reds(&min));
    }

    #[test]
    fn oversized_results_hit_the_resource_limit() {
        let e = engine();
        let f = numbered(&e, 2, 2);
        for effect in [
            Effect::Sample { columns: u32::MAX, rows: u32::MAX },
            Effect::Border { width: u32::MAX, height: u32::MAX },
            Effect::Border { width: 1 << 20, height: 1 << 20 },
        ] {
            let err = frame_effect(&e, &f, &effect).unwrap_err();
            assert_eq!(err.code, codes::RESOURCE_LIMIT, "{effect:?}");
        }
        let spread = frame_effect(&e, &f, &Effect::Spread { radius: f64::MAX }).unwrap();
        assert_eq!((spread.columns(), spread.rows()), (2, 2));
    }

    #[test]
    fn border_uses_border_color() {
        let e = engine();
        let f = numbered(&e, 1, 1);
        let b = frame_effect(&e, &f, &Effect::Border { width: 1, height: 2 }).unwrap();
        assert_eq!((b.columns(), b.rows()), (3, 5));
        assert_eq!(b.pixel(0, 0), f.attrs.border_color);
        assert_eq!(b.pixel(1, 2), f.pixel(0, 0));
    }

    #[test]
    fn blur_of_flat_frame_is_flat() {
        let e = engine();
        let f = SoftFrame::blank(
            e.counters_arc(),
            5,
            5,
            PixelPacket::opaque(1000, 2000, 3000),
            FrameAttributes::with_depth(8),
        );
        let b = frame_effect(&e, &f, &Effect::Blur { radius: 1.0, sigma: 0.8 }).unwrap();
        assert!(b.pixels().iter().all(|p| *p == PixelPacket::opaque(1000, 2000, 3000)));
        assert!(frame_effect(&e, &f, &Effect::Blur { radius: 1.0, sigma: 0.0 }).is_err());
    }

    #[test]
    fn trim_finds_content() {
        let e = engine();
        let mut f = SoftFrame::blank(e.counters_arc(), 4, 4, PixelPacket::WHITE, FrameAttributes::with_depth(8));
        f.pixels_mut()[5] = PixelPacket::BLACK;
        let t = frame_effect(&e, &f, &Effect::Trim).unwrap();
        assert_eq!((t.columns(), t.rows()), (1, 1));
        assert_eq!(t.pixel(0, 0), PixelPacket::BLACK);
    }

    #[test]
    fn coalesce_and_average() {
        let e = engine();
        let a = SoftFrame::blank(e.counters_arc(), 2, 2, PixelPacket::BLACK, FrameAttributes::with_depth(8));
        let b = SoftFrame::blank(e.counters_arc(), 1, 1, PixelPacket::WHITE, FrameAttributes::with_depth(8));
        let out = sequence_effect(&e, &[&a, &b], &Effect::Coalesce).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!((out[1].columns(), out[1].rows()), (2, 2));
        assert_eq!(out[1].pixel(0, 0), PixelPacket::WHITE);
        assert_eq!(out[1].pixel(1, 1), PixelPacket::BLACK);

        let err = sequence_effect(&e, &[&a, &b], &Effect::Average).unwrap_err();
        assert_eq!(err.code, codes::OPTION);
        let w = SoftFrame::blank(e.counters_arc(), 2, 2, PixelPacket::WHITE, FrameAttributes::with_depth(8));
        let avg = sequence_effect(&e, &[&a, &w], &Effect::Average).unwrap();
        assert_eq!(avg[0].pixel(0, 0).red, 32768);
    }

    #[test]
    fn montage_tiles_frames() {
        let e = engine();
        let a = numbered(&e, 2, 2);
        let b = numbered(&e, 2, 2);
        let c = numbered(&e, 2, 2);
        let info = MontageInfo {
            tile: Some("2x1".parse().unwrap()),
            ..Default::default()
        };
        let pages = sequence_effect(&e, &[&a, &b, &c], &Effect::Montage(info)).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!((pages[0].columns(), pages[0].rows()), (4, 2));
    }

    #[test]
    fn unsupported_operator_is_missing_delegate() {
        let e = engine();
        let mut d = numbered(&e, 2, 2);
        let s = numbered(&e, 1, 1);
        let before = reds(&d);
        let err = composite_onto(&mut d, CompositeOperator::Bumpmap, &s, 0, 0).unwrap_err();
        assert_eq!(err.code, codes::MISSING_DELEGATE);
        assert_eq!(reds(&d), before);
    }
}
