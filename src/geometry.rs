// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Rectangles and geometry strings.

use crate::error::{Error, Result};
use std::fmt::Display;
use std::str::FromStr;

/// A width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub const fn new(width: u32, height: u32) -> Self {
        Dimension { width, height }
    }

    /// Number of pixels, widened so it cannot overflow.
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A region of a frame. The offset may be negative; engines clip to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rectangle {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub const fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Rectangle {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering a whole `columns` x `rows` frame.
    pub const fn full(columns: u32, rows: u32) -> Self {
        Rectangle::new(0, 0, columns, rows)
    }

    pub const fn dimension(&self) -> Dimension {
        Dimension::new(self.width, self.height)
    }

    /// True when the rectangle lies entirely inside a `columns` x `rows` frame.
    pub fn fits_within(&self, columns: u32, rows: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x as u64 + self.width as u64 <= columns as u64
            && self.y as u64 + self.height as u64 <= rows as u64
    }

    /// Intersection with a `columns` x `rows` frame, or `None` when empty.
    pub fn clip(&self, columns: u32, rows: u32) -> Option<Rectangle> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self.x.saturating_add(self.width as i64).min(columns as i64);
        let y1 = self.y.saturating_add(self.height as i64).min(rows as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rectangle::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/**
A parsed geometry string of the form `WxH+X+Y`.

Every part is optional: `"640x480"`, `"640"`, `"x480"`, `"+10-5"` and
`"100x100+0+0"` are all accepted. Missing sizes are `None`; missing offsets
are zero.

```
use frames_and_handles::geometry::Geometry;
let g: Geometry = "64x32+4-2".parse().unwrap();
assert_eq!(g.width, Some(64));
assert_eq!(g.height, Some(32));
assert_eq!((g.x, g.y), (4, -2));
```
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Geometry {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub x: i64,
    pub y: i64,
}

impl Geometry {
    pub fn parse(text: &str) -> Result<Geometry> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::invalid("empty geometry"));
        }
        let bad = || Error::invalid(format!("malformed geometry `{text}`"));

        let offset_at = text.find(['+', '-']).unwrap_or(text.len());
        let (size, offsets) = text.split_at(offset_at);

        let (width, height) = match size.split_once(['x', 'X']) {
            Some((w, h)) => (parse_size(w).ok_or_else(bad)?, parse_size(h).ok_or_else(bad)?),
            None => (parse_size(size).ok_or_else(bad)?, None),
        };

        let mut parts = Vec::new();
        let mut rest = offsets;
        while !rest.is_empty() {
            let sign = if rest.starts_with('-') { -1 } else { 1 };
            rest = &rest[1..];
            let end = rest.find(['+', '-']).unwrap_or(rest.len());
            let value: i64 = rest[..end].parse().map_err(|_| bad())?;
            parts.push(sign * value);
            rest = &rest[end..];
        }
        let (x, y) = match parts.as_slice() {
            [] => (0, 0),
            [x] => (*x, 0),
            [x, y] => (*x, *y),
            _ => return Err(bad()),
        };
        if width.is_none() && height.is_none() && offsets.is_empty() {
            return Err(bad());
        }
        Ok(Geometry {
            width,
            height,
            x,
            y,
        })
    }

    /// Resolves missing sizes against a `columns` x `rows` frame.
    pub fn to_rectangle(&self, columns: u32, rows: u32) -> Rectangle {
        Rectangle::new(
            self.x,
            self.y,
            self.width.unwrap_or(columns),
            self.height.unwrap_or(rows),
        )
    }
}

/// `Ok(None)` for an empty string, `None` when not a number.
fn parse_size(text: &str) -> Option<Option<u32>> {
    if text.is_empty() {
        return Some(None);
    }
    text.parse().ok().map(Some)
}

impl FromStr for Geometry {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Geometry::parse(s)
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(w) = self.width {
            write!(f, "{w}")?;
        }
        if let Some(h) = self.height {
            write!(f, "x{h}")?;
        }
        if self.x != 0 || self.y != 0 {
            write!(f, "{:+}{:+}", self.x, self.y)?;
        }
        Ok(())
    }
}
