// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! frames_and_handles is a safe ownership and marshalling layer over native imaging
engines.

Imaging libraries in the ImageMagick family hand out raw pointers to a doubly-linked
list of frames, report failures through a separately allocated exception record, and
expect the caller to know which of those pointers it owns. This crate puts a typed wall
in front of that:

| Concern              | Native convention                        | Here                                   |
|----------------------|------------------------------------------|----------------------------------------|
| Ownership            | Raw pointer in a wrapper field           | [`handle::Handle`], one owner per list  |
| Multi-frame images   | `previous`/`next` pointers               | [`frames::FrameList`] arena with indices |
| Error reporting      | Exception record allocated per call      | [`exception::native`] and [`Error`]     |
| Pixel transfer       | Caller-sized buffers and a storage enum  | [`marshal`] with typed element slices  |
| Attributes           | Dozens of get/set entry points           | [`attributes::Attribute`] plus typed accessors on [`Image`] |

# Engines

The core of this crate decodes nothing and runs no pixel algorithm. Both live in
engines behind the [`engine::Engine`] trait; the core checks arguments, brackets each
call and decides who owns the result.

The `backend_soft` feature (on by default) provides [`imp::soft::SoftEngine`], a
pure-Rust engine with PNG and a raw sequence format, a simple set of effects, and
fault injection for testing the error paths. Bindings to an actual native library
implement the same trait.

# Ownership rules

1. A wrapper owns at most one list, and a list is owned by at most one wrapper.
2. Replacing a list destroys the previous one, but only after the replacement was built
   successfully. A failed operation leaves the wrapper exactly as it was.
3. Splitting a list gives each part its own owner; no frame is reachable from two lists.

```
# #[cfg(feature = "backend_soft")] {
use std::sync::Arc;
use frames_and_handles::Image;
use frames_and_handles::imp::soft::{SoftConfig, SoftEngine};

let engine = Arc::new(SoftEngine::new(SoftConfig::default()));
let mut image = Image::from_pixels(engine, 1, 1, "RGB", &[0u8, 128, 255]).unwrap();
image.negate(false).unwrap();
assert_eq!(image.to_pixels::<u8>("RGB").unwrap(), vec![255, 127, 0]);
# }
```
*/

pub mod attributes;
pub mod engine;
pub mod error;
pub mod exception;
pub mod frames;
pub mod geometry;
pub mod handle;
pub mod image;
pub mod imp;
pub mod info;
pub mod marshal;
pub mod pixel_formats;

pub use error::{Error, Result};
pub use image::Image;
