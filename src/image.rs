// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The image wrapper.

An [`Image`] pairs an engine with one [`Handle`]. Every operation follows the
same pattern:

1. Check preconditions (handle present, arguments sane, capability reported)
   without touching the engine.
2. Make the engine call through [`crate::exception::native`].
3. Hand the result to the handle: a *derived* image adopts a fresh list, an
   *in-place* operation replaces the current list, and an *adjustment*
   mutates the head frame directly.

```
# #[cfg(feature = "backend_soft")] {
use std::sync::Arc;
use frames_and_handles::image::Image;
use frames_and_handles::imp::soft::{SoftConfig, SoftEngine};

let engine = Arc::new(SoftEngine::new(SoftConfig::default()));
let image = Image::from_pixels(engine, 2, 1, "RGB", &[255u8, 0, 0, 0, 0, 255]).unwrap();
let flipped = image.flop().unwrap();
assert_eq!(flipped.dimension().unwrap().width, 2);
# }
```
*/

mod adjust;
mod attributes;
mod effects;
mod io;
mod pixels;
mod profiles;
mod sequence;

use crate::engine::{Engine, Frames};
use crate::error::{Capability, Error, Result};
use crate::exception;
use crate::handle::Handle;
use std::sync::Arc;

/// An owned, possibly empty, sequence of frames on engine `E`.
pub struct Image<E: Engine> {
    engine: Arc<E>,
    handle: Handle<E::Frame>,
}

impl<E: Engine> Image<E> {
    /// An image with no handle. Most operations on it fail with
    /// [`Error::NoHandle`] until something is read or constituted into it.
    pub fn new(engine: Arc<E>) -> Self {
        Image {
            engine,
            handle: Handle::empty(),
        }
    }

    /// Takes ownership of `frames` without copying them.
    pub fn adopt(engine: Arc<E>, frames: Frames<E>) -> Self {
        Image {
            engine,
            handle: Handle::adopt(frames),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn has_handle(&self) -> bool {
        !self.handle.is_empty()
    }

    /// Changes whenever a new list is installed in this image.
    pub fn generation(&self) -> u64 {
        self.handle.generation()
    }

    pub fn frames(&self) -> Result<&Frames<E>> {
        self.handle.get("frames")
    }

    /// Destroys every frame now. Releasing an empty image does nothing.
    pub fn release(&mut self) {
        self.handle.release();
    }

    /// Gives up the frames, leaving the image empty.
    pub fn into_frames(mut self) -> Option<Frames<E>> {
        self.handle.take()
    }

    pub(crate) fn list(&self, operation: &'static str) -> Result<&Frames<E>> {
        self.handle.get(operation)
    }

    pub(crate) fn head(&self, operation: &'static str) -> Result<&E::Frame> {
        Ok(self.handle.get(operation)?.head_frame())
    }

    /// Runs `call` on the head frame inside a call scope.
    pub(crate) fn with_head<T>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&E, &E::Frame) -> std::result::Result<T, crate::error::NativeFault>,
    ) -> Result<T> {
        let head = self.head(operation)?;
        exception::native(self.engine.as_ref(), operation, |e| call(e, head))
    }

    /// Runs `call` on the mutable head frame inside a call scope.
    pub(crate) fn with_head_mut<T>(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&E, &mut E::Frame) -> std::result::Result<T, crate::error::NativeFault>,
    ) -> Result<T> {
        let head = self.handle.get_mut(operation)?.head_frame_mut();
        exception::native(self.engine.as_ref(), operation, |e| call(e, head))
    }

    /// A new image on the same engine owning `frames`.
    pub(crate) fn derived(&self, frames: Frames<E>) -> Image<E> {
        Image::adopt(self.engine.clone(), frames)
    }

    /// Replaces the list with whatever `factory` builds from the current one.
    pub(crate) fn replace_with(
        &mut self,
        factory: impl FnOnce(&E, Option<&Frames<E>>) -> Result<Frames<E>>,
    ) -> Result<()> {
        let engine = self.engine.clone();
        self.handle.replace(|current| factory(engine.as_ref(), current))
    }

    pub(crate) fn require(&self, capability: Capability) -> Result<()> {
        if self.engine.capabilities().supports(capability) {
            Ok(())
        } else {
            Err(Error::Unsupported { capability })
        }
    }
}

impl<E: Engine> std::fmt::Debug for Image<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("frames", &self.handle.try_get().map(|l| l.count()))
            .field("generation", &self.handle.generation())
            .finish()
    }
}
