// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Multi-frame sequences.

use super::Image;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::frames::ops;
use std::sync::Arc;

impl<E: Engine> Image<E> {
    /// Deep-copies every frame of every image in `images` into one sequence.
    ///
    /// The inputs are left untouched.
    pub fn from_images(engine: Arc<E>, images: &[&Image<E>]) -> Result<Self> {
        let mut image = Image::new(engine);
        image.init_multi(images)?;
        Ok(image)
    }

    /// Replaces the frames with deep copies of `images`, in order.
    pub fn init_multi(&mut self, images: &[&Image<E>]) -> Result<()> {
        if images.is_empty() {
            return Err(Error::InvalidArgument("no images specified".into()));
        }
        let sources = images
            .iter()
            .map(|image| image.list("init_multi"))
            .collect::<Result<Vec<_>>>()?;
        self.replace_with(|e, _| {
            let mut copies = Vec::with_capacity(sources.len());
            for source in sources {
                copies.push(ops::clone_list(e, source, None, true)?);
            }
            ops::concat(copies)
        })?;
        logwise::info_sync!(
            "Image::init_multi built {frames} frames",
            frames = self.frame_count()
        );
        Ok(())
    }

    /// Moves the frames of `other` after the tail of this sequence.
    pub fn append(&mut self, mut other: Image<E>) -> Result<()> {
        let Some(tail) = other.handle.take() else {
            return Err(Error::NoHandle { operation: "append" });
        };
        match self.handle.take() {
            Some(mut list) => {
                list.splice(tail);
                self.handle.install(list);
            }
            None => self.handle.install(tail),
        }
        Ok(())
    }

    /// Splits off everything after the head as a new image.
    ///
    /// Returns `Ok(None)` for a single-frame image.
    pub fn next_image(&mut self) -> Result<Option<Image<E>>> {
        let rest = self.handle.get_mut("next_image")?.split_after_head();
        Ok(rest.map(|rest| self.derived(rest)))
    }

    /// Removes the head frame and returns it as its own image.
    ///
    /// The remaining frames stay in `self`; after the last frame is detached
    /// `self` has no handle.
    pub fn detach_head(&mut self) -> Result<Image<E>> {
        let Some(list) = self.handle.take() else {
            return Err(Error::NoHandle {
                operation: "detach_head",
            });
        };
        let (head, rest) = list.detach_head();
        if let Some(rest) = rest {
            self.handle.install(rest);
        }
        Ok(self.derived(head))
    }

    /// Number of frames; zero without a handle.
    pub fn frame_count(&self) -> usize {
        self.handle.try_get().map_or(0, |list| list.count())
    }

    /// True when more frames follow the head.
    pub fn has_frames(&self) -> bool {
        self.handle.try_get().is_some_and(|list| list.has_frames())
    }

    /// True for a sequence whose head asks for a display delay.
    pub fn is_animated(&self) -> Result<bool> {
        Ok(self.has_frames() && self.delay()? > 0)
    }
}

#[cfg(all(test, feature = "backend_soft"))]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::imp::soft::{FaultPlan, SoftConfig, SoftEngine};

    fn engine() -> Arc<SoftEngine> {
        Arc::new(SoftEngine::new(SoftConfig::default()))
    }

    fn gray(engine: &Arc<SoftEngine>, value: u8) -> Image<SoftEngine> {
        Image::from_pixels(engine.clone(), 1, 1, "I", &[value]).unwrap()
    }

    fn values(image: &Image<SoftEngine>) -> Vec<u8> {
        image
            .frames()
            .unwrap()
            .iter()
            .map(|f| f.pixels()[0].red.to_be_bytes()[0])
            .collect()
    }

    #[test]
    fn from_images_copies() {
        let engine = engine();
        let a = gray(&engine, 1);
        let b = gray(&engine, 2);
        let seq = Image::from_images(engine.clone(), &[&a, &b]).unwrap();
        assert_eq!(seq.frame_count(), 2);
        assert!(seq.has_frames());
        assert!(!seq.is_animated().unwrap());
        assert_eq!(values(&seq), vec![1, 2]);
        assert_eq!(engine.counters().live_frames(), 4);
        assert!(a.has_handle() && b.has_handle());
    }

    #[test]
    fn from_images_preconditions() {
        let engine = engine();
        assert!(matches!(
            Image::from_images(engine.clone(), &[]),
            Err(Error::InvalidArgument(_))
        ));
        let empty = Image::new(engine.clone());
        let a = gray(&engine, 1);
        let calls = engine.counters().native_calls();
        assert!(matches!(
            Image::from_images(engine.clone(), &[&a, &empty]),
            Err(Error::NoHandle { .. })
        ));
        assert_eq!(engine.counters().native_calls(), calls);
    }

    #[test]
    fn failed_clone_leaks_nothing() {
        let engine = engine();
        let a = gray(&engine, 1);
        let b = gray(&engine, 2);
        engine.inject(
            "clone_list",
            FaultPlan::after(1, Severity::Error, 400, "no memory"),
        );
        let mut seq = gray(&engine, 9);
        let generation = seq.generation();
        assert!(seq.init_multi(&[&a, &b]).is_err());
        assert_eq!(seq.generation(), generation);
        assert_eq!(values(&seq), vec![9]);
        assert_eq!(engine.counters().live_frames(), 3);
    }

    #[test]
    fn append_then_detach() {
        let engine = engine();
        let mut seq = gray(&engine, 1);
        seq.append(gray(&engine, 2)).unwrap();
        seq.append(gray(&engine, 3)).unwrap();
        assert_eq!(values(&seq), vec![1, 2, 3]);
        seq.set_delay(10).unwrap();
        assert!(seq.is_animated().unwrap());
        let first = seq.detach_head().unwrap();
        assert_eq!(values(&first), vec![1]);
        assert_eq!(values(&seq), vec![2, 3]);
        drop(first);
        assert_eq!(engine.counters().live_frames(), 2);
        seq.detach_head().unwrap();
        seq.detach_head().unwrap();
        assert!(!seq.has_handle());
        assert!(!seq.has_frames());
        assert!(matches!(seq.detach_head(), Err(Error::NoHandle { .. })));
    }

    #[test]
    fn append_into_empty_and_from_empty() {
        let engine = engine();
        let mut seq = Image::new(engine.clone());
        seq.append(gray(&engine, 4)).unwrap();
        assert_eq!(seq.frame_count(), 1);
        assert!(matches!(
            seq.append(Image::new(engine.clone())),
            Err(Error::NoHandle { operation: "append" })
        ));
        assert_eq!(seq.frame_count(), 1);
    }

    #[test]
    fn next_image_splits() {
        let engine = engine();
        let a = gray(&engine, 1);
        let b = gray(&engine, 2);
        let c = gray(&engine, 3);
        let mut seq = Image::from_images(engine, &[&a, &b, &c]).unwrap();
        let rest = seq.next_image().unwrap().unwrap();
        assert_eq!(values(&seq), vec![1]);
        assert_eq!(values(&rest), vec![2, 3]);
        assert!(seq.next_image().unwrap().is_none());
    }
}
