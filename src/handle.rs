// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The single handle slot of an image wrapper.

A [`Handle`] holds zero or one [`FrameList`]. It is the only place in the crate
where an installed list is destroyed, and it destroys it in one of three ways:

- [`Handle::replace`] runs a factory and, only once the factory has
  succeeded, drops the old list and installs the new one.
- [`Handle::release`] drops the list and leaves the slot empty. Releasing an
  empty slot does nothing.
- Dropping the handle drops the list.

A list stored in a handle is always normalized.

# Generations

Each installed list gets a fresh generation number. Two observations of the same
handle with equal generations saw the same list, which makes "the handle was left
untouched" checkable without comparing frames.
*/

use crate::error::{Error, Result};
use crate::frames::FrameList;

pub struct Handle<F> {
    list: Option<FrameList<F>>,
    generation: u64,
}

impl<F> Handle<F> {
    /// A slot with no list.
    pub const fn empty() -> Self {
        Handle {
            list: None,
            generation: 0,
        }
    }

    /// A slot owning `list`. The list is moved in, never copied.
    pub fn adopt(list: FrameList<F>) -> Self {
        let list = list.normalized();
        logwise::trace_sync!("Handle::adopt {frames} frames", frames = list.count());
        Handle {
            list: Some(list),
            generation: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_none()
    }

    /// Increments every time a list is installed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The installed list, or [`Error::NoHandle`] naming `operation`.
    pub fn get(&self, operation: &'static str) -> Result<&FrameList<F>> {
        self.list.as_ref().ok_or(Error::NoHandle { operation })
    }

    pub fn get_mut(&mut self, operation: &'static str) -> Result<&mut FrameList<F>> {
        self.list.as_mut().ok_or(Error::NoHandle { operation })
    }

    pub fn try_get(&self) -> Option<&FrameList<F>> {
        self.list.as_ref()
    }

    /// Installs the list produced by `factory`.
    ///
    /// The factory sees the current list, if any. When it fails, the handle is
    /// left exactly as it was. When it succeeds, the previous list is dropped
    /// after the new one exists.
    pub fn replace(
        &mut self,
        factory: impl FnOnce(Option<&FrameList<F>>) -> Result<FrameList<F>>,
    ) -> Result<()> {
        let fresh = factory(self.list.as_ref())?;
        self.install(fresh);
        Ok(())
    }

    /// Installs `list`, dropping the previous one.
    pub fn install(&mut self, list: FrameList<F>) {
        let list = list.normalized();
        let frames = list.count();
        let previous = self.list.replace(list);
        self.generation += 1;
        let destroyed = previous.as_ref().map_or(0, FrameList::count);
        drop(previous);
        logwise::trace_sync!(
            "Handle::install {frames} frames, destroyed {destroyed}",
            frames = frames,
            destroyed = destroyed
        );
    }

    /// Drops the list, if any.
    pub fn release(&mut self) {
        if let Some(list) = self.list.take() {
            logwise::trace_sync!("Handle::release {frames} frames", frames = list.count());
            drop(list);
        }
    }

    /// Removes the list without destroying it.
    pub fn take(&mut self) -> Option<FrameList<F>> {
        self.list.take()
    }
}

impl<F> Default for Handle<F> {
    fn default() -> Self {
        Handle::empty()
    }
}

impl<F> std::fmt::Debug for Handle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("list", &self.list)
            .field("generation", &self.generation)
            .finish()
    }
}
