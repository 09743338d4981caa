// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Multi-frame sequences.

A native image resource is a doubly-linked list of frames. Rather than
splicing raw `previous`/`next` pointers, this module keeps the frames in an
arena ([`FrameList`]) and stores the links as optional indices ([`FrameIdx`]).
The arena has exactly one owner, so every frame in it is destroyed exactly once,
when the list (or the frame after being detached) is dropped.

- [`list`] holds the arena and the pure link operations (normalize, tail,
  splice, detach, count).
- [`ops`] holds the operations that need an engine (cloning a list frame by
  frame, building a list out of other lists).
*/

pub mod list;
pub mod ops;

pub use list::{FrameIdx, FrameList};
