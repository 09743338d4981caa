// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Arena-backed doubly-linked frame lists.
//!
//! A [`FrameList`] owns every frame it contains. Frames live in arena slots;
//! `previous`/`next` links are slot indices. Because the arena is the only
//! owner, splicing and detaching are index rewrites and can never leave a
//! dangling link or free a frame twice.
//!
//! # Invariants
//!
//! - A list always holds at least one frame.
//! - Links are mutually consistent: `a.next == Some(b)` exactly when
//!   `b.previous == Some(a)`.
//! - Exactly one frame has no `previous` link (the head) and exactly one has no
//!   `next` link (the tail), and walking `next` from the head visits every frame.
//! - The *entry* is the frame the list is currently addressed by. Engines may
//!   hand back a list addressed by a frame other than the head; such a list is
//!   not normalized until [`FrameList::normalize`] is called.

use crate::error::{Error, Result};
use std::fmt::{Debug, Formatter};

/// Index of a frame slot inside one [`FrameList`].
///
/// Indices are only meaningful for the list that produced them. Splicing a list
/// into another renumbers its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameIdx(u32);

impl FrameIdx {
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Arena slots are addressed by `u32`; a list never grows past that.
    fn from_usize(index: usize) -> Self {
        FrameIdx(u32::try_from(index).expect("frame list exceeds u32::MAX slots"))
    }
}

struct Node<F> {
    frame: F,
    previous: Option<FrameIdx>,
    next: Option<FrameIdx>,
}

/// An owned, non-empty sequence of frames.
pub struct FrameList<F> {
    nodes: Vec<Option<Node<F>>>,
    entry: FrameIdx,
    live: usize,
}

impl<F> FrameList<F> {
    /// A list holding exactly one frame.
    pub fn single(frame: F) -> Self {
        FrameList {
            nodes: vec![Some(Node {
                frame,
                previous: None,
                next: None,
            })],
            entry: FrameIdx(0),
            live: 1,
        }
    }

    /// Links `frames` in iteration order.
    ///
    /// A sequence needs at least one frame to have an identity, so an empty
    /// iterator is an [`Error::InvalidArgument`].
    pub fn from_frames(frames: impl IntoIterator<Item = F>) -> Result<Self> {
        let mut iter = frames.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| Error::invalid("a frame list needs at least one frame"))?;
        let mut list = FrameList::single(first);
        for frame in iter {
            list.push_back(frame);
        }
        Ok(list)
    }

    /// Builds a list from raw native-style links.
    ///
    /// `links[i]` is the `(previous, next)` pair of `frames[i]`, and `entry` is
    /// the frame the engine returned. The links are validated against every
    /// list invariant; the entry does not need to be the head.
    pub fn from_links(
        frames: Vec<F>,
        links: &[(Option<usize>, Option<usize>)],
        entry: usize,
    ) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::invalid("a frame list needs at least one frame"));
        }
        if frames.len() != links.len() {
            return Err(Error::invalid(format!(
                "{} frames but {} link pairs",
                frames.len(),
                links.len()
            )));
        }
        if entry >= frames.len() {
            return Err(Error::invalid(format!("entry {entry} out of range")));
        }
        let n = frames.len();
        for &(previous, next) in links {
            if previous.is_some_and(|p| p >= n) || next.is_some_and(|x| x >= n) {
                return Err(Error::invalid("link out of range"));
            }
        }
        let nodes = frames
            .into_iter()
            .zip(links)
            .map(|(frame, &(previous, next))| {
                Some(Node {
                    frame,
                    previous: previous.map(FrameIdx::from_usize),
                    next: next.map(FrameIdx::from_usize),
                })
            })
            .collect();
        let list = FrameList {
            nodes,
            entry: FrameIdx::from_usize(entry),
            live: n,
        };
        if !list.validate_links() {
            return Err(Error::invalid("inconsistent frame links"));
        }
        Ok(list)
    }

    fn node(&self, idx: FrameIdx) -> &Node<F> {
        self.nodes[idx.index()]
            .as_ref()
            .expect("frame index refers to a detached slot")
    }

    fn node_mut(&mut self, idx: FrameIdx) -> &mut Node<F> {
        self.nodes[idx.index()]
            .as_mut()
            .expect("frame index refers to a detached slot")
    }

    fn is_live(&self, idx: FrameIdx) -> bool {
        self.nodes.get(idx.index()).is_some_and(|n| n.is_some())
    }

    /// The frame this list is currently addressed by.
    pub fn entry(&self) -> FrameIdx {
        self.entry
    }

    /// Re-addresses the list by another of its frames.
    pub fn set_entry(&mut self, idx: FrameIdx) -> Result<()> {
        if !self.is_live(idx) {
            return Err(Error::invalid(format!("{idx:?} is not a frame of this list")));
        }
        self.entry = idx;
        Ok(())
    }

    /// True when the list is addressed by its head.
    pub fn is_normalized(&self) -> bool {
        self.node(self.entry).previous.is_none()
    }

    /// Walks `previous` links from `idx` to the head.
    ///
    /// # Panics
    ///
    /// When `idx` is not a frame of this list; check with [`get`](Self::get).
    pub fn head_of(&self, idx: FrameIdx) -> FrameIdx {
        let mut cursor = idx;
        while let Some(previous) = self.node(cursor).previous {
            cursor = previous;
        }
        cursor
    }

    /// Walks `next` links from `idx` to the tail. Panics like
    /// [`head_of`](Self::head_of).
    pub fn tail_of(&self, idx: FrameIdx) -> FrameIdx {
        let mut cursor = idx;
        while let Some(next) = self.node(cursor).next {
            cursor = next;
        }
        cursor
    }

    pub fn head(&self) -> FrameIdx {
        self.head_of(self.entry)
    }

    pub fn tail(&self) -> FrameIdx {
        self.tail_of(self.entry)
    }

    /// Moves the entry to the head and returns it.
    pub fn normalize(&mut self) -> FrameIdx {
        let head = self.head();
        self.entry = head;
        head
    }

    /// Consuming form of [`normalize`](Self::normalize).
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub fn next(&self, idx: FrameIdx) -> Option<FrameIdx> {
        self.nodes.get(idx.index())?.as_ref()?.next
    }

    pub fn previous(&self, idx: FrameIdx) -> Option<FrameIdx> {
        self.nodes.get(idx.index())?.as_ref()?.previous
    }

    pub fn get(&self, idx: FrameIdx) -> Option<&F> {
        self.nodes.get(idx.index())?.as_ref().map(|n| &n.frame)
    }

    pub fn get_mut(&mut self, idx: FrameIdx) -> Option<&mut F> {
        self.nodes.get_mut(idx.index())?.as_mut().map(|n| &mut n.frame)
    }

    /// The first frame of the sequence.
    pub fn head_frame(&self) -> &F {
        &self.node(self.head()).frame
    }

    pub fn head_frame_mut(&mut self) -> &mut F {
        let head = self.head();
        &mut self.node_mut(head).frame
    }

    /// Number of frames reachable by walking `next` from `idx`, inclusive.
    /// Panics like [`head_of`](Self::head_of).
    pub fn count_from(&self, idx: FrameIdx) -> usize {
        let mut count = 1;
        let mut cursor = idx;
        while let Some(next) = self.node(cursor).next {
            count += 1;
            cursor = next;
        }
        count
    }

    /// Number of frames in the whole sequence, walking from the head.
    pub fn count(&self) -> usize {
        let count = self.count_from(self.head());
        debug_assert_eq!(count, self.live);
        count
    }

    /// True when there is more than one frame.
    pub fn has_frames(&self) -> bool {
        self.node(self.head()).next.is_some()
    }

    /// Frames in sequence order, starting at the head.
    pub fn iter(&self) -> Iter<'_, F> {
        Iter {
            list: self,
            cursor: Some(self.head()),
        }
    }

    /// Frame indices in sequence order, starting at `idx`. Panics like
    /// [`head_of`](Self::head_of).
    pub fn indices_from(&self, idx: FrameIdx) -> Vec<FrameIdx> {
        let mut out = Vec::with_capacity(self.live);
        let mut cursor = Some(idx);
        while let Some(c) = cursor {
            out.push(c);
            cursor = self.node(c).next;
        }
        out
    }

    /// Calls `f` on every frame in sequence order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut F)) {
        for idx in self.indices_from(self.head()) {
            f(&mut self.node_mut(idx).frame);
        }
    }

    /// Like [`for_each_mut`](Self::for_each_mut), stopping at the first error.
    pub fn try_for_each_mut<E>(
        &mut self,
        mut f: impl FnMut(&mut F) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        for idx in self.indices_from(self.head()) {
            f(&mut self.node_mut(idx).frame)?;
        }
        Ok(())
    }

    /// Appends one frame after the tail.
    pub fn push_back(&mut self, frame: F) {
        let tail = self.tail();
        let idx = FrameIdx::from_usize(self.nodes.len());
        self.nodes.push(Some(Node {
            frame,
            previous: Some(tail),
            next: None,
        }));
        self.node_mut(tail).next = Some(idx);
        self.live += 1;
    }

    /// Links the head of `other` after the tail of `self`.
    ///
    /// `other` is consumed; its frames are renumbered into this arena. The
    /// result is a single list addressed by the head of `self`.
    pub fn splice(&mut self, mut other: FrameList<F>) {
        let other_head = other.normalize();
        let offset = self.nodes.len();
        let mut remap = vec![None; other.nodes.len()];
        let mut next_slot = offset;
        for (old, slot) in other.nodes.iter().enumerate() {
            if slot.is_some() {
                remap[old] = Some(FrameIdx::from_usize(next_slot));
                next_slot += 1;
            }
        }
        let map = |idx: Option<FrameIdx>| idx.and_then(|i| remap[i.index()]);
        let tail = self.tail();
        let spliced = other.live;
        for node in other.nodes.drain(..).flatten() {
            self.nodes.push(Some(Node {
                frame: node.frame,
                previous: map(node.previous),
                next: map(node.next),
            }));
        }
        let new_head = remap[other_head.index()].expect("normalized head is live");
        self.node_mut(tail).next = Some(new_head);
        self.node_mut(new_head).previous = Some(tail);
        self.live += spliced;
        self.normalize();
        logwise::trace_sync!(
            "FrameList::splice appended {spliced} frames, now {live}",
            spliced = spliced,
            live = self.live
        );
    }

    /// Separates the head from the rest of the sequence.
    ///
    /// Both results have their cross links cleared, so each can be dropped
    /// without affecting the other. `rest` is `None` for a single-frame list.
    pub fn detach_head(mut self) -> (FrameList<F>, Option<FrameList<F>>) {
        let head = self.normalize();
        let node = self.nodes[head.index()]
            .take()
            .expect("normalized head is live");
        self.live -= 1;
        let detached = FrameList::single(node.frame);
        let rest = match node.next {
            Some(next) => {
                self.node_mut(next).previous = None;
                self.entry = next;
                if self.nodes.len() > 2 * self.live {
                    self.compact();
                }
                Some(self)
            }
            None => None,
        };
        (detached, rest)
    }

    /// Keeps the head in `self` and returns the remainder as its own list.
    pub fn split_after_head(&mut self) -> Option<FrameList<F>> {
        let head = self.normalize();
        let next = self.node(head).next?;
        self.node_mut(head).next = None;
        self.node_mut(next).previous = None;
        let mut frames = Vec::with_capacity(self.live - 1);
        let mut cursor = Some(next);
        while let Some(c) = cursor {
            let node = self.nodes[c.index()].take().expect("linked frame is live");
            cursor = node.next;
            frames.push(node.frame);
        }
        self.live = 1;
        self.compact();
        FrameList::from_frames(frames).ok()
    }

    /// Drops empty arena slots and renumbers the remaining frames.
    fn compact(&mut self) {
        let order = self.indices_from(self.head());
        let entry_position = order.iter().position(|&i| i == self.entry).unwrap_or(0);
        let mut taken: Vec<Option<Node<F>>> = self.nodes.drain(..).collect();
        let last = order.len().saturating_sub(1);
        for (position, idx) in order.iter().enumerate() {
            let node = taken[idx.index()].take().expect("linked frame is live");
            self.nodes.push(Some(Node {
                frame: node.frame,
                previous: (position > 0).then(|| FrameIdx::from_usize(position - 1)),
                next: (position < last).then(|| FrameIdx::from_usize(position + 1)),
            }));
        }
        self.entry = FrameIdx::from_usize(entry_position);
    }

    /// Frames in sequence order, consuming the list.
    pub fn into_frames(mut self) -> Vec<F> {
        let order = self.indices_from(self.head());
        let mut out = Vec::with_capacity(order.len());
        for idx in order {
            let node = self.nodes[idx.index()].take().expect("linked frame is live");
            out.push(node.frame);
        }
        out
    }

    /// Checks every list invariant.
    pub fn validate_links(&self) -> bool {
        if !self.is_live(self.entry) {
            return false;
        }
        let mut heads = 0;
        for (i, slot) in self.nodes.iter().enumerate() {
            let Some(node) = slot else { continue };
            let me = FrameIdx::from_usize(i);
            match node.previous {
                None => heads += 1,
                Some(p) => match self.nodes.get(p.index()).and_then(|n| n.as_ref()) {
                    Some(pn) if pn.next == Some(me) => {}
                    _ => return false,
                },
            }
            if let Some(n) = node.next {
                match self.nodes.get(n.index()).and_then(|n| n.as_ref()) {
                    Some(nn) if nn.previous == Some(me) => {}
                    _ => return false,
                }
            }
        }
        if heads != 1 {
            return false;
        }
        // a cycle without a head is already rejected; walk to make sure the head reaches everyone
        let head = match self
            .nodes
            .iter()
            .position(|n| n.as_ref().is_some_and(|n| n.previous.is_none()))
        {
            Some(h) => FrameIdx::from_usize(h),
            None => return false,
        };
        let mut seen = 1;
        let mut cursor = head;
        while let Some(next) = self.nodes[cursor.index()].as_ref().and_then(|n| n.next) {
            seen += 1;
            if seen > self.live {
                return false;
            }
            cursor = next;
        }
        seen == self.live
    }
}

impl<F> Debug for FrameList<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameList")
            .field("frames", &self.live)
            .field("entry", &self.entry)
            .field("normalized", &self.is_normalized())
            .finish()
    }
}

/// Iterator over the frames of a [`FrameList`] in sequence order.
pub struct Iter<'a, F> {
    list: &'a FrameList<F>,
    cursor: Option<FrameIdx>,
}

impl<'a, F> Iterator for Iter<'a, F> {
    type Item = &'a F;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        let node = self.list.node(current);
        self.cursor = node.next;
        Some(&node.frame)
    }
}

impl<'a, F> IntoIterator for &'a FrameList<F> {
    type Item = &'a F;
    type IntoIter = Iter<'a, F>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn list(frames: &[u32]) -> FrameList<u32> {
        FrameList::from_frames(frames.iter().copied()).unwrap()
    }

    fn contents(list: &FrameList<u32>) -> Vec<u32> {
        list.iter().copied().collect()
    }

    /// A frame that counts its own destruction.
    struct Counted(Arc<AtomicUsize>);
    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "u32::MAX")]
    fn slot_numbers_never_truncate() {
        let _ = FrameIdx::from_usize(u32::MAX as usize + 1);
    }

    #[test]
    fn empty_is_invalid() {
        let err = FrameList::<u32>::from_frames(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn normalize_walks_to_head() {
        let frames = vec![10, 20, 30];
        let links = [(None, Some(1)), (Some(0), Some(2)), (Some(1), None)];
        let mut l = FrameList::from_links(frames, &links, 2).unwrap();
        assert!(!l.is_normalized());
        assert_eq!(l.count_from(l.entry()), 1);
        let head = l.normalize();
        assert_eq!(l.previous(head), None);
        assert!(l.is_normalized());
        assert_eq!(l.count(), 3);
        assert_eq!(contents(&l), vec![10, 20, 30]);
        assert_eq!(l.get(l.tail()), Some(&30));
    }

    #[test]
    fn from_links_rejects_inconsistent_pairs() {
        let frames = vec![1, 2];
        let broken = [(None, Some(1)), (None, None)];
        assert!(FrameList::from_links(frames, &broken, 0).is_err());

        let cyclic = [(Some(1), Some(1)), (Some(0), Some(0))];
        assert!(FrameList::from_links(vec![1, 2], &cyclic, 0).is_err());

        let two_heads = [(None, None), (None, None)];
        assert!(FrameList::from_links(vec![1, 2], &two_heads, 0).is_err());
    }

    #[test]
    fn splice_links_tail_to_head() {
        let mut a = list(&[1, 2]);
        let mut b = list(&[3, 4, 5]);
        b.set_entry(b.tail()).unwrap();
        a.splice(b);
        assert!(a.validate_links());
        assert!(a.is_normalized());
        assert_eq!(contents(&a), vec![1, 2, 3, 4, 5]);
        assert_eq!(a.count(), 5);
    }

    #[test]
    fn detach_head_separates_lists() {
        let l = list(&[1, 2, 3]);
        let (head, rest) = l.detach_head();
        assert_eq!(contents(&head), vec![1]);
        assert!(!head.has_frames());
        let rest = rest.unwrap();
        assert!(rest.validate_links());
        assert!(rest.is_normalized());
        assert_eq!(contents(&rest), vec![2, 3]);

        let (last, none) = list(&[9]).detach_head();
        assert_eq!(contents(&last), vec![9]);
        assert!(none.is_none());
    }

    #[test]
    fn split_after_head_keeps_head() {
        let mut l = list(&[1, 2, 3, 4]);
        let rest = l.split_after_head().unwrap();
        assert_eq!(contents(&l), vec![1]);
        assert_eq!(contents(&rest), vec![2, 3, 4]);
        assert!(l.validate_links());
        assert!(rest.validate_links());
        assert!(l.split_after_head().is_none());
    }

    #[test]
    fn detached_frames_drop_independently() {
        let drops = Arc::new(AtomicUsize::new(0));
        let l = FrameList::from_frames((0..3).map(|_| Counted(drops.clone()))).unwrap();
        let (a, rest) = l.detach_head();
        let (b, rest) = rest.unwrap().detach_head();
        drop(a);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        let rest = rest.unwrap();
        assert_eq!(rest.count(), 1);
        drop(rest);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropping_list_destroys_every_frame() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut a = FrameList::from_frames((0..2).map(|_| Counted(drops.clone()))).unwrap();
        let b = FrameList::from_frames((0..3).map(|_| Counted(drops.clone()))).unwrap();
        a.splice(b);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(a);
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn for_each_mut_visits_in_order() {
        let mut l = list(&[1, 2, 3]);
        let mut seen = Vec::new();
        l.for_each_mut(|f| {
            seen.push(*f);
            *f *= 10;
        });
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(l.into_frames(), vec![10, 20, 30]);
    }

    #[test]
    fn compaction_preserves_order() {
        let mut l = list(&[1, 2, 3, 4, 5, 6, 7, 8]);
        l.splice(list(&[9]));
        let mut rest = Some(l);
        let mut out = Vec::new();
        while let Some(l) = rest.take() {
            assert!(l.validate_links());
            let (head, r) = l.detach_head();
            out.extend(head.into_frames());
            rest = r;
        }
        assert_eq!(out, (1..=9).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn normalize_preserves_count(len in 1usize..24, entry_seed in any::<usize>()) {
            let mut l = FrameList::from_frames(0..len as u32).unwrap();
            let order = l.indices_from(l.head());
            l.set_entry(order[entry_seed % len]).unwrap();
            let before = l.count();
            let head = l.normalize();
            prop_assert_eq!(l.previous(head), None);
            prop_assert_eq!(l.count(), before);
            prop_assert_eq!(l.count(), len);
        }

        #[test]
        fn splice_then_detach_yields_a_then_b(a_len in 1usize..12, b_len in 1usize..12) {
            let a: Vec<u32> = (0..a_len as u32).collect();
            let b: Vec<u32> = (100..100 + b_len as u32).collect();
            let mut spliced = list(&a);
            spliced.splice(list(&b));
            let mut rest = Some(spliced);
            let mut detached = Vec::new();
            for _ in 0..a_len {
                let (head, r) = rest.take().unwrap().detach_head();
                detached.extend(head.into_frames());
                rest = r;
            }
            prop_assert_eq!(detached, a);
            let rest = rest.unwrap();
            prop_assert!(rest.validate_links());
            prop_assert!(rest.is_normalized());
            prop_assert_eq!(contents(&rest), b);
        }
    }
}
