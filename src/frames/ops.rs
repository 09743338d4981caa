// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! List operations that go through an engine.

use super::{FrameIdx, FrameList};
use crate::engine::{Engine, Frames, NativeFrame};
use crate::error::{Error, Result};
use crate::exception;

/// Deep-copies the frames of `list` from `from` to the tail.
///
/// Each frame is duplicated by the engine, resized to `size` when given. If any
/// frame fails to clone, the copies made so far are dropped before the error is
/// returned.
pub fn clone_from<E: Engine>(
    engine: &E,
    list: &Frames<E>,
    from: FrameIdx,
    size: Option<(u32, u32)>,
    include_pixels: bool,
) -> Result<Frames<E>> {
    if list.get(from).is_none() {
        return Err(Error::invalid(format!("{from:?} is not a frame of this list")));
    }
    let order = list.indices_from(from);
    let mut cloned = Vec::with_capacity(order.len());
    for idx in order {
        let Some(frame) = list.get(idx) else {
            return Err(Error::invalid(format!("{idx:?} is not a frame of this list")));
        };
        let (columns, rows) = size.unwrap_or((frame.columns(), frame.rows()));
        // on error `cloned` is dropped with the partial copies
        let copy = exception::native(engine, "clone_list", |e| {
            e.clone_frame(frame, columns, rows, include_pixels)
        })?;
        cloned.push(copy);
    }
    logwise::trace_sync!("clone_list copied {frames} frames", frames = cloned.len());
    FrameList::from_frames(cloned)
}

/// Deep-copies a whole list, starting at its head.
pub fn clone_list<E: Engine>(
    engine: &E,
    list: &Frames<E>,
    size: Option<(u32, u32)>,
    include_pixels: bool,
) -> Result<Frames<E>> {
    clone_from(engine, list, list.head(), size, include_pixels)
}

/// Splices `lists` together in order.
pub fn concat<F>(lists: impl IntoIterator<Item = FrameList<F>>) -> Result<FrameList<F>> {
    let mut lists = lists.into_iter();
    let mut out = lists
        .next()
        .ok_or_else(|| Error::invalid("no images specified"))?;
    for list in lists {
        out.splice(list);
    }
    Ok(out)
}

#[cfg(all(test, feature = "backend_soft"))]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::imp::soft::{FaultPlan, SoftConfig, SoftEngine};
    use crate::pixel_formats::ComponentMap;

    fn engine_with_list(n: usize) -> (SoftEngine, Frames<SoftEngine>) {
        let engine = SoftEngine::new(SoftConfig::default());
        let rgb = ComponentMap::parse("RGB").unwrap();
        let mut lists = Vec::new();
        for i in 0..n {
            let pixels = vec![i as u8; 2 * 2 * 3];
            lists.push(crate::marshal::import_pixels(&engine, 2, 2, &rgb, &pixels).unwrap());
        }
        let list = concat(lists).unwrap();
        (engine, list)
    }

    #[test]
    fn clone_is_independent() {
        let (engine, list) = engine_with_list(3);
        let copy = clone_list(&engine, &list, Some((4, 1)), true).unwrap();
        assert_eq!(copy.count(), 3);
        assert!(copy.iter().all(|f| f.columns() == 4 && f.rows() == 1));
        drop(list);
        assert_eq!(copy.count(), 3);
    }

    #[test]
    fn clone_from_middle() {
        let (engine, list) = engine_with_list(4);
        let second = list.next(list.head()).unwrap();
        let copy = clone_from(&engine, &list, second, None, false).unwrap();
        assert_eq!(copy.count(), 3);
    }

    #[test]
    fn clone_from_foreign_index_is_invalid() {
        let (engine, short) = engine_with_list(1);
        let (_, long) = engine_with_list(3);
        let created = engine.counters().frames_created();
        let err = clone_from(&engine, &short, long.tail(), None, true).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(engine.counters().frames_created(), created);
    }

    #[test]
    fn failed_clone_destroys_partial_copies() {
        let (engine, list) = engine_with_list(3);
        let destroyed_before = engine.counters().frames_destroyed();
        let created_before = engine.counters().frames_created();
        engine.inject("clone_list", FaultPlan::after(2, Severity::Error, 450, "out of memory"));
        let err = clone_list(&engine, &list, None, true).unwrap_err();
        assert!(matches!(err, Error::NativeOperationFailed { code: 450, .. }));
        let created = engine.counters().frames_created() - created_before;
        let destroyed = engine.counters().frames_destroyed() - destroyed_before;
        assert_eq!(created, 2);
        assert_eq!(destroyed, 2);
        assert_eq!(list.count(), 3);
    }

    #[test]
    fn concat_of_nothing_is_invalid() {
        let err = concat(Vec::<FrameList<u8>>::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
