// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
#![cfg(feature = "backend_soft")]

use frames_and_handles::Image;
use frames_and_handles::error::Error;
use frames_and_handles::imp::soft::{SoftConfig, SoftEngine};
use frames_and_handles::info::MontageInfo;
use proptest::prelude::*;
use std::sync::Arc;

fn engine() -> Arc<SoftEngine> {
    Arc::new(SoftEngine::new(SoftConfig::default()))
}

fn gray(engine: &Arc<SoftEngine>, value: u8) -> Image<SoftEngine> {
    Image::from_pixels(engine.clone(), 1, 1, "I", &[value]).unwrap()
}

fn first_value(image: &Image<SoftEngine>) -> u8 {
    image.to_pixels::<u8>("I").unwrap()[0]
}

#[test]
fn three_wrappers_make_one_list() {
    let engine = engine();
    let wrappers = [gray(&engine, 10), gray(&engine, 20), gray(&engine, 30)];
    let refs: Vec<&Image<SoftEngine>> = wrappers.iter().collect();
    let mut sequence = Image::from_images(engine.clone(), &refs).unwrap();
    assert_eq!(sequence.frame_count(), 3);
    drop(wrappers);
    assert_eq!(engine.counters().live_frames(), 3);

    let mut detached = Vec::new();
    for _ in 0..3 {
        detached.push(sequence.detach_head().unwrap());
    }
    assert!(!sequence.has_handle());
    assert_eq!(
        detached.iter().map(first_value).collect::<Vec<_>>(),
        vec![10, 20, 30]
    );
    assert!(detached.iter().all(|image| image.frame_count() == 1));

    // each detached frame goes away on its own
    let middle = detached.remove(1);
    drop(middle);
    assert_eq!(engine.counters().live_frames(), 2);
    drop(detached);
    assert_eq!(engine.counters().live_frames(), 0);
    assert_eq!(engine.counters().frames_destroyed(), 6);
}

#[test]
fn sequence_effects_read_every_frame() {
    let engine = engine();
    let mut sequence = gray(&engine, 0);
    sequence.append(gray(&engine, 200)).unwrap();

    let average = sequence.average().unwrap();
    assert_eq!(average.frame_count(), 1);
    assert_eq!(first_value(&average), 100);

    let coalesced = sequence.coalesce().unwrap();
    assert_eq!(coalesced.frame_count(), 2);

    let montage = sequence.montage(&MontageInfo::default()).unwrap();
    assert_eq!(montage.frame_count(), 1);
    let size = montage.dimension().unwrap();
    assert!(size.width >= 2 || size.height >= 2);
}

#[test]
fn concat_of_nothing_is_invalid() {
    let engine = engine();
    let mut image = gray(&engine, 1);
    assert!(matches!(image.init_multi(&[]), Err(Error::InvalidArgument(_))));
    assert_eq!(image.frame_count(), 1);
}

proptest! {
    #[test]
    fn append_then_detach_keeps_order(a_len in 1usize..6, b_len in 1usize..6) {
        let engine = engine();
        let mut a = gray(&engine, 0);
        for i in 1..a_len {
            a.append(gray(&engine, i as u8)).unwrap();
        }
        let mut b = gray(&engine, 100);
        for i in 1..b_len {
            b.append(gray(&engine, 100 + i as u8)).unwrap();
        }
        a.append(b).unwrap();
        prop_assert_eq!(a.frame_count(), a_len + b_len);

        for i in 0..a_len {
            let head = a.detach_head().unwrap();
            prop_assert_eq!(first_value(&head), i as u8);
        }
        prop_assert_eq!(a.frame_count(), b_len);
        prop_assert_eq!(first_value(&a), 100);
        drop(a);
        prop_assert_eq!(engine.counters().live_frames(), 0);
    }
}
