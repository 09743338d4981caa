// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
#![cfg(feature = "backend_soft")]

use frames_and_handles::engine::NativeFrame;
use frames_and_handles::error::{Error, Severity};
use frames_and_handles::imp::soft::{FaultPlan, SoftConfig, SoftEngine};
use frames_and_handles::info::ImageInfo;
use frames_and_handles::pixel_formats::PixelPacket;
use frames_and_handles::Image;
use std::sync::Arc;

fn engine() -> Arc<SoftEngine> {
    Arc::new(SoftEngine::new(SoftConfig::default()))
}

fn head_address(image: &Image<SoftEngine>) -> *const () {
    image.frames().unwrap().head_frame() as *const _ as *const ()
}

#[test]
fn failed_replace_keeps_the_same_list() {
    let engine = engine();
    let mut image = Image::from_pixels(engine.clone(), 2, 2, "RGB", &[7u8; 12]).unwrap();
    let generation = image.generation();
    let address = head_address(&image);

    engine.inject("allocate", FaultPlan::once(Severity::Error, 400, "out of memory"));
    let err = image
        .allocate(&ImageInfo::default().with_size(8, 8))
        .unwrap_err();
    assert!(matches!(err, Error::NativeOperationFailed { code: 400, .. }));

    assert_eq!(image.generation(), generation);
    assert_eq!(head_address(&image), address);
    assert_eq!(image.one_pixel(0, 0).unwrap(), PixelPacket::from_rgba8(7, 7, 7, 255));
    assert_eq!(engine.counters().frames_destroyed(), 0);
    assert_eq!(engine.counters().open_scopes(), 0);
}

#[test]
fn successful_replace_destroys_the_old_list_once() {
    let engine = engine();
    let mut image = Image::from_pixels(engine.clone(), 1, 1, "RGB", &[1u8, 2, 3]).unwrap();
    assert_eq!(engine.counters().frames_created(), 1);

    image
        .allocate(&ImageInfo::default().with_size(3, 3))
        .unwrap();
    assert_eq!(engine.counters().frames_created(), 2);
    assert_eq!(engine.counters().frames_destroyed(), 1);
    assert_eq!(image.frames().unwrap().head_frame().columns(), 3);

    image.release();
    assert!(!image.has_handle());
    assert_eq!(engine.counters().frames_destroyed(), 2);

    // a second release has nothing to destroy
    image.release();
    assert_eq!(engine.counters().frames_destroyed(), 2);
}

#[test]
fn derived_images_own_their_frames() {
    let engine = engine();
    let image = Image::from_pixels(engine.clone(), 2, 1, "RGB", &[0u8, 0, 0, 255, 255, 255]).unwrap();
    let flopped = image.flop().unwrap();
    assert_eq!(engine.counters().live_frames(), 2);
    drop(image);
    assert_eq!(engine.counters().live_frames(), 1);
    assert_eq!(flopped.one_pixel(0, 0).unwrap(), PixelPacket::WHITE);
    drop(flopped);
    assert_eq!(engine.counters().live_frames(), 0);
}

#[test]
fn empty_wrapper_fails_without_calling_the_engine() {
    let engine = engine();
    let mut image = Image::new(engine.clone());
    assert!(matches!(image.flip(), Err(Error::NoHandle { .. })));
    assert!(matches!(image.negate(false), Err(Error::NoHandle { .. })));
    assert!(matches!(
        image.to_blob(&ImageInfo::default().with_magick("png")),
        Err(Error::NoHandle { operation: "to_blob" })
    ));
    assert_eq!(engine.counters().native_calls(), 0);
}

