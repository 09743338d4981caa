// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
#![cfg(feature = "backend_soft")]

use frames_and_handles::Image;
use frames_and_handles::attributes::DisposeType;
use frames_and_handles::engine::Capabilities;
use frames_and_handles::error::{Capability, Error};
use frames_and_handles::imp::soft::{SoftConfig, SoftEngine};
use frames_and_handles::info::ImageInfo;
use std::path::PathBuf;
use std::sync::Arc;

fn engine() -> Arc<SoftEngine> {
    Arc::new(SoftEngine::new(SoftConfig::default()))
}

/// A fresh directory under the system temp dir for one test.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "frames_and_handles-{}-{name}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn sequence(engine: &Arc<SoftEngine>) -> Image<SoftEngine> {
    let mut image = Image::from_pixels(engine.clone(), 2, 1, "RGB", &[9u8, 8, 7, 6, 5, 4]).unwrap();
    image.set_delay(12).unwrap();
    let mut second = Image::from_pixels(engine.clone(), 1, 2, "RGBA", &[1u8, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    second.set_dispose(DisposeType::Previous).unwrap();
    image.append(second).unwrap();
    image
}

#[test]
fn png_file_round_trip() {
    let dir = scratch("png");
    let path = dir.join("out.png");
    let engine = engine();
    let image = Image::from_pixels(engine.clone(), 2, 2, "RGB", &[0u8, 50, 100, 150, 200, 250, 1, 2, 3, 4, 5, 6]).unwrap();
    image
        .write(&ImageInfo::new(path.to_string_lossy()))
        .unwrap();

    let back = Image::open(engine, &ImageInfo::new(path.to_string_lossy())).unwrap();
    assert_eq!(
        back.to_pixels::<u8>("RGB").unwrap(),
        vec![0, 50, 100, 150, 200, 250, 1, 2, 3, 4, 5, 6]
    );
    assert_eq!(back.magick().unwrap(), "PNG");
    assert_eq!(back.file_name().unwrap(), path.to_string_lossy());
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn seq_file_keeps_every_frame() {
    let dir = scratch("seq");
    let path = dir.join("anim.seq");
    let engine = engine();
    let image = sequence(&engine);
    image
        .write(&ImageInfo::new(path.to_string_lossy()))
        .unwrap();

    let mut back = Image::open(engine, &ImageInfo::new(path.to_string_lossy())).unwrap();
    assert_eq!(back.frame_count(), 2);
    assert_eq!(back.delay().unwrap(), 12);
    let second = back.next_image().unwrap().unwrap();
    assert_eq!(second.dispose().unwrap(), DisposeType::Previous);
    assert_eq!(second.to_pixels::<u8>("RGBA").unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn png_write_keeps_only_the_head() {
    let dir = scratch("png-head");
    let path = dir.join("first.png");
    let engine = engine();
    let image = sequence(&engine);
    image
        .write(&ImageInfo::new(path.to_string_lossy()))
        .unwrap();
    let back = Image::open(engine, &ImageInfo::new(path.to_string_lossy())).unwrap();
    assert_eq!(back.frame_count(), 1);
    assert_eq!(back.to_pixels::<u8>("RGB").unwrap(), vec![9, 8, 7, 6, 5, 4]);
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn ping_reads_only_the_header() {
    let dir = scratch("ping");
    let path = dir.join("big.png");
    let engine = engine();
    Image::from_pixels(engine.clone(), 3, 5, "I", &[128u8; 15])
        .unwrap()
        .write(&ImageInfo::new(path.to_string_lossy()))
        .unwrap();

    let mut pinged = Image::new(engine);
    pinged.ping(&ImageInfo::new(path.to_string_lossy())).unwrap();
    let size = pinged.dimension().unwrap();
    assert_eq!((size.width, size.height), (3, 5));
    assert!(matches!(
        pinged.to_pixels::<u8>("I"),
        Err(Error::NativeOperationFailed { .. })
    ));
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn blobs_round_trip() {
    let engine = engine();
    let image = sequence(&engine);

    let single = image.to_blob(&ImageInfo::default().with_magick("seq")).unwrap();
    let all = image
        .images_to_blob(&ImageInfo::default().with_magick("seq"))
        .unwrap();
    assert!(all.len() > single.len());

    let one = Image::from_blob(engine.clone(), &ImageInfo::default(), &single).unwrap();
    assert_eq!(one.frame_count(), 1);
    let both = Image::from_blob(engine, &ImageInfo::default(), &all).unwrap();
    assert_eq!(both.frame_count(), 2);
    assert_eq!(both.to_pixels::<u8>("RGB").unwrap(), vec![9, 8, 7, 6, 5, 4]);
}

#[test]
fn unknown_formats_are_missing_delegates() {
    let engine = engine();
    let image = sequence(&engine);
    let err = image
        .to_blob(&ImageInfo::default().with_magick("tiff"))
        .unwrap_err();
    assert!(matches!(err, Error::NativeOperationFailed { code: 420, .. }));

    let err = Image::from_blob(engine, &ImageInfo::default(), b"not an image").unwrap_err();
    assert!(matches!(err, Error::NativeOperationFailed { code: 420, .. }));
}

#[test]
fn capabilities_gate_ping_and_multi_frame_blobs() {
    let engine = Arc::new(SoftEngine::new(
        SoftConfig::default().with_capabilities(Capabilities::none()),
    ));
    let image = sequence(&engine);
    let calls = engine.counters().native_calls();
    assert!(matches!(
        image.images_to_blob(&ImageInfo::default().with_magick("seq")),
        Err(Error::Unsupported {
            capability: Capability::MultiFrameBlobs
        })
    ));
    let mut empty = Image::new(engine.clone());
    assert!(matches!(
        empty.ping(&ImageInfo::new("whatever.png")),
        Err(Error::Unsupported {
            capability: Capability::Ping
        })
    ));
    assert_eq!(engine.counters().native_calls(), calls);

    // a single frame still fits in one blob
    let head = Image::from_pixels(engine, 1, 1, "RGB", &[0u8; 3]).unwrap();
    assert!(head.images_to_blob(&ImageInfo::default().with_magick("seq")).is_ok());
}
