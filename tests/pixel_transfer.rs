// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
#![cfg(feature = "backend_soft")]

use frames_and_handles::Image;
use frames_and_handles::error::Error;
use frames_and_handles::imp::soft::{SoftConfig, SoftEngine};
use frames_and_handles::marshal;
use frames_and_handles::pixel_formats::{ComponentMap, PixelPacket};
use std::sync::Arc;

fn engine() -> Arc<SoftEngine> {
    Arc::new(SoftEngine::new(SoftConfig::default()))
}

const RGB_2X2: [u8; 12] = [
    255, 0, 0, //
    0, 255, 0, //
    0, 0, 255, //
    10, 20, 30,
];

#[test]
fn rgb_bytes_round_trip() {
    let engine = engine();
    let image = Image::from_pixels(engine, 2, 2, "RGB", &RGB_2X2).unwrap();
    assert_eq!(image.to_pixels::<u8>("RGB").unwrap(), RGB_2X2.to_vec());

    let mut out = [0u8; 12];
    image.dispatch(0, 0, 2, 2, "RGB", &mut out).unwrap();
    assert_eq!(out, RGB_2X2);
    assert_eq!(image.one_pixel(1, 0).unwrap(), PixelPacket::from_rgba8(0, 255, 0, 255));
}

#[test]
fn undersized_import_never_reaches_the_engine() {
    let engine = engine();
    let err = Image::from_pixels(engine.clone(), 2, 2, "RGB", &RGB_2X2[..11]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(engine.counters().native_calls(), 0);
    assert_eq!(engine.counters().frames_created(), 0);
}

#[test]
fn element_types_convert() {
    let engine = engine();
    let image = Image::from_pixels(engine, 2, 1, "RGBA", &[0u16, 65535, 32768, 65535, 1, 2, 3, 4]).unwrap();
    let floats = image.to_pixels::<f32>("R").unwrap();
    assert_eq!(floats[0], 0.0);
    let words = image.to_pixels::<u16>("GBA").unwrap();
    assert_eq!(&words[..3], &[65535, 32768, 65535]);
    let bytes = image.to_pixels::<u8>("A").unwrap();
    assert_eq!(bytes, vec![255, 0]);
}

#[test]
fn reordered_and_gray_maps() {
    let engine = engine();
    let image = Image::from_pixels(engine, 1, 1, "BGR", &[1u8, 2, 3]).unwrap();
    assert_eq!(image.to_pixels::<u8>("RGB").unwrap(), vec![3, 2, 1]);

    let gray = Image::from_pixels(image.engine().clone(), 1, 1, "I", &[77u8]).unwrap();
    assert_eq!(gray.to_pixels::<u8>("RGB").unwrap(), vec![77, 77, 77]);
}

#[test]
fn export_region_must_fit() {
    let engine = engine();
    let image = Image::from_pixels(engine.clone(), 2, 2, "RGB", &RGB_2X2).unwrap();
    let calls = engine.counters().native_calls();
    let mut out = vec![0u8; 3 * 9];
    assert!(matches!(
        image.dispatch(0, 0, 3, 3, "RGB", &mut out),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        image.dispatch(-1, 0, 1, 1, "RGB", &mut out),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(engine.counters().native_calls(), calls);
}

#[test]
fn required_len_matches_the_map() {
    let map = ComponentMap::parse("CMYK").unwrap();
    assert_eq!(marshal::required_len(3, 2, &map).unwrap(), 24);
    assert!(ComponentMap::parse("").is_err());
}
