// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Reading, writing and blobs.

use super::Image;
use crate::engine::Engine;
use crate::error::{Capability, Error, Result};
use crate::exception;
use crate::info::ImageInfo;
use std::sync::Arc;

impl<E: Engine> Image<E> {
    /// Reads the file named by `info`.
    pub fn open(engine: Arc<E>, info: &ImageInfo) -> Result<Self> {
        let mut image = Image::new(engine);
        image.read(info)?;
        Ok(image)
    }

    /// Decodes `blob` into a new image.
    pub fn from_blob(engine: Arc<E>, info: &ImageInfo, blob: &[u8]) -> Result<Self> {
        let mut image = Image::new(engine);
        image.blob_to_image(info, blob)?;
        Ok(image)
    }

    /// Replaces the frames with a blank `info.size` frame.
    pub fn allocate(&mut self, info: &ImageInfo) -> Result<()> {
        match info.size {
            Some(size) if size.width > 0 && size.height > 0 => {}
            other => {
                return Err(Error::InvalidArgument(format!(
                    "allocate needs a non-empty size, got {other:?}"
                )));
            }
        }
        self.replace_with(|e, _| exception::native(e, "allocate", |e| e.allocate(info)))
    }

    /// Replaces the frames with the contents of the file named by `info`.
    pub fn read(&mut self, info: &ImageInfo) -> Result<()> {
        if info.filename.is_empty() {
            return Err(Error::InvalidArgument("no filename to read".into()));
        }
        self.replace_with(|e, _| exception::native(e, "read", |e| e.read(info)))
    }

    /// Like [`Image::read`], but only the header is decoded. The frames report
    /// their size and attributes and fail on any pixel access.
    pub fn ping(&mut self, info: &ImageInfo) -> Result<()> {
        self.require(Capability::Ping)?;
        if info.filename.is_empty() {
            return Err(Error::InvalidArgument("no filename to ping".into()));
        }
        self.replace_with(|e, _| exception::native(e, "ping", |e| e.ping(info)))
    }

    /// Writes to the file named by `info`. With `info.adjoin` and a format
    /// that supports it, the whole sequence goes into one file.
    pub fn write(&self, info: &ImageInfo) -> Result<()> {
        let frames = self.list("write")?;
        if info.filename.is_empty() {
            return Err(Error::InvalidArgument("no filename to write".into()));
        }
        exception::native(self.engine.as_ref(), "write", |e| e.write(info, frames))
    }

    /// Replaces the frames with those decoded from `blob`.
    pub fn blob_to_image(&mut self, info: &ImageInfo, blob: &[u8]) -> Result<()> {
        if blob.is_empty() {
            return Err(Error::InvalidArgument("blob is empty".into()));
        }
        self.replace_with(|e, _| exception::native(e, "blob_to_image", |e| e.decode_blob(info, blob)))
    }

    /// Encodes the first frame.
    pub fn to_blob(&self, info: &ImageInfo) -> Result<Vec<u8>> {
        let frames = self.list("to_blob")?;
        let single = info.clone().with_adjoin(false);
        exception::native(self.engine.as_ref(), "to_blob", |e| e.encode_blob(&single, frames))
    }

    /// Encodes the whole sequence into one blob.
    pub fn images_to_blob(&self, info: &ImageInfo) -> Result<Vec<u8>> {
        let frames = self.list("images_to_blob")?;
        if frames.count() > 1 {
            self.require(Capability::MultiFrameBlobs)?;
        }
        let all = info.clone().with_adjoin(true);
        exception::native(self.engine.as_ref(), "images_to_blob", |e| e.encode_blob(&all, frames))
    }

    /// Size in bytes of [`Image::to_blob`]'s output.
    pub fn blob_size(&self, info: &ImageInfo) -> Result<usize> {
        Ok(self.to_blob(info)?.len())
    }
}

#[cfg(all(test, feature = "backend_soft"))]
mod tests {
    use super::*;
    use crate::imp::soft::{SoftConfig, SoftEngine};
    use crate::pixel_formats::PixelPacket;

    fn engine() -> Arc<SoftEngine> {
        Arc::new(SoftEngine::new(SoftConfig::default()))
    }

    #[test]
    fn allocate_checks_size_first() {
        let engine = engine();
        let mut image = Image::new(engine.clone());
        let err = image.allocate(&ImageInfo::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(engine.counters().native_calls(), 0);
        image
            .allocate(&ImageInfo::default().with_size(4, 3).with_background(PixelPacket::BLACK))
            .unwrap();
        assert_eq!(image.one_pixel(3, 2).unwrap(), PixelPacket::BLACK);
    }

    #[test]
    fn blob_round_trip() {
        let engine = engine();
        let image = Image::from_pixels(engine.clone(), 2, 2, "RGBA", &[200u8; 16]).unwrap();
        let info = ImageInfo::default().with_magick("png");
        let blob = image.to_blob(&info).unwrap();
        assert_eq!(image.blob_size(&info).unwrap(), blob.len());
        let back = Image::from_blob(engine, &ImageInfo::default(), &blob).unwrap();
        assert_eq!(back.one_pixel(1, 1).unwrap(), PixelPacket::from_rgba8(200, 200, 200, 200));
    }

    #[test]
    fn empty_blob_is_rejected() {
        let engine = engine();
        let err = Image::from_blob(engine.clone(), &ImageInfo::default(), &[]).unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(engine.counters().native_calls(), 0);
    }

    #[test]
    fn missing_file_keeps_previous_frames() {
        let engine = engine();
        let mut image = Image::from_pixels(engine, 1, 1, "RGB", &[1u8, 2, 3]).unwrap();
        let before = image.generation();
        let err = image
            .read(&ImageInfo::new("/definitely/not/here.png"))
            .unwrap_err();
        assert!(matches!(err, Error::NativeOperationFailed { code: 430, .. }));
        assert_eq!(image.generation(), before);
    }
}
