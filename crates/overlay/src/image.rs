use std::{collections::HashMap, path::PathBuf};

use anyhow::{Context, bail};
use egui::{ColorImage, TextureHandle, TextureId, TextureOptions};
use parking_lot::Mutex;
use tracing::debug;

/// Pixels to upload as a texture.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Image file decoded with the `image` crate.
    Path(PathBuf),

    /// Unmultiplied RGBA8 pixels, row by row.
    Rgba { size: [usize; 2], pixels: Vec<u8> },
}

impl ImageSource {
    pub fn decode(self) -> anyhow::Result<ColorImage> {
        match self {
            ImageSource::Path(path) => {
                let image = image::open(&path)
                    .with_context(|| format!("cannot decode image {}", path.display()))?;
                let size = [image.width() as usize, image.height() as usize];
                let rgba = image.to_rgba8();

                Ok(ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
            }

            ImageSource::Rgba { size, pixels } => {
                let Some(len) = size[0].checked_mul(size[1]).and_then(|n| n.checked_mul(4))
                else {
                    bail!("image size {}x{} is too large", size[0], size[1]);
                };

                if len != pixels.len() {
                    bail!(
                        "expected {} bytes for {}x{} image, got {}",
                        len,
                        size[0],
                        size[1],
                        pixels.len()
                    );
                }

                Ok(ColorImage::from_rgba_unmultiplied(size, &pixels))
            }
        }
    }
}

/// Texture uploaded for an image key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

struct CachedImage {
    handle: TextureHandle,
    info: ImageInfo,
}

/// Textures keyed by name, uploaded at most once per key.
///
/// Dropping a handle frees the GPU texture through the next frame's texture delta.
pub struct ImageCache {
    ctx: egui::Context,
    images: Mutex<HashMap<String, CachedImage>>,
}

impl ImageCache {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            images: Mutex::new(HashMap::new()),
        }
    }

    /// Get the texture of `key`, uploading `source` if the key is new.
    pub fn add_or_get(&self, key: &str, source: ImageSource) -> anyhow::Result<ImageInfo> {
        self.add_or_get_with(key, move || source.decode())
    }

    /// Get the texture of `key`, calling `load` only if the key is new.
    pub fn add_or_get_with(
        &self,
        key: &str,
        load: impl FnOnce() -> anyhow::Result<ColorImage>,
    ) -> anyhow::Result<ImageInfo> {
        let mut images = self.images.lock();
        if let Some(image) = images.get(key) {
            return Ok(image.info);
        }

        let image = load().with_context(|| format!("cannot load image {key}"))?;
        let [width, height] = image.size;
        let handle = self.ctx.load_texture(key, image, TextureOptions::LINEAR);
        let info = ImageInfo {
            id: handle.id(),
            width: width as _,
            height: height as _,
        };
        debug!("image {} uploaded as {:?}", key, info.id);

        images.insert(key.to_owned(), CachedImage { handle, info });
        Ok(info)
    }

    pub fn get(&self, key: &str) -> Option<ImageInfo> {
        self.images.lock().get(key).map(|image| image.info)
    }

    /// Remove the texture of `key`.
    ///
    /// Returns `false` if the key is unknown.
    pub fn remove(&self, key: &str) -> bool {
        let Some(image) = self.images.lock().remove(key) else {
            return false;
        };

        debug!("image {} removed", key);
        drop(image.handle);
        true
    }

    pub fn clear(&self) {
        self.images.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn pixels(width: usize, height: usize) -> ImageSource {
        ImageSource::Rgba {
            size: [width, height],
            pixels: vec![0xff; width * height * 4],
        }
    }

    #[test]
    fn loads_once_per_key() {
        let cache = ImageCache::new(egui::Context::default());
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            pixels(4, 2).decode()
        };

        let first = cache.add_or_get_with("image", load).unwrap();
        let second = cache.add_or_get_with("image", load).unwrap();

        assert_eq!(loads.get(), 1);
        assert_eq!(first, second);
        assert_eq!((first.width, first.height), (4, 2));
    }

    #[test]
    fn remove_unknown_key() {
        let cache = ImageCache::new(egui::Context::default());
        cache.add_or_get("known", pixels(1, 1)).unwrap();

        assert!(!cache.remove("unknown"));
        assert!(cache.remove("known"));
        assert!(!cache.remove("known"));
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_load_is_not_cached() {
        let cache = ImageCache::new(egui::Context::default());
        let bad = ImageSource::Rgba {
            size: [2, 2],
            pixels: vec![0; 3],
        };

        assert!(cache.add_or_get("image", bad).is_err());
        assert!(cache.get("image").is_none());
        assert!(cache.add_or_get("image", pixels(2, 2)).is_ok());
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let huge = ImageSource::Rgba {
            size: [usize::MAX / 2, 4],
            pixels: vec![],
        };
        assert!(huge.decode().is_err());

        let cache = ImageCache::new(egui::Context::default());
        let huge = ImageSource::Rgba {
            size: [usize::MAX, usize::MAX],
            pixels: vec![0; 4],
        };
        assert!(cache.add_or_get("huge", huge).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn decodes_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        image::RgbaImage::from_pixel(3, 5, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let cache = ImageCache::new(egui::Context::default());
        let info = cache.add_or_get("png", ImageSource::Path(path)).unwrap();
        assert_eq!((info.width, info.height), (3, 5));
    }
}
