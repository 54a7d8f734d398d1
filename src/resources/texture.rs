use crate::{
    data_structures::texture::TextureAsset,
    error::{Result, ViewerError},
};

/// Decodes image file contents (PNG, JPEG, ...) into a texture asset.
///
/// The asset comes back with `flip_y` off, matching the glTF UV origin, and
/// flagged stale so the renderer uploads it on first use.
pub fn decode_texture(bytes: &[u8], label: &str) -> Result<TextureAsset> {
    let img = image::load_from_memory(bytes).map_err(|e| ViewerError::fetch(label, e))?;
    let asset = TextureAsset::new(label, img.to_rgba8());
    asset.set_needs_update();
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decodes_png_with_load_flags() {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let asset = decode_texture(&png, "robot-texture.png").unwrap();
        assert_eq!(asset.dimensions(), (3, 2));
        assert!(!asset.flip_y);
        assert!(asset.needs_update());
        assert_eq!(asset.image.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn garbage_is_a_fetch_failure_naming_the_resource() {
        let err = decode_texture(b"not an image", "broken.png").unwrap_err();
        assert!(matches!(err, ViewerError::AssetFetchFailed { ref resource, .. } if resource == "broken.png"));
    }
}
