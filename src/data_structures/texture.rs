//! Textures: the decoded image asset and its GPU counterpart.
//!
//! [`TextureAsset`] is what the loader produces and what materials share.
//! [`Texture`] wraps the WGPU objects the renderer creates from it, plus the
//! depth buffer and the 1x1 fallback used by materials without a map.

use std::sync::atomic::{AtomicBool, Ordering};

/// A decoded RGBA image shared by every material that references it.
#[derive(Debug)]
pub struct TextureAsset {
    pub label: String,
    pub image: image::RgbaImage,
    /// Whether rows are flipped on upload. glTF UVs start top-left, so the
    /// loader leaves this off.
    pub flip_y: bool,
    needs_update: AtomicBool,
}

impl TextureAsset {
    /// Wraps `image` and marks it as stale so the first draw uploads it.
    pub fn new(label: impl Into<String>, image: image::RgbaImage) -> Self {
        Self {
            label: label.into(),
            image,
            flip_y: false,
            needs_update: AtomicBool::new(true),
        }
    }

    /// Vertical gradient from `from` (top row) to `to` (bottom row).
    pub fn gradient(label: impl Into<String>, from: [u8; 3], to: [u8; 3], height: u32) -> Self {
        let height = height.max(2);
        let image = image::RgbaImage::from_fn(1, height, |_, y| {
            let t = y as f32 / (height - 1) as f32;
            let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            image::Rgba([mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2]), 255])
        });
        Self::new(label, image)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update.load(Ordering::Acquire)
    }

    pub fn set_needs_update(&self) {
        self.needs_update.store(true, Ordering::Release);
    }

    /// Returns the stale flag and clears it.
    pub(crate) fn take_needs_update(&self) -> bool {
        self.needs_update.swap(false, Ordering::AcqRel)
    }
}

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// 1x1 white texture bound for materials that only carry a flat colour.
    pub fn create_white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let white = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        Self::from_rgba(device, queue, &white, false, Some("white"))
    }

    /// Creates the GPU copy of `asset` and clears its stale flag.
    pub fn from_asset(device: &wgpu::Device, queue: &wgpu::Queue, asset: &TextureAsset) -> Self {
        asset.take_needs_update();
        Self::from_rgba(device, queue, &asset.image, asset.flip_y, Some(&asset.label))
    }

    /// Re-uploads `asset` into this texture if it was marked stale.
    ///
    /// Returns false when the dimensions changed and the texture has to be
    /// recreated instead.
    pub fn refresh(&self, queue: &wgpu::Queue, asset: &TextureAsset) -> bool {
        let (width, height) = asset.dimensions();
        let size = self.texture.size();
        if size.width != width || size.height != height {
            return false;
        }
        if asset.take_needs_update() {
            write_rgba(queue, &self.texture, &asset.image, asset.flip_y);
        }
        true
    }

    fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &image::RgbaImage,
        flip_y: bool,
        label: Option<&str>,
    ) -> Self {
        let dimensions = rgba.dimensions();
        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_rgba(queue, &texture, rgba, flip_y);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));

        Self {
            texture,
            view,
            sampler,
        }
    }
}

fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, rgba: &image::RgbaImage, flip_y: bool) {
    let (width, height) = rgba.dimensions();
    let flipped;
    let data = if flip_y {
        flipped = image::imageops::flip_vertical(rgba);
        &flipped
    } else {
        rgba
    };
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assets_start_stale_and_unflipped() {
        let asset = TextureAsset::new("t", image::RgbaImage::new(2, 2));
        assert!(!asset.flip_y);
        assert!(asset.needs_update());
        assert!(asset.take_needs_update());
        assert!(!asset.needs_update());
    }

    #[test]
    fn gradient_runs_from_top_to_bottom() {
        let asset = TextureAsset::gradient("g", [0, 0, 0], [255, 100, 10], 3);
        assert_eq!(asset.dimensions(), (1, 3));
        assert_eq!(asset.image.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(asset.image.get_pixel(0, 1).0, [128, 50, 5, 255]);
        assert_eq!(asset.image.get_pixel(0, 2).0, [255, 100, 10, 255]);
    }
}
