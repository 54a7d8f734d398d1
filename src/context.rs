//! GPU and window context.
//!
//! Owns the WGPU device and queue, the target frames are drawn into, the depth
//! buffer matching the target size, and the camera uniform every pipeline
//! binds at group 0. The target is a window surface, or with the
//! `integration-tests` feature an offscreen texture that can be read back.

use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{CameraUniform, PerspectiveCamera},
    data_structures::texture::Texture,
    error::{Result, ViewerError},
};

#[derive(Debug)]
pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    fn new(device: &wgpu::Device) -> Self {
        let uniform = CameraUniform::new();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Uploads the view-projection of `camera`.
    pub fn update(&mut self, queue: &wgpu::Queue, camera: &PerspectiveCamera) {
        self.uniform.update_view_proj(camera);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

/// Where frames end up.
#[derive(Debug)]
pub enum Target {
    Window {
        window: Arc<Window>,
        surface: wgpu::Surface<'static>,
    },
    #[cfg(feature = "integration-tests")]
    Offscreen(wgpu::Texture),
}

/// One acquired frame: a view to draw into and, for surfaces, the texture to
/// present afterwards.
pub(crate) struct Frame {
    pub view: wgpu::TextureView,
    output: Option<wgpu::SurfaceTexture>,
}

impl Frame {
    pub fn present(self) {
        if let Some(output) = self.output {
            output.present();
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub target: Target,
    pub(crate) depth_texture: Texture,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| ViewerError::Graphics(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| ViewerError::Graphics(e.to_string()))?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = request_device(&adapter).await?;

        // shaders write linear colour and expect an sRGB target
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| ViewerError::Graphics("surface has no supported format".to_string()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera = CameraResources::new(&device);
        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");

        let mut ctx = Self {
            target: Target::Window { window, surface },
            depth_texture,
            device,
            queue,
            config,
            camera,
            is_surface_configured: false,
        };
        ctx.resize(size.width, size.height);
        Ok(ctx)
    }

    /// Context drawing into an offscreen `width` x `height` texture.
    #[cfg(feature = "integration-tests")]
    pub async fn headless(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| ViewerError::Graphics(e.to_string()))?;
        let (device, queue) = request_device(&adapter).await?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let camera = CameraResources::new(&device);
        let depth_texture =
            Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
        let target = Target::Offscreen(offscreen_texture(&device, &config));

        Ok(Self {
            target,
            depth_texture,
            device,
            queue,
            config,
            camera,
            is_surface_configured: true,
        })
    }

    pub fn is_surface_configured(&self) -> bool {
        self.is_surface_configured
    }

    /// Reconfigures the target and depth buffer. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        match &mut self.target {
            Target::Window { surface, .. } => surface.configure(&self.device, &self.config),
            #[cfg(feature = "integration-tests")]
            Target::Offscreen(texture) => *texture = offscreen_texture(&self.device, &self.config),
        }
        self.depth_texture =
            Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        self.is_surface_configured = true;
    }

    /// Reconfigures with the current size, e.g. after the surface was lost.
    pub fn reconfigure(&mut self) {
        let (width, height) = match &self.target {
            Target::Window { window, .. } => {
                let size = window.inner_size();
                (size.width, size.height)
            }
            #[cfg(feature = "integration-tests")]
            Target::Offscreen(_) => (self.config.width, self.config.height),
        };
        self.resize(width, height);
    }

    /// Acquires the next frame. `None` means this frame is skipped.
    pub(crate) fn acquire(&mut self) -> Result<Option<Frame>> {
        let output = match &self.target {
            Target::Window { surface, .. } => surface.get_current_texture(),
            #[cfg(feature = "integration-tests")]
            Target::Offscreen(texture) => {
                return Ok(Some(Frame {
                    view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                    output: None,
                }));
            }
        };
        match output {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => Ok(Some(Frame {
                view: output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default()),
                output: Some(output),
            })),
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                self.reconfigure();
                Ok(None)
            }
            wgpu::CurrentSurfaceTexture::Timeout => {
                log::warn!("surface timed out, skipping frame");
                Ok(None)
            }
            e @ (wgpu::CurrentSurfaceTexture::Occluded | wgpu::CurrentSurfaceTexture::Validation) => {
                Err(ViewerError::Graphics(format!("{e:?}")))
            }
        }
    }

    /// Copies the offscreen target back into an image.
    #[cfg(feature = "integration-tests")]
    pub async fn read_pixels(&self) -> Result<image::RgbaImage> {
        let Target::Offscreen(texture) = &self.target else {
            return Err(ViewerError::Graphics("only offscreen targets can be read back".to_string()));
        };
        let (width, height) = (self.config.width, self.config.height);
        let unpadded = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            texture.size(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        // map first, then poll, then await
        let slice = buffer.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(std::time::Duration::from_secs(3)),
            })
            .map_err(|e| ViewerError::Graphics(e.to_string()))?;
        rx.receive()
            .await
            .ok_or_else(|| ViewerError::Graphics("readback was dropped".to_string()))?
            .map_err(|e| ViewerError::Graphics(e.to_string()))?;

        let data = slice.get_mapped_range();
        let rows: Vec<u8> = data
            .chunks(padded as usize)
            .flat_map(|row| &row[..unpadded as usize])
            .copied()
            .collect();
        drop(data);
        buffer.unmap();
        image::RgbaImage::from_raw(width, height, rows)
            .ok_or_else(|| ViewerError::Graphics("readback size mismatch".to_string()))
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            // WebGL lacks some of the defaults
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
            ..Default::default()
        })
        .await
        .map_err(|e| ViewerError::Graphics(e.to_string()))
}

#[cfg(feature = "integration-tests")]
fn offscreen_texture(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: config.usage,
        view_formats: &[],
    })
}
