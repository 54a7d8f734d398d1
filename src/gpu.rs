//! WGPU implementation of [`Renderer`].
//!
//! GPU copies of geometry and textures are cached by the address of their
//! shared `Arc`, so every mesh referencing the same texture asset binds the
//! same GPU texture. A cached texture whose asset was marked stale is
//! re-uploaded before the next draw. Materials without a map bind a 1x1
//! white texture and draw their flat colour.

use std::{collections::HashMap, iter, sync::Arc};

use wgpu::util::DeviceExt;

use crate::{
    camera::PerspectiveCamera,
    context::Context,
    data_structures::{model::Geometry, scene_graph::Scene, texture::{Texture, TextureAsset}},
    error::Result,
    pipelines::unlit::{self, MAX_JOINTS, MeshUniform, SkinnedVertex},
    render::{DrawList, Renderer},
};

#[derive(Debug)]
struct GpuTexture {
    _asset: Option<Arc<TextureAsset>>,
    texture: Texture,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
struct GpuMesh {
    _geometry: Arc<Geometry>,
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    count: u32,
}

/// Uniforms for one draw slot.
#[derive(Debug)]
struct MeshSlot {
    uniform: wgpu::Buffer,
    palette: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// What the render pass needs for one draw.
struct Prepared {
    mesh: usize,
    texture: Option<usize>,
    slot: usize,
}

#[derive(Debug)]
pub struct GpuRenderer {
    ctx: Context,
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    mesh_layout: wgpu::BindGroupLayout,
    white: GpuTexture,
    textures: HashMap<usize, GpuTexture>,
    meshes: HashMap<usize, GpuMesh>,
    slots: Vec<MeshSlot>,
    background: [f64; 4],
    pending_clear: Option<[f64; 4]>,
}

fn arc_key<T>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as usize
}

fn to_wgpu_color([r, g, b, a]: [f64; 4]) -> wgpu::Color {
    wgpu::Color { r, g, b, a }
}

impl GpuRenderer {
    pub fn new(ctx: Context, background: [f64; 4]) -> Self {
        let texture_layout = unlit::texture_layout(&ctx.device);
        let mesh_layout = unlit::mesh_layout(&ctx.device);
        let pipeline = unlit::mk_unlit_pipeline(
            &ctx.device,
            ctx.config.format,
            &ctx.camera.bind_group_layout,
            &texture_layout,
            &mesh_layout,
        );
        let white = Texture::create_white(&ctx.device, &ctx.queue);
        let white = GpuTexture {
            _asset: None,
            bind_group: unlit::texture_bind_group(&ctx.device, &texture_layout, &white),
            texture: white,
        };

        Self {
            ctx,
            pipeline,
            texture_layout,
            mesh_layout,
            white,
            textures: HashMap::new(),
            meshes: HashMap::new(),
            slots: Vec::new(),
            background,
            pending_clear: None,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }

    /// Whether a GPU copy of `asset` is currently cached.
    #[cfg(feature = "integration-tests")]
    pub fn is_texture_cached(&self, asset: &Arc<TextureAsset>) -> bool {
        self.textures.contains_key(&arc_key(asset))
    }

    fn upload_mesh(&mut self, geometry: &Arc<Geometry>) -> Option<usize> {
        if geometry.positions.is_empty() || geometry.indices.is_empty() {
            return None;
        }
        let key = arc_key(geometry);
        let device = &self.ctx.device;
        self.meshes.entry(key).or_insert_with(|| {
            let vertices = SkinnedVertex::from_geometry(geometry);
            GpuMesh {
                _geometry: geometry.clone(),
                vertex: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Vertex Buffer"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Index Buffer"),
                    contents: bytemuck::cast_slice(&geometry.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                count: geometry.indices.len() as u32,
            }
        });
        Some(key)
    }

    fn upload_texture(&mut self, asset: &Arc<TextureAsset>) -> usize {
        let key = arc_key(asset);
        let fresh = match self.textures.get(&key) {
            Some(cached) => !cached.texture.refresh(&self.ctx.queue, asset),
            None => true,
        };
        if fresh {
            let texture = Texture::from_asset(&self.ctx.device, &self.ctx.queue, asset);
            let bind_group = unlit::texture_bind_group(&self.ctx.device, &self.texture_layout, &texture);
            self.textures.insert(
                key,
                GpuTexture {
                    _asset: Some(asset.clone()),
                    texture,
                    bind_group,
                },
            );
        }
        key
    }

    fn slot(&mut self, idx: usize) -> &MeshSlot {
        while self.slots.len() <= idx {
            let device = &self.ctx.device;
            let uniform = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Mesh Uniform Buffer"),
                size: std::mem::size_of::<MeshUniform>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let palette = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Joint Palette Buffer"),
                size: (MAX_JOINTS * std::mem::size_of::<[[f32; 4]; 4]>()) as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.mesh_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: palette.as_entire_binding(),
                    },
                ],
                label: Some("mesh_bind_group"),
            });
            self.slots.push(MeshSlot {
                uniform,
                palette,
                bind_group,
            });
        }
        &self.slots[idx]
    }

    /// Uploads everything the draw list references and fills one slot per item.
    fn prepare(&mut self, list: &DrawList) -> Vec<Prepared> {
        let mut prepared = Vec::with_capacity(list.items.len());
        for item in &list.items {
            let Some(mesh) = self.upload_mesh(&item.mesh.geometry) else {
                continue;
            };
            let texture = item.mesh.material.map.as_ref().map(|map| self.upload_texture(map));

            let uniform = MeshUniform::new(item.world, item.mesh.material.color, item.palette.is_some());
            let slot_idx = prepared.len();
            let queue = self.ctx.queue.clone();
            let slot = self.slot(slot_idx);
            queue.write_buffer(&slot.uniform, 0, bytemuck::cast_slice(&[uniform]));
            if let Some(palette) = item.palette.and_then(|idx| list.palettes.get(idx)) {
                if palette.len() > MAX_JOINTS {
                    log::warn!("skin with {} joints truncated to {MAX_JOINTS}", palette.len());
                }
                let matrices: Vec<[[f32; 4]; 4]> =
                    palette.iter().take(MAX_JOINTS).map(|&m| m.into()).collect();
                queue.write_buffer(&slot.palette, 0, bytemuck::cast_slice(&matrices));
            }
            prepared.push(Prepared {
                mesh,
                texture,
                slot: slot_idx,
            });
        }
        prepared
    }

    /// Drops GPU copies no longer referenced by any material or mesh.
    fn evict(&mut self, prepared: &[Prepared]) {
        self.meshes.retain(|key, _| prepared.iter().any(|p| p.mesh == *key));
        self.textures
            .retain(|key, _| prepared.iter().any(|p| p.texture == Some(*key)));
    }
}

impl Renderer for GpuRenderer {
    fn clear(&mut self, colour: [f64; 4]) {
        self.pending_clear = Some(colour);
    }

    fn draw(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()> {
        let clear = self.pending_clear.take().unwrap_or(self.background);
        if !self.ctx.is_surface_configured() {
            return Ok(());
        }
        self.ctx.camera.update(&self.ctx.queue, camera);

        let list = DrawList::collect(scene);
        let prepared = self.prepare(&list);
        self.evict(&prepared);

        let Some(frame) = self.ctx.acquire()? else {
            return Ok(());
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color(clear)),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                multiview_mask: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.ctx.camera.bind_group, &[]);
            for draw in &prepared {
                let (Some(mesh), Some(slot)) = (self.meshes.get(&draw.mesh), self.slots.get(draw.slot)) else {
                    continue;
                };
                let texture = draw
                    .texture
                    .and_then(|key| self.textures.get(&key))
                    .unwrap_or(&self.white);
                render_pass.set_bind_group(1, &texture.bind_group, &[]);
                render_pass.set_bind_group(2, &slot.bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                render_pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.count, 0, 0..1);
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
