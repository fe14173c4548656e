//! Headless wgpu implementation of the driver boundary.
//!
//! Every image is an `Rgba8Unorm` texture usable as render target, sampled
//! texture and copy source/destination. Each draw is encoded into its own
//! render pass and submitted immediately, which keeps `queue.write_texture`
//! uploads ordered with respect to draws.

mod device;
mod pipeline;

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::error::{GfxError, GfxResult};
use crate::geom::IRect;

use super::{DrawTrianglesCommand, FillRule, GraphicsDriver, ImageId, ShaderId};
pub use device::WgpuInit;
use pipeline::{COLOR_FORMAT, FrameUniform, PipelineCache, PipelineKey, STENCIL_FORMAT, StencilPass};

struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// wgpu implementation of [`GraphicsDriver`].
pub struct WgpuDriver {
    device: wgpu::Device,
    queue: wgpu::Queue,

    images: HashMap<ImageId, GpuImage>,
    shaders: HashMap<ShaderId, wgpu::ShaderModule>,
    next_image: u32,
    next_shader: u32,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: PipelineCache,

    /// Bound for absent sources.
    placeholder: GpuImage,
    /// Stencil attachments must match the color target size.
    stencils: HashMap<(u32, u32), wgpu::TextureView>,

    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    index_count: usize,
}

impl WgpuDriver {
    /// Creates a driver on a new headless device.
    pub async fn new(init: WgpuInit) -> GfxResult<Self> {
        let (device, queue) = device::request_device(&init).await?;
        Ok(Self::from_device(device, queue))
    }

    /// Blocking variant of [`WgpuDriver::new`].
    pub fn new_blocking(init: WgpuInit) -> GfxResult<Self> {
        pollster::block_on(Self::new(init))
    }

    /// Wraps an existing device/queue pair.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ember draw bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        // Caller uniforms may extend the engine block.
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ember draw pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            // Newer wgpu uses immediate constants; keep disabled for now.
            immediate_size: 0,
        });

        let placeholder = create_texture(&device, 1, 1, "ember placeholder texture");

        Self {
            device,
            queue,
            images: HashMap::new(),
            shaders: HashMap::new(),
            next_image: 1,
            next_shader: 1,
            bind_group_layout,
            pipeline_layout,
            pipelines: PipelineCache::default(),
            placeholder,
            stencils: HashMap::new(),
            vertex_buffer: None,
            index_buffer: None,
            index_count: 0,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn image(&self, id: ImageId) -> GfxResult<&GpuImage> {
        self.images
            .get(&id)
            .ok_or_else(|| GfxError::driver_failure(format!("unknown image {id:?}")))
    }

    fn insert_image(&mut self, width: u32, height: u32, label: &str) -> GfxResult<ImageId> {
        if width == 0 || height == 0 {
            return Err(GfxError::invalid_argument(format!(
                "image size {width}x{height} must be positive"
            )));
        }
        let max = self.max_image_size();
        if width > max || height > max {
            return Err(GfxError::resource_exceeded(format!(
                "image size {width}x{height} exceeds {max}"
            )));
        }
        let id = ImageId(self.next_image);
        self.next_image += 1;
        let image = create_texture(&self.device, width, height, label);
        self.images.insert(id, image);
        Ok(id)
    }

    fn ensure_stencil(&mut self, width: u32, height: u32) {
        self.stencils.entry((width, height)).or_insert_with(|| {
            log::debug!("creating {width}x{height} stencil attachment");
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("ember stencil"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: STENCIL_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        });
    }

    fn uniform_bytes(&self, cmd: &DrawTrianglesCommand<'_>, dst: &GpuImage) -> Vec<u8> {
        let src_size = cmd.srcs[0]
            .and_then(|id| self.images.get(&id))
            .map_or([1.0, 1.0], |img| [img.width as f32, img.height as f32]);
        let r = cmd.src_regions[0];
        let frame = FrameUniform {
            dst_size: [dst.width as f32, dst.height as f32],
            src_size,
            src_region_min: [r.min_x as f32, r.min_y as f32],
            src_region_max: [r.max_x as f32, r.max_y as f32],
            src_offsets: cmd.offsets,
            _pad: [0.0; 2],
        };
        let mut bytes = bytemuck::bytes_of(&frame).to_vec();
        bytes.extend_from_slice(bytemuck::cast_slice(cmd.uniforms));
        // Uniform buffers are read in 16-byte rows.
        bytes.resize(bytes.len().next_multiple_of(16), 0);
        bytes
    }
}

fn create_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> GpuImage {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuImage {
        texture,
        view,
        width,
        height,
    }
}

fn check_region(img: &GpuImage, region: IRect, len: usize) -> GfxResult<()> {
    let bounds = IRect::from_size(img.width as i32, img.height as i32);
    if region.is_empty() || !region.is_in(bounds) {
        return Err(GfxError::invalid_argument(format!(
            "region {region:?} is outside image {bounds:?}"
        )));
    }
    if len != region.rgba_len() {
        return Err(GfxError::invalid_argument(format!(
            "pixel buffer is {len} bytes, region needs {}",
            region.rgba_len()
        )));
    }
    Ok(())
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

fn extent(region: IRect) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: region.dx() as u32,
        height: region.dy() as u32,
        depth_or_array_layers: 1,
    }
}

fn origin(region: IRect) -> wgpu::Origin3d {
    wgpu::Origin3d {
        x: region.min_x as u32,
        y: region.min_y as u32,
        z: 0,
    }
}

impl GraphicsDriver for WgpuDriver {
    fn begin(&mut self) -> GfxResult<()> {
        Ok(())
    }

    fn end(&mut self, _present: bool) -> GfxResult<()> {
        // Headless: there is no swapchain; make sure queued uploads reach the GPU.
        self.queue.submit(std::iter::empty());
        Ok(())
    }

    fn max_image_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn new_image(&mut self, width: u32, height: u32) -> GfxResult<ImageId> {
        self.insert_image(width, height, "ember image")
    }

    fn new_screen_framebuffer_image(&mut self, width: u32, height: u32) -> GfxResult<ImageId> {
        self.insert_image(width, height, "ember screen")
    }

    fn dispose_image(&mut self, id: ImageId) {
        if let Some(img) = self.images.remove(&id) {
            img.texture.destroy();
        }
    }

    fn new_shader(&mut self, source: &str) -> GfxResult<ShaderId> {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ember shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let info = pollster::block_on(module.get_compilation_info());
        if let Some(msg) = info
            .messages
            .iter()
            .find(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
        {
            return Err(GfxError::driver_failure(format!(
                "shader compilation failed: {}",
                msg.message
            )));
        }
        let id = ShaderId(self.next_shader);
        self.next_shader += 1;
        self.shaders.insert(id, module);
        Ok(id)
    }

    fn dispose_shader(&mut self, id: ShaderId) {
        if self.shaders.remove(&id).is_some() {
            self.pipelines.forget_shader(id);
        }
    }

    fn write_pixels(&mut self, id: ImageId, pix: &[u8], region: IRect) -> GfxResult<()> {
        let img = self.image(id)?;
        check_region(img, region, pix.len())?;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &img.texture,
                mip_level: 0,
                origin: origin(region),
                aspect: wgpu::TextureAspect::All,
            },
            pix,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * region.dx() as u32),
                rows_per_image: Some(region.dy() as u32),
            },
            extent(region),
        );
        Ok(())
    }

    fn read_pixels(&mut self, id: ImageId, buf: &mut [u8], region: IRect) -> GfxResult<()> {
        let img = self.image(id)?;
        check_region(img, region, buf.len())?;

        let row_bytes = 4 * region.dx() as u32;
        let padded_row_bytes = align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ember readback"),
            size: padded_row_bytes as u64 * region.dy() as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ember readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &img.texture,
                mip_level: 0,
                origin: origin(region),
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(region.dy() as u32),
                },
            },
            extent(region),
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GfxError::driver_failure(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| GfxError::driver_failure("readback channel closed"))?
            .map_err(|e| GfxError::driver_failure(format!("readback map failed: {e:?}")))?;

        {
            let mapped = slice.get_mapped_range();
            for (row, dst) in buf.chunks_exact_mut(row_bytes as usize).enumerate() {
                let start = row * padded_row_bytes as usize;
                dst.copy_from_slice(&mapped[start..start + row_bytes as usize]);
            }
        }
        readback.unmap();
        Ok(())
    }

    fn set_vertices(&mut self, vertices: &[f32], indices: &[u32]) -> GfxResult<()> {
        if vertices.is_empty() || indices.is_empty() {
            self.vertex_buffer = None;
            self.index_buffer = None;
            self.index_count = 0;
            return Ok(());
        }
        self.vertex_buffer = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ember vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        self.index_buffer = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ember indices"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        }));
        self.index_count = indices.len();
        Ok(())
    }

    fn draw_triangles(&mut self, cmd: &DrawTrianglesCommand<'_>) -> GfxResult<()> {
        if cmd.srcs.iter().flatten().any(|&s| s == cmd.dst) {
            return Err(GfxError::invalid_argument("a draw cannot sample its own destination"));
        }
        let end = cmd
            .index_offset
            .checked_add(cmd.index_len)
            .filter(|&end| end <= self.index_count)
            .ok_or_else(|| GfxError::invalid_argument("index range outside the index buffer"))?;
        let module = self
            .shaders
            .get(&cmd.shader)
            .ok_or_else(|| GfxError::driver_failure(format!("unknown shader {:?}", cmd.shader)))?
            .clone();

        let (width, height) = {
            let dst = self.image(cmd.dst)?;
            (dst.width, dst.height)
        };
        let clip = cmd
            .dst_region
            .intersect(IRect::from_size(width as i32, height as i32));
        if clip.is_empty() || cmd.index_len == 0 {
            return Ok(());
        }

        let stencil_passes: &[StencilPass] = match cmd.fill_rule {
            FillRule::FillAll => &[StencilPass::None],
            FillRule::NonZero => &[StencilPass::WriteNonZero, StencilPass::Test],
            FillRule::EvenOdd => &[StencilPass::WriteEvenOdd, StencilPass::Test],
        };
        if cmd.fill_rule != FillRule::FillAll {
            self.ensure_stencil(width, height);
        }
        for &stencil in stencil_passes {
            let key = PipelineKey {
                shader: cmd.shader,
                blend: cmd.blend,
                stencil,
            };
            self.pipelines
                .get_or_create(&self.device, &self.pipeline_layout, &module, key);
        }

        let dst = self.image(cmd.dst)?;
        let ubo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ember draw uniforms"),
            contents: &self.uniform_bytes(cmd, dst),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let mut views = Vec::with_capacity(4);
        for src in cmd.srcs {
            views.push(match src {
                Some(id) => &self.image(id)?.view,
                None => &self.placeholder.view,
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ember draw bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(views[3]),
                },
            ],
        });

        let (Some(vbo), Some(ibo)) = (self.vertex_buffer.as_ref(), self.index_buffer.as_ref()) else {
            return Err(GfxError::invalid_argument("draw without vertices"));
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ember draw encoder"),
        });
        {
            let depth_stencil_attachment = self.stencils.get(&(width, height)).filter(|_| {
                cmd.fill_rule != FillRule::FillAll
            });
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ember draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: depth_stencil_attachment.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: None,
                        stencil_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(0),
                            store: wgpu::StoreOp::Discard,
                        }),
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_scissor_rect(
                clip.min_x as u32,
                clip.min_y as u32,
                clip.dx() as u32,
                clip.dy() as u32,
            );
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..));
            rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
            rpass.set_stencil_reference(0);

            let range = cmd.index_offset as u32..end as u32;
            for &stencil in stencil_passes {
                let key = PipelineKey {
                    shader: cmd.shader,
                    blend: cmd.blend,
                    stencil,
                };
                let Some(pipeline) = self.pipelines.get(&key) else {
                    unreachable!("pipelines are built before the pass begins");
                };
                rpass.set_pipeline(pipeline);
                rpass.draw_indexed(range.clone(), 0, 0..1);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
