//! [`RenderDevice`] on wgpu.
//!
//! Textures are `Rgba16Float` render targets drawn from the context's
//! [`TexturePool`](crate::gpu::TexturePool). Each blend program is built from
//! `feedback.wgsl` with its persistence baked in as a constant, and recorded
//! commands are render bundles that own their uniform buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use half::f16;

use feedback_core::config::InsertionPoint;
use feedback_core::{FeedbackError, FeedbackResult, FilterMode, FrameBuffer, Uniforms};

use crate::device::{
    BlendInputs, BlendProgramDesc, ProgramLibrary, RenderDevice, TextureDesc, TextureHandle,
    TextureId,
};
use crate::gpu::GpuContext;

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const BYTES_PER_PIXEL: u32 = 8;
const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

const FEEDBACK_SHADER: &str = include_str!("feedback.wgsl");

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuUniforms {
    color: [f32; 4],
    rotation: [f32; 4],
    offset: [f32; 2],
    target_size: [f32; 2],
    scale: f32,
    _pad: [f32; 3],
}

impl GpuUniforms {
    fn new(uniforms: &Uniforms, target: &GpuTexture) -> Self {
        Self {
            color: uniforms.color.to_array(),
            rotation: uniforms.rotation,
            offset: uniforms.offset,
            target_size: [target.width() as f32, target.height() as f32],
            scale: uniforms.scale,
            _pad: [0.0; 3],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BlitParams {
    target_size: [f32; 2],
    _pad: [f32; 2],
}

pub struct GpuTexture {
    id: TextureId,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    filter: FilterMode,
}

impl TextureHandle for GpuTexture {
    fn id(&self) -> TextureId {
        self.id
    }

    fn width(&self) -> u32 {
        self.texture.width()
    }

    fn height(&self) -> u32 {
        self.texture.height()
    }

    fn filter_mode(&self) -> FilterMode {
        self.filter
    }
}

pub struct GpuProgram {
    desc: BlendProgramDesc,
    blend_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,
}

impl GpuProgram {
    pub fn desc(&self) -> &BlendProgramDesc {
        &self.desc
    }
}

/// A render bundle drawing the feedback overlay with the delay buffer bound.
pub struct GpuCommand {
    bundle: wgpu::RenderBundle,
    uniforms: wgpu::Buffer,
    bound: TextureId,
}

struct Shared {
    gpu: Arc<GpuContext>,
    library: ProgramLibrary,
    feedback_layout: wgpu::BindGroupLayout,
    feedback_pipeline_layout: wgpu::PipelineLayout,
    blit_layout: wgpu::BindGroupLayout,
    blit_pipeline: wgpu::RenderPipeline,
    blit_params: wgpu::Buffer,
    blend_uniforms: wgpu::Buffer,
    nearest: wgpu::Sampler,
    linear: wgpu::Sampler,
    next_id: AtomicU64,
}

/// wgpu render device. Cloning yields another handle to the same device.
#[derive(Clone)]
pub struct WgpuDevice {
    shared: Arc<Shared>,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn sampler(device: &wgpu::Device, label: &str, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: fragment_entry,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TEXTURE_FORMAT,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

/// `dst.rgb = mix(dst.rgb, src.rgb, src.a)`, `dst.a` unchanged.
const OVERLAY_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

impl WgpuDevice {
    pub fn new(gpu: Arc<GpuContext>, library: ProgramLibrary) -> Self {
        let device = &gpu.device;

        let feedback_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("feedback_bind_group_layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                uniform_entry(3),
            ],
        });
        let feedback_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("feedback_pipeline_layout"),
            bind_group_layouts: &[&feedback_layout],
            push_constant_ranges: &[],
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_bind_group_layout"),
            entries: &[texture_entry(0), uniform_entry(1)],
        });
        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit_pipeline_layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });
        let blit_shader = device.create_shader_module(wgpu::include_wgsl!("blit.wgsl"));
        let blit_pipeline = fullscreen_pipeline(
            device,
            "blit_pipeline",
            &blit_pipeline_layout,
            &blit_shader,
            "fs_main",
            None,
        );

        let blit_params = uniform_buffer(
            device,
            "blit_params",
            std::mem::size_of::<BlitParams>() as u64,
        );
        let blend_uniforms = uniform_buffer(
            device,
            "feedback_blend_uniforms",
            std::mem::size_of::<GpuUniforms>() as u64,
        );
        let nearest = sampler(device, "feedback_sampler_point", wgpu::FilterMode::Nearest);
        let linear = sampler(device, "feedback_sampler_bilinear", wgpu::FilterMode::Linear);

        Self {
            shared: Arc::new(Shared {
                gpu,
                library,
                feedback_layout,
                feedback_pipeline_layout,
                blit_layout,
                blit_pipeline,
                blit_params,
                blend_uniforms,
                nearest,
                linear,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.shared.gpu
    }

    fn device(&self) -> &wgpu::Device {
        &self.shared.gpu.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.shared.gpu.queue
    }

    fn sampler_for(&self, mode: FilterMode) -> &wgpu::Sampler {
        match mode {
            FilterMode::Point => &self.shared.nearest,
            FilterMode::Bilinear => &self.shared.linear,
        }
    }

    /// Run `f` inside an error scope and report what the scope caught.
    fn scoped<T>(&self, filter: wgpu::ErrorFilter, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
        self.device().push_error_scope(filter);
        let value = f();
        let error = pollster::block_on(self.device().pop_error_scope());
        (value, error)
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) -> FeedbackResult<()> {
        let ((), error) = self.scoped(wgpu::ErrorFilter::Validation, || {
            self.queue().submit(Some(encoder.finish()));
        });
        match error {
            Some(e) => Err(FeedbackError::device(e.to_string())),
            None => Ok(()),
        }
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn feedback_bind_group(
        &self,
        label: &str,
        source: &GpuTexture,
        feedback: &GpuTexture,
        filter: FilterMode,
        uniforms: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.shared.feedback_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&feedback.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(self.sampler_for(filter)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    }

    fn build_program(&self, desc: &BlendProgramDesc) -> FeedbackResult<GpuProgram> {
        let source = format!(
            "const PERSISTENCE: f32 = {:?};\n{}",
            desc.persistence, FEEDBACK_SHADER
        );
        let ((blend_pipeline, overlay_pipeline), error) =
            self.scoped(wgpu::ErrorFilter::Validation, || {
                let module = self.device().create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("feedback_program"),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });
                let layout = &self.shared.feedback_pipeline_layout;
                (
                    fullscreen_pipeline(self.device(), "feedback_blend", layout, &module, "fs_blend", None),
                    fullscreen_pipeline(
                        self.device(),
                        "feedback_overlay",
                        layout,
                        &module,
                        "fs_overlay",
                        Some(OVERLAY_BLEND),
                    ),
                )
            });
        if let Some(e) = error {
            return Err(FeedbackError::MissingBlendProgram(format!(
                "{} (failed to build: {})",
                desc.name, e
            )));
        }
        Ok(GpuProgram {
            desc: desc.clone(),
            blend_pipeline,
            overlay_pipeline,
        })
    }

    fn clear(&self, texture: &GpuTexture) -> FeedbackResult<()> {
        let mut encoder = self.encoder("feedback_clear");
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("feedback_clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &texture.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        drop(pass);
        self.submit(encoder)
    }

    fn draw_fullscreen(
        &self,
        label: &str,
        target: &GpuTexture,
        load: wgpu::LoadOp<wgpu::Color>,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
    ) -> FeedbackResult<()> {
        let mut encoder = self.encoder(label);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.submit(encoder)
    }
}

impl RenderDevice for WgpuDevice {
    type Texture = GpuTexture;
    type Program = GpuProgram;
    type Command = GpuCommand;

    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn create_texture(&self, desc: &TextureDesc) -> FeedbackResult<GpuTexture> {
        if desc.width == 0 || desc.height == 0 {
            return Err(FeedbackError::InvalidDimensions(desc.width, desc.height));
        }
        let max = self.device().limits().max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(FeedbackError::allocation(format!(
                "{} ({}x{}): exceeds the device limit of {}",
                desc.label, desc.width, desc.height, max
            )));
        }

        let ((texture, reused), error) = self.scoped(wgpu::ErrorFilter::OutOfMemory, || {
            self.shared.gpu.texture_pool.acquire(
                self.device(),
                Some(desc.label),
                desc.width,
                desc.height,
                TEXTURE_FORMAT,
                TEXTURE_USAGE,
            )
        });
        if let Some(e) = error {
            return Err(FeedbackError::allocation(format!(
                "{} ({}x{}): {}",
                desc.label, desc.width, desc.height, e
            )));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let texture = GpuTexture {
            id: self.shared.next_id.fetch_add(1, Ordering::Relaxed),
            texture,
            view,
            filter: FilterMode::default(),
        };
        // Pooled textures carry old contents and fresh ones are not guaranteed clear.
        if let Err(e) = self.clear(&texture) {
            self.release_texture(texture);
            return Err(e);
        }
        if reused {
            tracing::trace!("reused pooled texture for {}", desc.label);
        }
        Ok(texture)
    }

    fn release_texture(&self, texture: GpuTexture) {
        let GpuTexture { texture, view, .. } = texture;
        drop(view);
        self.shared.gpu.texture_pool.release(texture);
    }

    fn set_filter_mode(&self, texture: &mut GpuTexture, mode: FilterMode) {
        texture.filter = mode;
    }

    fn upload(&self, frame: &FrameBuffer) -> FeedbackResult<GpuTexture> {
        let texture = self.create_texture(&TextureDesc::new("upload", frame.width, frame.height))?;
        let halves: Vec<f16> = frame.data.iter().map(|v| f16::from_f32(*v)).collect();
        self.queue().write_texture(
            texture.texture.as_image_copy(),
            bytemuck::cast_slice(&halves),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * BYTES_PER_PIXEL),
                rows_per_image: Some(frame.height),
            },
            texture.texture.size(),
        );
        Ok(texture)
    }

    fn download(&self, texture: &GpuTexture) -> FeedbackResult<FrameBuffer> {
        let (width, height) = texture.dimensions();
        let unpadded = width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let readback = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("feedback_readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.encoder("feedback_download");
        encoder.copy_texture_to_buffer(
            texture.texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            texture.texture.size(),
        );
        self.submit(encoder)?;

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device().poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| FeedbackError::device(format!("readback channel closed: {}", e)))?
            .map_err(|e| FeedbackError::device(format!("failed to map readback buffer: {}", e)))?;

        let mut frame = FrameBuffer::new(width, height);
        {
            let data = slice.get_mapped_range();
            let row_values = (width * 4) as usize;
            for (y, row) in frame.data.chunks_exact_mut(row_values).enumerate() {
                let start = y * padded as usize;
                let bytes = &data[start..start + unpadded as usize];
                let halves: &[f16] = bytemuck::cast_slice(bytes);
                for (dst, src) in row.iter_mut().zip(halves) {
                    *dst = src.to_f32();
                }
            }
        }
        readback.unmap();
        Ok(frame)
    }

    fn blit(&self, src: &GpuTexture, dst: &mut GpuTexture) -> FeedbackResult<()> {
        if src.dimensions() == dst.dimensions() {
            let mut encoder = self.encoder("feedback_blit_copy");
            encoder.copy_texture_to_texture(
                src.texture.as_image_copy(),
                dst.texture.as_image_copy(),
                src.texture.size(),
            );
            return self.submit(encoder);
        }

        let params = BlitParams {
            target_size: [dst.width() as f32, dst.height() as f32],
            _pad: [0.0; 2],
        };
        self.queue()
            .write_buffer(&self.shared.blit_params, 0, bytemuck::bytes_of(&params));
        let bind_group = self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bind_group"),
            layout: &self.shared.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.shared.blit_params.as_entire_binding(),
                },
            ],
        });
        self.draw_fullscreen(
            "feedback_blit_resample",
            dst,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            &self.shared.blit_pipeline,
            &bind_group,
        )
    }

    fn load_blend_program(&self, name: &str) -> FeedbackResult<GpuProgram> {
        let desc = self.shared.library.resolve(name)?;
        self.build_program(desc)
    }

    fn release_program(&self, program: GpuProgram) {
        drop(program);
    }

    fn invoke_blend_program(
        &self,
        program: &GpuProgram,
        inputs: BlendInputs<'_, GpuTexture>,
        uniforms: &Uniforms,
        target: &mut GpuTexture,
    ) -> FeedbackResult<()> {
        let packed = GpuUniforms::new(uniforms, target);
        self.queue()
            .write_buffer(&self.shared.blend_uniforms, 0, bytemuck::bytes_of(&packed));
        let bind_group = self.feedback_bind_group(
            "feedback_blend_bind_group",
            inputs.source,
            inputs.feedback,
            inputs.feedback.filter,
            &self.shared.blend_uniforms,
        );
        self.draw_fullscreen(
            "feedback_blend",
            target,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            &program.blend_pipeline,
            &bind_group,
        )
    }

    fn record_command(
        &self,
        program: &GpuProgram,
        feedback: &GpuTexture,
        point: InsertionPoint,
    ) -> FeedbackResult<GpuCommand> {
        let uniforms = uniform_buffer(
            self.device(),
            "feedback_command_uniforms",
            std::mem::size_of::<GpuUniforms>() as u64,
        );
        // The overlay never reads the source slot, so the feedback fills both.
        let bind_group = self.feedback_bind_group(
            "feedback_command_bind_group",
            feedback,
            feedback,
            feedback.filter,
            &uniforms,
        );
        let label = format!("feedback_command_{}", point);
        let (bundle, error) = self.scoped(wgpu::ErrorFilter::Validation, || {
            let mut encoder =
                self.device()
                    .create_render_bundle_encoder(&wgpu::RenderBundleEncoderDescriptor {
                        label: Some(&label),
                        color_formats: &[Some(TEXTURE_FORMAT)],
                        depth_stencil: None,
                        sample_count: 1,
                        multiview: None,
                    });
            encoder.set_pipeline(&program.overlay_pipeline);
            encoder.set_bind_group(0, &bind_group, &[]);
            encoder.draw(0..3, 0..1);
            encoder.finish(&wgpu::RenderBundleDescriptor {
                label: Some(&label),
            })
        });
        if let Some(e) = error {
            uniforms.destroy();
            return Err(FeedbackError::device(format!("failed to record command: {}", e)));
        }
        Ok(GpuCommand {
            bundle,
            uniforms,
            bound: feedback.id,
        })
    }

    fn execute_command(
        &self,
        command: &GpuCommand,
        feedback: &GpuTexture,
        uniforms: &Uniforms,
        target: &mut GpuTexture,
    ) -> FeedbackResult<()> {
        if command.bound != feedback.id {
            return Err(FeedbackError::StaleCommand {
                recorded: command.bound,
                current: feedback.id,
            });
        }
        let packed = GpuUniforms::new(uniforms, target);
        self.queue()
            .write_buffer(&command.uniforms, 0, bytemuck::bytes_of(&packed));

        let mut encoder = self.encoder("feedback_command_execute");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("feedback_command_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.execute_bundles(std::iter::once(&command.bundle));
        }
        self.submit(encoder)
    }

    fn release_command(&self, command: GpuCommand) {
        command.uniforms.destroy();
    }

    fn reclaim(&self) {
        let freed = self.shared.gpu.texture_pool.purge();
        if freed > 0 {
            tracing::debug!("purged {} pooled textures", freed);
        }
    }
}
