//! GPU Backend
//!
//! Offscreen wgpu renderer. Draws the frame into an `Rgba8Unorm` color target
//! with a `Depth32Float` depth buffer and reads it back on demand.
//!
//! Three pipelines share one uniform block:
//! - mesh: lit or unlit triangles with alpha blending
//! - line: segments expanded to screen-space quads so widths above one
//!   pixel work on every backend
//! - sprite: textured billboard quads, one bind group per label texture

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::error::{ProviderError, RenderError};
use crate::scene::{DrawList, DrawVertex, ResourceHandle, ResourcePool, Texture, TextureId};

use super::backend::RenderBackend;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const READBACK_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// GPU DATA
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct LabUniforms {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
    directional: [f32; 4],
    ambient: [f32; 4],
    viewport: [f32; 4],
}

static_assertions::assert_eq_size!(LabUniforms, [u8; 128]);

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct LineVertex {
    position: [f32; 3],
    other: [f32; 3],
    color: [f32; 4],
    side_width: [f32; 2],
}

static_assertions::assert_eq_size!(LineVertex, [u8; 48]);

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SpriteVertex {
    position: [f32; 3],
    uv: [f32; 2],
    opacity: f32,
}

static_assertions::assert_eq_size!(SpriteVertex, [u8; 24]);

/// Expand one segment into two triangles.
fn line_quad(a: Vec3, b: Vec3, color: [f32; 4], width: f32) -> [LineVertex; 6] {
    let v = |p: Vec3, o: Vec3, side: f32| LineVertex {
        position: p.to_array(),
        other: o.to_array(),
        color,
        side_width: [side, width.max(1.0)],
    };
    // The offset direction flips at `b` because its "other" endpoint is `a`
    let (a0, a1) = (v(a, b, 1.0), v(a, b, -1.0));
    let (b0, b1) = (v(b, a, -1.0), v(b, a, 1.0));
    [a0, a1, b0, a1, b1, b0]
}

struct CachedTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// Live wgpu objects; dropped on dispose.
struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    mesh_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    sprite_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    textures: HashMap<TextureId, CachedTexture>,
}

/// Adapter selection for [`GpuBackend::new`].
#[derive(Clone, Debug)]
pub struct GpuBackendConfig {
    pub high_performance: bool,
    /// Ask wgpu for its fallback (software) adapter
    pub force_fallback_adapter: bool,
}

impl Default for GpuBackendConfig {
    fn default() -> Self {
        Self {
            high_performance: true,
            force_fallback_adapter: false,
        }
    }
}

pub struct GpuBackend {
    state: Option<GpuState>,
    adapter_name: String,
    software_adapter: bool,
    width: u32,
    height: u32,
    has_frame: bool,
}

// ============================================================================
// CREATION
// ============================================================================

impl GpuBackend {
    pub fn new(width: u32, height: u32, config: &GpuBackendConfig) -> Result<Self, ProviderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: if config.high_performance {
                wgpu::PowerPreference::HighPerformance
            } else {
                wgpu::PowerPreference::LowPower
            },
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        }))
        .map_err(|e| ProviderError::NoAdapter(e.to_string()))?;

        let info = adapter.get_info();
        let name_lower = info.name.to_lowercase();
        let software_adapter = name_lower.contains("llvmpipe")
            || name_lower.contains("lavapipe")
            || name_lower.contains("swiftshader")
            || info.device_type == wgpu::DeviceType::Cpu;
        if software_adapter {
            tracing::info!("wgpu adapter '{}' is a software renderer", info.name);
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Terrain Lab Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))
        .map_err(|e| ProviderError::Device(e.to_string()))?;

        let width = width.max(1);
        let height = height.max(1);
        let state = GpuState::new(device, queue, width, height);
        tracing::info!("wgpu backend ready on '{}' ({:?}) at {}x{}", info.name, info.backend, width, height);

        Ok(Self {
            state: Some(state),
            adapter_name: info.name,
            software_adapter,
            width,
            height,
            has_frame: false,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// True when the adapter is llvmpipe, lavapipe, SwiftShader or another CPU device.
    pub fn is_software_adapter(&self) -> bool {
        self.software_adapter
    }
}

impl GpuState {
    fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lab Uniform Buffer"),
            contents: bytemuck::bytes_of(&LabUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lab Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lab Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Label Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Label Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lab Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/lab_mesh.wgsl").into()),
        });
        let sprite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lab Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/lab_sprite.wgsl").into()),
        });

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lab Mesh Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let sprite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lab Sprite Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let mesh_attributes = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x4];
        let line_attributes =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x4, 3 => Float32x2];
        let sprite_attributes = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32];

        let mesh_pipeline = create_pipeline(
            &device,
            "Lab Mesh Pipeline",
            &mesh_layout,
            &mesh_shader,
            "vs_mesh",
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<DrawVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &mesh_attributes,
            },
            true,
            wgpu::DepthBiasState::default(),
        );
        let line_pipeline = create_pipeline(
            &device,
            "Lab Line Pipeline",
            &mesh_layout,
            &mesh_shader,
            "vs_line",
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<LineVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &line_attributes,
            },
            false,
            wgpu::DepthBiasState {
                constant: -4,
                slope_scale: -1.0,
                clamp: 0.0,
            },
        );
        let sprite_pipeline = create_pipeline(
            &device,
            "Lab Sprite Pipeline",
            &sprite_layout,
            &sprite_shader,
            "vs_main",
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SpriteVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &sprite_attributes,
            },
            false,
            wgpu::DepthBiasState::default(),
        );

        let (color_texture, color_view, depth_view) = create_targets(&device, width, height);

        Self {
            device,
            queue,
            mesh_pipeline,
            line_pipeline,
            sprite_pipeline,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            sampler,
            color_texture,
            color_view,
            depth_view,
            textures: HashMap::new(),
        }
    }

    /// Upload `texture` unless it is already cached.
    fn ensure_texture(&mut self, id: TextureId, texture: &Texture) {
        if self.textures.contains_key(&id) {
            return;
        }
        let size = wgpu::Extent3d {
            width: texture.width().max(1),
            height: texture.height().max(1),
            depth_or_array_layers: 1,
        };
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("label_texture_{}", id.0)),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if texture.width() > 0 && texture.height() > 0 {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &gpu_texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &texture.image,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * texture.width()),
                    rows_per_image: Some(texture.height()),
                },
                size,
            );
        }
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Label Texture Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.textures.insert(
            id,
            CachedTexture {
                _texture: gpu_texture,
                bind_group,
            },
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    vertex_entry: &str,
    buffer: wgpu::VertexBufferLayout<'_>,
    depth_write: bool,
    bias: wgpu::DepthBiasState,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vertex_entry),
            buffers: &[buffer],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias,
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_targets(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView, wgpu::TextureView) {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Lab Color Target"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Lab Depth Target"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    (color, color_view, depth_view)
}

/// Round `value` up to WebGPU's copy row alignment.
fn align_bytes_per_row(value: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    value.div_ceil(align) * align
}

// ============================================================================
// RENDERING
// ============================================================================

impl RenderBackend for GpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.has_frame = false;
        if let Some(state) = self.state.as_mut() {
            let (color, color_view, depth_view) = create_targets(&state.device, self.width, self.height);
            state.color_texture = color;
            state.color_view = color_view;
            state.depth_view = depth_view;
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, list: &DrawList, resources: &ResourcePool) -> Result<(), RenderError> {
        let (width, height) = (self.width, self.height);
        let state = self.state.as_mut().ok_or(RenderError::Disposed)?;

        let uniforms = LabUniforms {
            view_proj: list.view_proj.to_cols_array_2d(),
            light_dir: list.lighting.direction.extend(0.0).to_array(),
            directional: list.lighting.directional.to_array(),
            ambient: list.lighting.ambient.to_array(),
            viewport: [width as f32, height as f32, 0.0, 0.0],
        };
        state.queue.write_buffer(&state.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut line_vertices = Vec::with_capacity(list.lines.len() * 6);
        for line in &list.lines {
            line_vertices.extend_from_slice(&line_quad(line.a, line.b, line.color.to_array(), line.width));
        }

        let mut sprite_vertices = Vec::with_capacity(list.sprites.len() * 6);
        let mut sprite_draws = Vec::with_capacity(list.sprites.len());
        for sprite in &list.sprites {
            let Some(texture) = resources.texture(sprite.texture) else {
                continue;
            };
            state.ensure_texture(sprite.texture, texture);
            let [bl, br, tr, tl] = sprite.corners(list.camera_right, list.camera_up);
            let v = |p: Vec3, uv: [f32; 2]| SpriteVertex {
                position: p.to_array(),
                uv,
                opacity: sprite.opacity,
            };
            let start = sprite_vertices.len() as u32;
            sprite_vertices.extend_from_slice(&[
                v(bl, [0.0, 1.0]),
                v(br, [1.0, 1.0]),
                v(tr, [1.0, 0.0]),
                v(bl, [0.0, 1.0]),
                v(tr, [1.0, 0.0]),
                v(tl, [0.0, 0.0]),
            ]);
            sprite_draws.push((sprite.texture, start..start + 6));
        }

        let buffer = |label: &str, contents: &[u8]| {
            (!contents.is_empty()).then(|| {
                state.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage: wgpu::BufferUsages::VERTEX,
                })
            })
        };
        let mesh_buffer = buffer("Lab Mesh Vertices", bytemuck::cast_slice(&list.triangles));
        let line_buffer = buffer("Lab Line Vertices", bytemuck::cast_slice(&line_vertices));
        let sprite_buffer = buffer("Lab Sprite Vertices", bytemuck::cast_slice(&sprite_vertices));

        let mut encoder = state.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Lab Frame Encoder"),
        });
        {
            let bg = list.background;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Lab Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &state.color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg.r as f64,
                            g: bg.g as f64,
                            b: bg.b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &state.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &state.uniform_bind_group, &[]);

            if let Some(mesh) = &mesh_buffer {
                pass.set_pipeline(&state.mesh_pipeline);
                pass.set_vertex_buffer(0, mesh.slice(..));
                pass.draw(0..list.triangles.len() as u32, 0..1);
            }
            if let Some(lines) = &line_buffer {
                pass.set_pipeline(&state.line_pipeline);
                pass.set_vertex_buffer(0, lines.slice(..));
                pass.draw(0..line_vertices.len() as u32, 0..1);
            }
            if let Some(sprites) = &sprite_buffer {
                pass.set_pipeline(&state.sprite_pipeline);
                pass.set_vertex_buffer(0, sprites.slice(..));
                for (texture, range) in sprite_draws {
                    if let Some(cached) = state.textures.get(&texture) {
                        pass.set_bind_group(1, &cached.bind_group, &[]);
                        pass.draw(range, 0..1);
                    }
                }
            }
        }
        state.queue.submit(std::iter::once(encoder.finish()));
        self.has_frame = true;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RgbaImage, RenderError> {
        let state = self.state.as_ref().ok_or(RenderError::Disposed)?;
        if !self.has_frame {
            return Err(RenderError::NoFrame);
        }
        let (width, height) = (self.width, self.height);
        let row_bytes = width * 4;
        let padded_row = align_bytes_per_row(row_bytes);

        let staging = state.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lab Readback Buffer"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = state.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Lab Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &state.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        state.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let started = Instant::now();
        let mapped = loop {
            let _ = state.device.poll(wgpu::PollType::Poll);
            match rx.try_recv() {
                Ok(result) => break result,
                Err(std::sync::mpsc::TryRecvError::Empty) if started.elapsed() < READBACK_TIMEOUT => {
                    std::thread::yield_now();
                }
                Err(std::sync::mpsc::TryRecvError::Empty) => {
                    return Err(RenderError::Readback("timed out waiting for buffer map".to_string()));
                }
                Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                    return Err(RenderError::Readback("map callback dropped".to_string()));
                }
            }
        };
        mapped.map_err(|e| RenderError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in 0..height as usize {
                let start = row * padded_row as usize;
                pixels.extend_from_slice(&data[start..start + row_bytes as usize]);
            }
        }
        staging.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("frame size mismatch".to_string()))
    }

    fn release(&mut self, handle: ResourceHandle) {
        if let (Some(state), ResourceHandle::Texture(id)) = (self.state.as_mut(), handle) {
            if state.textures.remove(&id).is_some() {
                tracing::debug!("Evicted GPU texture {}", id.0);
            }
        }
    }

    fn dispose(&mut self) {
        if let Some(state) = self.state.take() {
            tracing::debug!("Disposing wgpu backend ({} cached textures)", state.textures.len());
        }
        self.has_frame = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_alignment() {
        assert_eq!(align_bytes_per_row(4), 256);
        assert_eq!(align_bytes_per_row(256), 256);
        assert_eq!(align_bytes_per_row(1024 + 4), 1280);
    }

    #[test]
    fn test_line_quad_sides() {
        let quad = line_quad(Vec3::ZERO, Vec3::X, [1.0; 4], 0.5);
        assert!(quad.iter().all(|v| v.side_width[1] == 1.0));
        // a0 and b1 lie on the same edge of the quad as a1 and b0 respectively
        assert_eq!(quad.iter().filter(|v| v.side_width[0] > 0.0).count(), 2);
        assert_eq!(quad[0].position, [0.0; 3]);
        assert_eq!(quad[2].position, [1.0, 0.0, 0.0]);
    }
}
