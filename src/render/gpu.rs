use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use bytemuck::bytes_of;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::{RenderTarget, SceneRenderer, WaterUniformBlock};
use crate::color::Color;
use crate::overlay::OverlayFrame;
use crate::scene::{MeshData, PlaneVertex, Side, WaterScene};
use crate::uniforms::UniformStore;
use crate::viewport::physical_extent;

/// wgpu renderer that draws the water plane into a window surface.
pub struct GpuRenderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    logical_size: (u32, u32),
    pixel_ratio: f64,
    depth: DepthBuffer,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    plane: MeshBuffers,
    clear_color: wgpu::Color,
    ui_renderer: egui_wgpu::Renderer,
    overlay: Option<OverlayFrame>,
}

impl GpuRenderer {
    /// Creates the device, the pipeline and the plane buffers, then sizes the
    /// surface from the scene's render settings.
    pub async fn new(window: Arc<Window>, scene: &WaterScene) -> Result<Self> {
        let settings = scene.render;
        let (width, height) = surface_extent(
            (settings.width, settings.height),
            settings.pixel_ratio,
            native_size(&window),
        );

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: backends(),
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        log::info!("using adapter {}", adapter.get_info().name);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("water-device"),
            required_features: wgpu::Features::empty(),
            required_limits: required_limits(&adapter),
            ..Default::default()
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Colors are decoded straight from hex, so write them without sRGB encoding.
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let material = &scene.water.material;
        let vertex_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("water-vertex"),
            source: wgpu::ShaderSource::Wgsl(material.vertex_shader.into()),
        });
        let fragment_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("water-fragment"),
            source: wgpu::ShaderSource::Wgsl(material.fragment_shader.into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("water-uniform-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<WaterUniformBlock>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("water-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("water-uniforms"),
            size: std::mem::size_of::<WaterUniformBlock>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("water-uniform-bind-group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("water-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<PlaneVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: (3 * std::mem::size_of::<f32>()) as u64,
                            shader_location: 1,
                        },
                    ],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: cull_mode(material.side),
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let ui_renderer = egui_wgpu::Renderer::new(
            &device,
            surface_format,
            egui_wgpu::RendererOptions {
                depth_stencil_format: Some(DepthBuffer::FORMAT),
                ..Default::default()
            },
        );

        let plane = MeshBuffers::from_mesh(&device, &scene.water.geometry.build(), "water-plane");
        log::debug!(
            "uploaded water plane: {} indices, surface {}x{} {:?}",
            plane.index_count,
            config.width,
            config.height,
            surface_format
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            logical_size: (settings.width, settings.height),
            pixel_ratio: settings.pixel_ratio,
            depth,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            plane,
            clear_color: clear_color(settings.clear_color),
            ui_renderer,
            overlay: None,
        })
    }

    /// Paints `frame` over the water on the next render.
    pub fn set_overlay(&mut self, frame: OverlayFrame) {
        self.overlay = Some(frame);
    }

    fn reconfigure(&mut self) {
        let physical = surface_extent(self.logical_size, self.pixel_ratio, native_size(&self.window));
        if physical == (self.config.width, self.config.height) {
            return;
        }
        self.config.width = physical.0;
        self.config.height = physical.1;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, physical.0, physical.1);
    }
}

impl RenderTarget for GpuRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.logical_size = (width, height);
        self.reconfigure();
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
        self.reconfigure();
    }
}

impl SceneRenderer for GpuRenderer {
    fn render(&mut self, scene: &WaterScene, uniforms: &UniformStore) -> Result<()> {
        let block = WaterUniformBlock::from_scene(scene, uniforms)?;
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytes_of(&block));

        // Texture deltas are applied even when this frame gets skipped below.
        let overlay = self.overlay.take();
        if let Some(overlay) = &overlay {
            for (id, delta) in &overlay.textures_delta.set {
                self.ui_renderer
                    .update_texture(&self.device, &self.queue, *id, delta);
            }
            for id in &overlay.textures_delta.free {
                self.ui_renderer.free_texture(id);
            }
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timed out; skipping frame");
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => bail!("GPU is out of memory"),
            Err(err) => return Err(err).context("failed to acquire surface texture"),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("water-encoder"),
            });

        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.config.width as f32 / self.logical_size.0.max(1) as f32,
        };
        let paint_jobs = overlay.map(|overlay| overlay.paint_jobs).unwrap_or_default();
        let ui_commands = self.ui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen,
        );

        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("water-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime();

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_vertex_buffer(0, self.plane.vertex.slice(..));
        pass.set_index_buffer(self.plane.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.plane.index_count, 0, 0..1);
        self.ui_renderer.render(&mut pass, &paint_jobs, &screen);

        drop(pass);
        self.queue
            .submit(ui_commands.into_iter().chain(std::iter::once(encoder.finish())));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

fn native_size(window: &Window) -> Option<PhysicalSize<u32>> {
    if cfg!(target_arch = "wasm32") {
        None
    } else {
        Some(window.inner_size())
    }
}

/// Swapchain extent. A native swapchain must match the window, so the density
/// cap only shapes the browser canvas backing store.
fn surface_extent(
    logical: (u32, u32),
    pixel_ratio: f64,
    native: Option<PhysicalSize<u32>>,
) -> (u32, u32) {
    match native {
        Some(size) => (size.width.max(1), size.height.max(1)),
        None => (
            physical_extent(logical.0, pixel_ratio),
            physical_extent(logical.1, pixel_ratio),
        ),
    }
}

fn backends() -> wgpu::Backends {
    if cfg!(target_arch = "wasm32") {
        wgpu::Backends::GL
    } else {
        wgpu::Backends::PRIMARY
    }
}

fn required_limits(adapter: &wgpu::Adapter) -> wgpu::Limits {
    if cfg!(target_arch = "wasm32") {
        wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
    } else {
        wgpu::Limits::default()
    }
}

fn cull_mode(side: Side) -> Option<wgpu::Face> {
    match side {
        Side::Front => Some(wgpu::Face::Back),
        Side::Back => Some(wgpu::Face::Front),
        Side::Double => None,
    }
}

fn clear_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: color.r as f64,
        g: color.g as f64,
        b: color.b as f64,
        a: 1.0,
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_sided_material_disables_culling() {
        assert_eq!(cull_mode(Side::Double), None);
        assert_eq!(cull_mode(Side::Front), Some(wgpu::Face::Back));
    }

    #[test]
    fn native_surface_follows_the_window() {
        let window = PhysicalSize::new(3840, 2160);
        assert_eq!(surface_extent((1280, 720), 2.0, Some(window)), (3840, 2160));
        assert_eq!(surface_extent((1280, 720), 2.0, None), (2560, 1440));
        assert_eq!(
            surface_extent((0, 0), 1.0, Some(PhysicalSize::new(0, 0))),
            (1, 1)
        );
    }

    #[test]
    fn clear_color_is_opaque() {
        let color = clear_color(crate::scene::BACKGROUND_COLOR);
        assert_eq!(color.a, 1.0);
        assert!((color.r - 209.0 / 255.0).abs() < 1e-6);
    }
}
