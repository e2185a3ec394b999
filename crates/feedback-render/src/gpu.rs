use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use wgpu::{
    Adapter, Device, Extent3d, Instance, Queue, Texture, TextureDescriptor, TextureFormat,
    TextureUsages,
};

#[derive(Hash, Eq, PartialEq, Clone, Copy)]
struct PoolKey {
    width: u32,
    height: u32,
    format: TextureFormat,
    usage: TextureUsages,
}

/// Released render targets kept for reuse, keyed by size, format and usage.
pub struct TexturePool {
    free: Mutex<HashMap<PoolKey, Vec<Texture>>>,
}

impl Default for TexturePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TexturePool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PoolKey, Vec<Texture>>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a pooled texture matching the request, or create one.
    /// The returned flag is true when the texture was reused.
    pub fn acquire(
        &self,
        device: &Device,
        label: Option<&str>,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsages,
    ) -> (Texture, bool) {
        let key = PoolKey {
            width,
            height,
            format,
            usage,
        };
        if let Some(texture) = self.lock().get_mut(&key).and_then(Vec::pop) {
            return (texture, true);
        }

        let texture = device.create_texture(&TextureDescriptor {
            label,
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        (texture, false)
    }

    pub fn release(&self, texture: Texture) {
        let key = PoolKey {
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            usage: texture.usage(),
        };
        self.lock().entry(key).or_default().push(texture);
    }

    /// Number of textures waiting for reuse.
    pub fn pooled(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Destroy every pooled texture. Returns how many were freed.
    pub fn purge(&self) -> usize {
        let drained: Vec<Texture> = self.lock().drain().flat_map(|(_, v)| v).collect();
        let count = drained.len();
        for texture in drained {
            texture.destroy();
        }
        count
    }
}

/// A headless wgpu device shared by every GPU operation.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
    pub texture_pool: TexturePool,
}

impl GpuContext {
    /// Initializes wgpu on the best available backend (Metal, Vulkan, DX12, etc.)
    pub fn init() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow::anyhow!("Failed to find suitable wgpu adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Feedback Headless GPU Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        ))?;

        let info = adapter.get_info();
        tracing::info!("wgpu adapter: {} ({:?})", info.name, info.backend);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            texture_pool: TexturePool::new(),
        })
    }
}
