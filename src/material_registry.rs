use crate::materializer::MaterialOverride;
use crate::mesh::{ImportedMaterial, ImportedTexture};
use anyhow::{anyhow, Result};
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MaterialUniform {
    base_color_factor: [f32; 4],
    params: [f32; 4],        // metallic, roughness, normal_scale, clearcoat
    texture_flags: [f32; 4], // base_color, roughness, normal, padding
}

/// Render-facing material state, mutated in place by overrides. Every scene
/// node referencing the same name observes a change simultaneously.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDefinition {
    pub name: String,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub normal_scale: f32,
    pub clearcoat_factor: f32,
    pub base_color_texture: Option<String>,
    pub roughness_texture: Option<String>,
    pub normal_texture: Option<String>,
}

pub struct MaterialRegistry {
    materials: HashMap<String, MaterialEntry>,
    textures: HashMap<String, TextureEntry>,
    default_material: String,
    default_textures: Option<DefaultTextures>,
    sampler: Option<Arc<wgpu::Sampler>>,
}

struct MaterialEntry {
    definition: MaterialDefinition,
    gpu: Option<Arc<MaterialGpu>>,
}

struct TextureEntry {
    width: u32,
    height: u32,
    data: Vec<u8>,
    gpu_srgb: Option<Arc<GpuTexture>>,
    gpu_linear: Option<Arc<GpuTexture>>,
}

struct DefaultTextures {
    base_color: Arc<GpuTexture>,
    roughness: Arc<GpuTexture>,
    normal: Arc<GpuTexture>,
}

pub struct MaterialGpu {
    bind_group: wgpu::BindGroup,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        let default_material = "material::default".to_string();
        let mut registry = Self {
            materials: HashMap::new(),
            textures: HashMap::new(),
            default_material: default_material.clone(),
            default_textures: None,
            sampler: None,
        };
        registry.materials.insert(
            default_material.clone(),
            MaterialEntry {
                definition: MaterialDefinition {
                    name: default_material,
                    base_color_factor: [1.0, 1.0, 1.0, 1.0],
                    metallic_factor: 0.0,
                    roughness_factor: 1.0,
                    normal_scale: 1.0,
                    clearcoat_factor: 0.0,
                    base_color_texture: None,
                    roughness_texture: None,
                    normal_texture: None,
                },
                gpu: None,
            },
        );
        registry
    }

    pub fn default_key(&self) -> &str {
        &self.default_material
    }

    pub fn has(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.materials.keys().map(|k| k.as_str())
    }

    pub fn definition(&self, name: &str) -> Option<&MaterialDefinition> {
        self.materials.get(name).map(|entry| &entry.definition)
    }

    /// Registers an imported table, replacing rows that share a name. GPU
    /// state is rebuilt lazily on the next draw.
    pub fn register_import(&mut self, materials: &[ImportedMaterial], textures: &[ImportedTexture]) {
        for texture in textures {
            self.textures
                .entry(texture.key.clone())
                .and_modify(|entry| {
                    entry.width = texture.width;
                    entry.height = texture.height;
                    entry.data = texture.data.clone();
                    entry.gpu_srgb = None;
                    entry.gpu_linear = None;
                })
                .or_insert_with(|| TextureEntry {
                    width: texture.width,
                    height: texture.height,
                    data: texture.data.clone(),
                    gpu_srgb: None,
                    gpu_linear: None,
                });
        }
        for material in materials {
            let definition = MaterialDefinition {
                name: material.name.clone(),
                base_color_factor: material.base_color_factor,
                metallic_factor: material.metallic_factor,
                roughness_factor: material.roughness_factor,
                normal_scale: material
                    .normal_texture
                    .as_ref()
                    .map(|binding| binding.scale)
                    .unwrap_or(1.0),
                clearcoat_factor: 0.0,
                base_color_texture: material
                    .base_color_texture
                    .as_ref()
                    .map(|binding| binding.texture_key.clone()),
                roughness_texture: material
                    .roughness_texture
                    .as_ref()
                    .map(|binding| binding.texture_key.clone()),
                normal_texture: material
                    .normal_texture
                    .as_ref()
                    .map(|binding| binding.texture_key.clone()),
            };
            self.materials
                .insert(material.name.clone(), MaterialEntry { definition, gpu: None });
        }
    }

    /// Applies a named override in place. Returns false when the name is not
    /// registered; the caller decides whether that is worth a log line.
    pub fn apply_override(&mut self, name: &str, patch: &MaterialOverride) -> bool {
        let Some(entry) = self.materials.get_mut(name) else {
            return false;
        };
        if let Some(color) = patch.parsed_color() {
            entry.definition.base_color_factor = color;
        }
        if let Some(roughness) = patch.roughness {
            entry.definition.roughness_factor = roughness.clamp(0.0, 1.0);
        }
        if patch.clear_roughness_map {
            entry.definition.roughness_texture = None;
        }
        if let Some(scale) = patch.normal_scale {
            entry.definition.normal_scale = scale;
        }
        if let Some(clearcoat) = patch.clearcoat {
            entry.definition.clearcoat_factor = clearcoat.clamp(0.0, 1.0);
        }
        entry.gpu = None;
        true
    }

    /// Lazily builds the bind group for a material, falling back to flat
    /// defaults for any missing texture slot.
    pub fn prepare_gpu(
        &mut self,
        name: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Arc<MaterialGpu>> {
        let definition = {
            let entry = self
                .materials
                .get(name)
                .ok_or_else(|| anyhow!("Material '{name}' not registered"))?;
            if let Some(gpu) = &entry.gpu {
                return Ok(gpu.clone());
            }
            entry.definition.clone()
        };

        let sampler = self.ensure_sampler(device);
        self.ensure_default_textures(device, queue);
        let defaults = self.default_textures.as_ref().expect("default textures initialized");
        let (default_base, default_rough, default_normal) =
            (defaults.base_color.clone(), defaults.roughness.clone(), defaults.normal.clone());

        let base_color = match definition.base_color_texture.as_deref() {
            Some(key) => self.ensure_texture_gpu(key, true, device, queue)?,
            None => default_base,
        };
        let roughness = match definition.roughness_texture.as_deref() {
            Some(key) => self.ensure_texture_gpu(key, false, device, queue)?,
            None => default_rough,
        };
        let normal = match definition.normal_texture.as_deref() {
            Some(key) => self.ensure_texture_gpu(key, false, device, queue)?,
            None => default_normal,
        };

        let uniform = MaterialUniform {
            base_color_factor: definition.base_color_factor,
            params: [
                definition.metallic_factor,
                definition.roughness_factor,
                definition.normal_scale,
                definition.clearcoat_factor,
            ],
            texture_flags: [
                definition.base_color_texture.is_some() as u32 as f32,
                definition.roughness_texture.is_some() as u32 as f32,
                definition.normal_texture.is_some() as u32 as f32,
                0.0,
            ],
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&base_color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&roughness.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(sampler.as_ref()),
                },
            ],
        });

        let gpu = Arc::new(MaterialGpu { bind_group });
        if let Some(entry) = self.materials.get_mut(name) {
            entry.gpu = Some(gpu.clone());
        }
        Ok(gpu)
    }

    fn ensure_sampler(&mut self, device: &wgpu::Device) -> Arc<wgpu::Sampler> {
        if let Some(sampler) = &self.sampler {
            return sampler.clone();
        }
        let sampler = Arc::new(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        }));
        self.sampler = Some(sampler.clone());
        sampler
    }

    fn ensure_default_textures(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.default_textures.is_some() {
            return;
        }
        let base_color =
            Arc::new(upload_pixel(device, queue, [255, 255, 255, 255], wgpu::TextureFormat::Rgba8UnormSrgb));
        let roughness =
            Arc::new(upload_pixel(device, queue, [255, 255, 255, 255], wgpu::TextureFormat::Rgba8Unorm));
        let normal =
            Arc::new(upload_pixel(device, queue, [128, 128, 255, 255], wgpu::TextureFormat::Rgba8Unorm));
        self.default_textures = Some(DefaultTextures { base_color, roughness, normal });
    }

    fn ensure_texture_gpu(
        &mut self,
        key: &str,
        srgb: bool,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Arc<GpuTexture>> {
        let entry = self
            .textures
            .get_mut(key)
            .ok_or_else(|| anyhow!("Texture '{key}' not registered for materials"))?;
        let cache = if srgb { &mut entry.gpu_srgb } else { &mut entry.gpu_linear };
        if let Some(texture) = cache {
            return Ok(texture.clone());
        }
        let format = if srgb { wgpu::TextureFormat::Rgba8UnormSrgb } else { wgpu::TextureFormat::Rgba8Unorm };
        let texture =
            Arc::new(upload_rgba(device, queue, entry.width, entry.height, &entry.data, format)?);
        *cache = Some(texture.clone());
        Ok(texture)
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialGpu {
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

fn upload_pixel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pixel: [u8; 4],
    format: wgpu::TextureFormat,
) -> GpuTexture {
    upload_rgba(device, queue, 1, 1, &pixel, format).expect("1x1 upload cannot fail")
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    data: &[u8],
    format: wgpu::TextureFormat,
) -> Result<GpuTexture> {
    if data.len() < (width as usize) * (height as usize) * 4 {
        return Err(anyhow!("Texture data shorter than {width}x{height} RGBA"));
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Material Texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let (pixel_data, padded_row_bytes) = pad_rows(data, width, height);
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixel_data.as_ref(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(padded_row_bytes),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(GpuTexture { _texture: texture, view })
}

fn pad_rows(data: &[u8], width: u32, height: u32) -> (std::borrow::Cow<'_, [u8]>, u32) {
    let row_bytes = width.saturating_mul(4);
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let remainder = row_bytes % align;
    let padded_row_bytes = if remainder == 0 { row_bytes } else { row_bytes + align - remainder };
    if padded_row_bytes == row_bytes {
        return (std::borrow::Cow::Borrowed(data), row_bytes);
    }
    let mut padded = vec![0u8; (padded_row_bytes as usize) * (height as usize)];
    for row in 0..height as usize {
        let src_start = row * row_bytes as usize;
        let dst_start = row * padded_row_bytes as usize;
        padded[dst_start..dst_start + row_bytes as usize]
            .copy_from_slice(&data[src_start..src_start + row_bytes as usize]);
    }
    (std::borrow::Cow::Owned(padded), padded_row_bytes)
}

/// Bind group layout shared by every material; owned here so the registry and
/// the mesh pass agree on slot order.
pub fn material_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Material BGL"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture_entry(1),
            texture_entry(2),
            texture_entry(3),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TextureBinding;

    fn tail_material() -> ImportedMaterial {
        ImportedMaterial {
            name: "M_Robot_Tail".to_string(),
            base_color_factor: [0.8, 0.3, 0.1, 1.0],
            metallic_factor: 0.2,
            roughness_factor: 0.9,
            base_color_texture: None,
            roughness_texture: Some(TextureBinding {
                texture_key: "tex::rough".to_string(),
                srgb: false,
                scale: 1.0,
            }),
            normal_texture: Some(TextureBinding {
                texture_key: "tex::normal".to_string(),
                srgb: false,
                scale: 1.0,
            }),
        }
    }

    #[test]
    fn register_keys_by_material_name() {
        let mut registry = MaterialRegistry::new();
        registry.register_import(&[tail_material()], &[]);
        assert!(registry.has("M_Robot_Tail"));
        let definition = registry.definition("M_Robot_Tail").expect("registered");
        assert!((definition.roughness_factor - 0.9).abs() < f32::EPSILON);
        assert!(definition.roughness_texture.is_some());
    }

    #[test]
    fn override_patches_in_place_and_clears_roughness_map() {
        let mut registry = MaterialRegistry::new();
        registry.register_import(&[tail_material()], &[]);
        let patch = MaterialOverride {
            material: "M_Robot_Tail".to_string(),
            color: Some("#222".to_string()),
            roughness: Some(0.6),
            clear_roughness_map: true,
            normal_scale: Some(4.0),
            clearcoat: None,
        };
        assert!(registry.apply_override("M_Robot_Tail", &patch));
        let definition = registry.definition("M_Robot_Tail").expect("registered");
        assert!((definition.roughness_factor - 0.6).abs() < f32::EPSILON);
        assert!(definition.roughness_texture.is_none());
        assert!((definition.normal_scale - 4.0).abs() < f32::EPSILON);
        // Normal map binding itself survives; only its strength changed.
        assert!(definition.normal_texture.is_some());
    }

    #[test]
    fn override_on_unknown_name_reports_miss() {
        let mut registry = MaterialRegistry::new();
        let patch = MaterialOverride {
            material: "M_Missing".to_string(),
            color: None,
            roughness: Some(0.1),
            clear_roughness_map: false,
            normal_scale: None,
            clearcoat: None,
        };
        assert!(!registry.apply_override("M_Missing", &patch));
    }
}
