use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat4, Vec2, Vec3, Vec4};
use gltf::mesh::Mode;
use std::collections::HashMap;
use std::path::Path;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, tangent: Vec4, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            tangent: tangent.to_array(),
            uv: uv.to_array(),
        }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 40,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub bounds: MeshBounds,
}

#[derive(Clone, Copy, Debug)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

/// One named mesh-bearing node of the imported hierarchy, flattened into
/// world space. Shadow flags default off; the materializer forces them on.
#[derive(Clone, Debug)]
pub struct MeshNode {
    pub name: String,
    pub mesh: Mesh,
    pub transform: Mat4,
    pub material: Option<String>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Clone, Debug)]
pub struct ImportedTexture {
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct TextureBinding {
    pub texture_key: String,
    pub srgb: bool,
    pub scale: f32,
}

/// Material row keyed by its stable glTF name. Node-to-material references go
/// through that name, never through ownership.
#[derive(Clone, Debug)]
pub struct ImportedMaterial {
    pub name: String,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub base_color_texture: Option<TextureBinding>,
    pub roughness_texture: Option<TextureBinding>,
    pub normal_texture: Option<TextureBinding>,
}

#[derive(Clone, Debug)]
pub struct AssetImport {
    pub nodes: Vec<MeshNode>,
    pub materials: Vec<ImportedMaterial>,
    pub textures: Vec<ImportedTexture>,
}

impl AssetImport {
    /// Combined node bounds in asset space, for the scene anchor.
    pub fn bounds(&self) -> MeshBounds {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;
        for node in &self.nodes {
            for vertex in &node.mesh.vertices {
                let pos = node.transform.transform_point3(Vec3::from_array(vertex.position));
                min = min.min(pos);
                max = max.max(pos);
                any = true;
            }
        }
        if !any {
            return MeshBounds { min: Vec3::ZERO, max: Vec3::ZERO, center: Vec3::ZERO, radius: 0.0 };
        }
        let center = (min + max) * 0.5;
        MeshBounds { min, max, center, radius: (max - center).length() }
    }
}

impl Mesh {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounds = MeshBounds::from_vertices(&vertices);
        Self { vertices, indices, bounds }
    }

    /// Flat XZ quad used for the shadow-receiving ground.
    pub fn plane(size: f32) -> Self {
        let hs = size * 0.5;
        let normal = Vec3::Y;
        let tangent = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let vertices = vec![
            MeshVertex::new(Vec3::new(-hs, 0.0, -hs), normal, tangent, Vec2::new(0.0, 0.0)),
            MeshVertex::new(Vec3::new(hs, 0.0, -hs), normal, tangent, Vec2::new(1.0, 0.0)),
            MeshVertex::new(Vec3::new(hs, 0.0, hs), normal, tangent, Vec2::new(1.0, 1.0)),
            MeshVertex::new(Vec3::new(-hs, 0.0, hs), normal, tangent, Vec2::new(0.0, 1.0)),
        ];
        let indices = vec![0, 2, 1, 0, 3, 2];
        Self::new(vertices, indices)
    }
}

/// Imports a glTF file as named mesh nodes plus a name-keyed material table.
/// Node transforms are flattened against their parents so downstream code
/// never walks the hierarchy again.
pub fn load_asset(path: impl AsRef<Path>) -> Result<AssetImport> {
    let path_ref = path.as_ref();
    let (document, buffers, images) = gltf::import(path_ref)
        .with_context(|| format!("Failed to import glTF from {}", path_ref.display()))?;

    let mut textures = Vec::new();
    let mut texture_key_map: HashMap<usize, String> = HashMap::new();
    for texture in document.textures() {
        let source = texture.source();
        let image_data = images
            .get(source.index())
            .ok_or_else(|| anyhow!("Image index {} missing in {}", source.index(), path_ref.display()))?;
        let key = format!("{}::tex{}", path_ref.display(), texture.index());
        textures.push(ImportedTexture {
            key: key.clone(),
            width: image_data.width,
            height: image_data.height,
            data: convert_image_to_rgba(image_data)?,
        });
        texture_key_map.insert(texture.index(), key);
    }

    let mut materials = Vec::new();
    let mut material_name_map: HashMap<usize, String> = HashMap::new();
    for (fallback_index, material) in document.materials().enumerate() {
        let name = material
            .name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("material_{fallback_index}"));
        if let Some(index) = material.index() {
            material_name_map.insert(index, name.clone());
        }
        let pbr = material.pbr_metallic_roughness();
        let base_color_texture = pbr.base_color_texture().and_then(|info| {
            texture_key_map.get(&info.texture().index()).map(|key| TextureBinding {
                texture_key: key.clone(),
                srgb: true,
                scale: 1.0,
            })
        });
        let roughness_texture = pbr.metallic_roughness_texture().and_then(|info| {
            texture_key_map.get(&info.texture().index()).map(|key| TextureBinding {
                texture_key: key.clone(),
                srgb: false,
                scale: 1.0,
            })
        });
        let normal_texture = material.normal_texture().and_then(|info| {
            texture_key_map.get(&info.texture().index()).map(|key| TextureBinding {
                texture_key: key.clone(),
                srgb: false,
                scale: info.scale(),
            })
        });
        materials.push(ImportedMaterial {
            name,
            base_color_factor: pbr.base_color_factor(),
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
            base_color_texture,
            roughness_texture,
            normal_texture,
        });
    }

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("No scene in {}", path_ref.display()))?;

    let mut nodes = Vec::new();
    for root in scene.nodes() {
        collect_mesh_nodes(&root, Mat4::IDENTITY, &buffers, &material_name_map, &mut nodes)?;
    }
    if nodes.is_empty() {
        bail!("No triangle meshes found in {}", path_ref.display());
    }

    Ok(AssetImport { nodes, materials, textures })
}

fn collect_mesh_nodes(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    material_names: &HashMap<usize, String>,
    out: &mut Vec<MeshNode>,
) -> Result<()> {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        let base_name = node
            .name()
            .or_else(|| mesh.name())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let primitive_count = mesh.primitives().count();
        for (primitive_index, primitive) in mesh.primitives().enumerate() {
            if primitive.mode() != Mode::Triangles {
                continue;
            }
            let name = if primitive_count > 1 {
                format!("{base_name}::{primitive_index}")
            } else {
                base_name.clone()
            };
            let material = primitive
                .material()
                .index()
                .and_then(|index| material_names.get(&index).cloned());
            let mesh = read_primitive(&primitive, buffers)
                .with_context(|| format!("Reading primitive for node '{name}'"))?;
            out.push(MeshNode {
                name,
                mesh,
                transform,
                material,
                cast_shadow: false,
                receive_shadow: false,
            });
        }
    }
    for child in node.children() {
        collect_mesh_nodes(&child, transform, buffers, material_names, out)?;
    }
    Ok(())
}

fn read_primitive(primitive: &gltf::Primitive<'_>, buffers: &[gltf::buffer::Data]) -> Result<Mesh> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
    let positions: Vec<Vec3> = reader
        .read_positions()
        .ok_or_else(|| anyhow!("POSITION attribute missing"))?
        .map(Vec3::from_array)
        .collect();
    if positions.is_empty() {
        bail!("Primitive has no vertices");
    }

    let indices: Vec<u32> = reader
        .read_indices()
        .map(|read| read.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    let mut normals: Vec<Vec3> = reader
        .read_normals()
        .map(|it| it.map(Vec3::from_array).collect())
        .unwrap_or_default();
    if normals.len() != positions.len() || normals.iter().all(|n| n.length_squared() == 0.0) {
        normals = compute_normals(&positions, &indices);
    }

    let mut uvs: Vec<Vec2> = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().map(Vec2::from_array).collect())
        .unwrap_or_default();
    if uvs.len() != positions.len() {
        uvs.resize(positions.len(), Vec2::ZERO);
    }

    let tangents: Vec<Vec4> = reader
        .read_tangents()
        .map(|it| it.map(Vec4::from_array).collect())
        .unwrap_or_default();

    let mut vertices: Vec<MeshVertex> = positions
        .iter()
        .enumerate()
        .map(|(i, pos)| {
            let normal = normals.get(i).copied().unwrap_or(Vec3::Y).normalize_or_zero();
            let tangent = tangents.get(i).copied().unwrap_or(Vec4::ZERO);
            MeshVertex::new(*pos, normal, tangent, uvs[i])
        })
        .collect();
    if tangents.len() != positions.len() {
        compute_tangents(&mut vertices, &indices);
    }

    Ok(Mesh::new(vertices, indices))
}

fn convert_image_to_rgba(image: &gltf::image::Data) -> Result<Vec<u8>> {
    match image.format {
        gltf::image::Format::R8 => {
            let mut out = Vec::with_capacity(image.pixels.len() * 4);
            for &value in &image.pixels {
                out.extend_from_slice(&[value, value, value, 255]);
            }
            Ok(out)
        }
        gltf::image::Format::R8G8 => {
            let mut out = Vec::with_capacity(image.pixels.len() / 2 * 4);
            for chunk in image.pixels.chunks_exact(2) {
                out.extend_from_slice(&[chunk[0], chunk[1], 0, 255]);
            }
            Ok(out)
        }
        gltf::image::Format::R8G8B8 => {
            let mut out = Vec::with_capacity(image.pixels.len() / 3 * 4);
            for chunk in image.pixels.chunks_exact(3) {
                out.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }
            Ok(out)
        }
        gltf::image::Format::R8G8B8A8 => Ok(image.pixels.clone()),
        other => bail!("Unsupported image format {:?}", other),
    }
}

fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let face = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        if face.length_squared() > 0.0 {
            normals[i0] += face;
            normals[i1] += face;
            normals[i2] += face;
        }
    }
    for normal in &mut normals {
        *normal = if normal.length_squared() > 0.0 { normal.normalize() } else { Vec3::Y };
    }
    normals
}

fn compute_tangents(vertices: &mut [MeshVertex], indices: &[u32]) {
    if vertices.is_empty() || indices.is_empty() {
        return;
    }
    let mut tan_u = vec![Vec3::ZERO; vertices.len()];
    let mut tan_v = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let p0 = Vec3::from_array(vertices[i0].position);
        let p1 = Vec3::from_array(vertices[i1].position);
        let p2 = Vec3::from_array(vertices[i2].position);
        let uv0 = Vec2::from_array(vertices[i0].uv);
        let uv1 = Vec2::from_array(vertices[i1].uv);
        let uv2 = Vec2::from_array(vertices[i2].uv);

        let edge1 = p1 - p0;
        let edge2 = p2 - p0;
        let duv1 = uv1 - uv0;
        let duv2 = uv2 - uv0;
        let denom = duv1.x * duv2.y - duv1.y * duv2.x;
        if denom.abs() < 1e-8 {
            continue;
        }
        let r = 1.0 / denom;
        let sdir = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let tdir = (edge2 * duv1.x - edge1 * duv2.x) * r;
        for index in [i0, i1, i2] {
            tan_u[index] += sdir;
            tan_v[index] += tdir;
        }
    }

    for (i, vertex) in vertices.iter_mut().enumerate() {
        let normal = Vec3::from_array(vertex.normal);
        let t = tan_u[i];
        if t.length_squared() > 0.0 {
            let tangent = (t - normal * normal.dot(t)).normalize_or_zero();
            let handedness = if normal.cross(t).dot(tan_v[i]) < 0.0 { -1.0 } else { 1.0 };
            vertex.tangent = [tangent.x, tangent.y, tangent.z, handedness];
        } else {
            vertex.tangent = [1.0, 0.0, 0.0, 1.0];
        }
    }
}

impl MeshBounds {
    pub fn from_vertices(vertices: &[MeshVertex]) -> Self {
        if vertices.is_empty() {
            return MeshBounds { min: Vec3::ZERO, max: Vec3::ZERO, center: Vec3::ZERO, radius: 0.0 };
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in vertices {
            let pos = Vec3::from_array(vertex.position);
            min = min.min(pos);
            max = max.max(pos);
        }
        let center = (min + max) * 0.5;
        let mut radius: f32 = 0.0;
        for vertex in vertices {
            radius = radius.max((Vec3::from_array(vertex.position) - center).length());
        }
        MeshBounds { min, max, center, radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_bounds_are_flat_and_centered() {
        let plane = Mesh::plane(100.0);
        assert_eq!(plane.vertices.len(), 4);
        assert_eq!(plane.indices.len(), 6);
        assert!(plane.bounds.center.length() < 1e-6);
        assert!((plane.bounds.max.x - 50.0).abs() < 1e-6);
        assert_eq!(plane.bounds.min.y, plane.bounds.max.y);
    }

    #[test]
    fn computed_normals_face_up_for_ccw_xz_triangle() {
        let positions =
            vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0)];
        let normals = compute_normals(&positions, &[0, 1, 2]);
        for normal in normals {
            assert!((normal - Vec3::Y).length_squared() < 1e-6);
        }
    }

    #[test]
    fn imports_demo_asset_with_named_node_and_material() {
        let import = load_asset("assets/models/demo_triangle.gltf").expect("demo gltf loads");
        assert_eq!(import.nodes.len(), 1);
        let node = &import.nodes[0];
        assert_eq!(node.name, "demo");
        assert_eq!(node.material.as_deref(), Some("M_Demo"));
        assert!(!node.cast_shadow && !node.receive_shadow, "flags start off");
        assert_eq!(node.mesh.indices, vec![0, 1, 2]);
        for vertex in &node.mesh.vertices {
            let normal = Vec3::from_array(vertex.normal);
            assert!((normal - Vec3::Z).length_squared() < 1e-4);
        }
        assert_eq!(import.materials.len(), 1);
        assert!((import.materials[0].roughness_factor - 0.8).abs() < 1e-6);
    }
}
