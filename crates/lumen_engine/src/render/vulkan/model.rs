//! Vertex data, mesh loading and GPU mesh objects
//!
//! Meshes are uploaded once through staging buffers and shared across game
//! objects via `Arc<Model>`. OBJ loading de-duplicates vertices on exact
//! structural equality of all attributes before emitting indices.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::mem::size_of;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::buffer::Buffer;
use super::device::{DeviceContext, VulkanResult};

/// Which render system draws a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    /// Untextured, lit by vertex color
    Simple,
    /// Sampled from the texture bound at set 1
    Textured,
}

/// Mesh loading errors
#[derive(Error, Debug)]
pub enum ObjError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// One vertex as laid out in the vertex buffer and shader input
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 24,
            },
            vk::VertexInputAttributeDescription {
                location: 3,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 36,
            },
        ]
    }

    /// Bit-exact key over all attributes. `f32` is not `Hash`, so the raw
    /// bit patterns stand in; two vertices merge only when every component
    /// is identical.
    fn key(&self) -> [u32; 11] {
        [
            self.position[0].to_bits(),
            self.position[1].to_bits(),
            self.position[2].to_bits(),
            self.color[0].to_bits(),
            self.color[1].to_bits(),
            self.color[2].to_bits(),
            self.normal[0].to_bits(),
            self.normal[1].to_bits(),
            self.normal[2].to_bits(),
            self.uv[0].to_bits(),
            self.uv[1].to_bits(),
        ]
    }
}

/// CPU-side mesh data, ready for upload
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Load and de-duplicate an OBJ file
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Self, ObjError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();

        let mut mesh = MeshData::default();
        let mut unique_vertices: HashMap<[u32; 11], u32> = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();

            match parts[0] {
                "v" => {
                    if parts.len() < 4 {
                        return Err(ObjError::InvalidFormat("Short vertex line".to_string()));
                    }
                    positions.push(parse_vec3(&parts[1..4])?);
                }
                "vn" => {
                    if parts.len() < 4 {
                        return Err(ObjError::InvalidFormat("Short normal line".to_string()));
                    }
                    normals.push(parse_vec3(&parts[1..4])?);
                }
                "vt" => {
                    if parts.len() < 3 {
                        return Err(ObjError::InvalidFormat("Short tex coord line".to_string()));
                    }
                    let u: f32 = parse_float(parts[1])?;
                    let v: f32 = parse_float(parts[2])?;
                    tex_coords.push([u, v]);
                }
                "f" => {
                    if parts.len() < 4 {
                        return Err(ObjError::InvalidFormat("Face with fewer than 3 vertices".to_string()));
                    }

                    let mut face_indices = Vec::with_capacity(parts.len() - 1);
                    for corner in &parts[1..] {
                        let vertex = parse_face_corner(corner, &positions, &normals, &tex_coords)?;
                        face_indices.push(mesh.push_unique(&mut unique_vertices, vertex));
                    }

                    // Fan triangulation for polygons beyond triangles
                    for i in 1..(face_indices.len() - 1) {
                        mesh.indices.push(face_indices[0]);
                        mesh.indices.push(face_indices[i]);
                        mesh.indices.push(face_indices[i + 1]);
                    }
                }
                _ => {
                    // Ignore other commands
                }
            }
        }

        if mesh.vertices.is_empty() {
            return Err(ObjError::InvalidFormat("No vertices found in OBJ file".to_string()));
        }

        Ok(mesh)
    }

    /// Index of `vertex`, appending it only when unseen
    fn push_unique(&mut self, unique: &mut HashMap<[u32; 11], u32>, vertex: Vertex) -> u32 {
        let next = self.vertices.len() as u32;
        match unique.entry(vertex.key()) {
            std::collections::hash_map::Entry::Occupied(e) => *e.get(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(next);
                self.vertices.push(vertex);
                next
            }
        }
    }
}

fn parse_float(s: &str) -> Result<f32, ObjError> {
    s.parse()
        .map_err(|_| ObjError::ParseError(format!("Invalid float: {}", s)))
}

fn parse_vec3(parts: &[&str]) -> Result<[f32; 3], ObjError> {
    Ok([
        parse_float(parts[0])?,
        parse_float(parts[1])?,
        parse_float(parts[2])?,
    ])
}

/// Parse a 1-based OBJ index into a 0-based one. OBJ indices start at 1,
/// so a literal `0` is malformed input rather than a valid reference.
fn parse_obj_index(s: &str, kind: &str) -> Result<usize, ObjError> {
    let one_based: usize = s
        .parse()
        .map_err(|_| ObjError::ParseError(format!("Invalid {} index: {}", kind, s)))?;
    one_based
        .checked_sub(1)
        .ok_or_else(|| ObjError::ParseError(format!("Invalid {} index: {}", kind, s)))
}

/// Resolve one `pos/tex/normal` face corner against the attribute streams.
/// Texture and normal slots may be absent or empty; a slot that is present
/// but unparsable is an error.
fn parse_face_corner(
    corner: &str,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
) -> Result<Vertex, ObjError> {
    let refs: Vec<&str> = corner.split('/').collect();

    let pos_idx = parse_obj_index(refs[0], "position")?;
    let position = *positions
        .get(pos_idx)
        .ok_or_else(|| ObjError::InvalidFormat("Position index out of bounds".to_string()))?;

    let tex_idx = match refs.get(1) {
        Some(s) if !s.is_empty() => Some(parse_obj_index(s, "texture")?),
        _ => None,
    };
    let uv = tex_idx
        .and_then(|idx| tex_coords.get(idx))
        .copied()
        .unwrap_or([0.0, 0.0]);

    let normal_idx = match refs.get(2) {
        Some(s) if !s.is_empty() => Some(parse_obj_index(s, "normal")?),
        _ => None,
    };
    let normal = normal_idx
        .and_then(|idx| normals.get(idx))
        .copied()
        .unwrap_or([0.0, 1.0, 0.0]);

    Ok(Vertex {
        position,
        color: [1.0, 1.0, 1.0],
        normal,
        uv,
    })
}

/// GPU mesh: vertex buffer, optional index buffer, and the render system
/// responsible for drawing it
pub struct Model {
    vertex_buffer: Buffer,
    index_buffer: Option<Buffer>,
    vertex_count: u32,
    index_count: u32,
    render_kind: RenderKind,
}

impl Model {
    /// Upload mesh data to device-local memory through staging buffers.
    /// Panics on fewer than three vertices.
    pub fn new(
        device: Arc<DeviceContext>,
        data: &MeshData,
        render_kind: RenderKind,
    ) -> VulkanResult<Self> {
        let vertex_count = data.vertices.len() as u32;
        assert!(vertex_count >= 3, "model needs at least 3 vertices");

        let vertex_buffer = Self::upload(
            device.clone(),
            bytemuck::cast_slice(&data.vertices),
            size_of::<Vertex>() as vk::DeviceSize,
            data.vertices.len() as u64,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_count = data.indices.len() as u32;
        let index_buffer = if data.indices.is_empty() {
            None
        } else {
            Some(Self::upload(
                device,
                bytemuck::cast_slice(&data.indices),
                size_of::<u32>() as vk::DeviceSize,
                data.indices.len() as u64,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?)
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count,
            index_count,
            render_kind,
        })
    }

    /// Load an OBJ file straight into a GPU mesh
    pub fn from_obj<P: AsRef<Path>>(
        device: Arc<DeviceContext>,
        path: P,
        render_kind: RenderKind,
    ) -> Result<Self, crate::render::RenderError> {
        let data = MeshData::load_obj(&path)?;
        log::info!(
            "Loaded {:?}: {} vertices, {} indices",
            path.as_ref(),
            data.vertices.len(),
            data.indices.len()
        );
        Ok(Self::new(device, &data, render_kind)?)
    }

    fn upload(
        device: Arc<DeviceContext>,
        bytes: &[u8],
        instance_size: vk::DeviceSize,
        instance_count: u64,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Buffer> {
        let mut staging = Buffer::new(
            device.clone(),
            instance_size,
            instance_count,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            0,
        )?;
        staging.map()?;
        staging.write_to_buffer(bytes, 0);

        let buffer = Buffer::new(
            device.clone(),
            instance_size,
            instance_count,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            0,
        )?;

        device.copy_buffer(staging.handle(), buffer.handle(), bytes.len() as vk::DeviceSize)?;

        Ok(buffer)
    }

    /// Bind vertex (and index) buffers for drawing
    pub fn bind(&self, device: &DeviceContext, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.device().cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer.handle()],
                &[0],
            );

            if let Some(index_buffer) = &self.index_buffer {
                device.device().cmd_bind_index_buffer(
                    command_buffer,
                    index_buffer.handle(),
                    0,
                    vk::IndexType::UINT32,
                );
            }
        }
    }

    /// Issue the draw call, indexed when an index buffer exists
    pub fn draw(&self, device: &DeviceContext, command_buffer: vk::CommandBuffer) {
        unsafe {
            if self.index_buffer.is_some() {
                device.device().cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
            } else {
                device.device().cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
            }
        }
    }

    pub fn render_kind(&self) -> RenderKind {
        self.render_kind
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn has_index_buffer(&self) -> bool {
        self.index_buffer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vertex(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Vertex {
        Vertex { position, color: [1.0, 1.0, 1.0], normal, uv }
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(size_of::<Vertex>(), 44);
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[3].offset, 36);
        assert_eq!(Vertex::binding_descriptions()[0].stride, 44);
    }

    #[test]
    fn identical_vertices_share_a_key() {
        let a = vertex([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.5]);
        let b = vertex([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.5]);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn any_attribute_difference_separates_keys() {
        let base = vertex([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.5]);
        let moved = vertex([1.0, 2.0, 3.5], [0.0, 1.0, 0.0], [0.5, 0.5]);
        let tilted = vertex([1.0, 2.0, 3.0], [1.0, 0.0, 0.0], [0.5, 0.5]);
        let shifted = vertex([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.0, 0.5]);
        assert_ne!(base.key(), moved.key());
        assert_ne!(base.key(), tilted.key());
        assert_ne!(base.key(), shifted.key());
    }

    #[test]
    fn negative_zero_does_not_merge_with_zero() {
        let plus = vertex([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]);
        let minus = vertex([-0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]);
        assert_ne!(plus.key(), minus.key());
    }

    fn write_obj(content: &str) -> std::path::PathBuf {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let mut path = std::env::temp_dir();
        path.push(format!(
            "lumen_test_{}_{}.obj",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const QUAD_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quad_face_is_fan_triangulated_with_shared_vertices() {
        let path = write_obj(QUAD_OBJ);
        let mesh = MeshData::load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();

        // Four corners, two triangles, corners  0 and 2 shared
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn loading_is_idempotent() {
        let path = write_obj(QUAD_OBJ);
        let first = MeshData::load_obj(&path).unwrap();
        let second = MeshData::load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(first.vertices, second.vertices);
        assert_eq!(first.indices, second.indices);
    }

    #[test]
    fn corners_with_distinct_normals_stay_distinct() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
vn 1 0 0
f 1//1 2//1 3//1
f 1//2 2//2 3//2
";
        let path = write_obj(obj);
        let mesh = MeshData::load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();

        // Same positions under two normals must not merge
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices.len(), 6);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let result = MeshData::load_obj("/nonexistent/mesh.obj");
        assert!(matches!(result, Err(ObjError::Io(_))));
    }

    #[test]
    fn garbage_coordinates_report_parse_error() {
        let path = write_obj("v 0 zero 0\n");
        let result = MeshData::load_obj(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ObjError::ParseError(_))));
    }

    #[test]
    fn zero_face_index_reports_parse_error() {
        // OBJ indices are 1-based, so a 0 reference is malformed
        let path = write_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n");
        let result = MeshData::load_obj(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ObjError::ParseError(_))));
    }

    #[test]
    fn zero_texture_and_normal_indices_report_parse_error() {
        let tex = write_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/0 2/1 3/1\n");
        let result = MeshData::load_obj(&tex);
        std::fs::remove_file(&tex).ok();
        assert!(matches!(result, Err(ObjError::ParseError(_))));

        let norm = write_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 1 0\nf 1//0 2//1 3//1\n");
        let result = MeshData::load_obj(&norm);
        std::fs::remove_file(&norm).ok();
        assert!(matches!(result, Err(ObjError::ParseError(_))));
    }

    #[test]
    fn unparsable_texture_index_reports_parse_error() {
        let path = write_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/x 2/1 3/1\n");
        let result = MeshData::load_obj(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ObjError::ParseError(_))));
    }

    #[test]
    fn empty_texture_slot_falls_back_to_default_uv() {
        let path = write_obj(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n",
        );
        let mesh = MeshData::load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(mesh.vertices[0].uv, [0.0, 0.0]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    }
}
