//! Drawable geometry handed to a render backend
//!
//! Geometry stays CPU-side in [`VertexAttributes`] until a [`RenderBackend`]
//! uploads it. The backend returns an opaque [`GpuBuffers`] handle owned by
//! the [`DrawShape`]; dropping the shape drops the handle, which releases the
//! buffers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::Bounds;
use crate::skeleton::{BoneId, VertexInfluences};

/// Phong-style material parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub opacity: f32,
}

impl Material {
    /// Magenta placeholder for meshes without a material
    pub const DEFAULT: Self = Self {
        ambient: Vec3::new(1.0, 0.0, 1.0),
        diffuse: Vec3::new(0.8, 0.0, 0.8),
        specular: Vec3::new(1.0, 0.5, 1.0),
        shininess: 32.0,
        opacity: 1.0,
    };

    pub const COLLIDER_OPACITY: f32 = 0.3;

    /// Translucent flat-colored collider material.
    pub fn collider(color: Vec3) -> Self {
        Self {
            ambient: color,
            diffuse: color,
            specular: Vec3::ZERO,
            shininess: Self::DEFAULT.shininess,
            opacity: Self::COLLIDER_OPACITY,
        }
    }

    pub fn from_diffuse(diffuse: Vec3, opacity: f32) -> Self {
        Self {
            ambient: diffuse,
            diffuse,
            opacity,
            ..Self::DEFAULT
        }
    }

    pub fn is_translucent(&self) -> bool {
        self.opacity < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Interleaved vertex as uploaded (64 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub bone_ids: [u32; 4],
    pub bone_weights: [f32; 4],
}

/// Non-indexed triangle list, one entry per corner in every array
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexAttributes {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub bone_ids: Vec<[u32; 4]>,
    pub bone_weights: Vec<[f32; 4]>,
}

impl VertexAttributes {
    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            uvs: Vec::with_capacity(vertices),
            bone_ids: Vec::with_capacity(vertices),
            bone_weights: Vec::with_capacity(vertices),
        }
    }

    pub fn push(&mut self, position: Vec3, normal: Vec3, uv: Vec2, influences: VertexInfluences) {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        self.bone_ids.push(influences.bone_ids);
        self.bone_weights.push(influences.weights);
    }

    /// Flat-shaded triangles, every corner bound by `binding`.
    pub fn flat_triangles(
        vertices: &[Vec3],
        faces: &[[u32; 3]],
        binding: VertexInfluences,
    ) -> Self {
        let mut attributes = Self::with_capacity(faces.len() * 3);
        for face in faces {
            let [a, b, c] = face.map(|i| vertices[i as usize]);
            let normal = (b - a).cross(c - a).normalize_or_zero();
            for corner in [a, b, c] {
                attributes.push(corner, normal, Vec2::ZERO, binding);
            }
        }
        attributes
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.positions)
    }

    pub fn to_gpu_vertices(&self) -> Vec<GpuVertex> {
        (0..self.positions.len())
            .map(|i| GpuVertex {
                position: self.positions[i].to_array(),
                normal: self.normals.get(i).copied().unwrap_or(Vec3::Y).to_array(),
                uv: self.uvs.get(i).copied().unwrap_or_default().to_array(),
                bone_ids: self.bone_ids.get(i).copied().unwrap_or_default(),
                bone_weights: self.bone_weights.get(i).copied().unwrap_or([1.0, 0.0, 0.0, 0.0]),
            })
            .collect()
    }
}

/// Backend-owned buffers for one shape. Dropping the handle releases them.
pub trait GpuBuffers: fmt::Debug + Send {
    fn vertex_count(&self) -> usize;
}

/// Uploads vertex data once; the shape draws from the returned handle.
pub trait RenderBackend {
    fn upload(&mut self, vertices: &[GpuVertex], bounds: Bounds) -> Box<dyn GpuBuffers>;
}

/// Backend that keeps nothing but a count of live buffers
///
/// Used by the CLI and tests.
#[derive(Debug, Default, Clone)]
pub struct HeadlessBackend {
    live: Arc<AtomicUsize>,
    uploaded_bytes: usize,
}

#[derive(Debug)]
struct HeadlessBuffers {
    live: Arc<AtomicUsize>,
    vertex_count: usize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers uploaded and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn uploaded_bytes(&self) -> usize {
        self.uploaded_bytes
    }
}

impl RenderBackend for HeadlessBackend {
    fn upload(&mut self, vertices: &[GpuVertex], _bounds: Bounds) -> Box<dyn GpuBuffers> {
        self.uploaded_bytes += bytemuck::cast_slice::<GpuVertex, u8>(vertices).len();
        self.live.fetch_add(1, Ordering::SeqCst);
        Box::new(HeadlessBuffers {
            live: Arc::clone(&self.live),
            vertex_count: vertices.len(),
        })
    }
}

impl GpuBuffers for HeadlessBuffers {
    fn vertex_count(&self) -> usize {
        self.vertex_count
    }
}

impl Drop for HeadlessBuffers {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Geometry plus its (optional) GPU residency
#[derive(Debug)]
pub struct DrawShape {
    pub attributes: VertexAttributes,
    pub bounds: Bounds,
    gpu: Option<Box<dyn GpuBuffers>>,
}

impl DrawShape {
    pub fn new(attributes: VertexAttributes) -> Self {
        let bounds = attributes.bounds();
        Self {
            attributes,
            bounds,
            gpu: None,
        }
    }

    /// Upload once; later calls keep the existing buffers.
    pub fn upload(&mut self, backend: &mut dyn RenderBackend) {
        if self.gpu.is_none() {
            let vertices = self.attributes.to_gpu_vertices();
            self.gpu = Some(backend.upload(&vertices, self.bounds));
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn gpu(&self) -> Option<&dyn GpuBuffers> {
        self.gpu.as_deref()
    }
}

/// One material-homogeneous piece of a mesh
#[derive(Debug)]
pub struct DrawObject {
    pub name: String,
    pub shape: DrawShape,
    pub material: Material,
    /// Bone a collider piece is rigidly bound to
    pub bone: Option<BoneId>,
}

impl DrawObject {
    pub fn new(name: impl Into<String>, attributes: VertexAttributes, material: Material) -> Self {
        Self {
            name: name.into(),
            shape: DrawShape::new(attributes),
            material,
            bone: None,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.shape.bounds
    }
}

/// A collection of draw objects with aggregate bounds
#[derive(Debug, Default)]
pub struct DrawMesh {
    objects: Vec<DrawObject>,
    bounds: Bounds,
}

impl DrawMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: DrawObject) {
        self.bounds = self.bounds.union(&object.bounds());
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[DrawObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [DrawObject] {
        &mut self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn min(&self) -> Vec3 {
        self.bounds.min
    }

    pub fn max(&self) -> Vec3 {
        self.bounds.max
    }

    pub fn vertex_count(&self) -> usize {
        self.objects
            .iter()
            .map(|o| o.shape.attributes.vertex_count())
            .sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.objects
            .iter()
            .map(|o| o.shape.attributes.triangle_count())
            .sum()
    }

    pub fn upload(&mut self, backend: &mut dyn RenderBackend) {
        for object in &mut self.objects {
            object.shape.upload(backend);
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.objects.iter().all(|o| o.shape.is_uploaded())
    }
}

impl FromIterator<DrawObject> for DrawMesh {
    fn from_iter<I: IntoIterator<Item = DrawObject>>(iter: I) -> Self {
        let mut mesh = DrawMesh::new();
        for object in iter {
            mesh.push(object);
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(offset: Vec3) -> VertexAttributes {
        VertexAttributes::flat_triangles(
            &[offset, offset + Vec3::X, offset + Vec3::Y],
            &[[0, 1, 2]],
            VertexInfluences::default(),
        )
    }

    #[test]
    fn test_gpu_vertex_layout() {
        assert_eq!(std::mem::size_of::<GpuVertex>(), 64);
    }

    #[test]
    fn test_flat_triangles() {
        let attributes = triangle(Vec3::ZERO);
        assert_eq!(attributes.vertex_count(), 3);
        assert_eq!(attributes.triangle_count(), 1);
        assert!(attributes.normals.iter().all(|n| *n == Vec3::Z));
        assert!(attributes.bone_weights.iter().all(|w| *w == [1.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_mesh_bounds_aggregate() {
        let mut mesh = DrawMesh::new();
        assert!(mesh.bounds().is_empty());

        mesh.push(DrawObject::new("a", triangle(Vec3::ZERO), Material::DEFAULT));
        mesh.push(DrawObject::new("b", triangle(Vec3::splat(5.0)), Material::DEFAULT));

        assert_eq!(mesh.len(), 2);
        assert_eq!(mesh.min(), Vec3::ZERO);
        assert_eq!(mesh.max(), Vec3::new(6.0, 6.0, 5.0));
    }

    #[test]
    fn test_collider_material() {
        let material = Material::collider(Vec3::new(0.2, 0.4, 0.6));
        assert_eq!(material.diffuse, material.ambient);
        assert_eq!(material.specular, Vec3::ZERO);
        assert!(material.is_translucent());
        assert!(!Material::DEFAULT.is_translucent());
    }

    #[test]
    fn test_dropping_shapes_releases_buffers() {
        let mut backend = HeadlessBackend::new();
        let mut mesh: DrawMesh = (0..3)
            .map(|i| DrawObject::new(format!("part{i}"), triangle(Vec3::ZERO), Material::DEFAULT))
            .collect();

        mesh.upload(&mut backend);
        mesh.upload(&mut backend);
        assert!(mesh.is_uploaded());
        assert_eq!(backend.live_buffers(), 3);
        assert_eq!(backend.uploaded_bytes(), 3 * 3 * 64);

        drop(mesh);
        assert_eq!(backend.live_buffers(), 0);
    }
}
