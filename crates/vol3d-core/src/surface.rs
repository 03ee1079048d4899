//! Externally built surface meshes and their alignment to the volume box.

use glam::{Mat4, UVec3, Vec3};

use crate::error::{Result, Vol3dError};

/// Scale used for surfaces whose units are not microns.
const LEGACY_SCALE: f32 = 0.00161;
/// Translation used for surfaces whose units are not microns.
const LEGACY_TRANSLATION: Vec3 = Vec3::new(-313.7, -147.5, -86.5);

/// An opaque triangle mesh drawn together with the volume.
///
/// The viewer holds meshes behind an `Arc`, so the caller keeps ownership of the
/// geometry and can attach the same mesh to several viewers.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
    transform: Mat4,
}

impl SurfaceMesh {
    /// Creates a mesh and computes area-weighted vertex normals.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidParameter`] if the mesh has no triangles or a
    /// triangle references a vertex that does not exist.
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        if triangles.is_empty() {
            return Err(Vol3dError::invalid_parameter(
                "surfaceMesh",
                "0 triangles",
                "a surface needs at least one triangle",
            ));
        }
        let vertex_count = vertices.len();
        if let Some(bad) = triangles
            .iter()
            .flatten()
            .find(|&&index| index as usize >= vertex_count)
        {
            return Err(Vol3dError::invalid_parameter(
                "surfaceMesh",
                bad,
                format!("index out of range for {vertex_count} vertices"),
            ));
        }

        let normals = vertex_normals(&vertices, &triangles);
        Ok(Self {
            vertices,
            triangles,
            normals,
            transform: Mat4::IDENTITY,
        })
    }

    /// Sets the model matrix placing the mesh in box space.
    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }
}

fn vertex_normals(vertices: &[Vec3], triangles: &[[u32; 3]]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; vertices.len()];
    for tri in triangles {
        let [a, b, c] = tri.map(|i| i as usize);
        // Unnormalized cross product weights each face by its area.
        let face = (vertices[b] - vertices[a]).cross(vertices[c] - vertices[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.normalize_or(Vec3::Z))
        .collect()
}

/// Scale and translation placing a surface inside the normalized volume box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceAlignment {
    pub scale: f32,
    pub translation: Vec3,
}

impl SurfaceAlignment {
    /// Computes the alignment for a surface in `units` over a volume of `volume_size`
    /// voxels with `voxel_size` spacing.
    ///
    /// Micron surfaces are centered on the volume and scaled by its largest physical
    /// extent. Other units use fixed factors.
    pub fn compute(units: &str, volume_size: UVec3, voxel_size: Vec3) -> Self {
        if units == "micron" {
            let extent = volume_size.as_vec3() * voxel_size;
            let max = extent.max_element();
            let scale = if max == 0.0 { 1.0 } else { 1.0 / max };
            Self {
                scale,
                translation: -extent / 2.0,
            }
        } else {
            Self {
                scale: LEGACY_SCALE,
                translation: LEGACY_TRANSLATION,
            }
        }
    }

    /// Returns `translate(translation * scale) * scale(scale)`.
    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_translation(self.translation * self.scale) * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> SurfaceMesh {
        SurfaceMesh::new(
            vec![
                Vec3::ZERO,
                Vec3::X,
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::Y,
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_normals_follow_winding() {
        let mesh = quad();
        for n in mesh.normals() {
            assert!((*n - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let result = SurfaceMesh::new(vec![Vec3::ZERO; 2], vec![[0, 1, 2]]);
        assert!(matches!(result, Err(Vol3dError::InvalidParameter { .. })));
        assert!(SurfaceMesh::new(vec![Vec3::ZERO; 3], vec![]).is_err());
    }

    #[test]
    fn test_micron_alignment_centers_volume() {
        let alignment = SurfaceAlignment::compute(
            "micron",
            UVec3::new(100, 50, 20),
            Vec3::new(0.5, 0.5, 1.0),
        );
        assert!((alignment.scale - 1.0 / 50.0).abs() < 1e-6);
        assert_eq!(alignment.translation, Vec3::new(-25.0, -12.5, -10.0));

        let m = alignment.to_matrix();
        let center = m.transform_point3(Vec3::new(25.0, 12.5, 10.0));
        assert!(center.length() < 1e-5);
        let corner = m.transform_point3(Vec3::new(50.0, 0.0, 0.0));
        assert!((corner.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_empty_volume_alignment_uses_unit_scale() {
        let alignment = SurfaceAlignment::compute("micron", UVec3::ZERO, Vec3::ONE);
        assert_eq!(alignment.scale, 1.0);
    }

    #[test]
    fn test_legacy_alignment() {
        let alignment = SurfaceAlignment::compute("pixel", UVec3::new(10, 10, 10), Vec3::ONE);
        assert_eq!(alignment.scale, 0.00161);
        assert_eq!(alignment.translation, Vec3::new(-313.7, -147.5, -86.5));
    }
}
