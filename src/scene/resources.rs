//! Geometry and material resources referenced by model nodes.

use crate::geometry::{BoundingBox, fre};
use anyhow::{Result, bail};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

define_id_newtype!(
    /// Process-unique identifier for a [`Geometry`].
    [pub] GeometryID
);

define_id_newtype!(
    /// Process-unique identifier for a [`Material`].
    [pub] MaterialID
);

/// Vertex, index and normal buffers of a triangle mesh, along with its
/// bounding box in object space.
#[derive(Debug)]
pub struct Geometry {
    id: GeometryID,
    vertices: Vec<fre>,
    indices: Vec<u32>,
    normals: Vec<fre>,
    bounds: BoundingBox,
}

/// Surface appearance of a model.
#[derive(Debug)]
pub struct Material {
    id: MaterialID,
    diffuse: ColorSource,
    specular: ColorSource,
    shininess: fre,
}

/// Where a material takes a colour from.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColorSource {
    StaticColor([f32; 4]),
    Texture { texture_id: u32 },
}

static GEOMETRY_ID_COUNTER: AtomicU32 = AtomicU32::new(0);
static MATERIAL_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

impl Geometry {
    /// Creates a new geometry from flat buffers of vertex positions, triangle
    /// indices and vertex normals.
    ///
    /// # Errors
    /// Returns an error if a buffer does not hold whole elements, if the
    /// normal buffer does not match the vertex buffer, or if an index refers to
    /// a missing vertex.
    pub fn new(vertices: Vec<fre>, indices: Vec<u32>, normals: Vec<fre>) -> Result<Self> {
        if vertices.len() % 3 != 0 {
            bail!(
                "Vertex buffer length {} is not a multiple of 3",
                vertices.len()
            );
        }
        if indices.len() % 3 != 0 {
            bail!(
                "Index buffer length {} is not a multiple of 3",
                indices.len()
            );
        }
        if !normals.is_empty() && normals.len() != vertices.len() {
            bail!(
                "Normal buffer length {} does not match vertex buffer length {}",
                normals.len(),
                vertices.len()
            );
        }
        let n_vertices = vertices.len() / 3;
        if let Some(&index) = indices.iter().find(|&&index| index as usize >= n_vertices) {
            bail!("Index {index} out of bounds for geometry with {n_vertices} vertices");
        }

        let points: Vec<_> = vertices
            .chunks_exact(3)
            .map(|position| Point3::new(position[0], position[1], position[2]))
            .collect();
        let bounds = BoundingBox::aabb_for_points(&points);

        Ok(Self {
            id: GeometryID(GEOMETRY_ID_COUNTER.fetch_add(1, Ordering::Relaxed)),
            vertices,
            indices,
            normals,
            bounds,
        })
    }

    /// Creates an axis-aligned cube with the given edge length, centered at
    /// the origin, with outward face normals.
    pub fn cube(edge_length: fre) -> Self {
        let h = 0.5 * edge_length;
        let faces: [([fre; 3], [[fre; 3]; 4]); 6] = [
            ([1.0, 0.0, 0.0], [[h, -h, -h], [h, h, -h], [h, h, h], [h, -h, h]]),
            ([-1.0, 0.0, 0.0], [[-h, -h, h], [-h, h, h], [-h, h, -h], [-h, -h, -h]]),
            ([0.0, 1.0, 0.0], [[-h, h, -h], [-h, h, h], [h, h, h], [h, h, -h]]),
            ([0.0, -1.0, 0.0], [[-h, -h, h], [-h, -h, -h], [h, -h, -h], [h, -h, h]]),
            ([0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
            ([0.0, 0.0, -1.0], [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]]),
        ];

        let mut vertices = Vec::with_capacity(6 * 4 * 3);
        let mut normals = Vec::with_capacity(6 * 4 * 3);
        let mut indices = Vec::with_capacity(6 * 6);

        for (face_idx, (normal, corners)) in faces.iter().enumerate() {
            for corner in corners {
                vertices.extend_from_slice(corner);
                normals.extend_from_slice(normal);
            }
            let base = 4 * face_idx as u32;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let bounds = BoundingBox::new(Point3::new(-h, -h, -h), Point3::new(h, h, h));

        Self {
            id: GeometryID(GEOMETRY_ID_COUNTER.fetch_add(1, Ordering::Relaxed)),
            vertices,
            indices,
            normals,
            bounds,
        }
    }

    pub fn id(&self) -> GeometryID {
        self.id
    }

    pub fn vertices(&self) -> &[fre] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn normals(&self) -> &[fre] {
        &self.normals
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn n_indices(&self) -> usize {
        self.indices.len()
    }

    /// Returns the bounding box of the geometry in object space.
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }
}

impl Material {
    pub fn new(diffuse: ColorSource, specular: ColorSource, shininess: fre) -> Self {
        Self {
            id: MaterialID(MATERIAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)),
            diffuse,
            specular,
            shininess,
        }
    }

    /// Creates a material with the given static diffuse colour and a white
    /// specular highlight.
    pub fn with_static_color(diffuse_color: [f32; 4]) -> Self {
        Self::new(
            ColorSource::StaticColor(diffuse_color),
            ColorSource::StaticColor([1.0; 4]),
            32.0,
        )
    }

    pub fn id(&self) -> MaterialID {
        self.id
    }

    pub fn diffuse(&self) -> &ColorSource {
        &self.diffuse
    }

    pub fn specular(&self) -> &ColorSource {
        &self.specular
    }

    pub fn shininess(&self) -> fre {
        self.shininess
    }

    /// Whether any colour of the material is sampled from a texture.
    pub fn is_textured(&self) -> bool {
        self.diffuse.is_texture() || self.specular.is_texture()
    }
}

impl ColorSource {
    pub fn is_texture(&self) -> bool {
        matches!(self, Self::Texture { .. })
    }

    /// Returns the static colour, or white for texture sources.
    pub fn static_color(&self) -> [f32; 4] {
        match self {
            Self::StaticColor(color) => *color,
            Self::Texture { .. } => [1.0; 4],
        }
    }
}
