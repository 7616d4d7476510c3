//! Interfaces to the drawing surface and GPU resources used by the renderer.

use crate::{
    geometry::fre,
    scene::{CameraNode, Geometry, GeometryID, LightKind, LightLayout, LightNode, Material, NodeID},
};
use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix3, Matrix4, Vector4};
use std::{fmt::Debug, sync::Arc};

define_id_newtype!(
    /// Identifier for a compiled shader program in a [`GpuContext`].
    [pub] ProgramID
);

define_id_newtype!(
    /// Identifier for a [`GpuContext`].
    [pub] ContextID
);

/// Attributes requested when creating a drawing context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContextAttributes {
    pub antialias: bool,
    /// Width and height of the drawing buffer in physical pixels.
    pub drawing_buffer_size: (u32, u32),
}

/// Optional features of a [`GpuContext`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GpuCapabilities {
    /// Whether geometry buffer bindings can be stored in vertex array objects.
    /// Without them, geometry buffers must be bound before every draw.
    pub vertex_array_objects: bool,
}

/// The features that select the shader program used for a material.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub diffuse_textured: bool,
    pub specular_textured: bool,
    pub light_layout: LightLayout,
}

/// Surface that drawing contexts can be created for.
pub trait Canvas: Debug {
    /// Returns the width and height of the canvas in logical pixels.
    fn size(&self) -> (u32, u32);

    /// Returns the number of physical pixels per logical pixel.
    fn pixel_ratio(&self) -> f32;

    fn request_fullscreen(&mut self);

    fn is_fullscreen(&self) -> bool;

    /// Creates a drawing context for the canvas, or returns `None` if the
    /// canvas can not provide one.
    fn create_context(&mut self, attributes: &ContextAttributes) -> Option<Box<dyn GpuContext>>;
}

/// A drawing context, which owns the GPU state and creates the renderers for
/// scene resources.
pub trait GpuContext: Debug {
    fn id(&self) -> ContextID;

    fn capabilities(&self) -> GpuCapabilities;

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clears the color and depth buffers.
    fn clear(&mut self, color: [f32; 4]);

    /// Draws the skybox with the given cube texture behind everything drawn so
    /// far.
    fn draw_skybox(&mut self, texture_id: u32, camera_matrix: &Matrix4<fre>);

    fn bind_program(&mut self, program_id: ProgramID);

    /// Uploads the given geometry.
    ///
    /// # Errors
    /// Returns an error if the geometry can not be uploaded.
    fn create_geometry_renderer(
        &mut self,
        geometry: &Arc<Geometry>,
    ) -> Result<Box<dyn GeometryRenderer>>;

    /// Creates a renderer for the given material, compiled for the given light
    /// layout.
    ///
    /// # Errors
    /// Returns an error if the program for the material can not be compiled.
    fn create_material_renderer(
        &mut self,
        material: &Arc<Material>,
        light_layout: &LightLayout,
    ) -> Result<Box<dyn MaterialRenderer>>;

    /// Creates a renderer for the light with the given node ID.
    ///
    /// # Errors
    /// Returns an error if the light can not be set up.
    fn create_light_renderer(
        &mut self,
        light_id: NodeID,
        light: &LightNode,
    ) -> Result<Box<dyn LightRenderer>>;
}

/// GPU buffers of an uploaded [`Geometry`].
pub trait GeometryRenderer: Debug {
    fn geometry_id(&self) -> GeometryID;

    /// Binds the vertex and index buffers. Only needed for contexts without
    /// vertex array objects.
    fn bind(&self);

    /// Draws the indexed triangles of the geometry.
    fn render(&self);

    fn destroy(&mut self);
}

/// Compiled program and uniforms for a [`Material`].
pub trait MaterialRenderer: Debug {
    fn program_id(&self) -> ProgramID;

    /// Compiles the program for the given light layout. The program ID may
    /// change.
    ///
    /// # Errors
    /// Returns an error if the program can not be compiled.
    fn compile(&mut self, light_layout: &LightLayout) -> Result<()>;

    /// Uploads the uniforms shared by every model drawn with the material in
    /// the current frame.
    fn prepare_frame(&self, frame_uniforms: &FrameUniforms);

    /// Uploads the uniforms of the next model drawn with the material.
    fn prepare_model(&self, model_uniforms: &ModelUniforms);

    fn destroy(&mut self);
}

/// Uniforms of a light node.
pub trait LightRenderer: Debug {
    fn update(&mut self, light: &LightNode, world_transform: &Matrix4<fre>);

    fn destroy(&mut self);
}

/// Per-frame uniforms derived from the camera.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Zeroable, Pod)]
pub struct FrameUniforms {
    pub camera_matrix: Matrix4<fre>,
    pub camera_position: Vector4<fre>,
}

/// Per-model uniforms. The normal matrix columns are padded to four
/// components.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Zeroable, Pod)]
pub struct ModelUniforms {
    pub mvp_matrix: Matrix4<fre>,
    pub model_matrix: Matrix4<fre>,
    pub normal_matrix: [Vector4<fre>; 3],
}

/// Uniforms of a single light. Unused fields are zero for the light kinds
/// that do not need them.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Zeroable, Pod)]
pub struct LightUniforms {
    pub position: Vector4<fre>,
    pub direction: Vector4<fre>,
    pub diffuse_color: Vector4<fre>,
    pub specular_color: Vector4<fre>,
    pub attenuation: Vector4<fre>,
    /// Cosine of the cutoff angle and falloff exponent of a spot light.
    pub spot: Vector4<fre>,
}

impl ProgramKey {
    pub fn new(material: &Material, light_layout: &LightLayout) -> Self {
        Self {
            diffuse_textured: material.diffuse().is_texture(),
            specular_textured: material.specular().is_texture(),
            light_layout: *light_layout,
        }
    }
}

impl FrameUniforms {
    pub fn new(camera: &CameraNode) -> Self {
        Self {
            camera_matrix: *camera.camera_matrix(),
            camera_position: camera.position().to_homogeneous(),
        }
    }
}

impl ModelUniforms {
    pub fn new(
        mvp_matrix: &Matrix4<fre>,
        model_matrix: &Matrix4<fre>,
        normal_matrix: &Matrix3<fre>,
    ) -> Self {
        let column = |idx: usize| normal_matrix.column(idx).push(0.0);
        Self {
            mvp_matrix: *mvp_matrix,
            model_matrix: *model_matrix,
            normal_matrix: [column(0), column(1), column(2)],
        }
    }
}

impl LightUniforms {
    pub fn new(light: &LightNode, world_transform: &Matrix4<fre>) -> Self {
        let [dr, dg, db] = *light.diffuse_color();
        let [sr, sg, sb] = *light.specular_color();

        let mut uniforms = Self {
            position: LightNode::world_position(world_transform).to_homogeneous(),
            direction: LightNode::world_direction(world_transform).push(0.0),
            diffuse_color: Vector4::new(dr, dg, db, 1.0),
            specular_color: Vector4::new(sr, sg, sb, 1.0),
            attenuation: Vector4::zeros(),
            spot: Vector4::zeros(),
        };

        match *light.kind() {
            LightKind::Directional => {}
            LightKind::Point { attenuation } => {
                uniforms.attenuation = Vector4::new(attenuation[0], attenuation[1], attenuation[2], 0.0);
            }
            LightKind::Spot {
                attenuation,
                cutoff_angle_degrees,
                exponent,
            } => {
                uniforms.attenuation = Vector4::new(attenuation[0], attenuation[1], attenuation[2], 0.0);
                uniforms.spot = Vector4::new(cutoff_angle_degrees.to_radians().cos(), exponent, 0.0, 0.0);
            }
        }
        uniforms
    }
}
