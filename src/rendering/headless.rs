//! In-memory drawing context that records the commands issued to it.

use crate::{
    geometry::fre,
    rendering::gpu::{
        Canvas, ContextAttributes, ContextID, FrameUniforms, GeometryRenderer, GpuCapabilities,
        GpuContext, LightRenderer, LightUniforms, MaterialRenderer, ModelUniforms, ProgramID,
        ProgramKey,
    },
    scene::{Geometry, GeometryID, LightLayout, LightNode, Material, MaterialID, NodeID},
};
use anyhow::{Result, bail};
use nalgebra::Matrix4;
use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

static CONTEXT_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A command recorded by a [`HeadlessContext`] or one of its renderers.
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCommand {
    SetViewport {
        width: u32,
        height: u32,
    },
    Clear {
        color: [f32; 4],
    },
    DrawSkybox {
        texture_id: u32,
    },
    /// A program was compiled for a key not seen before.
    CompileProgram {
        program_id: ProgramID,
        key: ProgramKey,
    },
    BindProgram {
        program_id: ProgramID,
    },
    UploadGeometry {
        geometry_id: GeometryID,
        n_indices: usize,
    },
    /// A material was compiled, possibly reusing an existing program.
    CompileMaterial {
        material_id: MaterialID,
        program_id: ProgramID,
    },
    CreateLight {
        light_id: NodeID,
    },
    WriteUniforms {
        slot: UniformSlot,
        bytes: Vec<u8>,
    },
    BindVertexArray {
        geometry_id: GeometryID,
    },
    BindGeometryBuffers {
        geometry_id: GeometryID,
    },
    DrawIndexed {
        geometry_id: GeometryID,
        n_indices: usize,
    },
    DestroyGeometry {
        geometry_id: GeometryID,
    },
    DestroyMaterial {
        material_id: MaterialID,
    },
    DestroyLight {
        light_id: NodeID,
    },
}

/// Destination of a [`GpuCommand::WriteUniforms`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UniformSlot {
    Frame { material_id: MaterialID },
    Model { material_id: MaterialID },
    Light { light_id: NodeID },
}

/// Shared handle to the commands recorded by a [`HeadlessContext`]. Clones
/// refer to the same log, so a handle obtained before the canvas is handed to
/// a renderer keeps observing it.
#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    state: Rc<RefCell<HeadlessState>>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    commands: Vec<GpuCommand>,
    programs: HashMap<ProgramKey, ProgramID>,
}

/// A [`Canvas`] with a fixed size that creates [`HeadlessContext`]s.
#[derive(Debug)]
pub struct HeadlessCanvas {
    size: (u32, u32),
    pixel_ratio: f32,
    capabilities: GpuCapabilities,
    provides_context: bool,
    fullscreen: bool,
    last_attributes: Option<ContextAttributes>,
    log: CommandLog,
}

/// A [`GpuContext`] that records commands instead of drawing.
#[derive(Debug)]
pub struct HeadlessContext {
    id: ContextID,
    capabilities: GpuCapabilities,
    log: CommandLog,
}

#[derive(Debug)]
struct HeadlessGeometryRenderer {
    geometry_id: GeometryID,
    n_indices: usize,
    vertex_array_objects: bool,
    log: CommandLog,
}

#[derive(Debug)]
struct HeadlessMaterialRenderer {
    material: Arc<Material>,
    program_id: ProgramID,
    log: CommandLog,
}

#[derive(Debug)]
struct HeadlessLightRenderer {
    light_id: NodeID,
    log: CommandLog,
}

impl CommandLog {
    /// Returns a copy of every command recorded so far.
    pub fn commands(&self) -> Vec<GpuCommand> {
        self.state.borrow().commands.clone()
    }

    /// Removes and returns every command recorded so far.
    pub fn take_commands(&self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.state.borrow_mut().commands)
    }

    pub fn n_commands(&self) -> usize {
        self.state.borrow().commands.len()
    }

    /// Counts the recorded commands matching the given predicate.
    pub fn count(&self, predicate: impl Fn(&GpuCommand) -> bool) -> usize {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|&command| predicate(command))
            .count()
    }

    /// Returns the number of distinct programs compiled so far.
    pub fn n_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().commands.clear();
    }

    fn record(&self, command: GpuCommand) {
        self.state.borrow_mut().commands.push(command);
    }

    fn program_for_key(&self, key: ProgramKey) -> ProgramID {
        let mut state = self.state.borrow_mut();
        if let Some(&program_id) = state.programs.get(&key) {
            return program_id;
        }
        let program_id = ProgramID::from_u32(u32::try_from(state.programs.len()).unwrap_or(u32::MAX));
        state.programs.insert(key, program_id);
        state
            .commands
            .push(GpuCommand::CompileProgram { program_id, key });
        program_id
    }
}

impl HeadlessCanvas {
    /// Creates a canvas with the given logical size, a pixel ratio of one and
    /// support for vertex array objects.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            pixel_ratio: 1.0,
            capabilities: GpuCapabilities {
                vertex_array_objects: true,
            },
            provides_context: true,
            fullscreen: false,
            last_attributes: None,
            log: CommandLog::default(),
        }
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    /// Makes created contexts report no support for vertex array objects.
    pub fn without_vertex_array_objects(mut self) -> Self {
        self.capabilities.vertex_array_objects = false;
        self
    }

    /// Makes the canvas refuse to create contexts.
    pub fn without_context(mut self) -> Self {
        self.provides_context = false;
        self
    }

    /// Returns a handle to the log of every context created by the canvas.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Returns the attributes of the most recent context request.
    pub fn last_attributes(&self) -> Option<&ContextAttributes> {
        self.last_attributes.as_ref()
    }
}

impl Canvas for HeadlessCanvas {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn request_fullscreen(&mut self) {
        self.fullscreen = true;
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn create_context(&mut self, attributes: &ContextAttributes) -> Option<Box<dyn GpuContext>> {
        self.last_attributes = Some(*attributes);
        if !self.provides_context {
            return None;
        }
        Some(Box::new(HeadlessContext {
            id: ContextID::from_u32(CONTEXT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)),
            capabilities: self.capabilities,
            log: self.log.clone(),
        }))
    }
}

impl GpuContext for HeadlessContext {
    fn id(&self) -> ContextID {
        self.id
    }

    fn capabilities(&self) -> GpuCapabilities {
        self.capabilities
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.log.record(GpuCommand::SetViewport { width, height });
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.log.record(GpuCommand::Clear { color });
    }

    fn draw_skybox(&mut self, texture_id: u32, _camera_matrix: &Matrix4<fre>) {
        self.log.record(GpuCommand::DrawSkybox { texture_id });
    }

    fn bind_program(&mut self, program_id: ProgramID) {
        self.log.record(GpuCommand::BindProgram { program_id });
    }

    fn create_geometry_renderer(
        &mut self,
        geometry: &Arc<Geometry>,
    ) -> Result<Box<dyn GeometryRenderer>> {
        if geometry.n_indices() == 0 {
            bail!("Geometry {} has no triangles to upload", geometry.id());
        }
        self.log.record(GpuCommand::UploadGeometry {
            geometry_id: geometry.id(),
            n_indices: geometry.n_indices(),
        });
        Ok(Box::new(HeadlessGeometryRenderer {
            geometry_id: geometry.id(),
            n_indices: geometry.n_indices(),
            vertex_array_objects: self.capabilities.vertex_array_objects,
            log: self.log.clone(),
        }))
    }

    fn create_material_renderer(
        &mut self,
        material: &Arc<Material>,
        light_layout: &LightLayout,
    ) -> Result<Box<dyn MaterialRenderer>> {
        let mut renderer = HeadlessMaterialRenderer {
            material: Arc::clone(material),
            program_id: ProgramID::default(),
            log: self.log.clone(),
        };
        renderer.compile(light_layout)?;
        Ok(Box::new(renderer))
    }

    fn create_light_renderer(
        &mut self,
        light_id: NodeID,
        _light: &LightNode,
    ) -> Result<Box<dyn LightRenderer>> {
        self.log.record(GpuCommand::CreateLight { light_id });
        Ok(Box::new(HeadlessLightRenderer {
            light_id,
            log: self.log.clone(),
        }))
    }
}

impl GeometryRenderer for HeadlessGeometryRenderer {
    fn geometry_id(&self) -> GeometryID {
        self.geometry_id
    }

    fn bind(&self) {
        self.log.record(GpuCommand::BindGeometryBuffers {
            geometry_id: self.geometry_id,
        });
    }

    fn render(&self) {
        if self.vertex_array_objects {
            self.log.record(GpuCommand::BindVertexArray {
                geometry_id: self.geometry_id,
            });
        }
        self.log.record(GpuCommand::DrawIndexed {
            geometry_id: self.geometry_id,
            n_indices: self.n_indices,
        });
    }

    fn destroy(&mut self) {
        self.log.record(GpuCommand::DestroyGeometry {
            geometry_id: self.geometry_id,
        });
    }
}

impl MaterialRenderer for HeadlessMaterialRenderer {
    fn program_id(&self) -> ProgramID {
        self.program_id
    }

    fn compile(&mut self, light_layout: &LightLayout) -> Result<()> {
        let key = ProgramKey::new(&self.material, light_layout);
        self.program_id = self.log.program_for_key(key);
        self.log.record(GpuCommand::CompileMaterial {
            material_id: self.material.id(),
            program_id: self.program_id,
        });
        Ok(())
    }

    fn prepare_frame(&self, frame_uniforms: &FrameUniforms) {
        self.log.record(GpuCommand::WriteUniforms {
            slot: UniformSlot::Frame {
                material_id: self.material.id(),
            },
            bytes: bytemuck::bytes_of(frame_uniforms).to_vec(),
        });
    }

    fn prepare_model(&self, model_uniforms: &ModelUniforms) {
        self.log.record(GpuCommand::WriteUniforms {
            slot: UniformSlot::Model {
                material_id: self.material.id(),
            },
            bytes: bytemuck::bytes_of(model_uniforms).to_vec(),
        });
    }

    fn destroy(&mut self) {
        self.log.record(GpuCommand::DestroyMaterial {
            material_id: self.material.id(),
        });
    }
}

impl LightRenderer for HeadlessLightRenderer {
    fn update(&mut self, light: &LightNode, world_transform: &Matrix4<fre>) {
        let uniforms = LightUniforms::new(light, world_transform);
        self.log.record(GpuCommand::WriteUniforms {
            slot: UniformSlot::Light {
                light_id: self.light_id,
            },
            bytes: bytemuck::bytes_of(&uniforms).to_vec(),
        });
    }

    fn destroy(&mut self) {
        self.log.record(GpuCommand::DestroyLight {
            light_id: self.light_id,
        });
    }
}
