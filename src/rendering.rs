//! Per-frame orchestration of scene recalculation, culling and drawing.

mod config;
mod draw_order;
mod gpu;
mod headless;
mod visibility;

pub use config::{EnvironmentConfig, RendererConfig, SkyboxConfig};
pub use draw_order::{DrawKey, DrawOrder};
pub use gpu::{
    Canvas, ContextAttributes, ContextID, FrameUniforms, GeometryRenderer, GpuCapabilities,
    GpuContext, LightRenderer, LightUniforms, MaterialRenderer, ModelUniforms, ProgramID,
    ProgramKey,
};
pub use headless::{CommandLog, GpuCommand, HeadlessCanvas, HeadlessContext, UniformSlot};
pub use visibility::mark_visible_nodes;

use crate::{
    game_loop::{FrameDurationTracker, frame_duration_to_fps},
    geometry::fre,
    scene::{
        Geometry, GeometryID, LightLayout, Material, MaterialID, ModelState, NodeID, NodeKindTag,
        Scene, TriggerFlags,
    },
};
use anyhow::{Context, Result, anyhow};
use std::{sync::Arc, time::Duration};
use tinyvec::tiny_vec;
use tribus_utils::{BitVector, NoHashMap};

/// Name of the event triggered on the scene root at the start of every frame,
/// with the time since the previous frame and the total elapsed time in
/// seconds as payload.
pub const TICK_EVENT: &str = "tick";

/// Draws a [`Scene`] through a [`GpuContext`] as seen from one of its
/// cameras.
///
/// Every frame, the renderer recalculates the scene, picks up nodes it has not
/// seen before, marks the nodes visible from the camera and draws the visible
/// ready models in an order that groups them by program and material. Frames
/// in which nothing in the scene changed issue no GPU commands.
#[derive(Debug)]
pub struct Renderer {
    scene: Scene,
    camera_id: NodeID,
    canvas: Box<dyn Canvas>,
    context: Box<dyn GpuContext>,
    config: RendererConfig,
    draw_order: DrawOrder,
    new_nodes: BitVector,
    processed_nodes: BitVector,
    visible_nodes: BitVector,
    pending_models: Vec<NodeID>,
    geometry_renderers: NoHashMap<GeometryID, Box<dyn GeometryRenderer>>,
    material_renderers: NoHashMap<MaterialID, Box<dyn MaterialRenderer>>,
    light_renderers: NoHashMap<NodeID, Box<dyn LightRenderer>>,
    light_layout: LightLayout,
    previous_elapsed: Option<Duration>,
    frame_duration_tracker: FrameDurationTracker,
    last_fps_report: Duration,
}

/// Counts describing what happened during a call to [`Renderer::render`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    /// Whether anything was drawn. False when the scene did not change.
    pub drawn: bool,
    pub n_new_nodes: usize,
    pub n_activated_models: usize,
    /// Active models whose geometry or material was replaced.
    pub n_reactivated_models: usize,
    pub n_pending_models: usize,
    pub n_tested_nodes: usize,
    pub n_plane_tests: u64,
    pub n_drawn_models: usize,
    pub n_program_binds: usize,
    pub n_mvp_updates: usize,
}

impl Renderer {
    /// Creates a renderer drawing the given scene as seen from the camera with
    /// the given node ID on a context created for the given canvas.
    ///
    /// # Errors
    /// Returns an error if the node is not a camera in the scene or if the
    /// canvas can not provide a drawing context.
    pub fn new(
        mut scene: Scene,
        camera_id: NodeID,
        mut canvas: Box<dyn Canvas>,
        config: RendererConfig,
    ) -> Result<Self> {
        scene
            .camera(camera_id)
            .context("Renderer requires a camera to view the scene from")?;

        if config.fullscreen {
            canvas.request_fullscreen();
        }

        let (width, height) =
            drawing_buffer_size(canvas.size(), canvas.pixel_ratio(), config.hidpi);

        let attributes = ContextAttributes {
            antialias: config.antialias,
            drawing_buffer_size: (width, height),
        };
        let mut context = canvas
            .create_context(&attributes)
            .ok_or_else(|| anyhow!("Canvas could not provide a drawing context"))?;

        context.set_viewport(width, height);
        if height > 0 {
            scene
                .camera_mut(camera_id)?
                .set_aspect_ratio(width as fre / height as fre)?;
        }

        log::info!(
            "Created renderer on context {} with {width}x{height} drawing buffer",
            context.id()
        );

        Ok(Self {
            scene,
            camera_id,
            canvas,
            context,
            config,
            draw_order: DrawOrder::new(),
            new_nodes: BitVector::new(),
            processed_nodes: BitVector::new(),
            visible_nodes: BitVector::new(),
            pending_models: Vec::new(),
            geometry_renderers: NoHashMap::default(),
            material_renderers: NoHashMap::default(),
            light_renderers: NoHashMap::default(),
            light_layout: LightLayout::default(),
            previous_elapsed: None,
            frame_duration_tracker: FrameDurationTracker::default(),
            last_fps_report: Duration::ZERO,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera_id(&self) -> NodeID {
        self.camera_id
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn canvas(&self) -> &dyn Canvas {
        self.canvas.as_ref()
    }

    pub fn context(&self) -> &dyn GpuContext {
        self.context.as_ref()
    }

    /// Returns the ready models in drawing order.
    pub fn draw_order(&self) -> &DrawOrder {
        &self.draw_order
    }

    /// Returns the nodes the renderer has picked up so far.
    pub fn processed_nodes(&self) -> &BitVector {
        &self.processed_nodes
    }

    /// Returns the models waiting for their resources.
    pub fn pending_models(&self) -> &[NodeID] {
        &self.pending_models
    }

    pub fn light_layout(&self) -> &LightLayout {
        &self.light_layout
    }

    /// Updates the viewport and camera aspect ratio for a new canvas size in
    /// logical pixels.
    ///
    /// # Errors
    /// Returns an error if the camera rejects the new aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let (width, height) =
            drawing_buffer_size((width, height), self.canvas.pixel_ratio(), self.config.hidpi);
        self.context.set_viewport(width, height);
        if height > 0 {
            self.scene
                .camera_mut(self.camera_id)?
                .set_aspect_ratio(width as fre / height as fre)?;
        }
        Ok(())
    }

    /// Renders a frame at the given time since rendering started.
    ///
    /// # Errors
    /// Returns an error if the camera has been removed from the scene.
    pub fn render(&mut self, elapsed: Duration) -> Result<FrameStatistics> {
        let delta = elapsed.saturating_sub(self.previous_elapsed.unwrap_or(elapsed));
        self.previous_elapsed = Some(elapsed);
        self.report_fps(delta, elapsed);

        let root_id = self.scene.root_id();
        self.scene.trigger(
            root_id,
            TICK_EVENT,
            TriggerFlags::SYNC,
            tiny_vec![delta.as_secs_f32(), elapsed.as_secs_f32()],
        )?;
        self.scene.dispatch_events();

        let dirty = self.scene.recalculate(&mut self.new_nodes);

        self.new_nodes.difference_with(&self.processed_nodes);

        let mut statistics = FrameStatistics {
            n_new_nodes: self.new_nodes.count_set_bits(),
            ..FrameStatistics::default()
        };

        self.process_new_nodes();
        statistics.n_activated_models = self.process_pending_models();
        statistics.n_reactivated_models = self.process_reloaded_models();
        statistics.n_pending_models = self.pending_models.len();

        let structure_changed = self.scene.take_structure_changed();
        if statistics.n_new_nodes > 0 || structure_changed {
            with_debug_logging!("Updating subtree IDs"; self.scene.update_subtree_ids());
        }

        self.processed_nodes.union_with(&self.new_nodes);

        if dirty {
            self.draw_frame(&mut statistics)?;
        }

        self.visible_nodes.unset_all();
        self.new_nodes.unset_all();

        if self.config.debug {
            log::debug!("Frame statistics: {statistics:?}");
        }

        Ok(statistics)
    }

    fn draw_frame(&mut self, statistics: &mut FrameStatistics) -> Result<()> {
        self.scene
            .camera_mut(self.camera_id)?
            .reset_plane_test_count();

        statistics.n_tested_nodes =
            mark_visible_nodes(&mut self.scene, self.camera_id, &mut self.visible_nodes)?;
        statistics.n_plane_tests = self.scene.camera(self.camera_id)?.n_plane_tests();

        self.context.clear(self.config.environment.clear_color);

        self.update_lights();
        self.draw_models(statistics)?;

        if let Some(skybox) = &self.config.environment.skybox {
            let camera_matrix = *self.scene.camera(self.camera_id)?.camera_matrix();
            self.context
                .draw_skybox(skybox.texture_id, &camera_matrix);
        }

        statistics.drawn = true;
        Ok(())
    }

    fn process_new_nodes(&mut self) {
        let new_node_ids: Vec<_> = self.new_nodes.set_bits().map(NodeID::from_idx).collect();

        let mut n_new_lights = 0;
        for node_id in new_node_ids {
            match self.scene.node(node_id).kind_tag() {
                NodeKindTag::Model => {
                    self.pending_models.push(node_id);
                }
                NodeKindTag::Light => {
                    if self.add_light(node_id) {
                        n_new_lights += 1;
                    }
                }
                NodeKindTag::Group | NodeKindTag::SplitGroup | NodeKindTag::Camera => {}
            }
        }

        if n_new_lights > 0 {
            log::debug!(
                "Recompiling {} materials for {} lights",
                self.material_renderers.len(),
                self.light_layout.n_lights()
            );
            for (material_id, material_renderer) in &mut self.material_renderers {
                if let Err(error) = material_renderer.compile(&self.light_layout) {
                    log::warn!("Could not recompile material {material_id}: {error:#}");
                }
            }
            let material_renderers = &self.material_renderers;
            self.draw_order.resort(|material_id| {
                material_renderers
                    .get(&material_id)
                    .map(|material_renderer| material_renderer.program_id())
            });
        }
    }

    fn add_light(&mut self, light_id: NodeID) -> bool {
        let Some(light) = self.scene.node(light_id).as_light() else {
            return false;
        };
        match self.context.create_light_renderer(light_id, light) {
            Ok(light_renderer) => {
                self.light_layout = self.light_layout.with_light(light.kind());
                self.light_renderers.insert(light_id, light_renderer);
                true
            }
            Err(error) => {
                log::warn!("Could not set up light {light_id}: {error:#}");
                false
            }
        }
    }

    /// Moves pending models whose resources are ready into the draw order
    /// and drops those whose resources failed to load.
    ///
    /// # Returns
    /// The number of models added to the draw order.
    fn process_pending_models(&mut self) -> usize {
        let mut n_activated = 0;

        for model_id in std::mem::take(&mut self.pending_models) {
            let resources = match self.scene.model(model_id).map(|model| model.state()) {
                Ok(ModelState::Ready { geometry, material }) => {
                    (Arc::clone(geometry), Arc::clone(material))
                }
                Ok(ModelState::Loading { .. }) => {
                    self.pending_models.push(model_id);
                    continue;
                }
                Ok(ModelState::Failed) => {
                    log::warn!("Dropping model {model_id} since its resources failed to load");
                    continue;
                }
                Err(error) => {
                    log::warn!("Dropping pending model {model_id}: {error:#}");
                    continue;
                }
            };

            match self.activate_model(model_id, &resources.0, &resources.1) {
                Ok(()) => n_activated += 1,
                Err(error) => {
                    log::warn!("Dropping model {model_id}: {error:#}");
                }
            }
        }

        n_activated
    }

    /// Moves active models whose resources were replaced to the draw order
    /// position of their new material, setting up renderers for the new
    /// resources. Models not yet active are left to
    /// [`process_pending_models`](Self::process_pending_models).
    ///
    /// # Returns
    /// The number of models moved.
    fn process_reloaded_models(&mut self) -> usize {
        let mut n_reactivated = 0;

        for model_id in self.scene.take_reloaded_models() {
            if !self.draw_order.remove_node(model_id) {
                continue;
            }
            let resources = match self.scene.model(model_id).map(|model| model.state()) {
                Ok(ModelState::Ready { geometry, material }) => {
                    (Arc::clone(geometry), Arc::clone(material))
                }
                Ok(_) => continue,
                Err(error) => {
                    log::warn!("Dropping reloaded model {model_id}: {error:#}");
                    continue;
                }
            };

            match self.activate_model(model_id, &resources.0, &resources.1) {
                Ok(()) => n_reactivated += 1,
                Err(error) => {
                    log::warn!("Dropping model {model_id} after reload: {error:#}");
                }
            }
        }

        n_reactivated
    }

    fn activate_model(
        &mut self,
        model_id: NodeID,
        geometry: &Arc<Geometry>,
        material: &Arc<Material>,
    ) -> Result<()> {
        if !self.geometry_renderers.contains_key(&geometry.id()) {
            let geometry_renderer = self
                .context
                .create_geometry_renderer(geometry)
                .with_context(|| format!("Could not upload geometry {}", geometry.id()))?;
            self.geometry_renderers
                .insert(geometry.id(), geometry_renderer);
        }

        let program_id = match self.material_renderers.get(&material.id()) {
            Some(material_renderer) => material_renderer.program_id(),
            None => {
                let material_renderer = self
                    .context
                    .create_material_renderer(material, &self.light_layout)
                    .with_context(|| format!("Could not compile material {}", material.id()))?;
                let program_id = material_renderer.program_id();
                self.material_renderers
                    .insert(material.id(), material_renderer);
                program_id
            }
        };

        self.draw_order.insert(DrawKey {
            program_id,
            material_id: material.id(),
            node_id: model_id,
        });
        self.scene.mark_dirty(model_id)
    }

    fn update_lights(&mut self) {
        for (&light_id, light_renderer) in &mut self.light_renderers {
            let world_transform = *self.scene.world_transform(light_id);
            if let Some(light) = self.scene.node(light_id).as_light() {
                light_renderer.update(light, &world_transform);
            }
        }
    }

    fn draw_models(&mut self, statistics: &mut FrameStatistics) -> Result<()> {
        let camera = self.scene.camera(self.camera_id)?;
        let camera_matrix = *camera.camera_matrix();
        let camera_revision = camera.revision();
        let frame_uniforms = FrameUniforms::new(camera);

        let bind_geometry_buffers = !self.context.capabilities().vertex_array_objects;

        let mut bound_program_id = None;
        let mut prepared_material_id = None;

        for key in self.draw_order.iter() {
            if !self.visible_nodes.bit_is_set(key.node_id.idx()) {
                continue;
            }
            let Some((model, transform)) = self.scene.model_and_transform_mut(key.node_id) else {
                continue;
            };
            let (Some(geometry_renderer), Some(material_renderer)) = (
                model
                    .geometry()
                    .and_then(|geometry| self.geometry_renderers.get(&geometry.id())),
                self.material_renderers.get(&key.material_id),
            ) else {
                continue;
            };

            if model.mvp_needs_update(camera_revision) {
                model.update_mvp_matrix(
                    &camera_matrix,
                    camera_revision,
                    transform.world_transform(),
                );
                statistics.n_mvp_updates += 1;
            }

            if bound_program_id != Some(key.program_id) {
                self.context.bind_program(key.program_id);
                bound_program_id = Some(key.program_id);
                statistics.n_program_binds += 1;
            }

            if prepared_material_id != Some(key.material_id) {
                material_renderer.prepare_frame(&frame_uniforms);
                prepared_material_id = Some(key.material_id);
            }

            material_renderer.prepare_model(&ModelUniforms::new(
                model.mvp_matrix(),
                transform.world_transform(),
                transform.normal_matrix(),
            ));

            if bind_geometry_buffers {
                geometry_renderer.bind();
            }
            geometry_renderer.render();
            statistics.n_drawn_models += 1;
        }

        Ok(())
    }

    fn report_fps(&mut self, delta: Duration, elapsed: Duration) {
        if !self.config.show_fps || delta.is_zero() {
            return;
        }
        self.frame_duration_tracker.add_frame_duration(delta);
        if elapsed.saturating_sub(self.last_fps_report) >= Duration::from_secs(1) {
            log::info!(
                "{} FPS",
                frame_duration_to_fps(self.frame_duration_tracker.smooth_frame_duration())
            );
            self.last_fps_report = elapsed;
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        for geometry_renderer in self.geometry_renderers.values_mut() {
            geometry_renderer.destroy();
        }
        for material_renderer in self.material_renderers.values_mut() {
            material_renderer.destroy();
        }
        for light_renderer in self.light_renderers.values_mut() {
            light_renderer.destroy();
        }
    }
}

fn drawing_buffer_size(size: (u32, u32), pixel_ratio: f32, hidpi: bool) -> (u32, u32) {
    if hidpi {
        let scale = |extent: u32| (extent as f32 * pixel_ratio).round() as u32;
        (scale(size.0), scale(size.1))
    } else {
        size
    }
}
