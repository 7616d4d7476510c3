use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nalgebra::{point, vector};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};
use tribus::{
    game_loop::{GameLoop, GameLoopConfig},
    geometry::fre,
    io,
    rendering::{HeadlessCanvas, Renderer, RendererConfig, TICK_EVENT},
    scene::{Geometry, LightKind, Material, NodeID, Projection, Scene},
};

#[derive(Debug, Parser)]
#[command(about = "Headless renderer for grid scenes of cubes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a grid scene on a recording context and report draw statistics
    Run {
        /// Path to RON configuration file to use
        #[arg(short, long)]
        config_path: Option<PathBuf>,
        /// Number of frames to render
        #[arg(short = 'n', long, default_value_t = 120)]
        frames: u64,
        /// Number of cubes along each horizontal axis, overriding the config
        #[arg(short, long)]
        grid_size: Option<u32>,
    },
    /// Write the default configuration to a RON file
    WriteConfig {
        /// Path of the RON file to write
        #[arg(short, long)]
        output_path: PathBuf,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    renderer: RendererConfig,
    game_loop: GameLoopConfig,
    scene: GridSceneConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct GridSceneConfig {
    grid_size: u32,
    spacing: fre,
    split_size: usize,
    n_materials: u32,
    camera_height: fre,
    camera_distance: fre,
    vertical_fov_degrees: fre,
    /// Rotation speed of the camera around the grid in radians per second.
    orbit_speed: fre,
    canvas_size: (u32, u32),
}

#[derive(Debug, Default)]
struct RunSummary {
    n_frames: u64,
    n_drawn_frames: u64,
    n_drawn_models: usize,
    n_tested_nodes: usize,
    n_plane_tests: u64,
    n_program_binds: usize,
    n_gpu_commands: usize,
}

impl Default for GridSceneConfig {
    fn default() -> Self {
        Self {
            grid_size: 32,
            spacing: 2.0,
            split_size: 16,
            n_materials: 4,
            camera_height: 20.0,
            camera_distance: 60.0,
            vertical_fov_degrees: 60.0,
            orbit_speed: 0.5,
            canvas_size: (1280, 720),
        }
    }
}

impl AppConfig {
    fn from_ron_file(file_path: impl AsRef<Path>) -> Result<Self> {
        io::parse_ron_file(file_path)
    }
}

/// Builds the grid scene and returns it with the ID of its camera. The cube
/// geometry is delivered from a separate thread, so the models start out
/// loading.
fn build_grid_scene(config: &GridSceneConfig) -> Result<(Scene, NodeID)> {
    let mut scene = Scene::with_root_split_size(config.split_size);
    let root_id = scene.root_id();

    let rig_id = scene.create_group_node(root_id)?;
    let camera_id = scene.create_camera_node(
        rig_id,
        Projection::perspective(config.vertical_fov_degrees, 1.0, 0.1, 1000.0)?,
    )?;
    let camera_transform = scene.transform_mut(camera_id)?;
    camera_transform.set_position(point![0.0, config.camera_height, config.camera_distance]);
    camera_transform.rotate_x(-config.camera_height.atan2(config.camera_distance));

    let orbit_speed = config.orbit_speed;
    scene.on(root_id, TICK_EVENT, move |scene, event| {
        if let Ok(rig_transform) = scene.transform_mut(rig_id) {
            rig_transform.rotate_y(orbit_speed * event.payload[0]);
        }
    })?;

    let sun_id =
        scene.create_light_node(root_id, LightKind::Directional, [1.0; 3], [1.0; 3])?;
    scene.transform_mut(sun_id)?.rotate_x(-1.0);

    let materials: Vec<_> = (0..config.n_materials.max(1))
        .map(|idx| {
            let shade = (idx + 1) as f32 / config.n_materials.max(1) as f32;
            Arc::new(Material::with_static_color([shade, 0.5, 1.0 - shade, 1.0]))
        })
        .collect();

    let grid_id = scene.create_group_node_with_split_size(root_id, config.split_size)?;
    let offset = 0.5 * (config.grid_size.saturating_sub(1)) as fre * config.spacing;
    let mut model_ids = Vec::new();
    for i in 0..config.grid_size {
        for j in 0..config.grid_size {
            let material = &materials[((i + j) as usize) % materials.len()];
            let model_id = scene.create_model_node(grid_id, None, Some(Arc::clone(material)))?;
            scene.transform_mut(model_id)?.translate(&vector![
                i as fre * config.spacing - offset,
                0.0,
                j as fre * config.spacing - offset
            ]);
            model_ids.push(model_id);
        }
    }

    let load_sender = scene.load_sender();
    thread::spawn(move || {
        let geometry = Arc::new(Geometry::cube(1.0));
        for model_id in model_ids {
            if let Err(error) = load_sender.geometry_loaded(model_id, Arc::clone(&geometry)) {
                log::warn!("Stopped delivering geometry: {error:#}");
                break;
            }
        }
    });

    Ok((scene, camera_id))
}

fn run(config: AppConfig, n_frames: u64) -> Result<RunSummary> {
    let (width, height) = config.scene.canvas_size;
    let (scene, camera_id) = build_grid_scene(&config.scene)?;

    let canvas = HeadlessCanvas::new(width, height);
    let command_log = canvas.command_log();
    let mut renderer = Renderer::new(scene, camera_id, Box::new(canvas), config.renderer)?;
    let mut game_loop = GameLoop::new(config.game_loop);

    let mut summary = RunSummary::default();
    for _ in 0..n_frames {
        let statistics = game_loop.perform_iteration(&mut renderer)?;

        summary.n_frames += 1;
        if statistics.drawn {
            summary.n_drawn_frames += 1;
        }
        summary.n_drawn_models += statistics.n_drawn_models;
        summary.n_tested_nodes += statistics.n_tested_nodes;
        summary.n_plane_tests += statistics.n_plane_tests;
        summary.n_program_binds += statistics.n_program_binds;
        summary.n_gpu_commands += command_log.n_commands();
        command_log.clear();
    }

    log::info!(
        "Rendered {} frames at ~{} FPS with {} nodes in the scene",
        summary.n_frames,
        game_loop.smooth_fps(),
        renderer.scene().n_nodes()
    );

    Ok(summary)
}

fn report(summary: &RunSummary) {
    let per_drawn_frame = |count: usize| {
        if summary.n_drawn_frames == 0 {
            0.0
        } else {
            count as f64 / summary.n_drawn_frames as f64
        }
    };
    println!(
        "frames: {} ({} drawn)",
        summary.n_frames, summary.n_drawn_frames
    );
    println!(
        "models drawn per frame: {:.1}",
        per_drawn_frame(summary.n_drawn_models)
    );
    println!(
        "nodes tested per frame: {:.1}",
        per_drawn_frame(summary.n_tested_nodes)
    );
    println!(
        "plane tests per frame: {:.1}",
        summary.n_plane_tests as f64 / summary.n_drawn_frames.max(1) as f64
    );
    println!(
        "program binds per frame: {:.1}",
        per_drawn_frame(summary.n_program_binds)
    );
    println!(
        "GPU commands per frame: {:.1}",
        per_drawn_frame(summary.n_gpu_commands)
    );
}

pub fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config_path,
            frames,
            grid_size,
        } => {
            let mut config = match config_path {
                Some(config_path) => AppConfig::from_ron_file(&config_path).with_context(|| {
                    format!("Failed to load configuration from {}", config_path.display())
                })?,
                None => AppConfig::default(),
            };
            if let Some(grid_size) = grid_size {
                config.scene.grid_size = grid_size;
            }
            let summary = run(config, frames)?;
            report(&summary);
        }
        Command::WriteConfig { output_path } => {
            io::write_ron_file(&AppConfig::default(), &output_path)?;
            log::info!("Wrote default configuration to {}", output_path.display());
        }
    }
    Ok(())
}
