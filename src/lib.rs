//! Scene graph with dirty-tracked transforms, frustum culling and a
//! draw-order maintaining renderer.

#[macro_use]
mod macros;

pub mod game_loop;
pub mod geometry;
pub mod io;
pub mod rendering;
pub mod scene;
