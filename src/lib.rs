pub mod application;
pub mod camera;
pub mod config;
pub mod error;
pub mod field;
pub mod input;
pub mod loader;
pub mod mesh;
pub mod renderer;
pub mod scene;
pub mod update;
pub mod util;
