pub mod asset;
pub mod config;
pub mod editor;
pub mod export;
pub mod render;
pub mod scene;
pub mod viewer;
