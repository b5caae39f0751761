// src/config/mod.rs
mod app;

pub use app::*;
