//! Render pipelines.

pub mod unlit;
