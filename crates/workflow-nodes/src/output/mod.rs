//! Output nodes
//!
//! Nodes that display results. Their executors echo what arrives so the
//! value lands in the node's execution state for rendering.

mod image_output;
mod text_output;

pub use image_output::ImageOutputNode;
pub use text_output::TextOutputNode;
