//! Input nodes
//!
//! Nodes that accept user input or external data.

mod media_input;
mod text_input;

pub use media_input::{AudioInputNode, FileInputNode, ImageInputNode};
pub use text_input::TextInputNode;
