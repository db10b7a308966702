//! Utility nodes

mod logger;

pub use logger::LoggerNode;
