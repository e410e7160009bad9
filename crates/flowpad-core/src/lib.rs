pub mod color;
pub mod config;
pub mod edit;
pub mod element;
pub mod id;
pub mod model;
pub mod scan;

pub use color::Rgba;
pub use config::{DEFAULT_SOURCE, EditorConfig, ExportSize, FlowchartOptions, MermaidConfig};
pub use id::NodeId;
pub use model::*;
pub use scan::scan;
