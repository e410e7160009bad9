pub mod editor;
pub mod export;
pub mod input;
pub mod interaction;
pub mod panel;
pub mod render;
pub mod shortcuts;
pub mod storage;
pub mod sync;

pub use editor::{Editor, Outcome, RenderRequest};
