//! Input abstraction layer.
//!
//! The browser bridge resolves every DOM event to the flowchart element it
//! landed on and hands the editor a normalized `InputEvent`. Nothing here
//! knows about the DOM.

use flowpad_core::NodeId;

/// Modifier keys held during an input event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };
}

/// What an event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    /// An edge label, by scan index of the edge.
    EdgeLabel(usize),
    /// Anywhere that is not a node, edge label, panel or menu.
    Background,
}

/// A normalized input event. Coordinates are client pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Click { target: Target },
    DoubleClick { target: Target },
    PointerDown { target: Target, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    ContextMenu { target: Target, x: f64, y: f64 },
    Key { key: String, modifiers: Modifiers },
}

impl InputEvent {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key {
            key: key.into(),
            modifiers: Modifiers::NONE,
        }
    }
}
