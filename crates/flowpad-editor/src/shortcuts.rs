//! Keyboard shortcut mapping.
//!
//! Maps `KeyboardEvent.key` values to semantic actions. Only three keys are
//! bound, all without modifiers; `⌘`/Ctrl combinations are left to the
//! browser so copy, paste and undo keep working in the text box.

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    /// Clear the selection and leave connect mode.
    Cancel,
    DeleteSelected,
    RenameSelected,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action, or `None` if the combo is unbound.
    pub fn resolve(key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> Option<ShortcutAction> {
        if ctrl || meta || alt {
            return None;
        }
        match key {
            "Escape" => Some(ShortcutAction::Cancel),
            "Delete" => Some(ShortcutAction::DeleteSelected),
            "Enter" if !shift => Some(ShortcutAction::RenameSelected),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_bound_keys() {
        assert_eq!(
            ShortcutMap::resolve("Escape", false, false, false, false),
            Some(ShortcutAction::Cancel)
        );
        assert_eq!(
            ShortcutMap::resolve("Delete", false, false, false, false),
            Some(ShortcutAction::DeleteSelected)
        );
        assert_eq!(
            ShortcutMap::resolve("Enter", false, false, false, false),
            Some(ShortcutAction::RenameSelected)
        );
    }

    #[test]
    fn backspace_is_not_delete() {
        // Backspace stays with text inputs
        assert_eq!(ShortcutMap::resolve("Backspace", false, false, false, false), None);
    }

    #[test]
    fn modifier_combos_are_unbound() {
        assert_eq!(ShortcutMap::resolve("Delete", true, false, false, false), None);
        assert_eq!(ShortcutMap::resolve("Escape", false, false, false, true), None);
        assert_eq!(ShortcutMap::resolve("Enter", false, true, false, false), None);
        assert_eq!(ShortcutMap::resolve("Enter", false, false, true, false), None);
    }

    #[test]
    fn unbound_keys() {
        assert_eq!(ShortcutMap::resolve("a", false, false, false, false), None);
        assert_eq!(ShortcutMap::resolve("Tab", false, false, false, false), None);
    }
}
