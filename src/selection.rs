use crate::registry::{Entry, Registry};

/// Single-slot holder for the entry the play action targets.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    current: Option<Entry>,
}

impl Selection {
    /// Points the slot at the registry entry keyed by `identifier`, or clears
    /// it when nothing matches. Returns whether a match was found.
    pub fn select(&mut self, registry: &Registry, identifier: &str) -> bool {
        self.current = registry.find(identifier).cloned();
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Entry> {
        self.current.as_ref()
    }

    pub fn is_some(&self) -> bool {
        self.current.is_some()
    }
}
