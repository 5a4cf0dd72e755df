#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    IdleNoSelection,
    IdleSelected,
    Launching,
}

/// Decides whether the play action is currently permitted.
#[derive(Debug, Clone, Copy)]
pub struct PlayGate {
    state: GateState,
}

impl Default for PlayGate {
    fn default() -> Self {
        Self {
            state: GateState::IdleNoSelection,
        }
    }
}

impl PlayGate {
    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == GateState::IdleSelected
    }

    pub fn is_launching(&self) -> bool {
        self.state == GateState::Launching
    }

    /// Re-evaluates after a selection change. A launch in flight keeps the
    /// gate closed until it settles.
    pub fn on_selection(&mut self, has_selection: bool) {
        if self.state == GateState::Launching {
            return;
        }
        self.state = idle_state(has_selection);
    }

    /// Attempts to move into `Launching`. Returns false, leaving the state
    /// untouched, when the gate is closed.
    pub fn begin_launch(&mut self, has_selection: bool) -> bool {
        match self.state {
            GateState::IdleSelected if has_selection => {
                self.state = GateState::Launching;
                true
            }
            GateState::IdleSelected => {
                self.state = GateState::IdleNoSelection;
                false
            }
            GateState::IdleNoSelection | GateState::Launching => false,
        }
    }

    /// The launch call returned, whatever its outcome.
    pub fn settle(&mut self, has_selection: bool) {
        self.state = idle_state(has_selection);
    }
}

fn idle_state(has_selection: bool) -> GateState {
    if has_selection {
        GateState::IdleSelected
    } else {
        GateState::IdleNoSelection
    }
}
