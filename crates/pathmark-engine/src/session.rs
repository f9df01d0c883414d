use pathmark_common::protocol::{CaptureState, TabId};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Inactive,
    Active {
        tab_id: TabId,
    },
}

/// What a call on [`CaptureSession`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Activated { tab_id: TabId },
    /// Capture moved to another tab; the previous binding was dropped.
    Rebound { from: TabId, to: TabId },
    Deactivated { tab_id: TabId },
}

impl Transition {
    /// Tab that stopped capturing as a result of this transition.
    pub fn disabled_tab(&self) -> Option<TabId> {
        match self {
            Transition::Deactivated { tab_id } => Some(*tab_id),
            Transition::Rebound { from, .. } => Some(*from),
            _ => None,
        }
    }
}

/// Whether capture is on, and for which tab. At most one tab is bound.
#[derive(Debug, Default)]
pub struct CaptureSession {
    state: SessionState,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    pub fn bound_tab(&self) -> Option<TabId> {
        match self.state {
            SessionState::Active { tab_id } => Some(tab_id),
            SessionState::Inactive => None,
        }
    }

    pub fn snapshot(&self) -> CaptureState {
        CaptureState {
            enabled: self.is_active(),
            tab_id: self.bound_tab(),
        }
    }

    pub fn toggle(&mut self, enabled: bool, tab_id: TabId) -> Transition {
        let transition = match (self.state, enabled) {
            (SessionState::Inactive, false) => Transition::Unchanged,
            (SessionState::Inactive, true) => Transition::Activated { tab_id },
            (SessionState::Active { tab_id: bound }, true) if bound == tab_id => {
                Transition::Unchanged
            }
            (SessionState::Active { tab_id: bound }, true) => {
                warn!(from = bound, to = tab_id, "Capture already bound to another tab, rebinding");
                Transition::Rebound {
                    from: bound,
                    to: tab_id,
                }
            }
            (SessionState::Active { tab_id: bound }, false) => {
                Transition::Deactivated { tab_id: bound }
            }
        };
        self.apply(transition);
        transition
    }

    /// A URL change on the bound tab switches capture off.
    pub fn on_navigation(&mut self, tab_id: TabId) -> Transition {
        let transition = match self.state {
            SessionState::Active { tab_id: bound } if bound == tab_id => {
                Transition::Deactivated { tab_id }
            }
            _ => Transition::Unchanged,
        };
        self.apply(transition);
        transition
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Unchanged => {}
            Transition::Activated { tab_id } | Transition::Rebound { to: tab_id, .. } => {
                info!(tab_id, "Capture enabled");
                self.state = SessionState::Active { tab_id };
            }
            Transition::Deactivated { tab_id } => {
                info!(tab_id, "Capture disabled");
                self.state = SessionState::Inactive;
            }
        }
    }
}
