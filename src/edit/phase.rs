#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditPhase {
    Idle,
    Validating,
    Dispatching,
    Succeeded,
    Failed,
}

impl EditPhase {
    pub fn can_transition_to(self, next: Self) -> bool {
        use EditPhase::{Dispatching, Failed, Idle, Succeeded, Validating};

        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Dispatching)
                | (Validating, Failed)
                | (Dispatching, Succeeded)
                | (Dispatching, Failed)
                | (Succeeded, Idle)
                | (Failed, Idle)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Dispatching => "dispatching",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}
