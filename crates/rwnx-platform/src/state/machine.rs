//! Lifecycle state machine for the platform controller.

use std::fmt;

/// Lifecycle state of a platform handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformState {
    /// No handle yet.
    #[default]
    Uninitialized,
    /// Probed, nothing running.
    Initialized,
    /// Firmware loaded, transfers and interrupts running.
    Enabled,
    /// Stopped after having been enabled; snapshot pending.
    Disabled,
    /// Resources released. Terminal.
    Deinitialized,
}

impl fmt::Display for PlatformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformState::Uninitialized => write!(f, "UNINITIALIZED"),
            PlatformState::Initialized => write!(f, "INITIALIZED"),
            PlatformState::Enabled => write!(f, "ENABLED"),
            PlatformState::Disabled => write!(f, "DISABLED"),
            PlatformState::Deinitialized => write!(f, "DEINITIALIZED"),
        }
    }
}

impl PlatformState {
    pub fn can_transition_to(&self, to: PlatformState) -> bool {
        use PlatformState::*;
        matches!(
            (self, to),
            (Uninitialized, Initialized)
                | (Initialized, Enabled)
                | (Enabled, Disabled)
                | (Disabled, Enabled)
                | (Initialized, Deinitialized)
                | (Disabled, Deinitialized)
        )
    }

    /// States `enable` may start from and `disable`/rollback rest in.
    pub fn is_resting(&self) -> bool {
        matches!(self, PlatformState::Initialized | PlatformState::Disabled)
    }

    pub fn is_terminal(&self) -> bool {
        *self == PlatformState::Deinitialized
    }
}

/// Attempted transition not in the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRejected {
    pub from: PlatformState,
    pub to: PlatformState,
}

/// Current state plus the flags that travel with it.
#[derive(Debug, Default)]
pub struct LifecycleContext {
    state: PlatformState,
    /// Bus reported a surprise removal; teardown must not touch hardware.
    pub wait_disconnect: bool,
}

impl LifecycleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlatformState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == PlatformState::Enabled
    }

    /// Check a transition without performing it.
    pub fn check(&self, to: PlatformState) -> Result<(), TransitionRejected> {
        if self.state.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionRejected {
                from: self.state,
                to,
            })
        }
    }

    /// Transition to a new state.
    pub fn goto_state(&mut self, to: PlatformState) -> Result<(), TransitionRejected> {
        self.check(to)?;
        tracing::info!(from = %self.state, to = %to, "State transition");
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_path() {
        let mut ctx = LifecycleContext::new();
        assert_eq!(ctx.state(), PlatformState::Uninitialized);
        ctx.goto_state(PlatformState::Initialized).unwrap();
        ctx.goto_state(PlatformState::Enabled).unwrap();
        assert!(ctx.is_enabled());
        ctx.goto_state(PlatformState::Disabled).unwrap();
        ctx.goto_state(PlatformState::Enabled).unwrap();
        ctx.goto_state(PlatformState::Disabled).unwrap();
        ctx.goto_state(PlatformState::Deinitialized).unwrap();
        assert!(ctx.state().is_terminal());
    }

    #[test]
    fn test_rejected_transitions_leave_state() {
        let mut ctx = LifecycleContext::new();
        assert!(ctx.goto_state(PlatformState::Enabled).is_err());
        ctx.goto_state(PlatformState::Initialized).unwrap();
        ctx.goto_state(PlatformState::Enabled).unwrap();

        let err = ctx.goto_state(PlatformState::Deinitialized).unwrap_err();
        assert_eq!(err.from, PlatformState::Enabled);
        assert_eq!(err.to, PlatformState::Deinitialized);
        assert_eq!(ctx.state(), PlatformState::Enabled);
        assert!(ctx.goto_state(PlatformState::Enabled).is_err());
    }

    #[test]
    fn test_deinitialized_is_terminal() {
        use PlatformState::*;
        for to in [Uninitialized, Initialized, Enabled, Disabled, Deinitialized] {
            assert!(!Deinitialized.can_transition_to(to));
        }
        assert!(Initialized.can_transition_to(Deinitialized));
        assert!(Initialized.is_resting() && Disabled.is_resting());
        assert!(!Enabled.is_resting());
    }
}
