//! Event system for front-end decoupling.
//!
//! The controller reports lifecycle progress through a [`PlatformObserver`]
//! so a CLI or a test can follow along without hooking into tracing.

use std::fmt;
use std::sync::Mutex;

use crate::firmware::ArtifactKind;
use crate::state::PlatformState;

/// Lifecycle operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    Enable,
    Disable,
    Deinit,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Init => write!(f, "init"),
            Operation::Enable => write!(f, "enable"),
            Operation::Disable => write!(f, "disable"),
            Operation::Deinit => write!(f, "deinit"),
        }
    }
}

/// Events emitted by the platform controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    StateChanged {
        from: PlatformState,
        to: PlatformState,
    },
    /// Artifact handed to the bus.
    FirmwareLoaded {
        kind: ArtifactKind,
        name: String,
        size: usize,
    },
    /// Optional artifact missing from the store.
    FirmwareSkipped { kind: ArtifactKind, name: String },
    SnapshotCaptured { registers: usize },
    SnapshotRestored { registers: usize },
    /// Transport rolled back after a failed enable.
    RolledBack { message: String },
    /// Teardown skipped because the device is already gone.
    TeardownSkipped,
    Error {
        operation: Operation,
        message: String,
    },
}

/// Observer trait for receiving platform events.
pub trait PlatformObserver: Send + Sync {
    fn on_event(&self, event: &PlatformEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl PlatformObserver for NullObserver {
    fn on_event(&self, _event: &PlatformEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl PlatformObserver for TracingObserver {
    fn on_event(&self, event: &PlatformEvent) {
        match event {
            PlatformEvent::StateChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "State changed");
            }
            PlatformEvent::FirmwareLoaded { kind, name, size } => {
                tracing::info!(kind = %kind, name = %name, size, "Firmware loaded");
            }
            PlatformEvent::FirmwareSkipped { kind, name } => {
                tracing::debug!(kind = %kind, name = %name, "Optional firmware not present");
            }
            PlatformEvent::SnapshotCaptured { registers } => {
                tracing::debug!(registers, "Config snapshot captured");
            }
            PlatformEvent::SnapshotRestored { registers } => {
                tracing::debug!(registers, "Config snapshot restored");
            }
            PlatformEvent::RolledBack { message } => {
                tracing::warn!("Enable rolled back: {}", message);
            }
            PlatformEvent::TeardownSkipped => {
                tracing::warn!("Device disconnected, skipping teardown");
            }
            PlatformEvent::Error { operation, message } => {
                tracing::error!(operation = %operation, "Error: {}", message);
            }
        }
    }
}

/// Observer that keeps every event, for tests and post-mortem dumps.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PlatformEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlatformEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl PlatformObserver for RecordingObserver {
    fn on_event(&self, event: &PlatformEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
