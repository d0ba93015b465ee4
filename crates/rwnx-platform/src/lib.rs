//! RWNX platform layer for AIC8800-family wireless devices.
//!
//! Brings the embedded baseband from powered-off to running, exposes its
//! CPU and SYSTEM address spaces to upper driver layers, and resolves the
//! transmit power tables that keep the radio within regulatory limits.
//!
//! # Architecture
//!
//! - **Address**: pure `(space, offset)` to bus address translation
//! - **Firmware**: artifact naming per mode/build, presence validation
//! - **Snapshot**: config registers preserved across disable/enable
//! - **Userconfig**: versioned transmit power and calibration tables
//! - **Regulatory**: country code to region, power-limit lookup
//! - **Platform**: lifecycle controller over a `BusTransport`
//! - **Events**: observer pattern for front-end decoupling
//!
//! # Example
//!
//! ```no_run
//! use rwnx_platform::firmware::DirectoryStore;
//! use rwnx_platform::platform::{FirmwareSelection, PlatformController};
//! use rwnx_platform::transport::MockBus;
//!
//! let store = DirectoryStore::new("/lib/firmware/aic8800");
//! let mut platform =
//!     PlatformController::init(MockBus::new(), store, FirmwareSelection::default())
//!         .expect("probe failed");
//! platform.enable().expect("bring-up failed");
//! ```

pub mod address;
pub mod config;
pub mod events;
pub mod firmware;
pub mod platform;
pub mod regulatory;
pub mod snapshot;
pub mod state;
pub mod transport;
pub mod userconfig;

// Re-exports for convenience
pub use address::{Address, AddressMap, AddressSpace, Region, TranslateError, translate};
pub use config::PlatformConfig;
pub use events::{NullObserver, PlatformEvent, PlatformObserver, TracingObserver};
pub use firmware::{
    BuildVariant, DirectoryStore, FirmwareArtifact, FirmwareMode, FirmwareStore, MemoryStore,
};
pub use platform::{FirmwareSelection, PlatformController, PlatformError};
pub use regulatory::{
    Band, Bandwidth, POWER_LEVEL_INVALID_VAL, PowerLimit, PowerLimitTable, RegionCode, region_for,
};
pub use snapshot::{ConfigRegisterList, ConfigSnapshot};
pub use state::PlatformState;
pub use transport::{BusCapabilities, BusKind, BusTransport, MockBus, TransportError};
pub use userconfig::{ParseReport, UserConfig};
