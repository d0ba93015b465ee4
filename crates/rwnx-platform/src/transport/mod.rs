//! Transport layer module.

pub mod mock;
pub mod traits;

pub use mock::{BusOp, MockBus};
pub use traits::{BusCapabilities, BusKind, BusTransport, TransportError};
