//! Connection target descriptors

mod target;

pub use target::{build_target, ConnectionTarget, TransportType, DRIVER};
