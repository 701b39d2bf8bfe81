//! Household Devices
//!
//! Builds a device table from the hub's area, device and entity registries
//! and lets automations select devices by area, name, kind or entity id
//! with wildcard patterns, then read or command the selection.
//!
//! ```text
//! home.devices().area("Bedroom").kind("light")   -> DeviceSet
//!     .turn_on(&attributes)                       -> POST services/light/turn_on (each)
//! ```

pub mod api;
pub mod device;
pub mod error;
pub mod home;
pub mod pattern;
pub mod registry;
pub mod set;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::HubApi;
pub use device::{build_devices, strip_area_prefix, Device, Field};
pub use error::{DeviceError, DeviceResult};
pub use home::Home;
pub use pattern::Pattern;
pub use registry::{AreaEntry, DeviceEntry, EntityEntry, RegistrySnapshot};
pub use set::DeviceSet;
