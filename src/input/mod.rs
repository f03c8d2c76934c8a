//! Input layer: loaders for the device list and the network topology.
//!
//! Loaders own all validation of the persisted formats. The compiler downstream assumes
//! well-formed values and only rejects ones that cannot produce a class hierarchy.

pub mod devices;
pub mod network;

pub use devices::{Device, UNPARENTED, load_devices, parse_devices};
pub use network::{NetworkNode, Topology, load_network};
