mod address;
mod entity;

pub use address::DeviceAddress;
pub use entity::{BondState, Device};
