//! Platform adapters implementing the port traits on `embedded-hal` pins.

pub mod gpio;
