//! Finds printers advertising their factory-default name over mDNS and
//! renames them through their admin web UI.

pub mod bus;
pub mod config;
pub mod mdns;
pub mod registry;
pub mod session;
pub mod workflow;
