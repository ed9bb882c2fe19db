//! Plugwise bridge library.
//!
//! Projects the devices of a Plugwise gateway into host entities (sensors,
//! binary sensors, switches and thermostats), keeps them in sync by polling,
//! and forwards user commands back to the gateway.

pub mod config;
pub mod coordinator;
pub mod entities;
pub mod error;
pub mod gateway;
pub mod publish;
pub mod setup;
