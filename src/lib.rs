//! ESP-NOW bridge light.
//!
//! A Matter color temperature light that also acts as a bridge: ESP-NOW remote
//! switches show up as bridged endpoints under an aggregator and can drive the
//! light.

pub mod app;
pub mod bridge;
pub mod commissioning;
pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod matter;
pub mod persist;
