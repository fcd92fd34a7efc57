//! YOLOv8 object detection behind a small HTTP service, plus the client
//! used to talk to it.
//!
//! The pieces compose left to right: [`detector`] wraps ONNXRuntime
//! inference, [`registry`] caches one detector per model variant,
//! [`annotate`] draws the results, and [`server`] wires them into HTTP
//! endpoints. [`client`] is the other side of that wire.

pub mod annotate;
pub mod client;
pub mod common;
pub mod config;
pub mod detector;
pub mod registry;
pub mod server;
