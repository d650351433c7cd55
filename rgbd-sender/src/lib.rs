//! # rgbd-sender: RGB-D capture sender
//!
//! Pulls frames from a capture source, throttles them to the configured
//! send rate, compresses color (JPEG) and depth (PNG16 / JPEG8 / RAW16)
//! on a blocking worker, and streams both to a receiver through a
//! [`FrameStreamer`](rgbd_core::FrameStreamer).
//!
//! ## Modes
//!
//! - **Run**: connect to the configured receiver and stream until Ctrl-C
//!   or until the connection fails.
//! - **Remember**: persist `--host` / `--port` overrides to the config file.
//! - **Gen-config**: print the default configuration.

pub mod config;
pub mod service;
pub mod source;
