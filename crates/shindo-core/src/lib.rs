//! Hardware-independent core library for shindo-rs
//!
//! This crate contains all platform-agnostic logic for the shindo seismic
//! intensity watcher: the bounded feed fetcher, the GIF scanline decode
//! contract and collaborator, the two scanline rasterizers, the pixel
//! surfaces, and the poll/display state machine.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod buffer;
pub mod config;
pub mod decode;
pub mod feed;
pub mod fetch;
pub mod palette;
pub mod raster;
pub mod surface;
pub mod watcher;
