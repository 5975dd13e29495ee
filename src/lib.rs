//! `vkforge` — arena memory, a Vulkan device/resource abstraction, a
//! frames-in-flight renderer, and an input-mapping pipeline for realtime
//! interactive applications.
//!
//! This crate is the core of a larger application framework. It does not
//! create windows, poll OS events, load models, or parse shaders from disk
//! on its own — those are external collaborators (see [`window::Window`])
//! that feed already-decoded data into the types here.

#![allow(clippy::too_many_arguments)]

pub mod context;
pub mod error;
pub mod input;
pub mod mem;
pub mod renderer;
pub mod vk;
pub mod window;

pub use context::Context;
pub use error::Error;

/// Crate-wide `Result` alias: every fallible entry point, at every layer,
/// returns through this single type.
pub type Result<T> = std::result::Result<T, Error>;
