//! The `Window` collaborator (spec §6 "Consumed collaborator interfaces").
//!
//! `vkforge` never creates a window, polls OS events, or links against a
//! windowing crate itself (spec §1 Non-goals) — it depends only on this
//! trait. An application wires up a concrete implementation (e.g. over
//! `winit`) and hands `&dyn Window` to `vk::instance` and the frame
//! scheduler.

use vulkanalia::vk;
use vulkanalia::Instance;

use crate::Result;

bitflags::bitflags! {
    /// Window creation flags (spec §6 "Window init" `win_flags`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct WindowFlags: u32 {
        const FULLSCREEN    = 1 << 0;
        const RESIZABLE     = 1 << 1;
        const DECORATED     = 1 << 2;
        const HIDDEN        = 1 << 3;
        const MAXIMIZED     = 1 << 4;
        const ALWAYS_ON_TOP = 1 << 5;
        const ALLOW_HIGHDPI = 1 << 6;
        const VULKAN        = 1 << 7;
    }
}

#[derive(Clone, Debug)]
pub struct WindowInit {
    pub flags: WindowFlags,
    pub resolution: (u32, u32),
    pub title: String,
}

/// The window/surface collaborator. Implementations are expected to be
/// cheap to call every frame (`pixel_size`, `should_close`,
/// `framebuffer_resized_this_frame`) since the frame loop polls them once
/// per tick (spec §4.I S0, §4.M step (iv)).
pub trait Window {
    fn pixel_size(&self) -> (u32, u32);
    fn screen_size(&self) -> (u32, u32);
    fn should_close(&self) -> bool;

    /// Whether a framebuffer-resize event was observed since the last call.
    /// Calling this resets the flag (it is a per-tick edge, not a level).
    fn framebuffer_resized_this_frame(&self) -> bool;

    /// Vulkan instance extensions required to create a surface on this
    /// window system (e.g. `VK_KHR_win32_surface`).
    fn required_instance_extensions(&self) -> Vec<vk::ExtensionName>;

    /// Creates a `VkSurfaceKHR` for this window against `instance`.
    fn create_vulkan_surface(&self, instance: &Instance) -> Result<vk::SurfaceKHR>;
}
