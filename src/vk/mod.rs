//! The Vulkan abstraction layer (spec §1.2): host/GPU allocation bridges,
//! instance/device/swapchain lifecycle, and a typed resource inventory.

pub mod device;
pub mod gpu_alloc;
pub mod host_alloc;
pub mod instance;
pub mod inventory;
pub mod pipeline;
pub mod swapchain;

pub use host_alloc::HostAllocBridge;
pub use instance::{InstanceContext, PhysicalDeviceChoice, VulkanInit};
pub use inventory::Inventory;
