//! Logical device, queues, and command pools (spec §4.F).

use std::collections::HashMap;

use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};
use vulkanalia::{Device, Instance};

use crate::error::VulkanInitError;
use crate::vk::gpu_alloc::{DeviceMemoryHandle, GpuAllocBridge};
use crate::vk::host_alloc::HostAllocBridge;
use crate::vk::instance::{PhysicalDeviceChoice, QueueFamilyInfo, QueueFamilyType};
use crate::Result;

pub struct FamilyPools {
    pub default_pool: vk::CommandPool,
    pub transient_pool: vk::CommandPool,
}

pub struct DeviceContext {
    pub device: Device,
    pub queues: HashMap<QueueFamilyType, Vec<vk::Queue>>,
    pub pools: HashMap<u32, FamilyPools>,
    pub gpu_alloc: GpuAllocBridge,
}

/// Creates the logical device with one `VkDeviceQueueCreateInfo` per
/// distinct `create_index` (spec §4.F "one queue-create-info per distinct
/// createIndex; requested counts sum within a family").
pub fn create_device(
    instance: &Instance,
    choice: &PhysicalDeviceChoice,
    device_extensions: &[vk::ExtensionName],
    host_alloc: &HostAllocBridge,
) -> Result<DeviceContext> {
    let mut by_create_index: HashMap<u32, (u32, u32)> = HashMap::new();
    for info in choice.queue_families.values() {
        let entry = by_create_index.entry(info.create_index).or_insert((info.index, 0));
        entry.1 += info.requested_count;
    }

    let priorities = vec![1.0f32; by_create_index.values().map(|(_, c)| *c).max().unwrap_or(1) as usize];
    let queue_infos: Vec<_> = by_create_index
        .values()
        .map(|(family_index, count)| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(*family_index)
                .queue_priorities(&priorities[..*count as usize])
        })
        .collect();

    let extension_ptrs: Vec<*const i8> = device_extensions.iter().map(|e| e.as_ptr()).collect();
    let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(choice.features.sampler_anisotropy == vk::TRUE);

    let info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_ptrs)
        .enabled_features(&features);

    let vk_callbacks = host_alloc.as_vk_callbacks();
    let device = unsafe { instance.create_device(choice.physical_device, &info, Some(&vk_callbacks)) }
        .map_err(|e| VulkanInitError::CreateDevice(e.to_string()))?;

    // Retrieve `requested_count` queues per type, offsetting within a
    // shared family so merged types don't hand back the same queue twice
    // (spec §4.F "offsetting queue indices when two types share a family").
    let mut next_offset_in_family: HashMap<u32, u32> = HashMap::new();
    let mut queues: HashMap<QueueFamilyType, Vec<vk::Queue>> = HashMap::new();
    for (&ty, info) in &choice.queue_families {
        let offset = next_offset_in_family.entry(info.index).or_insert(0);
        let mut handles = Vec::with_capacity(info.requested_count as usize);
        for i in 0..info.requested_count {
            let queue_index = (*offset + i).min(info.available_count - 1);
            handles.push(unsafe { device.get_device_queue(info.index, queue_index) });
        }
        *offset += info.requested_count;
        queues.insert(ty, handles);
    }

    let mut pools = HashMap::new();
    let mut seen_families: HashMap<u32, QueueFamilyInfo> = HashMap::new();
    for info in choice.queue_families.values() {
        seen_families.entry(info.index).or_insert(*info);
    }
    for info in seen_families.values() {
        let default_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(info.index);
        let transient_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(info.index);

        let default_pool = unsafe { device.create_command_pool(&default_info, Some(&vk_callbacks)) }
            .map_err(|e| VulkanInitError::CreateDevice(e.to_string()))?;
        let transient_pool = unsafe { device.create_command_pool(&transient_info, Some(&vk_callbacks)) }
            .map_err(|e| VulkanInitError::CreateDevice(e.to_string()))?;
        pools.insert(info.index, FamilyPools { default_pool, transient_pool });
    }

    let gpu_alloc = GpuAllocBridge::new(instance, choice.physical_device)?;

    Ok(DeviceContext { device, queues, pools, gpu_alloc })
}

impl DeviceContext {
    /// Releases command pools, the allocator, then the device, in reverse
    /// order (spec §4.F "Teardown releases command pools, the allocator,
    /// the device, in reverse order"). The allocator must be drained before
    /// `destroy_device`: `gpu_alloc::GpuAllocator` pools `VkDeviceMemory`
    /// internally and its `Drop` has no device handle to free it with, so
    /// skipping `cleanup` here leaks every block it's still holding.
    pub fn destroy(&mut self, host_alloc: &HostAllocBridge) {
        let vk_callbacks = host_alloc.as_vk_callbacks();
        unsafe {
            self.device.device_wait_idle().ok();
            for pools in self.pools.values() {
                self.device.destroy_command_pool(pools.default_pool, Some(&vk_callbacks));
                self.device.destroy_command_pool(pools.transient_pool, Some(&vk_callbacks));
            }
            self.gpu_alloc.cleanup(&DeviceMemoryHandle::new(&self.device));
            self.device.destroy_device(Some(&vk_callbacks));
        }
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.map_err(|e| VulkanInitError::CreateDevice(e.to_string()).into())
    }
}
