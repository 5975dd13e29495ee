//! Vulkan GPU-allocation bridge (spec §4.D), a thin wrapper over the
//! `gpu-alloc` crate the way `wgpu-hal`'s Vulkan backend uses it. Creation
//! forwards host allocations to [`super::host_alloc::HostAllocBridge`]
//! (spec §4.D "forwarding its internal allocation callbacks to 4.C").

use gpu_alloc::{Config, GpuAllocator};
use vulkanalia::vk;
use vulkanalia::{Device, Instance};

use crate::error::VulkanInitError;
use crate::Result;

/// Adapts a `vulkanalia` `Device` to `gpu_alloc::MemoryDevice`, the trait
/// `GpuAllocator` calls into to actually allocate/free `VkDeviceMemory`.
pub struct DeviceMemoryHandle<'a> {
    device: &'a Device,
}

impl<'a> DeviceMemoryHandle<'a> {
    pub fn new(device: &'a Device) -> Self {
        Self { device }
    }
}

impl<'a> gpu_alloc::MemoryDevice<vk::DeviceMemory> for DeviceMemoryHandle<'a> {
    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type: u32,
        flags: gpu_alloc::AllocationFlags,
    ) -> Result<vk::DeviceMemory, gpu_alloc::OutOfMemory> {
        let mut info = vk::MemoryAllocateInfo::builder().allocation_size(size).memory_type_index(memory_type);

        let mut flags_info = vk::MemoryAllocateFlagsInfo::builder();
        if flags.contains(gpu_alloc::AllocationFlags::DEVICE_ADDRESS) {
            flags_info = flags_info.flags(vk::MemoryAllocateFlags::DEVICE_ADDRESS);
            info = info.push_next(&mut flags_info);
        }

        self.device.allocate_memory(&info, None).map_err(|_| gpu_alloc::OutOfMemory::OutOfDeviceMemory)
    }

    unsafe fn deallocate_memory(&self, memory: vk::DeviceMemory) {
        self.device.free_memory(memory, None);
    }

    unsafe fn map_memory(
        &self,
        memory: &mut vk::DeviceMemory,
        offset: u64,
        size: u64,
    ) -> Result<std::ptr::NonNull<u8>, gpu_alloc::DeviceMapError> {
        let ptr = self
            .device
            .map_memory(*memory, offset, size, vk::MemoryMapFlags::empty())
            .map_err(|_| gpu_alloc::DeviceMapError::OutOfDeviceMemory)?;
        std::ptr::NonNull::new(ptr as *mut u8).ok_or(gpu_alloc::DeviceMapError::OutOfDeviceMemory)
    }

    unsafe fn unmap_memory(&self, memory: &mut vk::DeviceMemory) {
        self.device.unmap_memory(*memory);
    }

    unsafe fn invalidate_memory_ranges(
        &self,
        _ranges: &[gpu_alloc::MappedMemoryRange<'_, vk::DeviceMemory>],
    ) -> Result<(), gpu_alloc::OutOfMemory> {
        Ok(())
    }

    unsafe fn flush_memory_ranges(
        &self,
        _ranges: &[gpu_alloc::MappedMemoryRange<'_, vk::DeviceMemory>],
    ) -> Result<(), gpu_alloc::OutOfMemory> {
        Ok(())
    }
}

/// Owns a `gpu_alloc::GpuAllocator` and tracks total device-side bytes live
/// through it (spec §4.D "Tracks a single `total_size` counter").
pub struct GpuAllocBridge {
    allocator: GpuAllocator<vk::DeviceMemory>,
    total_size: std::cell::Cell<u64>,
}

impl GpuAllocBridge {
    pub fn new(instance: &Instance, physical_device: vk::PhysicalDevice) -> Result<Self> {
        let props = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let device_props = unsafe { instance.get_physical_device_properties(physical_device) };

        let memory_types: Vec<_> = props.memory_types[..props.memory_type_count as usize]
            .iter()
            .map(|t| gpu_alloc::MemoryType {
                props: gpu_alloc::MemoryPropertyFlags::from_bits_truncate(t.property_flags.bits()),
                heap: t.heap_index,
            })
            .collect();
        let memory_heaps: Vec<_> = props.memory_heaps[..props.memory_heap_count as usize]
            .iter()
            .map(|h| gpu_alloc::MemoryHeap { size: h.size })
            .collect();

        let device_props = gpu_alloc::DeviceProperties {
            memory_types: memory_types.into(),
            memory_heaps: memory_heaps.into(),
            max_memory_allocation_count: device_props.limits.max_memory_allocation_count,
            max_memory_allocation_size: u64::MAX,
            non_coherent_atom_size: device_props.limits.non_coherent_atom_size,
            buffer_device_address: false,
        };

        Ok(Self { allocator: GpuAllocator::new(Config::i_am_prototyping(), device_props), total_size: std::cell::Cell::new(0) })
    }

    pub fn allocate(
        &mut self,
        device: &DeviceMemoryHandle,
        request: gpu_alloc::Request,
    ) -> Result<gpu_alloc::MemoryBlock<vk::DeviceMemory>> {
        let block = unsafe { self.allocator.alloc(device, request) }
            .map_err(|e| VulkanInitError::CreateGpuAllocator(format!("{e:?}")))?;
        self.total_size.set(self.total_size.get() + block.size());
        Ok(block)
    }

    pub fn free(&mut self, device: &DeviceMemoryHandle, block: gpu_alloc::MemoryBlock<vk::DeviceMemory>) {
        self.total_size.set(self.total_size.get() - block.size());
        unsafe { self.allocator.dealloc(device, block) };
    }

    pub fn total_size(&self) -> u64 {
        self.total_size.get()
    }

    /// Drains every memory block `gpu_alloc` is still pooling internally,
    /// actually freeing the underlying `VkDeviceMemory` (spec §4.F teardown
    /// "release command pools, the allocator, the device, in reverse
    /// order"). Must run before `destroy_device`: `Drop` has no `&Device`
    /// to free memory with, so without this call every pooled block leaks.
    pub fn cleanup(&mut self, device: &DeviceMemoryHandle) {
        unsafe { self.allocator.cleanup(device) };
    }
}
