//! Frames-in-flight scheduler (spec §4.I), implemented as an explicit state
//! machine per REDESIGN FLAGS ("Coroutine-like frame phases expressed as
//! free functions → an explicit frame state machine (enum + transition
//! function) so S0..S7 are trivially testable in isolation").

use smallvec::SmallVec;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder, KhrSwapchainExtension};
use vulkanalia::Device;

use crate::error::{RenderError, VulkanInitError, VulkanObjectError};
use crate::vk::host_alloc::HostAllocBridge;
use crate::Result;

/// Fixed frame-in-flight count (spec §3 "Frame context... fixed count =
/// 2").
pub const FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Begin,
    Wait,
    Acquire,
    ResetFence,
    WriteUbo,
    Record,
    Submit,
    Present,
}

/// Outcome of one `FrameScheduler::tick` call (spec §7 propagation policy:
/// acquire failures recoverable, submit failures fatal, present failures
/// logged-and-continued).
#[derive(Debug)]
pub enum FrameOutcome {
    /// The frame presented (or a present failure was logged and
    /// swallowed); `finished_frames` has been advanced.
    Presented,
    /// `vkAcquireNextImageKHR` failed for a reason other than
    /// `SUBOPTIMAL_KHR`; the frame counter is not advanced.
    SkippedAcquireFailed(RenderError),
    /// Submission failed; the frame loop must exit (spec §4.M "loop exits
    /// when ... user callback returns a non-NO_ERROR code").
    Fatal(crate::Error),
}

pub struct FrameContext {
    pub command_buffer: vk::CommandBuffer,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    pub uniform_buffer_index: usize,
    pub descriptor_pool: vk::DescriptorPool,
}

/// Config for one frame context's descriptor pool (spec §6 "Descriptor
/// pool").
#[derive(Clone, Debug, Default)]
pub struct DescriptorPoolCfg {
    pub max_desc_per_type: SmallVec<[(vk::DescriptorType, u32); 8]>,
    pub max_sets: u32,
    pub flags: vk::DescriptorPoolCreateFlags,
}

pub struct FrameScheduler {
    frames: [FrameContext; FRAMES_IN_FLIGHT],
    finished_frames: u64,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl FrameScheduler {
    pub fn new(
        device: &Device,
        command_pool: vk::CommandPool,
        descriptor_pool_cfg: &DescriptorPoolCfg,
        uniform_buffer_indices: [usize; FRAMES_IN_FLIGHT],
        graphics_queue: vk::Queue,
        present_queue: vk::Queue,
        host_alloc: &HostAllocBridge,
    ) -> Result<Self> {
        let vk_callbacks = host_alloc.as_vk_callbacks();

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(FRAMES_IN_FLIGHT as u32);
        let command_buffers = unsafe { device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| VulkanObjectError::CreateCommandBuffer(e.to_string()))?;

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let pool_sizes: Vec<_> =
            descriptor_pool_cfg.max_desc_per_type.iter().map(|(ty, count)| vk::DescriptorPoolSize::builder().type_(*ty).descriptor_count(*count).build()).collect();

        let mut frames = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for i in 0..FRAMES_IN_FLIGHT {
            let pool_info = vk::DescriptorPoolCreateInfo::builder()
                .pool_sizes(&pool_sizes)
                .max_sets(descriptor_pool_cfg.max_sets)
                .flags(descriptor_pool_cfg.flags);
            let descriptor_pool = unsafe { device.create_descriptor_pool(&pool_info, Some(&vk_callbacks)) }
                .map_err(|e| VulkanObjectError::CreateDescriptorPool(e.to_string()))?;

            frames.push(FrameContext {
                command_buffer: command_buffers[i],
                image_available: unsafe { device.create_semaphore(&semaphore_info, Some(&vk_callbacks)) }
                    .map_err(|e| VulkanInitError::CreateSemaphore(e.to_string()))?,
                render_finished: unsafe { device.create_semaphore(&semaphore_info, Some(&vk_callbacks)) }
                    .map_err(|e| VulkanInitError::CreateSemaphore(e.to_string()))?,
                in_flight_fence: unsafe { device.create_fence(&fence_info, Some(&vk_callbacks)) }
                    .map_err(|e| VulkanInitError::CreateFence(e.to_string()))?,
                uniform_buffer_index: uniform_buffer_indices[i],
                descriptor_pool,
            });
        }

        Ok(Self {
            frames: frames.try_into().unwrap_or_else(|_| unreachable!()),
            finished_frames: 0,
            graphics_queue,
            present_queue,
        })
    }

    pub fn finished_frames(&self) -> u64 {
        self.finished_frames
    }

    fn current_index(&self) -> usize {
        (self.finished_frames % FRAMES_IN_FLIGHT as u64) as usize
    }

    /// Runs one tick of the S0..S7 state machine for the current frame
    /// index (spec §4.I).
    ///
    /// - `on_resize`: called at S0 if `framebuffer_resized` is true; should
    ///   recreate the swapchain.
    /// - `acquire`: S2, returns the acquired image index.
    /// - `write_ubo`: S4, writes this frame's uniform data.
    /// - `record`: S5, records the command buffer for `image_index`.
    /// - `swapchain`: the swapchain to present to in S7.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        device: &Device,
        framebuffer_resized: bool,
        mut on_resize: impl FnMut() -> Result<()>,
        mut acquire: impl FnMut(vk::Semaphore) -> Result<(u32, bool)>,
        mut write_ubo: impl FnMut(&FrameContext) -> Result<()>,
        mut record: impl FnMut(vk::CommandBuffer, u32) -> Result<()>,
        mut present: impl FnMut(vk::Queue, vk::Semaphore, u32) -> Result<bool>,
    ) -> FrameOutcome {
        // S0 Begin
        if framebuffer_resized {
            if let Err(e) = on_resize() {
                return FrameOutcome::Fatal(e);
            }
        }

        let index = self.current_index();
        let fence = self.frames[index].in_flight_fence;

        // S1 Wait
        if let Err(e) = unsafe { device.wait_for_fences(&[fence], true, u64::MAX) } {
            return FrameOutcome::Fatal(RenderError::WaitFence(e.to_string()).into());
        }

        // S2 Acquire
        let (image_index, _suboptimal) = match acquire(self.frames[index].image_available) {
            Ok(result) => result,
            Err(e) => return FrameOutcome::SkippedAcquireFailed(RenderError::AcquireImage(e.to_string())),
        };

        // S3 ResetFence
        if let Err(e) = unsafe { device.reset_fences(&[fence]) } {
            return FrameOutcome::Fatal(RenderError::ResetFence(e.to_string()).into());
        }

        // S4 WriteUBO
        if let Err(e) = write_ubo(&self.frames[index]) {
            return FrameOutcome::Fatal(e);
        }

        // S5 Record
        let command_buffer = self.frames[index].command_buffer;
        if let Err(e) = record(command_buffer, image_index) {
            return FrameOutcome::Fatal(e);
        }

        // S6 Submit
        let wait_semaphores = [self.frames[index].image_available];
        let signal_semaphores = [self.frames[index].render_finished];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        if let Err(e) = unsafe { device.queue_submit(self.graphics_queue, &[submit_info], fence) } {
            return FrameOutcome::Fatal(RenderError::SubmitQueue(e.to_string()).into());
        }

        // S7 Present
        match present(self.present_queue, self.frames[index].render_finished, image_index) {
            Ok(_suboptimal) => {}
            Err(e) => {
                log::error!("present failed: {e}");
            }
        }

        self.finished_frames += 1;
        FrameOutcome::Presented
    }

    /// Device-wait-idle, then destroys every per-frame object (spec §4.I
    /// "Cancellation: a shutdown request drains with a device-wait-idle
    /// before destroying per-frame objects").
    pub fn shutdown(&mut self, device: &Device, host_alloc: &HostAllocBridge) -> Result<()> {
        unsafe { device.device_wait_idle() }.map_err(|e| VulkanInitError::CreateDevice(e.to_string()))?;
        let vk_callbacks = host_alloc.as_vk_callbacks();
        for frame in &self.frames {
            unsafe {
                device.destroy_semaphore(frame.image_available, Some(&vk_callbacks));
                device.destroy_semaphore(frame.render_finished, Some(&vk_callbacks));
                device.destroy_fence(frame.in_flight_fence, Some(&vk_callbacks));
                device.destroy_descriptor_pool(frame.descriptor_pool, Some(&vk_callbacks));
            }
        }
        Ok(())
    }
}
