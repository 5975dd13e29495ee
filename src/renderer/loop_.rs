//! Frame loop orchestrator (spec §4.M), wiring the per-frame linear arena
//! reset, the input keymap dispatch (L), and the caller-supplied render
//! step into the six-step tick order spec §4.M names: advance the
//! timer, drain events, reset the frame-linear arena, run the user
//! callback, render, advance the frame counter.
//!
//! `vkforge` never reads a wall clock or the OS event queue itself (spec
//! §1 Non-goals "Platform-window creation, timer reading, and raw OS
//! event polling") — both are supplied by the driving application through
//! `poll_events`, mirroring how [`crate::window::Window`] is the sole
//! windowing collaborator.

use crate::context::Context;
use crate::error::PlatformError;
use crate::input::event::EventQueue;
use crate::input::keymap::{dispatch_frame, KeymapStack};
use crate::window::Window;
use crate::Result;

/// Why [`FrameLoop::run`] stopped (spec §4.M "the loop exits when
/// should_close is observed or the user callback returns a non-NO_ERROR
/// code").
#[derive(Debug)]
pub enum LoopExit {
    WindowClosed,
    UserError(crate::Error),
}

/// Owns the per-frame event queue and keymap stack across ticks (spec §3
/// "Frame loop owns the event queue and keymap stack for the application's
/// lifetime").
pub struct FrameLoop {
    events: EventQueue,
    keymaps: KeymapStack,
    finished_frames: u64,
}

impl FrameLoop {
    pub fn new(event_capacity: usize) -> Self {
        Self { events: EventQueue::new(event_capacity), keymaps: KeymapStack::new(), finished_frames: 0 }
    }

    pub fn keymaps(&mut self) -> &mut KeymapStack {
        &mut self.keymaps
    }

    pub fn finished_frames(&self) -> u64 {
        self.finished_frames
    }

    /// Drives ticks until `window.should_close()` or `run_frame` fails.
    ///
    /// - `poll_events`: advances the profile timer split and drains raw
    ///   platform events into the queue, returning this tick's delta time
    ///   in seconds (steps i-ii).
    /// - `run_frame`: writes component data for the tick and calls into
    ///   the renderer, which executes the frame scheduler's S0..S7 (step
    ///   iv-v, spec §4.I).
    pub fn run(
        &mut self,
        window: &dyn Window,
        context: &Context,
        mut poll_events: impl FnMut(&mut EventQueue) -> Result<f32>,
        mut run_frame: impl FnMut(f32) -> Result<()>,
    ) -> LoopExit {
        loop {
            if window.should_close() {
                return LoopExit::WindowClosed;
            }

            let dt = match poll_events(&mut self.events) {
                Ok(dt) => dt,
                Err(e) => {
                    log::error!("poll_events failed: {e}");
                    return LoopExit::UserError(PlatformError::RunFrame(e.to_string()).into());
                }
            };
            dispatch_frame(&self.keymaps, &mut self.events);

            context.reset_frame_linear();

            if let Err(e) = run_frame(dt) {
                log::error!("run_frame failed: {e}");
                return LoopExit::UserError(PlatformError::RunFrame(e.to_string()).into());
            }

            self.finished_frames += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use vulkanalia::vk;
    use vulkanalia::Instance;

    struct FakeWindow {
        closes_after: Cell<u32>,
    }

    impl Window for FakeWindow {
        fn pixel_size(&self) -> (u32, u32) {
            (800, 600)
        }
        fn screen_size(&self) -> (u32, u32) {
            (800, 600)
        }
        fn should_close(&self) -> bool {
            let n = self.closes_after.get();
            if n == 0 {
                true
            } else {
                self.closes_after.set(n - 1);
                false
            }
        }
        fn framebuffer_resized_this_frame(&self) -> bool {
            false
        }
        fn required_instance_extensions(&self) -> Vec<vk::ExtensionName> {
            vec![]
        }
        fn create_vulkan_surface(&self, _instance: &Instance) -> Result<vk::SurfaceKHR> {
            unimplemented!("test window never creates a surface")
        }
    }

    #[test]
    fn runs_exactly_until_should_close() {
        let window = FakeWindow { closes_after: Cell::new(3) };
        let context = Context::new(&crate::context::MemoryInit {
            free_list_size: 1 << 16,
            stack_size: 1 << 12,
            frame_linear_size: 1 << 12,
        })
        .unwrap();

        let mut loop_ = FrameLoop::new(8);
        let mut ticks = 0;
        let exit = loop_.run(
            &window,
            &context,
            |_events| Ok(0.016),
            |_dt| {
                ticks += 1;
                Ok(())
            },
        );

        assert!(matches!(exit, LoopExit::WindowClosed));
        assert_eq!(ticks, 3);
        assert_eq!(loop_.finished_frames(), 3);
    }

    #[test]
    fn user_error_stops_the_loop_early() {
        let window = FakeWindow { closes_after: Cell::new(100) };
        let context = Context::new(&crate::context::MemoryInit {
            free_list_size: 1 << 16,
            stack_size: 1 << 12,
            frame_linear_size: 1 << 12,
        })
        .unwrap();

        let mut loop_ = FrameLoop::new(8);
        let mut ticks = 0;
        let exit = loop_.run(
            &window,
            &context,
            |_events| Ok(0.016),
            |_dt| {
                ticks += 1;
                if ticks == 2 {
                    Err(PlatformError::RunFrame("boom".into()).into())
                } else {
                    Ok(())
                }
            },
        );

        assert!(matches!(exit, LoopExit::UserError(_)));
        assert_eq!(ticks, 2);
        assert_eq!(loop_.finished_frames(), 1);
    }

}
