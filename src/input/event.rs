//! Per-frame platform event types (spec §3 "Per-frame event queue"),
//! ported from `platform.h`'s `platform_*_event` structs. `vkforge` never
//! polls the OS itself (spec §1 Non-goals); an external event source fills
//! an [`EventQueue`] once per tick and `input::keymap` dispatches it.

use cgmath::Vector2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Press,
    Release,
    Repeat,
    /// Used for scroll/motion/window events that have no press/release
    /// phase of their own (spec §4.L key packing `action: ... | change`).
    Change,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventClass {
    Button,
    Cursor,
    Scroll,
}

#[derive(Clone, Copy, Debug)]
pub struct KeyEvent {
    pub action: Action,
    pub scancode: u32,
    pub raw_scancode: u16,
    pub keyboard_id: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct MouseButtonEvent {
    pub action: Action,
    pub button: u8,
    pub pos: Vector2<f32>,
    pub norm_pos: Vector2<f32>,
    pub mouse_id: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct MouseMotionEvent {
    pub pos: Vector2<f32>,
    pub norm_pos: Vector2<f32>,
    pub delta: Vector2<f32>,
    pub norm_delta: Vector2<f32>,
    pub mouse_id: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct MouseWheelEvent {
    pub pos: Vector2<f32>,
    pub norm_pos: Vector2<f32>,
    pub delta: Vector2<f32>,
    pub mouse_id: u32,
}

#[derive(Clone, Copy, Debug)]
pub enum WindowEvent {
    Resize { width: u32, height: u32 },
    PixelSizeChange { width: u32, height: u32 },
    Move { x: i32, y: i32 },
    Focus(bool),
    Visibility(bool),
}

#[derive(Clone, Copy, Debug)]
pub struct ModifierMask(pub u8);

impl ModifierMask {
    pub const NONE: Self = Self(0);
    pub const SHIFT: Self = Self(1 << 0);
    pub const CONTROL: Self = Self(1 << 1);
    pub const ALT: Self = Self(1 << 2);
    pub const SUPER: Self = Self(1 << 3);
}

/// A single platform-reported input or window event, tagged with its
/// modifier mask at the time it arrived (spec §3 "typed platform events").
#[derive(Clone, Copy, Debug)]
pub enum PlatformEvent {
    Key { mods: ModifierMask, event: KeyEvent },
    MouseButton { mods: ModifierMask, event: MouseButtonEvent },
    MouseMotion { mods: ModifierMask, event: MouseMotionEvent },
    MouseWheel { mods: ModifierMask, event: MouseWheelEvent },
    Window(WindowEvent),
}

/// A ring-style bounded queue of events for one frame, cleared before the
/// event source polls again (spec §3 "Per-frame event queue").
pub struct EventQueue {
    events: Vec<PlatformEvent>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self { events: Vec::with_capacity(capacity), capacity }
    }

    /// Appends an event, silently dropping it if the queue is at capacity
    /// (matches the source's bounded ring behavior rather than growing
    /// unbounded under an event storm).
    pub fn push(&mut self, event: PlatformEvent) {
        if self.events.len() < self.capacity {
            self.events.push(event);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlatformEvent> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
