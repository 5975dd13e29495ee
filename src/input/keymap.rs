//! Stacked keymap dispatcher (spec §4.L), ported from
//! `input_mapping.h`/`input_keymaps.cpp`. Keys are packed into a single
//! `u32` of `{class, code, modifiers, action}`; a [`KeymapStack`] dispatches
//! each frame's events top-down, honoring each matched entry's
//! consume/propagate flag.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use cgmath::Vector2;

use crate::input::event::{Action, EventClass, ModifierMask, PlatformEvent};

/// Sentinel modifier value meaning "match regardless of which modifiers are
/// held" (`MOD_ANY` in the source). Distinct from any real combination of
/// [`ModifierMask`]'s four bits, which only ever uses the low nibble.
pub const MOD_ANY: u8 = 0xFF;

fn pack_key(class: EventClass, code: u16, mods: u8, action: Action) -> u32 {
    let class_bits = match class {
        EventClass::Button => 0u32,
        EventClass::Cursor => 1u32,
        EventClass::Scroll => 2u32,
    };
    let action_bits = match action {
        Action::Press => 0u32,
        Action::Release => 1u32,
        Action::Repeat => 2u32,
        Action::Change => 3u32,
    };
    class_bits | ((code as u32) << 2) | ((mods as u32) << 18) | (action_bits << 26)
}

/// Builds the packed key for a button/key entry (spec §4.L key packing).
pub fn button_key(code: u16, mods: u8, action: Action) -> u32 {
    pack_key(EventClass::Button, code, mods, action)
}

/// Cursor-motion entries have no code or specific action beyond "changed".
pub fn cursor_key(mods: u8) -> u32 {
    pack_key(EventClass::Cursor, 0, mods, Action::Change)
}

/// Scroll entries have no code beyond "changed".
pub fn scroll_key(mods: u8) -> u32 {
    pack_key(EventClass::Scroll, 0, mods, Action::Change)
}

fn with_wildcard_mods(key: u32) -> u32 {
    (key & !(0xFFu32 << 18)) | ((MOD_ANY as u32) << 18)
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        /// Dispatch continues to maps lower in the stack after this entry's
        /// callback runs (spec §4.L "DONT_CONSUME").
        const DONT_CONSUME = 1 << 0;
    }
}

/// The normalized event handed to a keymap entry's callback (spec §3
/// "Keymap entry" callback contract).
#[derive(Clone, Copy, Debug)]
pub struct LogicalEvent<'a> {
    pub name: &'a str,
    pub raw: &'a PlatformEvent,
    pub cursor_pos: Option<Vector2<f32>>,
    pub scroll_offset: Option<Vector2<f32>>,
}

pub struct KeymapEntry {
    pub name: String,
    pub key: u32,
    pub flags: EntryFlags,
    pub callback: Box<dyn FnMut(&LogicalEvent)>,
}

impl KeymapEntry {
    pub fn new(name: impl Into<String>, key: u32, callback: impl FnMut(&LogicalEvent) + 'static) -> Self {
        Self { name: name.into(), key, flags: EntryFlags::empty(), callback: Box::new(callback) }
    }

    pub fn dont_consume(mut self) -> Self {
        self.flags |= EntryFlags::DONT_CONSUME;
        self
    }
}

/// A named map from packed keys to entries (spec §3 "Keymap").
pub struct Keymap {
    pub name: String,
    entries: HashMap<u32, KeymapEntry>,
}

impl Keymap {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: HashMap::new() }
    }

    pub fn set_entry(&mut self, entry: KeymapEntry) {
        self.entries.insert(entry.key, entry);
    }

    pub fn entry(&self, name: &str) -> Option<&KeymapEntry> {
        self.entries.values().find(|e| e.name == name)
    }

    fn find_mut(&mut self, key: u32) -> Option<&mut KeymapEntry> {
        if let Some(e) = self.entries.get_mut(&key) {
            return Some(e);
        }
        self.entries.get_mut(&with_wildcard_mods(key))
    }
}

/// LIFO of keymaps; the most recently pushed map is queried first (spec §9
/// Open Questions: this convention matches the `rdev` sample, where push
/// appends to the back and dispatch walks newest-first).
#[derive(Default)]
pub struct KeymapStack {
    stack: Vec<Rc<RefCell<Keymap>>>,
}

impl KeymapStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// No-op if `keymap` is already present (spec §4.L "push is a no-op if
    /// already present").
    pub fn push(&mut self, keymap: Rc<RefCell<Keymap>>) {
        if !self.contains(&keymap) {
            self.stack.push(keymap);
        }
    }

    pub fn pop(&mut self) -> Option<Rc<RefCell<Keymap>>> {
        self.stack.pop()
    }

    pub fn contains(&self, keymap: &Rc<RefCell<Keymap>>) -> bool {
        self.stack.iter().any(|k| Rc::ptr_eq(k, keymap))
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Dispatches one event through the stack top-down, invoking at most
    /// one matching entry's callback unless it is flagged `DONT_CONSUME`
    /// (spec §4.L dispatch algorithm).
    pub fn dispatch(&self, key: u32, logical: &LogicalEvent) {
        for keymap in self.stack.iter().rev() {
            let mut km = keymap.borrow_mut();
            if let Some(entry) = km.find_mut(key) {
                (entry.callback)(logical);
                if !entry.flags.contains(EntryFlags::DONT_CONSUME) {
                    return;
                }
            }
        }
    }
}

/// Computes an event's packed key and invokes [`KeymapStack::dispatch`] for
/// every event in `events`, then clears the queue (spec §4.L steps 1-2).
pub fn dispatch_frame(stack: &KeymapStack, events: &mut crate::input::event::EventQueue) {
    for event in events.iter() {
        let (key, logical) = match event {
            PlatformEvent::Key { mods, event: k } => {
                let action = k.action;
                (button_key(k.scancode as u16, mods.0, action), LogicalEvent { name: "", raw: event, cursor_pos: None, scroll_offset: None })
            }
            PlatformEvent::MouseButton { mods, event: b } => (
                button_key(b.button as u16, mods.0, b.action),
                LogicalEvent { name: "", raw: event, cursor_pos: Some(b.norm_pos), scroll_offset: None },
            ),
            PlatformEvent::MouseMotion { mods, event: m } => {
                (cursor_key(mods.0), LogicalEvent { name: "", raw: event, cursor_pos: Some(m.norm_pos), scroll_offset: None })
            }
            PlatformEvent::MouseWheel { mods, event: w } => {
                (scroll_key(mods.0), LogicalEvent { name: "", raw: event, cursor_pos: Some(w.norm_pos), scroll_offset: Some(w.delta) })
            }
            PlatformEvent::Window(_) => continue,
        };
        stack.dispatch(key, &logical);
    }
    events.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::event::{Action, EventQueue, KeyEvent, ModifierMask, PlatformEvent};
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    #[test]
    fn push_is_noop_if_already_present() {
        let mut stack = KeymapStack::new();
        let km = Rc::new(RefCell::new(Keymap::new("KM1")));
        stack.push(km.clone());
        stack.push(km.clone());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn dont_consume_reaches_all_matching_maps() {
        let fired = StdRc::new(Cell::new(Vec::<&'static str>::new()));

        let mut km_top = Keymap::new("K3");
        let f = fired.clone();
        km_top.set_entry(
            KeymapEntry::new("Select", button_key(1, ModifierMask::NONE.0, Action::Release), move |_| {
                let mut v = f.take();
                v.push("Select");
                f.set(v);
            })
            .dont_consume(),
        );

        let mut km_bottom = Keymap::new("K2");
        let f2 = fired.clone();
        km_bottom.set_entry(KeymapEntry::new("Context Menu", button_key(1, ModifierMask::NONE.0, Action::Release), move |_| {
            let mut v = f2.take();
            v.push("Context Menu");
            f2.set(v);
        }));

        let mut stack = KeymapStack::new();
        stack.push(Rc::new(RefCell::new(km_bottom)));
        stack.push(Rc::new(RefCell::new(km_top)));

        let mut queue = EventQueue::new(8);
        queue.push(PlatformEvent::MouseButton {
            mods: ModifierMask::NONE,
            event: crate::input::event::MouseButtonEvent {
                action: Action::Release,
                button: 1,
                pos: (0.0, 0.0).into(),
                norm_pos: (0.0, 0.0).into(),
                mouse_id: 0,
            },
        });
        dispatch_frame(&stack, &mut queue);

        assert_eq!(fired.take(), vec!["Select", "Context Menu"]);
    }

    #[test]
    fn consuming_entry_stops_propagation() {
        let fired = StdRc::new(Cell::new(0u32));

        let mut km_top = Keymap::new("K3");
        let f = fired.clone();
        km_top.set_entry(KeymapEntry::new("Select", button_key(1, ModifierMask::NONE.0, Action::Release), move |_| {
            f.set(f.get() + 1);
        }));

        let mut km_bottom = Keymap::new("K2");
        let f2 = fired.clone();
        km_bottom.set_entry(KeymapEntry::new("Context Menu", button_key(1, ModifierMask::NONE.0, Action::Release), move |_| {
            f2.set(f2.get() + 100);
        }));

        let mut stack = KeymapStack::new();
        stack.push(Rc::new(RefCell::new(km_bottom)));
        stack.push(Rc::new(RefCell::new(km_top)));

        let mut queue = EventQueue::new(8);
        queue.push(PlatformEvent::MouseButton {
            mods: ModifierMask::NONE,
            event: crate::input::event::MouseButtonEvent {
                action: Action::Release,
                button: 1,
                pos: (0.0, 0.0).into(),
                norm_pos: (0.0, 0.0).into(),
                mouse_id: 0,
            },
        });
        dispatch_frame(&stack, &mut queue);

        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn wildcard_modifier_entry_matches_any_modifiers() {
        let fired = StdRc::new(Cell::new(0u32));
        let mut km = Keymap::new("KM1");
        let f = fired.clone();
        km.set_entry(KeymapEntry::new("Forward", button_key(10, MOD_ANY, Action::Press), move |_| {
            f.set(f.get() + 1);
        }));

        let mut stack = KeymapStack::new();
        stack.push(Rc::new(RefCell::new(km)));

        let mut queue = EventQueue::new(8);
        queue.push(PlatformEvent::Key {
            mods: ModifierMask::SHIFT,
            event: KeyEvent { action: Action::Press, scancode: 10, raw_scancode: 10, keyboard_id: 0 },
        });
        dispatch_frame(&stack, &mut queue);

        assert_eq!(fired.get(), 1);
    }
}
