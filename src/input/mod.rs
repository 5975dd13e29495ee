//! Input-mapping & event pipeline (spec §1.4, §4.L): per-frame platform
//! events dispatched through a LIFO stack of keymaps into named, consuming
//! or propagating callbacks.

pub mod event;
pub mod keymap;

pub use event::{EventQueue, PlatformEvent};
pub use keymap::{Keymap, KeymapEntry, KeymapStack};
