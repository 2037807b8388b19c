//! Editing session that hosts talk to, plus its keyboard shortcut map.

pub mod keymap;
pub mod session;
