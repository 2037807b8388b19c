use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::foundation::error::CanvasError;

/// Canvas tool selected by the host UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Move,
    Crop,
    Brush,
    Eraser,
    Line,
}

impl Tool {
    /// Single-key shortcut.
    pub fn shortcut(self) -> char {
        match self {
            Tool::Select => 'v',
            Tool::Move => 'm',
            Tool::Crop => 'c',
            Tool::Brush => 'b',
            Tool::Eraser => 'e',
            Tool::Line => 'l',
        }
    }

    pub fn from_shortcut(c: char) -> Option<Self> {
        [
            Tool::Select,
            Tool::Move,
            Tool::Crop,
            Tool::Brush,
            Tool::Eraser,
            Tool::Line,
        ]
        .into_iter()
        .find(|t| t.shortcut() == c.to_ascii_lowercase())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Delete,
    Backspace,
    Escape,
}

/// A key plus modifiers. `ctrl` also covers Cmd/Meta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: Key,
}

impl KeyChord {
    pub fn plain(key: Key) -> Self {
        Self {
            ctrl: false,
            shift: false,
            alt: false,
            key,
        }
    }

    pub fn ctrl(c: char) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(Key::Char(c.to_ascii_lowercase()))
        }
    }
}

impl FromStr for KeyChord {
    type Err = CanvasError;

    /// Parses `"ctrl+shift+z"`, `"cmd+s"`, `"Delete"`, `"v"`; case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chord = KeyChord::plain(Key::Escape);
        let mut key = None;
        for part in s.split('+').map(str::trim) {
            let lower = part.to_ascii_lowercase();
            match lower.as_str() {
                "ctrl" | "control" | "cmd" | "meta" | "command" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "alt" | "option" => chord.alt = true,
                _ if key.is_some() => {
                    return Err(CanvasError::parse(format!("key chord '{s}' has two keys")));
                }
                "delete" | "del" => key = Some(Key::Delete),
                "backspace" => key = Some(Key::Backspace),
                "escape" | "esc" => key = Some(Key::Escape),
                _ => {
                    let mut chars = lower.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => key = Some(Key::Char(c)),
                        _ => {
                            return Err(CanvasError::parse(format!(
                                "unknown key '{part}' in chord '{s}'"
                            )));
                        }
                    }
                }
            }
        }
        chord.key = key.ok_or_else(|| CanvasError::parse(format!("key chord '{s}' has no key")))?;
        Ok(chord)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("ctrl+")?;
        }
        if self.shift {
            f.write_str("shift+")?;
        }
        if self.alt {
            f.write_str("alt+")?;
        }
        match self.key {
            Key::Char(c) => write!(f, "{c}"),
            Key::Delete => f.write_str("delete"),
            Key::Backspace => f.write_str("backspace"),
            Key::Escape => f.write_str("escape"),
        }
    }
}

/// Editor command a shortcut maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorAction {
    SelectTool(Tool),
    Undo,
    Redo,
    Export,
    Import,
    DuplicateLayer,
    DeleteLayer,
}

pub fn action_for(chord: &KeyChord) -> Option<EditorAction> {
    use EditorAction as A;

    if chord.alt {
        return None;
    }
    match (chord.ctrl, chord.shift, chord.key) {
        (true, false, Key::Char('z')) => Some(A::Undo),
        (true, true, Key::Char('z')) | (true, false, Key::Char('y')) => Some(A::Redo),
        (true, false, Key::Char('s')) => Some(A::Export),
        (true, false, Key::Char('o')) => Some(A::Import),
        (true, false, Key::Char('d')) => Some(A::DuplicateLayer),
        (false, false, Key::Delete | Key::Backspace) => Some(A::DeleteLayer),
        (false, false, Key::Char(c)) => Tool::from_shortcut(c).map(A::SelectTool),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/editor/keymap.rs"]
mod tests;
