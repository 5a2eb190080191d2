use std::fmt;

use crate::error::EditError;

/// A keystroke delivered to the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    /// Shift+Enter: a line break inside the current block.
    ShiftEnter,
    Tab,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Escape,
}

impl Key {
    fn named(name: &str) -> Option<Key> {
        Some(match name {
            "Enter" => Key::Enter,
            "Shift-Enter" => Key::ShiftEnter,
            "Tab" => Key::Tab,
            "Backspace" => Key::Backspace,
            "Delete" => Key::Delete,
            "Left" => Key::Left,
            "Right" => Key::Right,
            "Up" => Key::Up,
            "Down" => Key::Down,
            "Home" => Key::Home,
            "End" => Key::End,
            "Escape" => Key::Escape,
            _ => return None,
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Enter => write!(f, "{{Enter}}"),
            Key::ShiftEnter => write!(f, "{{Shift-Enter}}"),
            Key::Tab => write!(f, "{{Tab}}"),
            Key::Backspace => write!(f, "{{Backspace}}"),
            Key::Delete => write!(f, "{{Delete}}"),
            Key::Left => write!(f, "{{Left}}"),
            Key::Right => write!(f, "{{Right}}"),
            Key::Up => write!(f, "{{Up}}"),
            Key::Down => write!(f, "{{Down}}"),
            Key::Home => write!(f, "{{Home}}"),
            Key::End => write!(f, "{{End}}"),
            Key::Escape => write!(f, "{{Escape}}"),
        }
    }
}

/// Parse a key script: literal characters, with named keys in braces
/// (`Hello @Che{Down}{Enter}`). `{{` and `}}` stand for literal braces.
/// Line breaks in the script are ignored so long scripts can be wrapped.
pub fn parse_keys(script: &str) -> Result<Vec<Key>, EditError> {
    let mut keys = Vec::new();
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                keys.push(Key::Char('{'));
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                keys.push(Key::Char('}'));
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(EditError::UnknownKey(name)),
                    }
                }
                keys.push(Key::named(&name).ok_or(EditError::UnknownKey(name))?);
            }
            '\n' | '\r' => {}
            c => keys.push(Key::Char(c)),
        }
    }

    Ok(keys)
}
