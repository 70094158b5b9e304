//! # Host Event Script
//!
//! A line-based format for replaying host notifications deterministically.
//!
//! ## Format
//!
//! - Keys: `a`, `Enter`, `Escape`, `Space`, `Up`, `F1`, with modifiers as
//!   `Ctrl+c`, `Shift+Alt+x`. A key line is a press followed by a release
//! - Text: `"hello"` (one press per character)
//! - Pointer: `move 4 -2`, `click 1`, `down 3`, `up 3`, `wheel 0 1`
//! - Touch: `touch down 0 10 20`, `touch move 0 12 20`, `touch up 0 12 20`
//! - Window: `focus in`, `focus out`, `expose`, `resize 800 600`
//! - `quit`
//! - Delays: `wait 100ms`, `wait 2s`
//! - Comments: `# ...`, also trailing
//!
//! ## Example
//!
//! ```text
//! focus in
//! move 3 0        # nudge right
//! Space
//! wait 50ms
//! quit
//! ```

use std::collections::VecDeque;

use hal::{HostButtonMask, HostEvent, HostKeyMod, TouchPhase, WindowEvent};
use input_types::KeyCode;
use thiserror::Error;

/// Script error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostScriptError {
    #[error("Invalid key name: {0}")]
    InvalidKeyName(String),

    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Empty script")]
    EmptyScript,

    #[error("Invalid delay format: {0}")]
    InvalidDelay(String),
}

/// One scripted step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    /// Inject a host notification
    Event(HostEvent),
    /// Let time pass, in milliseconds
    Wait(u64),
}

/// A parsed host event script
#[derive(Debug, Clone, Default)]
pub struct HostScript {
    steps: VecDeque<ScriptStep>,
}

impl HostScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a script from text
    pub fn from_text(text: &str) -> Result<Self, HostScriptError> {
        let mut steps = VecDeque::new();

        for (index, line) in text.lines().enumerate() {
            let line = match line.split_once(" #") {
                Some((code, _)) => code.trim(),
                None => line.trim(),
            };
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            steps.extend(Self::parse_line(line, index + 1)?);
        }

        if steps.is_empty() {
            return Err(HostScriptError::EmptyScript);
        }
        Ok(Self { steps })
    }

    fn parse_line(line: &str, line_num: usize) -> Result<Vec<ScriptStep>, HostScriptError> {
        let parse_error = |message: String| HostScriptError::ParseError {
            line: line_num,
            message,
        };

        if line.len() >= 2 && line.starts_with('"') && line.ends_with('"') {
            let text = &line[1..line.len() - 1];
            let mut steps = Vec::new();
            for c in text.chars() {
                let scancode = char_to_scancode(c)
                    .ok_or_else(|| parse_error(format!("no key for {:?}", c)))?;
                steps.extend(press(scancode, HostKeyMod::empty()));
            }
            return Ok(steps);
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let event = |event: HostEvent| Ok(vec![ScriptStep::Event(event)]);
        match words.as_slice() {
            ["quit"] => event(HostEvent::Quit),
            ["wait", duration] => parse_duration(duration)
                .map(|ms| vec![ScriptStep::Wait(ms)])
                .map_err(|e| parse_error(e.to_string())),
            ["move", dx, dy] => {
                let (xrel, yrel) = (int(dx, line_num)?, int(dy, line_num)?);
                event(HostEvent::motion(xrel, yrel, HostButtonMask::empty()))
            }
            ["click", button] => {
                let button = button_number(button, line_num)?;
                Ok(vec![
                    ScriptStep::Event(HostEvent::button_down(button, 0, 0)),
                    ScriptStep::Event(HostEvent::button_up(button, 0, 0)),
                ])
            }
            ["down", button] => event(HostEvent::button_down(button_number(button, line_num)?, 0, 0)),
            ["up", button] => event(HostEvent::button_up(button_number(button, line_num)?, 0, 0)),
            ["wheel", dx, dy] => event(HostEvent::Wheel {
                dx: int(dx, line_num)?,
                dy: int(dy, line_num)?,
            }),
            ["touch", phase, finger, x, y] => {
                let phase = match *phase {
                    "down" => TouchPhase::Down,
                    "move" => TouchPhase::Motion,
                    "up" => TouchPhase::Up,
                    other => return Err(parse_error(format!("unknown touch phase {}", other))),
                };
                event(HostEvent::Touch {
                    phase,
                    device: 0,
                    finger: int(finger, line_num)? as u16,
                    x: int(x, line_num)?,
                    y: int(y, line_num)?,
                })
            }
            ["focus", "in"] => event(HostEvent::Window(WindowEvent::FocusGained)),
            ["focus", "out"] => event(HostEvent::Window(WindowEvent::FocusLost)),
            ["expose"] => event(HostEvent::Window(WindowEvent::Exposed)),
            ["resize", w, h] => event(HostEvent::Window(WindowEvent::Resized {
                width: int(w, line_num)? as u32,
                height: int(h, line_num)? as u32,
            })),
            [key] => {
                let (modifiers, name) = parse_modifiers(key)?;
                let scancode = parse_scancode(name).map_err(|e| parse_error(e.to_string()))?;
                Ok(press(scancode, modifiers).to_vec())
            }
            _ => Err(parse_error(format!("unrecognized line {:?}", line))),
        }
    }

    /// Returns the next step, if any
    pub fn next_step(&mut self) -> Option<ScriptStep> {
        self.steps.pop_front()
    }

    pub fn has_more(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Number of steps left
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

fn press(scancode: u16, modifiers: HostKeyMod) -> [ScriptStep; 2] {
    [
        ScriptStep::Event(HostEvent::key_down(scancode, modifiers)),
        ScriptStep::Event(HostEvent::key_up(scancode, modifiers)),
    ]
}

fn int(word: &str, line: usize) -> Result<i32, HostScriptError> {
    word.parse().map_err(|_| HostScriptError::ParseError {
        line,
        message: format!("expected a number, got {:?}", word),
    })
}

fn button_number(word: &str, line: usize) -> Result<u8, HostScriptError> {
    match int(word, line)? {
        n @ 1..=8 => Ok(n as u8),
        n => Err(HostScriptError::ParseError {
            line,
            message: format!("button {} out of range 1-8", n),
        }),
    }
}

/// Splits `Ctrl+Shift+a` into host modifier bits and the key name
fn parse_modifiers(input: &str) -> Result<(HostKeyMod, &str), HostScriptError> {
    let parts: Vec<&str> = input.split('+').collect();
    let Some((key, mods)) = parts.split_last() else {
        return Ok((HostKeyMod::empty(), input));
    };

    let mut modifiers = HostKeyMod::empty();
    for modifier in mods {
        modifiers |= match modifier.to_lowercase().as_str() {
            "ctrl" | "control" => HostKeyMod::LCTRL,
            "shift" => HostKeyMod::LSHIFT,
            "alt" => HostKeyMod::LALT,
            "super" | "meta" => HostKeyMod::LGUI,
            other => return Err(HostScriptError::InvalidModifier(other.to_string())),
        };
    }
    Ok((modifiers, key))
}

/// Maps a key name to its USB HID usage
fn parse_scancode(name: &str) -> Result<u16, HostScriptError> {
    let lower = name.to_lowercase();
    let code = match lower.as_str() {
        "enter" | "return" => KeyCode::RETURN,
        "escape" | "esc" => KeyCode::ESCAPE,
        "backspace" => KeyCode::BACKSPACE,
        "tab" => KeyCode::TAB,
        "space" => KeyCode::SPACE,
        "capslock" => KeyCode::CAPS_LOCK,
        "up" => KeyCode::UP_ARROW,
        "down" => KeyCode::DOWN_ARROW,
        "left" => KeyCode::LEFT_ARROW,
        "right" => KeyCode::RIGHT_ARROW,
        _ => {
            if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u16>().ok()) {
                if (1..=12).contains(&n) {
                    return Ok(KeyCode::F1.0 + n - 1);
                }
            }
            let mut chars = name.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => char_to_scancode(c),
                _ => None,
            }
            .ok_or_else(|| HostScriptError::InvalidKeyName(name.to_string()));
        }
    };
    Ok(code.0)
}

fn char_to_scancode(c: char) -> Option<u16> {
    match c.to_ascii_lowercase() {
        c @ 'a'..='z' => Some(KeyCode::A.0 + (c as u16 - 'a' as u16)),
        '0' => Some(KeyCode::NUM0.0),
        c @ '1'..='9' => Some(KeyCode::NUM1.0 + (c as u16 - '1' as u16)),
        ' ' => Some(KeyCode::SPACE.0),
        _ => None,
    }
}

/// Parses a duration string (e.g., "100ms", "1s")
fn parse_duration(s: &str) -> Result<u64, HostScriptError> {
    let s = s.trim().to_lowercase();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim()
            .parse::<u64>()
            .map_err(|_| HostScriptError::InvalidDelay(s.clone()))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim()
            .parse::<u64>()
            .map(|secs| secs * 1000)
            .map_err(|_| HostScriptError::InvalidDelay(s.clone()))
    } else {
        Err(HostScriptError::InvalidDelay(s))
    }
}
