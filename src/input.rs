use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Exit,
    ToggleTruncation,
    PrevView,
    NextView,
}

pub fn action_for(key: &KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release || !key.modifiers.contains(KeyModifiers::CONTROL) {
        return None;
    }
    match key.code {
        KeyCode::Char('c') => Some(Action::Exit),
        KeyCode::Char('e') => Some(Action::ToggleTruncation),
        KeyCode::Left => Some(Action::PrevView),
        KeyCode::Right => Some(Action::NextView),
        _ => None,
    }
}

pub struct RawKeyboard {
    _private: (),
}

impl RawKeyboard {
    pub fn enable() -> Result<Self> {
        enable_raw_mode().context("enable raw keyboard mode")?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawKeyboard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}
