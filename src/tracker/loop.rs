use crate::tracker::{Control, Phase, Tracker};
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use std::time::{Duration, Instant};

const INPUT_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Closed,
    Interrupted,
}

pub(crate) fn run_tracker_loop(tracker: &mut Tracker) -> Result<LoopExit> {
    while tracker.phase() == Phase::Running {
        tracker.tick(Instant::now())?;
        if tracker.phase() != Phase::Running {
            break;
        }

        let wait = tracker
            .next_deadline()
            .map(|due| due.saturating_duration_since(Instant::now()))
            .unwrap_or(INPUT_POLL)
            .min(INPUT_POLL);

        if tracker.keyboard_captured() {
            if !event::poll(wait).context("poll keyboard")? {
                continue;
            }
            if let Event::Key(key) = event::read().context("read keyboard")?
                && key.kind != KeyEventKind::Release
                && tracker.handle_key(key)? == Control::Exit
            {
                return Ok(LoopExit::Interrupted);
            }
        } else if let Some(message) = tracker.wait_message(wait) {
            tracker.handle_message(message)?;
        }
    }
    Ok(LoopExit::Closed)
}
