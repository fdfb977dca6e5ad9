mod r#loop;
mod timers;

pub use r#loop::LoopExit;

use crate::capture::{self, Interceptor, OutputHandle, Stream};
use crate::config::TrackerConfig;
use crate::events::TaskEvent;
use crate::events::projector::TaskTree;
use crate::input::{self, Action, RawKeyboard};
use crate::render::{Renderer, ViewMode};
use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::event::KeyEvent;
use std::io::{self, IsTerminal};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use thiserror::Error;
use timers::Timer;
use tracing::{debug, info, warn};

pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("tracker is no longer running")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

#[derive(Debug, Clone)]
pub enum TrackerMessage {
    Task(TaskEvent),
    Pause,
    Resume,
    Close,
}

pub struct Tracker {
    config: TrackerConfig,
    tree: TaskTree,
    output: Interceptor,
    renderer: Renderer,
    view: ViewMode,
    truncate: bool,
    paused: bool,
    phase: Phase,
    interactive: bool,
    render_timer: Timer,
    completion_timer: Timer,
    keyboard: Option<RawKeyboard>,
    inbox: Receiver<TrackerMessage>,
    outbox: Sender<TrackerMessage>,
}

impl Tracker {
    pub fn install(config: TrackerConfig) -> Result<Self> {
        let output = Interceptor::install().context("install output capture")?;
        Ok(Self::new(config, output))
    }

    pub fn new(config: TrackerConfig, output: Interceptor) -> Self {
        let interactive = config
            .interactive
            .unwrap_or_else(|| io::stderr().is_terminal());
        let (outbox, inbox) = mpsc::channel();
        Self {
            renderer: Renderer::new(&config.title, config.spinner_interval_ms, config.color),
            render_timer: Timer::new(config.spinner_interval()),
            completion_timer: Timer::new(config.inactivity_threshold()),
            truncate: config.truncate_output,
            tree: TaskTree::new(),
            output,
            view: ViewMode::default(),
            paused: false,
            phase: Phase::Idle,
            interactive,
            keyboard: None,
            inbox,
            outbox,
            config,
        }
    }

    pub fn handle(&self) -> TrackerHandle {
        TrackerHandle {
            tx: self.outbox.clone(),
            stdout: self.output.stdout(),
            stderr: self.output.stderr(),
        }
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn truncates(&self) -> bool {
        self.truncate
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn keyboard_captured(&self) -> bool {
        self.keyboard.is_some()
    }

    pub fn output(&self) -> &Interceptor {
        &self.output
    }

    pub fn start(&mut self) -> Result<()> {
        self.start_at(Instant::now())
    }

    pub fn start_at(&mut self, now: Instant) -> Result<()> {
        match self.phase {
            Phase::Running => return Ok(()),
            Phase::Closed => {
                warn!("start called on a closed tracker");
                return Ok(());
            }
            Phase::Idle => {}
        }

        if self.interactive {
            self.render_timer.schedule(now);
            if self.config.keyboard && io::stdin().is_terminal() {
                self.keyboard = Some(RawKeyboard::enable()?);
            }
        }
        self.completion_timer.schedule(now);
        self.phase = Phase::Running;
        info!(
            interactive = self.interactive,
            keyboard = self.keyboard.is_some(),
            "tracker started"
        );
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        self.start()?;
        if r#loop::run_tracker_loop(self)? == LoopExit::Interrupted {
            self.keyboard.take();
            std::process::exit(EXIT_INTERRUPTED);
        }
        Ok(())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.render_timer.due(), self.completion_timer.due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn tick(&mut self, now: Instant) -> Result<()> {
        if self.phase != Phase::Running {
            return Ok(());
        }
        self.drain_inbox()?;

        if self.render_timer.fire(now) {
            self.render()?;
            self.render_timer.schedule(now);
        }

        if self.completion_timer.fire(now) {
            if self.tree.all_terminal() {
                info!(tasks = self.tree.len(), "all tasks finished");
                self.close()?;
            } else {
                self.completion_timer.schedule(now);
            }
        }
        Ok(())
    }

    pub fn drain_inbox(&mut self) -> Result<()> {
        while let Ok(message) = self.inbox.try_recv() {
            self.handle_message(message)?;
        }
        Ok(())
    }

    pub(crate) fn wait_message(&self, timeout: Duration) -> Option<TrackerMessage> {
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn handle_message(&mut self, message: TrackerMessage) -> Result<()> {
        match message {
            TrackerMessage::Task(ev) => {
                self.add_event(&ev);
                Ok(())
            }
            TrackerMessage::Pause => self.pause(),
            TrackerMessage::Resume => self.resume(),
            TrackerMessage::Close => self.close(),
        }
    }

    pub fn add_event(&mut self, ev: &TaskEvent) {
        if self.phase == Phase::Closed {
            debug!(task_id = ev.task_id(), "tracker closed, dropping task event");
            return;
        }
        self.tree.apply_event(ev);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<Control> {
        match input::action_for(&key) {
            Some(action) => self.apply_action(action),
            None => Ok(Control::Continue),
        }
    }

    pub fn apply_action(&mut self, action: Action) -> Result<Control> {
        match action {
            Action::Exit => return Ok(Control::Exit),
            Action::ToggleTruncation => self.toggle_truncation()?,
            Action::PrevView => self.show_view(self.view.prev())?,
            Action::NextView => self.show_view(self.view.next())?,
        }
        Ok(Control::Continue)
    }

    pub fn toggle_truncation(&mut self) -> Result<()> {
        self.truncate = !self.truncate;
        self.render()
    }

    pub fn show_view(&mut self, view: ViewMode) -> Result<()> {
        self.view = view;
        self.render()
    }

    pub fn render(&mut self) -> Result<()> {
        self.render_at(Utc::now().timestamp_millis())
    }

    pub fn render_at(&mut self, now_ms: i64) -> Result<()> {
        if self.phase != Phase::Running || self.paused || !self.interactive {
            return Ok(());
        }
        let captured = match self.view {
            ViewMode::Tasks => Vec::new(),
            ViewMode::Stdout => self.output.captured(Stream::Out),
            ViewMode::Stderr => self.output.captured(Stream::Err),
        };
        let frame = self
            .renderer
            .frame(self.view, self.truncate, &self.tree, &captured, now_ms);
        self.renderer
            .draw(&frame, &self.output)
            .context("draw tracker frame")
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.phase != Phase::Running || self.paused {
            return Ok(());
        }
        if self.interactive {
            self.renderer
                .clear(&self.output)
                .context("clear tracker frame")?;
        }
        self.paused = true;
        self.output.set_paused(true);
        debug!("tracker paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.phase != Phase::Running || !self.paused {
            return Ok(());
        }
        self.paused = false;
        self.output.set_paused(false);
        debug!("tracker resumed");
        self.render()
    }

    pub fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.render_timer.cancel();
        self.completion_timer.cancel();
        self.keyboard.take();
        self.output.restore();

        let stderr = capture::decode(&self.output.captured(Stream::Err));
        let stdout = capture::decode(&self.output.captured(Stream::Out));
        let done = self.renderer.banner(" Completed all tasks. ");
        let stderr_title = self.renderer.banner(" stderr: ");
        let stdout_title = self.renderer.banner(" stdout: ");
        let final_lines: [&str; 13] = [
            "",
            "",
            &done,
            "",
            "",
            &stderr_title,
            "",
            &stderr,
            "",
            &stdout_title,
            "",
            &stdout,
            "",
        ];
        self.output
            .write_err(final_lines.join("\n").as_bytes())
            .context("write tracker summary")?;
        info!(tasks = self.tree.len(), "tracker closed");
        Ok(())
    }
}

#[derive(Clone)]
pub struct TrackerHandle {
    tx: Sender<TrackerMessage>,
    stdout: OutputHandle,
    stderr: OutputHandle,
}

impl TrackerHandle {
    pub fn send(&self, ev: TaskEvent) -> Result<(), TrackerError> {
        self.post(TrackerMessage::Task(ev))
    }

    pub fn pause(&self) -> Result<(), TrackerError> {
        self.post(TrackerMessage::Pause)
    }

    pub fn resume(&self) -> Result<(), TrackerError> {
        self.post(TrackerMessage::Resume)
    }

    pub fn close(&self) -> Result<(), TrackerError> {
        self.post(TrackerMessage::Close)
    }

    pub fn stdout(&self) -> OutputHandle {
        self.stdout.clone()
    }

    pub fn stderr(&self) -> OutputHandle {
        self.stderr.clone()
    }

    fn post(&self, message: TrackerMessage) -> Result<(), TrackerError> {
        self.tx.send(message).map_err(|_| TrackerError::Disconnected)
    }
}
