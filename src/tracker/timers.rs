use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct Timer {
    period: Duration,
    due: Option<Instant>,
}

impl Timer {
    pub(crate) fn new(period: Duration) -> Self {
        Self { period, due: None }
    }

    pub(crate) fn schedule(&mut self, from: Instant) {
        self.due = Some(from + self.period);
    }

    pub(crate) fn cancel(&mut self) {
        self.due = None;
    }

    pub(crate) fn due(&self) -> Option<Instant> {
        self.due
    }

    pub(crate) fn fire(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if due <= now => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}
