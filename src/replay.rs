use crate::events::AnyEvent;
use crate::tracker::TrackerHandle;
use anyhow::Result;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

pub fn spawn_replay(
    handle: TrackerHandle,
    events: Vec<AnyEvent>,
    delay: Duration,
) -> JoinHandle<Result<usize>> {
    thread::spawn(move || {
        let mut sent = 0;
        for ev in events {
            match ev {
                AnyEvent::Task(task) => {
                    handle.send(task)?;
                    sent += 1;
                    thread::sleep(delay);
                }
                AnyEvent::Event(other) => {
                    debug!(event_id = other.id(), "skipping non-task event during replay");
                }
            }
        }
        Ok(sent)
    })
}
