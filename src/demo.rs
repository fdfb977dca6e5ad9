use crate::events::{AnyEvent, TaskEvent, TaskPayload, TaskStatus};
use crate::logging::ndjson;
use crate::tracker::TrackerHandle;
use anyhow::Result;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub step: Duration,
    pub fail: bool,
    pub record: Option<PathBuf>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(400),
            fail: false,
            record: None,
        }
    }
}

struct Emitter {
    handle: TrackerHandle,
    opts: DemoOptions,
}

impl Emitter {
    fn emit(&self, payload: TaskPayload) -> Result<()> {
        let ev = TaskEvent::new(payload);
        if let Some(path) = &self.opts.record {
            ndjson::mirror_event(path, &AnyEvent::Task(ev.clone()))?;
        }
        self.handle.send(ev)?;
        thread::sleep(self.opts.step);
        Ok(())
    }
}

pub fn spawn_demo(handle: TrackerHandle, opts: DemoOptions) -> JoinHandle<Result<()>> {
    thread::spawn(move || run_demo(Emitter { handle, opts }))
}

fn run_demo(em: Emitter) -> Result<()> {
    let mut out = em.handle.stdout();
    let mut err = em.handle.stderr();
    let question = "How do I build a product that people will love?";

    em.emit(
        TaskPayload::new("research", "research", TaskStatus::Running)
            .inputs(json!({"question": question})),
    )?;
    // Queued up front so the run is not considered finished between stages.
    em.emit(
        TaskPayload::new("notify", "notify", TaskStatus::Pending).inputs(json!({"to": "team"})),
    )?;

    em.emit(
        TaskPayload::new("search", "search", TaskStatus::Running)
            .parent("research")
            .inputs(json!({"query": "product love experts", "n": 5})),
    )?;
    writeln!(out, "search: querying 3 sources")?;
    em.emit(
        TaskPayload::new("search", "search", TaskStatus::Completed)
            .parent("research")
            .output(json!(["Kathy Sierra", "Marty Cagan", "Teresa Torres"])),
    )?;

    em.emit(
        TaskPayload::new("summarize", "summarize", TaskStatus::Running)
            .parent("research")
            .inputs(json!({"experts": 3})),
    )?;
    writeln!(err, "summarize: upstream rate limited, retrying")?;
    em.emit(
        TaskPayload::new("summarize", "summarize", TaskStatus::Retrying)
            .parent("research")
            .output(json!("rate limited")),
    )?;
    em.emit(
        TaskPayload::new("summarize", "summarize", TaskStatus::Running).parent("research"),
    )?;

    let (status, output) = if em.opts.fail {
        writeln!(err, "summarize: giving up after retries")?;
        (TaskStatus::Failed, json!("retries exhausted"))
    } else {
        writeln!(out, "summarize: 3 answers drafted")?;
        (
            TaskStatus::Completed,
            json!({"answers": 3, "summary": "Start from the user's problem, ship small, listen."}),
        )
    };
    em.emit(
        TaskPayload::new("summarize", "summarize", status)
            .parent("research")
            .output(output.clone()),
    )?;
    em.emit(TaskPayload::new("research", "research", status).output(output))?;

    em.emit(TaskPayload::new("notify", "notify", TaskStatus::Running))?;
    writeln!(out, "notify: sent summary to team")?;
    em.emit(
        TaskPayload::new("notify", "notify", TaskStatus::Completed).output(json!({"sent": true})),
    )?;
    Ok(())
}
