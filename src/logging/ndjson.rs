use crate::events::AnyEvent;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub fn mirror_event(path: &Path, ev: &AnyEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{}", ev.to_wire())?;
    Ok(())
}

pub fn read_events(path: &Path) -> Result<Vec<AnyEvent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read event log {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            AnyEvent::from_wire(line)
                .with_context(|| format!("{} line {}", path.display(), idx + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventData, TaskEvent, TaskPayload, TaskStatus};
    use tempfile::tempdir;

    #[test]
    fn mirrored_events_read_back_in_order() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("logs").join("events.ndjson");
        let first: AnyEvent =
            TaskEvent::new(TaskPayload::new("t1", "fetch", TaskStatus::Running)).into();
        let second: AnyEvent = Event::new(EventData::default()).into();
        mirror_event(&path, &first).unwrap();
        mirror_event(&path, &second).unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events, vec![first, second]);
    }

    #[test]
    fn bad_line_is_reported_with_its_number() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("events.ndjson");
        std::fs::write(
            &path,
            "\n{\"id\":\"a\",\"payload\":null,\"version\":1,\"type\":\"Nope\"}\n",
        )
        .unwrap();
        let err = read_events(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(format!("{err:#}").contains("unknown event type"));
    }
}
