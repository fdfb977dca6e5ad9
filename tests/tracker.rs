use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::json;
use std::io::Write;
use std::time::{Duration, Instant};
use taskline::capture::{Interceptor, MemorySink};
use taskline::config::TrackerConfig;
use taskline::events::{TaskEvent, TaskPayload, TaskStatus};
use taskline::render::ViewMode;
use taskline::tracker::{Control, Phase, Tracker};

fn config(interactive: bool) -> TrackerConfig {
    TrackerConfig {
        interactive: Some(interactive),
        keyboard: false,
        color: false,
        ..TrackerConfig::default()
    }
}

fn tracker(interactive: bool) -> (Tracker, MemorySink) {
    let sink = MemorySink::new();
    let tracker = Tracker::new(config(interactive), Interceptor::with_sink(sink.clone()));
    (tracker, sink)
}

fn ctrl(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
}

#[test]
fn completion_check_closes_once_every_task_is_done() {
    let (mut tracker, _sink) = tracker(false);
    let start = Instant::now();
    tracker.start_at(start).unwrap();
    let handle = tracker.handle();

    handle
        .send(TaskEvent::new(TaskPayload::new("t1", "fetch", TaskStatus::Running)))
        .unwrap();
    tracker.tick(start + Duration::from_secs(3)).unwrap();
    assert_eq!(tracker.phase(), Phase::Running);

    handle
        .send(TaskEvent::new(
            TaskPayload::new("t1", "fetch", TaskStatus::Completed).output(json!({"n": 42})),
        ))
        .unwrap();
    // The check was rescheduled a full threshold after the previous one.
    tracker.tick(start + Duration::from_millis(5_999)).unwrap();
    assert_eq!(tracker.phase(), Phase::Running);
    tracker.tick(start + Duration::from_secs(6)).unwrap();
    assert_eq!(tracker.phase(), Phase::Closed);
    assert!(tracker.next_deadline().is_none());
}

#[test]
fn close_prints_banner_and_both_buffers_once() {
    let (mut tracker, sink) = tracker(false);
    tracker.start_at(Instant::now()).unwrap();
    let handle = tracker.handle();
    writeln!(handle.stdout(), "hello out").unwrap();
    writeln!(handle.stderr(), "hello err").unwrap();

    sink.clear();
    tracker.close().unwrap();
    let summary = sink.err_string();
    assert!(summary.contains(" Completed all tasks. "));
    let stderr_at = summary.find(" stderr: ").unwrap();
    let stdout_at = summary.find(" stdout: ").unwrap();
    assert!(stderr_at < stdout_at);
    assert!(summary[stderr_at..stdout_at].contains("hello err"));
    assert!(summary[stdout_at..].contains("hello out"));

    tracker.close().unwrap();
    assert_eq!(sink.err_string(), summary);
    assert!(!tracker.output().is_capturing());
}

#[test]
fn writes_after_close_pass_through_uncaptured() {
    let (mut tracker, sink) = tracker(false);
    tracker.start_at(Instant::now()).unwrap();
    let mut out = tracker.handle().stdout();
    tracker.close().unwrap();
    writeln!(out, "late").unwrap();
    assert!(tracker.output().buffers().stdout.is_empty());
    assert_eq!(sink.out_string(), "late\n");
}

#[test]
fn task_events_after_close_are_dropped() {
    let (mut tracker, _sink) = tracker(false);
    tracker.start_at(Instant::now()).unwrap();
    tracker.close().unwrap();
    tracker.add_event(&TaskEvent::new(TaskPayload::new(
        "t1",
        "fetch",
        TaskStatus::Running,
    )));
    assert!(tracker.tree().is_empty());
}

#[test]
fn render_tick_draws_the_task_view() {
    let (mut tracker, sink) = tracker(true);
    let start = Instant::now();
    tracker.start_at(start).unwrap();
    tracker.add_event(&TaskEvent::new(
        TaskPayload::new("t1", "fetch", TaskStatus::Running).inputs(json!({"q": "x"})),
    ));

    tracker.tick(start + Duration::from_millis(99)).unwrap();
    assert!(sink.err_string().is_empty());
    tracker.tick(start + Duration::from_millis(100)).unwrap();
    let drawn = sink.err_string();
    assert!(drawn.contains(" taskline - Tasks View"));
    assert!(drawn.contains(r#"fetch({"q":"x"})"#));
    assert!(tracker.output().buffers().stderr.is_empty());
}

#[test]
fn headless_tracker_never_draws() {
    let (mut tracker, sink) = tracker(false);
    let start = Instant::now();
    tracker.start_at(start).unwrap();
    tracker.add_event(&TaskEvent::new(TaskPayload::new(
        "t1",
        "fetch",
        TaskStatus::Running,
    )));
    tracker.tick(start + Duration::from_secs(1)).unwrap();
    tracker.render().unwrap();
    assert!(sink.err_string().is_empty());
}

#[test]
fn keys_switch_views_and_truncation() {
    let (mut tracker, sink) = tracker(true);
    tracker.start_at(Instant::now()).unwrap();
    writeln!(tracker.handle().stdout(), "captured line").unwrap();

    assert_eq!(tracker.handle_key(ctrl(KeyCode::Right)).unwrap(), Control::Continue);
    assert_eq!(tracker.view(), ViewMode::Stdout);
    assert!(sink.err_string().contains(" taskline - Stdout View"));
    assert!(sink.err_string().contains("captured line"));

    tracker.handle_key(ctrl(KeyCode::Left)).unwrap();
    tracker.handle_key(ctrl(KeyCode::Left)).unwrap();
    assert_eq!(tracker.view(), ViewMode::Stderr);

    assert!(!tracker.truncates());
    tracker.handle_key(ctrl(KeyCode::Char('e'))).unwrap();
    assert!(tracker.truncates());

    assert_eq!(
        tracker.handle_key(ctrl(KeyCode::Char('c'))).unwrap(),
        Control::Exit
    );
    assert_eq!(
        tracker
            .handle_key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE))
            .unwrap(),
        Control::Continue
    );
}

#[test]
fn pause_clears_and_suspends_capture_until_resume() {
    let (mut tracker, sink) = tracker(true);
    tracker.start_at(Instant::now()).unwrap();
    let handle = tracker.handle();

    handle.pause().unwrap();
    tracker.drain_inbox().unwrap();
    assert!(tracker.is_paused());
    assert!(sink.err_string().contains("\u{1b}[J"));

    writeln!(handle.stdout(), "while paused").unwrap();
    sink.clear();
    tracker.render_at(0).unwrap();
    assert!(sink.err_string().is_empty());

    handle.resume().unwrap();
    tracker.drain_inbox().unwrap();
    assert!(!tracker.is_paused());
    assert!(sink.err_string().contains(" taskline - Tasks View"));

    writeln!(handle.stdout(), "after resume").unwrap();
    assert_eq!(tracker.output().buffers().stdout_text(), "after resume\n");
}

#[test]
fn handle_close_message_closes_the_tracker() {
    let (mut tracker, _sink) = tracker(false);
    tracker.start_at(Instant::now()).unwrap();
    let handle = tracker.handle();
    handle.close().unwrap();
    tracker.drain_inbox().unwrap();
    assert_eq!(tracker.phase(), Phase::Closed);
}

#[test]
fn run_returns_when_the_workload_finishes() {
    let cfg = TrackerConfig {
        inactivity_threshold_ms: 10,
        ..config(false)
    };
    let mut tracker = Tracker::new(cfg, Interceptor::with_sink(MemorySink::new()));
    let handle = tracker.handle();
    let worker = std::thread::spawn(move || {
        handle
            .send(TaskEvent::new(TaskPayload::new("t1", "fetch", TaskStatus::Failed)))
            .unwrap();
    });
    worker.join().unwrap();
    tracker.run().unwrap();
    assert_eq!(tracker.phase(), Phase::Closed);
    assert_eq!(
        tracker.tree().get("t1").unwrap().status,
        Some(TaskStatus::Failed)
    );
}

#[test]
fn each_view_draws_only_its_own_stream() {
    let (mut tracker, sink) = tracker(true);
    tracker.start_at(Instant::now()).unwrap();
    let handle = tracker.handle();
    writeln!(handle.stdout(), "only on stdout").unwrap();
    writeln!(handle.stderr(), "only on stderr").unwrap();
    sink.clear();

    tracker.render_at(0).unwrap();
    let tasks = sink.err_string();
    assert!(!tasks.contains("only on stdout"));
    assert!(!tasks.contains("only on stderr"));

    sink.clear();
    tracker.show_view(ViewMode::Stderr).unwrap();
    let stderr_view = sink.err_string();
    assert!(stderr_view.contains("only on stderr"));
    assert!(!stderr_view.contains("only on stdout"));
}

#[test]
fn summary_keeps_formatted_lines_apart() {
    let (mut tracker, sink) = tracker(false);
    tracker.start_at(Instant::now()).unwrap();
    let mut err = tracker.handle().stderr();
    for attempt in 1..=2 {
        writeln!(err, "attempt {attempt} failed").unwrap();
    }
    sink.clear();
    tracker.close().unwrap();
    assert!(sink.err_string().contains("attempt 1 failed\nattempt 2 failed\n"));
}
