pub mod projector;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub type Payload = Map<String, Value>;

pub const ROOT_TASK_ID: &str = "root";

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown event type: {0:?}")]
    UnknownEventType(String),
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid event timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("event payload must be an object")]
    NotAnObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl TaskStatus {
    /// Only COMPLETED and FAILED end a task. SKIPPED and CANCELLED do not.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Retrying => "RETRYING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Skipped => "SKIPPED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(TaskStatus::Pending),
            "RUNNING" => Some(TaskStatus::Running),
            "RETRYING" => Some(TaskStatus::Retrying),
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            "SKIPPED" => Some(TaskStatus::Skipped),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventData {
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub payload: Option<Payload>,
    pub version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: String,
    timestamp: DateTime<Utc>,
    payload: Option<Payload>,
    version: i64,
}

impl Event {
    pub fn new(data: EventData) -> Self {
        Self {
            id: data.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            // The wire format carries milliseconds; hold the same precision.
            timestamp: data.timestamp.unwrap_or_else(Utc::now).trunc_subsecs(3),
            payload: data.payload,
            version: data.version.unwrap_or(1),
        }
    }

    pub fn with_payload(payload: &Payload) -> Self {
        Self::new(EventData {
            payload: Some(payload.clone()),
            ..EventData::default()
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn to_wire(&self) -> String {
        self.encode(EventKind::Event)
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.payload
            .as_ref()
            .and_then(|p| p.get(key))
            .filter(|v| !v.is_null())
    }

    fn encode(&self, kind: EventKind) -> String {
        let wire = WireEventRef {
            id: &self.id,
            timestamp: self
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            payload: self.payload.as_ref(),
            version: self.version,
            kind: kind.as_str(),
        };
        // A map of JSON values with string keys always serializes.
        serde_json::to_string(&wire).unwrap_or_default()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match &self.payload {
            Some(p) => Value::Object(p.clone()).to_string(),
            None => "undefined".to_string(),
        };
        write!(
            f,
            "Event {{ id: {}, timestamp: {}, payload: {} }}",
            self.id,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            payload
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub task_name: String,
    pub task_id: String,
    pub task_status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_inputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
}

impl TaskPayload {
    pub fn new(task_id: &str, task_name: &str, task_status: TaskStatus) -> Self {
        Self {
            task_name: task_name.to_string(),
            task_id: task_id.to_string(),
            task_status,
            task_inputs: None,
            task_output: None,
            parent_task_id: None,
        }
    }

    pub fn parent(mut self, parent_task_id: &str) -> Self {
        self.parent_task_id = Some(parent_task_id.to_string());
        self
    }

    pub fn inputs(mut self, inputs: Value) -> Self {
        self.task_inputs = Some(inputs);
        self
    }

    pub fn output(mut self, output: Value) -> Self {
        self.task_output = Some(output);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskEvent {
    event: Event,
}

impl TaskEvent {
    pub fn new(payload: TaskPayload) -> Self {
        let payload = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        Self::from_data(EventData {
            payload,
            ..EventData::default()
        })
    }

    pub fn from_data(data: EventData) -> Self {
        Self {
            event: Event::new(data),
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn name(&self) -> &str {
        self.event
            .field("taskName")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn task_id(&self) -> &str {
        self.event
            .field("taskId")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    // Absent or unrecognised status reads as RUNNING.
    pub fn status(&self) -> TaskStatus {
        self.event
            .field("taskStatus")
            .and_then(Value::as_str)
            .and_then(TaskStatus::parse)
            .unwrap_or(TaskStatus::Running)
    }

    pub fn inputs(&self) -> Option<&Value> {
        self.event.field("taskInputs")
    }

    pub fn output(&self) -> Option<&Value> {
        self.event.field("taskOutput")
    }

    pub fn parent_task_id(&self) -> &str {
        self.event
            .field("parentTaskId")
            .and_then(Value::as_str)
            .unwrap_or(ROOT_TASK_ID)
    }

    pub fn to_wire(&self) -> String {
        self.event.encode(EventKind::TaskEvent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Event,
    TaskEvent,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Event => "Event",
            EventKind::TaskEvent => "TaskEvent",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Event" => Some(EventKind::Event),
            "TaskEvent" => Some(EventKind::TaskEvent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnyEvent {
    Event(Event),
    Task(TaskEvent),
}

impl AnyEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AnyEvent::Event(_) => EventKind::Event,
            AnyEvent::Task(_) => EventKind::TaskEvent,
        }
    }

    pub fn event(&self) -> &Event {
        match self {
            AnyEvent::Event(ev) => ev,
            AnyEvent::Task(ev) => ev.event(),
        }
    }

    pub fn to_wire(&self) -> String {
        self.event().encode(self.kind())
    }

    pub fn from_wire(raw: &str) -> Result<Self, EventError> {
        let wire: WireEvent = serde_json::from_str(raw)?;
        let kind_raw = wire.kind.unwrap_or_default();
        let kind =
            EventKind::parse(&kind_raw).ok_or(EventError::UnknownEventType(kind_raw))?;

        let timestamp = wire.timestamp.map(parse_timestamp).transpose()?;
        let payload = match wire.payload {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => return Err(EventError::NotAnObject),
        };

        let data = EventData {
            id: wire.id,
            timestamp,
            payload,
            version: wire.version,
        };
        Ok(match kind {
            EventKind::Event => AnyEvent::Event(Event::new(data)),
            EventKind::TaskEvent => AnyEvent::Task(TaskEvent::from_data(data)),
        })
    }
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, EventError> {
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(source) => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| EventError::InvalidTimestamp { value: raw, source }),
    }
}

impl From<TaskEvent> for AnyEvent {
    fn from(ev: TaskEvent) -> Self {
        AnyEvent::Task(ev)
    }
}

impl From<Event> for AnyEvent {
    fn from(ev: Event) -> Self {
        AnyEvent::Event(ev)
    }
}

#[derive(Serialize)]
struct WireEventRef<'a> {
    id: &'a str,
    timestamp: String,
    payload: Option<&'a Payload>,
    version: i64,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct WireEvent {
    id: Option<String>,
    timestamp: Option<String>,
    payload: Option<Value>,
    version: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
}
