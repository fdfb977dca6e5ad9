use crate::events::{ROOT_TASK_ID, TaskEvent, TaskStatus};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub id: String,
    pub name: String,
    pub status: Option<TaskStatus>,
    pub inputs: Option<Value>,
    pub output: Option<Value>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl TaskNode {
    fn new(id: &str, parent: Option<usize>) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            status: None,
            inputs: None,
            output: None,
            parent,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskTree {
    nodes: Vec<TaskNode>,
    index: HashMap<String, usize>,
}

impl Default for TaskTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTree {
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(ROOT_TASK_ID.to_string(), 0);
        Self {
            nodes: vec![TaskNode::new(ROOT_TASK_ID, None)],
            index,
        }
    }

    pub fn apply_event(&mut self, ev: &TaskEvent) {
        let task_id = ev.task_id();
        if task_id.is_empty() || task_id == ROOT_TASK_ID {
            warn!(event_id = ev.event().id(), task_id, "ignoring task event without a usable task id");
            return;
        }

        let idx = match self.index.get(task_id) {
            Some(&idx) => idx,
            None => self.insert(ev),
        };

        let node = &mut self.nodes[idx];
        node.status = Some(ev.status());
        node.output = ev.output().cloned();
    }

    fn insert(&mut self, ev: &TaskEvent) -> usize {
        let parent_id = ev.parent_task_id();
        // Orphans attach to root and stay there even if the parent shows up later.
        let parent = match self.index.get(parent_id) {
            Some(&idx) => idx,
            None => {
                debug!(task_id = ev.task_id(), parent_id, "parent unknown, attaching task to root");
                0
            }
        };

        let idx = self.nodes.len();
        let mut node = TaskNode::new(ev.task_id(), Some(parent));
        node.name = ev.name().to_string();
        node.inputs = ev.inputs().cloned();
        self.nodes.push(node);
        self.nodes[parent].children.push(idx);
        self.index.insert(ev.task_id().to_string(), idx);
        idx
    }

    pub fn replay(events: &[TaskEvent]) -> Self {
        let mut tree = Self::new();
        for ev in events {
            tree.apply_event(ev);
        }
        tree
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn root(&self) -> &TaskNode {
        &self.nodes[0]
    }

    pub fn children(&self, id: Option<&str>) -> Vec<&TaskNode> {
        let Some(&idx) = self.index.get(id.unwrap_or(ROOT_TASK_ID)) else {
            return Vec::new();
        };
        self.nodes[idx]
            .children
            .iter()
            .map(|&child| &self.nodes[child])
            .collect()
    }

    pub fn parent_of(&self, id: &str) -> Option<&TaskNode> {
        self.index
            .get(id)
            .and_then(|&idx| self.nodes[idx].parent)
            .map(|parent| &self.nodes[parent])
    }

    // Vacuously true before any task is seen.
    pub fn all_terminal(&self) -> bool {
        self.nodes[1..]
            .iter()
            .all(|node| node.status.is_some_and(TaskStatus::is_terminal))
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes[1..].iter()
    }
}
