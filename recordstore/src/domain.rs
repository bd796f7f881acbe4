use crate::record::Record;
use serde::{Deserialize, Serialize};
use shared::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Done,
}

/// A unit of tracked work.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl Task {
    const MAX_NAME_LEN: usize = 200;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Record<String> for Task {
    const COLLECTION: &'static str = "tasks";

    fn key(&self) -> Option<&String> {
        (!self.id.is_empty()).then_some(&self.id)
    }

    fn assign_key(&mut self, key: String) {
        self.id = key;
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("task name is empty".to_string()));
        }
        if self.name.len() > Self::MAX_NAME_LEN {
            return Err(Error::Validation(format!(
                "task name exceeds {} bytes",
                Self::MAX_NAME_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_validation() {
        assert!(Task::new("task-1").validate().is_ok());
        assert!(matches!(Task::new("  ").validate(), Err(Error::Validation(_))));
        assert!(matches!(
            Task::new("x".repeat(201)).validate(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_task_wire_shape() {
        let mut task = Task::new("task-1");
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({"name": "task-1", "status": "open"})
        );

        task.assign_key("t1".to_string());
        task.status = TaskStatus::InProgress;
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({"id": "t1", "name": "task-1", "status": "in_progress"})
        );
    }
}
