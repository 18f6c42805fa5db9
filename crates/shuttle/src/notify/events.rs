//! Readiness event broadcasting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::container_repo::{ContainerKind, ContainerRow};
use crate::db::project_repo::ProjectRow;
use crate::readiness::ReadinessState;

/// What notifiers and webhooks are told about a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub project_id: i64,
    pub project_name: String,
    pub container_id: i64,
    pub kind: ContainerKind,
    pub name: String,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_completed_at: Option<String>,
}

impl ContainerSummary {
    pub fn new(project: &ProjectRow, container: &ContainerRow) -> Self {
        Self {
            project_id: project.id,
            project_name: project.name.clone(),
            container_id: container.id,
            kind: container.kind,
            name: container.name.clone(),
            ready: container.ready,
            first_completed_at: container.first_completed_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessEvent {
    pub container: ContainerSummary,
    pub state: ReadinessState,
    pub timestamp: DateTime<Utc>,
}

impl ReadinessEvent {
    pub fn new(container: ContainerSummary) -> Self {
        let state = if container.ready {
            ReadinessState::Ready
        } else {
            ReadinessState::NotReady
        };
        Self {
            container,
            state,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct ReadinessBroadcaster {
    sender: broadcast::Sender<ReadinessEvent>,
}

impl ReadinessBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: ReadinessEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReadinessEvent> {
        self.sender.subscribe()
    }
}

impl Default for ReadinessBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(ready: bool) -> ContainerSummary {
        ContainerSummary {
            project_id: 1,
            project_name: "web".to_string(),
            container_id: 7,
            kind: ContainerKind::Commit,
            name: "abc123".to_string(),
            ready,
            first_completed_at: None,
        }
    }

    #[test]
    fn test_subscribers_receive_events() {
        let broadcaster = ReadinessBroadcaster::new(4);
        let mut rx = broadcaster.subscribe();
        broadcaster.send(ReadinessEvent::new(summary(true)));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.state, ReadinessState::Ready);
        assert_eq!(event.container.container_id, 7);
    }

    #[test]
    fn test_send_without_subscribers() {
        ReadinessBroadcaster::default().send(ReadinessEvent::new(summary(false)));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let json = serde_json::to_value(summary(true)).unwrap();
        assert_eq!(json["containerId"], 7);
        assert_eq!(json["kind"], "commit");
        assert!(json.get("firstCompletedAt").is_none());
    }
}
