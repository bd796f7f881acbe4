use crate::cache::StandardCache;
use crate::domain::{Task, TaskStatus};
use crate::filter::RecordFilter;
use crate::patch::Patch;
use crate::repository::{
    CreateRecordRequest, DeleteRecordRequest, GetAllRecordsRequest, GetRecordRequest,
    RepositoryContext, StandardRepository, UpdateRecordRequest,
};
use shared::{Error, Result};
use std::time::Duration;
use tracing::warn;

/// Task storage with a cache-aside read path.
///
/// Reads check the cache first and populate it on a miss. Every write
/// invalidates the cached entry after the repository accepts it.
pub struct TaskService {
    ctx: RepositoryContext,
    repository: StandardRepository<String, Task>,
    cache: StandardCache<String, Task>,
    cache_ttl: Option<Duration>,
}

impl TaskService {
    pub fn new(
        ctx: RepositoryContext,
        cache: StandardCache<String, Task>,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            ctx,
            repository: StandardRepository::new(),
            cache,
            cache_ttl,
        }
    }

    pub async fn create_task(&self, name: String, assignee: Option<String>) -> Result<Task> {
        let task = Task {
            assignee,
            ..Task::new(name)
        };
        let created = self
            .repository
            .create_record(&self.ctx, CreateRecordRequest::new(task))
            .await?;

        self.populate(&created).await;
        Ok(created)
    }

    /// Cache-aside read. A failing cache is logged and bypassed.
    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let key = id.to_string();

        match self.cache.get(&key).await {
            Ok(Some(task)) => return Ok(task),
            Ok(None) => {}
            Err(e) => warn!("Cache read for task '{}' failed, using repository: {}", id, e),
        }

        let task = self
            .repository
            .get_record(&self.ctx, GetRecordRequest { key })
            .await?;

        self.populate(&task).await;
        Ok(task)
    }

    /// Listing always goes to the repository.
    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let filter = status
            .map(|status| serde_json::to_value(status).map(|v| RecordFilter::new().eq("status", v)))
            .transpose()
            .map_err(|e| Error::Internal(format!("status does not serialize: {}", e)))?;

        self.repository
            .get_all_records(&self.ctx, GetAllRecordsRequest { filter })
            .await
    }

    pub async fn rename_task(&self, id: &str, name: String) -> Result<Task> {
        self.update_task(id, Patch::new().set("name", name)).await
    }

    pub async fn assign_task(&self, id: &str, assignee: Option<String>) -> Result<Task> {
        let patch = match assignee {
            Some(assignee) => Patch::new().set("assignee", assignee),
            None => Patch::new().unset("assignee"),
        };
        self.update_task(id, patch).await
    }

    pub async fn set_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        let patch = Patch::from_partial(&serde_json::json!({ "status": status }))?;
        self.update_task(id, patch).await
    }

    /// Apply a patch, then drop the cached copy. An invalidation failure is
    /// returned since the cache would otherwise keep serving the old task.
    pub async fn update_task(&self, id: &str, patch: Patch) -> Result<Task> {
        let key = id.to_string();
        let updated = self
            .repository
            .update_record(
                &self.ctx,
                UpdateRecordRequest {
                    key: key.clone(),
                    patch,
                },
            )
            .await?;

        self.cache.del(&key).await?;
        Ok(updated)
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let key = id.to_string();
        self.repository
            .delete_record(&self.ctx, DeleteRecordRequest { key: key.clone() })
            .await?;

        self.cache.del(&key).await
    }

    async fn populate(&self, task: &Task) {
        if let Err(e) = self.cache.set(&task.id, task, self.cache_ttl).await {
            warn!("Failed to cache task '{}': {}", task.id, e);
        }
    }
}
