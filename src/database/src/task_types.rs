//! Retry-task type metadata
//!
//! Each service registers its retry-task types in `task_type` and the keys
//! every task of a type carries in `task_type_key`. Generated retry tasks
//! must reference those ids, so they are read from the live database (or
//! supplied from a fixture) before generation starts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::connections::ConnectionFactory;
use crate::{DatabaseError, Result, Service};

/// Declared value type of a task-type key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyValueType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Json,
}

impl KeyValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyValueType::String => "STRING",
            KeyValueType::Integer => "INTEGER",
            KeyValueType::Float => "FLOAT",
            KeyValueType::Boolean => "BOOLEAN",
            KeyValueType::Date => "DATE",
            KeyValueType::Datetime => "DATETIME",
            KeyValueType::Json => "JSON",
        }
    }
}

impl fmt::Display for KeyValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyValueType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "STRING" => Ok(KeyValueType::String),
            "INTEGER" => Ok(KeyValueType::Integer),
            "FLOAT" => Ok(KeyValueType::Float),
            "BOOLEAN" => Ok(KeyValueType::Boolean),
            "DATE" => Ok(KeyValueType::Date),
            "DATETIME" => Ok(KeyValueType::Datetime),
            "JSON" => Ok(KeyValueType::Json),
            other => Err(format!("unsupported task type key type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTypeKey {
    pub task_type_key_id: i32,
    pub name: String,
    pub value_type: KeyValueType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskType {
    pub task_type_id: i32,
    pub name: String,
    /// Ordered by key id
    pub keys: Vec<TaskTypeKey>,
}

/// All task types of one service, by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskTypeMetadata {
    task_types: BTreeMap<String, TaskType>,
}

impl TaskTypeMetadata {
    pub fn from_task_types(task_types: impl IntoIterator<Item = TaskType>) -> Self {
        let task_types = task_types
            .into_iter()
            .map(|mut task_type| {
                task_type.keys.sort_by_key(|key| key.task_type_key_id);
                (task_type.name.clone(), task_type)
            })
            .collect();
        Self { task_types }
    }

    pub fn get(&self, name: &str) -> Option<&TaskType> {
        self.task_types.get(name)
    }

    pub fn len(&self) -> usize {
        self.task_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskType> {
        self.task_types.values()
    }
}

/// Supplier of task-type metadata per service
#[async_trait]
pub trait TaskTypeSource: Send + Sync {
    async fn fetch(&self, service: Service) -> Result<TaskTypeMetadata>;
}

/// Reads `task_type` and `task_type_key` from the service database
pub struct PgTaskTypeSource {
    factory: ConnectionFactory,
}

impl PgTaskTypeSource {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl TaskTypeSource for PgTaskTypeSource {
    async fn fetch(&self, service: Service) -> Result<TaskTypeMetadata> {
        let connection = self.factory.connect(service).await?;
        let pool = connection.pool();

        let types: Vec<(i32, String)> =
            sqlx::query_as("SELECT task_type_id, name FROM task_type ORDER BY task_type_id")
                .fetch_all(pool)
                .await?;
        let keys: Vec<(i32, i32, String, String)> = sqlx::query_as(
            "SELECT task_type_key_id, task_type_id, name, type::text FROM task_type_key ORDER BY task_type_key_id",
        )
        .fetch_all(pool)
        .await?;
        connection.close().await;

        let mut by_type: HashMap<i32, Vec<TaskTypeKey>> = HashMap::new();
        for (task_type_key_id, task_type_id, name, value_type) in keys {
            let value_type = value_type
                .parse::<KeyValueType>()
                .map_err(|message| DatabaseError::TaskTypes { service, message })?;
            by_type.entry(task_type_id).or_default().push(TaskTypeKey {
                task_type_key_id,
                name,
                value_type,
            });
        }

        let metadata = TaskTypeMetadata::from_task_types(types.into_iter().map(
            |(task_type_id, name)| TaskType {
                task_type_id,
                name,
                keys: by_type.remove(&task_type_id).unwrap_or_default(),
            },
        ));

        info!(
            "Fetched {} task types from {}",
            metadata.len(),
            service
        );
        Ok(metadata)
    }
}

/// Read-through cache in front of another source, keyed by service
pub struct CachedTaskTypeSource<S> {
    inner: S,
    cache: RwLock<HashMap<Service, Arc<TaskTypeMetadata>>>,
}

impl<S: TaskTypeSource> CachedTaskTypeSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, service: Service) -> Result<Arc<TaskTypeMetadata>> {
        if let Some(metadata) = self.cache.read().await.get(&service) {
            return Ok(Arc::clone(metadata));
        }

        let mut cache = self.cache.write().await;
        if let Some(metadata) = cache.get(&service) {
            return Ok(Arc::clone(metadata));
        }

        debug!("Task type cache miss for {}", service);
        let metadata = Arc::new(self.inner.fetch(service).await?);
        cache.insert(service, Arc::clone(&metadata));
        Ok(metadata)
    }
}

#[async_trait]
impl<S: TaskTypeSource> TaskTypeSource for CachedTaskTypeSource<S> {
    async fn fetch(&self, service: Service) -> Result<TaskTypeMetadata> {
        Ok(self.get(service).await?.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskTypeSource for CountingSource {
        async fn fetch(&self, service: Service) -> Result<TaskTypeMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TaskTypeMetadata::from_task_types([TaskType {
                task_type_id: 1,
                name: format!("{service}-task"),
                keys: vec![
                    TaskTypeKey {
                        task_type_key_id: 2,
                        name: "b".to_string(),
                        value_type: KeyValueType::Integer,
                    },
                    TaskTypeKey {
                        task_type_key_id: 1,
                        name: "a".to_string(),
                        value_type: KeyValueType::String,
                    },
                ],
            }]))
        }
    }

    #[test]
    fn test_key_value_type_parsing() {
        assert_eq!("DATETIME".parse::<KeyValueType>(), Ok(KeyValueType::Datetime));
        assert!("datetime".parse::<KeyValueType>().is_err());
        assert!("BLOB".parse::<KeyValueType>().is_err());
    }

    #[tokio::test]
    async fn test_cache_fetches_each_service_once() {
        let source = CachedTaskTypeSource::new(CountingSource {
            calls: AtomicUsize::new(0),
        });

        let first = source.get(Service::Vela).await.unwrap();
        let second = source.get(Service::Vela).await.unwrap();
        source.get(Service::Carina).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_keys_are_ordered_by_id() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
        };
        let metadata = source.fetch(Service::Polaris).await.unwrap();
        let task_type = metadata.get("polaris-task").unwrap();

        let ids: Vec<i32> = task_type.keys.iter().map(|key| key.task_type_key_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
