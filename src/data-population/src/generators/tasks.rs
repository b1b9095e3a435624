//! Retry-task bookkeeping: `retry_task` and `task_type_key_value`
//!
//! Retry-task ids are handed out in one contiguous block per task type, in
//! the order of the service's retry populations. `task_type_key_value` is
//! addressed by retry-task id and emits one row per key of the task's type.

use pyxis_database::services::{RETRY_TASK, TASK_TYPE_KEY_VALUE};
use pyxis_database::{Service, TableSpec, TaskType, TaskTypeMetadata};
use rand::seq::SliceRandom;
use rand::Rng;

use super::{check_range, GenerationContext, TableGenerator};
use crate::error::GenerationError;
use crate::fixtures::{audit_data, fake_key_value, retry_populations};
use crate::ids::{IdAllocator, IdRange};
use crate::profiles::VolumeProfile;
use crate::row;
use crate::rows::Row;

const RETRY_TASK_STATUSES: [&str; 3] = ["SUCCESS", "REQUEUED", "CANCELLED"];

/// Retry tasks of one task type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTaskBlock {
    pub task_type: TaskType,
    pub ids: IdRange,
}

/// Retry-task id layout of one service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryTaskPlan {
    blocks: Vec<RetryTaskBlock>,
}

impl RetryTaskPlan {
    pub fn build(
        service: Service,
        profile: &VolumeProfile,
        metadata: &TaskTypeMetadata,
    ) -> Result<Self, GenerationError> {
        let mut ids = IdAllocator::starting_at(1);
        let mut blocks = Vec::new();

        for (name, fields) in retry_populations(service) {
            let task_type = metadata.get(name).ok_or_else(|| GenerationError::MissingTaskType {
                service,
                task_type: name.to_string(),
            })?;
            let count: u64 = fields.iter().map(|field| profile.field(*field)).sum();
            if let Some(block) = ids.reserve(count) {
                blocks.push(RetryTaskBlock {
                    task_type: task_type.clone(),
                    ids: block,
                });
            }
        }

        Ok(Self { blocks })
    }

    pub fn blocks(&self) -> &[RetryTaskBlock] {
        &self.blocks
    }

    pub fn total_tasks(&self) -> u64 {
        self.blocks.iter().map(|block| block.ids.len()).sum()
    }

    pub fn total_key_values(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| block.ids.len() * block.task_type.keys.len() as u64)
            .sum()
    }

    /// Block holding `retry_task_id`
    pub fn block_of(&self, retry_task_id: u64) -> Option<&RetryTaskBlock> {
        let index = self
            .blocks
            .partition_point(|block| block.ids.stop() < retry_task_id);
        self.blocks
            .get(index)
            .filter(|block| block.ids.contains(retry_task_id))
    }

    fn require_block(&self, table: &'static str, retry_task_id: u64) -> Result<&RetryTaskBlock, GenerationError> {
        self.block_of(retry_task_id)
            .ok_or(GenerationError::MissingReference {
                table,
                reference: "retry task block",
                id: retry_task_id,
            })
    }
}

pub struct RetryTaskGenerator {
    pub service: Service,
}

impl TableGenerator for RetryTaskGenerator {
    fn service(&self) -> Service {
        self.service
    }

    fn table(&self) -> &'static TableSpec {
        &RETRY_TASK
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.task_plan(self.service)
            .map(RetryTaskPlan::total_tasks)
            .unwrap_or(0)
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        let plan = ctx.task_plan(self.service)?;
        check_range(self.table(), range, plan.total_tasks())?;

        let stream = format!("{}.retry_task", self.service);
        let audit = audit_data();
        let next_attempt_time = ctx.now + chrono::Duration::minutes(5);

        range
            .iter()
            .map(|id| {
                let block = plan.require_block(RETRY_TASK.name, id)?;
                let mut rng = ctx.rng(&stream, id);
                let status = RETRY_TASK_STATUSES.choose(&mut rng).copied().unwrap_or("SUCCESS");
                Ok(row![
                    id,
                    ctx.now,
                    ctx.now,
                    rng.gen_range(1..=3u64),
                    audit.clone(),
                    next_attempt_time,
                    status,
                    block.task_type.task_type_id,
                ])
            })
            .collect()
    }
}

pub struct TaskTypeKeyValueGenerator {
    pub service: Service,
}

impl TableGenerator for TaskTypeKeyValueGenerator {
    fn service(&self) -> Service {
        self.service
    }

    fn table(&self) -> &'static TableSpec {
        &TASK_TYPE_KEY_VALUE
    }

    /// Addressed by retry-task id
    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.task_plan(self.service)
            .map(RetryTaskPlan::total_tasks)
            .unwrap_or(0)
    }

    fn total_rows(&self, ctx: &GenerationContext) -> u64 {
        ctx.task_plan(self.service)
            .map(RetryTaskPlan::total_key_values)
            .unwrap_or(0)
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        let plan = ctx.task_plan(self.service)?;
        check_range(self.table(), range, plan.total_tasks())?;

        let stream = format!("{}.task_type_key_value", self.service);
        let mut rows = Vec::new();
        for retry_task_id in range {
            let block = plan.require_block(TASK_TYPE_KEY_VALUE.name, retry_task_id)?;
            let mut rng = ctx.rng(&stream, retry_task_id);
            for key in &block.task_type.keys {
                rows.push(row![
                    ctx.now,
                    ctx.now,
                    fake_key_value(key.value_type, &mut rng),
                    retry_task_id,
                    key.task_type_key_id,
                ]);
            }
        }
        Ok(rows)
    }
}
