//! Table generators
//!
//! One generator per target table. A generator is asked for an id range of
//! its table and returns exactly the rows with those primary keys. Every
//! value is derived from the id, the run seed and the read-only
//! [`GenerationContext`], so any split of a table into ranges concatenates
//! to the same rows as one call over the whole table.

pub mod carina;
pub mod polaris;
pub mod tasks;
pub mod vela;

use chrono::{DateTime, Duration, Utc};
use pyxis_database::{Service, TableSpec, TaskTypeMetadata};
use rand::rngs::StdRng;
use std::collections::BTreeMap;

use crate::error::GenerationError;
use crate::ids::IdRange;
use crate::profiles::VolumeProfile;
use crate::refs::CrossRefs;
use crate::rows::Row;
use crate::seeds::row_rng;

pub use tasks::{RetryTaskBlock, RetryTaskPlan};

/// Produces the rows of one target table
pub trait TableGenerator: Send + Sync {
    fn service(&self) -> Service;

    fn table(&self) -> &'static TableSpec;

    /// Number of ids `generate` accepts, `1..=base_count`
    fn base_count(&self, ctx: &GenerationContext) -> u64;

    /// Number of rows the whole table holds. Differs from `base_count` for
    /// tables emitting several rows per id.
    fn total_rows(&self, ctx: &GenerationContext) -> u64 {
        self.base_count(ctx)
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError>;
}

/// Read-only state shared by all generators of a run
#[derive(Debug)]
pub struct GenerationContext {
    pub profile: VolumeProfile,
    pub refs: CrossRefs,
    pub task_plans: BTreeMap<Service, RetryTaskPlan>,
    pub seed: u64,
    /// Timestamp written to every `created_at`/`updated_at`
    pub now: DateTime<Utc>,
}

impl GenerationContext {
    /// Build the reference index and retry-task plans for a run
    pub fn build(
        profile: VolumeProfile,
        task_types: &BTreeMap<Service, TaskTypeMetadata>,
        seed: u64,
        now: DateTime<Utc>,
    ) -> Result<Self, GenerationError> {
        let refs = CrossRefs::build(&profile, seed)?;

        let mut task_plans = BTreeMap::new();
        for service in Service::LOAD_ORDER {
            let metadata = task_types.get(&service).ok_or_else(|| GenerationError::MissingTaskType {
                service,
                task_type: "*".to_string(),
            })?;
            task_plans.insert(service, RetryTaskPlan::build(service, &profile, metadata)?);
        }

        Ok(Self {
            profile,
            refs,
            task_plans,
            seed,
            now,
        })
    }

    /// Campaign end and reward expiry date
    pub fn end_date(&self) -> DateTime<Utc> {
        self.now + Duration::weeks(100)
    }

    pub fn rng(&self, stream: &str, id: u64) -> StdRng {
        row_rng(self.seed, stream, id)
    }

    pub fn task_plan(&self, service: Service) -> Result<&RetryTaskPlan, GenerationError> {
        self.task_plans
            .get(&service)
            .ok_or_else(|| GenerationError::MissingTaskType {
                service,
                task_type: "*".to_string(),
            })
    }
}

/// Reject ranges reaching past the end of the table
pub(crate) fn check_range(
    table: &'static TableSpec,
    range: IdRange,
    max: u64,
) -> Result<(), GenerationError> {
    if range.stop() > max {
        return Err(GenerationError::InvalidRange {
            table: table.name,
            start: range.start(),
            stop: range.stop(),
            max,
        });
    }
    Ok(())
}

/// Generators of a service, in the table order of the service catalog
pub fn generators_for(service: Service) -> Vec<Box<dyn TableGenerator>> {
    match service {
        Service::Vela => vela::generators(),
        Service::Carina => carina::generators(),
        Service::Polaris => polaris::generators(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::fixtures::fixture_task_types;
    use chrono::TimeZone;

    pub fn profile() -> VolumeProfile {
        VolumeProfile {
            retailers: 3,
            campaigns_per_retailer: 2,
            earn_rule_per_campaign: 2,
            stores_per_retailer: 2,
            account_holders: 25,
            allocated_rewards: 8,
            pending_rewards: 4,
            spare_rewards: 5,
            reward_updates: 6,
            transactions: 30,
            ..VolumeProfile::default()
        }
    }

    pub fn context_for(profile: VolumeProfile) -> GenerationContext {
        let task_types = Service::LOAD_ORDER
            .iter()
            .map(|service| (*service, fixture_task_types(*service)))
            .collect();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        GenerationContext::build(profile, &task_types, 42, now).unwrap()
    }

    pub fn context() -> GenerationContext {
        context_for(profile())
    }
}
