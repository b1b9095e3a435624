//! Carina tables: retailers, reward configs and the reward pool

use pyxis_database::services::{REWARD, REWARD_CONFIG, REWARD_UPDATE, RETAILER, RETAILER_FETCH_TYPE};
use pyxis_database::{Service, TableSpec};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

use super::tasks::{RetryTaskGenerator, TaskTypeKeyValueGenerator};
use super::{check_range, GenerationContext, TableGenerator};
use crate::error::GenerationError;
use crate::ids::IdRange;
use crate::refs::{retailer_slug, reward_slug, RewardKind};
use crate::row;
use crate::rows::Row;

/// Rewards are preloaded into carina rather than fetched from an agent
const PRELOADED_FETCH_TYPE: i64 = 1;
const REWARD_UPDATE_STATUSES: [&str; 3] = ["CANCELLED", "REDEEMED", "ISSUED"];

pub fn generators() -> Vec<Box<dyn TableGenerator>> {
    vec![
        Box::new(RetailerGenerator),
        Box::new(RetailerFetchTypeGenerator),
        Box::new(RewardConfigGenerator),
        Box::new(RewardGenerator),
        Box::new(RewardUpdateGenerator),
        Box::new(RetryTaskGenerator {
            service: Service::Carina,
        }),
        Box::new(TaskTypeKeyValueGenerator {
            service: Service::Carina,
        }),
    ]
}

pub struct RetailerGenerator;

impl TableGenerator for RetailerGenerator {
    fn service(&self) -> Service {
        Service::Carina
    }

    fn table(&self) -> &'static TableSpec {
        &RETAILER
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.retailers
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        Ok(range
            .iter()
            .map(|id| row![id, ctx.now, ctx.now, retailer_slug(id)])
            .collect())
    }
}

/// Keyed by retailer id, the table has no id column of its own
pub struct RetailerFetchTypeGenerator;

impl TableGenerator for RetailerFetchTypeGenerator {
    fn service(&self) -> Service {
        Service::Carina
    }

    fn table(&self) -> &'static TableSpec {
        &RETAILER_FETCH_TYPE
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.retailers
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        Ok(range
            .iter()
            .map(|retailer| row![ctx.now, ctx.now, retailer, PRELOADED_FETCH_TYPE, ""])
            .collect())
    }
}

pub struct RewardConfigGenerator;

impl TableGenerator for RewardConfigGenerator {
    fn service(&self) -> Service {
        Service::Carina
    }

    fn table(&self) -> &'static TableSpec {
        &REWARD_CONFIG
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.total_campaigns()
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let required_fields = json!({"validity_days": 90});

        Ok(range
            .iter()
            .map(|id| {
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    reward_slug(id),
                    ctx.refs.retailers.retailer_of_campaign(id),
                    PRELOADED_FETCH_TYPE,
                    "ACTIVE",
                    required_fields.clone(),
                ]
            })
            .collect())
    }
}

/// The whole reward pool; only allocated rewards are flagged as such
pub struct RewardGenerator;

impl TableGenerator for RewardGenerator {
    fn service(&self) -> Service {
        Service::Carina
    }

    fn table(&self) -> &'static TableSpec {
        &REWARD
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.refs.rewards.len()
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let pool = &ctx.refs.rewards;

        range
            .iter()
            .map(|id| {
                let entry = pool.get(id).ok_or(GenerationError::MissingReference {
                    table: REWARD.name,
                    reference: "reward pool",
                    id,
                })?;
                Ok(row![
                    id,
                    ctx.now,
                    ctx.now,
                    entry.uuid,
                    pool.code(id),
                    entry.kind == RewardKind::Allocated,
                    false,
                    entry.reward_config,
                    entry.retailer,
                ])
            })
            .collect()
    }
}

pub struct RewardUpdateGenerator;

impl TableGenerator for RewardUpdateGenerator {
    fn service(&self) -> Service {
        Service::Carina
    }

    fn table(&self) -> &'static TableSpec {
        &REWARD_UPDATE
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.reward_updates
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let pool = &ctx.refs.rewards;
        let allocated = pool.size_of(RewardKind::Allocated);

        range
            .iter()
            .map(|id| {
                let mut rng = ctx.rng("reward_update", id);
                let reward = pool.draw(RewardKind::Allocated, rng.gen_range(1..=allocated.max(1)))?;
                let status = REWARD_UPDATE_STATUSES.choose(&mut rng).copied().unwrap_or("ISSUED");
                Ok(row![id, ctx.now, ctx.now, reward.uuid, ctx.now.date_naive(), status])
            })
            .collect()
    }
}
