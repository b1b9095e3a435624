//! Vela tables: campaigns, rules, stores and transactions

use chrono::{DateTime, Utc};
use pyxis_database::services::{
    CAMPAIGN, EARN_RULE, PROCESSED_TRANSACTION, RETAILER_REWARDS, RETAILER_STORE, REWARD_RULE,
    TRANSACTION,
};
use pyxis_database::{Service, TableSpec};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use super::tasks::{RetryTaskGenerator, TaskTypeKeyValueGenerator};
use super::{check_range, GenerationContext, TableGenerator};
use crate::error::GenerationError;
use crate::ids::IdRange;
use crate::profiles::LoyaltyType;
use crate::refs::{campaign_slug, retailer_slug, reward_slug, store_mid};
use crate::row;
use crate::rows::{Row, Value};
use crate::seeds::random_uuid;

const EARN_THRESHOLD: i64 = 100;
const STAMPS_INCREMENT: i64 = 500;
const REWARD_GOAL: i64 = 500;
const TRANSACTION_STATUSES: [&str; 3] = ["PROCESSED", "DUPLICATE", "NO_ACTIVE_CAMPAIGNS"];

pub fn generators() -> Vec<Box<dyn TableGenerator>> {
    vec![
        Box::new(RetailerRewardsGenerator),
        Box::new(CampaignGenerator),
        Box::new(EarnRuleGenerator),
        Box::new(RewardRuleGenerator),
        Box::new(RetailerStoreGenerator),
        Box::new(TransactionGenerator),
        Box::new(ProcessedTransactionGenerator),
        Box::new(RetryTaskGenerator {
            service: Service::Vela,
        }),
        Box::new(TaskTypeKeyValueGenerator {
            service: Service::Vela,
        }),
    ]
}

pub struct RetailerRewardsGenerator;

impl TableGenerator for RetailerRewardsGenerator {
    fn service(&self) -> Service {
        Service::Vela
    }

    fn table(&self) -> &'static TableSpec {
        &RETAILER_REWARDS
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.retailers
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        Ok(range.iter().map(|id| row![id, retailer_slug(id)]).collect())
    }
}

pub struct CampaignGenerator;

impl TableGenerator for CampaignGenerator {
    fn service(&self) -> Service {
        Service::Vela
    }

    fn table(&self) -> &'static TableSpec {
        &CAMPAIGN
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.total_campaigns()
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let end_date = ctx.end_date();

        Ok(range
            .iter()
            .map(|id| {
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    "ACTIVE",
                    format!("Campaign {id}"),
                    campaign_slug(id),
                    ctx.refs.retailers.retailer_of_campaign(id),
                    ctx.profile.loyalty_type.as_str(),
                    ctx.now,
                    end_date,
                ]
            })
            .collect())
    }
}

pub struct EarnRuleGenerator;

impl TableGenerator for EarnRuleGenerator {
    fn service(&self) -> Service {
        Service::Vela
    }

    fn table(&self) -> &'static TableSpec {
        &EARN_RULE
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.total_earn_rules()
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;

        // Accumulator campaigns credit the spend itself
        let increment = match ctx.profile.loyalty_type {
            LoyaltyType::Stamps => Some(STAMPS_INCREMENT),
            LoyaltyType::Accumulator => None,
        };

        Ok(range
            .iter()
            .map(|id| {
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    EARN_THRESHOLD,
                    increment,
                    1i64,
                    0i64,
                    ctx.refs.retailers.campaign_of_earn_rule(id),
                ]
            })
            .collect())
    }
}

/// One reward rule per campaign, sharing its id
pub struct RewardRuleGenerator;

impl TableGenerator for RewardRuleGenerator {
    fn service(&self) -> Service {
        Service::Vela
    }

    fn table(&self) -> &'static TableSpec {
        &REWARD_RULE
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.total_campaigns()
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;

        Ok(range
            .iter()
            .map(|id| {
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    REWARD_GOAL,
                    reward_slug(id),
                    ctx.profile.allocation_window,
                    ctx.profile.reward_cap,
                    id,
                ]
            })
            .collect())
    }
}

pub struct RetailerStoreGenerator;

impl TableGenerator for RetailerStoreGenerator {
    fn service(&self) -> Service {
        Service::Vela
    }

    fn table(&self) -> &'static TableSpec {
        &RETAILER_STORE
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.total_stores()
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;

        Ok(range
            .iter()
            .map(|id| {
                let (retailer, number) = ctx.refs.retailers.store_position(id);
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    format!("Store {retailer}-{number}"),
                    store_mid(retailer, number),
                    retailer,
                ]
            })
            .collect())
    }
}

/// Values a transaction and its processed counterpart agree on
struct TransactionFacts {
    transaction_id: String,
    payment_transaction_id: String,
    amount: i64,
    mid: String,
    datetime: DateTime<Utc>,
    account_holder_uuid: Uuid,
    retailer: u64,
    status: &'static str,
}

fn transaction_facts(id: u64, ctx: &GenerationContext) -> TransactionFacts {
    let mut rng = ctx.rng("transaction", id);
    let refs = &ctx.refs;

    let (retailer, account_holder_uuid) = if refs.account_holders.is_empty() {
        let retailer = rng.gen_range(1..=refs.retailers.retailers().max(1));
        (retailer, random_uuid(&mut rng))
    } else {
        let holder = rng.gen_range(1..=refs.account_holders.len());
        let retailer = refs.account_holders.retailer_of(holder).unwrap_or(1);
        (retailer, refs.account_holders.uuid(holder))
    };

    TransactionFacts {
        transaction_id: format!("tx_{id}"),
        payment_transaction_id: format!("tx_payment_{id}"),
        amount: rng.gen_range(500..=1000),
        mid: refs.retailers.random_mid(retailer, &mut rng),
        datetime: ctx.now,
        account_holder_uuid,
        retailer,
        status: TRANSACTION_STATUSES.choose(&mut rng).copied().unwrap_or("PROCESSED"),
    }
}

pub struct TransactionGenerator;

impl TableGenerator for TransactionGenerator {
    fn service(&self) -> Service {
        Service::Vela
    }

    fn table(&self) -> &'static TableSpec {
        &TRANSACTION
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.transactions
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;

        Ok(range
            .iter()
            .map(|id| {
                let facts = transaction_facts(id, ctx);
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    facts.transaction_id,
                    facts.amount,
                    facts.mid,
                    facts.datetime,
                    facts.account_holder_uuid,
                    facts.retailer,
                    facts.payment_transaction_id,
                    facts.status,
                ]
            })
            .collect())
    }
}

/// One processed transaction per transaction, matching its facts
pub struct ProcessedTransactionGenerator;

impl TableGenerator for ProcessedTransactionGenerator {
    fn service(&self) -> Service {
        Service::Vela
    }

    fn table(&self) -> &'static TableSpec {
        &PROCESSED_TRANSACTION
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.transactions
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;

        Ok(range
            .iter()
            .map(|id| {
                let facts = transaction_facts(id, ctx);
                let campaign_slugs: Vec<String> = ctx
                    .refs
                    .retailers
                    .campaigns_of(facts.retailer)
                    .map(|campaigns| campaigns.iter().map(campaign_slug).collect())
                    .unwrap_or_default();
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    facts.transaction_id,
                    facts.amount,
                    facts.mid,
                    facts.datetime,
                    facts.account_holder_uuid,
                    facts.retailer,
                    Value::TextArray(campaign_slugs),
                    facts.payment_transaction_id,
                ]
            })
            .collect())
    }
}
