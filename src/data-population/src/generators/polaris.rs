//! Polaris tables: retailer configs, account holders and their rewards

use chrono::{Duration, NaiveDate};
use fake::faker::address::en::{BuildingNumber, CityName, PostCode, StreetName};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use pyxis_database::services::{
    ACCOUNT_HOLDER, ACCOUNT_HOLDER_CAMPAIGN_BALANCE, ACCOUNT_HOLDER_MARKETING_PREFERENCE,
    ACCOUNT_HOLDER_PENDING_REWARD, ACCOUNT_HOLDER_PROFILE, ACCOUNT_HOLDER_REWARD, RETAILER_CONFIG,
};
use pyxis_database::{Service, TableSpec};
use rand::Rng;

use super::tasks::{RetryTaskGenerator, TaskTypeKeyValueGenerator};
use super::{check_range, GenerationContext, TableGenerator};
use crate::error::GenerationError;
use crate::fixtures::{marketing_preferences, profile_config};
use crate::ids::IdRange;
use crate::profiles::VolumeProfile;
use crate::refs::{campaign_slug, retailer_slug, reward_slug, RewardEntry, RewardKind};
use crate::row;
use crate::rows::{Row, Value};
use crate::seeds::random_uuid;

const ACCOUNT_NUMBER_PREFIX_WIDTH: usize = 4;
const ACCOUNT_NUMBER_HOLDER_WIDTH: usize = 6;
const PENDING_REWARD_VALUE: i64 = 500;

pub fn generators() -> Vec<Box<dyn TableGenerator>> {
    vec![
        Box::new(RetailerConfigGenerator),
        Box::new(AccountHolderGenerator),
        Box::new(AccountHolderProfileGenerator),
        Box::new(MarketingPreferenceGenerator),
        Box::new(CampaignBalanceGenerator),
        Box::new(AccountHolderRewardGenerator),
        Box::new(PendingRewardGenerator),
        Box::new(RetryTaskGenerator {
            service: Service::Polaris,
        }),
        Box::new(TaskTypeKeyValueGenerator {
            service: Service::Polaris,
        }),
    ]
}

fn holder_retailer(table: &'static str, holder: u64, ctx: &GenerationContext) -> Result<u64, GenerationError> {
    ctx.refs
        .account_holders
        .retailer_of(holder)
        .ok_or(GenerationError::MissingReference {
            table,
            reference: "account holder",
            id: holder,
        })
}

fn reward_owner(table: &'static str, reward: &RewardEntry) -> Result<u64, GenerationError> {
    reward.account_holder.ok_or(GenerationError::MissingReference {
        table,
        reference: "reward owner",
        id: reward.id,
    })
}

fn digits(value: u64) -> usize {
    value.checked_ilog10().map_or(1, |log| log as usize + 1)
}

/// Account number layout: zero-padded retailer prefix, then the zero-padded
/// holder id. Both widths grow with the profile so every number of a run has
/// the length the retailer config declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountNumbers {
    prefix_width: usize,
    holder_width: usize,
}

impl AccountNumbers {
    pub fn for_profile(profile: &VolumeProfile) -> Self {
        Self {
            prefix_width: digits(profile.retailers).max(ACCOUNT_NUMBER_PREFIX_WIDTH),
            holder_width: digits(profile.account_holders).max(ACCOUNT_NUMBER_HOLDER_WIDTH),
        }
    }

    pub fn prefix(&self, retailer: u64) -> String {
        format!("{retailer:0width$}", width = self.prefix_width)
    }

    pub fn number(&self, retailer: u64, holder: u64) -> String {
        format!("{}{holder:0width$}", self.prefix(retailer), width = self.holder_width)
    }

    pub fn length(&self) -> usize {
        self.prefix_width + self.holder_width
    }
}

pub struct RetailerConfigGenerator;

impl TableGenerator for RetailerConfigGenerator {
    fn service(&self) -> Service {
        Service::Polaris
    }

    fn table(&self) -> &'static TableSpec {
        &RETAILER_CONFIG
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.retailers
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let profile_config = profile_config();
        let marketing_preferences = marketing_preferences();
        let account_numbers = AccountNumbers::for_profile(&ctx.profile);

        Ok(range
            .iter()
            .map(|id| {
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    format!("Retailer {id}"),
                    retailer_slug(id),
                    account_numbers.prefix(id),
                    account_numbers.length() as i64,
                    profile_config.clone(),
                    marketing_preferences.clone(),
                    "Performance Retailer",
                    "",
                    "Performance Retailer <welcome@performance_retailer.com>",
                    "Welcome to Performance Retailer!",
                ]
            })
            .collect())
    }
}

pub struct AccountHolderGenerator;

impl TableGenerator for AccountHolderGenerator {
    fn service(&self) -> Service {
        Service::Polaris
    }

    fn table(&self) -> &'static TableSpec {
        &ACCOUNT_HOLDER
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.account_holders
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let account_numbers = AccountNumbers::for_profile(&ctx.profile);

        range
            .iter()
            .map(|id| {
                let retailer = holder_retailer(ACCOUNT_HOLDER.name, id, ctx)?;
                let opt_out_token = random_uuid(&mut ctx.rng("account_holder.opt_out", id));
                Ok(row![
                    id,
                    ctx.now,
                    ctx.now,
                    format!("user_{id}@performancetest.com"),
                    "ACTIVE",
                    account_numbers.number(retailer, id),
                    ctx.refs.account_holders.uuid(id),
                    opt_out_token,
                    retailer,
                ])
            })
            .collect()
    }
}

/// One profile per account holder
pub struct AccountHolderProfileGenerator;

impl TableGenerator for AccountHolderProfileGenerator {
    fn service(&self) -> Service {
        Service::Polaris
    }

    fn table(&self) -> &'static TableSpec {
        &ACCOUNT_HOLDER_PROFILE
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.account_holders
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let earliest_birth = NaiveDate::from_ymd_opt(1940, 1, 1).unwrap_or(NaiveDate::MIN);

        Ok(range
            .iter()
            .map(|id| {
                let mut rng = ctx.rng("account_holder_profile", id);
                let first_name: String = FirstName().fake_with_rng(&mut rng);
                let last_name: String = LastName().fake_with_rng(&mut rng);
                let date_of_birth = earliest_birth + Duration::days(rng.gen_range(0..23_000));
                let building: String = BuildingNumber().fake_with_rng(&mut rng);
                let street: String = StreetName().fake_with_rng(&mut rng);
                let postcode: String = PostCode().fake_with_rng(&mut rng);
                let city: String = CityName().fake_with_rng(&mut rng);
                row![
                    id,
                    ctx.now,
                    ctx.now,
                    id,
                    first_name,
                    last_name,
                    date_of_birth,
                    "01234567891",
                    format!("{building} {street}"),
                    "Fake_second_line_address",
                    postcode,
                    city,
                    "",
                ]
            })
            .collect())
    }
}

pub struct MarketingPreferenceGenerator;

impl TableGenerator for MarketingPreferenceGenerator {
    fn service(&self) -> Service {
        Service::Polaris
    }

    fn table(&self) -> &'static TableSpec {
        &ACCOUNT_HOLDER_MARKETING_PREFERENCE
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.profile.account_holders
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        Ok(range
            .iter()
            .map(|id| row![id, ctx.now, ctx.now, id, "marketing_pref", "True", "BOOLEAN"])
            .collect())
    }
}

/// One balance per account holder, on a campaign of their retailer
pub struct CampaignBalanceGenerator;

impl TableGenerator for CampaignBalanceGenerator {
    fn service(&self) -> Service {
        Service::Polaris
    }

    fn table(&self) -> &'static TableSpec {
        &ACCOUNT_HOLDER_CAMPAIGN_BALANCE
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        if ctx.profile.total_campaigns() == 0 {
            return 0;
        }
        ctx.profile.account_holders
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;

        range
            .iter()
            .map(|id| {
                let retailer = holder_retailer(ACCOUNT_HOLDER_CAMPAIGN_BALANCE.name, id, ctx)?;
                let mut rng = ctx.rng("account_holder_campaign_balance", id);
                let campaign = ctx
                    .refs
                    .retailers
                    .random_campaign(retailer, &mut rng)
                    .ok_or(GenerationError::MissingReference {
                        table: ACCOUNT_HOLDER_CAMPAIGN_BALANCE.name,
                        reference: "campaign",
                        id,
                    })?;
                Ok(row![id, ctx.now, ctx.now, id, campaign_slug(campaign), 0i64])
            })
            .collect()
    }
}

/// Allocated rewards of the pool, as issued to their owners
pub struct AccountHolderRewardGenerator;

impl TableGenerator for AccountHolderRewardGenerator {
    fn service(&self) -> Service {
        Service::Polaris
    }

    fn table(&self) -> &'static TableSpec {
        &ACCOUNT_HOLDER_REWARD
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.refs.rewards.size_of(RewardKind::Allocated)
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let pool = &ctx.refs.rewards;
        let expiry_date = ctx.end_date();

        range
            .iter()
            .map(|id| {
                let reward = pool.draw(RewardKind::Allocated, id)?;
                let holder = reward_owner(ACCOUNT_HOLDER_REWARD.name, reward)?;
                let idempotency_token = random_uuid(&mut ctx.rng("account_holder_reward", id));
                Ok(row![
                    id,
                    ctx.now,
                    ctx.now,
                    reward.uuid,
                    pool.code(reward.id),
                    holder,
                    reward.retailer,
                    reward_slug(reward.reward_config),
                    ctx.now,
                    expiry_date,
                    Value::Null,
                    Value::Null,
                    "ISSUED",
                    idempotency_token,
                ])
            })
            .collect()
    }
}

/// Pending rewards of the pool
pub struct PendingRewardGenerator;

impl TableGenerator for PendingRewardGenerator {
    fn service(&self) -> Service {
        Service::Polaris
    }

    fn table(&self) -> &'static TableSpec {
        &ACCOUNT_HOLDER_PENDING_REWARD
    }

    fn base_count(&self, ctx: &GenerationContext) -> u64 {
        ctx.refs.rewards.size_of(RewardKind::Pending)
    }

    fn generate(&self, range: IdRange, ctx: &GenerationContext) -> Result<Vec<Row>, GenerationError> {
        check_range(self.table(), range, self.base_count(ctx))?;
        let pool = &ctx.refs.rewards;

        let today = ctx.now.date_naive();
        // Already due when the run exercises conversion, otherwise due tomorrow
        let conversion_date = if ctx.profile.pending_reward_conversion {
            today - Duration::days(1)
        } else {
            today + Duration::days(1)
        };

        range
            .iter()
            .map(|id| {
                let reward = pool.draw(RewardKind::Pending, id)?;
                let holder = reward_owner(ACCOUNT_HOLDER_PENDING_REWARD.name, reward)?;
                Ok(row![
                    id,
                    ctx.now,
                    ctx.now,
                    reward.uuid,
                    holder,
                    reward.retailer,
                    campaign_slug(reward.reward_config),
                    reward_slug(reward.reward_config),
                    today,
                    conversion_date,
                    PENDING_REWARD_VALUE,
                    1i64,
                    PENDING_REWARD_VALUE,
                ])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::test_support::{context, context_for, profile};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn test_account_holders_match_the_reference_index() {
        let ctx = context();
        let rows = AccountHolderGenerator
            .generate(IdRange::full(ctx.profile.account_holders).unwrap(), &ctx)
            .unwrap();

        for row in &rows {
            let id = row[0].as_int().unwrap() as u64;
            let retailer = ctx.refs.account_holders.retailer_of(id).unwrap();
            assert_eq!(row[8].as_int(), Some(retailer as i64));
            assert_eq!(row[6].as_uuid(), Some(ctx.refs.account_holders.uuid(id)));
            assert!(row[5].as_text().unwrap().starts_with(&format!("{retailer:04}")));
        }
        let emails: HashSet<_> = rows.iter().map(|row| row[3].as_text().unwrap()).collect();
        assert_eq!(emails.len(), rows.len());
    }

    #[test]
    fn test_account_numbers_have_the_declared_length() {
        let ctx = context();
        let configs = RetailerConfigGenerator
            .generate(IdRange::full(ctx.profile.retailers).unwrap(), &ctx)
            .unwrap();
        let holders = AccountHolderGenerator
            .generate(IdRange::full(ctx.profile.account_holders).unwrap(), &ctx)
            .unwrap();

        for config in &configs {
            assert_eq!(config[5].as_text(), Some(format!("{:04}", config[0].as_int().unwrap()).as_str()));
            assert_eq!(config[6].as_int(), Some(10));
        }
        for holder in &holders {
            assert_eq!(holder[5].as_text().unwrap().len(), 10);
        }
    }

    #[test]
    fn test_account_numbers_widen_for_large_profiles() {
        let numbers = AccountNumbers::for_profile(&VolumeProfile {
            retailers: 12_345,
            account_holders: 1_000_001,
            ..VolumeProfile::default()
        });
        assert_eq!(numbers.length(), 12);
        assert_eq!(numbers.prefix(7), "00007");
        assert_eq!(numbers.number(7, 1_000_001), "000071000001");
        assert_eq!(numbers.number(12_345, 1), "123450000001");

        let small = AccountNumbers::for_profile(&VolumeProfile {
            retailers: 3,
            account_holders: 999_999,
            ..VolumeProfile::default()
        });
        assert_eq!(small.length(), 10);
        assert_eq!(small.number(3, 999_999), "0003999999");
    }

    #[test]
    fn test_balances_use_a_campaign_of_the_holders_retailer() {
        let ctx = context();
        let rows = CampaignBalanceGenerator
            .generate(IdRange::full(ctx.profile.account_holders).unwrap(), &ctx)
            .unwrap();

        for row in rows {
            let holder = row[3].as_int().unwrap() as u64;
            let retailer = ctx.refs.account_holders.retailer_of(holder).unwrap();
            let slugs: Vec<String> = ctx
                .refs
                .retailers
                .campaigns_of(retailer)
                .unwrap()
                .iter()
                .map(campaign_slug)
                .collect();
            assert!(slugs.iter().any(|slug| Some(slug.as_str()) == row[4].as_text()));
        }
    }

    #[test]
    fn test_no_balances_without_campaigns() {
        let ctx = context_for(VolumeProfile {
            campaigns_per_retailer: 0,
            allocated_rewards: 0,
            pending_rewards: 0,
            spare_rewards: 0,
            reward_updates: 0,
            ..profile()
        });
        assert_eq!(CampaignBalanceGenerator.base_count(&ctx), 0);
    }

    #[test]
    fn test_account_holder_rewards_are_the_allocated_pool() {
        let ctx = context();
        let pool = &ctx.refs.rewards;
        let rows = AccountHolderRewardGenerator.generate(IdRange::full(8).unwrap(), &ctx).unwrap();

        for (ordinal, row) in (1..).zip(&rows) {
            let reward = pool.draw(RewardKind::Allocated, ordinal).unwrap();
            assert_eq!(row[3].as_uuid(), Some(reward.uuid));
            assert_eq!(row[5].as_int(), Some(reward.account_holder.unwrap() as i64));
            assert_eq!(row[10], Value::Null);
        }
    }

    #[test]
    fn test_pending_rewards_are_disjoint_from_allocated() {
        let ctx = context();
        let allocated = AccountHolderRewardGenerator.generate(IdRange::full(8).unwrap(), &ctx).unwrap();
        let pending = PendingRewardGenerator.generate(IdRange::full(4).unwrap(), &ctx).unwrap();

        let allocated: HashSet<_> = allocated.iter().map(|row| row[3].as_uuid().unwrap()).collect();
        for row in &pending {
            assert!(!allocated.contains(&row[3].as_uuid().unwrap()));
        }

        let tomorrow = ctx.now.date_naive() + Duration::days(1);
        assert_eq!(pending[0][9], Value::Date(tomorrow));
    }
}
