//! Cross-table reference index
//!
//! Built once per run, in dependency order, before any table generator runs:
//! retailers and their campaigns/stores first, then the retailer of every
//! account holder, then the reward pool. Generators only read it, which is
//! what lets any id range of any table be produced independently.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::error::GenerationError;
use crate::ids::IdRange;
use crate::profiles::VolumeProfile;
use crate::seeds::{random_uuid, row_rng};

pub fn retailer_slug(retailer: u64) -> String {
    format!("retailer_{retailer}")
}

pub fn campaign_slug(campaign: u64) -> String {
    format!("campaign_{campaign}")
}

/// Reward configs and reward rules are one per campaign and share its id
pub fn reward_slug(campaign: u64) -> String {
    format!("reward_{campaign}")
}

pub fn store_mid(retailer: u64, store_number: u64) -> String {
    format!("mid-{retailer}-{store_number}")
}

/// Arithmetic ownership of campaigns, stores and earn rules
#[derive(Debug, Clone)]
pub struct RetailerIndex {
    retailers: u64,
    campaigns_per_retailer: u64,
    stores_per_retailer: u64,
    earn_rule_per_campaign: u64,
}

impl RetailerIndex {
    pub fn new(profile: &VolumeProfile) -> Self {
        Self {
            retailers: profile.retailers,
            campaigns_per_retailer: profile.campaigns_per_retailer,
            stores_per_retailer: profile.stores_per_retailer,
            earn_rule_per_campaign: profile.earn_rule_per_campaign,
        }
    }

    pub fn retailers(&self) -> u64 {
        self.retailers
    }

    pub fn total_campaigns(&self) -> u64 {
        self.retailers * self.campaigns_per_retailer
    }

    pub fn retailer_of_campaign(&self, campaign: u64) -> u64 {
        (campaign - 1) / self.campaigns_per_retailer.max(1) + 1
    }

    pub fn campaigns_of(&self, retailer: u64) -> Option<IdRange> {
        let per = self.campaigns_per_retailer;
        IdRange::new((retailer - 1) * per + 1, retailer * per)
    }

    /// Owning retailer and 1-based number of the store within it
    pub fn store_position(&self, store: u64) -> (u64, u64) {
        let per = self.stores_per_retailer.max(1);
        ((store - 1) / per + 1, (store - 1) % per + 1)
    }

    pub fn campaign_of_earn_rule(&self, earn_rule: u64) -> u64 {
        (earn_rule - 1) / self.earn_rule_per_campaign.max(1) + 1
    }

    /// Merchant id of a random store of `retailer`
    pub fn random_mid(&self, retailer: u64, rng: &mut impl Rng) -> String {
        if self.stores_per_retailer == 0 {
            return "MID_1234".to_string();
        }
        store_mid(retailer, rng.gen_range(1..=self.stores_per_retailer))
    }

    /// Random campaign of `retailer`, `None` when retailers have no campaigns
    pub fn random_campaign(&self, retailer: u64, rng: &mut impl Rng) -> Option<u64> {
        let campaigns = self.campaigns_of(retailer)?;
        Some(rng.gen_range(campaigns.start()..=campaigns.stop()))
    }
}

/// Retailer membership of every account holder
#[derive(Debug, Clone)]
pub struct AccountHolderIndex {
    seed: u64,
    retailer_of: Vec<u32>,
    by_retailer: Vec<Vec<u64>>,
}

impl AccountHolderIndex {
    pub fn build(
        profile: &VolumeProfile,
        retailers: &RetailerIndex,
        seed: u64,
    ) -> Result<Self, GenerationError> {
        if profile.account_holders > 0 && retailers.retailers() == 0 {
            return Err(GenerationError::InconsistentProfile(
                "account holders need at least one retailer".to_string(),
            ));
        }
        let retailer_count = u32::try_from(retailers.retailers()).map_err(|_| {
            GenerationError::InconsistentProfile("too many retailers".to_string())
        })?;

        let mut retailer_of = Vec::with_capacity(profile.account_holders as usize);
        let mut by_retailer = vec![Vec::new(); retailer_count as usize];
        for holder in 1..=profile.account_holders {
            let retailer = row_rng(seed, "account_holder.retailer", holder).gen_range(1..=retailer_count);
            retailer_of.push(retailer);
            by_retailer[retailer as usize - 1].push(holder);
        }

        Ok(Self {
            seed,
            retailer_of,
            by_retailer,
        })
    }

    pub fn len(&self) -> u64 {
        self.retailer_of.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.retailer_of.is_empty()
    }

    pub fn retailer_of(&self, holder: u64) -> Option<u64> {
        let index = usize::try_from(holder.checked_sub(1)?).ok()?;
        self.retailer_of.get(index).map(|retailer| u64::from(*retailer))
    }

    pub fn holders_of(&self, retailer: u64) -> &[u64] {
        retailer
            .checked_sub(1)
            .and_then(|index| self.by_retailer.get(index as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Public identifier of an account holder, stable for a run seed
    pub fn uuid(&self, holder: u64) -> Uuid {
        random_uuid(&mut row_rng(self.seed, "account_holder.uuid", holder))
    }
}

/// Sub-pools of the reward pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardKind {
    Allocated,
    Pending,
    Spare,
}

impl RewardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKind::Allocated => "allocated",
            RewardKind::Pending => "pending",
            RewardKind::Spare => "spare",
        }
    }
}

/// One reward of the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardEntry {
    pub id: u64,
    pub kind: RewardKind,
    /// Also the campaign id, configs being one per campaign
    pub reward_config: u64,
    pub retailer: u64,
    /// Set for allocated and pending rewards
    pub account_holder: Option<u64>,
    pub uuid: Uuid,
}

/// Rewards `1..=allocated` are allocated, the next `pending` ids pending and
/// the remaining `spare` ids spare.
#[derive(Debug, Clone)]
pub struct RewardPool {
    seed: u64,
    allocated: u64,
    pending: u64,
    spare: u64,
    entries: Vec<RewardEntry>,
}

impl RewardPool {
    pub fn build(
        profile: &VolumeProfile,
        retailers: &RetailerIndex,
        holders: &AccountHolderIndex,
        seed: u64,
    ) -> Result<Self, GenerationError> {
        let owned = profile.allocated_rewards + profile.pending_rewards;
        let total = profile.total_rewards();

        if total > 0 && retailers.total_campaigns() == 0 {
            return Err(GenerationError::InconsistentProfile(
                "rewards need at least one campaign to hang a reward config on".to_string(),
            ));
        }

        // Configs whose retailer has someone to own a reward
        let eligible: Vec<u64> = (1..=retailers.total_campaigns())
            .filter(|config| !holders.holders_of(retailers.retailer_of_campaign(*config)).is_empty())
            .collect();
        if owned > 0 && eligible.is_empty() {
            return Err(GenerationError::InconsistentProfile(
                "allocated and pending rewards need a retailer with account holders".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(total as usize);
        for id in 1..=total {
            let mut rng = row_rng(seed, "reward", id);
            let kind = if id <= profile.allocated_rewards {
                RewardKind::Allocated
            } else if id <= owned {
                RewardKind::Pending
            } else {
                RewardKind::Spare
            };

            let (reward_config, account_holder) = match kind {
                RewardKind::Spare => (rng.gen_range(1..=retailers.total_campaigns()), None),
                RewardKind::Allocated | RewardKind::Pending => {
                    let config = *eligible.choose(&mut rng).ok_or_else(|| {
                        GenerationError::InconsistentProfile("no eligible reward config".to_string())
                    })?;
                    let retailer = retailers.retailer_of_campaign(config);
                    let holder = holders.holders_of(retailer).choose(&mut rng).copied();
                    (config, holder)
                }
            };

            entries.push(RewardEntry {
                id,
                kind,
                reward_config,
                retailer: retailers.retailer_of_campaign(reward_config),
                account_holder,
                uuid: random_uuid(&mut rng),
            });
        }

        debug!(
            "Reward pool built: {} allocated, {} pending, {} spare",
            profile.allocated_rewards, profile.pending_rewards, profile.spare_rewards
        );

        Ok(Self {
            seed,
            allocated: profile.allocated_rewards,
            pending: profile.pending_rewards,
            spare: profile.spare_rewards,
            entries,
        })
    }

    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_of(&self, kind: RewardKind) -> u64 {
        match kind {
            RewardKind::Allocated => self.allocated,
            RewardKind::Pending => self.pending,
            RewardKind::Spare => self.spare,
        }
    }

    fn offset_of(&self, kind: RewardKind) -> u64 {
        match kind {
            RewardKind::Allocated => 0,
            RewardKind::Pending => self.allocated,
            RewardKind::Spare => self.allocated + self.pending,
        }
    }

    /// The `ordinal`-th (1-based) reward of a sub-pool
    pub fn draw(&self, kind: RewardKind, ordinal: u64) -> Result<&RewardEntry, GenerationError> {
        let available = self.size_of(kind);
        if ordinal == 0 || ordinal > available {
            return Err(GenerationError::PoolExhausted {
                pool: kind.as_str(),
                requested: ordinal,
                available,
            });
        }
        self.get(self.offset_of(kind) + ordinal).ok_or(GenerationError::PoolExhausted {
            pool: kind.as_str(),
            requested: ordinal,
            available,
        })
    }

    /// Reward by its global id
    pub fn get(&self, id: u64) -> Option<&RewardEntry> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }

    /// Redemption code of a reward
    pub fn code(&self, id: u64) -> String {
        random_uuid(&mut row_rng(self.seed, "reward.code", id)).to_string()
    }
}

/// Everything dependent generators need to know about their parents
#[derive(Debug, Clone)]
pub struct CrossRefs {
    pub retailers: RetailerIndex,
    pub account_holders: AccountHolderIndex,
    pub rewards: RewardPool,
}

impl CrossRefs {
    pub fn build(profile: &VolumeProfile, seed: u64) -> Result<Self, GenerationError> {
        check_profile(profile)?;

        let retailers = RetailerIndex::new(profile);
        let account_holders = AccountHolderIndex::build(profile, &retailers, seed)?;
        let rewards = RewardPool::build(profile, &retailers, &account_holders, seed)?;

        Ok(Self {
            retailers,
            account_holders,
            rewards,
        })
    }
}

fn check_profile(profile: &VolumeProfile) -> Result<(), GenerationError> {
    let inconsistent = |message: &str| Err(GenerationError::InconsistentProfile(message.to_string()));

    if profile.reward_updates > 0 && profile.allocated_rewards == 0 {
        return inconsistent("reward updates need allocated rewards to update");
    }
    if profile.transactions > 0 && profile.retailers == 0 {
        return inconsistent("transactions need at least one retailer");
    }
    if profile.retailers > 9_999 {
        return inconsistent("retailer ids must fit the four digit account number prefix");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn profile() -> VolumeProfile {
        VolumeProfile {
            retailers: 3,
            campaigns_per_retailer: 2,
            stores_per_retailer: 2,
            account_holders: 40,
            allocated_rewards: 10,
            pending_rewards: 5,
            spare_rewards: 7,
            reward_updates: 4,
            transactions: 20,
            ..VolumeProfile::default()
        }
    }

    #[test]
    fn test_campaign_ownership_is_arithmetic() {
        let retailers = RetailerIndex::new(&profile());
        assert_eq!(retailers.retailer_of_campaign(1), 1);
        assert_eq!(retailers.retailer_of_campaign(2), 1);
        assert_eq!(retailers.retailer_of_campaign(3), 2);
        assert_eq!(retailers.campaigns_of(3), IdRange::new(5, 6));
        assert_eq!(retailers.store_position(4), (2, 2));
    }

    #[test]
    fn test_account_holders_partition_by_retailer() {
        let refs = CrossRefs::build(&profile(), 1).unwrap();
        let holders = &refs.account_holders;

        let total: usize = (1..=3).map(|r| holders.holders_of(r).len()).sum();
        assert_eq!(total, 40);
        for retailer in 1..=3 {
            for holder in holders.holders_of(retailer) {
                assert_eq!(holders.retailer_of(*holder), Some(retailer));
            }
        }
        assert_eq!(holders.retailer_of(41), None);
    }

    #[test]
    fn test_pool_sub_pools_are_disjoint_and_exact() {
        let refs = CrossRefs::build(&profile(), 9).unwrap();
        let pool = &refs.rewards;

        let mut seen = HashSet::new();
        for (kind, size) in [
            (RewardKind::Allocated, 10),
            (RewardKind::Pending, 5),
            (RewardKind::Spare, 7),
        ] {
            assert_eq!(pool.size_of(kind), size);
            for ordinal in 1..=size {
                let entry = pool.draw(kind, ordinal).unwrap();
                assert_eq!(entry.kind, kind);
                assert!(seen.insert(entry.id));
            }
            assert!(matches!(
                pool.draw(kind, size + 1),
                Err(GenerationError::PoolExhausted { .. })
            ));
        }
        assert_eq!(seen.len() as u64, pool.len());
    }

    #[test]
    fn test_owned_rewards_belong_to_holders_of_their_retailer() {
        let refs = CrossRefs::build(&profile(), 3).unwrap();
        for id in 1..=15 {
            let entry = refs.rewards.get(id).unwrap();
            let holder = entry.account_holder.unwrap();
            assert_eq!(refs.account_holders.retailer_of(holder), Some(entry.retailer));
            assert_eq!(refs.retailers.retailer_of_campaign(entry.reward_config), entry.retailer);
        }
        assert_eq!(refs.rewards.get(16).unwrap().account_holder, None);
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = CrossRefs::build(&profile(), 5).unwrap();
        let second = CrossRefs::build(&profile(), 5).unwrap();
        assert_eq!(first.rewards.get(3), second.rewards.get(3));
        assert_eq!(first.account_holders.uuid(7), second.account_holders.uuid(7));
        assert_eq!(first.rewards.code(3), second.rewards.code(3));
    }

    #[test]
    fn test_inconsistent_profiles_are_rejected() {
        let no_holders = VolumeProfile {
            account_holders: 0,
            ..profile()
        };
        assert!(matches!(
            CrossRefs::build(&no_holders, 1),
            Err(GenerationError::InconsistentProfile(_))
        ));

        let no_allocations = VolumeProfile {
            allocated_rewards: 0,
            ..profile()
        };
        assert!(matches!(
            CrossRefs::build(&no_allocations, 1),
            Err(GenerationError::InconsistentProfile(_))
        ));

        let no_campaigns = VolumeProfile {
            campaigns_per_retailer: 0,
            ..profile()
        };
        assert!(CrossRefs::build(&no_campaigns, 1).is_err());
    }
}
