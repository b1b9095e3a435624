//! Volume profiles
//!
//! A profile fixes how many rows each entity gets. Profiles are looked up by
//! name from the built-in catalog, extended or overridden by the
//! `[profiles.<name>]` tables of the settings file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;

/// Loyalty scheme of generated campaigns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoyaltyType {
    #[default]
    Stamps,
    Accumulator,
}

impl LoyaltyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoyaltyType::Stamps => "STAMPS",
            LoyaltyType::Accumulator => "ACCUMULATOR",
        }
    }
}

impl fmt::Display for LoyaltyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row count targets of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeProfile {
    pub retailers: u64,
    pub campaigns_per_retailer: u64,
    pub earn_rule_per_campaign: u64,
    pub stores_per_retailer: u64,
    pub account_holders: u64,
    pub allocated_rewards: u64,
    pub pending_rewards: u64,
    pub spare_rewards: u64,
    pub reward_updates: u64,
    pub transactions: u64,
    pub loyalty_type: LoyaltyType,
    /// Days a reward stays pending before allocation, 0 allocates immediately
    pub allocation_window: u32,
    pub reward_cap: Option<u32>,
    /// Date pending rewards so that they are already due for conversion
    pub pending_reward_conversion: bool,
}

impl Default for VolumeProfile {
    fn default() -> Self {
        Self {
            retailers: 1,
            campaigns_per_retailer: 1,
            earn_rule_per_campaign: 1,
            stores_per_retailer: 1,
            account_holders: 0,
            allocated_rewards: 0,
            pending_rewards: 0,
            spare_rewards: 0,
            reward_updates: 0,
            transactions: 0,
            loyalty_type: LoyaltyType::Stamps,
            allocation_window: 0,
            reward_cap: None,
            pending_reward_conversion: false,
        }
    }
}

impl VolumeProfile {
    pub fn total_campaigns(&self) -> u64 {
        self.retailers * self.campaigns_per_retailer
    }

    pub fn total_earn_rules(&self) -> u64 {
        self.total_campaigns() * self.earn_rule_per_campaign
    }

    pub fn total_stores(&self) -> u64 {
        self.retailers * self.stores_per_retailer
    }

    /// Every reward in the pool: allocated, pending and spare
    pub fn total_rewards(&self) -> u64 {
        self.allocated_rewards + self.pending_rewards + self.spare_rewards
    }

    pub fn field(&self, field: ProfileField) -> u64 {
        match field {
            ProfileField::AccountHolders => self.account_holders,
            ProfileField::AllocatedRewards => self.allocated_rewards,
            ProfileField::PendingRewards => self.pending_rewards,
            ProfileField::Transactions => self.transactions,
        }
    }
}

/// Profile counts that drive retry-task populations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    AccountHolders,
    AllocatedRewards,
    PendingRewards,
    Transactions,
}

/// Named profiles available to a run
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: BTreeMap<String, VolumeProfile>,
}

impl ProfileCatalog {
    pub fn builtin() -> Self {
        let mut profiles = BTreeMap::new();

        profiles.insert(
            "e2e".to_string(),
            VolumeProfile {
                retailers: 2,
                campaigns_per_retailer: 1,
                earn_rule_per_campaign: 1,
                stores_per_retailer: 1,
                account_holders: 5,
                allocated_rewards: 2,
                pending_rewards: 1,
                spare_rewards: 1,
                reward_updates: 2,
                transactions: 10,
                ..VolumeProfile::default()
            },
        );
        profiles.insert(
            "dev".to_string(),
            VolumeProfile {
                retailers: 5,
                campaigns_per_retailer: 2,
                earn_rule_per_campaign: 1,
                stores_per_retailer: 2,
                account_holders: 1_000,
                allocated_rewards: 500,
                pending_rewards: 200,
                spare_rewards: 300,
                reward_updates: 200,
                transactions: 2_000,
                ..VolumeProfile::default()
            },
        );
        profiles.insert(
            "benchmark".to_string(),
            VolumeProfile {
                retailers: 10,
                campaigns_per_retailer: 10,
                earn_rule_per_campaign: 2,
                stores_per_retailer: 5,
                account_holders: 500_000,
                allocated_rewards: 250_000,
                pending_rewards: 100_000,
                spare_rewards: 200_000,
                reward_updates: 100_000,
                transactions: 1_000_000,
                ..VolumeProfile::default()
            },
        );
        profiles.insert(
            "benchmark_2".to_string(),
            VolumeProfile {
                retailers: 10,
                campaigns_per_retailer: 10,
                earn_rule_per_campaign: 2,
                stores_per_retailer: 5,
                account_holders: 500_000,
                allocated_rewards: 250_000,
                pending_rewards: 100_000,
                spare_rewards: 200_000,
                reward_updates: 100_000,
                transactions: 1_000_000,
                loyalty_type: LoyaltyType::Accumulator,
                allocation_window: 14,
                reward_cap: Some(10),
                pending_reward_conversion: true,
            },
        );

        Self { profiles }
    }

    /// Built-in catalog with `overrides` added, replacing same-named entries
    pub fn with_overrides(overrides: &BTreeMap<String, VolumeProfile>) -> Self {
        let mut catalog = Self::builtin();
        for (name, profile) in overrides {
            catalog.profiles.insert(name.clone(), profile.clone());
        }
        catalog
    }

    pub fn get(&self, name: &str) -> Result<&VolumeProfile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
