//! Target services and the tables each of them receives
//!
//! Every service owns its own database. The table lists below are in load
//! order: parents before children, so that `TRUNCATE ... CASCADE` on a later
//! table never wipes data an earlier step has just loaded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DatabaseError;

/// A target service database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Vela,
    Carina,
    Polaris,
}

impl Service {
    /// Cross-service load order. Vela and Carina receive no foreign keys from
    /// the other services' tables, Polaris references both.
    pub const LOAD_ORDER: [Service; 3] = [Service::Vela, Service::Carina, Service::Polaris];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Vela => "vela",
            Service::Carina => "carina",
            Service::Polaris => "polaris",
        }
    }

    /// Tables populated for this service, in load order
    pub fn tables(&self) -> &'static [&'static TableSpec] {
        match self {
            Service::Vela => &VELA_TABLES,
            Service::Carina => &CARINA_TABLES,
            Service::Polaris => &POLARIS_TABLES,
        }
    }

    pub fn table(&self, name: &str) -> Option<&'static TableSpec> {
        self.tables().iter().copied().find(|spec| spec.name == name)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vela" => Ok(Service::Vela),
            "carina" => Ok(Service::Carina),
            "polaris" => Ok(Service::Polaris),
            other => Err(DatabaseError::UnknownService(other.to_string())),
        }
    }
}

/// Column layout of one target table
#[derive(Debug, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl TableSpec {
    /// Position of a column in the row layout
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| *name == column)
    }

    /// Comma separated, double-quoted column list for `COPY`
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| format!("\"{column}\""))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ---------------------------------------------------------------------------
// Shared retry-task bookkeeping tables
// ---------------------------------------------------------------------------

pub static RETRY_TASK: TableSpec = TableSpec {
    name: "retry_task",
    columns: &[
        "retry_task_id",
        "created_at",
        "updated_at",
        "attempts",
        "audit_data",
        "next_attempt_time",
        "status",
        "task_type_id",
    ],
};

pub static TASK_TYPE_KEY_VALUE: TableSpec = TableSpec {
    name: "task_type_key_value",
    columns: &[
        "created_at",
        "updated_at",
        "value",
        "retry_task_id",
        "task_type_key_id",
    ],
};

// ---------------------------------------------------------------------------
// Vela
// ---------------------------------------------------------------------------

pub static RETAILER_REWARDS: TableSpec = TableSpec {
    name: "retailer_rewards",
    columns: &["id", "slug"],
};

pub static CAMPAIGN: TableSpec = TableSpec {
    name: "campaign",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "status",
        "name",
        "slug",
        "retailer_id",
        "loyalty_type",
        "start_date",
        "end_date",
    ],
};

pub static EARN_RULE: TableSpec = TableSpec {
    name: "earn_rule",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "threshold",
        "increment",
        "increment_multiplier",
        "max_amount",
        "campaign_id",
    ],
};

pub static REWARD_RULE: TableSpec = TableSpec {
    name: "reward_rule",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "reward_goal",
        "reward_slug",
        "allocation_window",
        "reward_cap",
        "campaign_id",
    ],
};

pub static RETAILER_STORE: TableSpec = TableSpec {
    name: "retailer_store",
    columns: &["id", "created_at", "updated_at", "store_name", "mid", "retailer_id"],
};

pub static TRANSACTION: TableSpec = TableSpec {
    name: "transaction",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "transaction_id",
        "amount",
        "mid",
        "datetime",
        "account_holder_uuid",
        "retailer_id",
        "payment_transaction_id",
        "status",
    ],
};

pub static PROCESSED_TRANSACTION: TableSpec = TableSpec {
    name: "processed_transaction",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "transaction_id",
        "amount",
        "mid",
        "datetime",
        "account_holder_uuid",
        "retailer_id",
        "campaign_slugs",
        "payment_transaction_id",
    ],
};

pub static VELA_TABLES: [&TableSpec; 9] = [
    &RETAILER_REWARDS,
    &CAMPAIGN,
    &EARN_RULE,
    &REWARD_RULE,
    &RETAILER_STORE,
    &TRANSACTION,
    &PROCESSED_TRANSACTION,
    &RETRY_TASK,
    &TASK_TYPE_KEY_VALUE,
];

// ---------------------------------------------------------------------------
// Carina
// ---------------------------------------------------------------------------

pub static RETAILER: TableSpec = TableSpec {
    name: "retailer",
    columns: &["id", "created_at", "updated_at", "slug"],
};

pub static RETAILER_FETCH_TYPE: TableSpec = TableSpec {
    name: "retailer_fetch_type",
    columns: &[
        "created_at",
        "updated_at",
        "retailer_id",
        "fetch_type_id",
        "agent_config",
    ],
};

pub static REWARD_CONFIG: TableSpec = TableSpec {
    name: "reward_config",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "reward_slug",
        "retailer_id",
        "fetch_type_id",
        "status",
        "required_fields_values",
    ],
};

pub static REWARD: TableSpec = TableSpec {
    name: "reward",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "reward_uuid",
        "code",
        "allocated",
        "deleted",
        "reward_config_id",
        "retailer_id",
    ],
};

pub static REWARD_UPDATE: TableSpec = TableSpec {
    name: "reward_update",
    columns: &["id", "created_at", "updated_at", "reward_uuid", "date", "status"],
};

pub static CARINA_TABLES: [&TableSpec; 7] = [
    &RETAILER,
    &RETAILER_FETCH_TYPE,
    &REWARD_CONFIG,
    &REWARD,
    &REWARD_UPDATE,
    &RETRY_TASK,
    &TASK_TYPE_KEY_VALUE,
];

// ---------------------------------------------------------------------------
// Polaris
// ---------------------------------------------------------------------------

pub static RETAILER_CONFIG: TableSpec = TableSpec {
    name: "retailer_config",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "name",
        "slug",
        "account_number_prefix",
        "account_number_length",
        "profile_config",
        "marketing_preference_config",
        "loyalty_name",
        "email_header_image",
        "welcome_email_from",
        "welcome_email_subject",
    ],
};

pub static ACCOUNT_HOLDER: TableSpec = TableSpec {
    name: "account_holder",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "email",
        "status",
        "account_number",
        "account_holder_uuid",
        "opt_out_token",
        "retailer_id",
    ],
};

pub static ACCOUNT_HOLDER_PROFILE: TableSpec = TableSpec {
    name: "account_holder_profile",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "account_holder_id",
        "first_name",
        "last_name",
        "date_of_birth",
        "phone",
        "address_line1",
        "address_line2",
        "postcode",
        "city",
        "custom",
    ],
};

pub static ACCOUNT_HOLDER_MARKETING_PREFERENCE: TableSpec = TableSpec {
    name: "account_holder_marketing_preference",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "account_holder_id",
        "key_name",
        "value",
        "value_type",
    ],
};

pub static ACCOUNT_HOLDER_CAMPAIGN_BALANCE: TableSpec = TableSpec {
    name: "account_holder_campaign_balance",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "account_holder_id",
        "campaign_slug",
        "balance",
    ],
};

pub static ACCOUNT_HOLDER_REWARD: TableSpec = TableSpec {
    name: "account_holder_reward",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "reward_uuid",
        "code",
        "account_holder_id",
        "retailer_id",
        "reward_slug",
        "issued_date",
        "expiry_date",
        "redeemed_date",
        "cancelled_date",
        "status",
        "idempotency_token",
    ],
};

pub static ACCOUNT_HOLDER_PENDING_REWARD: TableSpec = TableSpec {
    name: "account_holder_pending_reward",
    columns: &[
        "id",
        "created_at",
        "updated_at",
        "pending_reward_uuid",
        "account_holder_id",
        "retailer_id",
        "campaign_slug",
        "reward_slug",
        "created_date",
        "conversion_date",
        "value",
        "count",
        "total_cost_to_user",
    ],
};

pub static POLARIS_TABLES: [&TableSpec; 9] = [
    &RETAILER_CONFIG,
    &ACCOUNT_HOLDER,
    &ACCOUNT_HOLDER_PROFILE,
    &ACCOUNT_HOLDER_MARKETING_PREFERENCE,
    &ACCOUNT_HOLDER_CAMPAIGN_BALANCE,
    &ACCOUNT_HOLDER_REWARD,
    &ACCOUNT_HOLDER_PENDING_REWARD,
    &RETRY_TASK,
    &TASK_TYPE_KEY_VALUE,
];
