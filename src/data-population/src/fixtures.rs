//! Static fixtures shared by the generators
//!
//! JSON documents stored verbatim in config columns, the retry-task
//! populations of each service, and a built-in copy of the services'
//! task-type registrations for runs without database access.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use fake::faker::lorem::en::Word;
use fake::Fake;
use pyxis_database::{
    KeyValueType, Result as DatabaseResult, Service, TaskType, TaskTypeKey, TaskTypeMetadata,
    TaskTypeSource,
};
use rand::Rng;
use serde_json::{json, Value as JsonValue};

use crate::profiles::ProfileField;
use crate::seeds::random_ascii;

use KeyValueType::{Boolean, Datetime, Integer, String as Text};

pub fn profile_config() -> JsonValue {
    let field = |label: &str| json!({"required": "true", "label": label});
    json!({
        "email": field("email"),
        "first_name": field("first_name"),
        "last_name": field("last_name"),
        "date_of_birth": field("date_of_birth"),
        "phone": field("phone"),
        "address_line1": field("address_line1"),
        "address_line2": field("address_line2"),
        "postcode": field("postcode"),
        "city": field("city"),
    })
}

pub fn marketing_preferences() -> JsonValue {
    json!({
        "marketing_pref": {
            "label": "Would you like to receive marketing?",
            "type": "boolean",
        }
    })
}

/// Request/response trail stored on every generated retry task
pub fn audit_data() -> JsonValue {
    json!([
        {
            "request": {
                "url": "http://polaris-api/bpl/loyalty/test-retailer/accounts/67f25342-158b-44e0-b5c3-24cedf49b750/adjustments"
            },
            "response": {"body": "{new_balance:375, campaign_slug:test-campaign-1}", "status": 200},
            "timestamp": "2021-11-01T15:39:40.050413",
        },
        {
            "request": {"url": "http://carina-api/bpl/vouchers/test-retailer/vouchers/10percentoff/allocation"},
            "response": {"body": "{}", "status": 202},
            "timestamp": "2021-11-01T15:39:40.138773",
        },
    ])
}

/// Task type and the profile counts whose sum gives its number of retry tasks
pub type RetryPopulation = (&'static str, &'static [ProfileField]);

const POLARIS_RETRY_POPULATIONS: &[RetryPopulation] = &[
    ("enrolment-callback", &[ProfileField::AccountHolders]),
    ("account-holder-activation", &[ProfileField::AccountHolders]),
    ("create-campaign-balances", &[ProfileField::AccountHolders]),
    ("send-welcome-email", &[ProfileField::AccountHolders]),
    (
        "pending-reward-allocation",
        &[ProfileField::PendingRewards, ProfileField::AllocatedRewards],
    ),
    ("convert-pending-rewards", &[ProfileField::PendingRewards]),
    ("delete-pending-rewards", &[ProfileField::PendingRewards]),
];

const VELA_RETRY_POPULATIONS: &[RetryPopulation] =
    &[("reward-adjustment", &[ProfileField::Transactions])];

const CARINA_RETRY_POPULATIONS: &[RetryPopulation] =
    &[("reward-issuance", &[ProfileField::AllocatedRewards])];

/// Retry-task populations of `service`, in block allocation order
pub fn retry_populations(service: Service) -> &'static [RetryPopulation] {
    match service {
        Service::Polaris => POLARIS_RETRY_POPULATIONS,
        Service::Vela => VELA_RETRY_POPULATIONS,
        Service::Carina => CARINA_RETRY_POPULATIONS,
    }
}

type KeyFixture = (i32, &'static str, KeyValueType);
type TaskTypeFixture = (i32, &'static str, &'static [KeyFixture]);

const POLARIS_TASK_TYPES: &[TaskTypeFixture] = &[
    (
        1,
        "account-holder-activation",
        &[
            (1, "account_holder_id", Integer),
            (2, "welcome_email_retry_task_id", Integer),
            (3, "callback_retry_task_id", Integer),
        ],
    ),
    (2, "send-welcome-email", &[(4, "account_holder_id", Integer)]),
    (
        3,
        "enrolment-callback",
        &[
            (5, "account_holder_id", Integer),
            (6, "callback_url", Text),
            (7, "third_party_identifier", Text),
        ],
    ),
    (
        4,
        "create-campaign-balances",
        &[(8, "retailer_slug", Text), (9, "campaign_slug", Text)],
    ),
    (
        5,
        "delete-campaign-balances",
        &[(10, "retailer_slug", Text), (11, "campaign_slug", Text)],
    ),
    (
        6,
        "cancel-rewards",
        &[(12, "retailer_slug", Text), (13, "reward_slug", Text)],
    ),
    (
        7,
        "pending-reward-allocation",
        &[
            (14, "pending_reward_id", Integer),
            (15, "account_holder_id", Integer),
            (16, "retailer_slug", Text),
            (17, "reward_slug", Text),
        ],
    ),
    (
        8,
        "anonymise-account-holder",
        &[(18, "account_holder_id", Integer), (19, "retailer_id", Integer)],
    ),
    (
        9,
        "pending-accounts-activation",
        &[(20, "retailer_slug", Text), (21, "campaign_slug", Text)],
    ),
    (
        10,
        "convert-pending-rewards",
        &[(22, "retailer_slug", Text), (23, "campaign_slug", Text)],
    ),
    (
        11,
        "delete-pending-rewards",
        &[(24, "retailer_slug", Text), (25, "campaign_slug", Text)],
    ),
];

const VELA_TASK_TYPES: &[TaskTypeFixture] = &[
    (
        1,
        "reward-adjustment",
        &[
            (1, "account_holder_uuid", Text),
            (2, "retailer_slug", Text),
            (3, "campaign_slug", Text),
            (4, "adjustment_amount", Integer),
            (5, "processed_transaction_id", Integer),
            (6, "allocation_token", Text),
            (7, "pre_allocation_token", Text),
            (8, "post_allocation_token", Text),
            (9, "reward_only", Boolean),
            (10, "secondary_reward_retry_task_id", Integer),
        ],
    ),
    (
        2,
        "reward-status-adjustment",
        &[
            (11, "retailer_slug", Text),
            (12, "reward_slug", Text),
            (13, "status", Text),
        ],
    ),
    (
        3,
        "create-campaign-balances",
        &[(14, "retailer_slug", Text), (15, "campaign_slug", Text)],
    ),
    (
        4,
        "delete-campaign-balances",
        &[(16, "retailer_slug", Text), (17, "campaign_slug", Text)],
    ),
    (
        5,
        "convert-or-delete-pending-rewards",
        &[
            (18, "retailer_slug", Text),
            (19, "campaign_slug", Text),
            (20, "issue_pending_rewards", Boolean),
        ],
    ),
];

const CARINA_TASK_TYPES: &[TaskTypeFixture] = &[
    (
        1,
        "reward-issuance",
        &[
            (1, "account_url", Text),
            (2, "issued_date", Datetime),
            (3, "expiry_date", Datetime),
            (4, "reward_config_id", Integer),
            (5, "reward_slug", Text),
            (6, "reward_uuid", Text),
            (7, "code", Text),
            (12, "idempotency_token", Text),
            (17, "customer_card_ref", Text),
        ],
    ),
    (
        2,
        "reward-status-adjustment",
        &[
            (8, "reward_uuid", Text),
            (9, "retailer_slug", Text),
            (10, "date", Datetime),
            (11, "status", Text),
        ],
    ),
    (
        3,
        "cancel-rewards",
        &[(13, "retailer_slug", Text), (14, "reward_slug", Text)],
    ),
    (
        4,
        "delete-unallocated-rewards",
        &[(15, "retailer_slug", Text), (16, "reward_slug", Text)],
    ),
];

/// Task-type registrations as shipped by the services' migrations
pub fn fixture_task_types(service: Service) -> TaskTypeMetadata {
    let fixtures = match service {
        Service::Polaris => POLARIS_TASK_TYPES,
        Service::Vela => VELA_TASK_TYPES,
        Service::Carina => CARINA_TASK_TYPES,
    };

    TaskTypeMetadata::from_task_types(fixtures.iter().map(|(task_type_id, name, keys)| {
        TaskType {
            task_type_id: *task_type_id,
            name: name.to_string(),
            keys: keys
                .iter()
                .map(|(task_type_key_id, key_name, value_type)| TaskTypeKey {
                    task_type_key_id: *task_type_key_id,
                    name: key_name.to_string(),
                    value_type: *value_type,
                })
                .collect(),
        }
    }))
}

/// [`TaskTypeSource`] answering from the built-in registrations
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureTaskTypeSource;

#[async_trait]
impl TaskTypeSource for FixtureTaskTypeSource {
    async fn fetch(&self, service: Service) -> DatabaseResult<TaskTypeMetadata> {
        Ok(fixture_task_types(service))
    }
}

/// Fake value for a task-type key of the given type, as stored in
/// `task_type_key_value.value`
pub fn fake_key_value(value_type: KeyValueType, rng: &mut impl Rng) -> String {
    match value_type {
        KeyValueType::String => random_ascii(rng, 20),
        KeyValueType::Integer => rng.gen_range(0..10_000).to_string(),
        KeyValueType::Float => format!("{:.2}", rng.gen_range(0.0..10_000.0)),
        KeyValueType::Boolean => {
            let value = if rng.gen_bool(0.5) { "True" } else { "False" };
            value.to_string()
        }
        KeyValueType::Date => fake_date(rng).format("%Y-%m-%d").to_string(),
        KeyValueType::Datetime => {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(rng.gen_range(0..86_400), 0)
                .unwrap_or_default();
            NaiveDateTime::new(fake_date(rng), time)
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string()
        }
        KeyValueType::Json => {
            let mut document = serde_json::Map::new();
            for _ in 0..2 {
                let key: String = Word().fake_with_rng(rng);
                document.insert(key, JsonValue::String(random_ascii(rng, 10)));
            }
            JsonValue::Object(document).to_string()
        }
    }
}

fn fake_date(rng: &mut impl Rng) -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN) + Duration::days(rng.gen_range(0..9_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::row_rng;

    #[test]
    fn test_every_retry_population_has_a_fixture_task_type() {
        for service in Service::LOAD_ORDER {
            let metadata = fixture_task_types(service);
            for (task_type, fields) in retry_populations(service) {
                let registered = metadata.get(task_type);
                assert!(registered.is_some(), "{service} lacks {task_type}");
                assert!(!registered.unwrap().keys.is_empty());
                assert!(!fields.is_empty());
            }
        }
    }

    #[test]
    fn test_fixture_keys_are_unique_per_service() {
        for service in Service::LOAD_ORDER {
            let mut ids: Vec<i32> = fixture_task_types(service)
                .iter()
                .flat_map(|task_type| task_type.keys.iter().map(|key| key.task_type_key_id))
                .collect();
            let count = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), count);
        }
    }

    #[test]
    fn test_fake_values_match_their_type() {
        let mut rng = row_rng(1, "task_type_key_value", 1);

        assert!(fake_key_value(KeyValueType::Integer, &mut rng).parse::<i64>().is_ok());
        assert!(fake_key_value(KeyValueType::Float, &mut rng).parse::<f64>().is_ok());
        assert!(["True", "False"].contains(&fake_key_value(KeyValueType::Boolean, &mut rng).as_str()));
        assert!(NaiveDate::parse_from_str(&fake_key_value(KeyValueType::Date, &mut rng), "%Y-%m-%d").is_ok());
        assert!(NaiveDateTime::parse_from_str(
            &fake_key_value(KeyValueType::Datetime, &mut rng),
            "%Y-%m-%dT%H:%M:%S"
        )
        .is_ok());

        let json: JsonValue =
            serde_json::from_str(&fake_key_value(KeyValueType::Json, &mut rng)).unwrap();
        assert!(json.is_object());
    }

    #[tokio::test]
    async fn test_fixture_source() {
        let metadata = FixtureTaskTypeSource.fetch(Service::Carina).await.unwrap();
        let issuance = metadata.get("reward-issuance").unwrap();
        assert_eq!(issuance.task_type_id, 1);
        assert_eq!(issuance.keys.len(), 9);
    }
}
