//! Generation of the `e2e` profile into a real directory, and loading of
//! the generated rewards into PostgreSQL when `PYXIS_TEST_DATABASE_URL` is set.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use pyxis_data_population::fixtures::FixtureTaskTypeSource;
use pyxis_data_population::{Orchestrator, ProfileCatalog, Settings, Task};
use pyxis_database::loader::load_table;
use pyxis_database::services::REWARD;
use pyxis_database::{BatchDirectory, DatabaseError, Service, TaskTypeMetadata, TaskTypeSource};
use sqlx::{Connection, PgConnection};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn orchestrator(output_dir: &Path, batch_size: u64) -> Orchestrator {
    let mut settings = Settings::default();
    settings.generation.output_dir = output_dir.to_path_buf();
    settings.generation.batch_size = batch_size;
    settings.generation.seed = Some(7);

    let profile = ProfileCatalog::builtin().get("e2e").unwrap().clone();
    Orchestrator::new(settings, profile, Arc::new(FixtureTaskTypeSource))
}

async fn line_count(batches: &BatchDirectory, service: Service, table: &str) -> usize {
    let mut lines = 0;
    for file in batches.files_for(service, table) {
        lines += tokio::fs::read_to_string(&file.path).await.unwrap().lines().count();
    }
    lines
}

#[tokio::test]
async fn test_e2e_profile_generates_expected_row_counts() {
    let dir = TempDir::new().unwrap();
    let report = orchestrator(dir.path(), 1_000)
        .run(Task::GenerateOnly)
        .await
        .unwrap();

    let generation = report.generation.unwrap();
    assert!(report.load.is_none());
    assert_eq!(generation.seed, 7);

    let batches = BatchDirectory::scan(dir.path()).await.unwrap();
    assert_eq!(line_count(&batches, Service::Vela, "retailer_rewards").await, 2);
    assert_eq!(line_count(&batches, Service::Carina, "retailer").await, 2);
    assert_eq!(line_count(&batches, Service::Vela, "campaign").await, 2);
    assert_eq!(line_count(&batches, Service::Carina, "reward").await, 4);
    assert_eq!(line_count(&batches, Service::Polaris, "account_holder").await, 5);
    assert_eq!(line_count(&batches, Service::Polaris, "account_holder_reward").await, 2);
    assert_eq!(line_count(&batches, Service::Polaris, "account_holder_pending_reward").await, 1);

    let reward = generation.table(Service::Carina, "reward").unwrap();
    assert_eq!(reward.rows, 4);
    assert_eq!(reward.files, 1);
}

#[tokio::test]
async fn test_batching_does_not_change_the_output() {
    let whole_dir = TempDir::new().unwrap();
    let split_dir = TempDir::new().unwrap();
    orchestrator(whole_dir.path(), 1_000).generate().await.unwrap();
    orchestrator(split_dir.path(), 2).generate().await.unwrap();

    let whole = BatchDirectory::scan(whole_dir.path()).await.unwrap();
    let split = BatchDirectory::scan(split_dir.path()).await.unwrap();
    assert!(split.len() > whole.len());

    for service in Service::LOAD_ORDER {
        for spec in service.tables() {
            let mut whole_rows = String::new();
            for file in whole.files_for(service, spec.name) {
                whole_rows.push_str(&tokio::fs::read_to_string(&file.path).await.unwrap());
            }
            let mut split_rows = String::new();
            for file in split.files_for(service, spec.name) {
                split_rows.push_str(&tokio::fs::read_to_string(&file.path).await.unwrap());
            }
            // created_at differs between runs, compare everything else
            let strip = |rows: &str| -> Vec<String> {
                rows.lines()
                    .map(|line| {
                        line.split('\t')
                            .filter(|field| !field.ends_with('Z'))
                            .collect::<Vec<_>>()
                            .join("\t")
                    })
                    .collect()
            };
            assert_eq!(strip(&split_rows), strip(&whole_rows), "{}.{}", service, spec.name);
        }
    }
}

#[tokio::test]
async fn test_regeneration_replaces_stale_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("tsv-vela-99-campaign__1.tsv"), "stale\n").unwrap();

    orchestrator(dir.path(), 1_000).generate().await.unwrap();

    assert!(!dir.path().join("tsv-vela-99-campaign__1.tsv").exists());
    let batches = BatchDirectory::scan(dir.path()).await.unwrap();
    assert_eq!(line_count(&batches, Service::Vela, "campaign").await, 2);
}

struct UnreachableTaskTypes;

#[async_trait]
impl TaskTypeSource for UnreachableTaskTypes {
    async fn fetch(&self, _service: Service) -> pyxis_database::Result<TaskTypeMetadata> {
        Err(DatabaseError::Connection("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_failed_metadata_fetch_keeps_previous_files() {
    let dir = TempDir::new().unwrap();
    orchestrator(dir.path(), 1_000).generate().await.unwrap();
    let before = BatchDirectory::scan(dir.path()).await.unwrap().len();
    assert!(before > 0);

    let mut settings = Settings::default();
    settings.generation.output_dir = dir.path().to_path_buf();
    let profile = ProfileCatalog::builtin().get("e2e").unwrap().clone();
    let broken = Orchestrator::new(settings, profile, Arc::new(UnreachableTaskTypes));
    assert!(broken.run(Task::PopulateDb).await.is_err());

    let after = BatchDirectory::scan(dir.path()).await.unwrap();
    assert_eq!(after.len(), before);
    assert_eq!(line_count(&after, Service::Vela, "campaign").await, 2);
}

#[tokio::test]
async fn test_generated_rewards_load_and_resync() {
    let Ok(url) = std::env::var("PYXIS_TEST_DATABASE_URL") else {
        println!("PYXIS_TEST_DATABASE_URL not set, skipping");
        return;
    };
    let mut conn = PgConnection::connect(&url).await.unwrap();
    sqlx::query(
        "CREATE TEMP TABLE reward (
            id SERIAL PRIMARY KEY,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            reward_uuid UUID NOT NULL,
            code TEXT NOT NULL,
            allocated BOOLEAN NOT NULL,
            deleted BOOLEAN NOT NULL,
            reward_config_id INTEGER NOT NULL,
            retailer_id INTEGER NOT NULL
        )",
    )
    .execute(&mut conn)
    .await
    .unwrap();

    let dir = TempDir::new().unwrap();
    orchestrator(dir.path(), 3).generate().await.unwrap();
    let batches = BatchDirectory::scan(dir.path()).await.unwrap();
    let files = batches.files_for(Service::Carina, "reward");
    assert_eq!(files.len(), 2);

    let report = load_table(&mut conn, Service::Carina, &REWARD, &files, false)
        .await
        .unwrap();
    assert_eq!(report.rows, 4);
    assert_eq!(report.next_id, Some(5));

    let next: i32 = sqlx::query_scalar(
        "INSERT INTO reward (created_at, updated_at, reward_uuid, code, allocated, deleted, reward_config_id, retailer_id)
         VALUES (now(), now(), gen_random_uuid(), 'new', false, false, 1, 1) RETURNING id",
    )
    .fetch_one(&mut conn)
    .await
    .unwrap();
    assert_eq!(next, 5);
}
