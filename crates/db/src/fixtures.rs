use sqlx::{Executor, Row};

use crate::repositories::RepositoryError;
use crate::DbPool;

/// Deterministic campus dataset backing the end-to-end decision tests: one
/// CSE department chain, a mentor/advisor/HOD/AHOD cast, a registrar with a
/// type-level override grant, and a three-step LEAVE flow whose advisor step
/// is auto-skippable with a 24h SLA.
pub struct CampusSeedDataset;

pub const SEED_STUDENT: &str = "stu-rahul";
pub const SEED_FLOW_ID: &str = "flow-leave";
pub const SEED_APPLICATION_TYPE: &str = "LEAVE";

impl CampusSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/campus_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Sanity check that the dataset landed in full.
    pub async fn verify(pool: &DbPool) -> Result<(), RepositoryError> {
        let checks: &[(&str, i64)] = &[
            ("SELECT COUNT(*) AS count FROM actor", 7),
            ("SELECT COUNT(*) AS count FROM actor_role", 5),
            ("SELECT COUNT(*) AS count FROM approval_step", 3),
            ("SELECT COUNT(*) AS count FROM academic_year WHERE is_current = 1", 1),
        ];
        for (query, expected) in checks {
            let count =
                sqlx::query(query).fetch_one(pool).await?.get::<i64, _>("count");
            if count != *expected {
                return Err(RepositoryError::Decode(format!(
                    "seed verification failed: `{query}` returned {count}, expected {expected}"
                )));
            }
        }
        Ok(())
    }
}
