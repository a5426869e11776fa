use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{cache::Cache, error::ApiError};

const REWARDS_CACHE_KEY: &str = "rewards";
const CACHE_TTL_SECONDS: usize = 60 * 60 * 24; // 1 day

/// Public projection of a reward tier. The claim url stays private to the
/// reward email.
#[derive(Serialize, Deserialize)]
pub struct Reward {
    pub name: String,
    pub indications: i32,
}

#[tracing::instrument(name = "Get reward tiers", skip(cache, db_pool))]
pub async fn handle_get_rewards(
    cache: web::Data<Cache>,
    db_pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    if let Some(cached_rewards) = cache.get(REWARDS_CACHE_KEY).await? {
        let rewards: Vec<Reward> = serde_json::from_str(&cached_rewards)?;

        return Ok(HttpResponse::Ok().json(sorted_by_indications(rewards)));
    }

    let rewards = list_rewards(&db_pool).await?;

    if !rewards.is_empty() {
        cache
            .set_with_expiry(
                REWARDS_CACHE_KEY,
                &serde_json::to_string(&rewards)?,
                CACHE_TTL_SECONDS,
            )
            .await?;

        tracing::info!("Rewards cached");
    }

    Ok(HttpResponse::Ok().json(sorted_by_indications(rewards)))
}

// Sorted on every response, cached or not: the cache keeps fetch order.
fn sorted_by_indications(mut rewards: Vec<Reward>) -> Vec<Reward> {
    rewards.sort_by_key(|reward| reward.indications);
    rewards
}

#[tracing::instrument(name = "List reward tiers from the database", skip(db_pool))]
async fn list_rewards(db_pool: &web::Data<PgPool>) -> Result<Vec<Reward>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT name, indications
        FROM rewards
        "#,
    )
    .map(|row: PgRow| Reward {
        name: row.get("name"),
        indications: row.get("indications"),
    })
    .fetch_all(db_pool.get_ref())
    .await
}
