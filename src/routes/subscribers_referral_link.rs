use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::{
    domain::subscriber_email::SubscriberEmail, error::ApiError, startup::ApplicationBaseUrl,
};

#[derive(Deserialize, Debug)]
pub struct ReferralLinkBody {
    pub email: String,
}

struct ReferralCandidate {
    id: Uuid,
    confirmed_email: bool,
}

#[tracing::instrument(
    name = "Create a referral link for a subscriber",
    skip(body, db_pool, base_url),
    fields(subscriber_email = %body.email)
)]
pub async fn handle_create_referral_link(
    body: web::Json<ReferralLinkBody>,
    db_pool: web::Data<PgPool>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, ApiError> {
    let email = SubscriberEmail::parse(body.into_inner().email)
        .map_err(|_| ApiError::Validation(String::from("Provide a valid email.")))?;

    let subscriber = find_referral_candidate(&db_pool, email.as_ref())
        .await?
        .ok_or(ApiError::InvalidEmail)?;

    if !subscriber.confirmed_email {
        return Err(ApiError::UnconfirmedEmail);
    }

    Ok(HttpResponse::Ok().json(json!({
        "referralLink": format!("{}/newsletter/?referral={}", base_url.0, subscriber.id)
    })))
}

#[tracing::instrument(name = "Find a referral candidate by email", skip(db_pool, email))]
async fn find_referral_candidate(
    db_pool: &web::Data<PgPool>,
    email: &str,
) -> Result<Option<ReferralCandidate>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, confirmed_email
        FROM subscribers
        WHERE email = $1
        "#,
    )
    .bind(email)
    .map(|row: PgRow| ReferralCandidate {
        id: row.get("id"),
        confirmed_email: row.get("confirmed_email"),
    })
    .fetch_optional(db_pool.get_ref())
    .await
}
