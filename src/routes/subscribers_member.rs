use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    domain::subscriber_email::SubscriberEmail, error::ApiError,
    newsletter_client::NewsletterApiClient,
};

const FOUNDATION_MIN_CHARS: usize = 3;
const FOUNDATION_MAX_CHARS: usize = 50;

#[derive(Deserialize, Debug)]
pub struct MemberBody {
    pub email: String,
    #[serde(rename = "aidedFoundation")]
    pub aided_foundation: String,
}

struct MemberCandidate {
    confirmed_email: bool,
    member: bool,
}

#[tracing::instrument(
    name = "Add a subscriber to the members list",
    skip(body, db_pool, newsletter_client),
    fields(subscriber_email = %body.email)
)]
pub async fn handle_update_member(
    body: web::Json<MemberBody>,
    db_pool: web::Data<PgPool>,
    newsletter_client: web::Data<NewsletterApiClient>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let email = SubscriberEmail::parse(body.email)
        .map_err(|_| ApiError::Validation(String::from("Invalid data.")))?;
    let foundation_chars = body.aided_foundation.chars().count();

    if !(FOUNDATION_MIN_CHARS..=FOUNDATION_MAX_CHARS).contains(&foundation_chars) {
        return Err(ApiError::Validation(String::from("Invalid data.")));
    }

    let subscriber = find_member_candidate(&db_pool, email.as_ref())
        .await?
        .ok_or(ApiError::InvalidEmail)?;

    if !subscriber.confirmed_email {
        return Err(ApiError::UnconfirmedEmail);
    }

    if subscriber.member {
        return Err(ApiError::AlreadyMember);
    }

    newsletter_client
        .set_member(email.as_ref(), true)
        .await
        .map_err(ApiError::NewsletterApi)?;

    mark_as_member(&db_pool, email.as_ref(), &body.aided_foundation).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Email added to the members list successfully."
    })))
}

#[tracing::instrument(name = "Find a member candidate by email", skip(db_pool, email))]
async fn find_member_candidate(
    db_pool: &web::Data<PgPool>,
    email: &str,
) -> Result<Option<MemberCandidate>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT confirmed_email, member
        FROM subscribers
        WHERE email = $1
        "#,
    )
    .bind(email)
    .map(|row: PgRow| MemberCandidate {
        confirmed_email: row.get("confirmed_email"),
        member: row.get("member"),
    })
    .fetch_optional(db_pool.get_ref())
    .await
}

#[tracing::instrument(name = "Mark a subscriber as member", skip(db_pool, email))]
async fn mark_as_member(
    db_pool: &web::Data<PgPool>,
    email: &str,
    aided_foundation: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE subscribers
        SET member = TRUE, member_since = $2, aided_foundation = $3
        WHERE email = $1
        "#,
    )
    .bind(email)
    .bind(Utc::now())
    .bind(aided_foundation)
    .execute(db_pool.get_ref())
    .await?;

    Ok(())
}
