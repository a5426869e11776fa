use actix_web::{
    web::{self, Query},
    HttpResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::{
    domain::{reward_tier::RewardTier, subscriber_email::SubscriberEmail},
    email_client::EmailClient,
    error::ApiError,
    newsletter_client::NewsletterApiClient,
    startup::{ApplicationBaseUrl, ErrorRedirectUrl},
    templates::{EmailLinks, EmailTemplate, ReferralThankYouEmail, RewardEmail},
};

#[derive(Deserialize, Debug)]
pub struct ConfirmParameters {
    pub token: Option<String>,
}

struct PendingSubscriber {
    email: SubscriberEmail,
    confirmed_email: bool,
    indicated_by: Option<Uuid>,
}

struct Referrer {
    id: Uuid,
    email: SubscriberEmail,
    confirmed_email: bool,
}

#[tracing::instrument(
    name = "Confirm a newsletter subscription",
    skip(parameters, db_pool, newsletter_client, email_client, base_url, error_redirect_url),
    fields(token = ?parameters.token)
)]
pub async fn handle_confirm_subscriber(
    parameters: Query<ConfirmParameters>,
    db_pool: web::Data<PgPool>,
    newsletter_client: web::Data<NewsletterApiClient>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
    error_redirect_url: web::Data<ErrorRedirectUrl>,
) -> Result<HttpResponse, ApiError> {
    let invalid_token = || ApiError::InvalidToken {
        redirect_url: error_redirect_url.0.clone(),
    };

    let token = parameters.token.as_deref().unwrap_or_default();

    if token.is_empty() {
        return Err(invalid_token());
    }

    // The token is the subscriber id; anything that does not parse cannot
    // name a row.
    let subscriber_id = Uuid::parse_str(token).map_err(|_| invalid_token())?;
    let subscriber = get_subscriber(&db_pool, &subscriber_id)
        .await?
        .ok_or_else(invalid_token)?;

    // Idempotent: a second click on the confirmation link changes nothing
    // and does not re-notify the newsletter API.
    if subscriber.confirmed_email {
        return Ok(confirmation_success());
    }

    // The upstream mailing list is updated before our own store; a local
    // failure here leaves the upstream ahead until the token is retried.
    newsletter_client
        .add_subscriber(subscriber.email.as_ref())
        .await
        .map_err(ApiError::NewsletterApi)?;

    mark_email_confirmed(&db_pool, &subscriber_id).await?;

    if let Some(referrer_id) = subscriber.indicated_by {
        credit_referrer(&db_pool, &email_client, &base_url.0, &referrer_id).await?;
    }

    Ok(confirmation_success())
}

fn confirmation_success() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Email confirmed successfully."
    }))
}

/// Credits one confirmed referral to the referrer: bumps the indications
/// counter and sends the reward email when the new count lands exactly on a
/// tier threshold, the thank-you email otherwise. A missing or unconfirmed
/// referrer is skipped without an error.
#[tracing::instrument(
    name = "Credit a confirmed referral to the referrer",
    skip(db_pool, email_client, base_url)
)]
async fn credit_referrer(
    db_pool: &web::Data<PgPool>,
    email_client: &EmailClient,
    base_url: &str,
    referrer_id: &Uuid,
) -> Result<(), ApiError> {
    let referrer = match get_referrer(db_pool, referrer_id).await? {
        Some(referrer) if referrer.confirmed_email => referrer,
        _ => return Ok(()),
    };

    let indications = increment_indications(db_pool, &referrer.id).await?;
    let reward = find_reward_by_indications(db_pool, indications).await?;

    let links = EmailLinks::for_subscriber(base_url, &referrer.id);
    let template = match reward {
        // Exact threshold match: this confirmation is the one that unlocked
        // the tier, so this is the only time its reward email goes out.
        Some(reward) => EmailTemplate::Reward(RewardEmail { reward, links }),
        None => EmailTemplate::ReferralThankYou(ReferralThankYouEmail { indications, links }),
    };

    email_client
        .send_template(referrer.email, &template)
        .await
        .map_err(ApiError::SendEmail)
}

#[tracing::instrument(name = "Get a subscriber by id", skip(db_pool))]
async fn get_subscriber(
    db_pool: &web::Data<PgPool>,
    subscriber_id: &Uuid,
) -> Result<Option<PendingSubscriber>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT email, confirmed_email, indicated_by
        FROM subscribers
        WHERE id = $1
        "#,
    )
    .bind(subscriber_id)
    .map(|row: PgRow| PendingSubscriber {
        email: SubscriberEmail::parse(row.get("email")).unwrap(),
        confirmed_email: row.get("confirmed_email"),
        indicated_by: row.get("indicated_by"),
    })
    .fetch_optional(db_pool.get_ref())
    .await
}

#[tracing::instrument(name = "Mark a subscriber email as confirmed", skip(db_pool))]
async fn mark_email_confirmed(
    db_pool: &web::Data<PgPool>,
    subscriber_id: &Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE subscribers
        SET confirmed_email = TRUE, confirmed_email_at = $2
        WHERE id = $1
        "#,
    )
    .bind(subscriber_id)
    .bind(Utc::now())
    .execute(db_pool.get_ref())
    .await?;

    Ok(())
}

#[tracing::instrument(name = "Get the referrer of a subscriber", skip(db_pool))]
async fn get_referrer(
    db_pool: &web::Data<PgPool>,
    referrer_id: &Uuid,
) -> Result<Option<Referrer>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, email, confirmed_email
        FROM subscribers
        WHERE id = $1
        "#,
    )
    .bind(referrer_id)
    .map(|row: PgRow| Referrer {
        id: row.get("id"),
        email: SubscriberEmail::parse(row.get("email")).unwrap(),
        confirmed_email: row.get("confirmed_email"),
    })
    .fetch_optional(db_pool.get_ref())
    .await
}

/// Returns the post-increment count. The increment and the read are one
/// statement, so concurrent confirmations can never observe the same count.
#[tracing::instrument(name = "Increment the referrer indications counter", skip(db_pool))]
async fn increment_indications(
    db_pool: &web::Data<PgPool>,
    referrer_id: &Uuid,
) -> Result<i32, sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE subscribers
        SET indications = indications + 1
        WHERE id = $1
        RETURNING indications
        "#,
    )
    .bind(referrer_id)
    .map(|row: PgRow| row.get("indications"))
    .fetch_one(db_pool.get_ref())
    .await
}

#[tracing::instrument(name = "Find a reward tier by exact threshold", skip(db_pool))]
async fn find_reward_by_indications(
    db_pool: &web::Data<PgPool>,
    indications: i32,
) -> Result<Option<RewardTier>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT name, indications, url
        FROM rewards
        WHERE indications = $1
        "#,
    )
    .bind(indications)
    .map(|row: PgRow| RewardTier {
        name: row.get("name"),
        indications: row.get("indications"),
        url: row.get("url"),
    })
    .fetch_optional(db_pool.get_ref())
    .await
}
