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
    domain::new_subscriber::{NewSubscriber, NewSubscriberBody},
    email_client::EmailClient,
    error::ApiError,
    startup::ApplicationBaseUrl,
    templates::{ConfirmationEmail, EmailLinks, EmailTemplate},
};

#[derive(Deserialize, Debug)]
pub struct CreateParameters {
    pub referral: Option<String>,
}

struct ExistingSubscriber {
    id: Uuid,
    confirmed_email: bool,
}

#[tracing::instrument(
    name = "Creating a new subscriber handler",
    skip(body, parameters, db_pool, email_client, base_url),
    fields(
        subscriber_email = %body.email,
    )
)]
pub async fn handle_create_subscriber(
    body: web::Json<NewSubscriberBody>,
    parameters: Query<CreateParameters>,
    db_pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, ApiError> {
    let new_subscriber: NewSubscriber = body.into_inner().try_into().map_err(|err| {
        tracing::error!("Validation error: {:?}", err);
        ApiError::Validation(String::from("Provide a valid email."))
    })?;

    let existing_subscriber =
        find_subscriber_by_email(&db_pool, new_subscriber.email.as_ref()).await?;

    if let Some(existing_subscriber) = &existing_subscriber {
        if existing_subscriber.confirmed_email {
            return Err(ApiError::ExistingEmail);
        }
    }

    // An unconfirmed sign-up with the same email reuses its row, keeping the
    // original referral attribution and the same token.
    let subscriber_id = match existing_subscriber {
        Some(existing_subscriber) => existing_subscriber.id,
        None => {
            let indicated_by = match parameters.referral.as_deref() {
                Some(referral_code) => resolve_referral(&db_pool, referral_code).await?,
                None => None,
            };

            insert_subscriber(&db_pool, &new_subscriber, indicated_by).await?
        }
    };

    send_confirmation_email(&email_client, &new_subscriber, &base_url.0, &subscriber_id)
        .await
        .map_err(ApiError::SendEmail)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!(
            "Sign-up successful. A confirmation email was sent to {}.",
            new_subscriber.email
        )
    })))
}

#[tracing::instrument(name = "Find a subscriber by email", skip(db_pool, email))]
async fn find_subscriber_by_email(
    db_pool: &web::Data<PgPool>,
    email: &str,
) -> Result<Option<ExistingSubscriber>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, confirmed_email
        FROM subscribers
        WHERE email = $1
        "#,
    )
    .bind(email)
    .map(|row: PgRow| ExistingSubscriber {
        id: row.get("id"),
        confirmed_email: row.get("confirmed_email"),
    })
    .fetch_optional(db_pool.get_ref())
    .await
}

/// Resolves a referral code to a confirmed subscriber's id. Unknown,
/// unparseable or unconfirmed codes resolve to None, never to an error.
#[tracing::instrument(name = "Resolve a referral code", skip(db_pool))]
async fn resolve_referral(
    db_pool: &web::Data<PgPool>,
    referral_code: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    let referral_id = match Uuid::parse_str(referral_code) {
        Ok(referral_id) => referral_id,
        Err(_) => return Ok(None),
    };

    sqlx::query(
        r#"
        SELECT id
        FROM subscribers
        WHERE id = $1 AND confirmed_email = TRUE
        "#,
    )
    .bind(referral_id)
    .map(|row: PgRow| row.get("id"))
    .fetch_optional(db_pool.get_ref())
    .await
}

#[tracing::instrument(
    name = "Insert a new subscriber into the database",
    skip(db_pool, new_subscriber)
)]
async fn insert_subscriber(
    db_pool: &web::Data<PgPool>,
    new_subscriber: &NewSubscriber,
    indicated_by: Option<Uuid>,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO subscribers (id, email, indicated_by, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_subscriber.email.as_ref())
    .bind(indicated_by)
    .bind(Utc::now())
    .map(|row: PgRow| row.get("id"))
    .fetch_one(db_pool.get_ref())
    .await
}

#[tracing::instrument(
    name = "Send a confirmation email to a new subscriber",
    fields(
        subscriber_id = %subscriber_id,
        base_url = %base_url
    ),
    skip(email_client, new_subscriber)
)]
async fn send_confirmation_email(
    email_client: &EmailClient,
    new_subscriber: &NewSubscriber,
    base_url: &str,
    subscriber_id: &Uuid,
) -> Result<(), reqwest::Error> {
    let template = EmailTemplate::Confirmation(ConfirmationEmail {
        confirmation_url: format!("{}/newsletter/confirm?token={}", base_url, subscriber_id),
        links: EmailLinks::for_subscriber(base_url, subscriber_id),
    });

    email_client
        .send_template(new_subscriber.email.clone(), &template)
        .await
}
