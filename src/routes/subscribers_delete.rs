use actix_web::{
    web::{self, Query},
    HttpResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::{
    domain::subscriber_email::SubscriberEmail, error::ApiError,
    newsletter_client::NewsletterApiClient, startup::ErrorRedirectUrl,
};

#[derive(Deserialize, Debug)]
pub struct DeleteParameters {
    pub token: Option<String>,
}

#[tracing::instrument(
    name = "Unsubscribe from the newsletter",
    skip(parameters, db_pool, newsletter_client, error_redirect_url)
)]
pub async fn handle_delete_subscriber(
    parameters: Query<DeleteParameters>,
    db_pool: web::Data<PgPool>,
    newsletter_client: web::Data<NewsletterApiClient>,
    error_redirect_url: web::Data<ErrorRedirectUrl>,
) -> Result<HttpResponse, ApiError> {
    let invalid_token = || ApiError::InvalidToken {
        redirect_url: error_redirect_url.0.clone(),
    };

    let token = parameters.token.as_deref().unwrap_or_default();
    let subscriber_id = Uuid::parse_str(token).map_err(|_| invalid_token())?;
    let email = get_subscriber_email(&db_pool, &subscriber_id)
        .await?
        .ok_or_else(invalid_token)?;

    // Mirror upstream first: drop the email from the mailing list and clear
    // its member flag, then forget the local row.
    newsletter_client
        .unsubscribe(email.as_ref())
        .await
        .map_err(ApiError::NewsletterApi)?;
    newsletter_client
        .set_member(email.as_ref(), false)
        .await
        .map_err(ApiError::NewsletterApi)?;

    delete_subscriber(&db_pool, &subscriber_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Subscription cancelled successfully. You will not receive newsletter emails anymore."
    })))
}

#[tracing::instrument(name = "Get a subscriber email by id", skip(db_pool))]
async fn get_subscriber_email(
    db_pool: &web::Data<PgPool>,
    subscriber_id: &Uuid,
) -> Result<Option<SubscriberEmail>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT email
        FROM subscribers
        WHERE id = $1
        "#,
    )
    .bind(subscriber_id)
    .map(|row: PgRow| SubscriberEmail::parse(row.get("email")).unwrap())
    .fetch_optional(db_pool.get_ref())
    .await
}

#[tracing::instrument(name = "Delete a subscriber", skip(db_pool))]
async fn delete_subscriber(
    db_pool: &web::Data<PgPool>,
    subscriber_id: &Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        DELETE FROM subscribers
        WHERE id = $1
        "#,
    )
    .bind(subscriber_id)
    .execute(db_pool.get_ref())
    .await?;

    Ok(())
}
