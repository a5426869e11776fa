use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::subscriber_email::SubscriberEmail;

/// A full row from the subscribers table. The id doubles as the
/// confirmation/unsubscribe token sent out in emails.
#[derive(Debug, serde::Serialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub confirmed_email: bool,
    pub confirmed_email_at: Option<DateTime<Utc>>,
    pub indicated_by: Option<Uuid>,
    pub indications: i32,
    pub member: bool,
    pub member_since: Option<DateTime<Utc>>,
    pub aided_foundation: Option<String>,
    pub created_at: DateTime<Utc>,
}
