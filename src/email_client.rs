use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::templates::EmailTemplate;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    sender_name: String,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
pub struct SendEmailBody {
    personalizations: Vec<SengridPersonalization>,
    from: SengridSender,
    subject: String,
    content: Vec<SengridContent>,
}

#[derive(serde::Serialize)]
struct SengridSender {
    email: String,
    name: String,
}

#[derive(serde::Serialize)]
struct SengridEmail {
    email: String,
}

#[derive(serde::Serialize)]
struct SengridPersonalization {
    to: Vec<SengridEmail>,
}

#[derive(serde::Serialize)]
struct SengridContent {
    content_type: String,
    value: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        sender_name: String,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> EmailClient {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()
            .unwrap();

        EmailClient {
            http_client,
            base_url,
            sender,
            sender_name,
            api_key,
        }
    }

    /// Renders the template and dispatches it to the recipient. Failures
    /// propagate to the caller; there is no retry.
    pub async fn send_template(
        &self,
        recipient: SubscriberEmail,
        template: &EmailTemplate,
    ) -> Result<(), reqwest::Error> {
        let recipient_email = String::from(recipient.as_ref());

        self.send_email(recipient, template.subject(), &template.render())
            .await?;

        tracing::info!("{} email sent to {}", template.kind(), recipient_email);

        Ok(())
    }

    pub async fn send_email(
        &self,
        recipient: SubscriberEmail,
        subject: &str,
        html_content: &str,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/mail/send", self.base_url);
        let body = SendEmailBody {
            from: SengridSender {
                email: String::from(self.sender.as_ref()),
                name: self.sender_name.clone(),
            },
            personalizations: vec![SengridPersonalization {
                to: vec![SengridEmail {
                    email: String::from(recipient.as_ref()),
                }],
            }],
            subject: String::from(subject),
            content: vec![SengridContent {
                content_type: String::from("text/html"),
                value: String::from(html_content),
            }],
        };

        self.http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?; // return an error when server response status code is 4xx or 5xx

        Ok(())
    }
}
