use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// Client for the upstream newsletter service holding the canonical mailing
/// list. Every local confirm/member/unsubscribe change is mirrored there.
pub struct NewsletterApiClient {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
struct AddSubscriberBody {
    email: String,
    double_opt_in: bool,
}

#[derive(serde::Serialize)]
struct UpdateMemberBody {
    email: String,
    member: bool,
}

#[derive(serde::Serialize)]
struct UnsubscribeBody {
    email: String,
    double_opt_in: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct IssueResponse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub sent_at: String,
    pub url: String,
}

impl NewsletterApiClient {
    pub fn new(
        base_url: String,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> NewsletterApiClient {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()
            .unwrap();

        NewsletterApiClient {
            http_client,
            base_url,
            api_key,
        }
    }

    /// Adds an email to the upstream mailing list. Double opt-in is off:
    /// the subscriber already confirmed through our own token flow.
    pub async fn add_subscriber(&self, email: &str) -> Result<(), reqwest::Error> {
        let url = format!("{}/v2/subscribers", self.base_url);
        let body = AddSubscriberBody {
            email: String::from(email),
            double_opt_in: false,
        };

        self.http_client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    pub async fn set_member(&self, email: &str, member: bool) -> Result<(), reqwest::Error> {
        let url = format!("{}/v2/subscribers", self.base_url);
        let body = UpdateMemberBody {
            email: String::from(email),
            member,
        };

        self.http_client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    pub async fn unsubscribe(&self, email: &str) -> Result<(), reqwest::Error> {
        let url = format!("{}/v2/subscribers/unsubscribe", self.base_url);
        let body = UnsubscribeBody {
            email: String::from(email),
            double_opt_in: false,
        };

        self.http_client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Lists the newsletter editions already sent, newest first.
    pub async fn get_issues(&self) -> Result<Vec<IssueResponse>, reqwest::Error> {
        let url = format!("{}/v2/issues", self.base_url);

        let issues = self
            .http_client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<IssueResponse>>()
            .await?;

        Ok(issues)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.api_key.expose_secret())
    }
}
