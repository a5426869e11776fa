use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::{
    cache::Cache,
    error::ApiError,
    newsletter_client::{IssueResponse, NewsletterApiClient},
    startup::IssuesLimit,
};

const ISSUES_CACHE_KEY: &str = "issues";
const CACHE_TTL_SECONDS: usize = 60 * 60 * 24; // 1 day

/// Public projection of an upstream issue.
#[derive(Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
    pub description: String,
    pub sent_at: String,
    pub url: String,
}

impl From<IssueResponse> for Issue {
    fn from(issue: IssueResponse) -> Self {
        Issue {
            title: issue.title,
            description: issue.description,
            sent_at: issue.sent_at,
            url: issue.url,
        }
    }
}

#[tracing::instrument(name = "Get newsletter issues", skip(cache, newsletter_client, issues_limit))]
pub async fn handle_get_issues(
    cache: web::Data<Cache>,
    newsletter_client: web::Data<NewsletterApiClient>,
    issues_limit: web::Data<IssuesLimit>,
) -> Result<HttpResponse, ApiError> {
    if let Some(cached_issues) = cache.get(ISSUES_CACHE_KEY).await? {
        let issues: Vec<Issue> = serde_json::from_str(&cached_issues)?;

        return Ok(HttpResponse::Ok().json(issues));
    }

    let issues: Vec<Issue> = newsletter_client
        .get_issues()
        .await
        .map_err(ApiError::NewsletterApi)?
        .into_iter()
        .map(Issue::from)
        .take(issues_limit.0)
        .collect();

    if !issues.is_empty() {
        cache
            .set_with_expiry(
                ISSUES_CACHE_KEY,
                &serde_json::to_string(&issues)?,
                CACHE_TTL_SECONDS,
            )
            .await?;

        tracing::info!("{} issues cached", issues.len());
    }

    Ok(HttpResponse::Ok().json(issues))
}
