use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

fn upstream_issue(index: usize) -> serde_json::Value {
    serde_json::json!({
        "id": index,
        "title": format!("Issue #{}", index),
        "description": format!("<p>Edition number {}</p>", index),
        "sent_at": "2023-03-01T12:00:00Z",
        "url": format!("https://newsletter.test/issues/{}", index),
        "html": "<html>full body, never exposed</html>",
        "active": false
    })
}

#[tokio::test]
async fn issues_are_projected_and_truncated_to_the_limit() {
    let test_app = TestApp::spawn_app().await;
    let issues_limit = test_app.config.get_issues_limit();
    let upstream_body: Vec<serde_json::Value> =
        (0..issues_limit + 3).map(upstream_issue).collect();

    Mock::given(path("/v2/issues"))
        .and(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body))
        .expect(1)
        .mount(&test_app.newsletter_server)
        .await;

    let response = test_app.get_issues().await;

    assert_eq!(response.status().as_u16(), 200);

    let issues: Vec<serde_json::Value> = response.json().await.unwrap();

    assert_eq!(issues.len(), issues_limit);

    // Only the public projection leaves the service
    let issue = issues[0].as_object().unwrap();
    let mut keys: Vec<&str> = issue.keys().map(String::as_str).collect();
    keys.sort_unstable();

    assert_eq!(keys, vec!["description", "sent_at", "title", "url"]);
}

#[tokio::test]
async fn issues_second_call_within_the_ttl_is_served_from_cache() {
    let test_app = TestApp::spawn_app().await;
    let upstream_body: Vec<serde_json::Value> = (0..2).map(upstream_issue).collect();

    Mock::given(path("/v2/issues"))
        .and(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body))
        .expect(1)
        .mount(&test_app.newsletter_server)
        .await;

    let first: Vec<serde_json::Value> = test_app.get_issues().await.json().await.unwrap();
    let second: Vec<serde_json::Value> = test_app.get_issues().await.json().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn issues_empty_upstream_response_is_not_cached() {
    let test_app = TestApp::spawn_app().await;
    let empty: Vec<serde_json::Value> = Vec::new();

    Mock::given(path("/v2/issues"))
        .and(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty))
        .expect(2)
        .mount(&test_app.newsletter_server)
        .await;

    let first = test_app.get_issues().await;
    let second = test_app.get_issues().await;

    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 200);
}
