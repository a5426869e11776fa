use sqlx::{postgres::PgRow, Row};
use uuid::Uuid;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

const REWARD_SUBJECT: &str = "Here is your reward for referring the newsletter";
const THANK_YOU_SUBJECT: &str = "Thank you for referring the newsletter";

async fn mount_upstream_add_subscriber(test_app: &TestApp, expected_calls: u64) {
    Mock::given(path("/v2/subscribers"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected_calls)
        .mount(&test_app.newsletter_server)
        .await;
}

async fn mount_email_server(test_app: &TestApp, expected_calls: u64) {
    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected_calls)
        .mount(&test_app.email_server)
        .await;
}

async fn fetch_confirmation_state(test_app: &TestApp, subscriber_id: &Uuid) -> (bool, bool) {
    sqlx::query(
        "SELECT confirmed_email, confirmed_email_at IS NOT NULL AS has_confirmation_time
         FROM subscribers WHERE id = $1",
    )
    .bind(subscriber_id)
    .map(|row: PgRow| (row.get("confirmed_email"), row.get("has_confirmation_time")))
    .fetch_one(&test_app.db_pool)
    .await
    .expect("Query to fetch the subscriber failed.")
}

async fn fetch_indications(test_app: &TestApp, subscriber_id: &Uuid) -> i32 {
    sqlx::query("SELECT indications FROM subscribers WHERE id = $1")
        .bind(subscriber_id)
        .map(|row: PgRow| row.get("indications"))
        .fetch_one(&test_app.db_pool)
        .await
        .expect("Query to fetch the referrer failed.")
}

fn email_subject(email_request: &wiremock::Request) -> String {
    let body: serde_json::Value =
        serde_json::from_slice(&email_request.body).expect("Invalid email request body.");

    body["subject"].as_str().unwrap().to_string()
}

fn email_recipient(email_request: &wiremock::Request) -> String {
    let body: serde_json::Value =
        serde_json::from_slice(&email_request.body).expect("Invalid email request body.");

    body["personalizations"][0]["to"][0]["email"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn confirm_without_token_is_rejected_with_400() {
    let test_app = TestApp::spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .patch(&format!("{}/subscriber/confirm", test_app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn confirm_with_an_unknown_token_returns_400_and_touches_nothing() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.newsletter_server)
        .await;

    let test_cases = vec![
        ("not-a-uuid", "a token that is not a uuid"),
        ("00000000-0000-0000-0000-000000000000", "an unknown token"),
    ];

    for (token, description) in test_cases {
        let response = test_app.patch_confirm(token).await;

        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not fail with 400 status for {}",
            description
        );

        let body: serde_json::Value = response.json().await.unwrap();

        assert!(body["error"]["message"].is_string());
        assert!(body["redirectURL"].is_string());
    }
}

#[tokio::test]
async fn confirm_marks_the_subscriber_as_confirmed() {
    let test_app = TestApp::spawn_app().await;
    let subscriber_id = test_app
        .seed_unconfirmed_subscriber("pending@test.com", None)
        .await;

    mount_upstream_add_subscriber(&test_app, 1).await;

    let response = test_app.patch_confirm(&subscriber_id.to_string()).await;

    assert_eq!(response.status().as_u16(), 200);

    let (confirmed_email, has_confirmation_time) =
        fetch_confirmation_state(&test_app, &subscriber_id).await;

    assert!(confirmed_email);
    assert!(has_confirmation_time);
}

#[tokio::test]
async fn confirm_twice_succeeds_both_times_but_notifies_upstream_once() {
    let test_app = TestApp::spawn_app().await;
    let subscriber_id = test_app
        .seed_unconfirmed_subscriber("pending@test.com", None)
        .await;

    mount_upstream_add_subscriber(&test_app, 1).await;

    let first_response = test_app.patch_confirm(&subscriber_id.to_string()).await;
    let second_response = test_app.patch_confirm(&subscriber_id.to_string()).await;

    assert_eq!(first_response.status().as_u16(), 200);
    assert_eq!(second_response.status().as_u16(), 200);

    let first_body: serde_json::Value = first_response.json().await.unwrap();
    let second_body: serde_json::Value = second_response.json().await.unwrap();

    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn confirm_referred_subscriber_credits_the_referrer_with_a_thank_you() {
    let test_app = TestApp::spawn_app().await;
    let referrer_id = test_app
        .seed_confirmed_subscriber("referrer@test.com", 0)
        .await;
    let subscriber_id = test_app
        .seed_unconfirmed_subscriber("referred@test.com", Some(referrer_id))
        .await;

    mount_upstream_add_subscriber(&test_app, 1).await;
    mount_email_server(&test_app, 1).await;

    let response = test_app.patch_confirm(&subscriber_id.to_string()).await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(fetch_indications(&test_app, &referrer_id).await, 1);

    // No tier sits at threshold 1, so the referrer gets the thank-you email
    let received_requests = &test_app.email_server.received_requests().await.unwrap();

    assert_eq!(email_subject(&received_requests[0]), THANK_YOU_SUBJECT);
    assert_eq!(email_recipient(&received_requests[0]), "referrer@test.com");
}

#[tokio::test]
async fn confirm_that_lands_exactly_on_a_tier_sends_the_reward_email() {
    let test_app = TestApp::spawn_app().await;

    test_app
        .seed_reward("Sticker pack", 3, "https://newsletter.test/rewards/stickers")
        .await;

    // Referrer sits at 2; this confirmation pushes them exactly to the tier
    let referrer_id = test_app
        .seed_confirmed_subscriber("referrer@test.com", 2)
        .await;
    let subscriber_id = test_app
        .seed_unconfirmed_subscriber("referred@test.com", Some(referrer_id))
        .await;

    mount_upstream_add_subscriber(&test_app, 1).await;
    mount_email_server(&test_app, 1).await;

    let response = test_app.patch_confirm(&subscriber_id.to_string()).await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(fetch_indications(&test_app, &referrer_id).await, 3);

    let (confirmed_email, _) = fetch_confirmation_state(&test_app, &subscriber_id).await;

    assert!(confirmed_email);

    let received_requests = &test_app.email_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received_requests[0].body).unwrap();

    assert_eq!(email_subject(&received_requests[0]), REWARD_SUBJECT);
    assert_eq!(email_recipient(&received_requests[0]), "referrer@test.com");
    assert!(body["content"][0]["value"]
        .as_str()
        .unwrap()
        .contains("Sticker pack"));
}

#[tokio::test]
async fn confirm_past_a_tier_sends_the_thank_you_email_not_the_reward() {
    let test_app = TestApp::spawn_app().await;

    test_app
        .seed_reward("Sticker pack", 3, "https://newsletter.test/rewards/stickers")
        .await;

    // Already past the tier: 3 -> 4 matches nothing
    let referrer_id = test_app
        .seed_confirmed_subscriber("referrer@test.com", 3)
        .await;
    let subscriber_id = test_app
        .seed_unconfirmed_subscriber("referred@test.com", Some(referrer_id))
        .await;

    mount_upstream_add_subscriber(&test_app, 1).await;
    mount_email_server(&test_app, 1).await;

    test_app.patch_confirm(&subscriber_id.to_string()).await;

    assert_eq!(fetch_indications(&test_app, &referrer_id).await, 4);

    let received_requests = &test_app.email_server.received_requests().await.unwrap();

    assert_eq!(email_subject(&received_requests[0]), THANK_YOU_SUBJECT);
}

#[tokio::test]
async fn confirm_with_an_unconfirmed_referrer_skips_the_credit_silently() {
    let test_app = TestApp::spawn_app().await;
    let referrer_id = test_app
        .seed_unconfirmed_subscriber("referrer@test.com", None)
        .await;
    let subscriber_id = test_app
        .seed_unconfirmed_subscriber("referred@test.com", Some(referrer_id))
        .await;

    mount_upstream_add_subscriber(&test_app, 1).await;
    // No referral email of any kind
    mount_email_server(&test_app, 0).await;

    let response = test_app.patch_confirm(&subscriber_id.to_string()).await;

    assert_eq!(response.status().as_u16(), 200);

    let (confirmed_email, _) = fetch_confirmation_state(&test_app, &subscriber_id).await;

    assert!(confirmed_email);
    assert_eq!(fetch_indications(&test_app, &referrer_id).await, 0);
}
