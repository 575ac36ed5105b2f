//! HTTP contract of the profile service client
//!
//! Run with: cargo test --test profile_client_test

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ytdrop::storage::profile::{PlanDuration, ProfileClient, ProfileError, ProfileStore, SubscriptionStatus, UserRecord};

const TOKEN: &str = "secret-token";

fn client(server: &MockServer) -> ProfileClient {
    ProfileClient::new(&server.uri(), TOKEN, None, Duration::from_secs(5)).unwrap()
}

fn bearer() -> impl wiremock::Match {
    header("authorization", format!("Bearer {}", TOKEN).as_str())
}

#[tokio::test]
async fn get_user_parses_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .and(bearer())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "alice",
            "traffic": 321.5,
            "chat_id": 42,
            "subscription": {
                "start_subscription": "2026-03-01T00:00:00Z",
                "end_subscription": "2026-04-01T00:00:00Z",
                "subscription_status": "active",
                "duration": "month"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client(&server).get_user("alice").await.unwrap().unwrap();
    assert_eq!(record.traffic, 321.5);
    assert_eq!(record.chat_id, 42);
    assert_eq!(record.subscription.subscription_status, SubscriptionStatus::Active);
    assert_eq!(record.subscription.duration, PlanDuration::Month);
}

#[tokio::test]
async fn missing_user_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(client(&server).get_user("ghost").await.unwrap(), None);
}

#[tokio::test]
async fn exists_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice/exists"))
        .and(bearer())
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/bob/exists"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.user_exists("alice").await.unwrap());
    assert!(!client.user_exists("bob").await.unwrap());
}

#[tokio::test]
async fn create_posts_full_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(bearer())
        .and(body_json(json!({
            "username": "carol",
            "traffic": 0.0,
            "chat_id": 7,
            "subscription": {
                "start_subscription": null,
                "end_subscription": null,
                "subscription_status": "inactive",
                "duration": "month"
            }
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .create_user(&UserRecord::new("carol", 7))
        .await
        .unwrap();
}

#[tokio::test]
async fn traffic_is_put_as_a_bare_number() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/users/alice/traffic"))
        .and(bearer())
        .and(body_json(json!(12.25)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).update_traffic("alice", 12.25).await.unwrap();
}

#[tokio::test]
async fn update_user_overwrites_record() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/users/alice"))
        .and(bearer())
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut record = UserRecord::new("alice", 42);
    record.subscription.subscription_status = SubscriptionStatus::Active;
    client(&server).update_user(&record).await.unwrap();
}

#[tokio::test]
async fn server_errors_carry_status_and_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    match client(&server).get_user("alice").await {
        Err(ProfileError::Status { status, endpoint }) => {
            assert_eq!(status, 500);
            assert_eq!(endpoint, "/users/alice");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/alice/exists"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = ProfileClient::new(&server.uri(), TOKEN, None, Duration::from_millis(200)).unwrap();
    assert!(matches!(client.user_exists("alice").await, Err(ProfileError::Http(_))));
}
