use std::time::Duration;

use mockito::Matcher;
use schedule_sync::client::ScheduleClient;
use schedule_sync::http::{HttpSettings, HttpTransport, Transport};
use schedule_sync::model::SeasonType;
use schedule_sync::retry::{Backoff, RetryPolicy};
use schedule_sync::SyncError;
use tokio_util::sync::CancellationToken;

fn settings(base_url: String) -> HttpSettings {
    HttpSettings {
        base_url,
        timeout: Duration::from_secs(5),
        requests_per_minute: 600,
        ..HttpSettings::default()
    }
}

fn week_params() -> Vec<(String, String)> {
    vec![
        ("dates".to_string(), "2024".to_string()),
        ("seasontype".to_string(), "2".to_string()),
        ("week".to_string(), "5".to_string()),
    ]
}

#[tokio::test]
async fn get_json_sends_query_and_parses_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/scoreboard")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("dates".into(), "2024".into()),
            Matcher::UrlEncoded("seasontype".into(), "2".into()),
            Matcher::UrlEncoded("week".into(), "5".into()),
        ]))
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"events":[{"id":"401671617"}]}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(settings(server.url())).unwrap();
    let body = transport.get_json("scoreboard", &week_params()).await.unwrap();

    assert_eq!(body["events"][0]["id"], "401671617");
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/scoreboard")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let transport = HttpTransport::new(settings(server.url())).unwrap();
    let err = transport.get_json("scoreboard", &week_params()).await.unwrap_err();

    assert_eq!(err.status, Some(500));
    assert!(err.to_string().contains("upstream exploded"));
}

#[tokio::test]
async fn invalid_json_is_a_transport_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/scoreboard")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let transport = HttpTransport::new(settings(server.url())).unwrap();
    let err = transport.get_json("scoreboard", &week_params()).await.unwrap_err();
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn client_retries_then_caches() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/scoreboard")
        .match_query(Matcher::UrlEncoded("week".into(), "4".into()))
        .with_status(503)
        .expect(3)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/scoreboard")
        .match_query(Matcher::UrlEncoded("week".into(), "5".into()))
        .with_status(200)
        .with_body(r#"{"events":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let retry = RetryPolicy::new(3, Duration::from_millis(5)).with_backoff(Backoff::Constant);
    let client = ScheduleClient::new(HttpTransport::new(settings(server.url())).unwrap(), retry);
    let cancel = CancellationToken::new();

    let err = client
        .fetch_week(2024, 4, SeasonType::Regular, &cancel)
        .await
        .unwrap_err();
    match err {
        SyncError::ExhaustedRetries { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(last.status, Some(503));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    for _ in 0..3 {
        let board = client
            .fetch_week(2024, 5, SeasonType::Regular, &cancel)
            .await
            .unwrap();
        assert!(board.events.is_empty());
    }

    failing.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn recycled_client_keeps_working() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/scoreboard")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"events":[]}"#)
        .expect(2)
        .create_async()
        .await;

    let transport = HttpTransport::new(settings(server.url())).unwrap();
    transport.get_json("scoreboard", &week_params()).await.unwrap();
    transport.recycle();
    transport.get_json("scoreboard", &week_params()).await.unwrap();

    mock.assert_async().await;
}
