//! End-to-end tests of the public HTTP surface.

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;
use common::{Reply, TestService};

const KYIV: &str = "Київська область";

async fn aliased_service() -> (common::MockUpstream, TestService) {
    let doc = common::status_document(&[("A", true), ("B", false), (KYIV, true)]);
    let upstream = common::start_mock_upstream(Reply::Json(doc)).await;
    let aliases = common::write_alias_file(&[("A", "alpha"), (KYIV, "kyiv")]);
    let service = common::spawn_service(common::test_config(&upstream.url(), Some(aliases))).await;
    (upstream, service)
}

#[tokio::test]
async fn root_lists_every_entity_under_public_names() {
    let (_upstream, service) = aliased_service().await;

    let res = common::client().get(service.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    let mut keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    keys.sort();
    assert_eq!(keys, ["B", "alpha", "kyiv"]);
    assert_eq!(
        body["alpha"],
        json!({"alert": true, "start": "2022-05-01T10:00:00Z", "stop": null})
    );
    assert_eq!(
        body["B"],
        json!({"alert": false, "start": null, "stop": "2022-05-01T11:00:00Z"})
    );

    service.stop().await;
}

#[tokio::test]
async fn entity_is_reachable_by_alias_and_canonical_name() {
    let (_upstream, service) = aliased_service().await;
    let client = common::client();
    let encoded = utf8_percent_encode(KYIV, NON_ALPHANUMERIC).to_string();

    let mut bodies = Vec::new();
    for path in ["/kyiv".to_string(), format!("/{}", encoded)] {
        let res = client.get(service.url(&path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "GET {}", path);
        bodies.push(res.json::<serde_json::Value>().await.unwrap());
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["alert"], json!(true));

    service.stop().await;
}

#[tokio::test]
async fn names_without_aliases_pass_through() {
    let doc = common::status_document(&[("A", true)]);
    let upstream = common::start_mock_upstream(Reply::Json(doc)).await;
    let service = common::spawn_service(common::test_config(&upstream.url(), None)).await;

    let res = common::client().get(service.url("/A")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    service.stop().await;
}

#[tokio::test]
async fn unknown_entity_is_not_found() {
    let (_upstream, service) = aliased_service().await;

    let res = common::client().get(service.url("/Atlantis")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), r#"{"Error":"Not found"}"#);

    service.stop().await;
}

#[tokio::test]
async fn undecodable_name_is_bad_request_without_upstream_call() {
    let (upstream, service) = aliased_service().await;

    let res = common::client().get(service.url("/%FF")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), r#"{"Error":"Bad request"}"#);
    assert_eq!(upstream.hits(), 0);

    service.stop().await;
}

#[tokio::test]
async fn query_string_is_not_part_of_the_name() {
    let (_upstream, service) = aliased_service().await;

    let res = common::client().get(service.url("/alpha?pretty=1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    service.stop().await;
}

#[tokio::test]
async fn upstream_is_fetched_for_every_request() {
    let upstream = common::start_programmable_upstream(|index| {
        Reply::Json(common::status_document(&[("A", index == 0)]))
    })
    .await;
    let service = common::spawn_service(common::test_config(&upstream.url(), None)).await;
    let client = common::client();

    for expected in [true, false] {
        let body: serde_json::Value = client
            .get(service.url("/A"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["alert"], json!(expected));
    }
    assert_eq!(upstream.hits(), 2);

    service.stop().await;
}

#[tokio::test]
async fn every_response_carries_framing_headers() {
    let (_upstream, service) = aliased_service().await;
    let mut stream = TcpStream::connect(service.addr).await.unwrap();

    for path in ["/", "/alpha", "/Atlantis"] {
        let res = common::raw_get(&mut stream, path).await;

        let length: usize = res.header("content-length").unwrap().parse().unwrap();
        assert_eq!(length, res.body.len(), "GET {}", path);
        assert_eq!(res.header("content-type"), Some("application/json; charset=utf-8"));
        assert_eq!(res.header("connection"), Some("keep-alive"));
        assert_eq!(res.header("keep-alive"), Some("timeout=5, max=10"));
        assert_eq!(res.header("server"), Some("AAPI/1.0"));
        assert!(res.header("x-request-id").is_some());
    }

    service.stop().await;
}

#[tokio::test]
async fn supplied_request_id_is_echoed() {
    let (_upstream, service) = aliased_service().await;

    let res = common::client()
        .get(service.url("/"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me");

    service.stop().await;
}

#[tokio::test]
async fn connection_closes_after_max_requests() {
    let doc = common::status_document(&[("A", true)]);
    let upstream = common::start_mock_upstream(Reply::Json(doc)).await;
    let mut config = common::test_config(&upstream.url(), None);
    config.http.keep_alive_max_requests = 2;
    let service = common::spawn_service(config).await;

    let mut stream = TcpStream::connect(service.addr).await.unwrap();

    let first = common::raw_get(&mut stream, "/A").await;
    assert_eq!(first.header("connection"), Some("keep-alive"));
    assert_eq!(first.header("keep-alive"), Some("timeout=5, max=2"));

    let last = common::raw_get(&mut stream, "/A").await;
    assert_eq!(last.status, 200);
    assert_eq!(last.header("connection"), Some("close"));
    assert!(common::is_closed(&mut stream).await);

    service.stop().await;
}

#[tokio::test]
async fn client_requested_close_is_honoured() {
    let (_upstream, service) = aliased_service().await;
    let mut stream = TcpStream::connect(service.addr).await.unwrap();

    stream
        .write_all(b"GET /alpha HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let res = common::read_response(&mut stream).await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.header("connection"), Some("close"));
    assert!(common::is_closed(&mut stream).await);

    service.stop().await;
}

#[tokio::test]
async fn head_and_other_methods() {
    let (_upstream, service) = aliased_service().await;
    let client = common::client();

    let head = client.head(service.url("/alpha")).send().await.unwrap();
    assert_eq!(head.status(), StatusCode::OK);
    assert!(head.bytes().await.unwrap().is_empty());

    for path in ["/", "/alpha"] {
        let post = client.post(service.url(path)).send().await.unwrap();
        assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(post.headers()["content-type"], "application/json; charset=utf-8");
        assert_eq!(post.headers()["allow"], "GET,HEAD");
        assert_eq!(post.text().await.unwrap(), r#"{"Error":"Method not allowed"}"#);
    }

    service.stop().await;
}

#[tokio::test]
async fn idle_connection_is_closed_after_keep_alive_timeout() {
    let doc = common::status_document(&[("A", true)]);
    let upstream = common::start_mock_upstream(Reply::Json(doc)).await;
    let mut config = common::test_config(&upstream.url(), None);
    config.http.keep_alive_timeout_secs = 1;
    let service = common::spawn_service(config).await;

    let mut stream = TcpStream::connect(service.addr).await.unwrap();
    let res = common::raw_get(&mut stream, "/A").await;
    assert_eq!(res.header("keep-alive"), Some("timeout=1, max=10"));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(common::is_closed(&mut stream).await);

    let report = service.stop().await;
    assert_eq!(report, alert_api::net::LoopReport { accepted: 1, closed: 1 });
}
