//! SenML ingestion end to end: HTTP submit, bus relay, persistence and
//! the time-range query.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use futures::StreamExt;
use mainflux::models::{Message, Protocol};
use mainflux::senml::{SenMLPack, content_type};
use mainflux::store::{Collection, StoreExt};
use mainflux::test_utils::{
    TEST_SUBJECT, TestGateway, create_test_request, create_test_request_with_content,
};
use mainflux::transport::{Bus, LocalBus, spawn_bus_bridge};
use mainflux::{Envelope, IngestOutcome, IngestRouter};
use serde_json::{Value, json};

fn msg_path(channel: &str) -> String {
    format!("/channels/{}/msg", channel)
}

async fn post_senml(gw: &TestGateway, channel: &str, body: &str) -> StatusCode {
    gw.call(create_test_request_with_content(
        &msg_path(channel),
        body.as_bytes().to_vec(),
        content_type::SENML_JSON,
    ))
    .await
    .status
}

#[tokio::test]
async fn test_legacy_pack_end_to_end() {
    let gw = TestGateway::start().await;
    let channel = gw.create_channel("room").await;

    let response = gw
        .call(
            create_test_request_with_content(
                &msg_path(&channel),
                br#"{"bn":"room1/","bt":1000,"e":[{"n":"temp","v":21.5,"t":5}]}"#.to_vec(),
                content_type::SENML_JSON,
            )
            .with_header("Client-ID", "sensor-7"),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body, json!({ "response": "message sent" }));

    let stored = gw.wait_for_entries(&channel, 1).await;
    assert_eq!(stored.entries.len(), 1);

    let entry = &stored.entries[0];
    assert_eq!(entry.name, "room1/temp");
    assert_eq!(entry.time, 1005.0);
    assert_eq!(entry.value, Some(21.5));
    assert_eq!(entry.channel, channel);
    assert_eq!(entry.publisher, "sensor-7");
    assert_eq!(entry.protocol, Protocol::Http);
}

#[tokio::test]
async fn test_http_message_is_persisted_exactly_once() {
    let gw = TestGateway::start().await;
    let channel = gw.create_channel("once").await;
    let mut tap = gw.bus.subscribe(TEST_SUBJECT).await.unwrap();

    let status = post_senml(&gw, &channel, r#"[{"bn":"a/","n":"x","v":1,"t":10},{"n":"y","v":2}]"#).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    gw.wait_for_entries(&channel, 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stored = gw.wait_for_entries(&channel, 2).await;
    assert_eq!(stored.entries.len(), 2);
    assert_eq!(gw.store.count(Collection::Messages).await, 2);

    // One relayed envelope on the bus and nothing after it
    let first = tap.next().await.unwrap();
    assert!(Envelope::from_bytes(&first.payload).unwrap().relayed);
    let next = tokio::time::timeout(Duration::from_millis(100), tap.next()).await;
    assert!(next.is_err(), "persisting must not publish again");
}

#[tokio::test]
async fn test_bus_origin_message_is_relayed_then_persisted() {
    let gw = TestGateway::start().await;
    let channel = gw.create_channel("nats").await;

    let raw = Envelope::new(&channel, "svc", Protocol::Nats, br#"[{"n":"rpm","v":900,"t":1}]"#.to_vec());
    gw.bus
        .publish(TEST_SUBJECT, raw.to_bytes().unwrap())
        .await
        .unwrap();

    let stored = gw.wait_for_entries(&channel, 1).await;
    assert_eq!(stored.entries[0].protocol, Protocol::Nats);
    assert_eq!(stored.entries[0].publisher, "svc");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gw.wait_for_entries(&channel, 1).await.entries.len(), 1);
}

#[tokio::test]
async fn test_loop_prevention_over_local_bus() {
    let gw = TestGateway::without_bridge();
    let channel = gw.create_channel("loop").await;

    let bus = LocalBus::new(16);
    let router = IngestRouter::new(gw.store.clone(), bus.clone(), "loop/out");
    spawn_bus_bridge(&bus, "loop/out", router.clone()).await.unwrap();

    let outcome = router
        .ingest(Envelope::new(&channel, "", Protocol::Http, br#"[{"n":"v","v":1,"t":1}]"#.to_vec()))
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Relayed(1));

    gw.wait_for_entries(&channel, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gw.wait_for_entries(&channel, 1).await.entries.len(), 1);
}

#[tokio::test]
async fn test_cbor_submission() {
    let gw = TestGateway::start().await;
    let channel = gw.create_channel("cbor").await;

    let pack = SenMLPack::from_json(r#"[{"bn":"dev/","bt":50,"bu":"Cel","n":"t","v":3.5}]"#).unwrap();
    let response = gw
        .call(create_test_request_with_content(
            &msg_path(&channel),
            pack.to_cbor().unwrap(),
            content_type::SENML_CBOR,
        ))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let stored = gw.wait_for_entries(&channel, 1).await;
    assert_eq!(stored.entries[0].name, "dev/t");
    assert_eq!(stored.entries[0].unit.as_deref(), Some("Cel"));
    assert_eq!(stored.entries[0].time, 50.0);
}

#[tokio::test]
async fn test_submit_errors() {
    let gw = TestGateway::start().await;
    let channel = gw.create_channel("errors").await;

    assert_eq!(post_senml(&gw, "missing", r#"[{"n":"x","v":1}]"#).await, StatusCode::NOT_FOUND);
    assert_eq!(post_senml(&gw, &channel, "{broken").await, StatusCode::BAD_REQUEST);
    assert_eq!(post_senml(&gw, &channel, r#"{"no":"records"}"#).await, StatusCode::BAD_REQUEST);

    // Base records only: accepted, nothing stored
    assert_eq!(post_senml(&gw, &channel, r#"[{"bn":"x/"}]"#).await, StatusCode::ACCEPTED);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let doc: mainflux::models::Channel = gw.store.get(Collection::Channels, &channel).await.unwrap().unwrap();
    assert!(doc.entries.is_empty());
}

#[tokio::test]
async fn test_message_time_range_query() {
    let gw = TestGateway::start().await;
    let channel = gw.create_channel("range").await;

    let status = post_senml(
        &gw,
        &channel,
        r#"[{"bn":"s/","bt":1000,"n":"a","v":1,"t":30},{"n":"b","v":2,"t":10},{"n":"c","v":3,"t":20}]"#,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    gw.wait_for_entries(&channel, 3).await;

    let response = gw
        .call(create_test_request(Method::GET, &msg_path(&channel)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let all: Vec<Message> = serde_json::from_value(response.body).unwrap();
    let times: Vec<f64> = all.iter().map(|m| m.time).collect();
    assert_eq!(times, [1010.0, 1020.0, 1030.0]);

    let response = gw
        .call(
            create_test_request(Method::GET, &msg_path(&channel))
                .with_query("start_time", "1010")
                .with_query("end_time", "1020"),
        )
        .await;
    let some: Vec<Message> = serde_json::from_value(response.body).unwrap();
    let names: Vec<&str> = some.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["s/b", "s/c"]);

    let response = gw
        .call(create_test_request(Method::GET, &msg_path(&channel)).with_query("end_time", "soon"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = gw
        .call(create_test_request(Method::GET, &msg_path("missing")))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["response"], Value::from("channel missing not found"));
}
