use std::hint::black_box;

use axum::http::Method;
use criterion::{Criterion, criterion_group, criterion_main};
use mainflux::test_utils::{TestGateway, create_test_request, create_test_request_with_content};
use mainflux::senml::content_type;
use tower::ServiceExt;

fn router_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let (gw, channel) = rt.block_on(async {
        let gw = TestGateway::start().await;
        let channel = gw.create_channel("bench").await;
        (gw, channel)
    });

    c.bench_function("api_status", |b| {
        b.iter(|| {
            let request = create_test_request(Method::GET, "/status");
            rt.block_on(gw.router.clone().oneshot(black_box(request)))
        })
    });

    c.bench_function("api_get_channel", |b| {
        let path = format!("/channels/{}", channel);
        b.iter(|| {
            let request = create_test_request(Method::GET, &path).with_query("vlimit", "10");
            rt.block_on(gw.router.clone().oneshot(black_box(request)))
        })
    });

    c.bench_function("api_send_message", |b| {
        let path = format!("/channels/{}/msg", channel);
        let body = br#"[{"bn":"bench/","bt":1700000000,"n":"temp","v":21.5},{"n":"hum","v":40}]"#;
        b.iter(|| {
            let request = create_test_request_with_content(&path, body.to_vec(), content_type::SENML_JSON);
            rt.block_on(gw.router.clone().oneshot(black_box(request)))
        })
    });
}

criterion_group!(benches, router_benchmark);
criterion_main!(benches);
