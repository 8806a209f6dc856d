//! Exercises `RedisTokenBucketStore::try_consume_bands` against a real Redis,
//! running the actual Lua script rather than a Rust-side reimplementation.
//! Requires Docker. Run with: `cargo test --test redis_store`

use fluxgate::model::Band;
use fluxgate::store::{BandSpec, TokenBucketStore};

use std::time::Duration;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

async fn start_redis() -> (fluxgate::store::RedisTokenBucketStore, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379_u16.tcp())
        .start()
        .await
        .expect("failed to start redis container");

    let host = container.get_host().await.expect("get host");
    let port = container.get_host_port_ipv4(6379).await.expect("get port");
    let url = format!("redis://{}:{}", host, port);

    let mut store = None;
    for _ in 0..30 {
        match fluxgate::store::RedisTokenBucketStore::connect(&url).await {
            Ok(s) => {
                store = Some(s);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }

    (store.expect("redis never became ready"), container)
}

fn band(window: Duration, capacity: u64) -> Band {
    Band::new(window, capacity, None).unwrap()
}

fn spec<'a>(bucket_key: &str, band: &'a Band) -> BandSpec<'a> {
    BandSpec {
        bucket_key: bucket_key.to_string(),
        band,
    }
}

#[tokio::test]
async fn hundred_allowed_one_rejected() {
    let (store, _container) = start_redis().await;
    let b = band(Duration::from_secs(60), 100);

    let mut rejections = 0;
    for _ in 0..101 {
        let state = store
            .try_consume_bands(&[spec("fluxgate:rs:r:global:default", &b)], 1)
            .await
            .unwrap();
        if !state[0].consumed {
            rejections += 1;
        }
    }

    assert_eq!(rejections, 1, "the 101st request in a 100-capacity band should be the only rejection");
}

#[tokio::test]
async fn per_ip_isolation_keeps_separate_buckets() {
    let (store, _container) = start_redis().await;
    let b = band(Duration::from_secs(60), 1);

    let first_a = store
        .try_consume_bands(&[spec("fluxgate:rs:r:203.0.113.1:default", &b)], 1)
        .await
        .unwrap();
    assert!(first_a[0].consumed);

    let second_a = store
        .try_consume_bands(&[spec("fluxgate:rs:r:203.0.113.1:default", &b)], 1)
        .await
        .unwrap();
    assert!(!second_a[0].consumed, "same IP's second request should exhaust its own bucket");

    let first_b = store
        .try_consume_bands(&[spec("fluxgate:rs:r:203.0.113.2:default", &b)], 1)
        .await
        .unwrap();
    assert!(first_b[0].consumed, "a different IP's bucket is unaffected by the first IP's usage");
}

#[tokio::test]
async fn multi_band_tightest_band_wins_and_rejection_touches_no_key() {
    let (store, _container) = start_redis().await;
    let burst = band(Duration::from_secs(1), 2);
    let sustained = band(Duration::from_secs(60), 1000);

    let specs = vec![
        spec("fluxgate:rs:r:ip:burst", &burst),
        spec("fluxgate:rs:r:ip:sustained", &sustained),
    ];

    let first = store.try_consume_bands(&specs, 1).await.unwrap();
    assert!(first[0].consumed && first[1].consumed);

    let second = store.try_consume_bands(&specs, 1).await.unwrap();
    assert!(second[0].consumed && second[1].consumed);

    // Burst band (capacity 2) is now exhausted; sustained (capacity 1000) is not.
    let third = store.try_consume_bands(&specs, 1).await.unwrap();
    assert!(!third[0].consumed, "burst band should reject the third request");
    assert_eq!(
        third[1].remaining_tokens, 998,
        "sustained band must not be debited when the burst band rejects"
    );
}

#[tokio::test]
async fn composite_key_produces_an_independent_bucket() {
    let (store, _container) = start_redis().await;
    let b = band(Duration::from_secs(60), 1);

    let composite = store
        .try_consume_bands(&[spec("fluxgate:rs:r:192.168.1.100:user-A:default", &b)], 1)
        .await
        .unwrap();
    assert!(composite[0].consumed);

    let plain_ip = store
        .try_consume_bands(&[spec("fluxgate:rs:r:192.168.1.100:default", &b)], 1)
        .await
        .unwrap();
    assert!(plain_ip[0].consumed, "a composite-scoped key is a distinct bucket from a plain IP-scoped key");
}

#[tokio::test]
async fn n_plus_one_concurrent_racing_requests_allow_exactly_capacity() {
    let (store, _container) = start_redis().await;
    let store = std::sync::Arc::new(store);
    let b = std::sync::Arc::new(band(Duration::from_secs(60), 10));

    let mut handles = Vec::new();
    for _ in 0..11 {
        let store = store.clone();
        let b = b.clone();
        handles.push(tokio::spawn(async move {
            let state = store
                .try_consume_bands(&[spec("fluxgate:rs:r:global:default", &b)], 1)
                .await
                .unwrap();
            state[0].consumed
        }));
    }

    let mut allowed = 0;
    for h in handles {
        if h.await.unwrap() {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 10, "exactly capacity requests should be admitted out of 11 racing ones");
}
