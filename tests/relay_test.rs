//! Integration tests for the upload/download relay routes.

mod common;

use std::time::{Duration, Instant};

use bytes::Bytes;
use common::{test_config, TestHarness};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};

type Frames = mpsc::UnboundedSender<Result<Bytes, std::io::Error>>;

/// Open a streaming PUT whose body frames are fed through the returned sender.
fn streaming_upload(
    client: &reqwest::Client,
    url: String,
) -> (Frames, tokio::task::JoinHandle<reqwest::Response>) {
    let (tx, rx) = mpsc::unbounded();
    let request = client.put(url).body(reqwest::Body::wrap_stream(rx));
    let handle = tokio::spawn(async move { request.send().await.unwrap() });
    (tx, handle)
}

async fn wait_for_chunks(h: &TestHarness, filename: &str, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(slice) = h.ctx.store.read(filename, 0) {
                if slice.chunks.len() >= count {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("upload frames never reached the store");
}

#[tokio::test]
async fn upload_then_download_segment() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("http://{addr}/init-0.m4s"))
        .body(vec![7u8; 4096])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(h.ctx.store.is_done("init-0.m4s"));

    let resp = client
        .get(format!("http://{addr}/init-0.m4s"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "video/mp4"
    );
    assert_eq!(
        resp.headers().get("cache-control").unwrap().to_str().unwrap(),
        "max-age=31536000"
    );
    assert!(resp.headers().get("content-length").is_none());
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.as_ref(), vec![7u8; 4096].as_slice());
}

#[tokio::test]
async fn download_started_before_upload_receives_fragments_in_order() {
    let (_h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let url = format!("http://{addr}/chunk001.m4s");
    let download = {
        let client = client.clone();
        let url = url.clone();
        tokio::spawn(async move {
            let resp = client.get(url).send().await.unwrap();
            assert_eq!(resp.status(), 200);
            let mut arrivals = Vec::new();
            let mut body = Vec::new();
            let mut stream = Box::pin(resp.bytes_stream());
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.unwrap();
                arrivals.push(Instant::now());
                body.extend_from_slice(&chunk);
            }
            (arrivals, body)
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (mut tx, upload) = streaming_upload(&client, url);
    let mut expected = Vec::new();
    for (size, byte) in [(10usize, 1u8), (20, 2), (30, 3)] {
        let frame = vec![byte; size];
        expected.extend_from_slice(&frame);
        tx.send(Ok(Bytes::from(frame))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    drop(tx);
    let resp = upload.await.unwrap();
    assert_eq!(resp.status(), 200);
    let upload_done = Instant::now();

    let (arrivals, body) = download.await.unwrap();
    assert_eq!(body.len(), 60);
    assert_eq!(body, expected);
    // Data was relayed while the upload was still in progress.
    assert!(arrivals[0] < upload_done);
}

#[tokio::test]
async fn playlist_reupload_replaces_content() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/manifest.mpd");

    let first = "<MPD>first version with a longer body</MPD>";
    let second = "<MPD>second</MPD>";

    for content in [first, second] {
        let resp = client.put(&url).body(content).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }
    assert_eq!(h.ctx.store.read("manifest.mpd", 0).unwrap().concat(), second);

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "application/dash+xml"
    );
    assert!(resp.headers().get("cache-control").is_none());
    assert_eq!(resp.text().await.unwrap(), second);
}

#[tokio::test]
async fn reupload_of_cached_segment_appends() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/seg.m4s");

    client.put(&url).body("abc").send().await.unwrap();
    client.put(&url).body("def").send().await.unwrap();

    assert_eq!(h.ctx.store.read("seg.m4s", 0).unwrap().concat(), "abcdef");
}

#[tokio::test]
async fn generic_file_has_no_media_headers() {
    let (_h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/notes.txt");

    client.put(&url).body("hello").send().await.unwrap();
    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("cache-control").is_none());
    assert_eq!(resp.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn download_of_missing_file_times_out() {
    let (_h, addr) = TestHarness::with_server().await;

    let started = Instant::now();
    let resp = reqwest::get(format!("http://{addr}/never.m4s")).await.unwrap();
    assert_eq!(resp.status(), 504);
    assert!(started.elapsed() >= Duration::from_secs(1));

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "timeout");
}

#[tokio::test]
async fn download_of_stalled_upload_times_out() {
    let (_h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/chunk-stalled.m4s");

    let (mut tx, _upload) = streaming_upload(&client, url.clone());
    tx.send(Ok(Bytes::from_static(b"partial"))).await.unwrap();

    // Headers are committed once the first bytes arrive; the body then
    // aborts when the producer stalls past the idle ceiling.
    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.bytes().await.is_err());
    drop(tx);
}

#[tokio::test]
async fn append_after_eviction_is_rejected() {
    let (h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let (mut tx, upload) = streaming_upload(&client, format!("http://{addr}/chunk-late.m4s"));
    tx.send(Ok(Bytes::from_static(b"first"))).await.unwrap();
    wait_for_chunks(&h, "chunk-late.m4s", 1).await;

    assert!(h.ctx.store.evict("chunk-late.m4s"));
    tx.send(Ok(Bytes::from_static(b"second"))).await.unwrap();
    drop(tx);

    let resp = upload.await.unwrap();
    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "not_found");
    assert!(!h.ctx.store.is_cached("chunk-late.m4s"));
}

#[tokio::test]
async fn held_playlist_upload_keeps_response_open() {
    let mut config = test_config();
    config.server.hold_playlist_uploads = true;
    let (h, addr) = TestHarness::with_server_config(config).await;

    let resp = reqwest::Client::new()
        .put(format!("http://{addr}/live.mpd"))
        .body("<MPD/>")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(h.ctx.store.is_done("live.mpd"));

    let mut body = Box::pin(resp.bytes_stream());
    let pending = tokio::time::timeout(Duration::from_millis(200), body.next()).await;
    assert!(pending.is_err(), "held upload response should stay open");

    h.ctx.shutdown.cancel();
    let ended = tokio::time::timeout(Duration::from_secs(2), body.next())
        .await
        .expect("response should end on shutdown");
    assert!(ended.is_none());
}

#[tokio::test]
async fn many_consumers_read_same_entry() {
    let (_h, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/chunk-shared.m4s");

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move {
                let resp = client.get(url).send().await.unwrap();
                resp.bytes().await.unwrap()
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(30)).await;
    let (mut tx, upload) = streaming_upload(&client, url);
    for i in 0u8..5 {
        tx.send(Ok(Bytes::from(vec![i; 100]))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    drop(tx);
    assert_eq!(upload.await.unwrap().status(), 200);

    let expected: Vec<u8> = (0u8..5).flat_map(|i| vec![i; 100]).collect();
    for consumer in consumers {
        assert_eq!(consumer.await.unwrap().as_ref(), expected.as_slice());
    }
}
