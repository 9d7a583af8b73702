//! End-to-end tests against a real listener.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_conduit::{Conduit, InvocationRequest, InvocationResult};
use parley_runtime::{AdmissionLimiter, Bridge, InvocationDefaults, ThreadSerializer};
use parley_server::{ParleyServer, ServerConfig};
use parley_sessions::SessionCache;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

const KEY: &str = "integration-key";

/// Hands out a fresh session id per call. Calls block until the test
/// releases a permit on `gate`.
struct CountingConduit {
    gate: Arc<Semaphore>,
    seen: Mutex<Vec<InvocationRequest>>,
}

#[async_trait]
impl Conduit for CountingConduit {
    async fn invoke(&self, request: InvocationRequest) -> parley_conduit::Result<InvocationResult> {
        let n = {
            let mut seen = self.seen.lock();
            seen.push(request.clone());
            seen.len()
        };
        let permit = self.gate.acquire().await;
        drop(permit);
        Ok(InvocationResult {
            result: format!("reply {n} to {}", request.prompt),
            session_id: Some(format!("sess-{n}")),
            duration_ms: 5,
            ..InvocationResult::default()
        })
    }
}

struct Running {
    _dir: tempfile::TempDir,
    base: String,
    server: ParleyServer,
    handle: tokio::task::JoinHandle<()>,
    conduit: Arc<CountingConduit>,
    gate: Arc<Semaphore>,
}

async fn start(max_concurrent: usize, open_gate: bool) -> Running {
    let dir = tempfile::tempdir().unwrap();
    let cache = SessionCache::open(dir.path().join("sessions.json"), Duration::from_secs(3600)).unwrap();
    let gate = Arc::new(Semaphore::new(if open_gate { Semaphore::MAX_PERMITS } else { 0 }));
    let conduit = Arc::new(CountingConduit {
        gate: gate.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let bridge = Bridge::new(
        Arc::new(cache),
        Arc::new(ThreadSerializer::new()),
        AdmissionLimiter::new(max_concurrent),
        conduit.clone(),
        InvocationDefaults {
            working_dir: dir.path().to_path_buf(),
            ..InvocationDefaults::default()
        },
    );
    let server = ParleyServer::new(
        ServerConfig {
            api_key: KEY.into(),
            ..ServerConfig::default()
        },
        Arc::new(bridge),
    );
    let (addr, handle) = server.listen().await.unwrap();
    Running {
        _dir: dir,
        base: format!("http://{addr}"),
        server,
        handle,
        conduit,
        gate,
    }
}

async fn post(client: &reqwest::Client, base: &str, body: Value) -> (u16, Value) {
    let resp = client
        .post(format!("{base}/message"))
        .bearer_auth(KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn second_message_resumes_first_session() {
    let rt = start(3, true).await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, &rt.base, json!({"prompt": "one", "threadId": "T1"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"], "reply 1 to one");

    let (status, _) = post(&client, &rt.base, json!({"prompt": "two", "threadId": "T1"})).await;
    assert_eq!(status, 200);

    let seen = rt.conduit.seen.lock();
    assert_eq!(seen[0].resume_token, None);
    assert_eq!(seen[1].resume_token.as_deref(), Some("sess-1"));
}

#[tokio::test]
async fn health_over_http() {
    let rt = start(3, true).await;
    let body: Value = reqwest::get(format!("{}/health", rt.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["maxConcurrent"], 3);
}

#[tokio::test]
async fn fourth_concurrent_request_is_rejected() {
    let rt = start(3, false).await;
    let client = reqwest::Client::new();

    let in_flight: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|thread| {
            let client = client.clone();
            let base = rt.base.clone();
            tokio::spawn(async move { post(&client, &base, json!({"prompt": "p", "threadId": thread})).await })
        })
        .collect();

    // Wait until all three hold a slot.
    while rt.server.bridge().limiter().active() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, body) = post(&client, &rt.base, json!({"prompt": "p", "threadId": "D"})).await;
    assert_eq!(status, 429);
    assert_eq!(body["error"], "Too many requests (max 3 concurrent)");

    rt.gate.add_permits(3);
    for handle in in_flight {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, 200);
    }
    assert_eq!(rt.server.bridge().limiter().active(), 0);
}

#[tokio::test]
async fn same_thread_requests_run_one_at_a_time() {
    let rt = start(3, false).await;
    let client = reqwest::Client::new();

    let spawn = |prompt: &'static str| {
        let client = client.clone();
        let base = rt.base.clone();
        tokio::spawn(async move { post(&client, &base, json!({"prompt": prompt, "threadId": "T"})).await })
    };
    let first = spawn("first");
    while rt.conduit.seen.lock().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let second = spawn("second");
    while rt.server.bridge().limiter().active() < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The second request is admitted but queued behind the first.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rt.conduit.seen.lock().len(), 1);

    rt.gate.add_permits(2);
    assert_eq!(first.await.unwrap().0, 200);
    assert_eq!(second.await.unwrap().0, 200);

    let seen = rt.conduit.seen.lock();
    assert_eq!(seen[1].prompt, "second");
    assert_eq!(seen[1].resume_token.as_deref(), Some("sess-1"));
}

#[tokio::test]
async fn shutdown_drains_in_flight_request() {
    let rt = start(3, false).await;
    let client = reqwest::Client::new();

    let pending = {
        let client = client.clone();
        let base = rt.base.clone();
        tokio::spawn(async move { post(&client, &base, json!({"prompt": "late"})).await })
    };
    while rt.conduit.seen.lock().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let coordinator = rt.server.shutdown().clone();
    let server_task = rt.handle;
    let drained = tokio::spawn(async move {
        coordinator
            .graceful_shutdown(vec![server_task], Duration::from_secs(5))
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    rt.gate.add_permits(1);

    let (status, body) = pending.await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["result"], "reply 1 to late");
    assert!(drained.await.unwrap());
}
