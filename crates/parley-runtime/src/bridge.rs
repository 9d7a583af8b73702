//! Message orchestration: admission, per-thread queueing, session resume.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parley_conduit::{Conduit, ConduitError, InvocationRequest};
use parley_core::ThreadId;
use parley_sessions::SessionCache;
use parley_settings::AgentSettings;
use tracing::{debug, error, info, warn};

use crate::admission::{AdmissionLimiter, AdmissionPermit};
use crate::errors::{BridgeError, Result};
use crate::serializer::ThreadSerializer;

/// Case-sensitive substrings that mark an invocation failure as caused by a
/// stale or unknown session token.
pub const RESUME_FAILURE_MARKERS: &[&str] = &["session", "resume"];

/// Reply text substituted when the agent returns an empty result.
const EMPTY_RESPONSE: &str = "(empty response)";

/// Whether a failure message points at a bad session token.
pub fn is_resume_failure(message: &str) -> bool {
    RESUME_FAILURE_MARKERS.iter().any(|m| message.contains(m))
}

/// Per-invocation parameters taken from configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationDefaults {
    /// `--max-turns`.
    pub max_turns: u32,
    /// `--allowedTools`.
    pub allowed_tools: String,
    /// `--append-system-prompt`, `None` when not configured.
    pub append_system_prompt: Option<String>,
    /// Child working directory.
    pub working_dir: PathBuf,
    /// Hard deadline per invocation.
    pub timeout: Duration,
}

impl InvocationDefaults {
    /// Resolve from agent settings.
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            max_turns: settings.max_turns,
            allowed_tools: settings.allowed_tools.clone(),
            append_system_prompt: Some(settings.system_prompt.clone()).filter(|p| !p.is_empty()),
            working_dir: settings.resolved_working_dir(),
            timeout: settings.timeout(),
        }
    }

    fn request(&self, prompt: String, resume_token: Option<String>) -> InvocationRequest {
        InvocationRequest {
            prompt,
            resume_token,
            max_turns: self.max_turns,
            allowed_tools: self.allowed_tools.clone(),
            append_system_prompt: self.append_system_prompt.clone(),
            working_dir: self.working_dir.clone(),
            timeout: self.timeout,
        }
    }
}

impl Default for InvocationDefaults {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

/// Successful round trip.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageReply {
    /// Agent reply, never empty.
    pub result: String,
    /// Thread the message belonged to.
    pub thread_id: ThreadId,
    /// Agent-reported duration.
    pub duration_ms: u64,
    /// Agent-reported cost, when available.
    pub cost_usd: Option<f64>,
}

/// Wires the session cache, serializer and limiter to a conduit.
pub struct Bridge {
    cache: Arc<SessionCache>,
    serializer: Arc<ThreadSerializer>,
    limiter: AdmissionLimiter,
    conduit: Arc<dyn Conduit>,
    defaults: InvocationDefaults,
}

impl Bridge {
    /// Assemble a bridge from its collaborators.
    pub fn new(
        cache: Arc<SessionCache>,
        serializer: Arc<ThreadSerializer>,
        limiter: AdmissionLimiter,
        conduit: Arc<dyn Conduit>,
        defaults: InvocationDefaults,
    ) -> Self {
        Self {
            cache,
            serializer,
            limiter,
            conduit,
            defaults,
        }
    }

    /// Take an admission slot or fail with [`BridgeError::AdmissionRejected`].
    pub fn admit(&self) -> Result<AdmissionPermit> {
        self.limiter.try_admit().ok_or_else(|| {
            debug!(max = self.limiter.max(), "admission rejected");
            BridgeError::AdmissionRejected {
                max: self.limiter.max(),
            }
        })
    }

    /// Admit and process one message.
    pub async fn handle_message(&self, thread: ThreadId, prompt: String) -> Result<MessageReply> {
        let permit = self.admit()?;
        self.handle_admitted(permit, thread, prompt).await
    }

    /// Process a message that already holds an admission slot.
    ///
    /// The slot is held across the queue wait and the invocation and
    /// released when this future completes or is dropped.
    pub async fn handle_admitted(
        &self,
        permit: AdmissionPermit,
        thread: ThreadId,
        prompt: String,
    ) -> Result<MessageReply> {
        let _permit = permit;
        let turn = self.serializer.run_exclusive(&thread, self.process(&thread, prompt));

        match AssertUnwindSafe(turn).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(thread_id = %thread, "invocation task panicked");
                Err(BridgeError::Aborted)
            }
        }
    }

    async fn process(&self, thread: &ThreadId, prompt: String) -> Result<MessageReply> {
        let resume_token = self.cache.get(thread)?;
        info!(
            thread_id = %thread,
            prompt_len = prompt.len(),
            resume = resume_token.is_some(),
            "invoking agent"
        );

        let request = self.defaults.request(prompt, resume_token);
        match self.conduit.invoke(request).await {
            Ok(result) => {
                if result.is_error {
                    warn!(thread_id = %thread, subtype = %result.subtype, "agent reported an error result");
                }
                match result.session_id.as_deref().filter(|s| !s.is_empty()) {
                    Some(token) => self.cache.set(thread, token)?,
                    None => warn!(thread_id = %thread, "agent result carried no session id"),
                }

                let reply = if result.result.is_empty() {
                    EMPTY_RESPONSE.to_string()
                } else {
                    result.result
                };
                info!(
                    thread_id = %thread,
                    duration_ms = result.duration_ms,
                    reply_len = reply.len(),
                    "agent replied"
                );
                Ok(MessageReply {
                    result: reply,
                    thread_id: thread.clone(),
                    duration_ms: result.duration_ms,
                    cost_usd: result.total_cost_usd,
                })
            }
            Err(err) => Err(self.classify_failure(thread, err)),
        }
    }

    fn classify_failure(&self, thread: &ThreadId, err: ConduitError) -> BridgeError {
        if !is_resume_failure(&err.to_string()) {
            return BridgeError::Invocation(err);
        }
        match self.cache.delete(thread) {
            Ok(true) => info!(thread_id = %thread, "cleared stale session"),
            Ok(false) => {}
            Err(e) => warn!(thread_id = %thread, error = %e, "failed to clear stale session"),
        }
        BridgeError::SessionResume(err)
    }

    /// Session cache handle.
    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    /// Admission limiter handle.
    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }

    /// Serializer handle.
    pub fn serializer(&self) -> &Arc<ThreadSerializer> {
        &self.serializer
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use parley_conduit::InvocationResult;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    type Scripted = std::result::Result<InvocationResult, ConduitError>;

    /// Conduit double: records every request and replays scripted outcomes.
    #[derive(Default)]
    struct MockConduit {
        requests: Mutex<Vec<InvocationRequest>>,
        outcomes: Mutex<VecDeque<Scripted>>,
        gate: Option<Arc<Notify>>,
    }

    impl MockConduit {
        fn with(outcomes: impl IntoIterator<Item = Scripted>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                ..Self::default()
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        fn resume_tokens(&self) -> Vec<Option<String>> {
            self.requests.lock().iter().map(|r| r.resume_token.clone()).collect()
        }
    }

    #[async_trait]
    impl Conduit for MockConduit {
        async fn invoke(&self, request: InvocationRequest) -> parley_conduit::Result<InvocationResult> {
            let prompt = request.prompt.clone();
            self.requests.lock().push(request);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let next = self.outcomes.lock().pop_front();
            next.unwrap_or_else(|| Ok(ok(&format!("echo: {prompt}"), "sess-default")))
        }
    }

    fn ok(result: &str, session: &str) -> InvocationResult {
        InvocationResult {
            kind: "result".into(),
            subtype: "success".into(),
            result: result.into(),
            session_id: Some(session.into()),
            duration_ms: 42,
            total_cost_usd: Some(0.01),
            ..InvocationResult::default()
        }
    }

    fn stale_session() -> ConduitError {
        ConduitError::ProcessFailed {
            code: Some(1),
            stderr: "No conversation found with session ID: abc".into(),
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        bridge: Bridge,
        conduit: Arc<MockConduit>,
    }

    fn harness(conduit: MockConduit, max: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cache =
            Arc::new(SessionCache::open(dir.path().join("sessions.json"), Duration::from_secs(3600)).unwrap());
        let conduit = Arc::new(conduit);
        let bridge = Bridge::new(
            cache,
            Arc::new(ThreadSerializer::new()),
            AdmissionLimiter::new(max),
            conduit.clone(),
            InvocationDefaults {
                working_dir: dir.path().to_path_buf(),
                ..InvocationDefaults::default()
            },
        );
        Harness {
            _dir: dir,
            bridge,
            conduit,
        }
    }

    fn t(id: &str) -> ThreadId {
        ThreadId::new(id)
    }

    // ── resume markers ──

    #[test]
    fn resume_markers_match_case_sensitively() {
        assert!(is_resume_failure("No conversation found with session ID"));
        assert!(is_resume_failure("cannot resume"));
        assert!(!is_resume_failure("Session expired"));
        assert!(!is_resume_failure("cannot RESUME"));
        assert!(!is_resume_failure("Claude CLI timed out after 100ms"));
    }

    #[test]
    fn defaults_from_settings() {
        let settings = AgentSettings {
            system_prompt: String::new(),
            working_dir: Some("/srv/work".into()),
            ..AgentSettings::default()
        };
        let defaults = InvocationDefaults::from_settings(&settings);
        assert_eq!(defaults.append_system_prompt, None);
        assert_eq!(defaults.working_dir, PathBuf::from("/srv/work"));
        assert_eq!(defaults.max_turns, 3);
        assert_eq!(defaults.timeout, Duration::from_millis(180_000));
    }

    // ── round trips ──

    #[tokio::test]
    async fn first_message_has_no_token_second_resumes() {
        let h = harness(
            MockConduit::with([Ok(ok("one", "sess-1")), Ok(ok("two", "sess-2"))]),
            3,
        );

        let reply = h.bridge.handle_message(t("T1"), "hi".into()).await.unwrap();
        assert_eq!(reply.result, "one");
        assert_eq!(reply.thread_id, t("T1"));
        assert_eq!(reply.duration_ms, 42);
        assert_eq!(reply.cost_usd, Some(0.01));

        let _ = h.bridge.handle_message(t("T1"), "again".into()).await.unwrap();
        assert_eq!(h.conduit.resume_tokens(), vec![None, Some("sess-1".to_string())]);
        assert_eq!(h.bridge.cache().get(&t("T1")).unwrap().as_deref(), Some("sess-2"));
    }

    #[tokio::test]
    async fn request_carries_configured_defaults() {
        let h = harness(MockConduit::default(), 3);
        let _ = h.bridge.handle_message(t("T1"), "hi".into()).await.unwrap();
        let requests = h.conduit.requests.lock();
        assert_eq!(requests[0].prompt, "hi");
        assert_eq!(requests[0].max_turns, 3);
        assert_eq!(requests[0].allowed_tools, "Read,Grep,Glob,Bash,WebSearch");
    }

    #[tokio::test]
    async fn empty_result_is_substituted() {
        let h = harness(MockConduit::with([Ok(ok("", "s"))]), 3);
        let reply = h.bridge.handle_message(t("T1"), "hi".into()).await.unwrap();
        assert_eq!(reply.result, "(empty response)");
    }

    #[tokio::test]
    async fn missing_session_id_leaves_cache_untouched() {
        let mut result = ok("hi", "unused");
        result.session_id = None;
        let h = harness(MockConduit::with([Ok(result)]), 3);
        let _ = h.bridge.handle_message(t("T1"), "hi".into()).await.unwrap();
        assert!(h.bridge.cache().is_empty());
    }

    // ── failures ──

    #[tokio::test]
    async fn session_failure_evicts_and_next_call_sends_no_token() {
        let h = harness(
            MockConduit::with([
                Ok(ok("one", "sess-1")),
                Err(stale_session()),
                Ok(ok("three", "sess-3")),
            ]),
            3,
        );

        let _ = h.bridge.handle_message(t("T1"), "a".into()).await.unwrap();
        let err = h.bridge.handle_message(t("T1"), "b".into()).await.unwrap_err();
        assert_matches!(err, BridgeError::SessionResume(ConduitError::ProcessFailed { .. }));
        assert!(h.bridge.cache().entry(&t("T1")).is_none());

        let _ = h.bridge.handle_message(t("T1"), "c".into()).await.unwrap();
        assert_eq!(
            h.conduit.resume_tokens(),
            vec![None, Some("sess-1".to_string()), None]
        );
    }

    #[tokio::test]
    async fn other_failures_keep_the_session() {
        let h = harness(
            MockConduit::with([
                Ok(ok("one", "sess-1")),
                Err(ConduitError::Timeout(Duration::from_millis(10))),
            ]),
            3,
        );

        let _ = h.bridge.handle_message(t("T1"), "a".into()).await.unwrap();
        let err = h.bridge.handle_message(t("T1"), "b".into()).await.unwrap_err();
        assert_matches!(err, BridgeError::Invocation(ConduitError::Timeout(_)));
        assert_eq!(h.bridge.cache().get(&t("T1")).unwrap().as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn capitalized_marker_keeps_the_session() {
        let h = harness(
            MockConduit::with([
                Ok(ok("one", "sess-1")),
                Err(ConduitError::MalformedOutput {
                    excerpt: "Session limit reached".into(),
                }),
            ]),
            3,
        );

        let _ = h.bridge.handle_message(t("T1"), "a".into()).await.unwrap();
        let err = h.bridge.handle_message(t("T1"), "b".into()).await.unwrap_err();
        assert_matches!(err, BridgeError::Invocation(ConduitError::MalformedOutput { .. }));
        assert_eq!(h.bridge.cache().get(&t("T1")).unwrap().as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn failure_releases_permit() {
        let h = harness(MockConduit::with([Err(stale_session())]), 1);
        let _ = h.bridge.handle_message(t("T1"), "a".into()).await.unwrap_err();
        assert_eq!(h.bridge.limiter().active(), 0);
        assert_eq!(h.bridge.serializer().tracked_threads(), 0);
    }

    // ── concurrency ──

    #[tokio::test]
    async fn cap_three_four_threads_one_rejection() {
        let gate = Arc::new(Notify::new());
        let h = harness(MockConduit::gated(gate.clone()), 3);

        let calls = ["A", "B", "C", "D"].map(|id| h.bridge.handle_message(t(id), "p".into()));
        let [a, b, c, d] = calls;
        tokio::pin!(a, b, c, d);

        // Drive every call until it either parks on the gate or is rejected.
        let mut outcomes = Vec::new();
        for fut in [&mut a, &mut b, &mut c, &mut d] {
            if let Ok(res) = tokio::time::timeout(Duration::from_millis(20), fut.as_mut()).await {
                outcomes.push(res);
            }
        }
        assert_eq!(outcomes.len(), 1);
        assert_matches!(outcomes[0], Err(BridgeError::AdmissionRejected { max: 3 }));
        assert_eq!(h.bridge.limiter().active(), 3);
        assert_eq!(h.conduit.requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn rejection_touches_neither_cache_nor_queue() {
        let h = harness(MockConduit::default(), 1);
        let held = h.bridge.admit().unwrap();

        let err = h.bridge.handle_message(t("T9"), "p".into()).await.unwrap_err();
        assert_matches!(err, BridgeError::AdmissionRejected { max: 1 });
        assert_eq!(h.bridge.serializer().tracked_threads(), 0);
        assert!(h.bridge.cache().is_empty());
        assert!(h.conduit.requests.lock().is_empty());
        drop(held);
    }

    #[tokio::test]
    async fn same_thread_second_call_observes_first_token() {
        let gate = Arc::new(Notify::new());
        let h = harness(MockConduit::gated(gate.clone()), 3);

        let first = h.bridge.handle_message(t("T1"), "one".into());
        let second = h.bridge.handle_message(t("T1"), "two".into());
        tokio::pin!(first, second);

        // Only the first call reaches the conduit while it is parked.
        assert!(tokio::time::timeout(Duration::from_millis(20), first.as_mut()).await.is_err());
        assert!(tokio::time::timeout(Duration::from_millis(20), second.as_mut()).await.is_err());
        assert_eq!(h.conduit.requests.lock().len(), 1);

        gate.notify_one();
        let _ = first.await.unwrap();
        let join = tokio::spawn({
            let gate = gate.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                gate.notify_one();
            }
        });
        let _ = second.await.unwrap();
        join.await.unwrap();

        assert_eq!(
            h.conduit.resume_tokens(),
            vec![None, Some("sess-default".to_string())]
        );
    }
}
