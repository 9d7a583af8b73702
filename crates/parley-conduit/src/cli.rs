//! `claude` CLI subprocess conduit.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use parley_core::text::diagnostic_excerpt;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::errors::{ConduitError, Result};
use crate::traits::Conduit;
use crate::types::{InvocationRequest, InvocationResult};

/// Build the argument list for one invocation.
pub fn build_args(request: &InvocationRequest) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        request.prompt.clone(),
        "--output-format".to_string(),
        "json".to_string(),
        "--max-turns".to_string(),
        request.max_turns.to_string(),
    ];

    if let Some(token) = request.resume_token.as_deref().filter(|t| !t.is_empty()) {
        args.push("--resume".to_string());
        args.push(token.to_string());
    }
    if !request.allowed_tools.is_empty() {
        args.push("--allowedTools".to_string());
        args.push(request.allowed_tools.clone());
    }
    if let Some(prompt) = request
        .append_system_prompt
        .as_deref()
        .filter(|p| !p.is_empty())
    {
        args.push("--append-system-prompt".to_string());
        args.push(prompt.to_string());
    }
    args
}

/// Runs the agent CLI as a child process, one process per invocation.
#[derive(Clone, Debug)]
pub struct ClaudeCli {
    program: OsString,
    leading_args: Vec<OsString>,
}

impl ClaudeCli {
    /// Use `program` (looked up on `PATH` when not a path).
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the generated ones, e.g. a script path when
    /// `program` is an interpreter.
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ClaudeCli {
    fn default() -> Self {
        Self::new("claude")
    }
}

#[async_trait]
impl Conduit for ClaudeCli {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResult> {
        let start = Instant::now();

        let mut cmd = tokio::process::Command::new(&self.program);
        let _ = cmd
            .args(&self.leading_args)
            .args(build_args(&request))
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            resume = request.resume_token.is_some(),
            prompt_len = request.prompt.len(),
            working_dir = %request.working_dir.display(),
            "spawning agent"
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| ConduitError::Spawn(e.to_string()))?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let mut stdout_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let mut stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        // One deadline covers the exit and the pipe drain: a descendant that
        // keeps stdout open must not stretch the invocation.
        let outcome = tokio::time::timeout(request.timeout, async {
            let status = child
                .wait()
                .await
                .map_err(|e| ConduitError::Spawn(format!("wait failed: {e}")))?;
            let stdout = (&mut stdout_handle).await.unwrap_or_default();
            let stderr = (&mut stderr_handle).await.unwrap_or_default();
            Ok::<_, ConduitError>((status, stdout, stderr))
        })
        .await;

        let (status, stdout_bytes, stderr_bytes) = match outcome {
            Ok(run) => run?,
            Err(_) => {
                let _ = child.kill().await;
                stdout_handle.abort();
                stderr_handle.abort();
                warn!(timeout = ?request.timeout, "agent timed out");
                return Err(ConduitError::Timeout(request.timeout));
            }
        };

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            debug!(code = ?status.code(), elapsed_ms, "agent exited with failure");
            return Err(ConduitError::ProcessFailed {
                code: status.code(),
                stderr: diagnostic_excerpt(stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&stdout_bytes);
        let result: InvocationResult =
            serde_json::from_str(stdout.trim()).map_err(|_| ConduitError::MalformedOutput {
                excerpt: diagnostic_excerpt(&stdout),
            })?;

        debug!(
            elapsed_ms,
            agent_duration_ms = result.duration_ms,
            is_error = result.is_error,
            "agent completed"
        );
        Ok(result)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
