//! Canned HTTP server for API runner tests, plus helpers for checking that
//! tool subprocesses are cleaned up.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SeenRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serves `replies` in order, repeating the last one once exhausted.
pub(crate) struct MockServer {
    base: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockServer {
    pub fn start(replies: Vec<Reply>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind mock server");
        let addr = server
            .server_addr()
            .to_ip()
            .expect("mock server has an ip address");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorder = Arc::clone(&seen);
        thread::spawn(move || {
            let mut served = 0usize;
            for request in server.incoming_requests() {
                let reply = replies
                    .get(served)
                    .or_else(|| replies.last())
                    .cloned()
                    .unwrap_or_else(|| Reply::status(404));
                served += 1;

                recorder.lock().expect("recorder lock").push(SeenRequest {
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.to_string()))
                        .collect(),
                });

                if !reply.delay.is_zero() {
                    thread::sleep(reply.delay);
                }
                let response =
                    tiny_http::Response::from_string(reply.body).with_status_code(reply.status);
                let _ = request.respond(response);
            }
        });

        Self {
            base: format!("http://{}", addr),
            seen,
        }
    }

    /// URL template on this server; `path` may contain `{domain}`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("recorder lock").clone()
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().expect("recorder lock").len()
    }
}

/// Forks a long `sleep` into the background, records its pid in `$1` and
/// waits for it.
#[cfg(unix)]
pub(crate) const FORKING_SLEEPER: &str = "sleep 30 & echo $! > \"$1\"; wait";

/// Whether the process whose pid was written to `pid_file` is still running
/// after `within`. Zombies count as gone.
#[cfg(unix)]
pub(crate) async fn still_running(pid_file: &std::path::Path, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    let pid: libc::pid_t = loop {
        let recorded = std::fs::read_to_string(pid_file).ok();
        if let Some(pid) = recorded.and_then(|text| text.trim().parse().ok()) {
            break pid;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no pid recorded in {}",
            pid_file.display()
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    };

    loop {
        // SAFETY: signal 0 only checks that the pid exists.
        let exists = unsafe { libc::kill(pid, 0) } == 0;
        let zombie = std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .map(|stat| stat.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')))
            .unwrap_or(false);
        if !exists || zombie {
            return false;
        }
        if tokio::time::Instant::now() >= deadline {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
