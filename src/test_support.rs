//! In-crate fakes shared by the unit and scenario tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Notify;

use crate::backend::{CommandError, ServiceBackend, ServiceStatus};
use crate::notifier::{Notifier, NotifyError};
use crate::release_feed::{FetchError, ReleaseFeed, ReleaseInfo};

pub const GET_STATUS: &str = "get_service_status";
pub const START: &str = "start_service";
pub const STOP: &str = "stop_service";
pub const GET_STARTUP: &str = "get_startup_enabled";
pub const SET_STARTUP: &str = "set_startup_enabled";
pub const GET_DIR: &str = "get_download_dir";
pub const ORGANIZE: &str = "trigger_organize_now";
pub const RELOAD: &str = "reload_config";
pub const RESET: &str = "reset_to_defaults";

#[derive(Debug, Clone)]
struct BackendFacts {
    running: bool,
    startup: bool,
    download_dir: String,
    organize_count: usize,
}

/// Scriptable background service.
pub struct FakeBackend {
    facts: Mutex<BackendFacts>,
    failures: Mutex<HashMap<&'static str, String>>,
    /// Operations that take effect and then still report an error.
    applied_failures: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<&'static str>>,
    status_gate: Gate,
    organize_gate: Gate,
}

/// Holds calls in flight until released.
#[derive(Default)]
struct Gate {
    paused: AtomicBool,
    release: Notify,
}

impl Gate {
    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn open(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    async fn pass(&self) {
        let released = self.release.notified();
        if self.paused.load(Ordering::SeqCst) {
            released.await;
        }
    }
}

impl FakeBackend {
    pub fn new(running: bool, startup: bool, download_dir: &str) -> Self {
        Self {
            facts: Mutex::new(BackendFacts {
                running,
                startup,
                download_dir: download_dir.to_string(),
                organize_count: 0,
            }),
            failures: Mutex::new(HashMap::new()),
            applied_failures: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            status_gate: Gate::default(),
            organize_gate: Gate::default(),
        }
    }

    pub fn fail(&self, op: &'static str, message: &str) {
        self.failures.lock().unwrap().insert(op, message.to_string());
    }

    /// The operation changes backend state but the reply is still an error.
    pub fn fail_after_applying(&self, op: &'static str, message: &str) {
        self.fail(op, message);
        self.applied_failures.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failures.lock().unwrap().remove(op);
        self.applied_failures.lock().unwrap().remove(op);
    }

    pub fn set_running(&self, running: bool) {
        self.facts.lock().unwrap().running = running;
    }

    pub fn running(&self) -> bool {
        self.facts.lock().unwrap().running
    }

    pub fn startup(&self) -> bool {
        self.facts.lock().unwrap().startup
    }

    pub fn set_download_dir(&self, dir: &str) {
        self.facts.lock().unwrap().download_dir = dir.to_string();
    }

    pub fn set_organize_count(&self, count: usize) {
        self.facts.lock().unwrap().organize_count = count;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    /// Makes `get_service_status` wait until [`FakeBackend::release_status`].
    pub fn pause_status(&self) {
        self.status_gate.pause();
    }

    pub fn release_status(&self) {
        self.status_gate.open();
    }

    /// Makes `trigger_organize_now` wait until [`FakeBackend::release_organize`].
    pub fn pause_organize(&self) {
        self.organize_gate.pause();
    }

    pub fn release_organize(&self) {
        self.organize_gate.open();
    }

    fn enter(&self, op: &'static str) -> Result<(), CommandError> {
        self.calls.lock().unwrap().push(op);
        match self.failures.lock().unwrap().get(op) {
            Some(message) => Err(CommandError::new(message)),
            None => Ok(()),
        }
    }

    fn mutate(&self, op: &'static str, apply: impl FnOnce(&mut BackendFacts)) -> Result<(), CommandError> {
        let outcome = self.enter(op);
        if outcome.is_ok() || self.applied_failures.lock().unwrap().contains(op) {
            apply(&mut self.facts.lock().unwrap());
        }
        outcome
    }
}

#[async_trait]
impl ServiceBackend for FakeBackend {
    async fn get_service_status(&self) -> Result<ServiceStatus, CommandError> {
        let result = self.enter(GET_STATUS);
        self.status_gate.pass().await;
        result?;
        Ok(ServiceStatus {
            running: self.running(),
            uptime_seconds: None,
        })
    }

    async fn start_service(&self) -> Result<(), CommandError> {
        self.mutate(START, |f| f.running = true)
    }

    async fn stop_service(&self) -> Result<(), CommandError> {
        self.mutate(STOP, |f| f.running = false)
    }

    async fn get_startup_enabled(&self) -> Result<bool, CommandError> {
        self.enter(GET_STARTUP)?;
        Ok(self.startup())
    }

    async fn set_startup_enabled(&self, enabled: bool) -> Result<(), CommandError> {
        self.mutate(SET_STARTUP, |f| f.startup = enabled)
    }

    async fn get_download_dir(&self) -> Result<String, CommandError> {
        self.enter(GET_DIR)?;
        Ok(self.facts.lock().unwrap().download_dir.clone())
    }

    async fn trigger_organize_now(&self) -> Result<usize, CommandError> {
        let result = self.enter(ORGANIZE);
        self.organize_gate.pass().await;
        result?;
        Ok(self.facts.lock().unwrap().organize_count)
    }

    async fn reload_config(&self) -> Result<(), CommandError> {
        self.enter(RELOAD)
    }

    async fn reset_to_defaults(&self) -> Result<(), CommandError> {
        self.mutate(RESET, |f| {
            f.startup = false;
            f.download_dir = "~/Downloads".to_string();
        })
    }
}

/// Release feed answering with a scripted release or failure.
pub struct FakeFeed {
    response: Mutex<Result<ReleaseInfo, String>>,
    calls: AtomicUsize,
    gate: Gate,
}

impl FakeFeed {
    pub fn with_tag(tag: &str) -> Self {
        Self {
            response: Mutex::new(Ok(release(tag))),
            calls: AtomicUsize::new(0),
            gate: Gate::default(),
        }
    }

    /// Makes `latest_release` wait until [`FakeFeed::resume`].
    pub fn pause(&self) {
        self.gate.pause();
    }

    pub fn resume(&self) {
        self.gate.open();
    }

    pub fn set_tag(&self, tag: &str) {
        *self.response.lock().unwrap() = Ok(release(tag));
    }

    pub fn set_failure(&self, reason: &str) {
        *self.response.lock().unwrap() = Err(reason.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn release(tag: &str) -> ReleaseInfo {
    ReleaseInfo {
        tag_name: tag.to_string(),
        html_url: format!("https://github.com/eduard-lt/Harbor/releases/tag/{tag}"),
    }
}

#[async_trait]
impl ReleaseFeed for FakeFeed {
    async fn latest_release(&self) -> Result<ReleaseInfo, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;
        self.response
            .lock()
            .unwrap()
            .clone()
            .map_err(FetchError::Status)
    }
}

pub struct FakeNotifier {
    granted: AtomicBool,
    grant_on_request: bool,
    fail_send: bool,
    requests: AtomicUsize,
    sent: Mutex<Vec<String>>,
}

impl FakeNotifier {
    pub fn new(granted: bool, grant_on_request: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            grant_on_request,
            fail_send: false,
            requests: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn permission_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for FakeNotifier {
    fn permission_granted(&self) -> Result<bool, NotifyError> {
        Ok(self.granted.load(Ordering::SeqCst))
    }

    fn request_permission(&self) -> Result<bool, NotifyError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.granted.store(self.grant_on_request, Ordering::SeqCst);
        Ok(self.grant_on_request)
    }

    fn send(&self, _title: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail_send {
            return Err(NotifyError::new("notification daemon unavailable"));
        }
        self.sent.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

pub fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serves exactly one HTTP request with `response` and hands back the raw request.
pub async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&raw);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8_lossy(&raw).to_string()
    });

    (base_url, handle)
}
