//! Testing utilities for snapgrid workspace
//!
//! Shared fixtures, scripted collaborators and channel helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use parking_lot::Mutex;
use snapgrid_core::{DownloadError, ImageDescriptor, ImageFetcher, SlotUpdate, SlotUpdates};
use snapgrid_search::{SearchClient, SearchError, SearchResult};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn url(prefix: &str, i: usize) -> String {
    format!("http://x/{prefix}{i}.jpg")
}

pub fn descriptors_with_prefix(prefix: &str, n: usize) -> Vec<ImageDescriptor> {
    (0..n)
        .map(|i| ImageDescriptor::new(format!("{prefix}{i}"), url(prefix, i)))
        .collect()
}

pub fn descriptors(n: usize) -> Vec<ImageDescriptor> {
    descriptors_with_prefix("p", n)
}

/// What `MockFetcher` answers for a URL
#[derive(Debug, Clone)]
pub enum Reply {
    Image { width: u32, height: u32 },
    Bytes(Vec<u8>),
    Empty,
    Error(String),
}

impl Reply {
    fn into_result(self) -> Result<Vec<u8>, DownloadError> {
        match self {
            Self::Image { width, height } => Ok(png_bytes(width, height)),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Empty => Ok(Vec::new()),
            Self::Error(message) => Err(DownloadError::Fetch(message)),
        }
    }
}

struct ActiveGuard<'a> {
    active: &'a AtomicUsize,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted image fetcher
///
/// Answers per URL (falling back to a default), counts calls and tracks peak
/// concurrency. A held fetcher parks every fetch until `release`.
pub struct MockFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    default: Reply,
    gate: watch::Sender<bool>,
    calls: Mutex<HashMap<String, usize>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            replies: Mutex::new(HashMap::new()),
            default: Reply::Image { width: 4, height: 4 },
            gate,
            calls: Mutex::new(HashMap::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_default(mut self, reply: Reply) -> Self {
        self.default = reply;
        self
    }

    pub fn with_reply(self, url: impl Into<String>, reply: Reply) -> Self {
        self.replies.lock().insert(url.into(), reply);
        self
    }

    /// Park fetches until `release`
    pub fn held(self) -> Self {
        self.gate.send_replace(false);
        self
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` fetches have started
    pub async fn wait_for_fetches(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.total_fetches() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        *self.calls.lock().entry(url.to_string()).or_default() += 1;
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard {
            active: &self.active,
        };

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let reply = self
            .replies
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        reply.into_result()
    }
}

/// Search client serving canned pages
#[derive(Default)]
pub struct MockSearchClient {
    pages: Mutex<HashMap<(String, u32), Vec<ImageDescriptor>>>,
    failure: Mutex<Option<SearchError>>,
    requests: Mutex<Vec<(String, u32)>>,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, tags: &str, page: u32, descriptors: Vec<ImageDescriptor>) -> Self {
        self.pages.lock().insert((tags.to_string(), page), descriptors);
        self
    }

    pub fn failing(self, error: SearchError) -> Self {
        *self.failure.lock() = Some(error);
        self
    }

    pub fn requests(&self) -> Vec<(String, u32)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SearchClient for MockSearchClient {
    async fn search(&self, tags: &str, page: u32) -> SearchResult<Vec<ImageDescriptor>> {
        self.requests.lock().push((tags.to_string(), page));
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(self
            .pages
            .lock()
            .get(&(tags.to_string(), page))
            .cloned()
            .unwrap_or_default())
    }
}

/// Receive exactly `n` updates, panicking after `timeout`
pub async fn collect_updates(updates: &mut SlotUpdates, n: usize, timeout: Duration) -> Vec<SlotUpdate> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let update = tokio::time::timeout(timeout, updates.recv())
            .await
            .expect("timed out waiting for slot update")
            .expect("update channel closed");
        out.push(update);
    }
    out
}

/// Assert nothing arrives on the channel for `quiet`
pub async fn assert_no_update(updates: &mut SlotUpdates, quiet: Duration) {
    if let Ok(Some(update)) = tokio::time::timeout(quiet, updates.recv()).await {
        panic!("unexpected slot update: {update:?}");
    }
}

/// Serve one HTTP response on a local port
///
/// Returns the base URL and a handle yielding the raw request head.
pub async fn serve_once(status: u16, content_type: &str, body: Vec<u8>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });

    (format!("http://{addr}"), handle)
}
