//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use expense_server::config::AppConfig;
use expense_server::{App, AppBuilder};

/// In-memory log sink for asserting on emitted lines.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Route this thread's `tracing` output into the capture until the
    /// returned guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    /// INFO lines whose message is exactly `"<method> <path>"`.
    pub fn entry_lines(&self, method: &str, path: &str) -> usize {
        let message = format!(": {method} {path}");
        self.lines()
            .iter()
            .filter(|l| l.contains(" INFO "))
            .filter(|l| {
                l.split_once(&message)
                    .is_some_and(|(_, rest)| rest.is_empty() || rest.starts_with(' '))
            })
            .count()
    }

    pub fn occurrences(&self, text: &str) -> usize {
        self.contents().matches(text).count()
    }
}

pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}

/// Counts how often a handler ran.
#[derive(Clone, Default)]
pub struct HitCounter(Arc<AtomicUsize>);

impl HitCounter {
    pub fn hits(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// A group whose every path answers 200 "hit" and bumps the counter.
    pub fn group(&self) -> Router {
        let counter = self.clone();
        Router::new().fallback(move || {
            let counter = counter.clone();
            async move {
                counter.0.fetch_add(1, Ordering::SeqCst);
                "hit"
            }
        })
    }
}

/// Build an app with the given groups mounted.
pub fn app(config: AppConfig, groups: Vec<(&str, Router)>) -> App {
    AppBuilder::new(config)
        .route_groups(groups)
        .build()
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
