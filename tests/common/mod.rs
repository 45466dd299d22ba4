//! Shared test doubles for relay integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;

use filerelay::core::orchestrator::MSG_PROCESSING;
use filerelay::{ChatPlatform, Origin, Relay, RemoteFile, TempStorage, UploadClient};

/// What the platform was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Reply(String),
    Resolve(String),
    Download(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    Ok,
    /// Write part of the file, then fail
    FailMidway,
    /// Write the file, then panic
    Panic,
    /// Write part of the file, then never finish
    Stall,
}

/// In-memory chat platform that records every call
pub struct RecordingPlatform {
    files: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<Call>>,
    download_mode: DownloadMode,
    fail_ack: bool,
    /// When set, resolve_file waits for a permit
    gate: Option<Arc<Semaphore>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            download_mode: DownloadMode::Ok,
            fail_ack: false,
            gate: None,
        }
    }

    pub fn with_file(mut self, file_id: &str, bytes: &[u8]) -> Self {
        self.files.insert(file_id.to_string(), bytes.to_vec());
        self
    }

    pub fn with_download_mode(mut self, mode: DownloadMode) -> Self {
        self.download_mode = mode;
        self
    }

    pub fn failing_ack(mut self) -> Self {
        self.fail_ack = true;
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Reply(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn downloaded_paths(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Download(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn reply(&self, _origin: &Origin, text: &str) -> Result<()> {
        self.record(Call::Reply(text.to_string()));
        if self.fail_ack && text == MSG_PROCESSING {
            anyhow::bail!("chat unreachable");
        }
        Ok(())
    }

    async fn resolve_file(&self, file_id: &str) -> Result<RemoteFile> {
        self.record(Call::Resolve(file_id.to_string()));

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        match self.files.get(file_id) {
            Some(bytes) => Ok(RemoteFile {
                file_id: file_id.to_string(),
                file_path: format!("files/{}", file_id),
                file_size: Some(bytes.len() as u64),
            }),
            None => anyhow::bail!("Bad Request: invalid file_id"),
        }
    }

    async fn download(&self, file: &RemoteFile, dest: &Path) -> Result<u64> {
        self.record(Call::Download(dest.to_path_buf()));
        let bytes = self.files.get(&file.file_id).cloned().unwrap_or_default();

        match self.download_mode {
            DownloadMode::Ok => {
                tokio::fs::write(dest, &bytes).await?;
                Ok(bytes.len() as u64)
            }
            DownloadMode::FailMidway => {
                tokio::fs::write(dest, &bytes[..bytes.len() / 2]).await?;
                anyhow::bail!("connection reset during download")
            }
            DownloadMode::Panic => {
                tokio::fs::write(dest, &bytes).await?;
                panic!("download handler blew up");
            }
            DownloadMode::Stall => {
                tokio::fs::write(dest, &bytes[..bytes.len() / 2]).await?;
                std::future::pending().await
            }
        }
    }
}

/// Build a relay over `platform` that uploads to `upload_base`
pub fn relay(platform: Arc<RecordingPlatform>, upload_base: &str, staging: &Path) -> Relay {
    relay_with_timeout(platform, upload_base, staging, Duration::from_secs(5))
}

pub fn relay_with_timeout(
    platform: Arc<RecordingPlatform>,
    upload_base: &str,
    staging: &Path,
    timeout: Duration,
) -> Relay {
    let uploader = UploadClient::new(upload_base).unwrap().with_timeout(timeout);
    Relay::new(platform, uploader, TempStorage::new(staging))
}

/// An address on which nothing is listening
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// A server that accepts connections and never answers
pub async fn silent_server_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}
