// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The command loop.
//!
//! Lines are read in order. `set:` is applied before the next line is read;
//! requests run concurrently, each as its own task with the engine work on a
//! blocking thread. Responses go through one channel to a single writer and
//! appear in completion order.

use crate::admission::Admission;
use crate::commands::{self, Command};
use crate::watcher::TemplateWatcher;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use turbx::{options, Engine, ResourceResolver};

/// Runtime settings of the command server.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Free memory floor in MiB.
    pub memory_floor_mb: u64,
    /// Watcher debounce.
    pub debounce: Duration,
    /// Watch the template root for changes.
    pub watch: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            memory_floor_mb: 10,
            debounce: Duration::from_millis(100),
            watch: true,
        }
    }
}

/// A command server over one engine.
pub struct Server<R: ResourceResolver> {
    engine: Arc<Engine<R>>,
    admission: Admission,
    settings: ServerSettings,
    watcher: Mutex<Option<TemplateWatcher>>,
}

impl<R: ResourceResolver + std::fmt::Debug> std::fmt::Debug for Server<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("engine", &self.engine)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<R: ResourceResolver> Server<R> {
    /// Creates a server.
    pub fn new(engine: Arc<Engine<R>>, settings: ServerSettings) -> Self {
        Self {
            engine,
            admission: Admission::new(settings.memory_floor_mb),
            settings,
            watcher: Mutex::new(None),
        }
    }

    /// The engine the server renders with.
    pub fn engine(&self) -> &Arc<Engine<R>> {
        &self.engine
    }

    /// Sets an engine option. Changing `root` or `ext` restarts the watcher.
    pub fn set_option(&self, key: &str, value: &str) {
        self.engine.set_option(key, value);
        if self.settings.watch && matches!(key, options::ROOT | options::EXT) {
            self.restart_watcher();
        }
    }

    fn restart_watcher(&self) {
        let Ok(mut slot) = self.watcher.lock() else {
            tracing::warn!("Watcher slot is poisoned");
            return;
        };
        *slot = None;
        let opts = self.engine.options();
        if opts.root.is_empty() {
            return;
        }
        let engine = Arc::clone(&self.engine);
        let watched = TemplateWatcher::new(Path::new(&opts.root), &opts.ext, self.settings.debounce, move |paths| {
            for path in paths {
                let path = turbx::resolver::path_to_string(&path);
                if let Err(e) = engine.invalidate(&path) {
                    tracing::warn!("Failed to invalidate {}: {}", path, e);
                }
            }
        });
        match watched {
            Ok(watcher) => *slot = Some(watcher),
            Err(e) => tracing::warn!("Cannot watch {}: {}", opts.root, e),
        }
    }

    /// Reads commands from `input` until it ends or `stop` arrives, writing
    /// responses to `output`. Waits for in-flight requests before returning
    /// the writer.
    pub async fn serve<I, O>(self: Arc<Self>, input: I, output: O) -> anyhow::Result<O>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(256);
        let writer = tokio::spawn(async move {
            let mut output = output;
            while let Some(line) = rx.recv().await {
                output.write_all(line.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
            Ok::<O, std::io::Error>(output)
        });

        let mut lines = BufReader::new(input).lines();
        while let Some(line) = lines.next_line().await? {
            let Some(command) = Command::parse(&line) else {
                tracing::debug!("Dropping malformed line");
                continue;
            };
            match command {
                Command::Ping => {
                    if tx.send("pong".to_string()).await.is_err() {
                        break;
                    }
                }
                Command::Stop => break,
                Command::Set { key, value } => self.set_option(&key, &value),
                request => {
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        server.admission.admit().await;
                        let engine = Arc::clone(&server.engine);
                        let id = request.id().unwrap_or_default().to_string();
                        let response = match tokio::task::spawn_blocking(move || commands::execute(&engine, &request)).await {
                            Ok(response) => response,
                            Err(e) => {
                                tracing::error!("Request {} panicked: {}", id, e);
                                Some(format!("{}:error", id))
                            }
                        };
                        if let Some(line) = response {
                            let _ = tx.send(line).await;
                        }
                    });
                }
            }
        }

        drop(tx);
        let output = writer.await??;
        Ok(output)
    }
}
