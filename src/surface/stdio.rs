//! Stdio-backed surface used by the command line client
//!
//! Remote output goes straight to stdout. Stdin is read in cooked mode, so
//! input reaches the remote shell a line at a time. While a credential prompt
//! is armed, the next stdin line is diverted to the prompt instead.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{LocalSurface, SurfaceError, SurfaceEvent, SurfaceResult};
use crate::session::Geometry;

/// Surface writing to stdout
pub struct StdioSurface {
    geometry: Geometry,
    events: mpsc::UnboundedSender<SurfaceEvent>,
    /// Current, not yet terminated output line
    line: String,
    disposed: bool,
}

impl StdioSurface {
    pub fn new(geometry: Geometry, events: mpsc::UnboundedSender<SurfaceEvent>) -> Self {
        Self {
            geometry,
            events,
            line: String::new(),
            disposed: false,
        }
    }

    /// Geometry from `COLUMNS`/`LINES`, falling back to `fallback`
    pub fn geometry_from_env(fallback: Geometry) -> Geometry {
        let read = |name: &str| std::env::var(name).ok().and_then(|v| v.parse::<u16>().ok());
        Geometry::new(
            read("COLUMNS").unwrap_or(fallback.cols),
            read("LINES").unwrap_or(fallback.rows),
        )
    }

    /// Track the last output line and report it as a refresh
    fn track_line(&mut self, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        let mut changed = false;
        for ch in text.chars() {
            match ch {
                '\n' => self.line.clear(),
                '\r' => {}
                c => self.line.push(c),
            }
            changed = true;
        }
        if changed && !self.line.is_empty() {
            let _ = self.events.send(SurfaceEvent::Refresh {
                line: self.line.clone(),
            });
        }
    }
}

impl LocalSurface for StdioSurface {
    fn write(&mut self, data: &[u8]) -> SurfaceResult<()> {
        if self.disposed {
            return Ok(());
        }
        let mut out = std::io::stdout().lock();
        out.write_all(data)?;
        out.flush()?;
        drop(out);
        self.track_line(data);
        Ok(())
    }

    fn propose_geometry(&self) -> SurfaceResult<Geometry> {
        if !std::io::stdout().is_terminal() {
            return Err(SurfaceError::NotVisible);
        }
        Ok(Self::geometry_from_env(self.geometry))
    }

    fn resize(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }

    fn focus(&mut self) {}

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            let _ = std::io::stdout().flush();
        }
    }
}

/// What a waiting credential prompt receives from stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptInput {
    Line(String),
    /// Stdin ended before a line was typed
    Closed,
}

/// Diverts one stdin line to a credential prompt when armed
#[derive(Debug)]
pub struct LineGate {
    armed: AtomicBool,
    lines: mpsc::UnboundedSender<PromptInput>,
}

impl LineGate {
    pub fn new(lines: mpsc::UnboundedSender<PromptInput>) -> Arc<Self> {
        Arc::new(Self {
            armed: AtomicBool::new(false),
            lines,
        })
    }

    /// Capture the next input line
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    fn deliver(&self, line: String) {
        self.armed.store(false, Ordering::SeqCst);
        let _ = self.lines.send(PromptInput::Line(line));
    }

    /// Input ended; a waiting prompt is told so
    fn close(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.lines.send(PromptInput::Closed);
        }
    }
}

/// Split the first line off `pending`, returning it and the bytes after it
fn split_line(pending: &[u8]) -> Option<(String, Vec<u8>)> {
    let end = pending.iter().position(|&b| b == b'\n' || b == b'\r')?;
    let mut rest = end + 1;
    if pending[end] == b'\r' && pending.get(rest) == Some(&b'\n') {
        rest += 1;
    }
    let line = String::from_utf8_lossy(&pending[..end]).into_owned();
    Some((line, pending[rest..].to_vec()))
}

/// Read stdin until EOF, forwarding bytes as input events
pub fn spawn_stdin_reader(
    events: mpsc::UnboundedSender<SurfaceEvent>,
    gate: Arc<LineGate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buffer = [0u8; 4096];
        let mut pending = Vec::new();

        loop {
            let n = match stdin.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let mut input = buffer[..n].to_vec();

            if gate.is_armed() {
                pending.extend_from_slice(&input);
                let Some((line, rest)) = split_line(&pending) else {
                    continue;
                };
                pending.clear();
                gate.deliver(line);
                if rest.is_empty() {
                    continue;
                }
                input = rest;
            }

            if events.send(SurfaceEvent::Input(input)).is_err() {
                break;
            }
        }
        debug!("Stdin closed");
        gate.close();
    })
}
