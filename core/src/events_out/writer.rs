use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::config::EventsOutConfig;

fn audit_preview(s: &str) -> String {
    const MAX: usize = 120;
    if s.len() <= MAX {
        return s.to_string();
    }
    let end = s
        .char_indices()
        .take_while(|(i, _)| *i < MAX)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let mut out = s[..end].to_string();
    out.push('…');
    out
}

#[derive(Clone)]
pub struct EventsOutTx {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
    drop_when_full: bool,
}

impl EventsOutTx {
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Claims one slot in the writer queue. Waits for room unless
    /// `drop_when_full` is set, in which case a full queue counts a drop and
    /// yields `None`. Also `None` once the writer task is gone.
    pub async fn reserve_slot(&self) -> Option<mpsc::Permit<'_, String>> {
        if !self.drop_when_full {
            return self.tx.reserve().await.ok();
        }
        match self.tx.try_reserve() {
            Ok(slot) => Some(slot),
            Err(mpsc::error::TrySendError::Full(())) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(mpsc::error::TrySendError::Closed(())) => None,
        }
    }

    pub async fn send_line(&self, line: String) {
        if let Some(slot) = self.reserve_slot().await {
            slot.send(line);
        }
    }
}

/// Starts the JSONL writer task. Returns `None` when disabled.
///
/// The file is opened before the task is spawned so a bad path is reported
/// to the caller. The task flushes and exits once every sender is dropped.
pub async fn start_events_out(cfg: &EventsOutConfig) -> Result<Option<EventsOutTx>, String> {
    if !cfg.enabled || cfg.path.trim().is_empty() {
        return Ok(None);
    }

    let path = cfg.path.clone();
    let to_stdout = path == "stdout:";
    let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = if to_stdout {
        Box::new(tokio::io::stdout())
    } else {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| format!("events_out open {path}: {e}"))?;
        Box::new(file)
    };

    let (tx, mut rx) = mpsc::channel::<String>(cfg.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            if !line.ends_with('\n') {
                line.push('\n');
            }
            if to_stdout {
                tracing::debug!(
                    target: "planflow.stdout_audit",
                    kind = "events_out",
                    bytes = line.len(),
                    preview = %audit_preview(line.trim_end())
                );
            }
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                tracing::warn!(error = %e, path = %path, "events_out write failed");
                return;
            }
        }

        let _ = writer.flush().await;
    });

    Ok(Some(EventsOutTx {
        tx,
        dropped,
        drop_when_full: cfg.drop_when_full,
    }))
}
