//! Diagnostic sink owned by a single consumer task.
//!
//! The stdout pump and the stderr drain never write logs or the capture
//! buffer directly; they send whole lines here. One task owns both, so lines
//! cannot interleave mid-write.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const SINK_CAPACITY: usize = 64;

#[derive(Debug)]
pub(super) enum SinkLine {
    Stdout(String),
    Stderr(String),
}

pub(super) struct DiagnosticSink {
    tx: mpsc::Sender<SinkLine>,
    consumer: JoinHandle<String>,
}

impl DiagnosticSink {
    /// Start the consumer task. Must be called inside a tokio runtime.
    pub(super) fn spawn(command: String, surface_stderr: bool) -> Self {
        let (tx, mut rx) = mpsc::channel::<SinkLine>(SINK_CAPACITY);

        let consumer = tokio::spawn(async move {
            let mut captured = String::new();
            while let Some(line) = rx.recv().await {
                match line {
                    SinkLine::Stdout(line) => {
                        tracing::trace!(command = %command, "{}", line);
                    }
                    SinkLine::Stderr(line) => {
                        if surface_stderr {
                            tracing::warn!(command = %command, "{}", line);
                        }
                        if !captured.is_empty() {
                            captured.push('\n');
                        }
                        captured.push_str(&line);
                    }
                }
            }
            captured
        });

        Self { tx, consumer }
    }

    pub(super) fn sender(&self) -> mpsc::Sender<SinkLine> {
        self.tx.clone()
    }

    /// Close our sender and collect the captured stderr text.
    ///
    /// Returns once every other sender has been dropped too.
    pub(super) async fn finish(self) -> String {
        drop(self.tx);
        match self.consumer.await {
            Ok(captured) => captured,
            Err(e) => {
                tracing::warn!(error = %e, "Diagnostic sink task failed");
                String::new()
            }
        }
    }
}
