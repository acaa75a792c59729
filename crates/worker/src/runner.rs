//! Newline-delimited JSON job loop.
//!
//! Reads one [`JobEnvelope`] per line and answers on the writer with zero or
//! more progress lines followed by exactly one result line:
//!
//! ```text
//! {"type":"progress","id":"job-1","progress":5,"message":"Queuing workflow..."}
//! {"type":"result","id":"job-1","output":{"status":"success",...}}
//! ```
//!
//! Jobs run strictly one at a time. The loop ends at end of input or when
//! the shutdown token fires.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use podbridge_comfyui::progress::ProgressUpdate;
use podbridge_pipeline::error::JobError;
use podbridge_pipeline::orchestrator::Orchestrator;
use podbridge_pipeline::request::JobResult;

use crate::job::{run_job, JobEnvelope, UNKNOWN_JOB_ID};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("I/O error on job stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A line written back to the job platform.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outbound<'a> {
    Progress {
        id: &'a str,
        progress: u8,
        message: &'a str,
    },
    Result {
        id: &'a str,
        output: &'a JobResult,
    },
}

/// Process jobs from `reader` until end of input or shutdown. Returns the
/// number of jobs answered.
pub async fn run_jobs<R, W>(
    orchestrator: &Orchestrator,
    reader: R,
    mut writer: W,
    shutdown: &CancellationToken,
) -> Result<usize, RunnerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown requested, leaving job loop");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            tracing::info!("Job input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let envelope: JobEnvelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable job line");
                let result = JobResult::failure(
                    &JobError::InvalidInput(format!("job line is not a job envelope: {e}")),
                    Vec::new(),
                );
                write_message(&mut writer, &Outbound::Result { id: UNKNOWN_JOB_ID, output: &result })
                    .await?;
                answered += 1;
                continue;
            }
        };

        let id = envelope.id.clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
        let job = run_job(orchestrator, envelope, tx, shutdown.child_token());
        tokio::pin!(job);

        let result = loop {
            tokio::select! {
                result = &mut job => break result,
                Some(update) = rx.recv() => write_progress(&mut writer, &id, &update).await?,
            }
        };
        while let Ok(update) = rx.try_recv() {
            write_progress(&mut writer, &id, &update).await?;
        }

        write_message(&mut writer, &Outbound::Result { id: &id, output: &result }).await?;
        answered += 1;
    }

    Ok(answered)
}

async fn write_progress<W: AsyncWrite + Unpin>(
    writer: &mut W,
    id: &str,
    update: &ProgressUpdate,
) -> Result<(), RunnerError> {
    write_message(
        writer,
        &Outbound::Progress {
            id,
            progress: update.progress,
            message: &update.message,
        },
    )
    .await
}

async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Outbound<'_>,
) -> Result<(), RunnerError> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
