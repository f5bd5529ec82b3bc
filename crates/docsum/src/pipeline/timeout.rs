//! Stage deadlines for work that has no timeout of its own.

use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use super::error::{PipelineError, Stage};

/// Runs `work` on a helper thread and waits at most `deadline` for it.
///
/// On expiry the helper is abandoned; its result is dropped whenever it
/// finishes. A panic in `work` is reported as [`PipelineError::Aborted`].
pub fn run_with_deadline<T, F>(stage: Stage, deadline: Duration, work: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    let span = tracing::Span::current();

    std::thread::Builder::new()
        .name(format!("docsum-{}", stage))
        .spawn(move || {
            let _entered = span.enter();
            let _ = tx.send(work());
        })
        .map_err(|e| PipelineError::Aborted {
            stage,
            reason: format!("failed to spawn helper thread: {}", e),
        })?;

    match rx.recv_timeout(deadline) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("Stage '{}' did not finish within {:?}", stage, deadline);
            Err(PipelineError::DeadlineExceeded {
                stage,
                after: deadline,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(PipelineError::Aborted {
            stage,
            reason: "helper thread panicked".to_string(),
        }),
    }
}
