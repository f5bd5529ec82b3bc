use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;

use docsum::broadcast::JobProgressBroadcaster;
use docsum::error::{DocsumError, WorkerError};
use docsum::extractor::{MediaFamily, MediaType};
use docsum::job::{FileType, Job, JobId, ProcessingStatus};
use docsum::pipeline::{Outcome, Pipeline, PipelineConfig};
use docsum::provider::Providers;
use docsum::queue::{FileDescriptor, MessageQueue};
use docsum::retry::RetryPolicy;
use docsum::worker::{self, Producer, WorkerOutcome, WorkerPool, WorkerPoolConfig};

use crate::app::App;

/// Upper bound on rows printed by the listing commands.
const STUCK_LIMIT: u64 = 1000;

pub fn worker(app: &App) -> Result<(), DocsumError> {
    let config = &app.config;
    let providers = Providers::from_config(&config.ai, &config.timeouts)?;
    let progress = JobProgressBroadcaster::default();
    let mut progress_rx = progress.subscribe();

    let pipeline = Pipeline::new(
        Arc::new(PipelineConfig::from_config(config)),
        Arc::clone(&app.store),
        &providers,
    )
    .with_retry(RetryPolicy::from(&config.retry))
    .with_progress(progress);

    let queue: Arc<dyn MessageQueue> = app.queue.clone();
    let pool = WorkerPool::start(
        Arc::new(pipeline),
        queue,
        &WorkerPoolConfig {
            topic: config.queue.topic.clone(),
            group_id: config.queue.group_id.clone(),
            worker_count: config.worker_count,
            receive_timeout: config.queue.receive_timeout(),
        },
    )?;

    let shutdown = pool.shutdown_flag();
    ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
        .map_err(|e| WorkerError::SignalHandler(e.to_string()))?;

    info!("Worker running; press Ctrl-C to stop");

    while !pool.is_shutdown() {
        if let Some(outcome) = pool.recv_outcome(Duration::from_millis(250)) {
            report_outcome(&outcome);
        }
        while let Ok(event) = progress_rx.try_recv() {
            match serde_json::to_string(&event) {
                Ok(line) => debug!("progress {}", line),
                Err(e) => debug!("progress event not serializable: {}", e),
            }
        }
    }

    pool.shutdown();
    pool.wait();
    Ok(())
}

fn report_outcome(WorkerOutcome { worker_id, outcome }: &WorkerOutcome) {
    match outcome {
        Outcome::Completed { job_id } => info!("[worker {}] job {} completed", worker_id, job_id),
        Outcome::Failed {
            job_id,
            stage,
            reason,
        } => warn!(
            "[worker {}] job {} failed at {}: {}",
            worker_id, job_id, stage, reason
        ),
        Outcome::Duplicate { job_id, status } => debug!(
            "[worker {}] duplicate delivery for job {} ({})",
            worker_id, job_id, status
        ),
        Outcome::Discarded { reason } => warn!("[worker {}] discarded message: {}", worker_id, reason),
        Outcome::Retry { reason } => warn!("[worker {}] delivery deferred: {}", worker_id, reason),
    }
}

pub struct Submission<'a> {
    pub path: &'a Path,
    pub owner: &'a str,
    pub mime: Option<String>,
    pub title: Option<String>,
    pub inline: bool,
}

/// Plays the gateway: one `pending` record, one queue message.
pub fn submit(app: &App, submission: Submission<'_>) -> Result<JobId, DocsumError> {
    let path = submission.path;
    let mime = submission.mime.unwrap_or_else(|| {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let mut job = Job::new(submission.owner, file_type_for(&mime), &file_name);
    if let Some(title) = submission.title {
        job = job.with_title(title);
    }

    let file = if submission.inline {
        let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
        FileDescriptor::inline(&mime, &bytes, &file_name)
    } else {
        let pointer = format!("{}/{}", job.id, file_name);
        let dest = app.config.upload_directory().join(&pointer);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        std::fs::copy(path, &dest).map_err(|e| io_error(&dest, e))?;
        FileDescriptor::stored(&mime, pointer, &file_name)
    };

    producer(app).submit(&job, file)?;
    Ok(job.id)
}

pub fn submit_text(app: &App, owner: &str, title: &str, text: &str) -> Result<JobId, DocsumError> {
    let file_name = "text.txt";
    let job = Job::new(owner, FileType::Txt, file_name).with_title(title);
    let file = FileDescriptor::inline("text/plain", text.as_bytes(), file_name);

    producer(app).submit(&job, file)?;
    Ok(job.id)
}

pub fn status(app: &App, id: &str, owner: Option<&str>) -> Result<(), DocsumError> {
    let id = JobId::from(id);
    let job = match owner {
        Some(owner) => app.store.load_for_owner(&id, owner)?,
        None => app.store.load(&id)?,
    };
    print_json(&job);
    Ok(())
}

pub fn list(
    app: &App,
    owner: &str,
    status: Option<ProcessingStatus>,
    limit: u64,
) -> Result<(), DocsumError> {
    for job in app.store.list_for_owner(owner, status, limit)? {
        print_row(&job);
    }
    Ok(())
}

pub fn stuck(app: &App, older_than_mins: u64) -> Result<(), DocsumError> {
    let jobs = worker::find_stuck_jobs(app.store.as_ref(), older_than_mins, STUCK_LIMIT)?;
    if jobs.is_empty() {
        println!("No jobs stuck in processing for {}+ minutes", older_than_mins);
    }
    for job in &jobs {
        print_row(job);
    }
    Ok(())
}

pub fn reap(app: &App, older_than_mins: u64) -> Result<(), DocsumError> {
    let report = worker::reap_stuck_jobs(app.store.as_ref(), older_than_mins, STUCK_LIMIT)?;
    print_json(&report);
    Ok(())
}

fn producer(app: &App) -> Producer {
    let queue: Arc<dyn MessageQueue> = app.queue.clone();
    Producer::new(Arc::clone(&app.store), queue, app.config.queue.topic.clone())
}

/// Unsupported types are still accepted here; the worker fails them.
fn file_type_for(mime: &str) -> FileType {
    match MediaType::parse(mime).map(|m| m.family()) {
        Ok(MediaFamily::Pdf) => FileType::Pdf,
        Ok(MediaFamily::Docx) => FileType::Docx,
        Ok(MediaFamily::Audio) => FileType::Audio,
        Ok(MediaFamily::Text) => FileType::Txt,
        Err(e) => {
            warn!("{}; the job will fail during extraction", e);
            FileType::Txt
        }
    }
}

fn print_row(job: &Job) {
    println!(
        "{}  {:<10}  {:<5}  {}  {}",
        job.id,
        job.processing_status.as_str(),
        job.file_type.as_str(),
        job.updated_at.format("%Y-%m-%d %H:%M:%S"),
        job.title.as_deref().unwrap_or(&job.file_name)
    );
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to render output: {}", e),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DocsumError {
    DocsumError::Io {
        path: path.to_path_buf(),
        source,
    }
}
