use crate::extractor::{Extraction, MediaType};
use crate::job::{word_count, Job, JobMetadata, JobResults};
use crate::provider::Summary;
use crate::queue::FileDescriptor;

pub struct PipelineContext {
    // Input
    pub job: Job,
    pub file: FileDescriptor,

    // Set once the declared type passed the allow-list
    pub media: Option<MediaType>,

    // Extraction (or transcription) result
    pub extraction: Option<Extraction>,

    // Summarization result
    pub summary: Option<Summary>,
}

impl PipelineContext {
    pub fn new(job: Job, file: FileDescriptor) -> Self {
        Self {
            job,
            file,
            media: None,
            extraction: None,
            summary: None,
        }
    }

    /// Assembles the completion payload once both extraction and summary exist.
    ///
    /// `confidence` is the summarizer's own score, for audio too.
    pub fn results(&self) -> Option<JobResults> {
        let extraction = self.extraction.as_ref()?;
        let summary = self.summary.as_ref()?;

        Some(JobResults {
            original_text: extraction.text.clone(),
            summary: summary.summary.clone(),
            key_points: summary.key_points.clone(),
            action_items: summary.action_items.clone(),
            metadata: JobMetadata {
                word_count: word_count(&extraction.text),
                duration: extraction.duration_secs(),
                confidence: summary.confidence,
            },
        })
    }

    /// Where the summary, and for audio the transcript, came from.
    pub fn provenance_detail(&self) -> String {
        let summary = self
            .summary
            .as_ref()
            .map(|s| s.provenance.to_string())
            .unwrap_or_default();
        match self.extraction.as_ref().and_then(|e| e.transcript.as_ref()) {
            Some(t) => format!(
                "{}; transcript {} at {:.2}",
                summary, t.provenance, t.confidence
            ),
            None => summary,
        }
    }
}
