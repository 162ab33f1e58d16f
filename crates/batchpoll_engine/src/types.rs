use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ApiError, SubmitError};

pub type ItemId = u64;

/// One entry of `GET /api/files`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileSummary {
    pub id: ItemId,
    pub filename: String,
    pub filetype: Option<String>,
    pub size: Option<u64>,
    pub created_at: Option<String>,
}

/// Reply to `POST /api/files`. The service formats `size` itself, e.g. `"2.0 KB"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub id: ItemId,
    pub filename: String,
    pub size: Option<String>,
    #[serde(rename = "type")]
    pub filetype: Option<String>,
    pub created_at: Option<String>,
}

/// VADER polarity scores; `compound` is in `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Sentiment {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    pub compound: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
    pub start: u64,
    pub end: u64,
}

/// Reply to `POST /api/process/<id>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileAnalysis {
    pub transcript: String,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Segment start times in seconds per speaker label; absent for text files.
    #[serde(default)]
    pub speakers: Option<BTreeMap<String, Vec<f64>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    /// Any status string this client does not know; treated as not reported.
    #[serde(other)]
    Unknown,
}

/// One value of the `GET /api/process/status` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchRequestBody<'a> {
    pub file_ids: &'a [ItemId],
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchResponseBody {
    pub queued_files: Vec<ItemId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    PollTick,
    Grace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    FilesListed(Result<Vec<FileSummary>, ApiError>),
    FileUploaded(Result<UploadedFile, ApiError>),
    FileDeleted {
        id: ItemId,
        result: Result<(), ApiError>,
    },
    FileProcessed {
        id: ItemId,
        result: Result<FileAnalysis, ApiError>,
    },
    BatchSubmitted(Result<Vec<ItemId>, SubmitError>),
    /// Status of the tracked items only.
    StatusFetched {
        epoch: u64,
        result: Result<BTreeMap<ItemId, StatusReport>, ApiError>,
    },
    TimerFired {
        timer: TimerKind,
        epoch: u64,
    },
}
