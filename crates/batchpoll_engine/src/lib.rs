//! Batchpoll engine: HTTP client for the processing service and effect execution.
mod client;
mod engine;
mod error;
mod sleeper;
mod submit;
mod types;
mod upload;

pub use client::{ApiSettings, ProcessingApi, ReqwestProcessingApi};
pub use engine::EngineHandle;
pub use error::{ApiError, EngineError, SubmitError};
pub use sleeper::{Sleeper, TokioSleeper};
pub use submit::{BatchSubmitter, GENERIC_SUBMIT_FAILURE};
pub use types::{
    EngineEvent, Entity, FileAnalysis, FileSummary, ItemId, JobStatus, Sentiment, StatusReport,
    TimerKind, UploadedFile,
};
pub use upload::{check_upload, ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES};
