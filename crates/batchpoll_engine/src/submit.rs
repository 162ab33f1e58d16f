use std::sync::Arc;

use batchpoll_logging::{batch_info, batch_warn};

use crate::{ItemId, ProcessingApi, SubmitError};

/// Shown when a submission fails without a message from the service.
pub const GENERIC_SUBMIT_FAILURE: &str = "Batch processing failed";

/// Sends one selection to the service as a single batch job.
#[derive(Clone)]
pub struct BatchSubmitter {
    api: Arc<dyn ProcessingApi>,
}

impl BatchSubmitter {
    pub fn new(api: Arc<dyn ProcessingApi>) -> Self {
        Self { api }
    }

    /// Returns exactly the ids the service queued, which may be fewer than
    /// requested. An empty `ids` is rejected before any request is made.
    pub async fn submit(&self, ids: &[ItemId]) -> Result<Vec<ItemId>, SubmitError> {
        if ids.is_empty() {
            return Err(SubmitError::EmptySelection);
        }

        match self.api.submit_batch(ids).await {
            Ok(queued) => {
                batch_info!(
                    "batch submitted requested={} queued={}",
                    ids.len(),
                    queued.len()
                );
                Ok(queued)
            }
            Err(err) => {
                batch_warn!("batch submission failed: {}", err);
                let message = err
                    .server_message()
                    .unwrap_or(GENERIC_SUBMIT_FAILURE)
                    .to_string();
                Err(SubmitError::SubmissionFailed { message })
            }
        }
    }
}
