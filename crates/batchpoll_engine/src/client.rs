use std::collections::BTreeMap;
use std::time::Duration;

use batchpoll_logging::batch_debug;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::{BatchRequestBody, BatchResponseBody, ErrorBody};
use crate::{
    check_upload, ApiError, FileAnalysis, FileSummary, ItemId, StatusReport, UploadedFile,
};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Root of the service, e.g. `http://127.0.0.1:5000`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Replaces `request_timeout` for single-file analysis, which the service runs inline.
    pub process_timeout: Duration,
    pub max_bytes: u64,
    /// Sent verbatim as the `Cookie` header; the service authenticates by login session.
    pub session_cookie: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            process_timeout: Duration::from_secs(120),
            max_bytes: 4 * 1024 * 1024,
            session_cookie: None,
        }
    }
}

/// The processing service's REST surface.
#[async_trait::async_trait]
pub trait ProcessingApi: Send + Sync {
    /// `GET /api/files`
    async fn list_files(&self) -> Result<Vec<FileSummary>, ApiError>;

    /// `POST /api/files` as multipart field `file`.
    async fn upload_file(
        &self,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<UploadedFile, ApiError>;

    /// `DELETE /api/files/<id>`; another user's file yields `ApiError::Forbidden`.
    async fn delete_file(&self, id: ItemId) -> Result<(), ApiError>;

    /// `POST /api/process/<id>`: analyses one file and waits for the result.
    async fn process_file(&self, id: ItemId) -> Result<FileAnalysis, ApiError>;

    /// `POST /api/process/batch`; returns the ids the service queued.
    async fn submit_batch(&self, ids: &[ItemId]) -> Result<Vec<ItemId>, ApiError>;

    /// `GET /api/process/status` for every in-flight job the service knows about.
    async fn fetch_status(&self) -> Result<BTreeMap<ItemId, StatusReport>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestProcessingApi {
    base: Url,
    client: reqwest::Client,
    max_bytes: u64,
    process_timeout: Duration,
    session_cookie: Option<String>,
}

impl ReqwestProcessingApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let mut base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::InvalidBaseUrl(format!("{}: {err}", settings.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(settings.base_url));
        }
        // Endpoints are joined relative to the base, which must end in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;

        Ok(Self {
            base,
            client,
            max_bytes: settings.max_bytes,
            process_timeout: settings.process_timeout,
            session_cookie: settings.session_cookie,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::InvalidBaseUrl(err.to_string()))
    }

    /// Sends the request and reads a bounded body; non-2xx becomes an error.
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let request = match &self.session_cookie {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        };
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(ApiError::TooLarge {
                    max_bytes: self.max_bytes,
                });
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(ApiError::TooLarge {
                    max_bytes: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .map(|error| error.error);
        batch_debug!("service answered {} message={:?}", status, message);
        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized { message }),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden { message }),
            _ => Err(ApiError::HttpStatus {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| ApiError::Decode(err.to_string()))
}

#[async_trait::async_trait]
impl ProcessingApi for ReqwestProcessingApi {
    async fn list_files(&self) -> Result<Vec<FileSummary>, ApiError> {
        let url = self.endpoint("api/files")?;
        let body = self.send(self.client.get(url)).await?;
        decode(&body)
    }

    async fn upload_file(
        &self,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<UploadedFile, ApiError> {
        check_upload(filename, contents.len() as u64)?;
        let url = self.endpoint("api/files")?;
        let form = Form::new().part("file", Part::bytes(contents).file_name(filename.to_string()));
        let body = self.send(self.client.post(url).multipart(form)).await?;
        decode(&body)
    }

    async fn delete_file(&self, id: ItemId) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/files/{id}"))?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn process_file(&self, id: ItemId) -> Result<FileAnalysis, ApiError> {
        let url = self.endpoint(&format!("api/process/{id}"))?;
        let request = self.client.post(url).timeout(self.process_timeout);
        let body = self.send(request).await?;
        decode(&body)
    }

    async fn submit_batch(&self, ids: &[ItemId]) -> Result<Vec<ItemId>, ApiError> {
        let url = self.endpoint("api/process/batch")?;
        let payload = serde_json::to_vec(&BatchRequestBody { file_ids: ids })
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        let body = self.send(request).await?;
        let response: BatchResponseBody = decode(&body)?;
        Ok(response.queued_files)
    }

    async fn fetch_status(&self) -> Result<BTreeMap<ItemId, StatusReport>, ApiError> {
        let url = self.endpoint("api/process/status")?;
        let body = self.send(self.client.get(url)).await?;
        decode(&body)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    ApiError::Network(err.to_string())
}
