use std::path::Path;
use std::time::Duration;

use ragchat_logging::{chat_debug, chat_info};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DocumentError, RemoteFile};

const UPLOAD_PATH: &str = "/api/documents/upload_and_ingest_document";
const FILES_PATH: &str = "/api/files";

#[derive(Debug, Clone)]
pub struct DocumentSettings {
    /// `http(s)://host:port` of the backend.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Upload requests include server-side ingestion, so this is generous.
    pub request_timeout: Duration,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Request/response channel for document management.
#[async_trait::async_trait]
pub trait DocumentClient: Send + Sync {
    async fn upload(&self, path: &Path, filename: &str) -> Result<(), DocumentError>;
    async fn list_files(&self) -> Result<Vec<RemoteFile>, DocumentError>;
    async fn delete_file(&self, filename: &str) -> Result<(), DocumentError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestDocumentClient {
    settings: DocumentSettings,
    client: reqwest::Client,
}

/// Body shape shared by every document endpoint.
#[derive(Debug, Default, Deserialize)]
struct Reply {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    files: Option<Vec<RemoteFile>>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    filename: &'a str,
}

impl ReqwestDocumentClient {
    pub fn new(settings: DocumentSettings) -> Result<Self, DocumentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| DocumentError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DocumentError> {
        Url::parse(&self.settings.base_url)
            .and_then(|base| base.join(path))
            .map_err(|err| {
                DocumentError::InvalidUrl(format!("{}: {err}", self.settings.base_url))
            })
    }

    async fn read_reply(response: reqwest::Response) -> Result<Reply, DocumentError> {
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let reply = if body.is_empty() {
            Ok(Reply::default())
        } else {
            serde_json::from_slice::<Reply>(&body)
        };
        match reply {
            Ok(Reply {
                error: Some(error), ..
            }) if !error.is_empty() => Err(DocumentError::Rejected(error)),
            Ok(reply) if status.is_success() => Ok(reply),
            Ok(_) => Err(DocumentError::Status(status.as_u16())),
            Err(_) if !status.is_success() => Err(DocumentError::Status(status.as_u16())),
            Err(err) => Err(DocumentError::Decode(err.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl DocumentClient for ReqwestDocumentClient {
    async fn upload(&self, path: &Path, filename: &str) -> Result<(), DocumentError> {
        let url = self.endpoint(UPLOAD_PATH)?;
        let bytes = tokio::fs::read(path).await.map_err(|err| DocumentError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        chat_info!("uploading {} ({} bytes)", filename, bytes.len());
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::read_reply(response).await.map(|_| ())
    }

    async fn list_files(&self) -> Result<Vec<RemoteFile>, DocumentError> {
        let url = self.endpoint(FILES_PATH)?;
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let files = Self::read_reply(response).await?.files.unwrap_or_default();
        chat_debug!("backend lists {} files", files.len());
        Ok(files)
    }

    async fn delete_file(&self, filename: &str) -> Result<(), DocumentError> {
        let url = self.endpoint(FILES_PATH)?;
        let body = serde_json::to_vec(&DeleteRequest { filename })
            .map_err(|err| DocumentError::Decode(err.to_string()))?;
        let response = self
            .client
            .delete(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::read_reply(response).await.map(|_| ())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> DocumentError {
    if err.is_timeout() {
        return DocumentError::Timeout;
    }
    DocumentError::Network(err.to_string())
}
