use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use ragchat_logging::{chat_debug, chat_info, chat_warn};

use crate::documents::{DocumentClient, DocumentSettings, ReqwestDocumentClient};
use crate::transport::{EventSink, ReconnectPolicy, TransportHandle};
use crate::{ClientFrame, EngineEvent, JobId, TransportError};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// `ws(s)://` address of the persistent connection.
    pub server_url: String,
    pub reconnect: ReconnectPolicy,
    pub documents: DocumentSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:5000/ws".to_string(),
            reconnect: ReconnectPolicy::default(),
            documents: DocumentSettings::default(),
        }
    }
}

enum EngineCommand {
    Connect,
    Send(ClientFrame),
    Upload {
        job_id: JobId,
        path: PathBuf,
        filename: String,
    },
    ListFiles,
    DeleteFile {
        filename: String,
    },
    Shutdown,
}

/// Owns the IO runtime on a background thread. Results arrive on the sink.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings, sink: Arc<dyn EventSink>) -> std::io::Result<Self> {
        let documents = ReqwestDocumentClient::new(settings.documents.clone())
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        Self::with_client(settings, Arc::new(documents), sink)
    }

    /// Uses the given document client instead of the HTTP one.
    pub fn with_client(
        settings: EngineSettings,
        documents: Arc<dyn DocumentClient>,
        sink: Arc<dyn EventSink>,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("ragchat-engine".to_string())
            .spawn(move || {
                let mut worker = Worker {
                    settings,
                    documents,
                    sink,
                    transport: None,
                };
                while let Ok(command) = cmd_rx.recv() {
                    if matches!(command, EngineCommand::Shutdown) {
                        break;
                    }
                    worker.handle(&runtime, command);
                }
                if let Some(transport) = worker.transport.take() {
                    runtime.block_on(transport.shutdown(SHUTDOWN_GRACE));
                }
                chat_debug!("engine thread stopped");
            })?;

        Ok(Self {
            cmd_tx,
            worker: Some(worker),
        })
    }

    pub fn connect(&self) {
        self.command(EngineCommand::Connect);
    }

    pub fn send(&self, frame: ClientFrame) {
        self.command(EngineCommand::Send(frame));
    }

    pub fn upload(&self, job_id: JobId, path: PathBuf, filename: impl Into<String>) {
        self.command(EngineCommand::Upload {
            job_id,
            path,
            filename: filename.into(),
        });
    }

    pub fn list_files(&self) {
        self.command(EngineCommand::ListFiles);
    }

    pub fn delete_file(&self, filename: impl Into<String>) {
        self.command(EngineCommand::DeleteFile {
            filename: filename.into(),
        });
    }

    fn command(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            chat_warn!("engine thread is gone; command dropped");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct Worker {
    settings: EngineSettings,
    documents: Arc<dyn DocumentClient>,
    sink: Arc<dyn EventSink>,
    transport: Option<TransportHandle>,
}

impl Worker {
    fn handle(&mut self, runtime: &tokio::runtime::Runtime, command: EngineCommand) {
        match command {
            EngineCommand::Connect => {
                if self
                    .transport
                    .as_ref()
                    .is_some_and(|transport| !transport.is_finished())
                {
                    chat_debug!("connect ignored; transport already running");
                    return;
                }
                chat_info!("starting transport for {}", self.settings.server_url);
                let _guard = runtime.enter();
                self.transport = Some(TransportHandle::spawn(
                    self.settings.server_url.clone(),
                    self.settings.reconnect.clone(),
                    self.sink.clone(),
                ));
            }
            EngineCommand::Send(frame) => {
                let request_id = frame.request_id();
                let result = match &self.transport {
                    Some(transport) => transport.send(frame),
                    None => Err(TransportError::NotConnected),
                };
                if let Err(error) = result {
                    chat_warn!("send failed: {}", error);
                    self.sink.emit(EngineEvent::SendFailed { request_id, error });
                }
            }
            EngineCommand::Upload {
                job_id,
                path,
                filename,
            } => {
                let documents = self.documents.clone();
                let sink = self.sink.clone();
                runtime.spawn(async move {
                    let result = documents.upload(&path, &filename).await;
                    sink.emit(EngineEvent::UploadCompleted { job_id, result });
                });
            }
            EngineCommand::ListFiles => {
                let documents = self.documents.clone();
                let sink = self.sink.clone();
                runtime.spawn(async move {
                    let result = documents.list_files().await;
                    sink.emit(EngineEvent::FilesListed(result));
                });
            }
            EngineCommand::DeleteFile { filename } => {
                let documents = self.documents.clone();
                let sink = self.sink.clone();
                runtime.spawn(async move {
                    let result = documents.delete_file(&filename).await;
                    sink.emit(EngineEvent::FileDeleted { filename, result });
                });
            }
            EngineCommand::Shutdown => {}
        }
    }
}
