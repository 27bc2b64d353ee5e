use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use ragchat_engine::{
    ChannelEventSink, ClientFrame, DocumentClient, DocumentError, EngineEvent, EngineHandle,
    EngineSettings, RemoteFile, TransportError,
};

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    ragchat_logging::initialize_for_tests();
}

#[derive(Default)]
struct FakeDocuments {
    uploads: Mutex<Vec<(PathBuf, String)>>,
}

#[async_trait::async_trait]
impl DocumentClient for FakeDocuments {
    async fn upload(&self, path: &Path, filename: &str) -> Result<(), DocumentError> {
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), filename.to_string()));
        if filename.ends_with(".bad") {
            Err(DocumentError::Rejected("Unsupported file".to_string()))
        } else {
            Ok(())
        }
    }

    async fn list_files(&self) -> Result<Vec<RemoteFile>, DocumentError> {
        Ok(vec![RemoteFile {
            name: "a.pdf".to_string(),
            size: 10,
            modified: String::new(),
        }])
    }

    async fn delete_file(&self, _filename: &str) -> Result<(), DocumentError> {
        Err(DocumentError::Status(404))
    }
}

fn engine() -> (EngineHandle, Arc<FakeDocuments>, mpsc::Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel();
    let documents = Arc::new(FakeDocuments::default());
    let handle = EngineHandle::with_client(
        EngineSettings::default(),
        documents.clone(),
        Arc::new(ChannelEventSink::new(tx)),
    )
    .expect("engine");
    (handle, documents, rx)
}

#[test]
fn send_without_connection_fails_fast() {
    init_logging();
    let (engine, _documents, rx) = engine();
    engine.send(ClientFrame::ChatMessage {
        request_id: 4,
        session_id: "session_e".to_string(),
        message: "hi".to_string(),
    });
    assert_eq!(
        rx.recv_timeout(WAIT).expect("event"),
        EngineEvent::SendFailed {
            request_id: Some(4),
            error: TransportError::NotConnected,
        }
    );
}

#[test]
fn document_commands_report_results() {
    init_logging();
    let (engine, documents, rx) = engine();

    engine.upload(3, PathBuf::from("/tmp/report.bad"), "report.bad");
    assert_eq!(
        rx.recv_timeout(WAIT).expect("upload event"),
        EngineEvent::UploadCompleted {
            job_id: 3,
            result: Err(DocumentError::Rejected("Unsupported file".to_string())),
        }
    );
    assert_eq!(documents.uploads.lock().unwrap().len(), 1);

    engine.list_files();
    match rx.recv_timeout(WAIT).expect("list event") {
        EngineEvent::FilesListed(Ok(files)) => assert_eq!(files.len(), 1),
        other => panic!("unexpected event {other:?}"),
    }

    engine.delete_file("a.pdf");
    assert_eq!(
        rx.recv_timeout(WAIT).expect("delete event"),
        EngineEvent::FileDeleted {
            filename: "a.pdf".to_string(),
            result: Err(DocumentError::Status(404)),
        }
    );
}
