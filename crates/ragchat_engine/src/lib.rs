//! Ragchat engine: persistent connection, wire codec, and document channel.
mod codec;
mod documents;
mod engine;
mod transport;
mod types;

pub use codec::{decode_server, encode_client};
pub use documents::{DocumentClient, DocumentSettings, ReqwestDocumentClient};
pub use engine::{EngineHandle, EngineSettings};
pub use transport::{ChannelEventSink, EventSink, ReconnectPolicy, TransportHandle};
pub use types::{
    ClientFrame, CodecError, ConnectionEvent, DocumentError, EngineEvent, JobId, RemoteFile,
    ServerEvent, TransportError, WireChatResponse, WireStatus, WireStatusKind, WireSubStep,
    WireSubStepStatus, WireWorkflow,
};
