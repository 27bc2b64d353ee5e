/// Identity of one client process, stamped on every outgoing chat message.
///
/// The platform creates exactly one per start-up; the core never mints or
/// replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    session_id: String,
    created_at: String,
}

impl Session {
    pub fn new(session_id: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: created_at.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// RFC 3339 creation timestamp.
    pub fn created_at(&self) -> &str {
        &self.created_at
    }
}
