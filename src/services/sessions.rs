use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::CallSession;

/// Live call sessions keyed by call SID.
pub trait SessionStore: Send + Sync {
    fn get(&self, call_sid: &str) -> Option<CallSession>;
    fn set(&self, call_sid: &str, session: CallSession);
    fn delete(&self, call_sid: &str) -> Option<CallSession>;
}

/// Process-local store. Sessions do not survive a restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, CallSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, call_sid: &str) -> Option<CallSession> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(call_sid).cloned()
    }

    fn set(&self, call_sid: &str, session: CallSession) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(call_sid.to_string(), session);
    }

    fn delete(&self, call_sid: &str) -> Option<CallSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(call_sid)
    }
}
