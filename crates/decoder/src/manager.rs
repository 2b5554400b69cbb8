//! Session manager — opens and tracks libde265 decoder sessions.
//!
//! The `DecoderManager` handles:
//! - Loading libde265 (once, shared across all sessions)
//! - Opening a session per stream, keyed by `SessionId`
//! - Closing sessions individually or all at once
//! - Reporting a missing library instead of failing to link

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use hs_common::{DecoderHost, InputFormat, SessionConfig, SessionError, SessionId};

use crate::de265::{De265Engine, De265Library};
use crate::session::{DecoderSession, SessionStats};

/// Session type the manager hands out.
pub type De265Session<H> = DecoderSession<De265Engine, H>;

/// Owns every open session of one host pipeline.
pub struct DecoderManager<H: DecoderHost> {
    /// Shared libde265 handle (None if loading failed).
    library: Option<Arc<De265Library>>,
    /// Error message if libde265 failed to load.
    load_error: Option<String>,
    config: SessionConfig,
    sessions: HashMap<SessionId, De265Session<H>>,
}

impl<H: DecoderHost> std::fmt::Debug for DecoderManager<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderManager")
            .field("available", &self.is_available())
            .field("active_sessions", &self.sessions.len())
            .field("load_error", &self.load_error)
            .finish()
    }
}

impl<H: DecoderHost> DecoderManager<H> {
    /// Create a manager, loading libde265 from the system search path.
    ///
    /// If loading fails the manager still exists, but every `open_session`
    /// reports `LibraryUnavailable`.
    pub fn new(config: SessionConfig) -> Self {
        match De265Library::load() {
            Ok(lib) => {
                info!(version = %lib.version(), "libde265 loaded successfully");
                Self::with_library(Arc::new(lib), config)
            }
            Err(e) => {
                warn!(error = %e, "libde265 not available, decoding disabled");
                Self::unavailable(e.to_string(), config)
            }
        }
    }

    /// Create a manager around an already loaded library.
    pub fn with_library(library: Arc<De265Library>, config: SessionConfig) -> Self {
        Self {
            library: Some(library),
            load_error: None,
            config,
            sessions: HashMap::new(),
        }
    }

    /// Create a manager that cannot open sessions, remembering why.
    pub fn unavailable(reason: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            library: None,
            load_error: Some(reason.into()),
            config,
            sessions: HashMap::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.library.is_some()
    }

    /// Get the error message if libde265 failed to load.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session for `id`, replacing (and closing) any session already under that id.
    ///
    /// # Errors
    /// `LibraryUnavailable` if libde265 is not loaded, otherwise whatever
    /// [`DecoderSession::open`] reports.
    pub fn open_session(
        &mut self,
        id: SessionId,
        host: H,
        input: &InputFormat,
    ) -> Result<&mut De265Session<H>, SessionError> {
        let lib = self.library.as_ref().ok_or_else(|| {
            SessionError::LibraryUnavailable(
                self.load_error
                    .clone()
                    .unwrap_or_else(|| "libde265 not loaded".to_string()),
            )
        })?;

        let session =
            DecoderSession::with_library(lib.clone(), host, input, self.config.clone())?;
        info!(id = %id, codec = input.codec.display_name(), "Opened decoder session");

        match self.sessions.entry(id) {
            Entry::Occupied(mut entry) => {
                warn!(id = %entry.key(), "Replacing open decoder session");
                entry.insert(session).close();
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(session)),
        }
    }

    pub fn session(&mut self, id: &SessionId) -> Option<&mut De265Session<H>> {
        self.sessions.get_mut(id)
    }

    pub fn session_ref(&self, id: &SessionId) -> Option<&De265Session<H>> {
        self.sessions.get(id)
    }

    /// Close one session, returning its final statistics.
    pub fn close_session(&mut self, id: &SessionId) -> Option<SessionStats> {
        let stats = self.sessions.remove(id).map(DecoderSession::close);
        if stats.is_some() {
            info!(id = %id, "Closed decoder session");
        }
        stats
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Close every open session.
    pub fn close_all(&mut self) {
        let count = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            session.close();
        }
        if count > 0 {
            info!(count, "Closed all decoder sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHost;
    use hs_common::{Resolution, VideoCodec};

    #[test]
    fn unavailable_manager_reports_reason() {
        let mut manager: DecoderManager<MockHost> =
            DecoderManager::unavailable("no libde265 here", SessionConfig::default());
        assert!(!manager.is_available());
        assert_eq!(manager.load_error(), Some("no libde265 here"));

        let err = manager
            .open_session(
                SessionId::new("cam0"),
                MockHost::new(),
                &InputFormat::hevc(Resolution::HD),
            )
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::LibraryUnavailable("no libde265 here".to_string())
        );
        assert_eq!(manager.active_session_count(), 0);
    }

    #[test]
    fn manager_creation_without_library() {
        // On machines without libde265 the manager is still created.
        let manager: DecoderManager<MockHost> = DecoderManager::new(SessionConfig::default());
        assert_eq!(manager.active_session_count(), 0);
        assert_eq!(manager.is_available(), manager.load_error().is_none());
    }

    #[test]
    fn close_unknown_session_is_none() {
        let mut manager: DecoderManager<MockHost> =
            DecoderManager::unavailable("n/a", SessionConfig::default());
        assert!(manager.close_session(&SessionId::new("missing")).is_none());
        manager.close_all();
    }

    #[test]
    #[ignore = "requires libde265"]
    fn open_and_close_with_real_library() {
        let mut manager: DecoderManager<MockHost> = DecoderManager::new(SessionConfig::default());
        assert!(manager.is_available(), "{:?}", manager.load_error());

        let id = SessionId::new("stream");
        manager
            .open_session(id.clone(), MockHost::new(), &InputFormat::hevc(Resolution::HD))
            .unwrap();
        assert_eq!(manager.active_session_count(), 1);

        let err = manager
            .open_session(
                SessionId::new("avc"),
                MockHost::new(),
                &InputFormat {
                    codec: VideoCodec::H264,
                    ..InputFormat::hevc(Resolution::HD)
                },
            )
            .unwrap_err();
        assert_eq!(err, SessionError::UnsupportedCodec(VideoCodec::H264));

        let stats = manager.close_session(&id).unwrap();
        assert_eq!(stats.pictures_emitted, 0);
        assert_eq!(manager.active_session_count(), 0);
    }
}
