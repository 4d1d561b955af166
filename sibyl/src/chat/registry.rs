//! Session registry: ownership, ordering, and idle reaping
//!
//! One [`ChatSession`] per connected client, each behind its own mutex so
//! messages within a session are processed strictly one at a time. Across
//! sessions there is no ordering guarantee. The hourly reaper is the only
//! teardown path besides an explicit `teardown` call; shared services are
//! never torn down here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Result, SibylError};
use crate::llm::Turn;
use crate::services::Services;

use super::session::{ChatConfig, ChatSession};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How often the reaper wakes up
    pub reap_interval: Duration,

    /// Inactivity threshold after which a session is removed
    pub idle_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reap_interval: Duration::from_secs(3600),
            idle_timeout: Duration::from_secs(7200),
        }
    }
}

struct SessionSlot {
    session: Arc<Mutex<ChatSession>>,
    last_activity: Instant,
}

/// Owner of all per-client conversation state.
pub struct SessionRegistry {
    services: Arc<Services>,
    chat_config: ChatConfig,
    config: RegistryConfig,
    sessions: RwLock<HashMap<String, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new(services: Arc<Services>) -> Arc<Self> {
        Self::with_config(services, ChatConfig::default(), RegistryConfig::default())
    }

    pub fn with_config(
        services: Arc<Services>,
        chat_config: ChatConfig,
        config: RegistryConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            services,
            chat_config,
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Ensure a session exists for the client. Reconnecting clients keep
    /// their existing history.
    pub async fn create_session(&self, client_id: &str) {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(client_id) {
            Some(slot) => {
                slot.last_activity = Instant::now();
                info!("client {} reattached to existing session", client_id);
            }
            None => {
                sessions.insert(
                    client_id.to_string(),
                    SessionSlot {
                        session: Arc::new(Mutex::new(ChatSession::with_config(
                            self.services.clone(),
                            self.chat_config.clone(),
                        ))),
                        last_activity: Instant::now(),
                    },
                );
                info!("created session for client {}", client_id);
            }
        }
    }

    /// Route a message to its session and return the reply. Holding the
    /// session mutex across the whole pipeline is what serializes messages
    /// within a session.
    pub async fn handle_message(&self, client_id: &str, text: &str) -> Result<String> {
        let session = self.session_for(client_id).await?;
        let mut guard = session.lock().await;
        Ok(guard.process_message(text).await)
    }

    /// Full conversation history for display.
    pub async fn history(&self, client_id: &str) -> Result<Vec<Turn>> {
        let session = self.session_for(client_id).await?;
        let guard = session.lock().await;
        Ok(guard.history().to_vec())
    }

    /// Clear a session's history, leaving shared caches untouched.
    pub async fn clear_history(&self, client_id: &str) -> Result<()> {
        let session = self.session_for(client_id).await?;
        let mut guard = session.lock().await;
        guard.clear_history();
        Ok(())
    }

    /// Drop a session entirely. Returns whether it existed.
    pub async fn teardown(&self, client_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(client_id).is_some();
        if removed {
            info!("tore down session for client {}", client_id);
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove sessions idle longer than the configured threshold.
    pub async fn reap_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let idle_timeout = self.config.idle_timeout;

        sessions.retain(|client_id, slot| {
            let keep = slot.last_activity.elapsed() < idle_timeout;
            if !keep {
                info!("reaping idle session for client {}", client_id);
            }
            keep
        });

        before - sessions.len()
    }

    /// Spawn the periodic idle-session sweep.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = self.clone();
        let interval = registry.config.reap_interval;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let reaped = registry.reap_idle().await;
                if reaped > 0 {
                    debug!("reaper removed {} idle sessions", reaped);
                }
            }
        })
    }

    async fn session_for(&self, client_id: &str) -> Result<Arc<Mutex<ChatSession>>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(client_id) {
            Some(slot) => {
                slot.last_activity = Instant::now();
                Ok(slot.session.clone())
            }
            None => Err(SibylError::UnknownSession(client_id.to_string())),
        }
    }
}
