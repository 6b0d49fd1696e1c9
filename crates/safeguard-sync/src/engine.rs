//! The policy engine task.
//!
//! One spawned task owns the policy store, the recency list, the signing
//! key and the observer registry; everything else talks to it over
//! channels. Events (an intercepted request, an observer message, an
//! interstitial handshake) are handled one at a time in arrival order,
//! so no locking is needed and every observer sees mutations in the
//! order they were applied.
//!
//! The persisted policy sets are loaded *before* the event loop starts.
//! Commands sent earlier queue in the channel behind that load; a
//! storage failure aborts startup instead of serving an empty policy.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use safeguard_core::classifier::{PageUrls, RequestClassifier, RequestDescriptor, Verdict};
use safeguard_core::policy::{Classification, Hostname, PolicyDelta, PolicyStore};
use safeguard_core::recent::RecentHistory;
use safeguard_core::ticket::RedirectAuthenticator;
use safeguard_storage::Database;

use crate::protocol::{ClientMessage, HandshakeMessage, RecentEntry, ServerMessage, TabCommand};

/// Identifies one observer connection in the registry.
pub type ConnectionId = u64;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Loading the persisted policy failed; startup must not proceed.
    #[error("storage error: {0}")]
    Storage(#[from] safeguard_storage::StorageError),

    /// The engine task is gone.
    #[error("engine is not running")]
    Stopped,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

enum Command {
    Classify {
        request: RequestDescriptor,
        reply: oneshot::Sender<Verdict>,
    },
    Connect {
        outbound: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Message {
        id: ConnectionId,
        message: ClientMessage,
    },
    Disconnect {
        id: ConnectionId,
    },
    Handshake {
        message: HandshakeMessage,
    },
}

/// Cloneable handle used by transports to reach the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    /// Classifies one intercepted request.
    pub async fn classify(&self, request: RequestDescriptor) -> Result<Verdict> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Classify { request, reply })
            .map_err(|_| EngineError::Stopped)?;
        response.await.map_err(|_| EngineError::Stopped)
    }

    /// Registers an observer connection.
    ///
    /// The connection is not in the broadcast set until it sends a
    /// `state` message. Dropping the returned connection (or the engine
    /// dropping `outbound`) ends it.
    pub async fn connect(
        &self,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<SyncConnection> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Connect { outbound, reply })
            .map_err(|_| EngineError::Stopped)?;
        let id = response.await.map_err(|_| EngineError::Stopped)?;

        Ok(SyncConnection {
            id,
            commands: self.commands.clone(),
        })
    }

    /// Delivers an interstitial handshake. Never produces a reply.
    pub fn handshake(&self, message: HandshakeMessage) -> Result<()> {
        self.commands
            .send(Command::Handshake { message })
            .map_err(|_| EngineError::Stopped)
    }
}

/// One observer connection, as seen by its transport task.
pub struct SyncConnection {
    id: ConnectionId,
    commands: mpsc::UnboundedSender<Command>,
}

impl SyncConnection {
    /// Returns the connection's registry id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Forwards one inbound observer message to the engine.
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        self.commands
            .send(Command::Message {
                id: self.id,
                message,
            })
            .map_err(|_| EngineError::Stopped)
    }
}

impl Drop for SyncConnection {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Disconnect { id: self.id });
    }
}

struct Observer {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    subscribed: bool,
}

/// The engine task state. Constructed via [`Engine::spawn`].
pub struct Engine {
    policy: PolicyStore,
    recent: RecentHistory,
    authenticator: RedirectAuthenticator,
    classifier: RequestClassifier,
    db: Database,
    observers: HashMap<ConnectionId, Observer>,
    next_connection_id: ConnectionId,
    tab_commands: mpsc::UnboundedSender<TabCommand>,
}

impl Engine {
    /// Loads the persisted policy and spawns the engine task.
    ///
    /// Returns an error if the snapshot cannot be read — the system must
    /// not run as if no hostname had ever been allowed.
    pub fn spawn(
        db: Database,
        pages: PageUrls,
        tab_commands: mpsc::UnboundedSender<TabCommand>,
    ) -> Result<EngineHandle> {
        let snapshot = db.load_policy()?;
        info!(
            allow = snapshot.allow.len(),
            redirect = snapshot.redirect.len(),
            "loaded policy snapshot"
        );

        let engine = Self {
            policy: PolicyStore::from_snapshot(snapshot),
            recent: RecentHistory::new(),
            authenticator: RedirectAuthenticator::new(),
            classifier: RequestClassifier::new(pages),
            db,
            observers: HashMap::new(),
            next_connection_id: 0,
            tab_commands,
        };

        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(engine.run(receiver));

        Ok(EngineHandle { commands })
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("engine running");
        while let Some(command) = commands.recv().await {
            self.handle_command(command);
        }
        debug!("engine stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Classify { request, reply } => {
                let verdict = self.classifier.classify(
                    &mut self.policy,
                    &mut self.recent,
                    &self.authenticator,
                    &request,
                );
                let _ = reply.send(verdict);
            }
            Command::Connect { outbound, reply } => {
                let id = self.next_connection_id;
                self.next_connection_id += 1;
                self.observers.insert(
                    id,
                    Observer {
                        outbound,
                        subscribed: false,
                    },
                );
                let _ = reply.send(id);
            }
            Command::Message { id, message } => self.handle_message(id, message),
            Command::Disconnect { id } => {
                self.observers.remove(&id);
            }
            Command::Handshake { message } => self.handle_handshake(message),
        }
    }

    fn handle_message(&mut self, id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::State => {
                let snapshot = self.policy.snapshot();
                if let Some(observer) = self.observers.get_mut(&id) {
                    observer.subscribed = true;
                    let _ = observer.outbound.send(ServerMessage::State {
                        allow: snapshot.allow,
                        redirect: snapshot.redirect,
                    });
                }
            }
            ClientMessage::Recent => {
                let recent = self
                    .recent
                    .iter()
                    .map(|hostname| RecentEntry {
                        hostname: hostname.to_string(),
                        state: self.policy.classify(hostname),
                    })
                    .collect();
                self.send_to(id, ServerMessage::Recent { recent });
            }
            ClientMessage::ClearRecent => self.recent.clear(),
            ClientMessage::Check { hostname } => {
                let hostname = Hostname::new(hostname);
                if self.policy.classify(&hostname) != Classification::Block {
                    self.send_to(id, ServerMessage::Exists);
                    // Done: dropping the entry closes the connection.
                    self.observers.remove(&id);
                }
            }
            ClientMessage::Allow { hostnames } => {
                let delta = self.policy.set_allow(&to_hostnames(&hostnames));
                self.persist(delta);
                self.broadcast(ServerMessage::Allow { hostnames });
            }
            ClientMessage::Redirect { hostnames } => {
                let delta = self.policy.set_redirect(&to_hostnames(&hostnames));
                self.persist(delta);
                self.broadcast(ServerMessage::Redirect { hostnames });
            }
            ClientMessage::Block { hostnames } => {
                let delta = self.policy.clear(&to_hostnames(&hostnames));
                self.persist(delta);
                self.broadcast(ServerMessage::Block { hostnames });
            }
            ClientMessage::AllowTemporary { url } => {
                // Ephemeral and single-process: neither persisted nor broadcast.
                self.policy.allow_temporary(url);
            }
        }
    }

    fn handle_handshake(&mut self, message: HandshakeMessage) {
        if !self.authenticator.verify(&message.url, &message.hmac) {
            // Forgery or tampering; nothing is surfaced to the requester.
            debug!(url = %message.url, "handshake verification failed");
            return;
        }

        let url = self.classifier.blocked_url(&message.url);
        let _ = self.tab_commands.send(TabCommand::Navigate {
            tab_id: message.tab_id,
            url,
        });
    }

    /// Writes back the sets a mutation changed, before it is broadcast.
    fn persist(&mut self, delta: PolicyDelta) {
        if !delta.any() {
            return;
        }

        let update = self.policy.update_for(delta);
        if let Err(error) = self.db.save_policy(&update) {
            // Fire-and-forget: retry and durability belong to storage.
            warn!(%error, "failed to persist policy update");
        }
    }

    fn broadcast(&mut self, message: ServerMessage) {
        self.observers.retain(|_, observer| {
            if !observer.subscribed {
                return true;
            }
            observer.outbound.send(message.clone()).is_ok()
        });
    }

    fn send_to(&mut self, id: ConnectionId, message: ServerMessage) {
        if let Some(observer) = self.observers.get(&id) {
            if observer.outbound.send(message).is_err() {
                self.observers.remove(&id);
            }
        }
    }
}

fn to_hostnames(hostnames: &[String]) -> Vec<Hostname> {
    hostnames.iter().map(Hostname::new).collect()
}
