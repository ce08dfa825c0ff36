//! The engine: one worker thread driving the network node and router.
//!
//! The process owns exactly one `Engine`, constructed at the composition
//! root. `start` spawns a dedicated thread running a current-thread tokio
//! runtime; inside it, the swarm event loop and the command consumer share
//! a single `select!` loop, so they fail together. Callers on any thread
//! submit commands through a bounded queue that never blocks: when the
//! engine is not ready or the queue is full, the command is dropped with a
//! logged warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use messenger_core::MessengerConfig;
use messenger_network::{
    GossipRouter, Keypair, MessengerNode, NodeInfo, NodeSettings, PeerEventSink, UiSink, UserStore,
};

use crate::command::Command;

/// Bound on commands waiting for the engine thread.
pub const COMMAND_QUEUE_CAPACITY: usize = 100;

/// How often the event loop re-checks the running flag. Shutdown is
/// cooperative at this granularity.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Engine lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// External collaborators wired in at construction time.
#[derive(Clone)]
pub struct Collaborators {
    /// Peer lifecycle notifications from the transport node.
    pub peer_events: Arc<dyn PeerEventSink>,
    /// UI/session push channel for the gossip router.
    pub ui: Arc<dyn UiSink>,
    /// User/key persistence for `key_announce` handling.
    pub store: Arc<dyn UserStore>,
}

/// The process-wide network engine.
pub struct Engine {
    config: MessengerConfig,
    collaborators: Collaborators,
    /// Shared with the worker, which resets it to Stopped on exit.
    state: Arc<Mutex<EngineState>>,
    running: Arc<AtomicBool>,
    /// Cross-thread submission handle, present while running.
    command_tx: RwLock<Option<mpsc::Sender<Command>>>,
    /// Identity/address snapshot published by the worker.
    info: Arc<RwLock<Option<NodeInfo>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Create an engine. Nothing runs until [`Engine::start`].
    pub fn new(config: MessengerConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            state: Arc::new(Mutex::new(EngineState::Stopped)),
            running: Arc::new(AtomicBool::new(false)),
            command_tx: RwLock::new(None),
            info: Arc::new(RwLock::new(None)),
            worker: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap()
    }

    /// Start the worker thread. Idempotent: calling while Starting or
    /// Running is a logged no-op, so the process holds at most one engine.
    pub fn start(&self) {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                EngineState::Starting | EngineState::Running => {
                    tracing::warn!("engine already running");
                    return;
                }
                EngineState::Stopping => {
                    tracing::warn!("engine still stopping, start ignored");
                    return;
                }
                EngineState::Stopped => *state = EngineState::Starting,
            }
        }

        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        self.running.store(true, Ordering::SeqCst);
        *self.info.write().unwrap() = None;
        *self.command_tx.write().unwrap() = Some(command_tx);
        // Running is set before the spawn: a worker that fails fast resets
        // the state to Stopped itself, and must not be overwritten here.
        *self.state.lock().unwrap() = EngineState::Running;

        let config = self.config.clone();
        let collaborators = self.collaborators.clone();
        let running = self.running.clone();
        let state = self.state.clone();
        let info = self.info.clone();

        let spawned = std::thread::Builder::new()
            .name("messenger-engine".into())
            .spawn(move || worker_main(config, collaborators, running, state, info, command_rx));

        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap() = Some(handle);
                tracing::info!(port = self.config.listen_port, "engine started");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn engine worker");
                self.running.store(false, Ordering::SeqCst);
                *self.command_tx.write().unwrap() = None;
                *self.state.lock().unwrap() = EngineState::Stopped;
            }
        }
    }

    /// Stop the engine: flip the running flag and join the worker. The
    /// event loop exits on its next poll tick or channel wakeup.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state != EngineState::Running {
                tracing::warn!("engine not running, stop ignored");
                return;
            }
            *state = EngineState::Stopping;
        }

        self.running.store(false, Ordering::SeqCst);
        // Dropping the sender wakes the consumer immediately.
        *self.command_tx.write().unwrap() = None;

        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.join().is_err() {
                tracing::error!("engine worker panicked");
            }
        }

        *self.info.write().unwrap() = None;
        *self.state.lock().unwrap() = EngineState::Stopped;
        tracing::info!("engine stopped");
    }

    /// Queue a dial to `address` (full multiaddr with `/p2p/<peer>`).
    pub fn connect_to_peer(&self, address: &str) {
        self.submit(Command::Connect {
            address: address.to_owned(),
        });
    }

    /// Queue a room-wide chat broadcast.
    pub fn send_message(
        &self,
        sender: &str,
        content: &str,
        timestamp: Option<String>,
        encrypted: bool,
    ) {
        self.submit(Command::SendChat {
            sender: sender.to_owned(),
            content: content.to_owned(),
            timestamp,
            encrypted,
        });
    }

    /// Queue a direct message for `recipient` on whichever node hosts them.
    pub fn send_direct_message(
        &self,
        sender: &str,
        recipient: &str,
        content: &str,
        timestamp: Option<String>,
        encrypted: bool,
    ) {
        self.submit(Command::SendDirect {
            sender: sender.to_owned(),
            recipient: recipient.to_owned(),
            content: content.to_owned(),
            timestamp,
            encrypted,
        });
    }

    /// Queue a public-key announce for `username`.
    pub fn broadcast_public_key(&self, username: &str, public_key: &str) {
        self.submit(Command::BroadcastKey {
            username: username.to_owned(),
            public_key: public_key.to_owned(),
        });
    }

    /// Identity/address snapshot. `Some` once the worker has generated the
    /// node identity; addresses fill in as listeners come up.
    pub fn node_info(&self) -> Option<NodeInfo> {
        self.info.read().unwrap().clone()
    }

    /// Non-blocking enqueue. Engine-not-ready and queue-full are both
    /// logged drops; the caller is never blocked or failed.
    fn submit(&self, command: Command) {
        let guard = self.command_tx.read().unwrap();
        let Some(tx) = guard.as_ref() else {
            tracing::warn!(?command, "engine not ready, command dropped");
            return;
        };
        match tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                tracing::warn!(?command, "command queue full, command dropped");
            }
            Err(TrySendError::Closed(command)) => {
                tracing::warn!(?command, "engine worker gone, command dropped");
            }
        }
    }
}

/// Forwards peer lifecycle changes to both the host sink and the UI.
struct PeerEventFanout {
    peer_events: Arc<dyn PeerEventSink>,
    ui: Arc<dyn UiSink>,
}

impl PeerEventSink for PeerEventFanout {
    fn on_peer_connected(&self, peer_id: &messenger_network::PeerId) {
        self.peer_events.on_peer_connected(peer_id);
        self.ui.notify_peer_connected(&peer_id.to_string());
    }

    fn on_peer_disconnected(&self, peer_id: &messenger_network::PeerId) {
        self.peer_events.on_peer_disconnected(peer_id);
        self.ui.notify_peer_disconnected(&peer_id.to_string());
    }
}

/// Entry point of the dedicated worker thread.
fn worker_main(
    config: MessengerConfig,
    collaborators: Collaborators,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<EngineState>>,
    info: Arc<RwLock<Option<NodeInfo>>>,
    command_rx: mpsc::Receiver<Command>,
) {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => {
            runtime.block_on(run_engine(
                config,
                collaborators,
                running.clone(),
                info,
                command_rx,
            ));
        }
        Err(e) => tracing::error!(error = %e, "failed to build engine runtime"),
    }

    // Reset on every exit path, so a worker that died on its own (bind
    // failure, runtime failure) leaves the engine restartable.
    running.store(false, Ordering::SeqCst);
    *state.lock().unwrap() = EngineState::Stopped;
}

/// The engine event loop: swarm events, commands, and the stop tick share
/// one task, so a failure in either half takes the whole engine down.
async fn run_engine(
    config: MessengerConfig,
    collaborators: Collaborators,
    running: Arc<AtomicBool>,
    info: Arc<RwLock<Option<NodeInfo>>>,
    mut command_rx: mpsc::Receiver<Command>,
) {
    let keypair = Keypair::generate_ed25519();
    let peer_events = Arc::new(PeerEventFanout {
        peer_events: collaborators.peer_events.clone(),
        ui: collaborators.ui.clone(),
    });
    let mut node = MessengerNode::new(
        keypair,
        NodeSettings {
            listen_port: config.listen_port,
        },
        peer_events,
    );
    let mut router = GossipRouter::new(
        collaborators.ui.clone(),
        collaborators.store.clone(),
        config.seen_cache_capacity,
    );

    if let Err(e) = node.start() {
        tracing::error!(error = %e, "failed to start transport node");
        running.store(false, Ordering::SeqCst);
        return;
    }

    // Identity is valid from here; listener addresses arrive as events.
    *info.write().unwrap() = Some(node.info());

    for address in &config.bootstrap_peers {
        if address.is_empty() {
            continue;
        }
        if let Err(e) = node.connect(address) {
            tracing::warn!(%address, error = %e, "bootstrap dial failed");
        }
    }

    let mut tick = tokio::time::interval(POLL_INTERVAL);
    tracing::info!(peer_id = %node.local_peer_id(), "engine event loop started");

    loop {
        tokio::select! {
            event = node.next_event() => {
                node.handle_swarm_event(event, &mut router);
                *info.write().unwrap() = Some(node.info());
            }
            command = command_rx.recv() => match command {
                Some(command) => dispatch(&mut node, &mut router, command),
                None => {
                    tracing::info!("command channel closed, engine exiting");
                    break;
                }
            },
            _ = tick.tick() => {
                if !running.load(Ordering::SeqCst) {
                    tracing::info!("engine stop requested");
                    break;
                }
            }
        }
    }

    node.stop();
}

/// Execute one queued command on the engine thread. This is the only
/// place that touches the node's and router's mutable state.
fn dispatch(node: &mut MessengerNode, router: &mut GossipRouter, command: Command) {
    match command {
        Command::Connect { address } => {
            if let Err(e) = node.connect(&address) {
                tracing::warn!(%address, error = %e, "connect command failed");
            }
        }
        Command::SendChat {
            sender,
            content,
            timestamp,
            encrypted,
        } => {
            if let Err(e) = router.send_chat(node, &sender, &content, timestamp, encrypted) {
                tracing::warn!(%sender, error = %e, "chat broadcast failed");
            }
        }
        Command::SendDirect {
            sender,
            recipient,
            content,
            timestamp,
            encrypted,
        } => {
            let sent = router.send_direct(node, &sender, &recipient, &content, timestamp, encrypted);
            if let Err(e) = sent {
                tracing::warn!(%sender, %recipient, error = %e, "direct message broadcast failed");
            }
        }
        Command::BroadcastKey {
            username,
            public_key,
        } => {
            if let Err(e) = router.announce_key(node, &username, &public_key) {
                tracing::warn!(%username, error = %e, "key announce failed");
            }
        }
    }
}
