// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sync session: optimistic local apply, FIFO outgoing queue, polling
//! receive loop.
//!
//! Two tasks share one context. The drain task submits queued
//! commands one at a time in enqueue order; a transport failure leaves the
//! head in place for the next pass. The poll task fetches everything past the
//! last sequence seen and applies it through the replica's lock, one command
//! per lock acquisition. The first empty batch ends the loading phase.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use trellis_app_core::prefs::SyncPrefs;
use trellis_proto::{ClientId, Command, ErrorPayload, GraphId, Operation};
use trellis_replica::{ApplyResult, Replica, ReplicaError};

use crate::transport::{RelayTransport, SubmitError, TransportError};

/// How a session participates in the shared graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Sends and receives; local edits keep history.
    #[default]
    Interactive,
    /// Read-only observer; stops polling once loaded.
    Silent,
    /// Read-only playback: loads superseded commands too and keeps history
    /// for every loaded command so undo/redo scrub through time.
    History,
}

impl SessionMode {
    const fn is_read_only(self) -> bool {
        !matches!(self, Self::Interactive)
    }

    const fn keeps_loaded_history(self) -> bool {
        matches!(self, Self::History)
    }
}

/// Notifications for UI collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Initial history fully applied. Sent once.
    GraphReady,
    /// Relay reachability changed.
    ConnectionChanged {
        /// Whether the last exchange succeeded.
        connected: bool,
    },
    /// A poll applied this many commands.
    CommandsApplied(usize),
    /// The relay refused a queued command; it was dropped.
    CommandRejected {
        /// The refused command.
        command: Command,
        /// The relay's reason.
        error: ErrorPayload,
    },
}

/// Errors returned by session calls.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The relay could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The replica refused the edit.
    #[error(transparent)]
    Replica(#[from] ReplicaError),
    /// Silent and history sessions do not publish edits.
    #[error("session is read-only")]
    ReadOnly,
    /// Local edits wait until the initial history is loaded.
    #[error("graph is still loading")]
    Loading,
}

// Shared by the session handle and its tasks.
struct SyncContext<T> {
    graph: GraphId,
    mode: SessionMode,
    transport: T,
    replica: Mutex<Replica>,
    outgoing: StdMutex<VecDeque<Command>>,
    loading: AtomicBool,
    last_seen: AtomicU64,
    connected: AtomicBool,
    last_contact: StdMutex<Instant>,
    events: mpsc::UnboundedSender<SyncEvent>,
    poll_interval: Duration,
    drain_interval: Duration,
}

impl<T: RelayTransport> SyncContext<T> {
    fn emit(&self, event: SyncEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }

    fn mark_contact(&self, ok: bool) {
        if ok {
            *self
                .last_contact
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Instant::now();
        }
        if self.connected.swap(ok, Ordering::AcqRel) != ok {
            if ok {
                info!(graph = self.graph, "relay reachable again");
            } else {
                warn!(graph = self.graph, "relay unreachable");
            }
            self.emit(SyncEvent::ConnectionChanged { connected: ok });
        }
    }

    fn enqueue(&self, commands: impl IntoIterator<Item = Command>) {
        self.outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(commands);
    }

    fn head(&self) -> Option<Command> {
        self.outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .front()
            .cloned()
    }

    fn pop_head(&self) {
        self.outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
    }

    /// Submits queued commands until the queue is empty or the relay fails.
    async fn drain_outgoing(&self) {
        while let Some(command) = self.head() {
            match self.transport.submit(self.graph, &command).await {
                Ok(sequence) => {
                    self.pop_head();
                    self.mark_contact(true);
                    debug!(sequence, %command, "command accepted");
                }
                Err(SubmitError::Rejected(error)) => {
                    self.pop_head();
                    self.mark_contact(true);
                    warn!(%command, code = %error.name, reason = %error.message, "command rejected");
                    self.emit(SyncEvent::CommandRejected { command, error });
                }
                Err(SubmitError::Transport(err)) => {
                    self.mark_contact(false);
                    debug!(%err, "submit failed; will retry");
                    return;
                }
            }
        }
    }

    /// One poll round. Returns false once polling should stop.
    async fn poll_once(&self) -> bool {
        let after = self.last_seen.load(Ordering::Acquire);
        let include_ineffective = self.mode.keeps_loaded_history();
        let batch = match self
            .transport
            .fetch(self.graph, after, include_ineffective)
            .await
        {
            Ok(batch) => batch,
            Err(err) => {
                self.mark_contact(false);
                debug!(%err, "poll failed; will retry");
                return true;
            }
        };
        self.mark_contact(true);

        if batch.is_empty() {
            if self.loading.swap(false, Ordering::AcqRel) {
                info!(graph = self.graph, after, "graph loaded");
                self.emit(SyncEvent::GraphReady);
            }
            return !self.mode.is_read_only();
        }

        let is_loading = self.loading.load(Ordering::Acquire);
        let keep_history = self.mode.keeps_loaded_history();
        let mut applied = 0usize;
        for wire in batch {
            let sequence = wire.id;
            match Command::from_wire(wire) {
                Ok(command) => {
                    let result = self
                        .replica
                        .lock()
                        .await
                        .apply(&command, is_loading, keep_history);
                    if result == ApplyResult::Applied {
                        applied += 1;
                    }
                }
                Err(err) => warn!(?sequence, %err, "relay sent a malformed command"),
            }
            if let Some(sequence) = sequence {
                self.last_seen.fetch_max(sequence, Ordering::AcqRel);
            }
        }
        if applied > 0 {
            self.emit(SyncEvent::CommandsApplied(applied));
        }
        true
    }
}

async fn drain_loop<T: RelayTransport>(ctx: Arc<SyncContext<T>>, mut shutdown: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(ctx.drain_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {}
        }
        ctx.drain_outgoing().await;
    }
}

async fn poll_loop<T: RelayTransport>(ctx: Arc<SyncContext<T>>, mut shutdown: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(ctx.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {}
        }
        if !ctx.poll_once().await {
            debug!(graph = ctx.graph, "read-only session loaded; polling stopped");
            break;
        }
    }
}

/// A client's live connection to one shared graph.
pub struct SyncSession<T> {
    ctx: Arc<SyncContext<T>>,
    client: ClientId,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T: RelayTransport> SyncSession<T> {
    /// Registers with the relay, then starts the drain and poll tasks.
    ///
    /// Must be called inside a tokio runtime. Returns the session and the
    /// receiver for its [`SyncEvent`]s.
    pub async fn open(
        transport: T,
        graph: GraphId,
        mode: SessionMode,
        prefs: &SyncPrefs,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SyncEvent>), SyncError> {
        let client = transport.register_client(graph).await?;
        info!(graph, %client, ?mode, "registered with relay");
        let (events, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(SyncContext {
            graph,
            mode,
            transport,
            replica: Mutex::new(Replica::new(client)),
            outgoing: StdMutex::new(VecDeque::new()),
            loading: AtomicBool::new(true),
            last_seen: AtomicU64::new(0),
            connected: AtomicBool::new(true),
            last_contact: StdMutex::new(Instant::now()),
            events,
            poll_interval: prefs.poll_interval(),
            drain_interval: prefs.drain_interval(),
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = vec![tokio::spawn(poll_loop(Arc::clone(&ctx), shutdown_rx.clone()))];
        if !mode.is_read_only() {
            tasks.push(tokio::spawn(drain_loop(Arc::clone(&ctx), shutdown_rx)));
        }
        Ok((
            Self {
                ctx,
                client,
                shutdown,
                tasks,
            },
            rx,
        ))
    }

    /// Client ID assigned by the relay.
    pub const fn client(&self) -> ClientId {
        self.client
    }

    /// Graph this session is attached to.
    pub fn graph(&self) -> GraphId {
        self.ctx.graph
    }

    /// Session mode.
    pub fn mode(&self) -> SessionMode {
        self.ctx.mode
    }

    /// True until the first empty poll.
    pub fn is_loading(&self) -> bool {
        self.ctx.loading.load(Ordering::Acquire)
    }

    /// Highest relay sequence number seen so far.
    pub fn last_seen(&self) -> u64 {
        self.ctx.last_seen.load(Ordering::Acquire)
    }

    /// Time since the last successful exchange; zero while connected.
    pub fn disconnected_for(&self) -> Duration {
        if self.ctx.connected.load(Ordering::Acquire) {
            return Duration::ZERO;
        }
        self.ctx
            .last_contact
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Commands applied locally but not yet accepted by the relay.
    pub fn pending(&self) -> usize {
        self.ctx
            .outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs `f` against the replica under the apply lock.
    pub async fn with_replica<R>(&self, f: impl FnOnce(&mut Replica) -> R) -> R {
        let mut replica = self.ctx.replica.lock().await;
        f(&mut replica)
    }

    /// Applies a local edit and queues it for the relay.
    pub async fn submit(&self, op: Operation) -> Result<Command, SyncError> {
        self.ensure_writable()?;
        let mut replica = self.ctx.replica.lock().await;
        let command = replica.apply_local(op, true)?;
        self.ctx.enqueue([command.clone()]);
        Ok(command)
    }

    /// Steps history back. Interactive sessions publish the complement.
    pub async fn undo(&self) -> Result<Vec<Command>, SyncError> {
        let mut replica = self.ctx.replica.lock().await;
        let commands = replica.undo()?;
        if !self.ctx.mode.is_read_only() {
            self.ctx.enqueue(commands.iter().cloned());
        }
        Ok(commands)
    }

    /// Steps history forward. Interactive sessions publish the command.
    pub async fn redo(&self) -> Result<Command, SyncError> {
        let mut replica = self.ctx.replica.lock().await;
        let command = replica.redo()?;
        if !self.ctx.mode.is_read_only() {
            self.ctx.enqueue([command.clone()]);
        }
        Ok(command)
    }

    fn ensure_writable(&self) -> Result<(), SyncError> {
        if self.ctx.mode.is_read_only() {
            return Err(SyncError::ReadOnly);
        }
        if self.is_loading() {
            return Err(SyncError::Loading);
        }
        Ok(())
    }

    /// Stops both tasks and returns the commands that never reached the
    /// relay. Stopping does not flush the queue.
    pub async fn stop(self) -> Vec<Command> {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(%err, "sync task ended abnormally");
            }
        }
        let unsent: Vec<Command> = self
            .ctx
            .outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if !unsent.is_empty() {
            warn!(count = unsent.len(), "session stopped with unsent commands");
        }
        unsent
    }
}
