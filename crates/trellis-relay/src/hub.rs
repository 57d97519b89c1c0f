// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Relay authority: registers clients, sequences accepted commands per graph
//! and serves them back in order.
//!
//! Every submission is validated against the schema table, then checked
//! against a relay-side replica so that commands whose references do not
//! resolve are refused before they get a sequence number.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, info};
use trellis_graph::GraphStore;
use trellis_proto::{
    ClientId, ClientRegisteredPayload, Command, CommandAcceptedPayload, CommandBatchPayload,
    CommandKind, ErrorPayload, FullId, GraphId, IdSlot, Message, Operation, ValidationError,
    WireCommand, BATCH_LIMIT,
};
use trellis_replica::{ApplyResult, Replica};

/// Namespace of the relay-side replica. Registration starts at 1, so no
/// client shares it and echo suppression never triggers.
const RELAY_NAMESPACE: ClientId = ClientId(0);

/// Why a submission or request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The origin is not registered for this graph.
    #[error("client {client} is not registered for graph {graph}")]
    AccessDenied {
        /// Claimed origin.
        client: ClientId,
        /// Target graph.
        graph: GraphId,
    },
    /// Schema failure.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// A referenced entity or bend index does not exist.
    #[error("{0} does not resolve against the current graph")]
    Unresolved(CommandKind),
    /// Insert of an ID that is already live.
    #[error("id {0} is already in use")]
    IdInUse(FullId),
    /// Explicit insert of an ID another client never created.
    #[error("id {0} was never created")]
    NeverCreated(FullId),
    /// Clients may not send server replies.
    #[error("unexpected request {0}")]
    UnexpectedRequest(&'static str),
}

impl RelayError {
    /// Stable error name sent to clients.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "E4002",
            Self::Invalid(err) => err.code(),
            Self::Unresolved(_) => "E4100",
            Self::IdInUse(_) => "E4101",
            Self::NeverCreated(_) => "E4102",
            Self::UnexpectedRequest(_) => "E4000",
        }
    }

    const fn class(&self) -> u32 {
        match self {
            Self::AccessDenied { .. } => 403,
            Self::Invalid(_) | Self::UnexpectedRequest(_) => 400,
            Self::Unresolved(_) | Self::IdInUse(_) | Self::NeverCreated(_) => 409,
        }
    }
}

impl From<&RelayError> for ErrorPayload {
    fn from(err: &RelayError) -> Self {
        Self::new(err.class(), err.code(), err.to_string())
    }
}

#[derive(Debug, Clone)]
struct LogEntry {
    command: Command,
    effective: bool,
}

/// One shared graph as the relay sees it.
#[derive(Debug)]
struct GraphLog {
    entries: Vec<LogEntry>,
    replica: Replica,
    /// Every vertex or edge ID ever accepted by an insert.
    minted: HashSet<FullId>,
    last_vertex_move: HashMap<FullId, usize>,
    last_bend_move: HashMap<(FullId, usize), usize>,
    last_camera: HashMap<CommandKind, usize>,
}

impl GraphLog {
    fn new() -> Self {
        let mut replica = Replica::new(RELAY_NAMESPACE);
        replica.set_receive_camera(true);
        // Selection commands must resolve too.
        replica.set_follow_selection(true);
        Self {
            entries: Vec::new(),
            replica,
            minted: HashSet::new(),
            last_vertex_move: HashMap::new(),
            last_bend_move: HashMap::new(),
            last_camera: HashMap::new(),
        }
    }

    fn check_insert(&self, slot: IdSlot, origin: ClientId) -> Result<Option<FullId>, RelayError> {
        let Some(id) = slot.resolve(origin) else {
            return Ok(None);
        };
        if self.replica.graph().contains_id(id) {
            return Err(RelayError::IdInUse(id));
        }
        if id.creator != origin && !self.minted.contains(&id) {
            return Err(RelayError::NeverCreated(id));
        }
        Ok(Some(id))
    }

    fn accept(&mut self, mut command: Command) -> Result<u64, RelayError> {
        command.validate()?;
        let op = Operation::decode(&command)?;
        let inserted = match op {
            Operation::InsertVertex { id, .. } | Operation::InsertEdge { id, .. } => {
                self.check_insert(id, command.origin)?
            }
            _ => None,
        };
        match self.replica.apply(&command, false, false) {
            ApplyResult::Applied | ApplyResult::Ignored | ApplyResult::EchoSuppressed => {}
            ApplyResult::Unresolved => return Err(RelayError::Unresolved(command.kind)),
            ApplyResult::Invalid(err) => return Err(err.into()),
        }
        // Events only matter to UIs.
        self.replica.drain_events();
        if let Some(id) = inserted {
            self.minted.insert(id);
        }

        let index = self.entries.len();
        let sequence = u64::try_from(index).map_or(u64::MAX, |i| i + 1);
        command.sequence = Some(sequence);
        self.compact(&op, command.kind, command.origin, index);
        self.entries.push(LogEntry {
            command,
            effective: true,
        });
        Ok(sequence)
    }

    /// Marks commands superseded by the one about to land at `index`.
    fn compact(&mut self, op: &Operation, kind: CommandKind, origin: ClientId, index: usize) {
        let superseded = match *op {
            Operation::MoveVertex { vertex, .. } => self.last_vertex_move.insert(vertex, index),
            Operation::MoveBend { edge, index: bend, .. } => {
                self.last_bend_move.insert((edge, bend), index)
            }
            Operation::BreakEdgeLine { edge, .. }
            | Operation::RemoveBend { edge, .. }
            | Operation::RemoveEdge { edge } => {
                self.last_bend_move.retain(|(e, _), _| *e != edge);
                None
            }
            Operation::InsertEdge { id, .. } => {
                if let Some(edge) = id.resolve(origin) {
                    self.last_bend_move.retain(|(e, _), _| *e != edge);
                }
                None
            }
            Operation::ChangeCameraPosition { .. } | Operation::ChangeCameraRotation { .. } => {
                self.last_camera.insert(kind, index)
            }
            _ => None,
        };
        if let Some(entry) = superseded.and_then(|i| self.entries.get_mut(i)) {
            entry.effective = false;
        }
    }

    fn after(&self, after: u64, include_ineffective: bool) -> Vec<WireCommand> {
        let start = usize::try_from(after).unwrap_or(usize::MAX);
        self.entries
            .get(start..)
            .unwrap_or_default()
            .iter()
            .filter(|e| include_ineffective || e.effective)
            .take(BATCH_LIMIT)
            .map(|e| e.command.to_wire())
            .collect()
    }
}

/// Relay state for all graphs.
#[derive(Debug, Default)]
pub struct RelayHub {
    next_client: u64,
    next_ts: u64,
    clients: HashMap<ClientId, GraphId>,
    graphs: HashMap<GraphId, GraphLog>,
}

impl RelayHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next reply timestamp.
    pub fn alloc_ts(&mut self) -> u64 {
        let t = self.next_ts;
        self.next_ts += 1;
        t
    }

    /// Hands out a client ID, unique across graphs.
    pub fn register_client(&mut self, graph: GraphId) -> ClientId {
        self.next_client += 1;
        let client = ClientId(self.next_client);
        self.clients.insert(client, graph);
        self.graphs.entry(graph).or_insert_with(GraphLog::new);
        info!(graph, %client, "client registered");
        client
    }

    /// Validates, resolves and sequences `command`.
    pub fn submit(&mut self, graph: GraphId, command: Command) -> Result<u64, RelayError> {
        if self.clients.get(&command.origin) != Some(&graph) {
            return Err(RelayError::AccessDenied {
                client: command.origin,
                graph,
            });
        }
        let log = self.graphs.entry(graph).or_insert_with(GraphLog::new);
        let sequence = log.accept(command)?;
        debug!(graph, sequence, "command sequenced");
        Ok(sequence)
    }

    /// Commands past `after`, at most [`BATCH_LIMIT`], in sequence order.
    pub fn commands(&self, graph: GraphId, after: u64, include_ineffective: bool) -> Vec<WireCommand> {
        self.graphs
            .get(&graph)
            .map(|log| log.after(after, include_ineffective))
            .unwrap_or_default()
    }

    /// Number of sequenced commands for `graph`.
    pub fn log_len(&self, graph: GraphId) -> usize {
        self.graphs.get(&graph).map_or(0, |log| log.entries.len())
    }

    /// The relay's view of `graph`.
    pub fn graph(&self, graph: GraphId) -> Option<&GraphStore> {
        self.graphs.get(&graph).map(|log| log.replica.graph())
    }

    /// Answers one request.
    pub fn handle_message(&mut self, msg: Message) -> Message {
        let result = match msg {
            Message::RegisterClient(p) => Ok(Message::ClientRegistered(ClientRegisteredPayload {
                client_id: self.register_client(p.graph_id),
            })),
            Message::SubmitCommand(p) => Command::from_wire(p.command)
                .map_err(RelayError::from)
                .and_then(|command| self.submit(p.graph_id, command))
                .map(|sequence| Message::CommandAccepted(CommandAcceptedPayload { sequence })),
            Message::GetCommands(p) => Ok(Message::CommandBatch(CommandBatchPayload {
                commands: self.commands(p.graph_id, p.after, p.include_ineffective),
            })),
            other => Err(RelayError::UnexpectedRequest(other.op_name())),
        };
        result.unwrap_or_else(|err| {
            debug!(%err, "request refused");
            Message::Error(ErrorPayload::from(&err))
        })
    }
}
