// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use trellis_app_core::prefs::SyncPrefs;
use trellis_proto::{
    ClientId, Command, CommandKind, ErrorPayload, FullId, GraphId, IdSlot, Operation, Vec3,
    WireCommand, BATCH_LIMIT,
};
use trellis_sync::{
    RelayTransport, SessionMode, SubmitError, SyncError, SyncEvent, SyncSession, TransportError,
};

const GRAPH: GraphId = 1;

#[derive(Default)]
struct RelayState {
    next_client: u64,
    log: Vec<WireCommand>,
    offline: bool,
    reject: Option<CommandKind>,
    saw_include_ineffective: bool,
}

/// In-memory relay: sequences every accepted command, can go offline or
/// refuse one command kind.
#[derive(Clone, Default)]
struct MockRelay {
    state: Arc<Mutex<RelayState>>,
}

impl MockRelay {
    fn seed(&self, op: Operation, origin: ClientId) {
        let mut state = self.state.lock().unwrap();
        let mut wire = op.into_command(origin).to_wire();
        wire.id = Some(u64::try_from(state.log.len()).unwrap() + 1);
        state.log.push(wire);
    }

    fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    fn log_len(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    fn logged(&self) -> Vec<Command> {
        let state = self.state.lock().unwrap();
        state
            .log
            .iter()
            .cloned()
            .map(|w| Command::from_wire(w).unwrap())
            .collect()
    }
}

impl RelayTransport for MockRelay {
    async fn register_client(&self, _graph: GraphId) -> Result<ClientId, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.next_client += 1;
        Ok(ClientId(state.next_client))
    }

    async fn submit(&self, _graph: GraphId, command: &Command) -> Result<u64, SubmitError> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(TransportError::Closed.into());
        }
        if state.reject == Some(command.kind) {
            return Err(SubmitError::Rejected(ErrorPayload::new(
                409,
                "E4100",
                "target does not exist",
            )));
        }
        let sequence = u64::try_from(state.log.len()).unwrap() + 1;
        let mut wire = command.to_wire();
        wire.id = Some(sequence);
        state.log.push(wire);
        Ok(sequence)
    }

    async fn fetch(
        &self,
        _graph: GraphId,
        after: u64,
        include_ineffective: bool,
    ) -> Result<Vec<WireCommand>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(TransportError::Closed);
        }
        state.saw_include_ineffective |= include_ineffective;
        Ok(state
            .log
            .iter()
            .filter(|w| w.id.unwrap() > after)
            .take(BATCH_LIMIT)
            .cloned()
            .collect())
    }
}

fn fast_prefs() -> SyncPrefs {
    SyncPrefs {
        poll_interval_ms: 5,
        drain_interval_ms: 5,
        socket_path: None,
    }
}

fn insert_at(x: f64) -> Operation {
    Operation::InsertVertex {
        id: IdSlot::Allocate,
        position: Vec3::new(x, 0.0, 0.0),
    }
}

fn insert_numbered(counter: u64, x: f64) -> Operation {
    Operation::InsertVertex {
        id: IdSlot::Counter(counter),
        position: Vec3::new(x, 0.0, 0.0),
    }
}

async fn wait_for(
    rx: &mut UnboundedReceiver<SyncEvent>,
    pred: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event did not arrive")
}

async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition never held");
}

async fn open_ready(
    relay: &MockRelay,
    mode: SessionMode,
) -> (SyncSession<MockRelay>, UnboundedReceiver<SyncEvent>) {
    let (session, mut rx) = SyncSession::open(relay.clone(), GRAPH, mode, &fast_prefs())
        .await
        .unwrap();
    wait_for(&mut rx, |e| *e == SyncEvent::GraphReady).await;
    (session, rx)
}

#[tokio::test]
async fn submissions_reach_the_relay_in_fifo_order() {
    let relay = MockRelay::default();
    let (session, _rx) = open_ready(&relay, SessionMode::Interactive).await;
    for x in [1.0, 2.0, 3.0] {
        session.submit(insert_at(x)).await.unwrap();
    }
    wait_until(|| relay.log_len() == 3).await;
    let counters: Vec<String> = relay
        .logged()
        .iter()
        .map(|c| c.param(0).to_owned())
        .collect();
    assert_eq!(counters, ["1", "2", "3"]);
    assert_eq!(session.pending(), 0);
    assert!(session.stop().await.is_empty());
}

#[tokio::test]
async fn loading_replays_own_commands_and_reseeds_ids() {
    let relay = MockRelay::default();
    relay.seed(insert_numbered(1, 0.0), ClientId(1));
    relay.seed(insert_numbered(2, 4.0), ClientId(1));

    let (session, mut rx) = SyncSession::open(relay.clone(), GRAPH, SessionMode::Interactive, &fast_prefs())
        .await
        .unwrap();
    assert_eq!(session.client(), ClientId(1));
    assert!(session.is_loading());
    assert!(matches!(
        session.submit(insert_at(9.0)).await,
        Err(SyncError::Loading)
    ));

    wait_for(&mut rx, |e| *e == SyncEvent::GraphReady).await;
    assert!(!session.is_loading());
    assert_eq!(session.last_seen(), 2);
    let count = session.with_replica(|r| r.graph().vertices().count()).await;
    assert_eq!(count, 2);

    let fresh = session.submit(insert_at(9.0)).await.unwrap();
    assert_eq!(fresh.param(0), "3");
    wait_until(|| relay.log_len() == 3).await;
    session.stop().await;
}

#[tokio::test]
async fn own_echo_after_loading_is_not_applied_twice() {
    let relay = MockRelay::default();
    let (session, mut rx) = open_ready(&relay, SessionMode::Interactive).await;
    session.submit(insert_at(1.0)).await.unwrap();
    wait_until(|| relay.log_len() == 1).await;
    wait_until(|| session.last_seen() == 1).await;
    let count = session.with_replica(|r| r.graph().vertices().count()).await;
    assert_eq!(count, 1);
    session.stop().await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, SyncEvent::CommandsApplied(_)));
    }
}

#[tokio::test]
async fn offline_commands_wait_and_go_out_in_order() {
    let relay = MockRelay::default();
    let (session, mut rx) = open_ready(&relay, SessionMode::Interactive).await;
    relay.set_offline(true);
    session.submit(insert_at(1.0)).await.unwrap();
    session.submit(insert_at(2.0)).await.unwrap();
    wait_for(&mut rx, |e| *e == SyncEvent::ConnectionChanged { connected: false }).await;
    assert_eq!(relay.log_len(), 0);
    assert_eq!(session.pending(), 2);

    relay.set_offline(false);
    wait_for(&mut rx, |e| *e == SyncEvent::ConnectionChanged { connected: true }).await;
    wait_until(|| relay.log_len() == 2).await;
    let counters: Vec<String> = relay
        .logged()
        .iter()
        .map(|c| c.param(0).to_owned())
        .collect();
    assert_eq!(counters, ["1", "2"]);
    assert_eq!(session.disconnected_for(), Duration::ZERO);
    session.stop().await;
}

#[tokio::test]
async fn rejected_command_is_dropped_and_reported() {
    let relay = MockRelay::default();
    relay.state.lock().unwrap().reject = Some(CommandKind::MoveVertex);
    let (session, mut rx) = open_ready(&relay, SessionMode::Interactive).await;
    let vertex = FullId::new(session.client(), 1);
    session.submit(insert_at(0.0)).await.unwrap();
    session
        .submit(Operation::MoveVertex {
            vertex,
            position: Vec3::new(1.0, 1.0, 1.0),
        })
        .await
        .unwrap();
    session.submit(insert_at(2.0)).await.unwrap();

    let event = wait_for(&mut rx, |e| matches!(e, SyncEvent::CommandRejected { .. })).await;
    let SyncEvent::CommandRejected { command, error } = event else {
        unreachable!()
    };
    assert_eq!(command.kind, CommandKind::MoveVertex);
    assert_eq!(error.name, "E4100");
    wait_until(|| relay.log_len() == 2).await;
    assert_eq!(session.pending(), 0);
    session.stop().await;
}

#[tokio::test]
async fn peers_see_each_others_edits() {
    let relay = MockRelay::default();
    let (alice, _a_rx) = open_ready(&relay, SessionMode::Interactive).await;
    let (bob, mut b_rx) = open_ready(&relay, SessionMode::Interactive).await;
    assert_ne!(alice.client(), bob.client());

    alice.submit(insert_at(3.0)).await.unwrap();
    wait_for(&mut b_rx, |e| matches!(e, SyncEvent::CommandsApplied(1))).await;
    let id = FullId::new(alice.client(), 1);
    let position = bob
        .with_replica(|r| r.graph().vertex(id).map(|v| v.position))
        .await;
    assert_eq!(position, Some(Vec3::new(3.0, 0.0, 0.0)));

    alice.stop().await;
    bob.stop().await;
}

#[tokio::test]
async fn silent_sessions_are_read_only() {
    let relay = MockRelay::default();
    relay.seed(insert_numbered(1, 0.0), ClientId(9));
    let (session, _rx) = open_ready(&relay, SessionMode::Silent).await;
    assert!(matches!(
        session.submit(insert_at(1.0)).await,
        Err(SyncError::ReadOnly)
    ));
    let count = session.with_replica(|r| r.graph().vertices().count()).await;
    assert_eq!(count, 1);
    session.stop().await;
}

#[tokio::test]
async fn history_mode_scrubs_locally() {
    let relay = MockRelay::default();
    let origin = ClientId(5);
    relay.seed(insert_numbered(1, 0.0), origin);
    relay.seed(
        Operation::MoveVertex {
            vertex: FullId::new(origin, 1),
            position: Vec3::new(8.0, 0.0, 0.0),
        },
        origin,
    );
    let (session, _rx) = open_ready(&relay, SessionMode::History).await;
    assert!(relay.state.lock().unwrap().saw_include_ineffective);

    let position = |r: &mut trellis_replica::Replica| {
        r.graph().vertex(FullId::new(origin, 1)).map(|v| v.position)
    };
    assert_eq!(
        session.with_replica(position).await,
        Some(Vec3::new(8.0, 0.0, 0.0))
    );
    session.undo().await.unwrap();
    assert_eq!(session.with_replica(position).await, Some(Vec3::ZERO));
    session.redo().await.unwrap();
    assert_eq!(
        session.with_replica(position).await,
        Some(Vec3::new(8.0, 0.0, 0.0))
    );
    assert_eq!(session.pending(), 0);
    assert_eq!(relay.log_len(), 2);
    session.stop().await;
}

#[tokio::test]
async fn stop_hands_back_unsent_commands() {
    let relay = MockRelay::default();
    let (session, _rx) = open_ready(&relay, SessionMode::Interactive).await;
    relay.set_offline(true);
    let first = session.submit(insert_at(1.0)).await.unwrap();
    let second = session.submit(insert_at(2.0)).await.unwrap();
    let unsent = session.stop().await;
    assert_eq!(unsent, [first, second]);
}
