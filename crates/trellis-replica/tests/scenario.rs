// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
use trellis_graph::{ClientId, Endpoint, FullId, Vec3};
use trellis_proto::{Command, CommandKind, IdSlot, Operation};
use trellis_replica::{ApplyResult, GraphEvent, Replica};

fn fid(n: u64) -> FullId {
    FullId::new(ClientId(7), n)
}

fn insert_vertex(r: &mut Replica, position: Vec3) -> Command {
    r.apply_local(
        Operation::InsertVertex {
            id: IdSlot::Allocate,
            position,
        },
        true,
    )
    .unwrap()
}

#[test]
fn client_seven_builds_breaks_and_heals_an_edge() {
    let mut r = Replica::new(ClientId(7));
    let a = insert_vertex(&mut r, Vec3::ZERO);
    let b = insert_vertex(&mut r, Vec3::new(10.0, 0.0, 0.0));
    assert_eq!(a.to_string(), r#"InsertVertex("1", "0", "0", "0") from 7"#);
    assert_eq!(b.param(0), "2");

    let e = r
        .apply_local(
            Operation::InsertEdge {
                from: fid(1),
                to: fid(2),
                id: IdSlot::Allocate,
            },
            true,
        )
        .unwrap();
    assert_eq!(e.param(2), "3");

    r.apply_local(
        Operation::BreakEdgeLine {
            edge: fid(3),
            index: 0,
            position: Vec3::new(5.0, 0.0, 0.0),
        },
        true,
    )
    .unwrap();
    assert_eq!(r.graph().edge_lines(fid(3)).count(), 2);
    let bends: Vec<_> = r.graph().edge_bends(fid(3)).map(|b| b.position).collect();
    assert_eq!(bends, [Vec3::new(5.0, 0.0, 0.0)]);

    r.apply_local(
        Operation::RemoveBend {
            edge: fid(3),
            index: 0,
        },
        true,
    )
    .unwrap();
    let lines: Vec<_> = r.graph().edge_lines(fid(3)).collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].start, Endpoint::Vertex(fid(1)));
    assert_eq!(lines[0].end, Endpoint::Vertex(fid(2)));
}

#[test]
fn echo_of_an_optimistic_edit_changes_nothing() {
    let mut r = Replica::new(ClientId(7));
    insert_vertex(&mut r, Vec3::ZERO);
    let mut moved = r
        .apply_local(
            Operation::MoveVertex {
                vertex: fid(1),
                position: Vec3::new(3.0, 0.0, 0.0),
            },
            true,
        )
        .unwrap();
    let hash = r.graph().state_hash().unwrap();
    r.drain_events();

    moved.sequence = Some(2);
    assert_eq!(r.apply(&moved, false, false), ApplyResult::EchoSuppressed);
    assert_eq!(r.graph().state_hash().unwrap(), hash);
    assert!(r.drain_events().is_empty());
}

#[test]
fn replaying_own_history_reseeds_the_allocator() {
    let log = [
        Command::new(CommandKind::InsertVertex, ClientId(7), ["1", "0", "0", "0"]),
        Command::new(CommandKind::InsertVertex, ClientId(4), ["1", "0", "0", "0"]),
        Command::new(CommandKind::InsertEdge, ClientId(7), ["7-1", "4-1", "2"]),
    ];
    let mut r = Replica::new(ClientId(7));
    for c in &log {
        assert_eq!(r.apply(c, true, false), ApplyResult::Applied);
    }
    let next = insert_vertex(&mut r, Vec3::ZERO);
    assert_eq!(next.param(0), "3");
    assert!(r.graph().vertex(fid(3)).is_some());
}

#[test]
fn remote_vertex_removal_cascades_with_events() {
    let mut r = Replica::new(ClientId(1));
    let log = [
        Command::new(CommandKind::InsertVertex, ClientId(2), ["1", "0", "0", "0"]),
        Command::new(CommandKind::InsertVertex, ClientId(2), ["2", "0", "0", "0"]),
        Command::new(CommandKind::InsertEdge, ClientId(2), ["2-1", "2-2", "3"]),
        Command::new(CommandKind::InsertEdge, ClientId(2), ["2-2", "2-1", "4"]),
    ];
    for c in &log {
        assert_eq!(r.apply(c, false, false), ApplyResult::Applied);
    }
    r.drain_events();
    let remove = Command::new(CommandKind::RemoveVertex, ClientId(2), ["2-1"]);
    assert_eq!(r.apply(&remove, false, false), ApplyResult::Applied);
    let two = |n| FullId::new(ClientId(2), n);
    assert_eq!(
        r.drain_events(),
        [
            GraphEvent::EdgeRemoved(two(3)),
            GraphEvent::EdgeRemoved(two(4)),
            GraphEvent::VertexRemoved(two(1)),
        ]
    );
    assert!(r.graph().vertex(two(2)).unwrap().incident.is_empty());
}

#[test]
fn undoing_edge_removal_restores_parallel_order() {
    let mut r = Replica::new(ClientId(7));
    insert_vertex(&mut r, Vec3::ZERO);
    insert_vertex(&mut r, Vec3::new(10.0, 0.0, 0.0));
    for _ in 0..2 {
        r.apply_local(
            Operation::InsertEdge {
                from: fid(1),
                to: fid(2),
                id: IdSlot::Allocate,
            },
            true,
        )
        .unwrap();
    }
    assert_eq!(r.graph().edges_between(fid(1), fid(2)), [fid(3), fid(4)]);

    r.apply_local(Operation::RemoveEdge { edge: fid(3) }, true).unwrap();
    r.undo().unwrap();
    assert_eq!(r.graph().edges_between(fid(1), fid(2)), [fid(3), fid(4)]);
    assert_eq!(r.graph().parallel_index(fid(3)), Some(0));

    r.apply_local(Operation::RemoveVertex { vertex: fid(1) }, true).unwrap();
    r.undo().unwrap();
    assert_eq!(r.graph().vertex(fid(2)).unwrap().incident, [fid(3), fid(4)]);
    assert_eq!(r.graph().next_parallel_edge(fid(4)), Some(fid(3)));
}
