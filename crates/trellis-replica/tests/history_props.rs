// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
use proptest::prelude::*;
use proptest::sample::Index;
use trellis_graph::{ClientId, FullId, Quat, Vec3};
use trellis_proto::{IdSlot, Operation};
use trellis_replica::Replica;

#[derive(Debug, Clone)]
enum Step {
    AddVertex(Vec3),
    AddEdge(Index, Index),
    Break(Index, Index, Vec3),
    RemoveVertex(Index),
    RemoveEdge(Index),
    RemoveBend(Index, Index),
    Move(Index, Vec3),
    MoveBend(Index, Index, Vec3),
    Scale(Index, f64),
    Rotate(Index, Quat),
    VertexProp(Index, u8, String),
    EdgeProp(Index, u8, String),
    Camera(Vec3),
}

fn coord() -> impl Strategy<Value = f64> {
    -1.0e4f64..1.0e4
}

fn point() -> impl Strategy<Value = Vec3> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => point().prop_map(Step::AddVertex),
        2 => (any::<Index>(), any::<Index>()).prop_map(|(a, b)| Step::AddEdge(a, b)),
        2 => (any::<Index>(), any::<Index>(), point()).prop_map(|(e, i, p)| Step::Break(e, i, p)),
        1 => any::<Index>().prop_map(Step::RemoveVertex),
        1 => any::<Index>().prop_map(Step::RemoveEdge),
        1 => (any::<Index>(), any::<Index>()).prop_map(|(e, i)| Step::RemoveBend(e, i)),
        1 => (any::<Index>(), point()).prop_map(|(v, p)| Step::Move(v, p)),
        1 => (any::<Index>(), any::<Index>(), point()).prop_map(|(e, i, p)| Step::MoveBend(e, i, p)),
        1 => (any::<Index>(), 0.1f64..10.0).prop_map(|(v, s)| Step::Scale(v, s)),
        1 => (any::<Index>(), coord(), coord()).prop_map(|(v, a, b)| Step::Rotate(v, Quat::new(a, b, 0.0, 1.0))),
        1 => (any::<Index>(), 0u8..3, "[a-z]{0,4}").prop_map(|(v, k, s)| Step::VertexProp(v, k, s)),
        1 => (any::<Index>(), 0u8..3, "[a-z]{0,4}").prop_map(|(e, k, s)| Step::EdgeProp(e, k, s)),
        1 => point().prop_map(Step::Camera),
    ]
}

fn pick_vertex(r: &Replica, i: &Index) -> Option<FullId> {
    let ids: Vec<_> = r.graph().vertices().map(|v| v.id).collect();
    (!ids.is_empty()).then(|| ids[i.index(ids.len())])
}

fn pick_edge(r: &Replica, i: &Index) -> Option<FullId> {
    let ids: Vec<_> = r.graph().edges().map(|e| e.id).collect();
    (!ids.is_empty()).then(|| ids[i.index(ids.len())])
}

fn pick_bend(r: &Replica, e: &Index, i: &Index) -> Option<(FullId, usize)> {
    let edge = pick_edge(r, e)?;
    let count = r.graph().edge(edge)?.bend_count();
    (count > 0).then(|| (edge, i.index(count)))
}

fn to_op(r: &Replica, step: &Step) -> Option<Operation> {
    Some(match step {
        Step::AddVertex(p) => Operation::InsertVertex {
            id: IdSlot::Allocate,
            position: *p,
        },
        Step::AddEdge(a, b) => Operation::InsertEdge {
            from: pick_vertex(r, a)?,
            to: pick_vertex(r, b)?,
            id: IdSlot::Allocate,
        },
        Step::Break(e, i, p) => {
            let edge = pick_edge(r, e)?;
            let lines = r.graph().edge(edge)?.line_count();
            Operation::BreakEdgeLine {
                edge,
                index: i.index(lines),
                position: *p,
            }
        }
        Step::RemoveVertex(v) => Operation::RemoveVertex {
            vertex: pick_vertex(r, v)?,
        },
        Step::RemoveEdge(e) => Operation::RemoveEdge {
            edge: pick_edge(r, e)?,
        },
        Step::RemoveBend(e, i) => {
            let (edge, index) = pick_bend(r, e, i)?;
            Operation::RemoveBend { edge, index }
        }
        Step::Move(v, p) => Operation::MoveVertex {
            vertex: pick_vertex(r, v)?,
            position: *p,
        },
        Step::MoveBend(e, i, p) => {
            let (edge, index) = pick_bend(r, e, i)?;
            Operation::MoveBend {
                edge,
                index,
                position: *p,
            }
        }
        Step::Scale(v, s) => Operation::ChangeVertexScale {
            vertex: pick_vertex(r, v)?,
            scale: *s,
        },
        Step::Rotate(v, q) => Operation::ChangeVertexRotation {
            vertex: pick_vertex(r, v)?,
            rotation: *q,
        },
        Step::VertexProp(v, k, s) => Operation::SetVertexProperty {
            vertex: pick_vertex(r, v)?,
            list: "tags".into(),
            key: format!("k{k}"),
            value: s.clone(),
            remesh: false,
        },
        Step::EdgeProp(e, k, s) => Operation::SetEdgeProperty {
            edge: pick_edge(r, e)?,
            list: "style".into(),
            key: format!("k{k}"),
            value: s.clone(),
            remesh: true,
        },
        Step::Camera(p) => Operation::ChangeCameraPosition { position: *p },
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn undo_all_then_redo_all_round_trips(steps in prop::collection::vec(step(), 1..24)) {
        let mut r = Replica::new(ClientId(5));
        let initial = r.graph().state_hash().unwrap();
        let mut applied = 0usize;
        for s in &steps {
            if let Some(op) = to_op(&r, s) {
                if r.apply_local(op, true).is_ok() {
                    applied += 1;
                }
            }
        }
        prop_assert_eq!(r.history().len(), applied);
        let last = r.graph().state_hash().unwrap();

        for _ in 0..applied {
            r.undo().unwrap();
        }
        prop_assert!(r.undo().is_err());
        prop_assert_eq!(r.graph().state_hash().unwrap(), initial);

        for _ in 0..applied {
            r.redo().unwrap();
        }
        prop_assert!(r.redo().is_err());
        prop_assert_eq!(r.graph().state_hash().unwrap(), last);
    }

    #[test]
    fn peer_replaying_published_commands_converges(steps in prop::collection::vec(step(), 1..24)) {
        let mut author = Replica::new(ClientId(5));
        let mut peer = Replica::new(ClientId(6));
        peer.set_receive_camera(true);
        let mut log = Vec::new();
        for s in &steps {
            if let Some(op) = to_op(&author, s) {
                if let Ok(cmd) = author.apply_local(op, true) {
                    log.push(cmd);
                }
            }
        }
        for _ in 0..log.len() / 2 {
            log.extend(author.undo().unwrap());
        }
        for c in &log {
            let _ = peer.apply(c, false, false);
        }
        prop_assert_eq!(
            peer.graph().state_hash().unwrap(),
            author.graph().state_hash().unwrap()
        );
    }
}
