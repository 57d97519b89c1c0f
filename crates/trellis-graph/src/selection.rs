// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Selection and highlight state read by the renderer and input handlers.

use crate::ident::{BendId, FullId};
use crate::store::GraphStore;

/// An item the user can select or hover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selectable {
    /// A vertex.
    Vertex(FullId),
    /// A bend, by stable handle.
    Bend(BendId),
}

/// Classification of the current selection, used to pick input actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionType {
    /// Nothing selected.
    None,
    /// Exactly one vertex.
    SingleVertex,
    /// Exactly one bend.
    SingleBend,
    /// Two vertices (an edge may or may not join them).
    SingleEdge,
    /// A bend plus one endpoint vertex of its edge.
    ConnectedBendVertex,
    /// Two bends on the same edge.
    ConnectedBendBend,
    /// Anything else.
    Multiple,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Selection {
    items: Vec<Selectable>,
    edge: Option<FullId>,
    highlighted: Option<Selectable>,
}

impl Selection {
    fn clear(&mut self) {
        self.items.clear();
        self.edge = None;
    }

    fn forget(&mut self, item: Selectable) {
        if self.items.contains(&item) {
            self.clear();
        }
        if self.highlighted == Some(item) {
            self.highlighted = None;
        }
    }

    pub(crate) fn forget_vertex(&mut self, id: FullId) {
        self.forget(Selectable::Vertex(id));
    }

    pub(crate) fn forget_bend(&mut self, id: BendId) {
        self.forget(Selectable::Bend(id));
    }

    pub(crate) fn forget_edge(&mut self, id: FullId) {
        if self.edge == Some(id) {
            self.clear();
        }
    }
}

impl GraphStore {
    fn resolves(&self, item: Selectable) -> bool {
        match item {
            Selectable::Vertex(id) => self.vertex(id).is_some(),
            Selectable::Bend(id) => self.bend(id).is_some(),
        }
    }

    /// Selected items in selection order.
    pub fn selection(&self) -> &[Selectable] {
        &self.selection.items
    }

    /// Edge implied by the selection, if any.
    pub fn selected_edge(&self) -> Option<FullId> {
        self.selection.edge
    }

    /// Hovered item, if any.
    pub fn highlighted(&self) -> Option<Selectable> {
        self.selection.highlighted
    }

    /// True when `item` is part of the selection.
    pub fn is_selected(&self, item: Selectable) -> bool {
        self.selection.items.contains(&item)
    }

    /// Sets or clears the hovered item. Returns false when `item` is dangling.
    pub fn set_highlighted(&mut self, item: Option<Selectable>) -> bool {
        if item.is_some_and(|i| !self.resolves(i)) {
            return false;
        }
        self.selection.highlighted = item;
        true
    }

    /// Appends `item` to the selection.
    ///
    /// Two connected vertices select their first connecting edge; a third item
    /// drops the selected edge. Returns false when `item` is dangling or
    /// already selected.
    pub fn select(&mut self, item: Selectable) -> bool {
        if !self.resolves(item) || self.is_selected(item) {
            return false;
        }
        self.selection.items.push(item);
        let pair = match self.selection.items.as_slice() {
            [Selectable::Vertex(a), Selectable::Vertex(b)] => Some((*a, *b)),
            _ => None,
        };
        if let Some((a, b)) = pair {
            if let Some(edge) = self.connecting_edge(a, b) {
                self.selection.edge = Some(edge);
            }
        }
        if self.selection.items.len() == 3 {
            self.selection.edge = None;
        }
        true
    }

    /// Replaces the selection with `edge`'s endpoints and marks it selected.
    pub fn select_edge(&mut self, edge: FullId) -> bool {
        let Some((start, end)) = self.edge(edge).map(|e| (e.start, e.end)) else {
            return false;
        };
        self.selection.clear();
        self.selection.items.push(Selectable::Vertex(start));
        if start != end {
            self.selection.items.push(Selectable::Vertex(end));
        }
        self.selection.edge = Some(edge);
        true
    }

    /// Selects the next edge parallel to the selected one.
    pub fn select_next_parallel_edge(&mut self) -> Option<FullId> {
        let next = self.next_parallel_edge(self.selection.edge?)?;
        self.select_edge(next);
        Some(next)
    }

    /// Removes `item` from the selection.
    pub fn deselect(&mut self, item: Selectable) -> bool {
        let before = self.selection.items.len();
        self.selection.items.retain(|i| *i != item);
        if self.selection.items.len() == before {
            return false;
        }
        if self.selection.items.len() != 2 {
            self.selection.edge = None;
        }
        true
    }

    /// Drops every selected item and the selected edge.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Classifies the current selection.
    pub fn selection_type(&self) -> SelectionType {
        let bend_edge = |b: BendId| self.bend(b).map(|bend| bend.edge);
        match self.selection.items.as_slice() {
            [] => SelectionType::None,
            [Selectable::Vertex(_)] => SelectionType::SingleVertex,
            [Selectable::Bend(_)] => SelectionType::SingleBend,
            [Selectable::Vertex(_), Selectable::Vertex(_)] => SelectionType::SingleEdge,
            [Selectable::Vertex(v), Selectable::Bend(b)]
            | [Selectable::Bend(b), Selectable::Vertex(v)] => {
                let touches = bend_edge(*b)
                    .and_then(|e| self.edge(e))
                    .is_some_and(|e| e.start == *v || e.end == *v);
                if touches {
                    SelectionType::ConnectedBendVertex
                } else {
                    SelectionType::Multiple
                }
            }
            [Selectable::Bend(a), Selectable::Bend(b)] => match (bend_edge(*a), bend_edge(*b)) {
                (Some(x), Some(y)) if x == y => SelectionType::ConnectedBendBend,
                _ => SelectionType::Multiple,
            },
            _ => SelectionType::Multiple,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::ident::ClientId;
    use crate::math::Vec3;

    fn id(counter: u64) -> FullId {
        FullId::new(ClientId(2), counter)
    }

    fn pair() -> GraphStore {
        let mut g = GraphStore::new();
        g.insert_vertex(id(1), Vec3::ZERO).unwrap();
        g.insert_vertex(id(2), Vec3::new(1.0, 0.0, 0.0)).unwrap();
        g.insert_vertex(id(3), Vec3::new(2.0, 0.0, 0.0)).unwrap();
        g.insert_edge(id(4), id(1), id(2)).unwrap();
        g
    }

    #[test]
    fn two_connected_vertices_select_edge() {
        let mut g = pair();
        assert!(g.select(Selectable::Vertex(id(1))));
        assert!(g.select(Selectable::Vertex(id(2))));
        assert_eq!(g.selected_edge(), Some(id(4)));
        assert_eq!(g.selection_type(), SelectionType::SingleEdge);
        assert!(g.select(Selectable::Vertex(id(3))));
        assert_eq!(g.selected_edge(), None);
        assert_eq!(g.selection_type(), SelectionType::Multiple);
    }

    #[test]
    fn removing_selected_bend_clears_selection() {
        let mut g = pair();
        let bend = g.break_edge_line(id(4), 0, Vec3::ZERO).unwrap();
        g.select(Selectable::Bend(bend));
        g.select(Selectable::Vertex(id(1)));
        assert_eq!(g.selection_type(), SelectionType::ConnectedBendVertex);
        g.remove_bend(id(4), 0).unwrap();
        assert!(g.selection().is_empty());
    }

    #[test]
    fn removing_selected_edge_clears_selection() {
        let mut g = pair();
        assert!(g.select_edge(id(4)));
        g.remove_edge(id(4)).unwrap();
        assert!(g.selection().is_empty());
        assert_eq!(g.selected_edge(), None);
    }

    #[test]
    fn dangling_items_are_refused() {
        let mut g = pair();
        assert!(!g.select(Selectable::Vertex(id(99))));
        assert!(!g.set_highlighted(Some(Selectable::Vertex(id(99)))));
        assert!(g.set_highlighted(Some(Selectable::Vertex(id(3)))));
        g.remove_vertex(id(3)).unwrap();
        assert_eq!(g.highlighted(), None);
    }

    #[test]
    fn tab_cycles_parallel_edges() {
        let mut g = pair();
        g.insert_edge(id(5), id(2), id(1)).unwrap();
        g.select_edge(id(4));
        assert_eq!(g.select_next_parallel_edge(), Some(id(5)));
        assert_eq!(g.select_next_parallel_edge(), Some(id(4)));
    }
}
