// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Applied-command history and its cursor.

use trellis_proto::Command;

/// A history-bearing command together with the commands that reverse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The command as applied, with resolved ID slots.
    pub command: Command,
    /// Complement, applied in order on undo.
    pub complement: Vec<Command>,
}

/// Ordered history with a cursor.
///
/// `cursor` counts the entries currently applied: undo steps it back over
/// `entries[cursor - 1]`, redo re-applies `entries[cursor]`. Recording a new
/// entry discards everything past the cursor.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl History {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries currently applied.
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Recorded entries, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// True when [`History::step_back`] would succeed.
    pub const fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// True when [`History::step_forward`] would succeed.
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Appends an applied entry.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.cursor);
        self.entries.push(entry);
        self.cursor = self.entries.len();
    }

    /// Moves the cursor back and returns the complement to apply.
    pub fn step_back(&mut self) -> Option<Vec<Command>> {
        self.cursor = self.cursor.checked_sub(1)?;
        self.entries
            .get(self.cursor)
            .map(|entry| entry.complement.clone())
    }

    /// Moves the cursor forward and returns the command to re-apply.
    pub fn step_forward(&mut self) -> Option<Command> {
        let entry = self.entries.get(self.cursor)?;
        self.cursor += 1;
        Some(entry.command.clone())
    }

    /// Forgets every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_proto::{ClientId, CommandKind};

    fn entry(n: u64) -> HistoryEntry {
        let id = format!("1-{n}");
        HistoryEntry {
            command: Command::new(CommandKind::RemoveVertex, ClientId(1), [id.as_str()]),
            complement: Vec::new(),
        }
    }

    #[test]
    fn cursor_walks_both_ways_and_stops_at_the_ends() {
        let mut h = History::new();
        assert!(h.step_back().is_none());
        h.record(entry(1));
        h.record(entry(2));
        assert!(h.step_forward().is_none());
        assert!(h.step_back().is_some());
        assert!(h.step_back().is_some());
        assert!(h.step_back().is_none());
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.step_forward(), Some(entry(1).command));
        assert_eq!(h.cursor(), 1);
    }

    #[test]
    fn recording_after_undo_drops_the_redo_tail() {
        let mut h = History::new();
        h.record(entry(1));
        h.record(entry(2));
        h.step_back();
        h.record(entry(3));
        assert_eq!(h.len(), 2);
        assert!(!h.can_redo());
        assert_eq!(h.entries()[1], entry(3));
    }
}
