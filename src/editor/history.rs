//! Undo/redo history for tracking and reversing editing commands.
//!
//! The history is a single list of executed commands with a cursor: everything below
//! the cursor is applied, everything at or above it has been undone. Replays run
//! against a checkpoint of the store so a failing command never leaves it half-edited.

use log::{debug, error};

use crate::constants::MAX_UNDO_HISTORY;
use crate::error::{EditorError, Result};
use crate::store::GraphStore;

use super::command::{ChangeSet, Command, Reversible};

/// Manages undo/redo history for the editor.
#[derive(Debug, Clone)]
pub struct EditHistory {
    commands: Vec<Command>,
    cursor: usize,
    capacity: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_UNDO_HISTORY)
    }
}

impl EditHistory {
    /// Creates a new empty history with the default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty history keeping at most `capacity` commands.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Applies `command` and records it.
    ///
    /// Any undone commands are discarded, and the oldest entries are dropped once the
    /// history is over capacity. On failure the store is rolled back and nothing is
    /// recorded.
    pub fn push(&mut self, mut command: Command, store: &mut GraphStore) -> Result<ChangeSet> {
        let checkpoint = store.clone();
        let changes = match command.apply(store) {
            Ok(changes) => changes,
            Err(err) => {
                *store = checkpoint;
                report("apply", &command, &err);
                return Err(err);
            }
        };

        debug!("applied {}", command.label());
        self.commands.truncate(self.cursor);
        self.commands.push(command);
        if self.commands.len() > self.capacity {
            let excess = self.commands.len() - self.capacity;
            self.commands.drain(..excess);
        }
        self.cursor = self.commands.len();
        Ok(changes)
    }

    /// Reverses the most recently applied command.
    ///
    /// Returns `Ok(None)` when there is nothing to undo.
    pub fn undo(&mut self, store: &mut GraphStore) -> Result<Option<ChangeSet>> {
        let Some(index) = self.cursor.checked_sub(1) else {
            return Ok(None);
        };
        let checkpoint = store.clone();
        let command = &mut self.commands[index];
        match command.revert(store) {
            Ok(changes) => {
                debug!("undid {}", command.label());
                self.cursor = index;
                Ok(Some(changes))
            }
            Err(err) => {
                *store = checkpoint;
                report("undo", command, &err);
                Err(err)
            }
        }
    }

    /// Re-applies the most recently undone command.
    ///
    /// Returns `Ok(None)` when there is nothing to redo.
    pub fn redo(&mut self, store: &mut GraphStore) -> Result<Option<ChangeSet>> {
        if self.cursor >= self.commands.len() {
            return Ok(None);
        }
        let checkpoint = store.clone();
        let command = &mut self.commands[self.cursor];
        match command.apply(store) {
            Ok(changes) => {
                debug!("redid {}", command.label());
                self.cursor += 1;
                Ok(Some(changes))
            }
            Err(err) => {
                *store = checkpoint;
                report("redo", command, &err);
                Err(err)
            }
        }
    }

    /// Returns true if there are commands that can be undone.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Returns true if there are commands that can be redone.
    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    /// Label of the command [`undo`](Self::undo) would reverse.
    pub fn undo_label(&self) -> Option<String> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.commands.get(i))
            .map(Reversible::label)
    }

    /// Label of the command [`redo`](Self::redo) would re-apply.
    pub fn redo_label(&self) -> Option<String> {
        self.commands.get(self.cursor).map(Reversible::label)
    }

    /// Number of recorded commands, applied or undone.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Maximum number of recorded commands.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clears all undo and redo history.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }
}

fn report(phase: &str, command: &Command, err: &EditorError) {
    match err {
        EditorError::Validation(reason) => {
            debug!("{phase} of {} refused: {reason}", command.label())
        }
        other => error!("{phase} of {} failed, store rolled back: {other}", command.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::command::{AddChannel, AddNode, DeleteNode};
    use crate::error::ValidationError;
    use crate::types::*;

    fn add(history: &mut EditHistory, store: &mut GraphStore, kind: NodeKind) -> NodeId {
        let changes = history
            .push(AddNode::new(kind, (0.0, 0.0)).into(), store)
            .unwrap();
        changes.added_nodes[0]
    }

    #[test]
    fn test_push_undo_redo_cursor() {
        let mut store = GraphStore::new();
        let mut history = EditHistory::new();
        assert!(!history.can_undo());

        add(&mut history, &mut store, NodeKind::Router);
        add(&mut history, &mut store, NodeKind::Router);
        assert_eq!(history.undo_label().as_deref(), Some("Add Router"));

        history.undo(&mut store).unwrap();
        assert_eq!(store.count(NodeKind::Router), 1);
        assert!(history.can_redo());

        history.redo(&mut store).unwrap();
        assert_eq!(store.count(NodeKind::Router), 2);
        assert!(!history.can_redo());
        assert!(history.redo(&mut store).unwrap().is_none());
    }

    #[test]
    fn test_push_discards_redo_tail() {
        let mut store = GraphStore::new();
        let mut history = EditHistory::new();
        add(&mut history, &mut store, NodeKind::Router);
        add(&mut history, &mut store, NodeKind::UserTerminal);
        history.undo(&mut store).unwrap();

        add(&mut history, &mut store, NodeKind::ComputeServer);

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(store.count(NodeKind::UserTerminal), 0);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut store = GraphStore::new();
        let mut history = EditHistory::with_capacity(3);
        for _ in 0..5 {
            add(&mut history, &mut store, NodeKind::Router);
        }
        assert_eq!(history.len(), 3);

        while history.undo(&mut store).unwrap().is_some() {}
        assert_eq!(store.count(NodeKind::Router), 2);
    }

    #[test]
    fn test_refused_push_records_nothing() {
        let mut store = GraphStore::new();
        let mut history = EditHistory::new();
        let a = add(&mut history, &mut store, NodeKind::Router);
        let before = store.clone();

        let result = history.push(
            AddChannel::new(a, a, ChannelAttributes::default()).into(),
            &mut store,
        );

        assert!(matches!(
            result,
            Err(EditorError::Validation(ValidationError::SelfChannel(_)))
        ));
        assert_eq!(history.len(), 1);
        assert_eq!(store, before);
    }

    #[test]
    fn test_failed_replay_rolls_back() {
        let mut store = GraphStore::new();
        let mut history = EditHistory::new();
        let a = add(&mut history, &mut store, NodeKind::Router);
        history
            .push(DeleteNode::new(a).into(), &mut store)
            .unwrap();
        history.undo(&mut store).unwrap();

        // Remove the node behind the history's back so redo cannot find it.
        store.remove_node(a).unwrap();
        let before = store.clone();

        assert!(history.redo(&mut store).is_err());
        assert_eq!(store, before);
        assert!(history.can_redo());
    }
}
