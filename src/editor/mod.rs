//! The editing facade: turns user gestures into commands on a topology.
//!
//! This module is organized into several submodules:
//! - `command`: reversible commands and the change sets they report
//! - `clipboard`: copied selections plus the Cut and Paste commands
//! - `history`: the undo/redo list
//! - `file_ops`: save, load and simulator export

pub mod clipboard;
pub mod command;
mod file_ops;
pub mod history;


use log::warn;

use crate::config::EditorConfig;
use crate::error::{ConsistencyError, EditorError, Result, ValidationError};
use crate::store::GraphStore;
use crate::types::*;

pub use clipboard::Clipboard;
pub use command::{ChangeSet, Command, NodeSettings};
pub use file_ops::FileState;
pub use history::EditHistory;

use clipboard::{Cut, Paste};
use command::{
    AddChannel, AddNode, DeleteChannel, DeleteNode, MoveNodes, SetPeerAddress, UpdateChannel,
    UpdateNode,
};

/// Receives the ids touched by each executed command, undo or redo.
pub trait ChangeObserver {
    /// Called once per effect, after the store has been updated.
    fn on_change(&mut self, changes: &ChangeSet);
}

/// Owns a topology and everything needed to edit it.
pub struct TopologyEditor {
    store: GraphStore,
    history: EditHistory,
    clipboard: Option<Clipboard>,
    config: EditorConfig,
    observers: Vec<Box<dyn ChangeObserver>>,
    /// Path and dirty flag of the document
    pub file: FileState,
}

impl Default for TopologyEditor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl TopologyEditor {
    /// Creates an editor over an empty topology.
    pub fn new(config: EditorConfig) -> Self {
        Self {
            store: GraphStore::new(),
            history: EditHistory::with_capacity(config.max_undo_history),
            clipboard: None,
            config,
            observers: Vec::new(),
            file: FileState::default(),
        }
    }

    /// The topology being edited.
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// The undo/redo history.
    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// The current clipboard, if anything was copied or cut.
    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    /// Active configuration.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Registers an observer for change notifications.
    pub fn add_observer(&mut self, observer: Box<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    /// Adds a node of `kind` at `position` and returns its id.
    pub fn add_node(&mut self, kind: NodeKind, position: (f32, f32)) -> Result<NodeId> {
        self.refuse_if(validate_position(position))?;
        let changes = self.execute(AddNode::new(kind, position).into())?;
        changes.added_nodes.first().copied().ok_or_else(|| {
            ConsistencyError::InvariantViolated("AddNode reported no node".to_string()).into()
        })
    }

    /// Deletes a node and its channels.
    pub fn delete_node(&mut self, node: NodeId) -> Result<()> {
        self.require_node(node)?;
        self.execute(DeleteNode::new(node).into()).map(drop)
    }

    /// Connects two nodes using the configured default channel attributes.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<ChannelId> {
        self.connect_with(a, b, self.config.default_channel)
    }

    /// Connects two nodes with explicit channel attributes.
    pub fn connect_with(
        &mut self,
        a: NodeId,
        b: NodeId,
        attributes: ChannelAttributes,
    ) -> Result<ChannelId> {
        self.require_node(a)?;
        self.require_node(b)?;
        self.refuse_if(attributes.validate())?;
        let changes = self.execute(AddChannel::new(a, b, attributes).into())?;
        changes.added_channels.first().copied().ok_or_else(|| {
            ConsistencyError::InvariantViolated("AddChannel reported no channel".to_string())
                .into()
        })
    }

    /// Deletes a single channel.
    pub fn delete_channel(&mut self, channel: ChannelId) -> Result<()> {
        if self.store.channel(channel).is_none() {
            return self.refuse(ValidationError::UnknownChannel(channel));
        }
        self.execute(DeleteChannel::new(channel).into()).map(drop)
    }

    /// Moves nodes to new positions as one undoable step.
    pub fn move_nodes(&mut self, moves: &[(NodeId, (f32, f32))]) -> Result<()> {
        let command = self.refuse_if(MoveNodes::new(&self.store, moves))?;
        self.execute(command.into()).map(drop)
    }

    /// Replaces a node's attributes and host address.
    pub fn update_node(&mut self, node: NodeId, settings: NodeSettings) -> Result<()> {
        let command = self.refuse_if(UpdateNode::new(&self.store, node, settings))?;
        self.execute(command.into()).map(drop)
    }

    /// Replaces a channel's bandwidth and delay.
    pub fn update_channel(&mut self, channel: ChannelId, attributes: ChannelAttributes) -> Result<()> {
        let command = self.refuse_if(UpdateChannel::new(&self.store, channel, attributes))?;
        self.execute(command.into()).map(drop)
    }

    /// Sets the address `node` uses on its interface toward `peer`.
    pub fn set_peer_address(
        &mut self,
        node: NodeId,
        peer: NodeId,
        record: AddressRecord,
    ) -> Result<()> {
        let command = self.refuse_if(SetPeerAddress::new(&self.store, node, peer, record))?;
        self.execute(command.into()).map(drop)
    }

    /// Copies a selection to the clipboard without touching the topology.
    pub fn copy(&mut self, nodes: &[NodeId], channels: &[ChannelId]) -> Result<()> {
        if nodes.is_empty() {
            return self.refuse(ValidationError::EmptySelection);
        }
        let clipboard = self.refuse_if(Clipboard::capture(&self.store, nodes, channels))?;
        self.clipboard = Some(clipboard);
        Ok(())
    }

    /// Copies a selection to the clipboard, then removes it.
    pub fn cut(&mut self, nodes: &[NodeId], channels: &[ChannelId]) -> Result<()> {
        let clipboard = self.refuse_if(Clipboard::capture(&self.store, nodes, channels))?;
        let command = self.refuse_if(Cut::new(nodes, channels))?;
        self.execute(command.into())?;
        if !clipboard.is_empty() {
            self.clipboard = Some(clipboard);
        }
        Ok(())
    }

    /// Pastes the clipboard and returns the ids of the new nodes.
    pub fn paste(&mut self) -> Result<Vec<NodeId>> {
        let Some(clipboard) = self.clipboard.clone() else {
            return self.refuse(ValidationError::EmptyClipboard);
        };
        let command = self.refuse_if(Paste::new(clipboard, self.config.paste_offset))?;
        let changes = self.execute(command.into())?;
        Ok(changes.added_nodes)
    }

    /// Reverses the last command. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        let changes = self.history.undo(&mut self.store)?;
        Ok(self.settle(changes))
    }

    /// Re-applies the last undone command. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        let changes = self.history.redo(&mut self.store)?;
        Ok(self.settle(changes))
    }

    /// Returns true if there are commands that can be undone.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns true if there are commands that can be redone.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn execute(&mut self, command: Command) -> Result<ChangeSet> {
        match self.history.push(command, &mut self.store) {
            Ok(changes) => {
                self.settle(Some(changes.clone()));
                Ok(changes)
            }
            Err(EditorError::Validation(reason)) => self.refuse(reason),
            Err(err) => Err(err),
        }
    }

    fn settle(&mut self, changes: Option<ChangeSet>) -> bool {
        let Some(changes) = changes else {
            return false;
        };
        self.file.has_unsaved_changes = true;
        self.notify(&changes);
        true
    }

    fn notify(&mut self, changes: &ChangeSet) {
        for observer in &mut self.observers {
            observer.on_change(changes);
        }
    }

    fn require_node(&self, node: NodeId) -> Result<()> {
        if self.store.node(node).is_none() {
            return self.refuse(ValidationError::UnknownNode(node));
        }
        Ok(())
    }

    fn refuse_if<T>(&self, result: Result<T, ValidationError>) -> Result<T> {
        result.or_else(|reason| self.refuse(reason))
    }

    fn refuse<T>(&self, reason: ValidationError) -> Result<T> {
        warn!("edit refused: {reason}");
        Err(reason.into())
    }
}
