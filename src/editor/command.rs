//! Reversible editing commands.
//!
//! Every user-level gesture is wrapped in a command holding whatever it needs to undo
//! itself. Commands are applied and reverted only through
//! [`EditHistory`](super::history::EditHistory), which guarantees strict LIFO replay,
//! so a reverse effect always sees the store exactly as its forward effect left it.

use crate::error::{ConsistencyError, Result, ValidationError};
use crate::store::{DetachedChannel, DetachedNode, GraphStore};
use crate::types::*;

use super::clipboard::{Cut, Paste};

/// Nodes and channels touched by one command effect.
///
/// This is what the rendering side is told after each push, undo or redo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Nodes that appeared
    pub added_nodes: Vec<NodeId>,
    /// Nodes that disappeared
    pub removed_nodes: Vec<NodeId>,
    /// Channels that appeared
    pub added_channels: Vec<ChannelId>,
    /// Channels that disappeared
    pub removed_channels: Vec<ChannelId>,
    /// Nodes whose position or properties changed
    pub updated_nodes: Vec<NodeId>,
    /// Channels whose properties changed
    pub updated_channels: Vec<ChannelId>,
}

impl ChangeSet {
    /// Returns true if nothing was touched.
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_channels.is_empty()
            && self.removed_channels.is_empty()
            && self.updated_nodes.is_empty()
            && self.updated_channels.is_empty()
    }

    pub(crate) fn record_detached_node(&mut self, detached: &DetachedNode) {
        self.removed_channels
            .extend(detached.channels.iter().map(|c| c.channel.id));
        self.removed_nodes.push(detached.node.id);
    }

    pub(crate) fn record_restored_node(&mut self, detached: &DetachedNode) {
        self.added_nodes.push(detached.node.id);
        self.added_channels
            .extend(detached.channels.iter().rev().map(|c| c.channel.id));
    }
}

/// A reversible operation over a [`GraphStore`].
pub trait Reversible {
    /// Runs the forward effect.
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet>;

    /// Runs the reverse effect.
    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet>;

    /// Short description for undo/redo menus.
    fn label(&self) -> String;
}

macro_rules! commands {
    ($( $(#[$doc:meta])* $variant:ident ),* $(,)?) => {
        /// Every editing command the history can hold.
        #[derive(Debug, Clone)]
        pub enum Command {
            $( $(#[$doc])* $variant($variant), )*
        }

        impl Reversible for Command {
            fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
                match self {
                    $( Command::$variant(command) => command.apply(store), )*
                }
            }

            fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
                match self {
                    $( Command::$variant(command) => command.revert(store), )*
                }
            }

            fn label(&self) -> String {
                match self {
                    $( Command::$variant(command) => command.label(), )*
                }
            }
        }

        $(
            impl From<$variant> for Command {
                fn from(command: $variant) -> Self {
                    Command::$variant(command)
                }
            }
        )*
    };
}

commands! {
    /// A node was created
    AddNode,
    /// A node was deleted, together with its channels
    DeleteNode,
    /// Two nodes were connected
    AddChannel,
    /// A channel was deleted
    DeleteChannel,
    /// A selection was cut to the clipboard
    Cut,
    /// The clipboard was pasted
    Paste,
    /// One or more nodes were moved
    MoveNodes,
    /// A node's properties were changed
    UpdateNode,
    /// A channel's properties were changed
    UpdateChannel,
    /// An interface address on a gateway or router was changed
    SetPeerAddress,
}

/// Creates a node of the given kind.
#[derive(Debug, Clone)]
pub struct AddNode {
    kind: NodeKind,
    position: (f32, f32),
    node: Option<NodeId>,
    stash: Option<Node>,
}

impl AddNode {
    /// Prepares a node of `kind` at `position`.
    pub fn new(kind: NodeKind, position: (f32, f32)) -> Self {
        Self {
            kind,
            position,
            node: None,
            stash: None,
        }
    }

    /// ID of the created node, once applied.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }
}

impl Reversible for AddNode {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let node = match (&self.stash, self.node) {
            (Some(node), _) => node.clone(),
            (None, None) => Node::new(self.kind, self.position),
            (None, Some(_)) => return Err(ConsistencyError::NothingToRestore("AddNode").into()),
        };
        let id = store.insert_node(node);
        self.node = Some(id);
        self.stash = None;
        Ok(ChangeSet {
            added_nodes: vec![id],
            ..Default::default()
        })
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let id = self
            .node
            .ok_or(ConsistencyError::NothingToRestore("AddNode"))?;
        let node = store.node(id).ok_or(ConsistencyError::MissingNode(id))?;
        if node.interface_count() > 0 {
            return Err(ConsistencyError::NodeStillConnected(id).into());
        }
        let detached = store.remove_node(id)?;
        self.stash = Some(detached.node);
        Ok(ChangeSet {
            removed_nodes: vec![id],
            ..Default::default()
        })
    }

    fn label(&self) -> String {
        format!("Add {}", self.kind.label())
    }
}

/// Deletes a node and every channel attached to it.
#[derive(Debug, Clone)]
pub struct DeleteNode {
    target: NodeId,
    name: Option<String>,
    detached: Option<DetachedNode>,
}

impl DeleteNode {
    /// Prepares the deletion of `target`.
    pub fn new(target: NodeId) -> Self {
        Self {
            target,
            name: None,
            detached: None,
        }
    }
}

impl Reversible for DeleteNode {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let detached = store.remove_node(self.target)?;
        let mut changes = ChangeSet::default();
        changes.record_detached_node(&detached);
        self.name = Some(detached.node.display_name().to_string());
        self.detached = Some(detached);
        Ok(changes)
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let detached = self
            .detached
            .clone()
            .ok_or(ConsistencyError::NothingToRestore("DeleteNode"))?;
        let mut changes = ChangeSet::default();
        changes.record_restored_node(&detached);
        store.restore_node(detached)?;
        self.detached = None;
        Ok(changes)
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("Delete {name}"),
            None => "Delete node".to_string(),
        }
    }
}

/// Connects two nodes.
#[derive(Debug, Clone)]
pub struct AddChannel {
    a: NodeId,
    b: NodeId,
    attributes: ChannelAttributes,
    channel: Option<ChannelId>,
    stash: Option<DetachedChannel>,
}

impl AddChannel {
    /// Prepares a channel between `a` and `b`.
    pub fn new(a: NodeId, b: NodeId, attributes: ChannelAttributes) -> Self {
        Self {
            a,
            b,
            attributes,
            channel: None,
            stash: None,
        }
    }

    /// ID of the created channel, once applied.
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }
}

impl Reversible for AddChannel {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let id = match (&self.stash, self.channel) {
            (Some(detached), _) => store.attach_channel(detached.clone())?,
            (None, None) => store.insert_channel(self.a, self.b, self.attributes)?,
            (None, Some(_)) => {
                return Err(ConsistencyError::NothingToRestore("AddChannel").into())
            }
        };
        self.channel = Some(id);
        self.stash = None;
        Ok(ChangeSet {
            added_channels: vec![id],
            ..Default::default()
        })
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let id = self
            .channel
            .ok_or(ConsistencyError::NothingToRestore("AddChannel"))?;
        self.stash = Some(store.remove_channel(id)?);
        Ok(ChangeSet {
            removed_channels: vec![id],
            ..Default::default()
        })
    }

    fn label(&self) -> String {
        "Add channel".to_string()
    }
}

/// Deletes a single channel.
#[derive(Debug, Clone)]
pub struct DeleteChannel {
    target: ChannelId,
    detached: Option<DetachedChannel>,
}

impl DeleteChannel {
    /// Prepares the deletion of `target`.
    pub fn new(target: ChannelId) -> Self {
        Self {
            target,
            detached: None,
        }
    }
}

impl Reversible for DeleteChannel {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.detached = Some(store.remove_channel(self.target)?);
        Ok(ChangeSet {
            removed_channels: vec![self.target],
            ..Default::default()
        })
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let detached = self
            .detached
            .clone()
            .ok_or(ConsistencyError::NothingToRestore("DeleteChannel"))?;
        let id = store.attach_channel(detached)?;
        self.detached = None;
        Ok(ChangeSet {
            added_channels: vec![id],
            ..Default::default()
        })
    }

    fn label(&self) -> String {
        "Delete channel".to_string()
    }
}

/// A single node movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeMove {
    /// The node that moved
    pub node: NodeId,
    /// Position before the move
    pub from: (f32, f32),
    /// Position after the move
    pub to: (f32, f32),
}

/// Moves one or more nodes on the canvas.
#[derive(Debug, Clone)]
pub struct MoveNodes {
    moves: Vec<NodeMove>,
}

impl MoveNodes {
    /// Captures the current positions of the targets.
    pub fn new(
        store: &GraphStore,
        targets: &[(NodeId, (f32, f32))],
    ) -> Result<Self, ValidationError> {
        let mut moves = Vec::with_capacity(targets.len());
        for (node, to) in targets {
            let from = store
                .node(*node)
                .ok_or(ValidationError::UnknownNode(*node))?
                .position;
            validate_position(*to)?;
            moves.push(NodeMove {
                node: *node,
                from,
                to: *to,
            });
        }
        if moves.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        Ok(Self { moves })
    }

    fn place(&self, store: &mut GraphStore, forward: bool) -> Result<ChangeSet> {
        for mv in &self.moves {
            if store.node(mv.node).is_none() {
                return Err(ConsistencyError::MissingNode(mv.node).into());
            }
        }
        let mut changes = ChangeSet::default();
        for mv in &self.moves {
            if let Some(node) = store.node_mut(mv.node) {
                node.position = if forward { mv.to } else { mv.from };
                changes.updated_nodes.push(mv.node);
            }
        }
        Ok(changes)
    }
}

impl Reversible for MoveNodes {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.place(store, true)
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.place(store, false)
    }

    fn label(&self) -> String {
        match self.moves.len() {
            1 => "Move node".to_string(),
            n => format!("Move {n} nodes"),
        }
    }
}

/// The editable properties of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    /// Kind-specific parameters
    pub attributes: NodeAttributes,
    /// Host address
    pub host: AddressRecord,
}

/// Replaces a node's attributes and host address.
#[derive(Debug, Clone)]
pub struct UpdateNode {
    node: NodeId,
    before: NodeSettings,
    after: NodeSettings,
}

impl UpdateNode {
    /// Validates `settings` against the node's kind and captures the current values.
    pub fn new(
        store: &GraphStore,
        node: NodeId,
        settings: NodeSettings,
    ) -> Result<Self, ValidationError> {
        let current = store.node(node).ok_or(ValidationError::UnknownNode(node))?;
        if !settings.attributes.matches(current.kind) {
            return Err(ValidationError::AttributeKindMismatch(current.kind));
        }
        settings.attributes.validate()?;
        settings.host.validate()?;
        Ok(Self {
            node,
            before: NodeSettings {
                attributes: current.attributes.clone(),
                host: current.host,
            },
            after: settings,
        })
    }

    fn write(&self, store: &mut GraphStore, settings: &NodeSettings) -> Result<ChangeSet> {
        let node = store
            .node_mut(self.node)
            .ok_or(ConsistencyError::MissingNode(self.node))?;
        node.attributes = settings.attributes.clone();
        node.host = settings.host;
        Ok(ChangeSet {
            updated_nodes: vec![self.node],
            ..Default::default()
        })
    }
}

impl Reversible for UpdateNode {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.write(store, &self.after)
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.write(store, &self.before)
    }

    fn label(&self) -> String {
        "Edit node properties".to_string()
    }
}

/// Replaces a channel's bandwidth and delay.
#[derive(Debug, Clone)]
pub struct UpdateChannel {
    channel: ChannelId,
    before: ChannelAttributes,
    after: ChannelAttributes,
}

impl UpdateChannel {
    /// Validates `attributes` and captures the current values.
    pub fn new(
        store: &GraphStore,
        channel: ChannelId,
        attributes: ChannelAttributes,
    ) -> Result<Self, ValidationError> {
        let current = store
            .channel(channel)
            .ok_or(ValidationError::UnknownChannel(channel))?;
        attributes.validate()?;
        Ok(Self {
            channel,
            before: current.attributes,
            after: attributes,
        })
    }

    fn write(&self, store: &mut GraphStore, attributes: ChannelAttributes) -> Result<ChangeSet> {
        let channel = store
            .channel_mut(self.channel)
            .ok_or(ConsistencyError::MissingChannel(self.channel))?;
        channel.attributes = attributes;
        Ok(ChangeSet {
            updated_channels: vec![self.channel],
            ..Default::default()
        })
    }
}

impl Reversible for UpdateChannel {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.write(store, self.after)
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.write(store, self.before)
    }

    fn label(&self) -> String {
        "Edit channel".to_string()
    }
}

/// Sets the address a gateway or router uses toward one neighbour.
#[derive(Debug, Clone)]
pub struct SetPeerAddress {
    node: NodeId,
    peer: NodeId,
    before: AddressRecord,
    after: AddressRecord,
}

impl SetPeerAddress {
    /// Checks that `node` keeps peer addresses, that `peer` is its neighbour and that
    /// the mask is contiguous.
    pub fn new(
        store: &GraphStore,
        node: NodeId,
        peer: NodeId,
        record: AddressRecord,
    ) -> Result<Self, ValidationError> {
        let current = store.node(node).ok_or(ValidationError::UnknownNode(node))?;
        if !current.kind.keeps_peer_addresses() {
            return Err(ValidationError::AddressingUnsupported(current.kind));
        }
        let before = *current
            .peer_address(peer)
            .ok_or(ValidationError::NotANeighbor { node, peer })?;
        record.validate()?;
        Ok(Self {
            node,
            peer,
            before,
            after: record,
        })
    }

    fn write(&self, store: &mut GraphStore, record: AddressRecord) -> Result<ChangeSet> {
        let entry = store
            .node_mut(self.node)
            .ok_or(ConsistencyError::MissingNode(self.node))?
            .peer_addresses
            .get_mut(&self.peer)
            .ok_or_else(|| {
                ConsistencyError::InvariantViolated(format!(
                    "no address entry for peer {} on node {}",
                    self.peer, self.node
                ))
            })?;
        *entry = record;
        Ok(ChangeSet {
            updated_nodes: vec![self.node],
            ..Default::default()
        })
    }
}

impl Reversible for SetPeerAddress {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.write(store, self.after)
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        self.write(store, self.before)
    }

    fn label(&self) -> String {
        "Set interface address".to_string()
    }
}
