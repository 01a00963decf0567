//! The authoritative node and channel collections.
//!
//! [`GraphStore`] is the only place where structure changes. It keeps two dense
//! numberings up to date:
//!
//! - **ordinals**: each kind's nodes are kept in an ordered list and a node's ordinal
//!   is its position there, so removal shifts the tail down by one;
//! - **slots**: a node's incidence list defines its interface numbering, and every
//!   channel end records the slot it occupies, so removal resyncs the tail.
//!
//! Removal hands back a detached snapshot ([`DetachedNode`], [`DetachedChannel`])
//! which can be fed back to restore the exact previous numbering.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{ConsistencyError, ValidationError};
use crate::types::*;

/// A channel taken out of the store, with everything needed to put it back.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedChannel {
    /// The channel, with the slots it occupied when removed
    pub channel: Channel,
    /// Position in the global channel order when removed
    pub order_index: usize,
    /// Address records dropped from router-like endpoints, per end
    pub addresses: [Option<AddressRecord>; 2],
}

/// A node taken out of the store together with its incident channels.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedNode {
    /// The node itself, with an empty incidence list
    pub node: Node,
    /// Ordinal the node held when removed
    pub ordinal: usize,
    /// Incident channels, in the order they were detached
    pub channels: Vec<DetachedChannel>,
}

/// Owns every node and channel of a topology.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    nodes: HashMap<NodeId, Node>,
    by_kind: [Vec<NodeId>; NodeKind::COUNT],
    channels: HashMap<ChannelId, Channel>,
    channel_order: Vec<ChannelId>,
}

impl GraphStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Looks up a channel.
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub(crate) fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    /// Number of nodes of `kind`; also the ordinal the next one will get.
    pub fn count(&self, kind: NodeKind) -> usize {
        self.by_kind[kind.index()].len()
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node of `kind` holding `ordinal`.
    pub fn node_at(&self, kind: NodeKind, ordinal: usize) -> Option<&Node> {
        self.by_kind[kind.index()]
            .get(ordinal)
            .and_then(|id| self.nodes.get(id))
    }

    /// Nodes of one kind, by ordinal.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> + '_ {
        self.by_kind[kind.index()]
            .iter()
            .filter_map(move |id| self.nodes.get(id))
    }

    /// All nodes, grouped by kind in [`NodeKind::ALL`] order, then by ordinal.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        NodeKind::ALL
            .into_iter()
            .flat_map(move |kind| self.nodes_of_kind(kind))
    }

    /// All channels, in the order they were added.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.channel_order
            .iter()
            .filter_map(move |id| self.channels.get(id))
    }

    /// The channel joining `a` and `b`, if any.
    pub fn channel_between(&self, a: NodeId, b: NodeId) -> Option<ChannelId> {
        let node = self.nodes.get(&a)?;
        node.interfaces
            .iter()
            .copied()
            .find(|id| self.channels.get(id).is_some_and(|c| c.connects(a, b)))
    }

    /// Neighbours of `node`, in slot order.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|n| {
                n.interfaces
                    .iter()
                    .filter_map(|id| self.channels.get(id)?.other_end(node))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Appends a node to its kind's collection.
    ///
    /// The node receives ordinal `count(kind)` and the matching display name. Any
    /// interfaces or peer addresses it carried are cleared; channels are attached
    /// separately.
    ///
    /// # Returns
    ///
    /// The ID of the inserted node.
    pub fn insert_node(&mut self, mut node: Node) -> NodeId {
        let id = node.id;
        let ordinal = self.count(node.kind);
        node.interfaces.clear();
        node.peer_addresses.clear();
        node.set_ordinal(ordinal);
        self.by_kind[node.kind.index()].push(id);
        log::trace!("inserted {} ({id})", node.display_name);
        self.nodes.insert(id, node);
        id
    }

    /// Reinserts a node at a given ordinal, shifting same-kind nodes at or above it up
    /// by one.
    pub fn insert_node_at(
        &mut self,
        mut node: Node,
        ordinal: usize,
    ) -> Result<NodeId, ConsistencyError> {
        let id = node.id;
        let kind = node.kind;
        if self.nodes.contains_key(&id) {
            return Err(ConsistencyError::DuplicateNode(id));
        }
        let count = self.count(kind);
        if ordinal > count {
            return Err(ConsistencyError::OrdinalOutOfRange {
                kind,
                ordinal,
                count,
            });
        }

        node.interfaces.clear();
        node.peer_addresses.clear();
        self.by_kind[kind.index()].insert(ordinal, id);
        self.nodes.insert(id, node);
        self.renumber_from(kind, ordinal);
        Ok(id)
    }

    /// Removes a node and every channel touching it.
    ///
    /// Channels are detached from the highest slot down, then the node leaves its
    /// kind's collection and later ordinals are shifted down.
    pub fn remove_node(&mut self, id: NodeId) -> Result<DetachedNode, ConsistencyError> {
        let (kind, ordinal) = match self.nodes.get(&id) {
            Some(node) => (node.kind, node.ordinal),
            None => return Err(ConsistencyError::MissingNode(id)),
        };
        if self.by_kind[kind.index()].get(ordinal) != Some(&id) {
            return Err(ConsistencyError::InvariantViolated(format!(
                "node {id} is not at ordinal {ordinal} of {kind:?}"
            )));
        }

        let mut channels = Vec::new();
        while let Some(channel) = self.nodes.get(&id).and_then(|n| n.interfaces.last().copied()) {
            channels.push(self.remove_channel(channel)?);
        }

        self.by_kind[kind.index()].remove(ordinal);
        let node = self
            .nodes
            .remove(&id)
            .ok_or(ConsistencyError::MissingNode(id))?;
        self.renumber_after_removal(kind, ordinal);
        log::trace!("removed {} ({id})", node.display_name);

        Ok(DetachedNode {
            node,
            ordinal,
            channels,
        })
    }

    /// Puts a detached node back at its ordinal and reattaches its channels.
    pub fn restore_node(&mut self, detached: DetachedNode) -> Result<NodeId, ConsistencyError> {
        let DetachedNode {
            node,
            ordinal,
            channels,
        } = detached;
        let id = self.insert_node_at(node, ordinal)?;
        for channel in channels.into_iter().rev() {
            self.attach_channel(channel)?;
        }
        Ok(id)
    }

    fn renumber_after_removal(&mut self, kind: NodeKind, removed_ordinal: usize) {
        self.renumber_from(kind, removed_ordinal);
    }

    fn renumber_from(&mut self, kind: NodeKind, start: usize) {
        for (ordinal, id) in self.by_kind[kind.index()].iter().enumerate().skip(start) {
            if let Some(node) = self.nodes.get_mut(id) {
                node.set_ordinal(ordinal);
            }
        }
    }

    /// Connects two nodes.
    ///
    /// The new channel takes the next free slot on each end. Router-like endpoints get
    /// a default address entry for the new neighbour.
    ///
    /// # Errors
    ///
    /// Refuses, without mutating anything, self channels, a second channel between the
    /// same pair, and unknown endpoints.
    pub fn insert_channel(
        &mut self,
        a: NodeId,
        b: NodeId,
        attributes: ChannelAttributes,
    ) -> Result<ChannelId, ValidationError> {
        if a == b {
            return Err(ValidationError::SelfChannel(a));
        }
        let slot_a = self
            .nodes
            .get(&a)
            .ok_or(ValidationError::UnknownNode(a))?
            .interfaces
            .len();
        let slot_b = self
            .nodes
            .get(&b)
            .ok_or(ValidationError::UnknownNode(b))?
            .interfaces
            .len();
        if self.channel_between(a, b).is_some() {
            return Err(ValidationError::DuplicateChannel { a, b });
        }

        let channel = Channel {
            id: Uuid::new_v4(),
            attributes,
            style: ChannelStyle::default(),
            ends: [
                ChannelEnd { node: a, slot: slot_a },
                ChannelEnd { node: b, slot: slot_b },
            ],
        };
        let id = channel.id;
        for (node, peer) in [(a, b), (b, a)] {
            if let Some(node) = self.nodes.get_mut(&node) {
                node.interfaces.push(id);
                if node.kind.keeps_peer_addresses() {
                    node.peer_addresses.insert(peer, AddressRecord::default());
                }
            }
        }
        self.channels.insert(id, channel);
        self.channel_order.push(id);
        Ok(id)
    }

    /// Disconnects a channel from both ends.
    ///
    /// Later slots on each endpoint shift down by one, and router-like endpoints drop
    /// the address entry for the lost neighbour.
    pub fn remove_channel(&mut self, id: ChannelId) -> Result<DetachedChannel, ConsistencyError> {
        let ends = self
            .channels
            .get(&id)
            .ok_or(ConsistencyError::MissingChannel(id))?
            .ends;
        for end in &ends {
            let node = self
                .nodes
                .get(&end.node)
                .ok_or(ConsistencyError::MissingNode(end.node))?;
            if node.interfaces.get(end.slot) != Some(&id) {
                return Err(ConsistencyError::SlotMismatch {
                    node: end.node,
                    channel: id,
                    slot: end.slot,
                });
            }
        }
        let order_index = self
            .channel_order
            .iter()
            .position(|c| *c == id)
            .ok_or_else(|| {
                ConsistencyError::InvariantViolated(format!("channel {id} missing from order"))
            })?;

        let mut addresses = [None, None];
        for (i, end) in ends.iter().enumerate() {
            let peer = ends[1 - i].node;
            if let Some(node) = self.nodes.get_mut(&end.node) {
                node.interfaces.remove(end.slot);
                addresses[i] = node.peer_addresses.remove(&peer);
            }
            self.resync_slots(end.node, end.slot);
        }
        self.channel_order.remove(order_index);
        let channel = self
            .channels
            .remove(&id)
            .ok_or(ConsistencyError::MissingChannel(id))?;

        Ok(DetachedChannel {
            channel,
            order_index,
            addresses,
        })
    }

    /// Reattaches a detached channel at its recorded slots and order position.
    ///
    /// Positions are clamped to the current list lengths, so a channel whose neighbours
    /// changed in the meantime still lands on a valid slot.
    pub fn attach_channel(&mut self, detached: DetachedChannel) -> Result<ChannelId, ConsistencyError> {
        let DetachedChannel {
            mut channel,
            order_index,
            addresses,
        } = detached;
        let id = channel.id;
        let [a, b] = channel.ends;
        if self.channels.contains_key(&id) {
            return Err(ConsistencyError::DuplicateChannel(id));
        }
        for end in [a, b] {
            if !self.nodes.contains_key(&end.node) {
                return Err(ConsistencyError::MissingNode(end.node));
            }
        }
        if a.node == b.node || self.channel_between(a.node, b.node).is_some() {
            return Err(ConsistencyError::ParallelChannel {
                a: a.node,
                b: b.node,
            });
        }

        let mut placed = [0usize; 2];
        for (i, end) in [a, b].iter().enumerate() {
            let peer = channel.ends[1 - i].node;
            if let Some(node) = self.nodes.get_mut(&end.node) {
                let slot = end.slot.min(node.interfaces.len());
                node.interfaces.insert(slot, id);
                if node.kind.keeps_peer_addresses() {
                    node.peer_addresses
                        .insert(peer, addresses[i].unwrap_or_default());
                }
                placed[i] = slot;
            }
        }
        channel.ends[0].slot = placed[0];
        channel.ends[1].slot = placed[1];
        self.channels.insert(id, channel);
        self.resync_slots(a.node, placed[0]);
        self.resync_slots(b.node, placed[1]);

        let index = order_index.min(self.channel_order.len());
        self.channel_order.insert(index, id);
        Ok(id)
    }

    fn resync_slots(&mut self, node: NodeId, from: usize) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        for (slot, channel) in n.interfaces.iter().enumerate().skip(from) {
            if let Some(end) = self
                .channels
                .get_mut(channel)
                .and_then(|c| c.end_at_mut(node))
            {
                end.slot = slot;
            }
        }
    }

    /// Verifies dense ordinals, dense slots, the absence of self and parallel
    /// channels, and peer-address coherence.
    pub fn check_invariants(&self) -> Result<(), ConsistencyError> {
        let broken = |msg: String| -> Result<(), ConsistencyError> {
            Err(ConsistencyError::InvariantViolated(msg))
        };

        let mut listed = 0;
        for kind in NodeKind::ALL {
            for (ordinal, id) in self.by_kind[kind.index()].iter().enumerate() {
                let Some(node) = self.nodes.get(id) else {
                    return Err(ConsistencyError::MissingNode(*id));
                };
                if node.kind != kind || node.ordinal != ordinal {
                    return broken(format!(
                        "{id} listed as {kind:?} #{ordinal} but is {:?} #{}",
                        node.kind, node.ordinal
                    ));
                }
                if node.display_name != kind.display_name(ordinal) {
                    return broken(format!("stale display name on {id}"));
                }
                listed += 1;
            }
        }
        if listed != self.nodes.len() {
            return broken(format!(
                "{} nodes stored but {listed} listed by kind",
                self.nodes.len()
            ));
        }

        if self.channel_order.len() != self.channels.len() {
            return broken("channel order out of sync".to_string());
        }
        let mut pairs = std::collections::HashSet::new();
        for channel in self.channels() {
            let [a, b] = channel.ends;
            if a.node == b.node {
                return broken(format!("channel {} is a self loop", channel.id));
            }
            let pair = if a.node < b.node { (a.node, b.node) } else { (b.node, a.node) };
            if !pairs.insert(pair) {
                return broken(format!("parallel channel {}", channel.id));
            }
            for end in [a, b] {
                let node = self
                    .nodes
                    .get(&end.node)
                    .ok_or(ConsistencyError::MissingNode(end.node))?;
                if node.interfaces.get(end.slot) != Some(&channel.id) {
                    return Err(ConsistencyError::SlotMismatch {
                        node: end.node,
                        channel: channel.id,
                        slot: end.slot,
                    });
                }
            }
        }

        let mut incident = 0;
        for node in self.nodes.values() {
            for channel in &node.interfaces {
                if !self.channels.contains_key(channel) {
                    return Err(ConsistencyError::MissingChannel(*channel));
                }
            }
            incident += node.interfaces.len();

            let neighbors = self.neighbors(node.id);
            if node.kind.keeps_peer_addresses() {
                let coherent = neighbors.len() == node.peer_addresses.len()
                    && neighbors.iter().all(|p| node.peer_addresses.contains_key(p));
                if !coherent {
                    return broken(format!("address map of {} out of sync", node.display_name));
                }
            } else if !node.peer_addresses.is_empty() {
                return broken(format!("{} should not keep peer addresses", node.display_name));
            }
        }
        if incident != 2 * self.channels.len() {
            return broken(format!(
                "{incident} channel ends listed for {} channels",
                self.channels.len()
            ));
        }
        Ok(())
    }
}
