//! Copied selections and the Cut/Paste commands that move them.

use std::collections::{HashMap, HashSet};

use crate::error::{ConsistencyError, Result, ValidationError};
use crate::store::{DetachedChannel, DetachedNode, GraphStore};
use crate::types::*;

use super::command::{ChangeSet, Reversible};

/// A node as captured on the clipboard.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardNode {
    /// ID of the node the snapshot was taken from
    pub source: NodeId,
    /// Kind of the copied node
    pub kind: NodeKind,
    /// Canvas position at capture time
    pub position: (f32, f32),
    /// Kind-specific parameters
    pub attributes: NodeAttributes,
    /// Host address
    pub host: AddressRecord,
    /// Interface addresses toward other captured nodes
    pub peer_addresses: Vec<(NodeId, AddressRecord)>,
}

/// A channel as captured on the clipboard; both ends refer to captured nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardChannel {
    /// Source ID of the first endpoint
    pub a: NodeId,
    /// Source ID of the second endpoint
    pub b: NodeId,
    /// Bandwidth and delay
    pub attributes: ChannelAttributes,
    /// Stroke used when drawn
    pub style: ChannelStyle,
}

/// A snapshot of selected nodes and the channels running between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clipboard {
    nodes: Vec<ClipboardNode>,
    channels: Vec<ClipboardChannel>,
}

impl Clipboard {
    /// Captures `nodes` and those of `channels` whose endpoints are both selected.
    ///
    /// Nodes are stored in kind-then-ordinal order and channels in global channel
    /// order, so pasting assigns ordinals and slots deterministically.
    pub fn capture(
        store: &GraphStore,
        nodes: &[NodeId],
        channels: &[ChannelId],
    ) -> Result<Self, ValidationError> {
        for id in nodes {
            if store.node(*id).is_none() {
                return Err(ValidationError::UnknownNode(*id));
            }
        }
        for id in channels {
            if store.channel(*id).is_none() {
                return Err(ValidationError::UnknownChannel(*id));
            }
        }

        let selected: HashSet<NodeId> = nodes.iter().copied().collect();
        let wanted: HashSet<ChannelId> = channels.iter().copied().collect();

        let nodes = store
            .nodes()
            .filter(|n| selected.contains(&n.id))
            .map(|n| ClipboardNode {
                source: n.id,
                kind: n.kind,
                position: n.position,
                attributes: n.attributes.clone(),
                host: n.host,
                peer_addresses: n
                    .peer_addresses()
                    .iter()
                    .filter(|(peer, _)| selected.contains(peer))
                    .map(|(peer, record)| (*peer, *record))
                    .collect(),
            })
            .collect();

        let channels = store
            .channels()
            .filter(|c| wanted.contains(&c.id))
            .filter(|c| c.ends().iter().all(|end| selected.contains(&end.node)))
            .map(|c| ClipboardChannel {
                a: c.ends()[0].node,
                b: c.ends()[1].node,
                attributes: c.attributes,
                style: c.style,
            })
            .collect();

        Ok(Self { nodes, channels })
    }

    /// Captures `nodes` together with every channel running between two of them.
    pub fn capture_induced(store: &GraphStore, nodes: &[NodeId]) -> Result<Self, ValidationError> {
        let selected: HashSet<NodeId> = nodes.iter().copied().collect();
        let induced: Vec<ChannelId> = store
            .channels()
            .filter(|c| c.ends().iter().all(|end| selected.contains(&end.node)))
            .map(|c| c.id)
            .collect();
        Self::capture(store, nodes, &induced)
    }

    /// Captured nodes, in paste order.
    pub fn nodes(&self) -> &[ClipboardNode] {
        &self.nodes
    }

    /// Captured channels, in paste order.
    pub fn channels(&self) -> &[ClipboardChannel] {
        &self.channels
    }

    /// Returns true if there is nothing to paste.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Removes a selection of nodes and channels.
#[derive(Debug, Clone)]
pub struct Cut {
    nodes: Vec<NodeId>,
    channels: Vec<ChannelId>,
    removed_channels: Vec<DetachedChannel>,
    removed_nodes: Vec<DetachedNode>,
}

impl Cut {
    /// Prepares a cut of the selection; duplicates are ignored.
    pub fn new(nodes: &[NodeId], channels: &[ChannelId]) -> Result<Self, ValidationError> {
        if nodes.is_empty() && channels.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        let mut unique_nodes = Vec::with_capacity(nodes.len());
        for id in nodes {
            if !unique_nodes.contains(id) {
                unique_nodes.push(*id);
            }
        }
        let mut unique_channels = Vec::with_capacity(channels.len());
        for id in channels {
            if !unique_channels.contains(id) {
                unique_channels.push(*id);
            }
        }
        Ok(Self {
            nodes: unique_nodes,
            channels: unique_channels,
            removed_channels: Vec::new(),
            removed_nodes: Vec::new(),
        })
    }
}

impl Reversible for Cut {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        for id in &self.nodes {
            if store.node(*id).is_none() {
                return Err(ConsistencyError::MissingNode(*id).into());
            }
        }
        for id in &self.channels {
            if store.channel(*id).is_none() {
                return Err(ConsistencyError::MissingChannel(*id).into());
            }
        }

        let mut doomed = self.channels.clone();
        for id in &self.nodes {
            if let Some(node) = store.node(*id) {
                for channel in node.interfaces() {
                    if !doomed.contains(channel) {
                        doomed.push(*channel);
                    }
                }
            }
        }

        let mut changes = ChangeSet::default();
        let mut removed_channels = Vec::with_capacity(doomed.len());
        for id in doomed {
            removed_channels.push(store.remove_channel(id)?);
            changes.removed_channels.push(id);
        }
        let mut removed_nodes = Vec::with_capacity(self.nodes.len());
        for id in &self.nodes {
            let detached = store.remove_node(*id)?;
            changes.record_detached_node(&detached);
            removed_nodes.push(detached);
        }

        self.removed_channels = removed_channels;
        self.removed_nodes = removed_nodes;
        Ok(changes)
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        if self.removed_nodes.is_empty() && self.removed_channels.is_empty() {
            return Err(ConsistencyError::NothingToRestore("Cut").into());
        }
        let mut changes = ChangeSet::default();
        for detached in self.removed_nodes.iter().rev() {
            changes.record_restored_node(detached);
            store.restore_node(detached.clone())?;
        }
        for detached in self.removed_channels.iter().rev() {
            changes.added_channels.push(store.attach_channel(detached.clone())?);
        }
        self.removed_nodes.clear();
        self.removed_channels.clear();
        Ok(changes)
    }

    fn label(&self) -> String {
        "Cut".to_string()
    }
}

/// Inserts clones of a clipboard selection, offset from the originals.
#[derive(Debug, Clone)]
pub struct Paste {
    clipboard: Clipboard,
    offset: (f32, f32),
    created: Vec<NodeId>,
    stash: Option<Vec<DetachedNode>>,
}

impl Paste {
    /// Prepares a paste of `clipboard`, shifted by `offset`.
    pub fn new(clipboard: Clipboard, offset: (f32, f32)) -> Result<Self, ValidationError> {
        if clipboard.is_empty() {
            return Err(ValidationError::EmptyClipboard);
        }
        Ok(Self {
            clipboard,
            offset,
            created: Vec::new(),
            stash: None,
        })
    }

    /// IDs of the pasted clones, in creation order.
    pub fn created(&self) -> &[NodeId] {
        &self.created
    }

    fn clone_selection(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let mut changes = ChangeSet::default();
        let mut mapping = HashMap::with_capacity(self.clipboard.nodes.len());

        for source in &self.clipboard.nodes {
            let mut node = Node::new(
                source.kind,
                (
                    source.position.0 + self.offset.0,
                    source.position.1 + self.offset.1,
                ),
            );
            node.attributes = source.attributes.clone();
            node.host = source.host;
            let id = store.insert_node(node);
            mapping.insert(source.source, id);
            changes.added_nodes.push(id);
        }

        for source in &self.clipboard.channels {
            let (Some(&a), Some(&b)) = (mapping.get(&source.a), mapping.get(&source.b)) else {
                continue;
            };
            let id = store.insert_channel(a, b, source.attributes)?;
            if let Some(channel) = store.channel_mut(id) {
                channel.style = source.style;
            }
            changes.added_channels.push(id);
        }

        for source in &self.clipboard.nodes {
            let Some(&clone) = mapping.get(&source.source) else {
                continue;
            };
            for (peer, record) in &source.peer_addresses {
                let Some(&peer_clone) = mapping.get(peer) else {
                    continue;
                };
                if let Some(entry) = store
                    .node_mut(clone)
                    .and_then(|node| node.peer_addresses.get_mut(&peer_clone))
                {
                    *entry = *record;
                }
            }
        }

        self.created = changes.added_nodes.clone();
        Ok(changes)
    }
}

impl Reversible for Paste {
    fn apply(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        let Some(stash) = self.stash.clone() else {
            if !self.created.is_empty() {
                return Err(ConsistencyError::NothingToRestore("Paste").into());
            }
            return self.clone_selection(store);
        };

        let mut changes = ChangeSet::default();
        for detached in stash.into_iter().rev() {
            changes.record_restored_node(&detached);
            store.restore_node(detached)?;
        }
        self.stash = None;
        Ok(changes)
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<ChangeSet> {
        if self.created.is_empty() {
            return Err(ConsistencyError::NothingToRestore("Paste").into());
        }
        let mut changes = ChangeSet::default();
        let mut stash = Vec::with_capacity(self.created.len());
        for id in self.created.iter().rev() {
            let detached = store.remove_node(*id)?;
            changes.record_detached_node(&detached);
            stash.push(detached);
        }
        self.stash = Some(stash);
        Ok(changes)
    }

    fn label(&self) -> String {
        match self.clipboard.nodes.len() {
            1 => "Paste node".to_string(),
            n => format!("Paste {n} nodes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    /// Router 1 - Router 2 - User Terminal 1, plus Router 1 - Compute Server 1.
    fn sample() -> (GraphStore, Vec<NodeId>, Vec<ChannelId>) {
        let mut store = GraphStore::new();
        let r1 = store.insert_node(Node::new(NodeKind::Router, (0.0, 0.0)));
        let r2 = store.insert_node(Node::new(NodeKind::Router, (100.0, 0.0)));
        let ut = store.insert_node(Node::new(NodeKind::UserTerminal, (200.0, 0.0)));
        let cs = store.insert_node(Node::new(NodeKind::ComputeServer, (0.0, 100.0)));
        let c1 = store.insert_channel(r1, r2, ChannelAttributes::default()).unwrap();
        let c2 = store.insert_channel(r2, ut, ChannelAttributes::default()).unwrap();
        let c3 = store.insert_channel(r1, cs, ChannelAttributes::default()).unwrap();
        (store, vec![r1, r2, ut, cs], vec![c1, c2, c3])
    }

    #[test]
    fn capture_keeps_only_internal_channels() {
        let (store, nodes, channels) = sample();
        let clipboard = Clipboard::capture(&store, &nodes[..2], &channels).unwrap();

        assert_eq!(clipboard.nodes().len(), 2);
        assert_eq!(clipboard.channels().len(), 1);
        assert_eq!(clipboard.channels()[0].a, nodes[0]);
        assert_eq!(clipboard.nodes()[0].peer_addresses.len(), 1);
    }

    #[test]
    fn capture_rejects_unknown_ids() {
        let (store, _, _) = sample();
        let stray = uuid::Uuid::new_v4();
        assert_eq!(
            Clipboard::capture(&store, &[stray], &[]),
            Err(ValidationError::UnknownNode(stray))
        );
    }

    #[test]
    fn paste_clones_with_fresh_ordinals_and_offset() {
        let (mut store, nodes, channels) = sample();
        let clipboard = Clipboard::capture(&store, &nodes[..2], &channels).unwrap();
        let mut paste = Paste::new(clipboard, (30.0, 30.0)).unwrap();

        let changes = paste.apply(&mut store).unwrap();

        assert_eq!(changes.added_nodes.len(), 2);
        assert_eq!(changes.added_channels.len(), 1);
        let first = store.node(paste.created()[0]).unwrap();
        assert_eq!(first.display_name(), "Router 3");
        assert_eq!(first.position, (30.0, 30.0));
        assert_eq!(store.node(paste.created()[1]).unwrap().display_name(), "Router 4");
        store.check_invariants().unwrap();
    }

    #[test]
    fn paste_copies_style_and_internal_addresses() {
        let (mut store, nodes, channels) = sample();
        let record = AddressRecord::new(Ipv4Addr::new(10, 1, 0, 1), Ipv4Addr::new(255, 255, 255, 252));
        *store
            .node_mut(nodes[0])
            .unwrap()
            .peer_addresses
            .get_mut(&nodes[1])
            .unwrap() = record;
        store.channel_mut(channels[0]).unwrap().style.color = [200, 0, 0];

        let clipboard = Clipboard::capture_induced(&store, &nodes[..2]).unwrap();
        let mut paste = Paste::new(clipboard, (0.0, 0.0)).unwrap();
        paste.apply(&mut store).unwrap();

        let (a, b) = (paste.created()[0], paste.created()[1]);
        assert_eq!(store.node(a).unwrap().peer_address(b), Some(&record));
        let clone = store.channel_between(a, b).unwrap();
        assert_eq!(store.channel(clone).unwrap().style.color, [200, 0, 0]);
    }

    #[test]
    fn paste_redo_restores_same_clones() {
        let (mut store, nodes, _) = sample();
        let clipboard = Clipboard::capture_induced(&store, &nodes).unwrap();
        let mut paste = Paste::new(clipboard, (10.0, 10.0)).unwrap();

        paste.apply(&mut store).unwrap();
        let after_paste = store.clone();
        let created = paste.created().to_vec();

        paste.revert(&mut store).unwrap();
        assert_eq!(store.node_count(), 4);
        paste.apply(&mut store).unwrap();

        assert_eq!(paste.created(), created.as_slice());
        assert_eq!(store, after_paste);
    }

    #[test]
    fn paste_refuses_empty_clipboard() {
        assert_eq!(
            Paste::new(Clipboard::default(), (0.0, 0.0)).err(),
            Some(ValidationError::EmptyClipboard)
        );
    }

    #[test]
    fn cut_removes_selection_and_incident_channels() {
        let (mut store, nodes, _) = sample();
        let before = store.clone();
        let mut cut = Cut::new(&[nodes[1]], &[]).unwrap();

        let changes = cut.apply(&mut store).unwrap();

        assert_eq!(changes.removed_nodes, vec![nodes[1]]);
        assert_eq!(changes.removed_channels.len(), 2);
        assert_eq!(store.count(NodeKind::Router), 1);
        assert_eq!(store.node(nodes[0]).unwrap().interface_count(), 1);
        store.check_invariants().unwrap();

        cut.revert(&mut store).unwrap();
        assert_eq!(store, before);
    }

    #[test]
    fn cut_of_lone_channel_keeps_nodes() {
        let (mut store, nodes, channels) = sample();
        let mut cut = Cut::new(&[], &[channels[2]]).unwrap();

        cut.apply(&mut store).unwrap();

        assert_eq!(store.node_count(), nodes.len());
        assert_eq!(store.channel_count(), 2);
    }

    #[test]
    fn cut_requires_selection() {
        assert_eq!(Cut::new(&[], &[]).err(), Some(ValidationError::EmptySelection));
    }
}
