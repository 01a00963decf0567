//! Core data types for the topology model.
//!
//! This module defines the passive entities of a topology diagram: nodes of the six
//! network kinds, the channels connecting them, and the addressing and attribute
//! records they carry. Structural mutation lives in [`crate::store::GraphStore`].

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::*;
use crate::error::ValidationError;

/// Unique, stable identifier for topology nodes.
pub type NodeId = Uuid;

/// Unique, stable identifier for channels.
pub type ChannelId = Uuid;

/// The closed set of node categories a topology can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// An end-user host that submits tasks
    UserTerminal,
    /// A server that executes tasks
    ComputeServer,
    /// Gateway in front of user terminals
    UserGateway,
    /// Gateway in front of compute servers
    ComputeGateway,
    /// A plain OSPF router
    Router,
    /// The node making scheduling decisions
    ScheduleNode,
}

impl NodeKind {
    /// Number of node kinds.
    pub const COUNT: usize = 6;

    /// Every kind, in the canonical order used for iteration and export.
    pub const ALL: [NodeKind; NodeKind::COUNT] = [
        NodeKind::UserTerminal,
        NodeKind::ComputeServer,
        NodeKind::UserGateway,
        NodeKind::ComputeGateway,
        NodeKind::Router,
        NodeKind::ScheduleNode,
    ];

    /// Position of this kind in [`NodeKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            NodeKind::UserTerminal => 0,
            NodeKind::ComputeServer => 1,
            NodeKind::UserGateway => 2,
            NodeKind::ComputeGateway => 3,
            NodeKind::Router => 4,
            NodeKind::ScheduleNode => 5,
        }
    }

    /// Whether nodes of this kind keep a per-peer address map.
    ///
    /// Gateways and routers address each interface separately; the other kinds only
    /// have a single host address.
    pub fn keeps_peer_addresses(self) -> bool {
        matches!(
            self,
            NodeKind::UserGateway | NodeKind::ComputeGateway | NodeKind::Router
        )
    }

    /// Human readable label used to build display names.
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::UserTerminal => "User Terminal",
            NodeKind::ComputeServer => "Compute Server",
            NodeKind::UserGateway => "User Gateway",
            NodeKind::ComputeGateway => "Compute Gateway",
            NodeKind::Router => "Router",
            NodeKind::ScheduleNode => "Schedule Node",
        }
    }

    /// Identifier prefix of this kind inside simulator configuration files.
    pub fn config_prefix(self) -> &'static str {
        match self {
            NodeKind::UserTerminal => "UserNode",
            NodeKind::ComputeServer => "ComputeNode",
            NodeKind::UserGateway => "UserGateway",
            NodeKind::ComputeGateway => "ComputingGateway",
            NodeKind::Router => "Router",
            NodeKind::ScheduleNode => "ComputeScheduleNode",
        }
    }

    /// Simulator module type instantiated for this kind.
    pub fn module_type(self) -> &'static str {
        match self {
            NodeKind::Router => "OspfRouter",
            other => other.config_prefix(),
        }
    }

    /// Builds the display name of the node with the given ordinal.
    pub fn display_name(self, ordinal: usize) -> String {
        format!("{} {}", self.label(), ordinal + 1)
    }
}

/// An IPv4 address and subnet mask pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Assigned address, if the user configured one
    pub address: Option<Ipv4Addr>,
    /// Subnet mask
    pub mask: Ipv4Addr,
}

impl Default for AddressRecord {
    fn default() -> Self {
        Self {
            address: None,
            mask: DEFAULT_MASK,
        }
    }
}

impl AddressRecord {
    /// Creates a record with an assigned address.
    pub fn new(address: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Self {
            address: Some(address),
            mask,
        }
    }

    /// Checks that the mask is a run of ones followed by a run of zeros.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let bits = u32::from(self.mask);
        if bits.leading_ones() + bits.trailing_zeros() == 32 {
            Ok(())
        } else {
            Err(ValidationError::InvalidMask(self.mask))
        }
    }
}

/// Kind-specific node parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeAttributes {
    /// Parameters of a user terminal
    UserTerminal {
        /// Largest task size the terminal generates
        task_upper_limit: f64,
        /// Smallest task size the terminal generates
        task_lower_limit: f64,
    },
    /// Parameters of a compute server
    ComputeServer {
        /// Free-form processor category (e.g. "CPU", "GPU")
        computing_type: String,
        /// Processing capacity
        computing_power: f64,
        /// Storage capacity
        storage_space: f64,
        /// Switching capacitance used by the power model
        switching_capacitance: f64,
        /// Static power draw
        static_power: f64,
        /// Price per unit of work
        price: f64,
    },
    /// Gateways and routers carry no extra parameters
    Forwarding,
    /// The schedule node carries no extra parameters
    Scheduler,
}

impl NodeAttributes {
    /// Returns the default attribute bag for a node kind.
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::UserTerminal => NodeAttributes::UserTerminal {
                task_upper_limit: DEFAULT_TASK_UPPER_LIMIT,
                task_lower_limit: DEFAULT_TASK_LOWER_LIMIT,
            },
            NodeKind::ComputeServer => NodeAttributes::ComputeServer {
                computing_type: "CPU".to_string(),
                computing_power: 0.0,
                storage_space: DEFAULT_STORAGE_SPACE,
                switching_capacitance: 0.0,
                static_power: 0.0,
                price: 0.0,
            },
            NodeKind::UserGateway | NodeKind::ComputeGateway | NodeKind::Router => {
                NodeAttributes::Forwarding
            }
            NodeKind::ScheduleNode => NodeAttributes::Scheduler,
        }
    }

    /// Whether this attribute bag belongs to nodes of `kind`.
    pub fn matches(&self, kind: NodeKind) -> bool {
        match self {
            NodeAttributes::UserTerminal { .. } => kind == NodeKind::UserTerminal,
            NodeAttributes::ComputeServer { .. } => kind == NodeKind::ComputeServer,
            NodeAttributes::Forwarding => kind.keeps_peer_addresses(),
            NodeAttributes::Scheduler => kind == NodeKind::ScheduleNode,
        }
    }

    /// Rejects non-finite numeric parameters, which JSON cannot represent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields: Vec<(&'static str, f64)> = match self {
            NodeAttributes::UserTerminal {
                task_upper_limit,
                task_lower_limit,
            } => vec![
                ("task_upper_limit", *task_upper_limit),
                ("task_lower_limit", *task_lower_limit),
            ],
            NodeAttributes::ComputeServer {
                computing_power,
                storage_space,
                switching_capacitance,
                static_power,
                price,
                ..
            } => vec![
                ("computing_power", *computing_power),
                ("storage_space", *storage_space),
                ("switching_capacitance", *switching_capacitance),
                ("static_power", *static_power),
                ("price", *price),
            ],
            NodeAttributes::Forwarding | NodeAttributes::Scheduler => Vec::new(),
        };
        match fields.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((field, value)) => Err(ValidationError::InvalidNodeAttribute { field, value }),
            None => Ok(()),
        }
    }
}

/// Rejects a canvas position with a NaN or infinite coordinate.
pub fn validate_position(position: (f32, f32)) -> Result<(), ValidationError> {
    let (x, y) = position;
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::InvalidPosition { x, y })
    }
}

/// A single node in the topology.
///
/// The ordinal and display name are owned by the store: they are assigned on
/// insertion and rewritten whenever a same-kind node before this one is removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Stable identifier for this node
    pub id: NodeId,
    /// Category of the node
    pub kind: NodeKind,
    /// Position on the canvas as (x, y) coordinates
    pub position: (f32, f32),
    /// Kind-specific parameters
    pub attributes: NodeAttributes,
    /// Host address of the node itself
    pub host: AddressRecord,
    pub(crate) ordinal: usize,
    pub(crate) display_name: String,
    pub(crate) interfaces: Vec<ChannelId>,
    pub(crate) peer_addresses: BTreeMap<NodeId, AddressRecord>,
}

impl Node {
    /// Creates a detached node with default attributes for its kind.
    ///
    /// # Arguments
    ///
    /// * `kind` - The category of the node
    /// * `position` - The (x, y) position on the canvas
    ///
    /// # Returns
    ///
    /// A new `Node` with a unique ID and no interfaces. Its ordinal is assigned when it
    /// is inserted into a store.
    pub fn new(kind: NodeKind, position: (f32, f32)) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            position,
            attributes: NodeAttributes::default_for(kind),
            host: AddressRecord::default(),
            ordinal: 0,
            display_name: kind.display_name(0),
            interfaces: Vec::new(),
            peer_addresses: BTreeMap::new(),
        }
    }

    /// Zero-based sequence number among nodes of the same kind.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Name derived from kind and ordinal, e.g. `"Router 2"`.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Channels attached to this node; index `i` is interface `i`.
    pub fn interfaces(&self) -> &[ChannelId] {
        &self.interfaces
    }

    /// Number of attached channels.
    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Interface slot occupied by `channel`, if attached here.
    pub fn slot_of(&self, channel: ChannelId) -> Option<usize> {
        self.interfaces.iter().position(|c| *c == channel)
    }

    /// Per-peer addresses, keyed by neighbouring node. Empty for non-router kinds.
    pub fn peer_addresses(&self) -> &BTreeMap<NodeId, AddressRecord> {
        &self.peer_addresses
    }

    /// Address used on the interface facing `peer`.
    pub fn peer_address(&self, peer: NodeId) -> Option<&AddressRecord> {
        self.peer_addresses.get(&peer)
    }

    pub(crate) fn set_ordinal(&mut self, ordinal: usize) {
        self.ordinal = ordinal;
        self.display_name = self.kind.display_name(ordinal);
    }
}

/// One end of a channel: the node and the interface slot it occupies there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEnd {
    /// Node on this end
    pub node: NodeId,
    /// Interface slot on that node
    pub slot: usize,
}

/// Link parameters written into the simulator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelAttributes {
    /// Bandwidth in Mbps
    pub bandwidth: f64,
    /// Propagation delay in milliseconds
    pub delay: f64,
}

impl Default for ChannelAttributes {
    fn default() -> Self {
        Self {
            bandwidth: DEFAULT_BANDWIDTH_MBPS,
            delay: DEFAULT_DELAY_MS,
        }
    }
}

impl ChannelAttributes {
    /// Rejects negative or non-finite values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [("bandwidth", self.bandwidth), ("delay", self.delay)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidChannelAttribute { field, value });
            }
        }
        Ok(())
    }
}

/// Presentation style of a channel line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStyle {
    /// Stroke color (RGB)
    pub color: [u8; 3],
    /// Stroke width in screen pixels
    pub width: f32,
}

impl Default for ChannelStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_CHANNEL_COLOR,
            width: DEFAULT_CHANNEL_WIDTH,
        }
    }
}

/// An undirected point-to-point link between two distinct nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Stable identifier for this channel
    pub id: ChannelId,
    /// Bandwidth and delay
    pub attributes: ChannelAttributes,
    /// How the channel is drawn
    pub style: ChannelStyle,
    pub(crate) ends: [ChannelEnd; 2],
}

impl Channel {
    /// Both ends of the channel, in creation order.
    pub fn ends(&self) -> &[ChannelEnd; 2] {
        &self.ends
    }

    /// The end attached to `node`.
    pub fn end_at(&self, node: NodeId) -> Option<&ChannelEnd> {
        self.ends.iter().find(|end| end.node == node)
    }

    /// The node on the other side of `node`.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        match self.ends {
            [a, b] if a.node == node => Some(b.node),
            [a, b] if b.node == node => Some(a.node),
            _ => None,
        }
    }

    /// Whether this channel joins `a` and `b`, in either direction.
    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        let [x, y] = self.ends;
        (x.node == a && y.node == b) || (x.node == b && y.node == a)
    }

    pub(crate) fn end_at_mut(&mut self, node: NodeId) -> Option<&mut ChannelEnd> {
        self.ends.iter_mut().find(|end| end.node == node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = Node::new(NodeKind::Router, (100.0, 200.0));

        assert_eq!(node.kind, NodeKind::Router);
        assert_eq!(node.position, (100.0, 200.0));
        assert_eq!(node.attributes, NodeAttributes::Forwarding);
        assert!(node.interfaces().is_empty());
        assert!(node.peer_addresses().is_empty());
        assert!(!node.id.is_nil());
    }

    #[test]
    fn test_display_name_follows_ordinal() {
        let mut node = Node::new(NodeKind::UserTerminal, (0.0, 0.0));
        assert_eq!(node.display_name(), "User Terminal 1");

        node.set_ordinal(4);
        assert_eq!(node.ordinal(), 4);
        assert_eq!(node.display_name(), "User Terminal 5");
    }

    #[test]
    fn test_kind_index_matches_all() {
        for (i, kind) in NodeKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_router_like_kinds() {
        let router_like: Vec<_> = NodeKind::ALL
            .iter()
            .copied()
            .filter(|k| k.keeps_peer_addresses())
            .collect();
        assert_eq!(
            router_like,
            vec![NodeKind::UserGateway, NodeKind::ComputeGateway, NodeKind::Router]
        );
    }

    #[test]
    fn test_default_attributes_match_kind() {
        for kind in NodeKind::ALL {
            assert!(NodeAttributes::default_for(kind).matches(kind));
        }
        assert!(!NodeAttributes::Scheduler.matches(NodeKind::Router));
        assert!(!NodeAttributes::Forwarding.matches(NodeKind::ComputeServer));
    }

    #[test]
    fn test_user_terminal_defaults() {
        if let NodeAttributes::UserTerminal {
            task_upper_limit,
            task_lower_limit,
        } = NodeAttributes::default_for(NodeKind::UserTerminal)
        {
            assert_eq!(task_upper_limit, 2.56e6);
            assert_eq!(task_lower_limit, 0.0);
        } else {
            panic!("Expected UserTerminal attributes");
        }
    }

    #[test]
    fn test_mask_validation() {
        let good = AddressRecord::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 240, 0));
        assert!(good.validate().is_ok());

        let all_zero = AddressRecord::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::UNSPECIFIED);
        assert!(all_zero.validate().is_ok());

        let holey = AddressRecord::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 0, 255, 0));
        assert_eq!(
            holey.validate(),
            Err(ValidationError::InvalidMask(Ipv4Addr::new(255, 0, 255, 0)))
        );
    }

    #[test]
    fn test_node_attribute_validation() {
        for kind in NodeKind::ALL {
            assert!(NodeAttributes::default_for(kind).validate().is_ok());
        }

        let unbounded = NodeAttributes::UserTerminal {
            task_upper_limit: f64::INFINITY,
            task_lower_limit: 1.0,
        };
        assert!(matches!(
            unbounded.validate(),
            Err(ValidationError::InvalidNodeAttribute { field: "task_upper_limit", .. })
        ));

        let mut server = NodeAttributes::default_for(NodeKind::ComputeServer);
        if let NodeAttributes::ComputeServer { price, .. } = &mut server {
            *price = f64::NAN;
        }
        assert!(matches!(
            server.validate(),
            Err(ValidationError::InvalidNodeAttribute { field: "price", .. })
        ));
    }

    #[test]
    fn test_position_validation() {
        assert!(validate_position((-20.0, 1e6)).is_ok());
        assert!(validate_position((f32::NAN, 1.0)).is_err());
        assert!(validate_position((0.0, f32::NEG_INFINITY)).is_err());
    }

    #[test]
    fn test_channel_attribute_validation() {
        assert!(ChannelAttributes::default().validate().is_ok());

        let negative = ChannelAttributes {
            bandwidth: -1.0,
            delay: 10.0,
        };
        assert!(matches!(
            negative.validate(),
            Err(ValidationError::InvalidChannelAttribute { field: "bandwidth", .. })
        ));

        let nan_delay = ChannelAttributes {
            bandwidth: 1.0,
            delay: f64::NAN,
        };
        assert!(nan_delay.validate().is_err());
    }

    #[test]
    fn test_channel_ends() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let channel = Channel {
            id: Uuid::new_v4(),
            attributes: ChannelAttributes::default(),
            style: ChannelStyle::default(),
            ends: [ChannelEnd { node: a, slot: 0 }, ChannelEnd { node: b, slot: 3 }],
        };

        assert_eq!(channel.other_end(a), Some(b));
        assert_eq!(channel.other_end(b), Some(a));
        assert_eq!(channel.other_end(Uuid::new_v4()), None);
        assert!(channel.connects(b, a));
        assert_eq!(channel.end_at(b).map(|e| e.slot), Some(3));
    }
}
