//! Versioned JSON form of a topology.
//!
//! Nodes are written by `(kind, ordinal)` and channels refer to their endpoints the
//! same way, in global channel order. Loading replays the channel records through
//! [`GraphStore::insert_channel`], which reproduces every interface slot, and builds
//! the whole topology in a scratch store that is only handed out once it passes
//! [`GraphStore::check_invariants`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::TOPOLOGY_SCHEMA_VERSION;
use crate::error::{PersistenceError, ValidationError};
use crate::store::GraphStore;
use crate::types::*;

/// Display identity of a node inside a topology file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    /// Node kind
    pub kind: NodeKind,
    /// Zero-based ordinal within the kind
    pub ordinal: usize,
}

/// One interface address of a gateway or router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerAddressRecord {
    /// Neighbour the interface faces
    pub peer: NodeRef,
    /// Address and mask
    pub record: AddressRecord,
}

/// A persisted node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node kind
    pub kind: NodeKind,
    /// Zero-based ordinal within the kind
    pub ordinal: usize,
    /// Canvas position
    pub position: (f32, f32),
    /// Kind-specific parameters
    pub attributes: NodeAttributes,
    /// Host address
    #[serde(default)]
    pub host: AddressRecord,
    /// Interface addresses in interface slot order, for gateways and routers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peer_addresses: Vec<PeerAddressRecord>,
}

/// A persisted channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// First endpoint
    pub a: NodeRef,
    /// Second endpoint
    pub b: NodeRef,
    /// Bandwidth and delay
    #[serde(default)]
    pub attributes: ChannelAttributes,
    /// Stroke used when drawn
    #[serde(default)]
    pub style: ChannelStyle,
}

/// Root object of a topology file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyFile {
    /// Format version; see [`TOPOLOGY_SCHEMA_VERSION`]
    pub schema_version: u16,
    /// Nodes in kind-then-ordinal order
    pub nodes: Vec<NodeRecord>,
    /// Channels in global order
    pub channels: Vec<ChannelRecord>,
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u16,
}

fn node_ref(node: &Node) -> NodeRef {
    NodeRef {
        kind: node.kind,
        ordinal: node.ordinal(),
    }
}

fn resolve(store: &GraphStore, r: NodeRef) -> Result<NodeId, PersistenceError> {
    store
        .node_at(r.kind, r.ordinal)
        .map(|n| n.id)
        .ok_or(PersistenceError::UnknownEndpoint {
            kind: r.kind,
            ordinal: r.ordinal,
        })
}

impl TopologyFile {
    /// Captures the current state of `store`.
    pub fn from_store(store: &GraphStore) -> Self {
        let nodes = store
            .nodes()
            .map(|node| NodeRecord {
                kind: node.kind,
                ordinal: node.ordinal(),
                position: node.position,
                attributes: node.attributes.clone(),
                host: node.host,
                peer_addresses: node
                    .interfaces()
                    .iter()
                    .filter_map(|c| store.channel(*c)?.other_end(node.id))
                    .filter_map(|peer| {
                        Some(PeerAddressRecord {
                            record: *node.peer_addresses().get(&peer)?,
                            peer: node_ref(store.node(peer)?),
                        })
                    })
                    .collect(),
            })
            .collect();

        let channels = store
            .channels()
            .filter_map(|channel| {
                let [a, b] = channel.ends();
                Some(ChannelRecord {
                    a: node_ref(store.node(a.node)?),
                    b: node_ref(store.node(b.node)?),
                    attributes: channel.attributes,
                    style: channel.style,
                })
            })
            .collect();

        Self {
            schema_version: TOPOLOGY_SCHEMA_VERSION,
            nodes,
            channels,
        }
    }

    /// Rebuilds a store from the file, validating it along the way.
    pub fn into_store(self) -> Result<GraphStore, PersistenceError> {
        if self.schema_version != TOPOLOGY_SCHEMA_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: self.schema_version,
                expected: TOPOLOGY_SCHEMA_VERSION,
            });
        }

        let mut nodes = self.nodes;
        nodes.sort_by_key(|n| (n.kind, n.ordinal));

        let mut store = GraphStore::new();
        let mut next_ordinal = [0usize; NodeKind::COUNT];
        for record in &nodes {
            let expected = &mut next_ordinal[record.kind.index()];
            if record.ordinal != *expected {
                return Err(PersistenceError::OrdinalGap {
                    kind: record.kind,
                    expected: *expected,
                    found: record.ordinal,
                });
            }
            *expected += 1;

            if !record.attributes.matches(record.kind) {
                return Err(PersistenceError::AttributeKindMismatch {
                    kind: record.kind,
                    ordinal: record.ordinal,
                });
            }
            validate_position(record.position)
                .and_then(|()| record.attributes.validate())
                .map_err(|source| PersistenceError::RejectedNode {
                    kind: record.kind,
                    ordinal: record.ordinal,
                    source,
                })?;
            record
                .host
                .validate()
                .map_err(|source| PersistenceError::RejectedHostAddress {
                    kind: record.kind,
                    ordinal: record.ordinal,
                    source,
                })?;

            let mut node = Node::new(record.kind, record.position);
            node.attributes = record.attributes.clone();
            node.host = record.host;
            store.insert_node(node);
        }

        for (index, record) in self.channels.iter().enumerate() {
            let a = resolve(&store, record.a)?;
            let b = resolve(&store, record.b)?;
            let rejected = |source| PersistenceError::RejectedChannel { index, source };
            record.attributes.validate().map_err(rejected)?;
            let id = store
                .insert_channel(a, b, record.attributes)
                .map_err(rejected)?;
            if let Some(channel) = store.channel_mut(id) {
                channel.style = record.style;
            }
        }

        for record in &nodes {
            if record.peer_addresses.is_empty() {
                continue;
            }
            let rejected = |source| PersistenceError::RejectedPeerAddress {
                kind: record.kind,
                ordinal: record.ordinal,
                source,
            };
            if !record.kind.keeps_peer_addresses() {
                return Err(rejected(ValidationError::AddressingUnsupported(record.kind)));
            }
            let id = resolve(
                &store,
                NodeRef {
                    kind: record.kind,
                    ordinal: record.ordinal,
                },
            )?;
            for entry in &record.peer_addresses {
                let peer = resolve(&store, entry.peer)?;
                entry.record.validate().map_err(rejected)?;
                let slot = store
                    .node_mut(id)
                    .and_then(|node| node.peer_addresses.get_mut(&peer))
                    .ok_or(rejected(ValidationError::NotANeighbor { node: id, peer }))?;
                *slot = entry.record;
            }
        }

        store.check_invariants()?;
        Ok(store)
    }
}

/// Serializes `store` as pretty-printed topology JSON.
pub fn to_json(store: &GraphStore) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(&TopologyFile::from_store(store))?)
}

/// Parses topology JSON into a fresh store.
pub fn from_json(json: &str) -> Result<GraphStore, PersistenceError> {
    let probe: VersionProbe = serde_json::from_str(json)?;
    if probe.schema_version != TOPOLOGY_SCHEMA_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: probe.schema_version,
            expected: TOPOLOGY_SCHEMA_VERSION,
        });
    }
    let file: TopologyFile = serde_json::from_str(json)?;
    file.into_store()
}

/// Writes `store` to `path`.
pub fn save_to_path(store: &GraphStore, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    std::fs::write(path, to_json(store)?)?;
    Ok(())
}

/// Reads a store from `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<GraphStore, PersistenceError> {
    from_json(&std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample() -> GraphStore {
        let mut store = GraphStore::new();
        let ut = store.insert_node(Node::new(NodeKind::UserTerminal, (0.0, 0.0)));
        let ug = store.insert_node(Node::new(NodeKind::UserGateway, (50.0, 0.0)));
        let r1 = store.insert_node(Node::new(NodeKind::Router, (100.0, 0.0)));
        let r2 = store.insert_node(Node::new(NodeKind::Router, (150.0, 0.0)));
        let cs = store.insert_node(Node::new(NodeKind::ComputeServer, (200.0, 0.0)));
        store.insert_channel(ut, ug, ChannelAttributes::default()).unwrap();
        store
            .insert_channel(ug, r1, ChannelAttributes { bandwidth: 1000.0, delay: 1.5 })
            .unwrap();
        store.insert_channel(r2, cs, ChannelAttributes::default()).unwrap();
        store.insert_channel(r1, r2, ChannelAttributes::default()).unwrap();
        *store
            .node_mut(r1)
            .unwrap()
            .peer_addresses
            .get_mut(&r2)
            .unwrap() = AddressRecord::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 252));
        store.node_mut(cs).unwrap().host = AddressRecord::new(Ipv4Addr::new(192, 168, 1, 2), Ipv4Addr::new(255, 255, 255, 0));
        store
    }

    fn assert_same_topology(left: &GraphStore, right: &GraphStore) {
        assert_eq!(
            TopologyFile::from_store(left),
            TopologyFile::from_store(right)
        );
        for (l, r) in left.nodes().zip(right.nodes()) {
            let slots = |store: &GraphStore, node: &Node| -> Vec<(NodeKind, usize)> {
                node.interfaces()
                    .iter()
                    .map(|c| {
                        let peer = store.channel(*c).unwrap().other_end(node.id).unwrap();
                        let peer = store.node(peer).unwrap();
                        (peer.kind, peer.ordinal())
                    })
                    .collect()
            };
            assert_eq!(slots(left, l), slots(right, r));
        }
    }

    #[test]
    fn test_round_trip_preserves_topology() {
        let store = sample();
        let loaded = from_json(&to_json(&store).unwrap()).unwrap();

        assert_same_topology(&store, &loaded);
        loaded.check_invariants().unwrap();
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        let store = sample();

        save_to_path(&store, &path).unwrap();
        let loaded = load_from_path(&path).unwrap();

        assert_same_topology(&store, &loaded);
    }

    #[test]
    fn test_peer_addresses_follow_interface_slots() {
        let file = TopologyFile::from_store(&sample());
        let router = file
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Router && n.ordinal == 0)
            .unwrap();
        let peers: Vec<NodeRef> = router.peer_addresses.iter().map(|p| p.peer).collect();

        assert_eq!(
            peers,
            vec![
                NodeRef { kind: NodeKind::UserGateway, ordinal: 0 },
                NodeRef { kind: NodeKind::Router, ordinal: 1 },
            ]
        );
    }

    #[test]
    fn test_save_load_save_is_byte_identical() {
        let first = to_json(&sample()).unwrap();
        let mut json = first.clone();
        for _ in 0..8 {
            json = to_json(&from_json(&json).unwrap()).unwrap();
            assert_eq!(json, first);
        }
    }

    #[test]
    fn test_rejects_non_finite_node_values() {
        let mut file = TopologyFile::from_store(&sample());
        file.nodes[0].position = (f32::INFINITY, 0.0);
        assert!(matches!(
            file.into_store(),
            Err(PersistenceError::RejectedNode {
                kind: NodeKind::UserTerminal,
                source: ValidationError::InvalidPosition { .. },
                ..
            })
        ));

        let mut file = TopologyFile::from_store(&sample());
        file.nodes[0].attributes = NodeAttributes::UserTerminal {
            task_upper_limit: 100.0,
            task_lower_limit: f64::NAN,
        };
        assert!(matches!(
            file.into_store(),
            Err(PersistenceError::RejectedNode {
                source: ValidationError::InvalidNodeAttribute { field: "task_lower_limit", .. },
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut file = TopologyFile::from_store(&sample());
        file.schema_version = 7;
        let json = serde_json::to_string(&file).unwrap();

        assert!(matches!(
            from_json(&json),
            Err(PersistenceError::UnsupportedVersion { found: 7, expected: 1 })
        ));
    }

    #[test]
    fn test_rejects_ordinal_gap() {
        let mut file = TopologyFile::from_store(&sample());
        file.channels.clear();
        for node in &mut file.nodes {
            node.peer_addresses.clear();
            if node.kind == NodeKind::Router && node.ordinal == 1 {
                node.ordinal = 2;
            }
        }

        assert!(matches!(
            file.into_store(),
            Err(PersistenceError::OrdinalGap {
                kind: NodeKind::Router,
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_rejects_mismatched_attributes() {
        let mut file = TopologyFile::from_store(&sample());
        file.nodes[0].attributes = NodeAttributes::Scheduler;

        assert!(matches!(
            file.into_store(),
            Err(PersistenceError::AttributeKindMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_channel() {
        let mut file = TopologyFile::from_store(&sample());
        let mut twin = file.channels[0].clone();
        std::mem::swap(&mut twin.a, &mut twin.b);
        file.channels.push(twin);

        assert!(matches!(
            file.into_store(),
            Err(PersistenceError::RejectedChannel {
                index: 4,
                source: ValidationError::DuplicateChannel { .. }
            })
        ));
    }

    #[test]
    fn test_rejects_address_for_non_neighbour() {
        let mut file = TopologyFile::from_store(&sample());
        let gateway = file
            .nodes
            .iter_mut()
            .find(|n| n.kind == NodeKind::UserGateway)
            .unwrap();
        gateway.peer_addresses.push(PeerAddressRecord {
            peer: NodeRef {
                kind: NodeKind::ComputeServer,
                ordinal: 0,
            },
            record: AddressRecord::default(),
        });

        assert!(matches!(
            file.into_store(),
            Err(PersistenceError::RejectedPeerAddress {
                source: ValidationError::NotANeighbor { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_unknown_endpoint() {
        let mut file = TopologyFile::from_store(&sample());
        file.channels[0].b = NodeRef {
            kind: NodeKind::ScheduleNode,
            ordinal: 0,
        };

        assert!(matches!(
            file.into_store(),
            Err(PersistenceError::UnknownEndpoint {
                kind: NodeKind::ScheduleNode,
                ordinal: 0
            })
        ));
    }
}
