//! Export utilities: render the topology as simulator input files.
//!
//! Notes:
//! - Gate indices are the dense interface slots, so `ethg[i]` on a node is the i-th
//!   channel in its incidence list.
//! - Node names in the output are the config prefix plus the 1-based ordinal
//!   (`Router3`, `UserNode1`).

use std::fmt::Write as _;
use std::path::Path;

use log::info;

use crate::constants::{COMPUTE_GATEWAY_PORT, DEFAULT_MASK, SCHEDULE_APP_PORT, USER_GATEWAY_PORT};
use crate::error::PersistenceError;
use crate::store::GraphStore;
use crate::types::*;

/// File name of the NED network description.
pub const NED_FILE_NAME: &str = "network.ned";
/// File name of the OSPF area configuration.
pub const OSPF_FILE_NAME: &str = "ospf_config.xml";
/// File name of the simulation run configuration.
pub const INI_FILE_NAME: &str = "omnetpp.ini";

const DEFAULT_PACKAGE: &str = "inet.examples.computing_power_network";
const DEFAULT_NETWORK: &str = "TestNetwork";

/// A node as seen by the exporters.
#[derive(Debug, Clone, Copy)]
pub struct ExportNode<'a> {
    node: &'a Node,
}

impl<'a> ExportNode<'a> {
    /// The underlying node.
    pub fn node(&self) -> &'a Node {
        self.node
    }

    /// Node kind.
    pub fn kind(&self) -> NodeKind {
        self.node.kind
    }

    /// Zero-based ordinal within the kind.
    pub fn ordinal(&self) -> usize {
        self.node.ordinal()
    }

    /// Simulator-facing name, e.g. `ComputingGateway2`.
    pub fn name(&self) -> String {
        config_name(self.node.kind, self.node.ordinal())
    }

    /// NED module type of the node.
    pub fn module_type(&self) -> &'static str {
        self.node.kind.module_type()
    }

    /// Number of gates, equal to the number of attached channels.
    pub fn gate_count(&self) -> usize {
        self.node.interface_count()
    }
}

/// One end of an exported channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportGate {
    /// Simulator-facing node name
    pub name: String,
    /// Kind of the node
    pub kind: NodeKind,
    /// Gate index on the node
    pub index: usize,
}

/// A channel as seen by the exporters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportChannel {
    /// First endpoint
    pub a: ExportGate,
    /// Second endpoint
    pub b: ExportGate,
    /// Bandwidth in Mbps
    pub bandwidth: f64,
    /// Delay in milliseconds
    pub delay: f64,
}

/// Read-only projection of a store for the exporters.
#[derive(Debug, Clone, Copy)]
pub struct ExportView<'a> {
    store: &'a GraphStore,
}

impl<'a> ExportView<'a> {
    /// Wraps `store`.
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Nodes in kind-then-ordinal order.
    pub fn nodes(&self) -> impl Iterator<Item = ExportNode<'a>> + 'a {
        self.store.nodes().map(|node| ExportNode { node })
    }

    /// Channels in global order, with gate indices resolved.
    pub fn channels(&self) -> impl Iterator<Item = ExportChannel> + 'a {
        let store = self.store;
        store.channels().filter_map(move |channel| {
            let gate = |end: &ChannelEnd| {
                store.node(end.node).map(|node| ExportGate {
                    name: config_name(node.kind, node.ordinal()),
                    kind: node.kind,
                    index: end.slot,
                })
            };
            let [a, b] = channel.ends();
            Some(ExportChannel {
                a: gate(a)?,
                b: gate(b)?,
                bandwidth: channel.attributes.bandwidth,
                delay: channel.attributes.delay,
            })
        })
    }

    /// Neighbours behind each interface of `node`, in slot order.
    fn interface_peers(&self, node: &Node) -> Vec<&'a Node> {
        node.interfaces()
            .iter()
            .filter_map(|c| self.store.channel(*c)?.other_end(node.id))
            .filter_map(|peer| self.store.node(peer))
            .collect()
    }
}

fn config_name(kind: NodeKind, ordinal: usize) -> String {
    format!("{}{}", kind.config_prefix(), ordinal + 1)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders an OMNeT++ NED network.
#[derive(Debug, Clone)]
pub struct NedWriter {
    package: String,
    network: String,
}

impl Default for NedWriter {
    fn default() -> Self {
        Self {
            package: DEFAULT_PACKAGE.to_string(),
            network: DEFAULT_NETWORK.to_string(),
        }
    }
}

impl NedWriter {
    /// Uses a custom package and network name.
    pub fn new(package: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            network: network.into(),
        }
    }

    /// Fully qualified network name, as referenced from `omnetpp.ini`.
    pub fn qualified_network(&self) -> String {
        format!("{}.{}", self.package, self.network)
    }

    /// Renders the whole `.ned` file.
    pub fn render(&self, view: &ExportView<'_>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "package {};", self.package);
        let _ = writeln!(out);
        for import in [
            "inet.common.misc.ThruputMeteringChannel",
            "inet.node.ospfv2.OspfRouter",
            "inet.computing_power_network.node.UserGateway",
            "inet.computing_power_network.node.ComputingGateway",
            "inet.computing_power_network.node.UserNode",
            "inet.computing_power_network.node.ComputeNode",
            "inet.computing_power_network.node.ComputeScheduleNode",
        ] {
            let _ = writeln!(out, "import {import};");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "network {}", self.network);
        let _ = writeln!(out, "{{");
        let _ = writeln!(out, "    types:");
        let _ = writeln!(out, "        channel C extends ThruputMeteringChannel");
        let _ = writeln!(out, "        {{");
        let _ = writeln!(out, "            thruputDisplayFormat = \"#N\";");
        let _ = writeln!(out, "        }}");

        let _ = writeln!(out, "    submodules:");
        for node in view.nodes() {
            let _ = writeln!(out, "        {}: {} {{", node.name(), node.module_type());
            if matches!(node.kind(), NodeKind::Router | NodeKind::ComputeGateway) {
                let _ = writeln!(out, "            parameters:");
                let _ = writeln!(out, "                hasStatus = true;");
            }
            let _ = writeln!(out, "            gates:");
            let _ = writeln!(out, "                ethg[{}];", node.gate_count());
            let _ = writeln!(out, "        }}");
        }

        let _ = writeln!(out, "    connections:");
        for channel in view.channels() {
            let _ = writeln!(
                out,
                "        {}.ethg[{}] <--> C {{ datarate = {}Mbps; delay = {}ms; }} <--> {}.ethg[{}];",
                channel.a.name,
                channel.a.index,
                channel.bandwidth,
                channel.delay,
                channel.b.name,
                channel.b.index
            );
        }
        let _ = writeln!(out, "}}");
        out
    }
}

/// Renders the OSPF area configuration consumed by the simulated routers.
#[derive(Debug, Clone, Default)]
pub struct OspfConfigWriter;

impl OspfConfigWriter {
    /// Renders the whole XML document.
    pub fn render(&self, view: &ExportView<'_>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<?xml version=\"1.0\"?>");
        let _ = writeln!(
            out,
            "<OSPFASConfig xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:schemaLocation=\"OSPF.xsd\">"
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  <Area id=\"0.0.0.0\">");

        for channel in view.channels() {
            for (from, to) in [(&channel.a, &channel.b), (&channel.b, &channel.a)] {
                let _ = writeln!(
                    out,
                    "    <AddressRange address=\"{}\" mask=\"{}\" />",
                    escape_xml(&format!("{}>{}", from.name, to.name)),
                    DEFAULT_MASK
                );
            }
        }
        for node in view.nodes() {
            if matches!(
                node.kind(),
                NodeKind::UserTerminal | NodeKind::ComputeServer | NodeKind::ScheduleNode
            ) {
                let _ = writeln!(
                    out,
                    "    <AddressRange address=\"{}\" mask=\"{}\" />",
                    node.name(),
                    node.node().host.mask
                );
            }
        }
        let _ = writeln!(out, "  </Area>");
        let _ = writeln!(out);

        for node in view.nodes().filter(|n| n.kind().keeps_peer_addresses()) {
            let _ = writeln!(
                out,
                "  <Router name=\"{}\" RFC1583Compatible=\"true\">",
                node.name()
            );
            for (slot, peer) in view.interface_peers(node.node()).into_iter().enumerate() {
                let interface = match peer.kind {
                    NodeKind::UserTerminal | NodeKind::ComputeServer => "BroadcastInterface",
                    _ => "PointToPointInterface",
                };
                let _ = writeln!(
                    out,
                    "    <{interface} ifName=\"eth{slot}\" area=\"0.0.0.0\" interfaceOutputCost=\"1\" />"
                );
            }
            let _ = writeln!(out, "  </Router>");
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "</OSPFASConfig>");
        out
    }
}

/// Renders `omnetpp.ini`: the network to run, the OSPF configuration to load, and the
/// schedule application of each schedule node.
#[derive(Debug, Clone)]
pub struct IniWriter {
    network: String,
}

impl Default for IniWriter {
    fn default() -> Self {
        Self::for_network(&NedWriter::default())
    }
}

impl IniWriter {
    /// Runs the network rendered by `ned`.
    pub fn for_network(ned: &NedWriter) -> Self {
        Self {
            network: ned.qualified_network(),
        }
    }

    /// Renders the whole `.ini` file.
    pub fn render(&self, view: &ExportView<'_>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[General]");
        let _ = writeln!(out, "network = {}", self.network);
        let _ = writeln!(out);
        let _ = writeln!(out, "**.ospf.ospfConfig = xmldoc(\"{OSPF_FILE_NAME}\")");

        for node in view.nodes().filter(|n| n.kind() == NodeKind::ScheduleNode) {
            let app = format!("**.{}.app[0]", node.name());
            let _ = writeln!(out);
            let _ = writeln!(out, "**.{}.numApps = 1", node.name());
            let _ = writeln!(out, "{app}.typename = \"ComputeScheduleApp\"");
            if let Some(address) = node.node().host.address {
                let _ = writeln!(out, "{app}.localAddress = \"{address}\"");
            }
            let _ = writeln!(out, "{app}.localPort = {SCHEDULE_APP_PORT}");
            let _ = writeln!(out, "{app}.computeGatewayPort = {COMPUTE_GATEWAY_PORT}");
            let _ = writeln!(out, "{app}.userGatewayPort = {USER_GATEWAY_PORT}");
        }
        out
    }
}

/// Writes `network.ned`, `ospf_config.xml` and `omnetpp.ini` for `store` into `dir`.
pub fn write_simulation_files(store: &GraphStore, dir: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let view = ExportView::new(store);
    let ned = NedWriter::default();
    std::fs::write(dir.join(NED_FILE_NAME), ned.render(&view))?;
    std::fs::write(dir.join(OSPF_FILE_NAME), OspfConfigWriter.render(&view))?;
    std::fs::write(dir.join(INI_FILE_NAME), IniWriter::for_network(&ned).render(&view))?;
    info!(
        "exported {} nodes and {} channels to {}",
        store.node_count(),
        store.channel_count(),
        dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    /// UserNode1 - UserGateway1 - Router1 - ComputingGateway1 - ComputeNode1
    fn chain() -> GraphStore {
        let mut store = GraphStore::new();
        let ids: Vec<NodeId> = [
            NodeKind::UserTerminal,
            NodeKind::UserGateway,
            NodeKind::Router,
            NodeKind::ComputeGateway,
            NodeKind::ComputeServer,
        ]
        .into_iter()
        .map(|kind| store.insert_node(Node::new(kind, (0.0, 0.0))))
        .collect();
        for pair in ids.windows(2) {
            store
                .insert_channel(pair[0], pair[1], ChannelAttributes::default())
                .unwrap();
        }
        store
    }

    #[test]
    fn test_ned_submodules_and_gate_counts() {
        let store = chain();
        let ned = NedWriter::default().render(&ExportView::new(&store));

        assert!(ned.starts_with("package inet.examples.computing_power_network;"));
        assert!(ned.contains("Router1: OspfRouter {"));
        assert!(ned.contains("UserNode1: UserNode {"));
        assert!(ned.contains("ComputingGateway1: ComputingGateway {"));
        assert!(ned.contains("ethg[2];"));
        assert_eq!(ned.matches("hasStatus = true;").count(), 2);
    }

    #[test]
    fn test_ned_uses_slots_as_gate_indices() {
        let mut store = chain();
        let router = store.node_at(NodeKind::Router, 0).unwrap().id;
        let gateway = store.node_at(NodeKind::UserGateway, 0).unwrap().id;
        let first = store.channel_between(gateway, router).unwrap();
        store.remove_channel(first).unwrap();
        store
            .insert_channel(
                router,
                gateway,
                ChannelAttributes {
                    bandwidth: 40.0,
                    delay: 2.5,
                },
            )
            .unwrap();

        let ned = NedWriter::default().render(&ExportView::new(&store));

        assert!(ned.contains(
            "Router1.ethg[1] <--> C { datarate = 40Mbps; delay = 2.5ms; } <--> UserGateway1.ethg[1];"
        ));
        assert!(ned.contains("Router1.ethg[0] <--> C { datarate = 100Mbps; delay = 10ms; } <--> ComputingGateway1.ethg[0];"));
    }

    #[test]
    fn test_ospf_interfaces_follow_neighbour_kind() {
        let store = chain();
        let xml = OspfConfigWriter.render(&ExportView::new(&store));

        assert!(xml.contains("<AddressRange address=\"UserNode1&gt;UserGateway1\" mask=\"255.255.255.0\" />"));
        assert!(xml.contains("<AddressRange address=\"ComputeNode1\" mask=\"255.255.255.0\" />"));
        assert!(xml.contains("<Router name=\"UserGateway1\" RFC1583Compatible=\"true\">\n    <BroadcastInterface ifName=\"eth0\""));
        assert!(xml.contains("<Router name=\"Router1\" RFC1583Compatible=\"true\">\n    <PointToPointInterface ifName=\"eth0\""));
        assert!(!xml.contains("<Router name=\"UserNode1\""));
    }

    #[test]
    fn test_ini_configures_each_schedule_node() {
        let mut store = chain();
        let scheduler = store.insert_node(Node::new(NodeKind::ScheduleNode, (0.0, 0.0)));
        store.insert_node(Node::new(NodeKind::ScheduleNode, (0.0, 0.0)));
        store.node_mut(scheduler).unwrap().host =
            AddressRecord::new(Ipv4Addr::new(10, 0, 9, 1), DEFAULT_MASK);

        let ini = IniWriter::default().render(&ExportView::new(&store));

        assert!(ini.contains("network = inet.examples.computing_power_network.TestNetwork\n"));
        assert!(ini.contains("**.ospf.ospfConfig = xmldoc(\"ospf_config.xml\")"));
        assert!(ini.contains("**.ComputeScheduleNode1.app[0].localAddress = \"10.0.9.1\"\n"));
        assert!(ini.contains("**.ComputeScheduleNode1.app[0].localPort = 13333\n"));
        assert!(ini.contains("**.ComputeScheduleNode2.numApps = 1\n"));
        assert!(!ini.contains("**.ComputeScheduleNode2.app[0].localAddress"));
        assert!(!ini.contains("Router1"));
    }

    #[test]
    fn test_write_simulation_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sim");

        write_simulation_files(&chain(), &out).unwrap();

        let ned = std::fs::read_to_string(out.join(NED_FILE_NAME)).unwrap();
        let xml = std::fs::read_to_string(out.join(OSPF_FILE_NAME)).unwrap();
        let ini = std::fs::read_to_string(out.join(INI_FILE_NAME)).unwrap();
        assert!(ned.contains("network TestNetwork"));
        assert!(xml.ends_with("</OSPFASConfig>\n"));
        assert!(ini.starts_with("[General]\n"));
    }
}
