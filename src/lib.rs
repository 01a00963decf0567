//! # Topology Editor
//!
//! The editing core behind a network topology diagram tool. A topology is a graph of
//! nodes of six kinds connected by point-to-point channels:
//! - **User terminals** and **compute servers** at the edge
//! - **User gateways**, **compute gateways** and **routers** forwarding between them
//! - A **schedule node** making placement decisions
//!
//! ## Features
//! - Dense, automatically renumbered per-kind ordinals ("Router 3")
//! - Dense per-node interface slots that become simulator gate indices
//! - Reversible commands with exact undo/redo, cut, copy and paste
//! - Versioned JSON persistence
//! - Export to an OMNeT++ NED network, its `omnetpp.ini` and an OSPF area configuration

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod editor;
pub mod error;
pub mod export;
pub mod persistence;
pub mod store;
mod types;

// Re-export public types and functions
pub use config::EditorConfig;
pub use editor::{ChangeObserver, ChangeSet, TopologyEditor};
pub use error::{ConsistencyError, EditorError, PersistenceError, Result, ValidationError};
pub use store::GraphStore;
pub use types::*;

const USAGE: &str = "usage: topology_editor summary <topology.json>\n       topology_editor export <topology.json> <output-dir>";

/// Runs the command-line front end.
///
/// Supported commands:
/// - `summary <topology.json>` loads a topology, checks it and prints per-kind counts
///   and each node's interfaces
/// - `export <topology.json> <output-dir>` additionally writes the simulator files
///
/// Editor settings are read from the file named by
/// [`config::CONFIG_ENV_VAR`], if set.
///
/// # Example
///
/// ```no_run
/// fn main() -> Result<(), topology_editor::EditorError> {
///     topology_editor::run_cli(std::env::args().skip(1))
/// }
/// ```
pub fn run_cli<I>(args: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut editor = TopologyEditor::new(EditorConfig::from_env()?);

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["summary", path] => {
            editor.load(path)?;
            print!("{}", summary(editor.store()));
            Ok(())
        }
        ["export", path, out_dir] => {
            editor.load(path)?;
            editor.export_simulation(out_dir)?;
            print!("{}", summary(editor.store()));
            println!(
                "wrote {}, {} and {} to {out_dir}",
                export::NED_FILE_NAME,
                export::OSPF_FILE_NAME,
                export::INI_FILE_NAME
            );
            Ok(())
        }
        _ => Err(EditorError::Usage(USAGE.to_string())),
    }
}

/// Human-readable overview of a topology.
pub fn summary(store: &GraphStore) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} nodes, {} channels",
        store.node_count(),
        store.channel_count()
    );
    for kind in NodeKind::ALL {
        let count = store.count(kind);
        if count > 0 {
            let _ = writeln!(out, "  {:<16} {count}", kind.label());
        }
    }
    for node in store.nodes() {
        let peers: Vec<&str> = node
            .interfaces()
            .iter()
            .filter_map(|c| store.channel(*c)?.other_end(node.id))
            .filter_map(|peer| store.node(peer).map(Node::display_name))
            .collect();
        let _ = writeln!(out, "{}: [{}]", node.display_name(), peers.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_interfaces_in_slot_order() {
        let mut store = GraphStore::new();
        let router = store.insert_node(Node::new(NodeKind::Router, (0.0, 0.0)));
        let terminal = store.insert_node(Node::new(NodeKind::UserTerminal, (0.0, 0.0)));
        let server = store.insert_node(Node::new(NodeKind::ComputeServer, (0.0, 0.0)));
        store.insert_channel(router, server, ChannelAttributes::default()).unwrap();
        store.insert_channel(router, terminal, ChannelAttributes::default()).unwrap();

        let text = summary(&store);

        assert!(text.starts_with("3 nodes, 2 channels\n"));
        assert!(text.contains("Router 1: [Compute Server 1, User Terminal 1]"));
        assert!(text.contains("User Terminal 1: [Router 1]"));
    }

    #[test]
    fn test_run_cli_rejects_unknown_command() {
        assert!(matches!(
            run_cli(["frobnicate"]),
            Err(EditorError::Usage(_))
        ));
    }

    #[test]
    fn test_run_cli_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        let mut editor = TopologyEditor::default();
        let a = editor.add_node(NodeKind::Router, (0.0, 0.0)).unwrap();
        let b = editor.add_node(NodeKind::ComputeGateway, (0.0, 0.0)).unwrap();
        editor.connect(a, b).unwrap();
        editor.save(&path).unwrap();
        let out = dir.path().join("sim");

        run_cli([
            "export".to_string(),
            path.display().to_string(),
            out.display().to_string(),
        ])
        .unwrap();

        assert!(out.join(export::NED_FILE_NAME).exists());
        assert!(out.join(export::INI_FILE_NAME).exists());
    }
}
