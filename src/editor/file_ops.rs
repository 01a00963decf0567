//! File operations for saving, loading and exporting topologies.

use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::Result;
use crate::export;
use crate::persistence;

use super::{ChangeSet, TopologyEditor};

/// Where the document lives on disk and whether it has been edited since.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileState {
    /// Current file path for save/load operations
    pub current_path: Option<PathBuf>,
    /// Flag indicating if the topology has unsaved changes
    pub has_unsaved_changes: bool,
}

impl TopologyEditor {
    /// Writes the topology to `path` and makes it the current document path.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Err(e) = persistence::save_to_path(&self.store, path) {
            error!("failed to save {}: {e}", path.display());
            return Err(e.into());
        }
        self.file.current_path = Some(path.to_path_buf());
        self.file.has_unsaved_changes = false;
        info!("saved topology to {}", path.display());
        Ok(())
    }

    /// Replaces the topology with the one stored at `path`.
    ///
    /// The file is fully validated before anything is replaced; on failure the
    /// current topology, history and document state are left untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let store = match persistence::load_from_path(path) {
            Ok(store) => store,
            Err(e) => {
                error!("failed to load {}: {e}", path.display());
                return Err(e.into());
            }
        };

        let changes = ChangeSet {
            removed_nodes: self.store.nodes().map(|n| n.id).collect(),
            removed_channels: self.store.channels().map(|c| c.id).collect(),
            added_nodes: store.nodes().map(|n| n.id).collect(),
            added_channels: store.channels().map(|c| c.id).collect(),
            ..Default::default()
        };
        self.store = store;
        self.history.clear();
        self.file.current_path = Some(path.to_path_buf());
        self.file.has_unsaved_changes = false;
        info!(
            "loaded {} nodes and {} channels from {}",
            self.store.node_count(),
            self.store.channel_count(),
            path.display()
        );
        self.notify(&changes);
        Ok(())
    }

    /// Writes the simulator input files for the current topology into `dir`.
    pub fn export_simulation(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        export::write_simulation_files(&self.store, dir).map_err(|e| {
            error!("failed to export to {}: {e}", dir.display());
            e.into()
        })
    }
}
