//! Shared model-wide constants.
//! Centralizes default values used when nodes and channels are created, pasted or persisted.

use std::net::Ipv4Addr;

// Channels
/// Default channel bandwidth in Mbps.
pub const DEFAULT_BANDWIDTH_MBPS: f64 = 100.0;
/// Default channel propagation delay in milliseconds.
pub const DEFAULT_DELAY_MS: f64 = 10.0;
/// Default channel stroke color (RGB).
pub const DEFAULT_CHANNEL_COLOR: [u8; 3] = [0, 0, 0];
/// Default channel stroke width in screen pixels.
pub const DEFAULT_CHANNEL_WIDTH: f32 = 2.0;

// Addressing
/// Subnet mask given to freshly created address records.
pub const DEFAULT_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

// Node attributes
/// Default upper bound on task size generated by a user terminal.
pub const DEFAULT_TASK_UPPER_LIMIT: f64 = 2.56e6;
/// Default lower bound on task size generated by a user terminal.
pub const DEFAULT_TASK_LOWER_LIMIT: f64 = 0.0;
/// Default storage space of a compute server.
pub const DEFAULT_STORAGE_SPACE: f64 = 1024.0;

// Editing
/// Offset (in world units) applied to pasted clones relative to their originals.
pub const PASTE_OFFSET: (f32, f32) = (30.0, 30.0);
/// Maximum number of undo history entries to retain.
pub const MAX_UNDO_HISTORY: usize = 100;

// Simulator applications
/// Port the schedule application listens on.
pub const SCHEDULE_APP_PORT: u16 = 13333;
/// Port compute gateways receive schedule decisions on.
pub const COMPUTE_GATEWAY_PORT: u16 = 12344;
/// Port user gateways receive schedule decisions on.
pub const USER_GATEWAY_PORT: u16 = 13333;

// Persistence
/// Version of the persisted topology schema written by this crate.
pub const TOPOLOGY_SCHEMA_VERSION: u16 = 1;
