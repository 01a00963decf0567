//! Error types for editing, replaying and persisting topologies.
//!
//! Three families are kept apart because callers treat them differently:
//! a [`ValidationError`] is a refused edit that changed nothing, a
//! [`ConsistencyError`] is a broken model invariant found while replaying a
//! command, and a [`PersistenceError`] is a failure to read or write a file.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::types::{ChannelId, NodeId, NodeKind};

/// An impossible edit, refused before any mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A channel would connect a node to itself
    #[error("a channel cannot connect node {0} to itself")]
    SelfChannel(NodeId),

    /// The two nodes are already connected
    #[error("nodes {a} and {b} are already connected")]
    DuplicateChannel {
        /// First endpoint
        a: NodeId,
        /// Second endpoint
        b: NodeId,
    },

    /// No node with this id exists
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// No channel with this id exists
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// Nothing has been copied
    #[error("clipboard is empty")]
    EmptyClipboard,

    /// The gesture needs at least one selected item
    #[error("nothing is selected")]
    EmptySelection,

    /// The peer is not connected to the node
    #[error("node {peer} is not a neighbour of node {node}")]
    NotANeighbor {
        /// Node whose address would change
        node: NodeId,
        /// Supposed neighbour
        peer: NodeId,
    },

    /// Only gateways and routers keep interface addresses
    #[error("{0:?} nodes do not keep per-interface addresses")]
    AddressingUnsupported(NodeKind),

    /// The mask is not a run of ones followed by zeros
    #[error("{0} is not a contiguous subnet mask")]
    InvalidMask(Ipv4Addr),

    /// Bandwidth or delay is negative or not finite
    #[error("channel {field} must be a finite, non-negative number (got {value})")]
    InvalidChannelAttribute {
        /// Offending field
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// A node parameter is not finite
    #[error("node {field} must be a finite number (got {value})")]
    InvalidNodeAttribute {
        /// Offending field
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// A canvas coordinate is not finite
    #[error("position ({x}, {y}) is not finite")]
    InvalidPosition {
        /// Horizontal coordinate
        x: f32,
        /// Vertical coordinate
        y: f32,
    },

    /// The attribute bag belongs to another kind
    #[error("attributes do not belong to a {0:?} node")]
    AttributeKindMismatch(NodeKind),
}

/// An internal invariant found violated while applying or reversing a command.
///
/// These are defects; the history rolls the store back and reports them instead of
/// guessing a repair.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyError {
    /// A node the command refers to is gone
    #[error("node {0} is not in the store")]
    MissingNode(NodeId),

    /// A channel the command refers to is gone
    #[error("channel {0} is not in the store")]
    MissingChannel(ChannelId),

    /// A node being restored is already present
    #[error("node {0} is already in the store")]
    DuplicateNode(NodeId),

    /// A channel being restored is already present
    #[error("channel {0} is already in the store")]
    DuplicateChannel(ChannelId),

    /// A channel end disagrees with its node's incidence list
    #[error("channel {channel} expected at slot {slot} of node {node}")]
    SlotMismatch {
        /// Node owning the slot
        node: NodeId,
        /// Channel expected there
        channel: ChannelId,
        /// Recorded slot
        slot: usize,
    },

    /// A node cannot be reinserted at this ordinal
    #[error("ordinal {ordinal} is out of range for {kind:?} (count {count})")]
    OrdinalOutOfRange {
        /// Node kind
        kind: NodeKind,
        /// Requested ordinal
        ordinal: usize,
        /// Current count of the kind
        count: usize,
    },

    /// Reattaching would duplicate an existing connection
    #[error("reattaching would create a second channel between {a} and {b}")]
    ParallelChannel {
        /// First endpoint
        a: NodeId,
        /// Second endpoint
        b: NodeId,
    },

    /// The node must be detached first
    #[error("node {0} still has channels attached")]
    NodeStillConnected(NodeId),

    /// A reverse or redo effect found no snapshot
    #[error("{0} has nothing to restore")]
    NothingToRestore(&'static str),

    /// A structural invariant does not hold
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

/// Failure to read, parse or write the persisted topology or config.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for the schema
    #[error("malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The file was written by an incompatible version
    #[error("unsupported topology schema version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the file
        found: u16,
        /// Version this crate writes
        expected: u16,
    },

    /// Per-kind ordinals skip a number
    #[error("{kind:?} ordinals are not dense: expected {expected}, found {found}")]
    OrdinalGap {
        /// Node kind
        kind: NodeKind,
        /// Next ordinal expected
        expected: usize,
        /// Ordinal found instead
        found: usize,
    },

    /// A record refers to a node that is not in the file
    #[error("no {kind:?} node with ordinal {ordinal}")]
    UnknownEndpoint {
        /// Referenced kind
        kind: NodeKind,
        /// Referenced ordinal
        ordinal: usize,
    },

    /// A node's attributes belong to another kind
    #[error("{kind:?} node {ordinal} has attributes of another kind")]
    AttributeKindMismatch {
        /// Node kind
        kind: NodeKind,
        /// Node ordinal
        ordinal: usize,
    },

    /// A node's position or parameters cannot be used
    #[error("{kind:?} node {ordinal} rejected: {source}")]
    RejectedNode {
        /// Node kind
        kind: NodeKind,
        /// Node ordinal
        ordinal: usize,
        /// Why the record was rejected
        #[source]
        source: ValidationError,
    },

    /// A node's host address is invalid
    #[error("host address of {kind:?} node {ordinal} rejected: {source}")]
    RejectedHostAddress {
        /// Node kind
        kind: NodeKind,
        /// Node ordinal
        ordinal: usize,
        /// Why the record was rejected
        #[source]
        source: ValidationError,
    },

    /// A channel record would break the topology
    #[error("channel record {index} rejected: {source}")]
    RejectedChannel {
        /// Position of the record in the file
        index: usize,
        /// Why the record was rejected
        #[source]
        source: ValidationError,
    },

    /// An interface address record is invalid
    #[error("peer address on {kind:?} node {ordinal} rejected: {source}")]
    RejectedPeerAddress {
        /// Node kind
        kind: NodeKind,
        /// Node ordinal
        ordinal: usize,
        /// Why the record was rejected
        #[source]
        source: ValidationError,
    },

    /// The rebuilt topology failed its invariant check
    #[error("loaded topology is inconsistent: {0}")]
    Inconsistent(#[from] ConsistencyError),
}

/// Any failure surfaced at the editor boundary.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The edit was refused
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Replaying a command found the model inconsistent
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    /// A file could not be read or written
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The command line could not be understood
    #[error("{0}")]
    Usage(String),
}

/// Convenience alias used throughout the editor.
pub type Result<T, E = EditorError> = std::result::Result<T, E>;
