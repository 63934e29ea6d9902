//! tokengraph-graph: the transfer graph and its GraphML output.
//!
//! # Architecture
//!
//! ```text
//! Vec<EnrichedTransfer> + TokenBook + AddressBook
//!         │
//!         ▼
//!   GraphBuilder ──► TransferGraph (petgraph DiGraph) ──► GraphML file
//! ```

pub mod builder;
pub mod error;
pub mod format;
pub mod graphml;
pub mod model;

pub use builder::{GraphBuilder, TransferGraph};
pub use error::GraphError;
pub use graphml::{write_graphml, write_graphml_file};
pub use model::{AddressNode, CreationResult, GraphNode, MovementKey, MovementNode, NodeType, TransferEdge};
