//! Document stores and link-graph index for inklink.
//!
//! Two vaults implement both [`DocumentStore`](inklink_core::DocumentStore)
//! and [`LinkGraph`](inklink_core::LinkGraph):
//!
//! - [`MemoryVault`]: notes held in a map; used by tests and embedders
//!   that already have the content in hand.
//! - [`FsVault`]: a directory of markdown files on disk.
//!
//! Both derive the link graph from the note contents with the same
//! extraction and name-resolution rules.

pub mod fs;
pub mod index;
pub mod links;
pub mod memory;
pub mod resolve;

pub use fs::FsVault;
pub use index::LinkIndex;
pub use links::{LinkTarget, extract_links};
pub use memory::MemoryVault;
pub use resolve::resolve_name;
