//! Tree Rendering
//!
//! Turns [`VNode`] snapshots into host nodes and keeps them in sync as new
//! snapshots arrive.
//!
//! # Structure
//!
//! - [`vnode`]: snapshot types and builders
//! - [`host`]: the [`HostOps`] contract a backend implements
//! - [`renderer`]: mount, patch and unmount of single nodes
//! - [`diff`]: keyed reconciliation of sibling lists
//! - [`component`]: components and their render effects
//! - [`memory`]: an in-memory backend that records every host operation
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::Runtime;
//! use ripple_core::render::{MemoryHost, Renderer, VNode};
//!
//! let rt = Runtime::new();
//! let mut host = MemoryHost::new();
//! let root = host.create_root();
//! let renderer = Renderer::new(&rt, host);
//!
//! let list = |keys: &[usize]| {
//!     VNode::element("ul").children(keys.iter().map(|k| VNode::element("li").key(*k).text_content(k.to_string())))
//! };
//!
//! renderer.render(Some(list(&[1, 2, 3])), root).unwrap();
//! renderer.host_mut().take_ops();
//! renderer.render(Some(list(&[3, 1, 2])), root).unwrap();
//! assert_eq!(renderer.host().text_content(root), "312");
//! ```

pub mod component;
pub mod diff;
pub mod host;
pub mod memory;
pub mod renderer;
pub mod vnode;

pub use component::{Component, RenderContext};
pub use diff::longest_increasing_subsequence;
pub use host::{HostNode, HostOps};
pub use memory::{HostOp, MemoryHost};
pub use renderer::Renderer;
pub use vnode::{Children, Handler, NodeType, PropValue, Props, VNode};
