//! Rendering
//!
//! Turns vnode trees into host nodes and keeps them in sync as the trees
//! change.
//!
//! # Architecture
//!
//! - [`VNode`] trees are cheap descriptions built with [`h`] and friends
//! - [`Renderer`] diffs each new tree against the last one rendered into a
//!   container and applies the difference through [`HostOps`]
//! - Components own a render effect; state changes queue a re-render on the
//!   job scheduler, and parent re-renders update them synchronously
//! - [`MemoryHost`] is an in-memory host that records every operation

mod component;
mod h;
mod host;
mod memory;
mod renderer;
mod sequence;
mod shape;
mod vnode;

pub use component::{ComponentDef, ComponentProxy};
pub use h::{comment, component, fragment, h, text};
pub use host::{HostOps, NodeHandle};
pub use memory::{HostOp, MemoryHost};
pub use renderer::{Renderer, RendererConfig};
pub use sequence::longest_increasing_subsequence;
pub use shape::ShapeFlags;
pub use vnode::{Children, NodeKey, Props, VNode, VNodeType};
