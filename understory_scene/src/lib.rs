// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_scene --heading-base-level=0

//! Understory Scene: a retained scene graph with lazy caches and a pulse-driven peer sync.
//!
//! Nodes live in a generational arena owned by [`SceneGraph`]. Each node has a kind
//! ([`NodeKind`]), at most one parent, an ordered child list for parent kinds, and an
//! optional clip node. Structural edits that would form a cycle through parent or clip
//! links are rejected and leave the graph untouched.
//!
//! ## Caches
//!
//! Geometry bounds, layout bounds, local bounds, bounds in parent, and the local-to-parent
//! transform are computed on first read and cached until a contributing input changes.
//! Invalidation propagates upward only, and each cache reports its valid-to-invalid
//! transition once ([`SceneGraph::observe`], [`SceneGraph::take_invalidations`]).
//!
//! The local-to-scene transform uses three states ([`Validity`]). A transform change
//! marks only the changed node; descendants become [`Validity::Unknown`] and are checked
//! against their ancestors' versions when read, so an unrelated change elsewhere in the
//! scene does not force a recomputation.
//!
//! ## Styling and layout
//!
//! The graph implements [`understory_style::StyleTree`]. Properties such as opacity,
//! translation, fill, and padding are described by the statics in [`style`]; values set
//! by calling code are recorded with [`understory_style::StyleOrigin::User`] and beat
//! user-agent rules. Regions are laid out by a [`LayoutPolicy`]; layout requests bubble
//! to the root and stop at an ancestor that is already laying out.
//!
//! ## Pulses and peers
//!
//! Every node tracks [`DirtyBits`] for aspects changed since its backend [`Peer`] last
//! saw it. A [`PulseDriver`] runs CSS and layout until they settle (or a retry cap is
//! reached), then pushes exactly the dirty aspects of each scene node to its peer.
//!
//! ## API overview
//!
//! - [`SceneGraph`]: nodes, structure, properties, caches, styling, and layout.
//! - [`Bounds`], [`NodeTransform`], [`TransformOp`]: geometry values.
//! - [`LayoutPolicy`], [`StackLayout`]: region layout.
//! - [`Peer`], [`PeerFactory`], [`RecordingPeer`]: the backend seam.
//! - [`PulseDriver`], [`PulseConfig`], [`PulseReport`]: the per-frame driver.
//!
//! This crate uses `std` through its style engine and `kurbo`'s float functions.

extern crate alloc;

mod bounds;
mod dirty;
mod layout;
mod peer;
mod pulse;
pub mod style;
mod transform;
mod tree;
mod types;

pub use bounds::{Bounds, Box3, CacheStats, CachedQuantity, Invalidation};
pub use dirty::DirtyBits;
pub use layout::{Axis, LayoutPolicy, StackLayout};
pub use peer::{Peer, PeerCall, PeerFactory, PeerLog, RecordingPeer, RecordingPeerFactory};
pub use pulse::{PulseConfig, PulseDriver, PulseReport};
pub use transform::{NodeTransform, RotationAxis, Transform3d, TransformOp, Validity};
pub use tree::{SceneError, SceneGraph};
pub use types::{
    Appearance, BlendMode, CacheHint, ContentBias, Effect, NodeId, NodeKind, NodeOrientation,
    text_bounds,
};
