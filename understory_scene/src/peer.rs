// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seam to the rendering backend.
//!
//! Each scene node is mirrored by a backend-owned peer. Peers only ever see
//! the aspects a node's [`DirtyBits`] flag, once per pulse.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::bounds::Bounds;
use crate::dirty::DirtyBits;
use crate::transform::NodeTransform;
use crate::tree::SceneGraph;
use crate::types::{Appearance, BlendMode, CacheHint, Effect, NodeId, NodeKind};

/// Backend counterpart of a scene node.
pub trait Peer: fmt::Debug {
    /// Local-to-parent transform.
    fn set_transform(&mut self, transform: &NodeTransform);
    /// Bounds in local space.
    fn set_content_bounds(&mut self, bounds: &Bounds);
    /// Bounds in parent space. `independent` is set when the content bounds
    /// did not change, so only the transform moved them.
    fn set_transformed_bounds(&mut self, bounds: &Bounds, independent: bool);
    /// Opacity.
    fn set_opacity(&mut self, opacity: f32);
    /// Visibility.
    fn set_visible(&mut self, visible: bool);
    /// Clip node.
    fn set_clip(&mut self, clip: Option<NodeId>);
    /// Effect.
    fn set_effect(&mut self, effect: Option<&Effect>);
    /// Cache-as-bitmap request and hint.
    fn set_cache(&mut self, cache: bool, hint: CacheHint);
    /// Blend mode.
    fn set_blend_mode(&mut self, mode: Option<BlendMode>);
    /// Depth test.
    fn set_depth_test(&mut self, depth_test: bool);
    /// Shape of the node.
    fn set_geometry(&mut self, kind: &NodeKind, size: (f64, f64));
    /// Paint and decoration.
    fn set_appearance(&mut self, appearance: &Appearance);
    /// Child list, in paint order.
    fn set_children(&mut self, children: &[NodeId]);
}

/// Creates peers for nodes the first time they are synchronized.
pub trait PeerFactory {
    /// The peer type.
    type Peer: Peer;

    /// Creates the peer of `id`.
    fn create_peer(&mut self, id: NodeId, kind: &NodeKind) -> Self::Peer;
}

impl SceneGraph {
    /// Pushes the dirty aspects of `id` to `peer` and clears them.
    ///
    /// Returns the bits that were pushed.
    pub fn sync_peer<P: Peer + ?Sized>(&mut self, id: NodeId, peer: &mut P) -> DirtyBits {
        let Some(n) = self.node_opt(id) else {
            return DirtyBits::empty();
        };
        let bits = n.dirty;
        if bits.is_empty() {
            return bits;
        }
        if bits.contains(DirtyBits::TRANSFORM) {
            peer.set_transform(&self.local_to_parent_of(id));
        }
        if bits.contains(DirtyBits::BOUNDS) {
            peer.set_content_bounds(&self.local_bounds_of(id));
        }
        if bits.contains(DirtyBits::TRANSFORMED_BOUNDS) {
            let independent = !bits.contains(DirtyBits::BOUNDS);
            peer.set_transformed_bounds(&self.parent_bounds_of(id), independent);
        }
        let n = self.node(id);
        if bits.contains(DirtyBits::OPACITY) {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Backends take single-precision opacity."
            )]
            let opacity = n.opacity as f32;
            peer.set_opacity(opacity);
        }
        if bits.contains(DirtyBits::VISIBLE) {
            peer.set_visible(n.visible);
        }
        if bits.contains(DirtyBits::CLIP) {
            peer.set_clip(n.clip);
        }
        if bits.contains(DirtyBits::EFFECT) {
            peer.set_effect(n.effect.as_ref());
        }
        if bits.contains(DirtyBits::CACHE) {
            peer.set_cache(n.cache, n.cache_hint);
        }
        if bits.contains(DirtyBits::BLEND_MODE) {
            peer.set_blend_mode(n.blend_mode);
        }
        if bits.contains(DirtyBits::DEPTH_TEST) {
            peer.set_depth_test(n.depth_test);
        }
        if bits.contains(DirtyBits::GEOMETRY) {
            peer.set_geometry(&n.kind, (n.width, n.height));
        }
        if bits.contains(DirtyBits::CONTENTS) {
            peer.set_appearance(&n.appearance);
        }
        if bits.contains(DirtyBits::PARENT_CHILDREN) {
            peer.set_children(&n.children);
        }
        self.node_mut(id).dirty = DirtyBits::empty();
        bits
    }

    /// Drains the dirty list.
    pub(crate) fn take_dirty(&mut self) -> Vec<NodeId> {
        let list = core::mem::take(&mut self.dirty_list);
        for &id in &list {
            if let Some(n) = self.node_opt_mut(id) {
                n.in_dirty_list = false;
            }
        }
        list
    }
}

/// One call received by a [`RecordingPeer`].
#[derive(Clone, Debug, PartialEq)]
pub enum PeerCall {
    /// [`Peer::set_transform`]
    Transform(NodeTransform),
    /// [`Peer::set_content_bounds`]
    ContentBounds(Bounds),
    /// [`Peer::set_transformed_bounds`]
    TransformedBounds(Bounds, bool),
    /// [`Peer::set_opacity`]
    Opacity(f32),
    /// [`Peer::set_visible`]
    Visible(bool),
    /// [`Peer::set_clip`]
    Clip(Option<NodeId>),
    /// [`Peer::set_effect`]
    Effect(Option<Effect>),
    /// [`Peer::set_cache`]
    Cache(bool, CacheHint),
    /// [`Peer::set_blend_mode`]
    BlendMode(Option<BlendMode>),
    /// [`Peer::set_depth_test`]
    DepthTest(bool),
    /// [`Peer::set_geometry`]
    Geometry(NodeKind, (f64, f64)),
    /// [`Peer::set_appearance`]
    Appearance(Appearance),
    /// [`Peer::set_children`]
    Children(Vec<NodeId>),
}

/// Shared log of peer calls, oldest first.
pub type PeerLog = Rc<RefCell<Vec<(NodeId, PeerCall)>>>;

/// A peer that appends every call to a shared log.
///
/// Useful for tests and for debugging what a pulse pushes.
#[derive(Clone, Debug)]
pub struct RecordingPeer {
    id: NodeId,
    log: PeerLog,
}

impl RecordingPeer {
    fn record(&self, call: PeerCall) {
        self.log.borrow_mut().push((self.id, call));
    }
}

impl Peer for RecordingPeer {
    fn set_transform(&mut self, transform: &NodeTransform) {
        self.record(PeerCall::Transform(*transform));
    }

    fn set_content_bounds(&mut self, bounds: &Bounds) {
        self.record(PeerCall::ContentBounds(*bounds));
    }

    fn set_transformed_bounds(&mut self, bounds: &Bounds, independent: bool) {
        self.record(PeerCall::TransformedBounds(*bounds, independent));
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.record(PeerCall::Opacity(opacity));
    }

    fn set_visible(&mut self, visible: bool) {
        self.record(PeerCall::Visible(visible));
    }

    fn set_clip(&mut self, clip: Option<NodeId>) {
        self.record(PeerCall::Clip(clip));
    }

    fn set_effect(&mut self, effect: Option<&Effect>) {
        self.record(PeerCall::Effect(effect.copied()));
    }

    fn set_cache(&mut self, cache: bool, hint: CacheHint) {
        self.record(PeerCall::Cache(cache, hint));
    }

    fn set_blend_mode(&mut self, mode: Option<BlendMode>) {
        self.record(PeerCall::BlendMode(mode));
    }

    fn set_depth_test(&mut self, depth_test: bool) {
        self.record(PeerCall::DepthTest(depth_test));
    }

    fn set_geometry(&mut self, kind: &NodeKind, size: (f64, f64)) {
        self.record(PeerCall::Geometry(kind.clone(), size));
    }

    fn set_appearance(&mut self, appearance: &Appearance) {
        self.record(PeerCall::Appearance(appearance.clone()));
    }

    fn set_children(&mut self, children: &[NodeId]) {
        self.record(PeerCall::Children(children.to_vec()));
    }
}

/// Creates [`RecordingPeer`]s that share one log.
#[derive(Clone, Debug, Default)]
pub struct RecordingPeerFactory {
    log: PeerLog,
}

impl RecordingPeerFactory {
    /// Creates a factory with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared log.
    pub fn log(&self) -> &PeerLog {
        &self.log
    }

    /// Removes and returns all recorded calls.
    pub fn take_calls(&self) -> Vec<(NodeId, PeerCall)> {
        core::mem::take(&mut *self.log.borrow_mut())
    }
}

impl PeerFactory for RecordingPeerFactory {
    type Peer = RecordingPeer;

    fn create_peer(&mut self, id: NodeId, _kind: &NodeKind) -> RecordingPeer {
        RecordingPeer {
            id,
            log: self.log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;

    fn setup() -> (SceneGraph, NodeId, RecordingPeer, RecordingPeerFactory) {
        let mut scene = SceneGraph::new();
        let root = scene.create(NodeKind::Group);
        let n = scene.create(NodeKind::Rectangle {
            width: 10.0,
            height: 10.0,
        });
        scene.add_child(root, n).unwrap();
        scene.set_root(Some(root)).unwrap();
        let mut factory = RecordingPeerFactory::new();
        let mut peer = factory.create_peer(n, &NodeKind::Group);
        scene.sync_peer(n, &mut peer);
        factory.take_calls();
        (scene, n, peer, factory)
    }

    #[test]
    fn first_sync_pushes_everything() {
        let mut scene = SceneGraph::new();
        let n = scene.create(NodeKind::Circle { radius: 2.0 });
        let mut factory = RecordingPeerFactory::new();
        let mut peer = factory.create_peer(n, &NodeKind::Group);
        assert_eq!(scene.sync_peer(n, &mut peer), DirtyBits::all(), "all bits pushed");
        assert_eq!(factory.take_calls().len(), 13, "one call per aspect");
        assert!(scene.dirty_bits(n).unwrap().is_empty(), "cleared");
    }

    #[test]
    fn only_dirty_aspects_are_pushed() {
        let (mut scene, n, mut peer, factory) = setup();
        scene.set_opacity(n, 0.5);
        scene.sync_peer(n, &mut peer);
        assert_eq!(
            factory.take_calls(),
            alloc::vec![(n, PeerCall::Opacity(0.5))],
            "opacity only"
        );
        scene.set_opacity(n, 0.5);
        assert_eq!(scene.sync_peer(n, &mut peer), DirtyBits::empty(), "same value is a no-op");
        assert!(factory.take_calls().is_empty(), "no peer call");
    }

    #[test]
    fn transform_changes_push_independent_bounds() {
        let (mut scene, n, mut peer, factory) = setup();
        scene.set_translate(n, 5.0, 0.0, 0.0);
        scene.sync_peer(n, &mut peer);
        let calls = factory.take_calls();
        assert!(
            calls.contains(&(n, PeerCall::Transform(NodeTransform::Translate { x: 5.0, y: 0.0 }))),
            "transform pushed: {calls:?}"
        );
        assert!(
            calls.contains(&(
                n,
                PeerCall::TransformedBounds(Bounds::Rect(Rect::new(5.0, 0.0, 15.0, 10.0)), true)
            )),
            "bounds moved without content change: {calls:?}"
        );
        assert!(
            !calls.iter().any(|(_, c)| matches!(c, PeerCall::ContentBounds(_))),
            "content bounds unchanged"
        );
    }
}
