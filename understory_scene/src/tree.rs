// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene graph: structure, property updates, and the lazily validated
//! bounds and transform caches.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use kurbo::{Point, Rect};
use smallvec::SmallVec;
use understory_style::{
    Color, CssFlags, CssMetaData, Font, PseudoClassSet, StyleConfig, StyleHelper, StyleManager,
    StyleOrigin,
};

use crate::bounds::{Bounds, CacheStats, CachedQuantity, Invalidation, Lazy};
use crate::dirty::DirtyBits;
use crate::layout::LayoutPolicy;
use crate::style;
use crate::transform::{NodeTransform, RotationAxis, SceneTransform, TransformOp, Validity};
use crate::types::{
    Appearance, BlendMode, CacheHint, Effect, NodeId, NodeKind, NodeOrientation, text_bounds,
};

/// Error returned by structural mutations.
///
/// A rejected mutation leaves the scene exactly as it was.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SceneError {
    /// A node handle refers to a disposed node.
    StaleNode,
    /// The mutation would make a node its own ancestor through parent or
    /// clip links.
    Cycle,
    /// The clip is already the clip of another node.
    ClipInUse,
    /// The clip has a parent.
    ClipHasParent,
    /// The child is installed as some node's clip.
    ChildIsClip,
    /// The child is the scene root.
    IsSceneRoot,
    /// The root has a parent.
    RootHasParent,
    /// The node kind cannot have children.
    NotAParent,
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StaleNode => "node has been disposed",
            Self::Cycle => "a node cannot be its own ancestor",
            Self::ClipInUse => "node is already the clip of another node",
            Self::ClipHasParent => "a clip node cannot have a parent",
            Self::ChildIsClip => "node is the clip of another node",
            Self::IsSceneRoot => "node is the scene root",
            Self::RootHasParent => "the scene root cannot have a parent",
            Self::NotAParent => "node kind cannot have children",
        })
    }
}

impl core::error::Error for SceneError {}

/// Transform contributors of a node. Allocated on first write.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TransformProps {
    pub(crate) layout_x: f64,
    pub(crate) layout_y: f64,
    pub(crate) translate_x: f64,
    pub(crate) translate_y: f64,
    pub(crate) translate_z: f64,
    pub(crate) scale_x: f64,
    pub(crate) scale_y: f64,
    pub(crate) scale_z: f64,
    pub(crate) rotate: f64,
    pub(crate) rotation_axis: RotationAxis,
    pub(crate) transforms: Vec<TransformOp>,
}

impl Default for TransformProps {
    fn default() -> Self {
        Self {
            layout_x: 0.0,
            layout_y: 0.0,
            translate_x: 0.0,
            translate_y: 0.0,
            translate_z: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            scale_z: 1.0,
            rotate: 0.0,
            rotation_axis: RotationAxis::Z,
            transforms: Vec::new(),
        }
    }
}

impl TransformProps {
    /// Rotation and scale are applied about the layout-bounds center.
    fn uses_pivot(&self) -> bool {
        self.rotate != 0.0 || self.scale_x != 1.0 || self.scale_y != 1.0 || self.scale_z != 1.0
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    generation: u32,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) clip: Option<NodeId>,
    pub(crate) clip_parent: Option<NodeId>,
    pub(crate) in_scene: bool,

    pub(crate) visible: bool,
    pub(crate) opacity: f64,
    pub(crate) blend_mode: Option<BlendMode>,
    pub(crate) effect: Option<Effect>,
    pub(crate) cache: bool,
    pub(crate) cache_hint: CacheHint,
    pub(crate) depth_test: bool,
    pub(crate) managed: bool,
    pub(crate) orientation: NodeOrientation,
    pub(crate) transform: Option<Box<TransformProps>>,
    pub(crate) appearance: Appearance,

    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) pref_width: f64,
    pub(crate) pref_height: f64,
    pub(crate) layout: Option<Rc<dyn LayoutPolicy>>,
    pub(crate) needs_layout: bool,
    pub(crate) performing_layout: bool,

    pub(crate) style_id: Option<Rc<str>>,
    pub(crate) style_classes: SmallVec<[Rc<str>; 2]>,
    pub(crate) inline_style: Option<Rc<str>>,
    pub(crate) pseudo_classes: PseudoClassSet,
    pub(crate) css_flag: CssFlags,
    pub(crate) helper: Option<StyleHelper>,
    /// Origin of each styleable property's value; absent means initial.
    pub(crate) origins: HashMap<&'static str, StyleOrigin>,
    /// Properties CSS may not set.
    pub(crate) bound: SmallVec<[&'static str; 1]>,
    pub(crate) tracks_styles: bool,

    pub(crate) geom_bounds: Lazy<Bounds>,
    pub(crate) layout_bounds: Lazy<Rect>,
    pub(crate) local_bounds: Lazy<Bounds>,
    pub(crate) parent_bounds: Lazy<Bounds>,
    pub(crate) local_to_parent: Lazy<NodeTransform>,
    pub(crate) local_version: u64,
    pub(crate) local_to_scene: SceneTransform,
    pub(crate) observed: u8,

    pub(crate) dirty: DirtyBits,
    pub(crate) in_dirty_list: bool,
}

impl Node {
    fn new(generation: u32, kind: NodeKind) -> Self {
        Self {
            generation,
            kind,
            parent: None,
            children: Vec::new(),
            clip: None,
            clip_parent: None,
            in_scene: false,
            visible: true,
            opacity: 1.0,
            blend_mode: None,
            effect: None,
            cache: false,
            cache_hint: CacheHint::Default,
            depth_test: true,
            managed: true,
            orientation: NodeOrientation::Inherit,
            transform: None,
            appearance: Appearance::default(),
            width: 0.0,
            height: 0.0,
            pref_width: -1.0,
            pref_height: -1.0,
            layout: None,
            needs_layout: true,
            performing_layout: false,
            style_id: None,
            style_classes: SmallVec::new(),
            inline_style: None,
            pseudo_classes: PseudoClassSet::new(),
            css_flag: CssFlags::Clean,
            helper: None,
            origins: HashMap::new(),
            bound: SmallVec::new(),
            tracks_styles: false,
            geom_bounds: Lazy::default(),
            layout_bounds: Lazy::default(),
            local_bounds: Lazy::default(),
            parent_bounds: Lazy::default(),
            local_to_parent: Lazy::default(),
            local_version: 0,
            local_to_scene: SceneTransform::default(),
            observed: 0,
            dirty: DirtyBits::default(),
            in_dirty_list: false,
        }
    }

    /// Parent in the transform sense: a clip lives in its owner's space.
    pub(crate) fn space_parent(&self) -> Option<NodeId> {
        self.parent.or(self.clip_parent)
    }
}

/// A retained scene graph.
///
/// Nodes live in a generational arena and are addressed by [`NodeId`]. A node
/// is part of the scene while it is reachable from the root through child or
/// clip links; only such nodes are styled, laid out, and synchronized to
/// peers.
///
/// Bounds and transforms are computed lazily and cached. Property setters
/// invalidate exactly the caches that depend on them and record the changed
/// aspects as [`DirtyBits`]; a [`PulseDriver`](crate::PulseDriver) later
/// pushes those aspects to the rendering backend.
///
/// ## Example
///
/// ```rust
/// use kurbo::Rect;
/// use understory_scene::{Bounds, NodeKind, SceneGraph};
///
/// let mut scene = SceneGraph::new();
/// let root = scene.create(NodeKind::Group);
/// let rect = scene.create(NodeKind::Rectangle { width: 10.0, height: 10.0 });
/// scene.add_child(root, rect).unwrap();
/// scene.set_root(Some(root)).unwrap();
///
/// scene.set_translate(rect, 5.0, 3.0, 0.0);
/// assert_eq!(
///     scene.bounds_in_parent(root),
///     Some(Bounds::Rect(Rect::new(5.0, 3.0, 15.0, 13.0)))
/// );
/// ```
pub struct SceneGraph {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: Option<NodeId>,
    /// Nodes in the scene with dirty bits, in the order they became dirty.
    pub(crate) dirty_list: Vec<NodeId>,
    /// Nodes that left the scene since the last pulse.
    pub(crate) departed: Vec<NodeId>,
    pub(crate) styles: StyleManager,
    pub(crate) css_dirty: bool,
    transform_epoch: u64,
    next_version: u64,
    invalidations: Vec<Invalidation>,
    stats: CacheStats,
}

impl fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("SceneGraph")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("root", &self.root)
            .field("dirty", &self.dirty_list.len())
            .field("transform_epoch", &self.transform_epoch)
            .finish_non_exhaustive()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Creates an empty scene with the default style configuration.
    pub fn new() -> Self {
        Self::with_style_config(StyleConfig::default())
    }

    /// Creates an empty scene.
    pub fn with_style_config(config: StyleConfig) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: None,
            dirty_list: Vec::new(),
            departed: Vec::new(),
            styles: StyleManager::new(config),
            css_dirty: false,
            transform_epoch: 1,
            next_version: 0,
            invalidations: Vec::new(),
            stats: CacheStats::default(),
        }
    }

    // --- structure ---

    /// Creates a detached node.
    ///
    /// The node starts with every cache invalid and every dirty bit set.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, kind));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, kind)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        NodeId::new(idx, generation)
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.1)
            .unwrap_or(false)
    }

    fn check_alive(&self, id: NodeId) -> Result<(), SceneError> {
        if self.is_alive(id) {
            Ok(())
        } else {
            Err(SceneError::StaleNode)
        }
    }

    /// The scene root.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Replaces the scene root.
    ///
    /// The previous root's subtree leaves the scene; the new root's subtree
    /// enters it and is fully restyled, laid out, and synchronized.
    pub fn set_root(&mut self, root: Option<NodeId>) -> Result<(), SceneError> {
        if let Some(r) = root {
            self.check_alive(r)?;
            let n = self.node(r);
            if n.parent.is_some() {
                return Err(SceneError::RootHasParent);
            }
            if n.clip_parent.is_some() {
                return Err(SceneError::ChildIsClip);
            }
        }
        if self.root == root {
            return Ok(());
        }
        if let Some(old) = self.root.take() {
            self.set_in_scene(old, false);
        }
        self.root = root;
        if let Some(r) = root {
            self.set_in_scene(r, true);
            self.request_layout(r);
        }
        Ok(())
    }

    /// Returns the parent of a node, or `None` for roots, detached nodes, and
    /// stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    /// Get the children of a node, or empty slice if node is stale.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// The node's clip.
    pub fn clip_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.clip)
    }

    /// The node that uses `id` as its clip.
    pub fn clip_parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.clip_parent)
    }

    /// Whether the node is reachable from the scene root.
    pub fn is_in_scene(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.in_scene)
    }

    /// The node's kind.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node_opt(id).map(|n| &n.kind)
    }

    /// Appends `child` to `parent`'s children.
    ///
    /// A child that already has a parent is first removed from it.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.insert_child(parent, usize::MAX, child)
    }

    /// Inserts `child` at `index` (clamped) in `parent`'s children.
    ///
    /// A child that already has a parent is first removed from it, so a node
    /// is never the child of two parents.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), SceneError> {
        self.check_alive(parent)?;
        self.check_alive(child)?;
        if !self.node(parent).kind.is_parent() {
            return Err(SceneError::NotAParent);
        }
        if self.root == Some(child) {
            return Err(SceneError::IsSceneRoot);
        }
        if self.node(child).clip_parent.is_some() {
            return Err(SceneError::ChildIsClip);
        }
        if self.is_in_chain(child, parent) {
            return Err(SceneError::Cycle);
        }
        if let Some(old) = self.node(child).parent {
            self.unlink_child(old, child);
        }
        let siblings = &mut self.node_mut(parent).children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        self.mark_dirty(parent, DirtyBits::PARENT_CHILDREN);
        if self.node(parent).in_scene {
            self.set_in_scene(child, true);
        }
        self.transform_changed(child);
        if !self.node(child).visible {
            // Invisible children never reach the parent through bounds
            // invalidation, but the child list still changed.
            self.invalidate_geom(parent);
        }
        self.request_css(child, CssFlags::Reapply);
        if self.node(child).managed {
            self.request_layout(parent);
        }
        Ok(())
    }

    /// Removes `child` from `parent`. Returns `false` if it was not a child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.is_alive(parent) || self.parent_of(child) != Some(parent) {
            return false;
        }
        self.unlink_child(parent, child);
        true
    }

    fn unlink_child(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(parent).children.retain(|c| *c != child);
        let n = self.node_mut(child);
        n.parent = None;
        let (in_scene, managed) = (n.in_scene, n.managed);
        if in_scene {
            self.set_in_scene(child, false);
        }
        self.mark_dirty(parent, DirtyBits::PARENT_CHILDREN);
        self.invalidate_geom(parent);
        self.transform_changed(child);
        if managed {
            self.request_layout(parent);
        }
    }

    /// Sets or clears the node's clip.
    ///
    /// The clip's coordinate space is the node's local space. A clip must not
    /// have a parent, must not clip another node, and must not be the node or
    /// one of its ancestors.
    pub fn set_clip(&mut self, id: NodeId, clip: Option<NodeId>) -> Result<(), SceneError> {
        self.check_alive(id)?;
        let old = self.node(id).clip;
        if old == clip {
            return Ok(());
        }
        if let Some(c) = clip {
            self.check_alive(c)?;
            if self.is_in_chain(c, id) {
                return Err(SceneError::Cycle);
            }
            if self.root == Some(c) {
                return Err(SceneError::IsSceneRoot);
            }
            let n = self.node(c);
            if n.parent.is_some() {
                return Err(SceneError::ClipHasParent);
            }
            if n.clip_parent.is_some() {
                return Err(SceneError::ClipInUse);
            }
        }
        if let Some(o) = old {
            let n = self.node_mut(o);
            n.clip_parent = None;
            if n.in_scene {
                self.set_in_scene(o, false);
            }
            self.transform_changed(o);
        }
        self.node_mut(id).clip = clip;
        if let Some(c) = clip {
            self.node_mut(c).clip_parent = Some(id);
            if self.node(id).in_scene {
                self.set_in_scene(c, true);
            }
            self.transform_changed(c);
            self.request_css(c, CssFlags::Reapply);
        }
        self.mark_dirty(id, DirtyBits::CLIP);
        self.invalidate_local_bounds(id);
        Ok(())
    }

    /// Removes a node and its subtree, including clips, from the arena.
    ///
    /// Ids of removed nodes become stale.
    pub fn dispose(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_child(parent, id);
        }
        if let Some(owner) = self.node(id).clip_parent {
            let n = self.node_mut(owner);
            n.clip = None;
            self.mark_dirty(owner, DirtyBits::CLIP);
            self.invalidate_local_bounds(owner);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        let mut stack = alloc::vec![id];
        while let Some(n) = stack.pop() {
            let Some(node) = self.nodes[n.idx()].take() else {
                continue;
            };
            if node.in_scene {
                self.departed.push(n);
            }
            stack.extend(node.children.iter().copied());
            stack.extend(node.clip);
            self.free_list.push(n.idx());
        }
    }

    /// Returns `true` if `candidate` is `start` or one of its ancestors
    /// through parent or clip links.
    fn is_in_chain(&self, candidate: NodeId, start: NodeId) -> bool {
        let mut cur = Some(start);
        while let Some(n) = cur {
            if n == candidate {
                return true;
            }
            cur = self.node(n).space_parent();
        }
        false
    }

    fn set_in_scene(&mut self, id: NodeId, on: bool) {
        let mut stack = alloc::vec![id];
        while let Some(n) = stack.pop() {
            let node = self.node_mut(n);
            if node.in_scene == on {
                continue;
            }
            node.in_scene = on;
            stack.extend(node.children.iter().copied());
            stack.extend(node.clip);
            if on {
                node.dirty = DirtyBits::all();
                node.css_flag = node.css_flag.merge(CssFlags::Reapply);
                node.needs_layout = true;
                if !node.in_dirty_list {
                    node.in_dirty_list = true;
                    self.dirty_list.push(n);
                }
            } else {
                self.departed.push(n);
            }
        }
        if on {
            self.css_dirty = true;
            self.mark_css_branch(id);
        }
    }

    // --- internals ---

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    pub(crate) fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    pub(crate) fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    /// Records changed aspects and puts scene nodes on the dirty list.
    pub(crate) fn mark_dirty(&mut self, id: NodeId, bits: DirtyBits) {
        let n = self.node_mut(id);
        n.dirty |= bits;
        if n.in_scene && !n.in_dirty_list {
            n.in_dirty_list = true;
            self.dirty_list.push(id);
        }
    }

    /// Dirty bits not yet pushed to the node's peer.
    pub fn dirty_bits(&self, id: NodeId) -> Option<DirtyBits> {
        self.node_opt(id).map(|n| n.dirty)
    }

    /// Number of scene nodes waiting for a peer sync.
    pub fn pending_sync(&self) -> usize {
        self.dirty_list.len()
    }

    fn replace_field<T: PartialEq>(
        &mut self,
        id: NodeId,
        value: T,
        field: impl FnOnce(&mut Node) -> &mut T,
    ) -> bool {
        let Some(n) = self.node_opt_mut(id) else {
            return false;
        };
        let slot = field(n);
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }

    fn record_user(&mut self, id: NodeId, meta: &'static CssMetaData) {
        if let Some(n) = self.node_opt_mut(id) {
            n.origins.insert(meta.property, StyleOrigin::User);
        }
    }

    // --- invalidation ---

    fn notify(&mut self, id: NodeId, quantity: CachedQuantity) {
        if self.node(id).observed & quantity.bit() != 0 {
            self.invalidations.push(Invalidation { node: id, quantity });
        }
    }

    /// Starts reporting invalidations of `quantity` on `id`.
    pub fn observe(&mut self, id: NodeId, quantity: CachedQuantity) {
        if let Some(n) = self.node_opt_mut(id) {
            n.observed |= quantity.bit();
        }
    }

    /// Stops reporting invalidations of `quantity` on `id`.
    pub fn unobserve(&mut self, id: NodeId, quantity: CachedQuantity) {
        if let Some(n) = self.node_opt_mut(id) {
            n.observed &= !quantity.bit();
        }
    }

    /// Drains invalidations of observed quantities, oldest first.
    ///
    /// Each quantity is reported at most once between two computations.
    pub fn take_invalidations(&mut self) -> Vec<Invalidation> {
        core::mem::take(&mut self.invalidations)
    }

    /// Recomputation counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }

    /// The node's intrinsic shape changed.
    pub(crate) fn geom_changed(&mut self, id: NodeId) {
        self.invalidate_geom(id);
        self.mark_dirty(id, DirtyBits::GEOMETRY);
    }

    pub(crate) fn invalidate_geom(&mut self, id: NodeId) {
        let n = self.node_mut(id);
        let was_valid = n.geom_bounds.invalidate();
        let resizable = n.kind.is_resizable();
        if was_valid {
            self.notify(id, CachedQuantity::GeomBounds);
        }
        if !resizable {
            self.invalidate_layout_bounds(id);
        }
        self.invalidate_local_bounds(id);
    }

    pub(crate) fn invalidate_layout_bounds(&mut self, id: NodeId) {
        if self.node_mut(id).layout_bounds.invalidate() {
            self.notify(id, CachedQuantity::LayoutBounds);
        }
        let n = self.node(id);
        let (parent, managed) = (n.parent, n.managed);
        let pivot = n.transform.as_deref().is_some_and(TransformProps::uses_pivot);
        if pivot || self.mirrors(id) {
            self.transform_changed(id);
        }
        if managed && let Some(p) = parent {
            self.request_layout(p);
        }
    }

    pub(crate) fn invalidate_local_bounds(&mut self, id: NodeId) {
        if self.node_mut(id).local_bounds.invalidate() {
            self.notify(id, CachedQuantity::LocalBounds);
        }
        self.mark_dirty(id, DirtyBits::BOUNDS);
        self.invalidate_parent_bounds(id);
    }

    fn invalidate_parent_bounds(&mut self, id: NodeId) {
        if self.node_mut(id).parent_bounds.invalidate() {
            self.notify(id, CachedQuantity::BoundsInParent);
        }
        self.mark_dirty(id, DirtyBits::TRANSFORMED_BOUNDS);
        let n = self.node(id);
        let (parent, clip_parent, visible) = (n.parent, n.clip_parent, n.visible);
        if visible && let Some(p) = parent {
            self.invalidate_geom(p);
        }
        if let Some(owner) = clip_parent {
            self.invalidate_local_bounds(owner);
        }
    }

    /// A transform contributor of the node changed.
    ///
    /// Descendants are not visited: their local-to-scene transforms become
    /// [`Validity::Unknown`] and are checked against their ancestors when read.
    pub(crate) fn transform_changed(&mut self, id: NodeId) {
        let n = self.node_mut(id);
        let local = n.local_to_parent.invalidate();
        let scene = core::mem::replace(&mut n.local_to_scene.valid, false);
        if local {
            self.notify(id, CachedQuantity::LocalToParent);
        }
        if scene {
            self.notify(id, CachedQuantity::LocalToScene);
        }
        self.transform_epoch += 1;
        self.mark_dirty(id, DirtyBits::TRANSFORM);
        self.invalidate_parent_bounds(id);
    }

    // --- cached quantities ---

    /// Intrinsic bounds of the node's kind in local space.
    pub fn geom_bounds(&mut self, id: NodeId) -> Option<Bounds> {
        self.is_alive(id).then(|| self.geom_bounds_of(id))
    }

    /// Bounds used by layout in local space.
    pub fn layout_bounds(&mut self, id: NodeId) -> Option<Rect> {
        self.is_alive(id).then(|| self.layout_bounds_of(id))
    }

    /// Geometry bounds with the effect and clip applied, in local space.
    pub fn bounds_in_local(&mut self, id: NodeId) -> Option<Bounds> {
        self.is_alive(id).then(|| self.local_bounds_of(id))
    }

    /// Local bounds mapped into the parent's space.
    pub fn bounds_in_parent(&mut self, id: NodeId) -> Option<Bounds> {
        self.is_alive(id).then(|| self.parent_bounds_of(id))
    }

    /// Transform from the node's space to its parent's.
    pub fn local_to_parent(&mut self, id: NodeId) -> Option<NodeTransform> {
        self.is_alive(id).then(|| self.local_to_parent_of(id))
    }

    /// Transform from the node's space to the scene's.
    pub fn local_to_scene(&mut self, id: NodeId) -> Option<NodeTransform> {
        self.is_alive(id).then(|| self.local_to_scene_of(id))
    }

    /// Maps a local point into scene space.
    pub fn local_to_scene_point(&mut self, id: NodeId, p: Point) -> Option<Point> {
        self.local_to_scene(id).map(|t| t.transform_point(p))
    }

    /// Validity of the cached local-to-scene transform, without resolving it.
    pub fn local_to_scene_validity(&self, id: NodeId) -> Option<Validity> {
        self.node_opt(id)
            .map(|n| n.local_to_scene.validity(self.transform_epoch))
    }

    pub(crate) fn geom_bounds_of(&mut self, id: NodeId) -> Bounds {
        if let Some(b) = self.node(id).geom_bounds.get() {
            return *b;
        }
        self.stats.geom_bounds += 1;
        let n = self.node(id);
        let stroke = match n.appearance.stroke {
            Some(_) if n.kind.is_shape() => n.appearance.stroke_width / 2.0,
            _ => 0.0,
        };
        let (width, height) = (n.width, n.height);
        let bounds = match n.kind.clone() {
            NodeKind::Group => self.children_union(id),
            NodeKind::Region => {
                let own = Bounds::Rect(Rect::new(0.0, 0.0, width, height));
                own.union(&self.children_union(id))
            }
            NodeKind::Rectangle { width, height } => {
                Bounds::from_rect(Rect::new(0.0, 0.0, width, height).inflate(stroke, stroke))
            }
            NodeKind::Circle { radius } => {
                let r = radius + stroke;
                Bounds::from_rect(Rect::new(-r, -r, r, r))
            }
            NodeKind::Text { content } => {
                let font = &self.node(id).appearance.font;
                Bounds::Rect(text_bounds(&content, font).inflate(stroke, stroke))
            }
        };
        self.node_mut(id).geom_bounds.set(bounds);
        bounds
    }

    fn children_union(&mut self, id: NodeId) -> Bounds {
        let mut out = Bounds::Empty;
        for i in 0..self.node(id).children.len() {
            let c = self.node(id).children[i];
            if self.node(c).visible {
                out = out.union(&self.parent_bounds_of(c));
            }
        }
        out
    }

    pub(crate) fn layout_bounds_of(&mut self, id: NodeId) -> Rect {
        if let Some(r) = self.node(id).layout_bounds.get() {
            return *r;
        }
        self.stats.layout_bounds += 1;
        let n = self.node(id);
        let r = if n.kind.is_resizable() {
            Rect::new(0.0, 0.0, n.width, n.height)
        } else {
            self.geom_bounds_of(id).rect_or_zero()
        };
        self.node_mut(id).layout_bounds.set(r);
        r
    }

    pub(crate) fn local_bounds_of(&mut self, id: NodeId) -> Bounds {
        if let Some(b) = self.node(id).local_bounds.get() {
            return *b;
        }
        self.stats.local_bounds += 1;
        let mut b = self.geom_bounds_of(id);
        let n = self.node(id);
        let (effect, clip) = (n.effect, n.clip);
        if let Some(effect) = effect {
            b = b.with_effect(&effect);
        }
        if let Some(c) = clip {
            b = match self.parent_bounds_of(c).rect() {
                Some(r) => b.intersect_rect(r),
                None => Bounds::Empty,
            };
        }
        self.node_mut(id).local_bounds.set(b);
        b
    }

    pub(crate) fn parent_bounds_of(&mut self, id: NodeId) -> Bounds {
        if let Some(b) = self.node(id).parent_bounds.get() {
            return *b;
        }
        self.stats.bounds_in_parent += 1;
        let local = self.local_bounds_of(id);
        let b = self.local_to_parent_of(id).transform_bounds(&local);
        self.node_mut(id).parent_bounds.set(b);
        b
    }

    /// Orientation after resolving [`NodeOrientation::Inherit`].
    pub fn effective_orientation(&self, id: NodeId) -> NodeOrientation {
        let mut cur = Some(id);
        while let Some(n) = cur.and_then(|c| self.node_opt(c)) {
            if n.orientation != NodeOrientation::Inherit {
                return n.orientation;
            }
            cur = n.space_parent();
        }
        NodeOrientation::LeftToRight
    }

    /// Whether the node flows opposite to its parent.
    fn mirrors(&self, id: NodeId) -> bool {
        let parent = match self.node(id).space_parent() {
            Some(p) => self.effective_orientation(p),
            None => NodeOrientation::LeftToRight,
        };
        self.effective_orientation(id) != parent
    }

    pub(crate) fn local_to_parent_of(&mut self, id: NodeId) -> NodeTransform {
        if let Some(t) = self.node(id).local_to_parent.get() {
            return *t;
        }
        self.stats.local_to_parent += 1;
        let props = self.node(id).transform.as_deref().cloned().unwrap_or_default();
        let mirror = self.mirrors(id);
        let pivot = props.uses_pivot();
        let center = if pivot || mirror {
            self.layout_bounds_of(id).center()
        } else {
            Point::ZERO
        };
        let mut t = NodeTransform::Identity.derive_with_translation(
            props.layout_x + props.translate_x,
            props.layout_y + props.translate_y,
            props.translate_z,
        );
        if pivot {
            t = t
                .derive_with_translation(center.x, center.y, 0.0)
                .derive_with_rotation(props.rotate, props.rotation_axis)
                .derive_with_scale(props.scale_x, props.scale_y, props.scale_z)
                .derive_with_translation(-center.x, -center.y, 0.0);
        }
        for op in &props.transforms {
            t = t.concat(&op.to_node_transform());
        }
        if mirror {
            t = t
                .derive_with_translation(center.x, 0.0, 0.0)
                .derive_with_scale(-1.0, 1.0, 1.0)
                .derive_with_translation(-center.x, 0.0, 0.0);
        }
        self.next_version += 1;
        let version = self.next_version;
        let n = self.node_mut(id);
        n.local_version = version;
        n.local_to_parent.set(t);
        t
    }

    pub(crate) fn local_to_scene_of(&mut self, id: NodeId) -> NodeTransform {
        let epoch = self.transform_epoch;
        let cached = self.node(id).local_to_scene;
        if cached.validity(epoch) == Validity::Valid {
            return cached.value;
        }
        let (parent_value, parent_version) = match self.node(id).space_parent() {
            Some(p) => {
                let v = self.local_to_scene_of(p);
                (v, self.node(p).local_to_scene.version)
            }
            None => (NodeTransform::Identity, 0),
        };
        let local = self.local_to_parent_of(id);
        let n = self.node(id);
        let local_version = n.local_version;
        if n.local_to_scene.valid
            && n.local_to_scene.parent_version == parent_version
            && n.local_to_scene.local_version == local_version
        {
            self.stats.local_to_scene_revalidated += 1;
            let n = self.node_mut(id);
            n.local_to_scene.checked_epoch = epoch;
            return n.local_to_scene.value;
        }
        self.stats.local_to_scene += 1;
        self.next_version += 1;
        let value = parent_value.concat(&local);
        self.node_mut(id).local_to_scene = SceneTransform {
            value,
            valid: true,
            checked_epoch: epoch,
            version: self.next_version,
            parent_version,
            local_version,
        };
        value
    }

    // --- geometry ---

    /// Resizes a rectangle. Ignored for other kinds.
    pub fn set_rectangle_size(&mut self, id: NodeId, width: f64, height: f64) {
        if let Some(n) = self.node_opt_mut(id)
            && let NodeKind::Rectangle { width: w, height: h } = &mut n.kind
            && (*w != width || *h != height)
        {
            *w = width;
            *h = height;
            self.geom_changed(id);
        }
    }

    /// Sets a circle's radius. Ignored for other kinds.
    pub fn set_circle_radius(&mut self, id: NodeId, radius: f64) {
        if let Some(n) = self.node_opt_mut(id)
            && let NodeKind::Circle { radius: r } = &mut n.kind
            && *r != radius
        {
            *r = radius;
            self.geom_changed(id);
        }
    }

    /// Replaces a text node's content. Ignored for other kinds.
    pub fn set_text(&mut self, id: NodeId, content: &str) {
        if let Some(n) = self.node_opt_mut(id)
            && let NodeKind::Text { content: c } = &mut n.kind
            && **c != *content
        {
            *c = Rc::from(content);
            self.geom_changed(id);
        }
    }

    // --- node properties ---

    /// Whether the node is visible.
    pub fn is_visible(&self, id: NodeId) -> Option<bool> {
        self.node_opt(id).map(|n| n.visible)
    }

    /// Shows or hides the node.
    ///
    /// Invisible nodes do not contribute to their parent's bounds.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        self.record_user(id, &style::VISIBILITY);
        self.write_visible(id, visible);
    }

    pub(crate) fn write_visible(&mut self, id: NodeId, visible: bool) -> bool {
        if !self.replace_field(id, visible, |n| &mut n.visible) {
            return false;
        }
        self.mark_dirty(id, DirtyBits::VISIBLE);
        let n = self.node(id);
        let (parent, managed) = (n.parent, n.managed);
        if let Some(p) = parent {
            self.invalidate_geom(p);
            if managed {
                self.request_layout(p);
            }
        }
        true
    }

    /// The node's opacity.
    pub fn opacity(&self, id: NodeId) -> Option<f64> {
        self.node_opt(id).map(|n| n.opacity)
    }

    /// Sets the node's opacity.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f64) {
        self.record_user(id, &style::OPACITY);
        self.write_opacity(id, opacity);
    }

    pub(crate) fn write_opacity(&mut self, id: NodeId, opacity: f64) -> bool {
        let changed = self.replace_field(id, opacity, |n| &mut n.opacity);
        if changed {
            self.mark_dirty(id, DirtyBits::OPACITY);
        }
        changed
    }

    /// The node's blend mode; `None` inherits the backend default.
    pub fn blend_mode(&self, id: NodeId) -> Option<BlendMode> {
        self.node_opt(id).and_then(|n| n.blend_mode)
    }

    /// Sets the node's blend mode.
    pub fn set_blend_mode(&mut self, id: NodeId, mode: Option<BlendMode>) {
        self.record_user(id, &style::BLEND_MODE);
        self.write_blend_mode(id, mode);
    }

    pub(crate) fn write_blend_mode(&mut self, id: NodeId, mode: Option<BlendMode>) -> bool {
        let changed = self.replace_field(id, mode, |n| &mut n.blend_mode);
        if changed {
            self.mark_dirty(id, DirtyBits::BLEND_MODE);
        }
        changed
    }

    /// The node's effect.
    pub fn effect(&self, id: NodeId) -> Option<Effect> {
        self.node_opt(id).and_then(|n| n.effect)
    }

    /// Sets the node's effect, which may grow its local bounds.
    pub fn set_effect(&mut self, id: NodeId, effect: Option<Effect>) {
        if self.replace_field(id, effect, |n| &mut n.effect) {
            self.mark_dirty(id, DirtyBits::EFFECT);
            self.invalidate_local_bounds(id);
        }
    }

    /// Asks the backend to cache the node as a bitmap.
    pub fn set_cache(&mut self, id: NodeId, cache: bool) {
        self.record_user(id, &style::CACHE);
        self.write_cache(id, cache);
    }

    pub(crate) fn write_cache(&mut self, id: NodeId, cache: bool) -> bool {
        let changed = self.replace_field(id, cache, |n| &mut n.cache);
        if changed {
            self.mark_dirty(id, DirtyBits::CACHE);
        }
        changed
    }

    /// Sets the tradeoff the backend should make when caching the node.
    pub fn set_cache_hint(&mut self, id: NodeId, hint: CacheHint) {
        if self.replace_field(id, hint, |n| &mut n.cache_hint) {
            self.mark_dirty(id, DirtyBits::CACHE);
        }
    }

    /// Enables or disables depth testing for the node.
    pub fn set_depth_test(&mut self, id: NodeId, depth_test: bool) {
        if self.replace_field(id, depth_test, |n| &mut n.depth_test) {
            self.mark_dirty(id, DirtyBits::DEPTH_TEST);
        }
    }

    /// Whether the parent's layout positions and sizes the node.
    pub fn set_managed(&mut self, id: NodeId, managed: bool) {
        if self.replace_field(id, managed, |n| &mut n.managed)
            && let Some(p) = self.parent_of(id)
        {
            self.request_layout(p);
        }
    }

    /// The node's declared orientation.
    pub fn node_orientation(&self, id: NodeId) -> Option<NodeOrientation> {
        self.node_opt(id).map(|n| n.orientation)
    }

    /// Sets the node's orientation.
    ///
    /// Mirroring depends on how a node's effective orientation compares with
    /// its parent's, so every transform in the subtree is invalidated.
    pub fn set_node_orientation(&mut self, id: NodeId, orientation: NodeOrientation) {
        if !self.replace_field(id, orientation, |n| &mut n.orientation) {
            return;
        }
        let mut stack = alloc::vec![id];
        while let Some(n) = stack.pop() {
            self.transform_changed(n);
            let node = self.node(n);
            stack.extend(node.children.iter().copied());
            stack.extend(node.clip);
        }
    }

    // --- transform contributors ---

    fn transform_props(&self, id: NodeId) -> Option<TransformProps> {
        self.node_opt(id)
            .map(|n| n.transform.as_deref().cloned().unwrap_or_default())
    }

    pub(crate) fn write_transform(
        &mut self,
        id: NodeId,
        update: impl FnOnce(&mut TransformProps),
    ) -> bool {
        let Some(n) = self.node_opt_mut(id) else {
            return false;
        };
        let mut props = n.transform.as_deref().cloned().unwrap_or_default();
        update(&mut props);
        let changed = match n.transform.as_deref() {
            Some(current) => *current != props,
            None => props != TransformProps::default(),
        };
        if !changed {
            return false;
        }
        n.transform = Some(Box::new(props));
        self.transform_changed(id);
        true
    }

    /// Layout position of the node's origin in its parent.
    pub fn layout_position(&self, id: NodeId) -> Option<Point> {
        self.transform_props(id)
            .map(|p| Point::new(p.layout_x, p.layout_y))
    }

    /// Sets the layout position. Usually called by layout.
    pub fn set_layout_position(&mut self, id: NodeId, x: f64, y: f64) {
        self.write_transform(id, |p| {
            p.layout_x = x;
            p.layout_y = y;
        });
    }

    /// Translation as `(x, y, z)`.
    pub fn translate(&self, id: NodeId) -> Option<(f64, f64, f64)> {
        self.transform_props(id)
            .map(|p| (p.translate_x, p.translate_y, p.translate_z))
    }

    /// Sets the translation.
    pub fn set_translate(&mut self, id: NodeId, x: f64, y: f64, z: f64) {
        self.record_user(id, &style::TRANSLATE_X);
        self.record_user(id, &style::TRANSLATE_Y);
        self.record_user(id, &style::TRANSLATE_Z);
        self.write_transform(id, |p| {
            p.translate_x = x;
            p.translate_y = y;
            p.translate_z = z;
        });
    }

    /// Scale as `(x, y, z)`, applied about the layout-bounds center.
    pub fn scale(&self, id: NodeId) -> Option<(f64, f64, f64)> {
        self.transform_props(id)
            .map(|p| (p.scale_x, p.scale_y, p.scale_z))
    }

    /// Sets the scale.
    pub fn set_scale(&mut self, id: NodeId, x: f64, y: f64, z: f64) {
        self.record_user(id, &style::SCALE_X);
        self.record_user(id, &style::SCALE_Y);
        self.record_user(id, &style::SCALE_Z);
        self.write_transform(id, |p| {
            p.scale_x = x;
            p.scale_y = y;
            p.scale_z = z;
        });
    }

    /// Rotation in degrees about the layout-bounds center.
    pub fn rotate(&self, id: NodeId) -> Option<f64> {
        self.transform_props(id).map(|p| p.rotate)
    }

    /// Sets the rotation angle in degrees.
    pub fn set_rotate(&mut self, id: NodeId, degrees: f64) {
        self.record_user(id, &style::ROTATE);
        self.write_transform(id, |p| p.rotate = degrees);
    }

    /// Sets the rotation axis.
    pub fn set_rotation_axis(&mut self, id: NodeId, axis: RotationAxis) {
        self.write_transform(id, |p| p.rotation_axis = axis);
    }

    /// Replaces the explicit transform list, applied after rotation and scale.
    pub fn set_transforms(&mut self, id: NodeId, transforms: Vec<TransformOp>) {
        self.write_transform(id, |p| p.transforms = transforms);
    }

    // --- appearance ---

    /// Styled paint and decoration.
    pub fn appearance(&self, id: NodeId) -> Option<&Appearance> {
        self.node_opt(id).map(|n| &n.appearance)
    }

    pub(crate) fn write_appearance(
        &mut self,
        id: NodeId,
        update: impl FnOnce(&mut Appearance),
    ) -> bool {
        let Some(n) = self.node_opt_mut(id) else {
            return false;
        };
        let before = n.appearance.clone();
        update(&mut n.appearance);
        let after = &n.appearance;
        if *after == before {
            return false;
        }
        let shape = n.kind.is_shape();
        let text = matches!(n.kind, NodeKind::Text { .. });
        let region = n.kind.is_resizable();
        let geometry = (shape
            && (after.stroke.is_some() != before.stroke.is_some()
                || after.stroke_width != before.stroke_width))
            || (text && after.font != before.font);
        let padding = region && after.padding != before.padding;
        self.mark_dirty(id, DirtyBits::CONTENTS);
        if geometry {
            self.geom_changed(id);
        }
        if padding {
            self.request_layout(id);
        }
        true
    }

    /// Sets the shape fill.
    pub fn set_fill(&mut self, id: NodeId, fill: Option<Color>) {
        self.record_user(id, &style::FILL);
        self.write_appearance(id, |a| a.fill = fill);
    }

    /// Sets the shape stroke.
    pub fn set_stroke(&mut self, id: NodeId, stroke: Option<Color>, width: f64) {
        self.record_user(id, &style::STROKE);
        self.record_user(id, &style::STROKE_WIDTH);
        self.write_appearance(id, |a| {
            a.stroke = stroke;
            a.stroke_width = width;
        });
    }

    /// Sets the region background.
    pub fn set_background(&mut self, id: NodeId, background: Option<Color>) {
        self.record_user(id, &style::BACKGROUND_COLOR);
        self.write_appearance(id, |a| a.background = background);
    }

    /// Sets the region padding.
    pub fn set_padding(&mut self, id: NodeId, padding: f64) {
        self.record_user(id, &style::PADDING);
        self.write_appearance(id, |a| a.padding = padding);
    }

    /// Sets the text font.
    pub fn set_font(&mut self, id: NodeId, font: Font) {
        self.record_user(id, &understory_style::FONT);
        self.write_appearance(id, |a| a.font = font);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: f64, h: f64) -> NodeKind {
        NodeKind::Rectangle {
            width: w,
            height: h,
        }
    }

    fn scene_with_group() -> (SceneGraph, NodeId) {
        let mut scene = SceneGraph::new();
        let root = scene.create(NodeKind::Group);
        scene.set_root(Some(root)).unwrap();
        (scene, root)
    }

    /// Parent, children, clip and clip parent of every live node.
    fn snapshot(
        scene: &SceneGraph,
    ) -> Vec<(Option<NodeId>, Vec<NodeId>, Option<NodeId>, Option<NodeId>)> {
        scene
            .nodes
            .iter()
            .flatten()
            .map(|n| (n.parent, n.children.clone(), n.clip, n.clip_parent))
            .collect()
    }

    #[test]
    fn new_nodes_are_detached_and_fully_dirty() {
        let mut scene = SceneGraph::new();
        let n = scene.create(rect(1.0, 1.0));
        assert_eq!(scene.dirty_bits(n), Some(DirtyBits::all()), "all bits set");
        assert!(!scene.is_in_scene(n), "detached");
        assert_eq!(scene.pending_sync(), 0, "detached nodes are not on the dirty list");
        assert_eq!(
            scene.local_to_scene_validity(n),
            Some(Validity::Invalid),
            "caches start invalid"
        );
    }

    #[test]
    fn cycles_are_rejected_and_leave_the_tree_unchanged() {
        let (mut scene, root) = scene_with_group();
        let a = scene.create(NodeKind::Group);
        let b = scene.create(NodeKind::Group);
        let c = scene.create(rect(5.0, 5.0));
        scene.add_child(root, a).unwrap();
        scene.add_child(a, b).unwrap();
        scene.set_clip(b, Some(c)).unwrap();

        let before = snapshot(&scene);
        assert_eq!(scene.add_child(b, a), Err(SceneError::Cycle), "grandparent under grandchild");
        assert_eq!(scene.add_child(a, a), Err(SceneError::Cycle), "self as child");
        assert_eq!(scene.set_clip(b, Some(a)), Err(SceneError::Cycle), "ancestor as clip");
        assert_eq!(scene.set_clip(a, Some(a)), Err(SceneError::Cycle), "self as clip");
        assert_eq!(scene.set_clip(c, Some(b)), Err(SceneError::Cycle), "owner as clip of its clip");
        assert_eq!(scene.set_clip(root, Some(b)), Err(SceneError::ClipHasParent), "parented clip");
        assert_eq!(snapshot(&scene), before, "unchanged after rejected calls");
    }

    #[test]
    fn clip_chains_count_as_ancestry() {
        let mut scene = SceneGraph::new();
        let owner = scene.create(NodeKind::Group);
        let clip = scene.create(NodeKind::Group);
        scene.set_clip(owner, Some(clip)).unwrap();
        assert_eq!(scene.add_child(clip, owner), Err(SceneError::Cycle), "owner under its clip");
        let other = scene.create(NodeKind::Group);
        assert_eq!(scene.set_clip(other, Some(clip)), Err(SceneError::ClipInUse), "clip reuse");
        assert_eq!(scene.add_child(other, clip), Err(SceneError::ChildIsClip), "clip as child");
    }

    #[test]
    fn adding_to_a_new_parent_detaches_from_the_old() {
        let (mut scene, root) = scene_with_group();
        let p1 = scene.create(NodeKind::Group);
        let p2 = scene.create(NodeKind::Group);
        let n = scene.create(rect(1.0, 1.0));
        scene.add_child(root, p1).unwrap();
        scene.add_child(root, p2).unwrap();
        scene.add_child(p1, n).unwrap();
        scene.add_child(p2, n).unwrap();
        assert_eq!(scene.parent_of(n), Some(p2), "new parent");
        assert!(!scene.children_of(p1).contains(&n), "removed from old parent");
        assert_eq!(scene.children_of(p2), &[n], "present once");
    }

    #[test]
    fn reinserting_moves_within_the_same_parent() {
        let (mut scene, root) = scene_with_group();
        let a = scene.create(rect(1.0, 1.0));
        let b = scene.create(rect(1.0, 1.0));
        scene.add_child(root, a).unwrap();
        scene.add_child(root, b).unwrap();
        scene.insert_child(root, 0, b).unwrap();
        assert_eq!(scene.children_of(root), &[b, a], "moved to front");
    }

    #[test]
    fn leaves_cannot_have_children() {
        let mut scene = SceneGraph::new();
        let leaf = scene.create(rect(1.0, 1.0));
        let other = scene.create(rect(1.0, 1.0));
        assert_eq!(scene.add_child(leaf, other), Err(SceneError::NotAParent), "rectangle");
    }

    #[test]
    fn root_rules() {
        let (mut scene, root) = scene_with_group();
        let child = scene.create(NodeKind::Group);
        scene.add_child(root, child).unwrap();
        assert_eq!(scene.set_root(Some(child)), Err(SceneError::RootHasParent), "child as root");
        let other = scene.create(NodeKind::Group);
        assert_eq!(scene.add_child(other, root), Err(SceneError::IsSceneRoot), "root as child");
    }

    #[test]
    fn entering_and_leaving_the_scene() {
        let (mut scene, root) = scene_with_group();
        let sub = scene.create(NodeKind::Group);
        let leaf = scene.create(rect(1.0, 1.0));
        scene.add_child(sub, leaf).unwrap();
        scene.add_child(root, sub).unwrap();
        assert!(scene.is_in_scene(leaf), "subtree entered");
        assert!(scene.dirty_list.contains(&leaf), "entered nodes are on the dirty list");
        scene.remove_child(root, sub);
        assert!(!scene.is_in_scene(leaf), "subtree left");
        assert!(scene.departed.contains(&leaf), "departure recorded");
    }

    #[test]
    fn dispose_makes_ids_stale() {
        let (mut scene, root) = scene_with_group();
        let sub = scene.create(NodeKind::Group);
        let leaf = scene.create(rect(1.0, 1.0));
        scene.add_child(sub, leaf).unwrap();
        scene.add_child(root, sub).unwrap();
        scene.dispose(sub);
        assert!(!scene.is_alive(sub) && !scene.is_alive(leaf), "subtree disposed");
        assert!(scene.children_of(root).is_empty(), "unlinked");
        let reused = scene.create(NodeKind::Group);
        assert!(scene.is_alive(reused) && !scene.is_alive(leaf), "generations differ");
    }

    #[test]
    fn get_is_idempotent() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(10.0, 10.0));
        scene.add_child(root, n).unwrap();
        scene.set_rotate(n, 30.0);
        let first = scene.bounds_in_parent(n);
        let stats = scene.cache_stats();
        let second = scene.bounds_in_parent(n);
        assert_eq!(first, second, "identical results");
        assert_eq!(scene.cache_stats(), stats, "no recomputation on the second read");
        assert_eq!(stats.bounds_in_parent, 1, "computed once");
    }

    #[test]
    fn invalidate_then_recompute_sees_new_values() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(10.0, 10.0));
        scene.add_child(root, n).unwrap();
        assert_eq!(
            scene.bounds_in_parent(root),
            Some(Bounds::Rect(Rect::new(0.0, 0.0, 10.0, 10.0))),
            "initial"
        );
        scene.set_rectangle_size(n, 20.0, 5.0);
        assert_eq!(
            scene.bounds_in_parent(root),
            Some(Bounds::Rect(Rect::new(0.0, 0.0, 20.0, 5.0))),
            "child geometry reaches the parent"
        );
    }

    #[test]
    fn invisible_children_do_not_contribute_to_parent_bounds() {
        let (mut scene, root) = scene_with_group();
        let g = scene.create(NodeKind::Group);
        let n = scene.create(rect(10.0, 10.0));
        scene.add_child(root, g).unwrap();
        scene.add_child(g, n).unwrap();
        let full = Bounds::Rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(scene.bounds_in_parent(g), Some(full), "visible child counts");
        scene.set_visible(n, false);
        assert!(scene.bounds_in_parent(g).unwrap().is_empty(), "hidden child ignored");
        scene.set_visible(n, true);
        assert_eq!(scene.bounds_in_parent(g), Some(full), "union restored");
    }

    #[test]
    fn hidden_children_still_track_their_own_bounds() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(10.0, 10.0));
        scene.add_child(root, n).unwrap();
        scene.set_visible(n, false);
        let _ = scene.bounds_in_parent(root);
        scene.dirty_list.clear();
        scene.node_mut(n).dirty = DirtyBits::empty();
        scene.node_mut(n).in_dirty_list = false;
        scene.set_rectangle_size(n, 4.0, 4.0);
        assert!(
            scene.dirty_bits(n).unwrap().contains(DirtyBits::TRANSFORMED_BOUNDS),
            "own dirty bits set"
        );
        assert_eq!(
            scene.bounds_in_parent(n),
            Some(Bounds::Rect(Rect::new(0.0, 0.0, 4.0, 4.0))),
            "own bounds updated"
        );
    }

    #[test]
    fn translation_offsets_bounds_exactly() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(10.3, 10.7));
        scene.add_child(root, n).unwrap();
        let local = scene.bounds_in_local(n).unwrap();
        scene.set_translate(n, 5.0, 3.0, 0.0);
        assert_eq!(
            scene.local_to_parent(n),
            Some(NodeTransform::Translate { x: 5.0, y: 3.0 }),
            "translation only"
        );
        assert_eq!(
            scene.bounds_in_parent(n),
            Some(local.translated(5.0, 3.0, 0.0)),
            "bounds offset exactly"
        );
    }

    #[test]
    fn rotation_pivots_about_the_layout_center() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(20.0, 10.0));
        scene.add_child(root, n).unwrap();
        scene.set_rotate(n, 90.0);
        let r = scene.bounds_in_parent(n).unwrap().rect().unwrap();
        assert!((r.x0 - 5.0).abs() < 1e-9 && (r.y0 + 5.0).abs() < 1e-9, "rotated about (10, 5): {r:?}");
        assert!((r.width() - 10.0).abs() < 1e-9, "width and height swap");
    }

    #[test]
    fn clip_and_effect_shape_local_bounds() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(10.0, 10.0));
        let clip = scene.create(rect(4.0, 4.0));
        scene.add_child(root, n).unwrap();
        scene.set_effect(n, Some(Effect::GaussianBlur { radius: 2.0 }));
        assert_eq!(
            scene.bounds_in_local(n),
            Some(Bounds::Rect(Rect::new(-2.0, -2.0, 12.0, 12.0))),
            "blur grows bounds"
        );
        scene.set_clip(n, Some(clip)).unwrap();
        assert_eq!(
            scene.bounds_in_local(n),
            Some(Bounds::Rect(Rect::new(0.0, 0.0, 4.0, 4.0))),
            "clip limits bounds"
        );
        scene.set_translate(clip, 2.0, 2.0, 0.0);
        assert_eq!(
            scene.bounds_in_local(n),
            Some(Bounds::Rect(Rect::new(2.0, 2.0, 6.0, 6.0))),
            "moving the clip updates the owner"
        );
        assert!(scene.is_in_scene(clip), "clip joins the owner's scene");
    }

    #[test]
    fn scene_transforms_are_validated_lazily() {
        let (mut scene, root) = scene_with_group();
        let a = scene.create(NodeKind::Group);
        let b = scene.create(rect(1.0, 1.0));
        let other = scene.create(rect(1.0, 1.0));
        scene.add_child(root, a).unwrap();
        scene.add_child(a, b).unwrap();
        scene.add_child(root, other).unwrap();
        scene.set_translate(a, 10.0, 0.0, 0.0);
        assert_eq!(
            scene.local_to_scene_point(b, Point::ZERO),
            Some(Point::new(10.0, 0.0)),
            "ancestor translation applied"
        );
        assert_eq!(scene.local_to_scene_validity(b), Some(Validity::Valid), "fresh");

        scene.set_translate(other, 1.0, 0.0, 0.0);
        assert_eq!(
            scene.local_to_scene_validity(b),
            Some(Validity::Unknown),
            "an unrelated change makes validity unknown"
        );
        let computed = scene.cache_stats().local_to_scene;
        let _ = scene.local_to_scene(b);
        assert_eq!(scene.cache_stats().local_to_scene, computed, "walk found it valid");
        assert_eq!(scene.local_to_scene_validity(b), Some(Validity::Valid), "revalidated");

        scene.set_translate(a, 20.0, 0.0, 0.0);
        assert_eq!(
            scene.local_to_scene_validity(b),
            Some(Validity::Unknown),
            "descendants are not visited eagerly"
        );
        assert_eq!(
            scene.local_to_scene_point(b, Point::ZERO),
            Some(Point::new(20.0, 0.0)),
            "walk found the ancestor change"
        );
    }

    #[test]
    fn observed_invalidations_fire_once_per_cycle() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(10.0, 10.0));
        scene.add_child(root, n).unwrap();
        scene.observe(n, CachedQuantity::BoundsInParent);
        let _ = scene.bounds_in_parent(n);
        scene.set_translate(n, 1.0, 0.0, 0.0);
        scene.set_translate(n, 2.0, 0.0, 0.0);
        let events = scene.take_invalidations();
        assert_eq!(
            events,
            alloc::vec![Invalidation {
                node: n,
                quantity: CachedQuantity::BoundsInParent
            }],
            "one notification until recomputed"
        );
        let _ = scene.bounds_in_parent(n);
        scene.set_translate(n, 3.0, 0.0, 0.0);
        assert_eq!(scene.take_invalidations().len(), 1, "fires again after recompute");
    }

    #[test]
    fn right_to_left_nodes_are_mirrored() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(10.0, 10.0));
        scene.add_child(root, n).unwrap();
        scene.set_node_orientation(n, NodeOrientation::RightToLeft);
        let p = scene.local_to_scene_point(n, Point::new(2.0, 0.0)).unwrap();
        assert!((p.x - 8.0).abs() < 1e-9, "mirrored about the center: {p:?}");
        scene.set_node_orientation(root, NodeOrientation::RightToLeft);
        let p = scene.local_to_scene_point(n, Point::new(2.0, 0.0)).unwrap();
        assert!((p.x - 8.0).abs() < 1e-9, "root mirrors, child inherits direction: {p:?}");
    }

    #[test]
    fn setters_ignore_unchanged_values() {
        let (mut scene, root) = scene_with_group();
        let n = scene.create(rect(10.0, 10.0));
        scene.add_child(root, n).unwrap();
        scene.node_mut(n).dirty = DirtyBits::empty();
        scene.set_opacity(n, 1.0);
        scene.set_translate(n, 0.0, 0.0, 0.0);
        assert!(scene.dirty_bits(n).unwrap().is_empty(), "no-op writes");
        assert!(scene.node(n).transform.is_none(), "contributors stay unallocated");
    }
}
