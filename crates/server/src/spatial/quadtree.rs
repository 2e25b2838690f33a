//! QuadTree for spatial indexing.
//!
//! Items are axis-aligned boxes keyed by entity id. Each item lives in the
//! deepest node whose quadrant fully contains its box; items straddling a
//! split line stay in the parent. Leaves subdivide once they hold more than
//! `max_items` and fold back when their children are all leaves holding at
//! most `max_items` between them.

use std::collections::HashMap;

use crate::entity::EntityId;

/// Default number of items a leaf holds before subdividing.
pub const DEFAULT_MAX_ITEMS: usize = 16;
/// Default maximum tree depth.
pub const DEFAULT_MAX_DEPTH: u32 = 8;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Create bounds from center and half extent.
    #[inline]
    pub fn from_center(cx: f32, cy: f32, size: f32) -> Self {
        Self {
            min_x: cx - size,
            min_y: cy - size,
            max_x: cx + size,
            max_y: cy + size,
        }
    }

    /// Check if two bounds intersect. Touching edges do not count.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.min_x >= self.max_x
            || other.max_x <= self.min_x
            || other.min_y >= self.max_y
            || other.max_y <= self.min_y)
    }

    /// Check if `other` lies entirely inside these bounds.
    #[inline]
    pub fn contains(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Zero (or negative) area.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    #[inline]
    pub fn center_x(&self) -> f32 {
        (self.min_x + self.max_x) / 2.0
    }

    #[inline]
    pub fn center_y(&self) -> f32 {
        (self.min_y + self.max_y) / 2.0
    }

    /// The four quadrants: NW, NE, SW, SE.
    fn quadrants(&self) -> [Bounds; 4] {
        let (mx, my) = (self.center_x(), self.center_y());
        [
            Bounds::new(self.min_x, self.min_y, mx, my),
            Bounds::new(mx, self.min_y, self.max_x, my),
            Bounds::new(self.min_x, my, mx, self.max_y),
            Bounds::new(mx, my, self.max_x, self.max_y),
        ]
    }
}

#[derive(Debug)]
struct QuadNode {
    bounds: Bounds,
    depth: u32,
    items: Vec<(EntityId, Bounds)>,
    children: Option<Box<[QuadNode; 4]>>,
}

impl QuadNode {
    fn new(bounds: Bounds, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn child_for(&self, bound: &Bounds) -> Option<usize> {
        self.children
            .as_ref()?
            .iter()
            .position(|child| child.bounds.contains(bound))
    }

    fn insert(&mut self, id: EntityId, bound: Bounds, max_items: usize, max_depth: u32) {
        if let Some(index) = self.child_for(&bound) {
            if let Some(children) = &mut self.children {
                children[index].insert(id, bound, max_items, max_depth);
                return;
            }
        }

        self.items.push((id, bound));
        if self.children.is_none() && self.items.len() > max_items && self.depth < max_depth {
            self.subdivide(max_items, max_depth);
        }
    }

    fn subdivide(&mut self, max_items: usize, max_depth: u32) {
        let depth = self.depth + 1;
        let [nw, ne, sw, se] = self.bounds.quadrants();
        self.children = Some(Box::new([
            QuadNode::new(nw, depth),
            QuadNode::new(ne, depth),
            QuadNode::new(sw, depth),
            QuadNode::new(se, depth),
        ]));

        // Redistribute; items that fit no quadrant stay here.
        let items = std::mem::take(&mut self.items);
        for (id, bound) in items {
            match (self.child_for(&bound), &mut self.children) {
                (Some(index), Some(children)) => children[index].items.push((id, bound)),
                _ => self.items.push((id, bound)),
            }
        }

        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if child.items.len() > max_items && child.depth < max_depth {
                    child.subdivide(max_items, max_depth);
                }
            }
        }
    }

    fn remove(&mut self, id: EntityId, bound: &Bounds, max_items: usize) -> bool {
        let removed = if let Some(pos) = self.items.iter().position(|(item, _)| *item == id) {
            self.items.swap_remove(pos);
            true
        } else {
            match (self.child_for(bound), &mut self.children) {
                (Some(index), Some(children)) => children[index].remove(id, bound, max_items),
                _ => false,
            }
        };
        if removed {
            self.try_collapse(max_items);
        }
        removed
    }

    fn try_collapse(&mut self, max_items: usize) {
        let Some(children) = &self.children else {
            return;
        };
        if children.iter().any(|c| c.children.is_some()) {
            return;
        }
        let total = self.items.len() + children.iter().map(|c| c.items.len()).sum::<usize>();
        if total > max_items {
            return;
        }
        if let Some(children) = self.children.take() {
            let children: [QuadNode; 4] = *children;
            for child in children {
                self.items.extend(child.items);
            }
        }
    }

    fn query(&self, region: &Bounds, out: &mut Vec<EntityId>) {
        out.extend(
            self.items
                .iter()
                .filter(|(_, b)| b.intersects(region))
                .map(|(id, _)| *id),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                if child.bounds.intersects(region) {
                    child.query(region, out);
                }
            }
        }
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map_or(0, |c| c.iter().map(QuadNode::node_count).sum())
    }
}

/// Region quadtree over entity boxes.
#[derive(Debug)]
pub struct QuadTree {
    root: QuadNode,
    /// Current box of every indexed id.
    locations: HashMap<EntityId, Bounds>,
    max_items: usize,
    max_depth: u32,
}

impl QuadTree {
    /// Create a new QuadTree covering `bound`.
    pub fn new(bound: Bounds, max_items: usize, max_depth: u32) -> Self {
        Self {
            root: QuadNode::new(bound, 0),
            locations: HashMap::with_capacity(1024),
            max_items: max_items.max(1),
            max_depth,
        }
    }

    /// Create a QuadTree for the game world with default limits.
    pub fn for_world(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self::new(
            Bounds::new(min_x, min_y, max_x, max_y),
            DEFAULT_MAX_ITEMS,
            DEFAULT_MAX_DEPTH,
        )
    }

    /// Insert an item. An id that is already present is moved.
    pub fn insert(&mut self, id: EntityId, bound: Bounds) {
        if self.locations.contains_key(&id) {
            self.remove(id);
        }
        // Boxes outside the root stay at the root so they are never lost.
        self.root.insert(id, bound, self.max_items, self.max_depth);
        self.locations.insert(id, bound);
    }

    /// Remove an item. Returns false if it was not indexed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(bound) = self.locations.remove(&id) else {
            return false;
        };
        self.root.remove(id, &bound, self.max_items)
    }

    /// Move an item to a new box.
    pub fn update(&mut self, id: EntityId, bound: Bounds) {
        self.remove(id);
        self.root.insert(id, bound, self.max_items, self.max_depth);
        self.locations.insert(id, bound);
    }

    /// All ids whose box intersects `region`, in no particular order.
    pub fn query(&self, region: &Bounds) -> Vec<EntityId> {
        if region.is_degenerate() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(64);
        self.root.query(region, &mut out);
        out
    }

    /// Current box of an item.
    #[inline]
    pub fn get(&self, id: EntityId) -> Option<Bounds> {
        self.locations.get(&id).copied()
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.locations.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Clear all items.
    pub fn clear(&mut self) {
        self.root = QuadNode::new(self.root.bounds, 0);
        self.locations.clear();
    }

    /// Number of nodes in the tree, root included.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}
