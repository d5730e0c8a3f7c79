use crate::geometry::{Bounds, Point2D};

pub const DEFAULT_CAPACITY: usize = 8;
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Point quadtree answering radius queries.
///
/// There is no removal; callers rebuild the tree for each query batch.
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    root: QuadNode<T>,
    capacity: usize,
    max_depth: usize,
    len: usize,
}

#[derive(Debug, Clone)]
struct QuadNode<T> {
    bounds: Bounds,
    depth: usize,
    items: Vec<(T, Point2D)>,
    children: Option<Box<[QuadNode<T>; 4]>>,
}

impl<T: Clone> QuadTree<T> {
    pub fn new(bounds: Bounds) -> Self {
        Self::with_limits(bounds, DEFAULT_CAPACITY, DEFAULT_MAX_DEPTH)
    }

    pub fn with_limits(bounds: Bounds, capacity: usize, max_depth: usize) -> Self {
        Self {
            root: QuadNode::new(bounds, 0),
            capacity: capacity.max(1),
            max_depth,
            len: 0,
        }
    }

    /// Build a tree sized to enclose every position. Returns `None` for empty input.
    pub fn from_items<I>(items: I) -> Option<Self>
    where
        I: IntoIterator<Item = (T, Point2D)>,
    {
        let items: Vec<(T, Point2D)> = items.into_iter().collect();
        let bounds = Bounds::from_points(items.iter().map(|(_, p)| *p))?;
        // Pad so that a zero-extent set still yields a splittable rectangle.
        let mut tree = Self::new(bounds.inflate(1e-6));
        for (obj, pos) in items {
            tree.insert(obj, pos);
        }
        Some(tree)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bounds(&self) -> Bounds {
        self.root.bounds
    }

    /// Insert `object` at `position`. Positions outside the root rectangle are
    /// rejected and `false` is returned.
    pub fn insert(&mut self, object: T, position: Point2D) -> bool {
        if !self.root.bounds.contains(position) {
            return false;
        }
        self.root.insert(object, position, self.capacity, self.max_depth);
        self.len += 1;
        true
    }

    /// Every stored `(object, position)` within `radius` of `center` (inclusive).
    pub fn query_radius(&self, center: Point2D, radius: f64) -> Vec<(T, Point2D)> {
        let mut out = Vec::new();
        if radius < 0.0 || !radius.is_finite() {
            return out;
        }
        let r_sq = radius * radius;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.bounds.distance_sq_to(center) > r_sq {
                continue;
            }
            for (obj, pos) in &node.items {
                if pos.distance_sq(center) <= r_sq {
                    out.push((obj.clone(), *pos));
                }
            }
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
        out
    }

    /// Maximum depth reached by any node; mostly useful for diagnostics.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            deepest = deepest.max(node.depth);
            if let Some(children) = &node.children {
                stack.extend(children.iter());
            }
        }
        deepest
    }
}

impl<T> QuadNode<T> {
    fn new(bounds: Bounds, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, object: T, position: Point2D, capacity: usize, max_depth: usize) {
        let idx = quadrant_of(&self.bounds, position);
        if let Some(children) = self.children.as_mut() {
            children[idx].insert(object, position, capacity, max_depth);
            return;
        }
        self.items.push((object, position));
        if self.items.len() > capacity && self.depth < max_depth {
            self.split();
        }
    }

    fn split(&mut self) {
        let depth = self.depth + 1;
        let [nw, ne, sw, se] = self.bounds.quadrants();
        let mut children = Box::new([
            QuadNode::new(nw, depth),
            QuadNode::new(ne, depth),
            QuadNode::new(sw, depth),
            QuadNode::new(se, depth),
        ]);
        for (obj, pos) in std::mem::take(&mut self.items) {
            let idx = quadrant_of(&self.bounds, pos);
            children[idx].items.push((obj, pos));
        }
        self.children = Some(children);
    }
}

/// Child slot for `p`, matching the order of `Bounds::quadrants`.
fn quadrant_of(bounds: &Bounds, p: Point2D) -> usize {
    let c = bounds.center();
    match (p.x >= c.x, p.y >= c.y) {
        (false, true) => 0,
        (true, true) => 1,
        (false, false) => 2,
        (true, false) => 3,
    }
}
