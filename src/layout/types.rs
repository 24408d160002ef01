use crate::ir::NodeKind;

pub type Point = (f32, f32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn right_mid(&self) -> Point {
        (self.right(), self.center_y())
    }

    pub fn left_mid(&self) -> Point {
        (self.x, self.center_y())
    }

    pub fn top_mid(&self) -> Point {
        (self.center_x(), self.y)
    }

    pub fn bottom_mid(&self) -> Point {
        (self.center_x(), self.bottom())
    }

    pub fn padded(&self, pad: f32) -> Self {
        Self::new(
            self.x - pad,
            self.y - pad,
            self.width + pad * 2.0,
            self.height + pad * 2.0,
        )
    }

    /// True when the interiors intersect; shared borders do not count.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        const EPS: f32 = 1e-3;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

#[derive(Debug, Clone)]
pub struct NodeLayout {
    pub id: String,
    pub kind: NodeKind,
    pub lane: String,
    pub level: usize,
    /// Signed row offset relative to the lane center.
    pub row: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NodeLayout {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct LaneLayout {
    pub id: String,
    pub name: String,
    pub pool: String,
    /// Lane created by the layout rather than declared in the input.
    pub synthesized: bool,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LaneLayout {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct PoolLayout {
    pub id: String,
    pub name: String,
    pub process_id: String,
    pub lanes: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PoolLayout {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }
}

/// Which routing strategy produced an edge's waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    SelfLoop,
    GatewayAlternate,
    GatewayReentry,
    CrossLane,
    GatewayMain,
    Straight,
    Detour,
    /// Every candidate collided; the unshifted route was kept anyway.
    Fallback,
}

impl RouteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::SelfLoop => "self_loop",
            RouteKind::GatewayAlternate => "gateway_alternate",
            RouteKind::GatewayReentry => "gateway_reentry",
            RouteKind::CrossLane => "cross_lane",
            RouteKind::GatewayMain => "gateway_main",
            RouteKind::Straight => "straight",
            RouteKind::Detour => "detour",
            RouteKind::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeLayout {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub condition: Option<String>,
    pub points: Vec<Point>,
    pub route: RouteKind,
    pub label_bounds: Option<Bounds>,
    /// Endpoints live in different pools.
    pub message: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub pools: Vec<PoolLayout>,
    pub lanes: Vec<LaneLayout>,
    /// Nodes in input declaration order.
    pub nodes: Vec<NodeLayout>,
    pub edges: Vec<EdgeLayout>,
    pub width: f32,
    pub height: f32,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn lane(&self, id: &str) -> Option<&LaneLayout> {
        self.lanes.iter().find(|lane| lane.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeLayout> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.lanes.is_empty()
    }
}
