use super::index::GraphIndex;
use super::lanes::LanePacking;
use super::placement::Placement;
use super::ranking::{Leveling, main_branches};
use super::types::{Bounds, EdgeLayout, Point, RouteKind};
use crate::config::RoutingConfig;

/// Tolerance for treating two anchors as horizontally or vertically aligned.
const ALIGN_EPS: f32 = 0.5;
const POINT_EPS: f32 = 1e-4;

pub(crate) fn route_flows(
    index: &GraphIndex,
    leveling: &Leveling,
    packing: &LanePacking,
    placement: &Placement,
    config: &RoutingConfig,
) -> Vec<EdgeLayout> {
    let main = main_branches(index, leveling);
    let router = Router {
        index,
        packing,
        boxes: &placement.boxes,
        config,
    };

    index
        .flows
        .iter()
        .enumerate()
        .map(|(flow_idx, entry)| {
            let (points, route) = router.route(flow_idx, main[flow_idx]);
            let label_bounds = entry
                .flow
                .label
                .as_ref()
                .and_then(|_| label_anchor(&points))
                .map(|(cx, cy)| {
                    Bounds::new(
                        cx - config.label_width / 2.0,
                        cy - config.label_height / 2.0,
                        config.label_width,
                        config.label_height,
                    )
                });
            EdgeLayout {
                id: entry.flow.id.clone(),
                from: entry.flow.source.clone(),
                to: entry.flow.target.clone(),
                label: entry.flow.label.clone(),
                condition: entry.flow.condition.clone(),
                points,
                route,
                label_bounds,
                message: index.pool_of(entry.source) != index.pool_of(entry.target),
            }
        })
        .collect()
}

struct Router<'a> {
    index: &'a GraphIndex<'a>,
    packing: &'a LanePacking,
    boxes: &'a [Bounds],
    config: &'a RoutingConfig,
}

impl Router<'_> {
    fn route(&self, flow_idx: usize, is_main: bool) -> (Vec<Point>, RouteKind) {
        let flow = &self.index.flows[flow_idx];
        let (src, tgt) = (flow.source, flow.target);
        if flow.is_self_loop() {
            return (self.self_loop(src), RouteKind::SelfLoop);
        }

        let src_kind = self.index.nodes[src].kind;
        let tgt_kind = self.index.nodes[tgt].kind;
        let is_split = src_kind.is_gateway() && self.index.out_degree(src) >= 2;

        if is_split
            && !is_main
            && let Some(points) = self.facing_elbow(src, tgt)
        {
            return (points, RouteKind::GatewayAlternate);
        }
        if !src_kind.is_gateway()
            && tgt_kind.is_gateway()
            && let Some(points) = self.facing_elbow(src, tgt)
        {
            return (points, RouteKind::GatewayReentry);
        }
        if !src_kind.is_gateway()
            && self.lane_of(src) != self.lane_of(tgt)
            && let Some(points) = self.cross_lane(src, tgt)
        {
            return (points, RouteKind::CrossLane);
        }
        if is_split
            && is_main
            && let Some(points) = self.gateway_main(src, tgt)
        {
            return (points, RouteKind::GatewayMain);
        }

        self.generic(src, tgt)
    }

    fn lane_of(&self, node: usize) -> usize {
        self.index.nodes[node].lane
    }

    fn lane_center(&self, node: usize) -> f32 {
        self.packing.lanes[self.lane_of(node)].center_y()
    }

    /// Loop leaving the right side and re-entering from above, or from below
    /// when the lane leaves no room above the node.
    fn self_loop(&self, node: usize) -> Vec<Point> {
        let b = self.boxes[node];
        let band = &self.packing.lanes[self.lane_of(node)];
        let pad = self.config.self_loop_offset;
        let room_above = b.y - band.top;
        let room_below = band.bottom() - b.bottom();
        let right_x = b.right() + pad;
        let cy = b.center_y();
        if room_above >= pad || room_above >= room_below {
            let top_y = b.y - pad;
            vec![
                b.right_mid(),
                (right_x, cy),
                (right_x, top_y),
                (b.center_x(), top_y),
                b.top_mid(),
            ]
        } else {
            let bottom_y = b.bottom() + pad;
            vec![
                b.right_mid(),
                (right_x, cy),
                (right_x, bottom_y),
                (b.center_x(), bottom_y),
                b.bottom_mid(),
            ]
        }
    }

    /// Vertical ports facing each other, joined by an elbow or an L-shape.
    fn facing_elbow(&self, src: usize, tgt: usize) -> Option<Vec<Point>> {
        let (a, b) = (self.boxes[src], self.boxes[tgt]);
        let dy = b.center_y() - a.center_y();
        if dy.abs() <= ALIGN_EPS {
            return None;
        }
        let down = dy > 0.0;
        let (start, end) = vertical_ports(&a, &b, down)?;
        let mid_y = self.elbow_mid_y(src, tgt, start.1, end.1, down);

        let candidates = [
            Some(vec![start, (start.0, mid_y), (end.0, mid_y), end]),
            vertical_first(&b, start),
            horizontal_first(&a, end),
        ];
        candidates
            .into_iter()
            .flatten()
            .map(|points| compress_path(&points))
            .find(|points| !self.collides(points, src, tgt))
    }

    fn elbow_mid_y(&self, src: usize, tgt: usize, sy: f32, ty: f32, down: bool) -> f32 {
        if self.lane_of(src) == self.lane_of(tgt) {
            let step = self.config.vertical_step();
            let mid = if down { sy + step } else { sy - step };
            if strictly_between(mid, sy, ty) {
                mid
            } else {
                (sy + ty) / 2.0
            }
        } else {
            self.lane_midline(src, tgt, sy, ty)
        }
    }

    /// Midpoint of the two lane centers, or of the anchors when that line
    /// does not lie between them.
    fn lane_midline(&self, src: usize, tgt: usize, sy: f32, ty: f32) -> f32 {
        let mid = (self.lane_center(src) + self.lane_center(tgt)) / 2.0;
        if strictly_between(mid, sy, ty) {
            mid
        } else {
            (sy + ty) / 2.0
        }
    }

    fn cross_lane(&self, src: usize, tgt: usize) -> Option<Vec<Point>> {
        let (a, b) = (self.boxes[src], self.boxes[tgt]);
        let down = self.lane_center(tgt) > self.lane_center(src);
        let (start, end) = vertical_ports(&a, &b, down)?;
        let mid_y = self.lane_midline(src, tgt, start.1, end.1);
        let points = compress_path(&[start, (start.0, mid_y), (end.0, mid_y), end]);
        (!self.collides(&points, src, tgt)).then_some(points)
    }

    fn gateway_main(&self, src: usize, tgt: usize) -> Option<Vec<Point>> {
        let (a, b) = (self.boxes[src], self.boxes[tgt]);
        let start = a.right_mid();
        if b.x < start.0 {
            return None;
        }
        let points = if (start.1 - b.center_y()).abs() <= ALIGN_EPS {
            vec![start, b.left_mid()]
        } else if start.1 < b.y || start.1 > b.bottom() {
            let end = if b.center_y() > start.1 {
                b.top_mid()
            } else {
                b.bottom_mid()
            };
            vec![start, (end.0, start.1), end]
        } else {
            let mid_x = (start.0 + b.x) / 2.0;
            let end = b.left_mid();
            vec![start, (mid_x, start.1), (mid_x, end.1), end]
        };
        let points = compress_path(&points);
        (!self.collides(&points, src, tgt)).then_some(points)
    }

    fn generic(&self, src: usize, tgt: usize) -> (Vec<Point>, RouteKind) {
        let (a, b) = (self.boxes[src], self.boxes[tgt]);
        let (src_lane_cy, tgt_lane_cy) = (self.lane_center(src), self.lane_center(tgt));
        let crosses_lanes = (src_lane_cy - tgt_lane_cy).abs() > ALIGN_EPS;

        let (start, end) = if crosses_lanes {
            let down = tgt_lane_cy > src_lane_cy;
            if down {
                (a.bottom_mid(), b.top_mid())
            } else {
                (a.top_mid(), b.bottom_mid())
            }
        } else if a.right() <= b.x {
            (a.right_mid(), b.left_mid())
        } else if b.right() <= a.x {
            (a.left_mid(), b.right_mid())
        } else {
            (a.right_mid(), b.left_mid())
        };

        let aligned =
            (start.1 - end.1).abs() <= ALIGN_EPS || (start.0 - end.0).abs() <= ALIGN_EPS;
        if aligned {
            let straight = vec![start, end];
            if !self.collides(&straight, src, tgt) {
                return (straight, RouteKind::Straight);
            }
        }

        let dir = if end.0 >= start.0 { 1.0 } else { -1.0 };
        let span = (end.0 - start.0).abs();
        let branching = self.index.out_degree(src) > 1 || self.index.in_degree(tgt) > 1;
        let base = self.config.detour_offset
            + if branching {
                self.config.branch_detour_extra
            } else {
                0.0
            };
        let mut offset = base.max(span / 2.0);
        if span > 0.0 && offset >= span {
            offset = span / 2.0;
        }

        let step = self.config.vertical_step();
        let mut shifts: Vec<(f32, f32)> = Vec::with_capacity(6);
        if crosses_lanes {
            let first = if tgt_lane_cy > src_lane_cy { step } else { -step };
            shifts.push((first, -first));
        }
        shifts.extend([(0.0, 0.0), (step, 0.0), (-step, 0.0), (0.0, step), (0.0, -step)]);
        // Channel runs clear of every node in the row, for flows that loop back.
        let tallest = self.boxes.iter().map(|b| b.height).fold(0.0, f32::max);
        let channel = step.max(tallest / 2.0 + self.config.collision_padding + 1.0);
        shifts.extend([(-channel, -channel), (channel, channel)]);

        for (start_shift, end_shift) in shifts {
            let points = build_path(start, end, dir, offset, start_shift, end_shift);
            if !self.collides(&points, src, tgt) {
                return (points, RouteKind::Detour);
            }
        }

        tracing::debug!(
            source = %self.index.nodes[src].node.id,
            target = %self.index.nodes[tgt].node.id,
            "no collision-free route, keeping the direct orthogonal path"
        );
        let points = if aligned {
            vec![start, end]
        } else {
            build_path(start, end, dir, offset, 0.0, 0.0)
        };
        (points, RouteKind::Fallback)
    }

    fn collides(&self, points: &[Point], src: usize, tgt: usize) -> bool {
        let pad = self.config.collision_padding;
        points.windows(2).any(|segment| {
            self.boxes.iter().enumerate().any(|(node, bounds)| {
                node != src
                    && node != tgt
                    && segment_intersects_rect(segment[0], segment[1], &bounds.padded(pad))
            })
        })
    }
}

fn vertical_ports(a: &Bounds, b: &Bounds, down: bool) -> Option<(Point, Point)> {
    let (start, end) = if down {
        (a.bottom_mid(), b.top_mid())
    } else {
        (a.top_mid(), b.bottom_mid())
    };
    let facing = if down { end.1 > start.1 } else { end.1 < start.1 };
    facing.then_some((start, end))
}

/// Leave vertically, enter the target from the side facing the source.
fn vertical_first(target: &Bounds, start: Point) -> Option<Vec<Point>> {
    let end = if start.0 <= target.x {
        target.left_mid()
    } else if start.0 >= target.right() {
        target.right_mid()
    } else {
        return None;
    };
    Some(vec![start, (start.0, end.1), end])
}

/// Leave from the side facing the target, enter it vertically.
fn horizontal_first(source: &Bounds, end: Point) -> Option<Vec<Point>> {
    let start = if end.0 >= source.right() {
        source.right_mid()
    } else if end.0 <= source.x {
        source.left_mid()
    } else {
        return None;
    };
    Some(vec![start, (end.0, start.1), end])
}

fn strictly_between(value: f32, a: f32, b: f32) -> bool {
    value > a.min(b) && value < a.max(b)
}

/// Horizontal run to `offset`, optionally stepping off the start and end
/// anchors vertically first. Every segment is axis-aligned.
fn build_path(
    start: Point,
    end: Point,
    dir: f32,
    offset: f32,
    start_shift: f32,
    end_shift: f32,
) -> Vec<Point> {
    let mut points = vec![start];
    let mut cursor = start;
    if start_shift != 0.0 {
        cursor.1 += start_shift;
        points.push(cursor);
    }
    let mid_x = cursor.0 + dir * offset;
    points.push((mid_x, cursor.1));
    let approach_y = end.1 + end_shift;
    points.push((mid_x, approach_y));
    points.push((end.0, approach_y));
    points.push(end);
    compress_path(&points)
}

/// Drops repeated points and interior points on a straight run.
pub(super) fn compress_path(points: &[Point]) -> Vec<Point> {
    let mut deduped: Vec<Point> = Vec::with_capacity(points.len());
    for &point in points {
        if deduped.last().is_some_and(|last| same_point(*last, point)) {
            continue;
        }
        deduped.push(point);
    }
    if deduped.len() <= 2 {
        return deduped;
    }

    let mut out: Vec<Point> = Vec::with_capacity(deduped.len());
    out.push(deduped[0]);
    for idx in 1..deduped.len() - 1 {
        let prev = out[out.len() - 1];
        let curr = deduped[idx];
        let next = deduped[idx + 1];
        let vertical_run =
            (curr.0 - prev.0).abs() <= POINT_EPS && (next.0 - curr.0).abs() <= POINT_EPS;
        let horizontal_run =
            (curr.1 - prev.1).abs() <= POINT_EPS && (next.1 - curr.1).abs() <= POINT_EPS;
        if vertical_run || horizontal_run {
            continue;
        }
        out.push(curr);
    }
    out.push(deduped[deduped.len() - 1]);
    out
}

fn same_point(a: Point, b: Point) -> bool {
    (a.0 - b.0).abs() <= POINT_EPS && (a.1 - b.1).abs() <= POINT_EPS
}

/// Strict interior test: a segment running along the padded border does not hit.
pub(super) fn segment_intersects_rect(a: Point, b: Point, rect: &Bounds) -> bool {
    let (min_x, max_x) = (a.0.min(b.0), a.0.max(b.0));
    let (min_y, max_y) = (a.1.min(b.1), a.1.max(b.1));
    if (a.1 - b.1).abs() <= POINT_EPS {
        return a.1 > rect.y && a.1 < rect.bottom() && max_x > rect.x && min_x < rect.right();
    }
    if (a.0 - b.0).abs() <= POINT_EPS {
        return a.0 > rect.x && a.0 < rect.right() && max_y > rect.y && min_y < rect.bottom();
    }
    max_x > rect.x && min_x < rect.right() && max_y > rect.y && min_y < rect.bottom()
}

/// Midpoint of the longest horizontal segment, else of the longest segment.
fn label_anchor(points: &[Point]) -> Option<Point> {
    if points.len() < 2 {
        return None;
    }
    let length = |seg: &[Point]| (seg[1].0 - seg[0].0).hypot(seg[1].1 - seg[0].1);
    let midpoint = |seg: &[Point]| ((seg[0].0 + seg[1].0) / 2.0, (seg[0].1 + seg[1].1) / 2.0);

    let mut best: Option<(&[Point], f32)> = None;
    for seg in points.windows(2) {
        if (seg[0].1 - seg[1].1).abs() > POINT_EPS {
            continue;
        }
        let len = length(seg);
        if len > POINT_EPS && best.map(|(_, l)| len > l).unwrap_or(true) {
            best = Some((seg, len));
        }
    }
    if best.is_none() {
        for seg in points.windows(2) {
            let len = length(seg);
            if best.map(|(_, l)| len > l).unwrap_or(true) {
                best = Some((seg, len));
            }
        }
    }
    best.map(|(seg, _)| midpoint(seg))
}

/// Number of direction changes along a path.
pub fn path_bend_count(points: &[Point]) -> usize {
    if points.len() < 3 {
        return 0;
    }
    points
        .windows(3)
        .filter(|w| {
            let (dx1, dy1) = (w[1].0 - w[0].0, w[1].1 - w[0].1);
            let (dx2, dy2) = (w[2].0 - w[1].0, w[2].1 - w[1].1);
            (dx1 * dy2 - dy1 * dx2).abs() > POINT_EPS
        })
        .count()
}
