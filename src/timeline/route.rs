//! Orthogonal dependency connectors between bars of the same document.
//!
//! Each connector is a fixed staircase: stand-off from the source anchor,
//! down (or up) into the gutter next to the source row, across to a
//! corridor, along the corridor to the destination row, and a final hop
//! into the destination anchor. The corridor is picked by a greedy search
//! that avoids running through other bars.

use serde::Serialize;
use tracing::debug;

use crate::model::config::RouterConfig;
use crate::model::task::{DependencyEdge, LinkType, TaskKey};

use super::layout::{Bar, TimelineLayout};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connector {
    pub source: TaskKey,
    pub destination: TaskKey,
    pub link: LinkType,
    pub points: Vec<Point>,
    /// x of the vertical run into the destination row
    pub corridor_x: f64,
    /// No clear corridor was found; the natural position was used
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteReport {
    pub drawn: usize,
    /// Destination anchor too far left of the source anchor
    pub suppressed: usize,
    /// Endpoints in different documents
    pub cross_document: usize,
    /// An endpoint has no bar in the layout
    pub unresolved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Routing {
    pub connectors: Vec<Connector>,
    pub report: RouteReport,
}

/// Which side of a bar a connector attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn x(self, bar: &Bar) -> f64 {
        match self {
            Side::Left => bar.x,
            Side::Right => bar.right(),
        }
    }

    /// Direction a connector leaves (or arrives from) this side
    fn outward(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

fn anchor_sides(link: LinkType) -> (Side, Side) {
    match link {
        LinkType::FinishStart => (Side::Right, Side::Left),
        LinkType::StartStart => (Side::Left, Side::Left),
        LinkType::FinishFinish => (Side::Right, Side::Right),
        LinkType::StartFinish => (Side::Left, Side::Right),
    }
}

struct Obstacle {
    key: TaskKey,
    bar: Bar,
}

fn obstacles(layout: &TimelineLayout) -> Vec<Obstacle> {
    layout
        .rows
        .iter()
        .filter_map(|row| match (&row.kind, &row.bar) {
            (super::layout::RowKind::Task { key, .. }, Some(bar)) => Some(Obstacle {
                key: key.clone(),
                bar: *bar,
            }),
            _ => None,
        })
        .collect()
}

/// True when a vertical run at `x` between `y0` and `y1` stays clear of every
/// bar except the edge's own endpoints
fn corridor_is_clear(
    x: f64,
    y0: f64,
    y1: f64,
    obstacles: &[Obstacle],
    edge: &DependencyEdge,
    clearance: f64,
) -> bool {
    let (top, bottom) = (y0.min(y1), y0.max(y1));
    obstacles
        .iter()
        .filter(|o| o.key != edge.source && o.key != edge.destination)
        .all(|o| {
            let b = &o.bar;
            let crosses_x = x >= b.x - clearance && x <= b.right() + clearance;
            let crosses_y = top <= b.y + b.height + clearance && bottom >= b.y - clearance;
            !(crosses_x && crosses_y)
        })
}

/// Scan corridor candidates from `natural` toward the source, staying on the
/// destination's approach side of `entry_x`. Returns the x and whether it
/// was a fallback.
#[allow(clippy::too_many_arguments)]
fn find_corridor(
    natural: f64,
    source_x: f64,
    entry_x: f64,
    dst_side: Side,
    y0: f64,
    y1: f64,
    obstacles: &[Obstacle],
    edge: &DependencyEdge,
    config: &RouterConfig,
) -> (f64, bool) {
    let allowed = |x: f64| match dst_side {
        Side::Left => x <= entry_x + f64::EPSILON,
        Side::Right => x >= entry_x - f64::EPSILON,
    };
    let mut direction = if source_x < natural {
        -1.0
    } else if source_x > natural {
        1.0
    } else {
        dst_side.outward()
    };
    let step = config.corridor_step.max(0.5);
    if !allowed(natural + direction * step) {
        direction = -direction;
    }

    for i in 0..config.max_candidates {
        let x = natural + direction * step * i as f64;
        if !allowed(x) {
            break;
        }
        if corridor_is_clear(x, y0, y1, obstacles, edge, config.clearance) {
            return (x, false);
        }
    }
    (natural, true)
}

fn push_point(points: &mut Vec<Point>, x: f64, y: f64) {
    let p = Point { x, y };
    if points.last() != Some(&p) {
        points.push(p);
    }
}

fn route_one(
    layout: &TimelineLayout,
    edge: &DependencyEdge,
    obstacles: &[Obstacle],
    config: &RouterConfig,
) -> Result<Connector, Skip> {
    if !edge.is_same_document() {
        return Err(Skip::CrossDocument);
    }
    let (Some(src_row), Some(dst_row)) = (
        layout.task_row(&edge.source),
        layout.task_row(&edge.destination),
    ) else {
        return Err(Skip::Unresolved);
    };
    let (Some(src), Some(dst)) = (src_row.bar, dst_row.bar) else {
        return Err(Skip::Unresolved);
    };

    let (src_side, dst_side) = anchor_sides(edge.link);
    let src_x = src_side.x(&src);
    let dst_x = dst_side.x(&dst);
    if dst_x < src_x - config.back_edge_tolerance {
        return Err(Skip::BackEdge);
    }

    let (src_y, dst_y) = (src.mid_y(), dst.mid_y());
    let exit_x = src_x + src_side.outward() * config.standoff;
    let entry_x = dst_x + dst_side.outward() * config.standoff;
    let gutter_y = if dst_row.index < src_row.index {
        src_row.index as f64 * layout.row_height
    } else {
        (src_row.index + 1) as f64 * layout.row_height
    };

    let midpoint = (exit_x + entry_x) / 2.0;
    let natural = match dst_side {
        Side::Left => midpoint.min(entry_x),
        Side::Right => midpoint.max(entry_x),
    };
    let (corridor_x, fallback) = find_corridor(
        natural, exit_x, entry_x, dst_side, gutter_y, dst_y, obstacles, edge, config,
    );

    let mut points = Vec::with_capacity(6);
    push_point(&mut points, src_x, src_y);
    push_point(&mut points, exit_x, src_y);
    push_point(&mut points, exit_x, gutter_y);
    push_point(&mut points, corridor_x, gutter_y);
    push_point(&mut points, corridor_x, dst_y);
    push_point(&mut points, dst_x, dst_y);

    Ok(Connector {
        source: edge.source.clone(),
        destination: edge.destination.clone(),
        link: edge.link,
        points,
        corridor_x,
        fallback,
    })
}

enum Skip {
    CrossDocument,
    Unresolved,
    BackEdge,
}

/// Route every edge, in the order given. Single pass: earlier connectors do
/// not constrain later ones.
pub fn route_edges<'a>(
    layout: &TimelineLayout,
    edges: impl IntoIterator<Item = &'a DependencyEdge>,
    config: &RouterConfig,
) -> Routing {
    let obstacles = obstacles(layout);
    let mut routing = Routing::default();
    for edge in edges {
        match route_one(layout, edge, &obstacles, config) {
            Ok(connector) => {
                routing.report.drawn += 1;
                routing.connectors.push(connector);
            }
            Err(Skip::CrossDocument) => routing.report.cross_document += 1,
            Err(Skip::Unresolved) => routing.report.unresolved += 1,
            Err(Skip::BackEdge) => {
                debug!(source = %edge.source, destination = %edge.destination, "back edge suppressed");
                routing.report.suppressed += 1;
            }
        }
    }
    routing
}
