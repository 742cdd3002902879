//! Date-to-geometry layout, drag gestures and dependency routing.
//!
//! Nothing in here writes documents: gestures end in `RescheduleIntent`s
//! that the mutation gateway applies.

pub mod drag;
pub mod filter;
pub mod heatmap;
pub mod layout;
pub mod route;
pub mod zoom;

pub use drag::{DragController, DragHandle, DragTarget, hit_test};
pub use filter::{ViewFilter, visible_tasks};
pub use heatmap::{HeatCell, heat_map};
pub use layout::{Bar, MilestoneMarker, RowKind, TimelineLayout, TimelineParams, TimelineRow, layout};
pub use route::{Connector, Point, RouteReport, Routing, route_edges};
pub use zoom::{FrameGate, ZOOM_STOPS, Zoom, ZoomDrag};
