use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Configuration from `.taskline.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub router: RouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directories scanned for documents, relative to the root
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    /// Directory names skipped while walking
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            include: default_include(),
            exclude: default_exclude(),
        }
    }
}

fn default_include() -> Vec<String> {
    vec![".".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![".taskline".to_string(), ".git".to_string()]
}

/// Origin of the timeline's day axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Anchor {
    #[default]
    Today,
    Fixed(NaiveDate),
}

impl Anchor {
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            Anchor::Today => today,
            Anchor::Fixed(date) => date,
        }
    }
}

impl TryFrom<String> for Anchor {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("today") {
            return Ok(Anchor::Today);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Anchor::Fixed)
            .map_err(|_| format!("invalid anchor '{}': expected \"today\" or YYYY-MM-DD", s))
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> String {
        anchor.to_string()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Today => f.write_str("today"),
            Anchor::Fixed(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default)]
    pub anchor: Anchor,
    /// Index into the zoom-stop list
    #[serde(default = "default_zoom")]
    pub zoom: usize,
    #[serde(default = "default_min_horizon_months")]
    pub min_horizon_months: u32,
    #[serde(default = "default_row_height")]
    pub row_height: f64,
    #[serde(default = "default_bar_height")]
    pub bar_height: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        TimelineConfig {
            anchor: Anchor::Today,
            zoom: default_zoom(),
            min_horizon_months: default_min_horizon_months(),
            row_height: default_row_height(),
            bar_height: default_bar_height(),
        }
    }
}

fn default_zoom() -> usize {
    5
}

fn default_min_horizon_months() -> u32 {
    12
}

fn default_row_height() -> f64 {
    28.0
}

fn default_bar_height() -> f64 {
    18.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Horizontal stand-off from an anchor before the first turn
    #[serde(default = "default_standoff")]
    pub standoff: f64,
    /// Distance between corridor candidates
    #[serde(default = "default_corridor_step")]
    pub corridor_step: f64,
    /// How far left of its source a destination may sit before the edge is dropped
    #[serde(default = "default_back_edge_tolerance")]
    pub back_edge_tolerance: f64,
    /// Extra space kept around bars when testing a corridor
    #[serde(default = "default_clearance")]
    pub clearance: f64,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            standoff: default_standoff(),
            corridor_step: default_corridor_step(),
            back_edge_tolerance: default_back_edge_tolerance(),
            clearance: default_clearance(),
            max_candidates: default_max_candidates(),
        }
    }
}

fn default_standoff() -> f64 {
    8.0
}

fn default_corridor_step() -> f64 {
    4.0
}

fn default_back_edge_tolerance() -> f64 {
    4.0
}

fn default_clearance() -> f64 {
    2.0
}

fn default_max_candidates() -> usize {
    64
}
