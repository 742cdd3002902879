pub mod depends;
pub mod document;
pub mod frontmatter;
pub mod milestone_parser;
pub mod task_parser;

pub use depends::{DependencyRef, parse_depends};
pub use document::{ParsedDocument, parse_document};
pub use frontmatter::{FrontMatter, parse_front_matter};
pub use milestone_parser::{MilestoneRow, parse_milestones};
pub use task_parser::{PropertyToken, TaskLine, normalize_key, parse_iso_date, parse_task_line};
