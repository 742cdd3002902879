pub mod commands;
pub mod gantt;
pub mod handlers;
pub mod output;
