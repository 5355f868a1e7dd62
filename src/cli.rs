//! CLI domain: parse, route, output and presentation only.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, ListFormat};
pub use presentation::{format_overlay_table, format_render_list};
pub use route::RunContext;
