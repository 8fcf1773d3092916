//! Output formatting.
//!
//! - [`csv`] - subnet plan as CSV
//! - [`terminal`] - field formatting and the colored graph summary

mod csv;
mod terminal;

pub use csv::{plan_print, plan_rows, PlanPrintRow};
pub use terminal::{format_field, graph_summary, print_graph_summary};
