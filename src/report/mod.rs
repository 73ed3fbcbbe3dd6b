//! Report rendering.
//!
//! Presentation of a dashboard summary as Markdown or JSON.

pub mod generator;

pub use generator::{format_currency, generate_json_report, generate_markdown_report};
