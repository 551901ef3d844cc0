//! Output generation for the rendered widget.

pub mod generator;

pub use generator::{generate_json_report, generate_queries_json, generate_text_report, write_output};
