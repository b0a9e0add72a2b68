//! Output module for run reports
//!
//! This module handles:
//! - Aggregating phase results into a run report
//! - Printing the report at the end of a command

mod report;

pub use report::{print_report, write_report, RunReport};
