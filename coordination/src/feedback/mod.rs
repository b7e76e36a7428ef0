//! Feedback from failed verification back into generation.

pub mod failure_report;

pub use failure_report::{
    parse_failing_routes, parse_line_numbers, suggest_declaration, FailingRoute, FailureReport,
};
