#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod metrics;
mod policies;
mod processor;
mod results;

#[cfg(test)]
mod tests;

pub use self::metrics::ProcessorMetrics;
pub use self::processor::{Processor, FIELD_MANAGER};
pub use self::results::{
    build_policy_report, convergence_action, report_name, Action, RESULT_FAIL, SOURCE_GRC,
    SOURCE_INSIGHTS,
};
