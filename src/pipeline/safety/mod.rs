pub mod keywords;
pub mod types;

pub use keywords::scan_diagnostic_language;
pub use types::{LeakCategory, LeakFinding};
