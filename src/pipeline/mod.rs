//! Processing pipeline turning raw candidates into canonical figure records.

mod numbering;
mod process;

pub use numbering::{NumberingConfig, NumberingEngine, NumberingValidation};
pub use process::Pipeline;
