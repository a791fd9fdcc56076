// Risk management module
pub mod profit_sweep;
pub mod sizer;

pub use profit_sweep::{ProfitSweep, SweepPlan};
pub use sizer::{PositionSizer, SizerConfig, SizingDecision};
