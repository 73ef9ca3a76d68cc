pub mod config;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod manager;
pub mod math;
pub mod types;

pub use config::FeeManagerConfig;
pub use error::FeeError;
pub use fees::performance::{add_fund_settings, eligible_on_hook, settle};
pub use fees::{Fee, FeeSettlement, ManagementFee, PerformanceFee};
pub use ledger::{GavOracle, InMemoryLedger, Mint, SharesLedger};
pub use manager::{FeeManager, FundFees, FundSettings};
pub use types::*;
