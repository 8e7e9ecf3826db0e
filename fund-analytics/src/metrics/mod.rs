pub mod calculator;
pub mod irr;
pub mod service;

pub use calculator::{
    breakdown, compute_dpi, compute_irr, compute_irr_with_residual, compute_pic,
    compute_snapshot, total_distributions, IrrComputation, PaidInCapital, ResidualValue,
};
pub use irr::{xirr, CashFlow};
pub use service::FundMetricsService;
