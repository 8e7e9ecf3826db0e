use chrono::NaiveDate;
use fund_core::IrrOutcome;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

pub const TOLERANCE: f64 = 1e-6;
pub const MAX_ITERATIONS: u32 = 1000;

const INITIAL_GUESS: f64 = 0.1;
const LOWER_BOUND: f64 = -0.9999;
const UPPER_BOUND_LIMIT: f64 = 1.0e6;

/// One dated LP cash flow (negative = paid in, positive = received)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Decimal,
}

impl CashFlow {
    pub fn new(date: NaiveDate, amount: Decimal) -> Self {
        Self { date, amount }
    }
}

/// Dated flows as (years since first flow, amount)
struct Schedule {
    points: Vec<(f64, f64)>,
}

impl Schedule {
    fn new(flows: &[CashFlow]) -> Option<Self> {
        let first = flows.first()?.date;
        let points = flows
            .iter()
            .map(|flow| {
                let years = (flow.date - first).num_days() as f64 / 365.0;
                flow.amount.to_f64().map(|amount| (years, amount))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { points })
    }

    fn npv(&self, rate: f64) -> f64 {
        self.points
            .iter()
            .map(|(t, amount)| amount / (1.0 + rate).powf(*t))
            .sum()
    }

    fn npv_derivative(&self, rate: f64) -> f64 {
        self.points
            .iter()
            .map(|(t, amount)| -t * amount / (1.0 + rate).powf(t + 1.0))
            .sum()
    }
}

/// Annualized internal rate of return over irregularly spaced cash flows.
///
/// Flows are sorted by date; year fractions are actual/365 from the first flow. Newton's
/// method runs first; if it leaves the domain or stalls, bisection takes over on a bracket
/// with a sign change. Both share the iteration budget.
pub fn xirr(flows: &[CashFlow]) -> IrrOutcome {
    if flows.len() < 2 {
        return IrrOutcome::not_converged(format!(
            "need at least two dated cash flows, got {}",
            flows.len()
        ));
    }

    let has_outflow = flows.iter().any(|f| f.amount < Decimal::ZERO);
    let has_inflow = flows.iter().any(|f| f.amount > Decimal::ZERO);
    if !(has_outflow && has_inflow) {
        return IrrOutcome::not_converged("cash flows never change sign");
    }

    let mut sorted = flows.to_vec();
    sorted.sort_by_key(|f| f.date);

    let schedule = match Schedule::new(&sorted) {
        Some(schedule) => schedule,
        None => return IrrOutcome::not_converged("cash flow amount out of range"),
    };

    let (newton, used) = newton(&schedule);
    if let Some(rate) = newton {
        return converged(rate, used);
    }

    tracing::debug!("Newton iteration did not settle after {} steps, bisecting", used);

    match bisect(&schedule, MAX_ITERATIONS.saturating_sub(used)) {
        Ok((rate, steps)) => converged(rate, used + steps),
        Err(reason) => IrrOutcome::not_converged(reason),
    }
}

fn converged(rate: f64, iterations: u32) -> IrrOutcome {
    match Decimal::from_f64(rate) {
        Some(rate) => IrrOutcome::Converged {
            rate: rate.round_dp(8),
            iterations,
        },
        None => IrrOutcome::not_converged("rate is not a finite number"),
    }
}

/// Returns the root (if found) and the iterations spent
fn newton(schedule: &Schedule) -> (Option<f64>, u32) {
    let mut rate = INITIAL_GUESS;

    for iteration in 1..=MAX_ITERATIONS {
        let value = schedule.npv(rate);
        let slope = schedule.npv_derivative(rate);
        if slope == 0.0 || !slope.is_finite() || !value.is_finite() {
            return (None, iteration);
        }

        let next = rate - value / slope;
        if !next.is_finite() || next <= -1.0 {
            return (None, iteration);
        }

        if (next - rate).abs() < TOLERANCE {
            return (Some(next), iteration);
        }
        rate = next;
    }

    (None, MAX_ITERATIONS)
}

fn bisect(schedule: &Schedule, budget: u32) -> Result<(f64, u32), String> {
    let mut low = LOWER_BOUND;
    let mut high = 1.0;
    let low_value = schedule.npv(low);

    while schedule.npv(high).signum() == low_value.signum() {
        high *= 2.0;
        if high > UPPER_BOUND_LIMIT {
            return Err("no rate between -99.99% and 1e8% zeroes the NPV".to_string());
        }
    }

    let mut low_positive = low_value > 0.0;
    for step in 1..=budget {
        let mid = (low + high) / 2.0;
        let value = schedule.npv(mid);

        if value.abs() < TOLERANCE || (high - low) / 2.0 < TOLERANCE {
            return Ok((mid, step));
        }

        if (value > 0.0) == low_positive {
            low = mid;
            low_positive = value > 0.0;
        } else {
            high = mid;
        }
    }

    Err(format!(
        "did not converge within {} iterations",
        MAX_ITERATIONS
    ))
}
