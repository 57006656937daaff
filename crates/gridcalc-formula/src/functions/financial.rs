//! Financial functions
//!
//! Cash paid out is negative, cash received positive. `end_or_beginning`
//! is 0 when payments fall at the end of each period and 1 at the start.

use chrono::{Datelike, NaiveDate};

use super::{FunctionDef, FunctionRegistry};
use crate::args::{
    Arg, ArgDef,
    ArgType::{Date, Number, RangeNumber},
    FunctionOutput, Order, ReturnFormat,
};
use crate::dates::{add_months, date_to_serial, last_day_of_month};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;
use crate::kernels::newton_method;
use crate::reduce::{collect_numbers, visit_numbers};

/// Step of the central difference used as a derivative
const STEP: f64 = 1e-7;

pub(super) fn register(registry: &mut FunctionRegistry) {
    use ReturnFormat::Fixed;
    let currency = || Fixed("#,##0.00".to_string());

    registry.add(
        "FV",
        FunctionDef::new(
            "Future value of an annuity investment.",
            vec![
                ArgDef::new("rate", &[Number]),
                ArgDef::new("number_of_periods", &[Number]),
                ArgDef::new("payment_amount", &[Number]),
                ArgDef::new("present_value", &[Number]).default_value(0.0),
                ArgDef::new("end_or_beginning", &[Number]).default_value(0.0),
            ],
            fn_fv,
        )
        .format(currency()),
    );
    registry.add(
        "PV",
        FunctionDef::new(
            "Present value of an annuity investment.",
            vec![
                ArgDef::new("rate", &[Number]),
                ArgDef::new("number_of_periods", &[Number]),
                ArgDef::new("payment_amount", &[Number]),
                ArgDef::new("future_value", &[Number]).default_value(0.0),
                ArgDef::new("end_or_beginning", &[Number]).default_value(0.0),
            ],
            fn_pv,
        )
        .format(currency()),
    );
    registry.add(
        "PMT",
        FunctionDef::new(
            "Periodic payment for an annuity investment.",
            vec![
                ArgDef::new("rate", &[Number]),
                ArgDef::new("number_of_periods", &[Number]),
                ArgDef::new("present_value", &[Number]),
                ArgDef::new("future_value", &[Number]).default_value(0.0),
                ArgDef::new("end_or_beginning", &[Number]).default_value(0.0),
            ],
            fn_pmt,
        )
        .format(currency()),
    );
    registry.add(
        "NPER",
        FunctionDef::new(
            "Number of payment periods for an investment.",
            vec![
                ArgDef::new("rate", &[Number]),
                ArgDef::new("payment_amount", &[Number]),
                ArgDef::new("present_value", &[Number]),
                ArgDef::new("future_value", &[Number]).default_value(0.0),
                ArgDef::new("end_or_beginning", &[Number]).default_value(0.0),
            ],
            fn_nper,
        ),
    );
    let period_payment = || {
        vec![
            ArgDef::new("rate", &[Number]),
            ArgDef::new("period", &[Number]),
            ArgDef::new("number_of_periods", &[Number]),
            ArgDef::new("present_value", &[Number]),
            ArgDef::new("future_value", &[Number]).default_value(0.0),
            ArgDef::new("end_or_beginning", &[Number]).default_value(0.0),
        ]
    };
    registry.add(
        "IPMT",
        FunctionDef::new(
            "Payment on interest for an investment.",
            period_payment(),
            fn_ipmt,
        )
        .format(currency()),
    );
    registry.add(
        "PPMT",
        FunctionDef::new(
            "Payment on the principal of an investment.",
            period_payment(),
            fn_ppmt,
        )
        .format(currency()),
    );
    registry.add(
        "RATE",
        FunctionDef::new(
            "Interest rate of an annuity investment.",
            vec![
                ArgDef::new("number_of_periods", &[Number]),
                ArgDef::new("payment_per_period", &[Number]),
                ArgDef::new("present_value", &[Number]),
                ArgDef::new("future_value", &[Number]).default_value(0.0),
                ArgDef::new("end_or_beginning", &[Number]).default_value(0.0),
                ArgDef::new("rate_guess", &[Number]).default_value(0.1),
            ],
            fn_rate,
        )
        .format(Fixed("0%".to_string())),
    );
    registry.add(
        "NPV",
        FunctionDef::new(
            "The net present value of an investment based on a series of periodic cash flows and a discount rate.",
            vec![
                ArgDef::new("discount", &[Number]),
                ArgDef::new("cashflow1", &[Number, RangeNumber]),
                ArgDef::new("cashflow2", &[Number, RangeNumber]).repeating(),
            ],
            fn_npv,
        )
        .format(currency()),
    );
    registry.add(
        "IRR",
        FunctionDef::new(
            "Internal rate of return given periodic cashflows.",
            vec![
                ArgDef::new("cashflow_amounts", &[RangeNumber]),
                ArgDef::new("rate_guess", &[Number]).default_value(0.1),
            ],
            fn_irr,
        )
        .format(Fixed("0%".to_string())),
    );
    registry.add(
        "SLN",
        FunctionDef::new(
            "Depreciation of an asset using the straight-line method.",
            vec![
                ArgDef::new("cost", &[Number]),
                ArgDef::new("salvage", &[Number]),
                ArgDef::new("life", &[Number]),
            ],
            fn_sln,
        )
        .format(currency()),
    );

    registry.add(
        "PRICE",
        FunctionDef::new(
            "Price of a security paying periodic interest.",
            vec![
                ArgDef::new("settlement", &[Date]),
                ArgDef::new("maturity", &[Date]),
                ArgDef::new("rate", &[Number]),
                ArgDef::new("yield", &[Number]),
                ArgDef::new("redemption", &[Number]),
                ArgDef::new("frequency", &[Number]),
                ArgDef::new("day_count_convention", &[Number]).default_value(0.0),
            ],
            fn_price,
        ),
    );
    registry.add(
        "YIELD",
        FunctionDef::new(
            "Annual yield of a security paying periodic interest.",
            vec![
                ArgDef::new("settlement", &[Date]),
                ArgDef::new("maturity", &[Date]),
                ArgDef::new("rate", &[Number]),
                ArgDef::new("price", &[Number]),
                ArgDef::new("redemption", &[Number]),
                ArgDef::new("frequency", &[Number]),
                ArgDef::new("day_count_convention", &[Number]).default_value(0.0),
            ],
            fn_yield,
        ),
    );

    let coupon_args = || {
        vec![
            ArgDef::new("settlement", &[Date]),
            ArgDef::new("maturity", &[Date]),
            ArgDef::new("frequency", &[Number]),
            ArgDef::new("day_count_convention", &[Number]).default_value(0.0),
        ]
    };
    registry.add(
        "COUPDAYS",
        FunctionDef::new(
            "Days in coupon period containing settlement date.",
            coupon_args(),
            fn_coupdays,
        ),
    );
    registry.add(
        "COUPNCD",
        FunctionDef::new("Next coupon date after the settlement date.", coupon_args(), fn_coupncd),
    );
    registry.add(
        "COUPNUM",
        FunctionDef::new(
            "Number of coupons payable between settlement and maturity.",
            coupon_args(),
            fn_coupnum,
        ),
    );
    registry.add(
        "COUPPCD",
        FunctionDef::new("Last coupon date prior to or on the settlement date.", coupon_args(), fn_couppcd),
    );
    registry.add(
        "YEARFRAC",
        FunctionDef::new(
            "Exact number of years between two dates.",
            vec![
                ArgDef::new("start_date", &[Date]),
                ArgDef::new("end_date", &[Date]),
                ArgDef::new("day_count_convention", &[Number]).default_value(0.0),
            ],
            fn_yearfrac,
        ),
    );
}

fn payment_timing(arg: &Arg, ctx: &CallContext) -> FormulaResult<f64> {
    Ok(if ctx.boolean(arg)? { 1.0 } else { 0.0 })
}

/// Balance left after `n` periods: zero when the annuity terms agree
fn annuity_balance(rate: f64, n: f64, payment: f64, present: f64, future: f64, timing: f64) -> f64 {
    if rate == 0.0 {
        return present + payment * n + future;
    }
    let growth = (1.0 + rate).powf(n);
    present * growth + payment * (1.0 + rate * timing) * (growth - 1.0) / rate + future
}

fn future_value(rate: f64, n: f64, payment: f64, present: f64, timing: f64) -> f64 {
    -annuity_balance(rate, n, payment, present, 0.0, timing)
}

fn payment(rate: f64, n: f64, present: f64, future: f64, timing: f64) -> FormulaResult<f64> {
    if n == 0.0 {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects number_of_periods to be different from 0.",
        ));
    }
    if rate == 0.0 {
        return Ok(-(present + future) / n);
    }
    let growth = (1.0 + rate).powf(n);
    Ok(-(rate * (future + present * growth)) / ((1.0 + rate * timing) * (growth - 1.0)))
}

fn interest_payment(
    rate: f64,
    period: f64,
    n: f64,
    present: f64,
    future: f64,
    timing: f64,
) -> FormulaResult<f64> {
    if period < 1.0 || period > n {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects period to be between 1 and number_of_periods.",
        ));
    }
    let pmt = payment(rate, n, present, future, timing)?;
    let interest = if period == 1.0 {
        if timing == 1.0 {
            0.0
        } else {
            -present
        }
    } else if timing == 1.0 {
        future_value(rate, period - 2.0, pmt, present, 1.0) - pmt
    } else {
        future_value(rate, period - 1.0, pmt, present, 0.0)
    };
    Ok(interest * rate)
}

/// FV function
pub fn fn_fv(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let rate = ctx.number(&args[0])?;
    let n = ctx.number(&args[1])?;
    let pmt = ctx.number(&args[2])?;
    let present = ctx.number(&args[3])?;
    let timing = payment_timing(&args[4], ctx)?;
    Ok(future_value(rate, n, pmt, present, timing).into())
}

/// PV function
pub fn fn_pv(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let rate = ctx.number(&args[0])?;
    let n = ctx.number(&args[1])?;
    let pmt = ctx.number(&args[2])?;
    let future = ctx.number(&args[3])?;
    let timing = payment_timing(&args[4], ctx)?;
    let value = if rate == 0.0 {
        -(future + pmt * n)
    } else {
        let growth = (1.0 + rate).powf(n);
        -(future + pmt * (1.0 + rate * timing) * (growth - 1.0) / rate) / growth
    };
    Ok(value.into())
}

/// PMT function
pub fn fn_pmt(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let rate = ctx.number(&args[0])?;
    let n = ctx.number(&args[1])?;
    let present = ctx.number(&args[2])?;
    let future = ctx.number(&args[3])?;
    let timing = payment_timing(&args[4], ctx)?;
    Ok(payment(rate, n, present, future, timing)?.into())
}

/// NPER function
pub fn fn_nper(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let rate = ctx.number(&args[0])?;
    let pmt = ctx.number(&args[1])?;
    let present = ctx.number(&args[2])?;
    let future = ctx.number(&args[3])?;
    let timing = payment_timing(&args[4], ctx)?;

    if rate == 0.0 {
        if pmt == 0.0 {
            return Err(FormulaError::evaluation(
                "Function [[FUNCTION_NAME]] expects payment_amount to be different from 0 when rate is 0.",
            ));
        }
        return Ok((-(present + future) / pmt).into());
    }
    let annuity = pmt * (1.0 + rate * timing) / rate;
    let n = ((annuity - future) / (present + annuity)).ln() / (1.0 + rate).ln();
    if !n.is_finite() {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] didn't find any result.",
        ));
    }
    Ok(n.into())
}

fn period_args(args: &[Arg], ctx: &CallContext) -> FormulaResult<(f64, f64, f64, f64, f64, f64)> {
    Ok((
        ctx.number(&args[0])?,
        ctx.number(&args[1])?,
        ctx.number(&args[2])?,
        ctx.number(&args[3])?,
        ctx.number(&args[4])?,
        payment_timing(&args[5], ctx)?,
    ))
}

/// IPMT function
pub fn fn_ipmt(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (rate, period, n, present, future, timing) = period_args(args, ctx)?;
    Ok(interest_payment(rate, period, n, present, future, timing)?.into())
}

/// PPMT function
pub fn fn_ppmt(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (rate, period, n, present, future, timing) = period_args(args, ctx)?;
    let interest = interest_payment(rate, period, n, present, future, timing)?;
    Ok((payment(rate, n, present, future, timing)? - interest).into())
}

/// RATE function
///
/// The payment, present and future values must not all share a sign;
/// otherwise no rate balances the annuity and Newton's method is not run.
pub fn fn_rate(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let n = ctx.number(&args[0])?;
    let pmt = ctx.number(&args[1])?;
    let present = ctx.number(&args[2])?;
    let future = ctx.number(&args[3])?;
    let timing = payment_timing(&args[4], ctx)?;
    let guess = ctx.number(&args[5])?;

    if n <= 0.0 {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects number_of_periods to be greater than 0.",
        ));
    }
    let amounts = [pmt, present, future];
    let positive = amounts.iter().any(|v| *v > 0.0);
    let negative = amounts.iter().any(|v| *v < 0.0);
    if !(positive && negative) {
        return Err(FormulaError::evaluation(
            "There must be both positive and negative values in [payment_amount, present_value, future_value].",
        ));
    }

    let f = |rate: f64| annuity_balance(rate, n, pmt, present, future, timing);
    let df = |rate: f64| (f(rate + STEP) - f(rate - STEP)) / (2.0 * STEP);
    let rate = newton_method(&f, df, guess, 50, 1e-10, |previous| {
        previous.map_or(0.01, |p| p / 2.0)
    })?;
    Ok(rate.into())
}

/// NPV function
pub fn fn_npv(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let rate = ctx.number(&args[0])?;
    if rate == -1.0 {
        return Err(FormulaError::div_zero(
            "Function [[FUNCTION_NAME]] expects discount to be different from -1.",
        ));
    }
    let mut value = 0.0;
    let mut factor = 1.0;
    visit_numbers(&args[1..], ctx.locale(), Order::ColumnMajor, |flow| {
        factor *= 1.0 + rate;
        value += flow / factor;
        Ok(())
    })?;
    Ok(value.into())
}

/// IRR function
///
/// Solved for `x = 1 + rate` from `rate_guess + 1`.
pub fn fn_irr(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let flows = collect_numbers(&args[..1], ctx.locale())?;
    let guess = ctx.number(&args[1])?;
    if !(flows.iter().any(|v| *v > 0.0) && flows.iter().any(|v| *v < 0.0)) {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects cashflow_amounts to contain at least one positive and one negative value.",
        ));
    }

    let f = |x: f64| {
        flows
            .iter()
            .enumerate()
            .map(|(i, v)| v / x.powi(i as i32))
            .sum::<f64>()
    };
    let df = |x: f64| {
        flows
            .iter()
            .enumerate()
            .map(|(i, v)| -(i as f64) * v / x.powi(i as i32 + 1))
            .sum::<f64>()
    };
    let start = guess + 1.0;
    let x = newton_method(f, df, start, 20, 1e-5, |previous| {
        previous.map_or(start / 2.0, |p| p / 2.0)
    })?;
    Ok((x - 1.0).into())
}

/// SLN function
pub fn fn_sln(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let cost = ctx.number(&args[0])?;
    let salvage = ctx.number(&args[1])?;
    let life = ctx.number(&args[2])?;
    if life == 0.0 {
        return Err(FormulaError::div_zero(
            "Function [[FUNCTION_NAME]] expects life to be different from 0.",
        ));
    }
    Ok(((cost - salvage) / life).into())
}

/// Day count conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Basis {
    /// US (NASD) 30/360
    Us30360,
    ActualActual,
    Actual360,
    Actual365,
    /// European 30/360
    European30360,
}

impl Basis {
    fn from_arg(arg: &Arg, ctx: &CallContext) -> FormulaResult<Self> {
        Ok(match ctx.integer(arg)? {
            0 => Basis::Us30360,
            1 => Basis::ActualActual,
            2 => Basis::Actual360,
            3 => Basis::Actual365,
            4 => Basis::European30360,
            _ => {
                return Err(FormulaError::evaluation(
                    "Function [[FUNCTION_NAME]] expects day_count_convention to be between 0 and 4.",
                ))
            }
        })
    }

    fn is_30_360(self) -> bool {
        matches!(self, Basis::Us30360 | Basis::European30360)
    }

    /// Days from `start` to `end` under this convention
    fn days(self, start: NaiveDate, end: NaiveDate) -> f64 {
        match self {
            Basis::Us30360 => days_360(start, end, false),
            Basis::European30360 => days_360(start, end, true),
            _ => (end - start).num_days() as f64,
        }
    }
}

fn is_month_end(date: NaiveDate) -> bool {
    last_day_of_month(date.year(), date.month()) == Some(date.day())
}

fn is_last_day_of_february(date: NaiveDate) -> bool {
    date.month() == 2 && is_month_end(date)
}

fn days_360(start: NaiveDate, end: NaiveDate, european: bool) -> f64 {
    let (mut d1, mut d2) = (start.day() as i64, end.day() as i64);
    if european {
        d1 = d1.min(30);
        d2 = d2.min(30);
    } else {
        if is_last_day_of_february(start) && is_last_day_of_february(end) {
            d2 = 30;
        }
        if is_last_day_of_february(start) {
            d1 = 30;
        }
        if d2 == 31 && d1 >= 30 {
            d2 = 30;
        }
        if d1 == 31 {
            d1 = 30;
        }
    }
    let years = (end.year() - start.year()) as i64;
    let months = end.month() as i64 - start.month() as i64;
    (years * 360 + months * 30 + d2 - d1) as f64
}

fn days_in_year(year: i32) -> f64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366.0
    } else {
        365.0
    }
}

fn year_fraction(start: NaiveDate, end: NaiveDate, basis: Basis) -> f64 {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let days = (end - start).num_days() as f64;
    match basis {
        Basis::Us30360 | Basis::European30360 => basis.days(start, end) / 360.0,
        Basis::Actual360 => days / 360.0,
        Basis::Actual365 => days / 365.0,
        Basis::ActualActual => {
            if start.year() == end.year() {
                return days / days_in_year(start.year());
            }
            if add_months(start, 12).map_or(false, |limit| end <= limit) {
                let feb29 = |year: i32| NaiveDate::from_ymd_opt(year, 2, 29);
                let crosses_leap_day = feb29(start.year()).map_or(false, |d| start <= d)
                    || feb29(end.year()).map_or(false, |d| end >= d);
                return days / if crosses_leap_day { 366.0 } else { 365.0 };
            }
            let years = (start.year()..=end.year()).map(days_in_year).sum::<f64>();
            let average = years / (end.year() - start.year() + 1) as f64;
            days / average
        }
    }
}

/// Coupon dates around a settlement date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CouponPeriod {
    previous: NaiveDate,
    next: NaiveDate,
    /// Coupons payable after settlement, maturity included
    remaining: i32,
}

fn out_of_range() -> FormulaError {
    FormulaError::evaluation("Function [[FUNCTION_NAME]] computed a date out of range.")
}

/// The coupon date `periods` periods before maturity
///
/// Coupons of a bond maturing on a month's last day fall on month ends.
fn coupon_date(maturity: NaiveDate, periods: i32, frequency: i32) -> FormulaResult<NaiveDate> {
    let date = add_months(maturity, -periods * (12 / frequency)).ok_or_else(out_of_range)?;
    if !is_month_end(maturity) {
        return Ok(date);
    }
    let last = last_day_of_month(date.year(), date.month()).ok_or_else(out_of_range)?;
    date.with_day(last).ok_or_else(out_of_range)
}

fn coupon_period(settlement: NaiveDate, maturity: NaiveDate, frequency: i32) -> FormulaResult<CouponPeriod> {
    if settlement >= maturity {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects settlement to be before maturity.",
        ));
    }
    let mut periods = 1;
    let mut previous = coupon_date(maturity, periods, frequency)?;
    while previous > settlement {
        periods += 1;
        previous = coupon_date(maturity, periods, frequency)?;
    }
    Ok(CouponPeriod {
        previous,
        next: coupon_date(maturity, periods - 1, frequency)?,
        remaining: periods,
    })
}

/// Length in days of the coupon period containing settlement
fn coupon_days(period: &CouponPeriod, frequency: i32, basis: Basis) -> f64 {
    match basis {
        Basis::ActualActual => (period.next - period.previous).num_days() as f64,
        Basis::Actual365 => 365.0 / frequency as f64,
        _ => 360.0 / frequency as f64,
    }
}

fn frequency(arg: &Arg, ctx: &CallContext) -> FormulaResult<i32> {
    match ctx.integer(arg)? {
        f @ (1 | 2 | 4) => Ok(f as i32),
        _ => Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects frequency to be 1, 2 or 4.",
        )),
    }
}

fn date_arg(arg: &Arg, ctx: &CallContext) -> FormulaResult<NaiveDate> {
    Ok(ctx.date(arg)?.date())
}

struct CouponTerms {
    settlement: NaiveDate,
    period: CouponPeriod,
    frequency: i32,
    basis: Basis,
}

fn coupon_terms(
    args: &[Arg],
    ctx: &CallContext,
    frequency_at: usize,
) -> FormulaResult<CouponTerms> {
    let settlement = date_arg(&args[0], ctx)?;
    let maturity = date_arg(&args[1], ctx)?;
    let frequency = frequency(&args[frequency_at], ctx)?;
    let basis = Basis::from_arg(&args[frequency_at + 1], ctx)?;
    Ok(CouponTerms {
        settlement,
        period: coupon_period(settlement, maturity, frequency)?,
        frequency,
        basis,
    })
}

/// COUPDAYS function
pub fn fn_coupdays(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let terms = coupon_terms(args, ctx, 2)?;
    Ok(coupon_days(&terms.period, terms.frequency, terms.basis).into())
}

/// COUPNCD function
pub fn fn_coupncd(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let terms = coupon_terms(args, ctx, 2)?;
    Ok(FunctionOutput::formatted(
        date_to_serial(terms.period.next),
        ctx.locale().date_format.clone(),
    ))
}

/// COUPNUM function
pub fn fn_coupnum(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let terms = coupon_terms(args, ctx, 2)?;
    Ok((terms.period.remaining as f64).into())
}

/// COUPPCD function
pub fn fn_couppcd(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let terms = coupon_terms(args, ctx, 2)?;
    Ok(FunctionOutput::formatted(
        date_to_serial(terms.period.previous),
        ctx.locale().date_format.clone(),
    ))
}

/// Price per 100 face value of a bond for a yield
fn bond_price(terms: &CouponTerms, rate: f64, yld: f64, redemption: f64) -> f64 {
    let frequency = terms.frequency as f64;
    let period_days = coupon_days(&terms.period, terms.frequency, terms.basis);
    let accrued = terms.basis.days(terms.period.previous, terms.settlement);
    let to_next = if terms.basis.is_30_360() {
        period_days - accrued
    } else {
        (terms.period.next - terms.settlement).num_days() as f64
    };
    let coupon = 100.0 * rate / frequency;
    let fraction = to_next / period_days;
    let remaining = terms.period.remaining;

    if remaining == 1 {
        return (coupon + redemption) / (yld / frequency * fraction + 1.0)
            - coupon * accrued / period_days;
    }
    let discount = 1.0 + yld / frequency;
    let coupons: f64 = (1..=remaining)
        .map(|k| coupon / discount.powf(k as f64 - 1.0 + fraction))
        .sum();
    redemption / discount.powf(remaining as f64 - 1.0 + fraction) + coupons
        - coupon * accrued / period_days
}

fn bond_terms(args: &[Arg], ctx: &CallContext) -> FormulaResult<(CouponTerms, f64, f64, f64)> {
    let terms = coupon_terms(args, ctx, 5)?;
    let rate = ctx.number(&args[2])?;
    let quote = ctx.number(&args[3])?;
    let redemption = ctx.number(&args[4])?;
    if rate < 0.0 {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects rate to be positive or zero.",
        ));
    }
    if redemption <= 0.0 {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects redemption to be strictly positive.",
        ));
    }
    Ok((terms, rate, quote, redemption))
}

/// PRICE function
pub fn fn_price(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (terms, rate, yld, redemption) = bond_terms(args, ctx)?;
    if yld < 0.0 {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects yield to be positive or zero.",
        ));
    }
    Ok(bond_price(&terms, rate, yld, redemption).into())
}

/// YIELD function
///
/// Closed form with one coupon left, Newton's method on the price
/// otherwise.
pub fn fn_yield(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (terms, rate, price, redemption) = bond_terms(args, ctx)?;
    if price <= 0.0 {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects price to be strictly positive.",
        ));
    }

    let frequency = terms.frequency as f64;
    if terms.period.remaining == 1 {
        let period_days = coupon_days(&terms.period, terms.frequency, terms.basis);
        let accrued = terms.basis.days(terms.period.previous, terms.settlement);
        let to_redemption = period_days - accrued;
        let paid = price / 100.0 + accrued / period_days * rate / frequency;
        let received = redemption / 100.0 + rate / frequency;
        return Ok(((received - paid) / paid * frequency * period_days / to_redemption).into());
    }

    let f = |yld: f64| bond_price(&terms, rate, yld, redemption) - price;
    let df = |yld: f64| (f(yld + STEP) - f(yld - STEP)) / (2.0 * STEP);
    let start = if rate > 0.0 { rate } else { 0.1 };
    let yld = newton_method(&f, df, start, 100, 1e-10, |previous| {
        previous.map_or(0.1, |p| p / 2.0)
    })?;
    Ok(yld.into())
}

/// YEARFRAC function
pub fn fn_yearfrac(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let start = date_arg(&args[0], ctx)?;
    let end = date_arg(&args[1], ctx)?;
    let basis = Basis::from_arg(&args[2], ctx)?;
    Ok(year_fraction(start, end, basis).into())
}
