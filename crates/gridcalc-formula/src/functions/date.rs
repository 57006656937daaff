//! Date and time functions
//!
//! Dates are serial numbers (see [`crate::dates`]); functions building a
//! date return it with the locale's date format so that the cell displays
//! as a date.

use chrono::{Datelike, Local, NaiveDate, Timelike};

use super::{FunctionDef, FunctionRegistry};
use crate::args::{
    Arg, ArgDef,
    ArgType::{self, Date, Number},
    FunctionOutput,
};
use crate::dates::{
    add_months, date_to_serial, datetime_to_serial, last_day_of_month, parse_date_time,
    serial_from_ymd,
};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add(
        "DATE",
        FunctionDef::new(
            "Converts year/month/day into a date.",
            vec![
                ArgDef::new("year", &[Number]),
                ArgDef::new("month", &[Number]),
                ArgDef::new("day", &[Number]),
            ],
            fn_date,
        ),
    );
    registry.add(
        "DATEVALUE",
        FunctionDef::new(
            "Converts a date string to a date value.",
            vec![ArgDef::new("date_string", &[ArgType::String])],
            fn_datevalue,
        ),
    );
    registry.add(
        "DAYS",
        FunctionDef::new(
            "Number of days between two dates.",
            vec![
                ArgDef::new("end_date", &[Date]),
                ArgDef::new("start_date", &[Date]),
            ],
            fn_days,
        ),
    );
    registry.add(
        "EDATE",
        FunctionDef::new(
            "Date a number of months before/after another date.",
            vec![
                ArgDef::new("start_date", &[Date]),
                ArgDef::new("months", &[Number]),
            ],
            fn_edate,
        ),
    );
    registry.add(
        "EOMONTH",
        FunctionDef::new(
            "Last day of a month before or after a date.",
            vec![
                ArgDef::new("start_date", &[Date]),
                ArgDef::new("months", &[Number]),
            ],
            fn_eomonth,
        ),
    );

    let parts: [(&str, &str, fn(&CallContext, &Arg) -> FormulaResult<f64>); 6] = [
        ("DAY", "Day of the month that a specific date falls on.", |ctx, arg| {
            Ok(ctx.date(arg)?.day() as f64)
        }),
        ("MONTH", "Month of the year a specific date falls in.", |ctx, arg| {
            Ok(ctx.date(arg)?.month() as f64)
        }),
        ("YEAR", "Year specified by a given date.", |ctx, arg| {
            Ok(ctx.date(arg)?.year() as f64)
        }),
        ("HOUR", "Hour component of a specific time.", |ctx, arg| {
            Ok(ctx.date(arg)?.hour() as f64)
        }),
        ("MINUTE", "Minute component of a specific time.", |ctx, arg| {
            Ok(ctx.date(arg)?.minute() as f64)
        }),
        ("SECOND", "Second component of a specific time.", |ctx, arg| {
            Ok(ctx.date(arg)?.second() as f64)
        }),
    ];
    for (name, description, part) in parts {
        registry.add(
            name,
            FunctionDef::new(description, vec![ArgDef::new("date", &[Date])], move |args, ctx| {
                Ok(part(ctx, &args[0])?.into())
            }),
        );
    }

    registry.add(
        "TIME",
        FunctionDef::new(
            "Converts hour/minute/second into a time.",
            vec![
                ArgDef::new("hour", &[Number]),
                ArgDef::new("minute", &[Number]),
                ArgDef::new("second", &[Number]),
            ],
            fn_time,
        ),
    );
    registry.add(
        "TIMEVALUE",
        FunctionDef::new(
            "Converts a time string into its serial number representation.",
            vec![ArgDef::new("time_string", &[ArgType::String])],
            fn_timevalue,
        ),
    );
    registry.add(
        "NOW",
        FunctionDef::new("Current date and time as a date value.", vec![], fn_now).volatile(),
    );
    registry.add(
        "TODAY",
        FunctionDef::new("Current date as a date value.", vec![], fn_today).volatile(),
    );
    registry.add(
        "WEEKDAY",
        FunctionDef::new(
            "Day of the week of the date provided (as number).",
            vec![
                ArgDef::new("date", &[Date]),
                ArgDef::new("type", &[Number]).default_value(1.0),
            ],
            fn_weekday,
        ),
    );
}

fn as_date(serial: f64, ctx: &CallContext) -> FunctionOutput {
    FunctionOutput::formatted(serial, ctx.locale().date_format.clone())
}

fn date_output(date: NaiveDate, ctx: &CallContext) -> FunctionOutput {
    as_date(date_to_serial(date), ctx)
}

fn out_of_range() -> FormulaError {
    FormulaError::evaluation("The function [[FUNCTION_NAME]] result must be a valid date.")
}

/// DATE(year, month, day)
///
/// Years below 1900 are offset by 1900; months and days overflow into the
/// following (or preceding) month and year.
pub fn fn_date(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let mut year = ctx.integer(&args[0])?;
    let month = ctx.integer(&args[1])?;
    let day = ctx.integer(&args[2])?;
    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=9999).contains(&year) {
        return Err(FormulaError::evaluation(format!(
            "The function [[FUNCTION_NAME]] expects a year between 0 and 9999, but got {}.",
            year
        )));
    }
    let month = i32::try_from(month).map_err(|_| out_of_range())?;
    let day = i32::try_from(day).map_err(|_| out_of_range())?;
    let serial = serial_from_ymd(year as i32, month, day).ok_or_else(out_of_range)?;
    if serial < 0.0 {
        return Err(out_of_range());
    }
    Ok(as_date(serial, ctx))
}

/// DATEVALUE(date_string)
pub fn fn_datevalue(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let text = ctx.string(&args[0])?;
    let parsed = parse_date_time(&text, ctx.locale()).ok_or_else(|| {
        FormulaError::evaluation(format!(
            "The function [[FUNCTION_NAME]] parameter '{}' should be a string representation of a date.",
            text
        ))
    })?;
    Ok(parsed.serial.floor().into())
}

/// DAYS(end_date, start_date)
pub fn fn_days(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let end = ctx.date(&args[0])?.date();
    let start = ctx.date(&args[1])?.date();
    Ok((date_to_serial(end) - date_to_serial(start)).into())
}

fn shifted(args: &[Arg], ctx: &CallContext) -> FormulaResult<NaiveDate> {
    let start = ctx.date(&args[0])?.date();
    let months = i32::try_from(ctx.integer(&args[1])?).map_err(|_| out_of_range())?;
    add_months(start, months).ok_or_else(out_of_range)
}

/// EDATE(start_date, months)
pub fn fn_edate(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(date_output(shifted(args, ctx)?, ctx))
}

/// EOMONTH(start_date, months)
pub fn fn_eomonth(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let date = shifted(args, ctx)?;
    let last = last_day_of_month(date.year(), date.month()).ok_or_else(out_of_range)?;
    let end = date.with_day(last).ok_or_else(out_of_range)?;
    Ok(date_output(end, ctx))
}

/// TIME(hour, minute, second)
///
/// The time wraps around at 24 hours.
pub fn fn_time(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let hours = ctx.integer(&args[0])?;
    let minutes = ctx.integer(&args[1])?;
    let seconds = ctx.integer(&args[2])?;
    let total = hours * 3600 + minutes * 60 + seconds;
    if total < 0 {
        return Err(FormulaError::evaluation(
            "The function [[FUNCTION_NAME]] result should not be negative.",
        ));
    }
    let serial = (total as f64 % SECONDS_PER_DAY) / SECONDS_PER_DAY;
    Ok(FunctionOutput::formatted(serial, "hh:mm:ss"))
}

/// TIMEVALUE(time_string)
pub fn fn_timevalue(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let text = ctx.string(&args[0])?;
    let parsed = parse_date_time(&text, ctx.locale()).ok_or_else(|| {
        FormulaError::evaluation(format!(
            "The function [[FUNCTION_NAME]] parameter '{}' should be a string representation of a time.",
            text
        ))
    })?;
    Ok((parsed.serial - parsed.serial.floor()).into())
}

/// NOW()
pub fn fn_now(_args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let serial = datetime_to_serial(Local::now().naive_local());
    Ok(FunctionOutput::formatted(serial, ctx.locale().date_time_format()))
}

/// TODAY()
pub fn fn_today(_args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(date_output(Local::now().date_naive(), ctx))
}

/// WEEKDAY(date, [type])
///
/// Type 1 counts from Sunday = 1, type 2 from Monday = 1 and type 3 from
/// Monday = 0.
pub fn fn_weekday(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let weekday = ctx.date(&args[0])?.weekday();
    let day = match ctx.integer(&args[1])? {
        1 => weekday.number_from_sunday(),
        2 => weekday.number_from_monday(),
        3 => weekday.num_days_from_monday(),
        other => {
            return Err(FormulaError::evaluation(format!(
                "The function [[FUNCTION_NAME]] parameter 2 value should be 1, 2 or 3, but got {}.",
                other
            )))
        }
    };
    Ok((day as f64).into())
}

#[cfg(test)]
mod tests {
    use crate::evaluator::FormulaOutput;
    use crate::testing::{assert_close, error_kind, eval, eval_number, eval_output};
    use gridcalc_core::{ErrorKind, Value};
    use pretty_assertions::assert_eq;

    fn format_of(formula: &str) -> Option<String> {
        match eval_output(&[], formula) {
            FormulaOutput::Value(v) => v.format,
            FormulaOutput::Matrix(_) => None,
        }
    }

    #[test]
    fn test_date_construction() {
        assert_eq!(eval_number("=DATE(2024,1,15)"), 45306.0);
        assert_eq!(eval("=DATE(2024,14,1)=DATE(2025,2,1)"), Value::Boolean(true));
        assert_eq!(eval("=DATE(124,1,15)=DATE(2024,1,15)"), Value::Boolean(true));
        assert_eq!(eval("=DATE(2024,3,0)=DATE(2024,2,29)"), Value::Boolean(true));
        assert_eq!(error_kind(&eval("=DATE(10000,1,1)")), Some(ErrorKind::Generic));
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(eval_number("=YEAR(45306)"), 2024.0);
        assert_eq!(eval_number("=MONTH(45306)"), 1.0);
        assert_eq!(eval_number("=DAY(\"1/15/2024\")"), 15.0);
        assert_eq!(eval_number("=HOUR(\"18:30:15\")"), 18.0);
        assert_eq!(eval_number("=MINUTE(\"18:30:15\")"), 30.0);
        assert_eq!(eval_number("=SECOND(\"18:30:15\")"), 15.0);
        assert_eq!(eval_number("=HOUR(45306.75)"), 18.0);
    }

    #[test]
    fn test_month_arithmetic() {
        assert_eq!(
            eval("=EDATE(DATE(2024,1,31),1)=DATE(2024,2,29)"),
            Value::Boolean(true)
        );
        assert_eq!(
            eval("=EOMONTH(DATE(2024,1,15),1)=DATE(2024,2,29)"),
            Value::Boolean(true)
        );
        assert_eq!(
            eval("=EOMONTH(DATE(2024,1,15),-2)=DATE(2023,11,30)"),
            Value::Boolean(true)
        );
        assert_eq!(eval_number("=DAYS(DATE(2024,3,1),DATE(2024,1,1))"), 60.0);
    }

    #[test]
    fn test_time() {
        assert_eq!(eval_number("=TIME(18,0,0)"), 0.75);
        assert_close(eval_number("=TIME(25,0,0)"), 1.0 / 24.0);
        assert_eq!(format_of("=TIME(18,0,0)").as_deref(), Some("hh:mm:ss"));
        assert_eq!(error_kind(&eval("=TIME(-1,0,0)")), Some(ErrorKind::Generic));
    }

    #[test]
    fn test_text_conversions() {
        assert_eq!(eval_number("=DATEVALUE(\"1/15/2024 6:00 pm\")"), 45306.0);
        assert_eq!(eval_number("=TIMEVALUE(\"1/15/2024 6:00 pm\")"), 0.75);
        assert_eq!(error_kind(&eval("=DATEVALUE(\"junk\")")), Some(ErrorKind::Generic));
    }

    #[test]
    fn test_weekday() {
        // 2024-01-15 is a Monday
        assert_eq!(eval_number("=WEEKDAY(45306)"), 2.0);
        assert_eq!(eval_number("=WEEKDAY(45306, 2)"), 1.0);
        assert_eq!(eval_number("=WEEKDAY(45306, 3)"), 0.0);
        assert_eq!(error_kind(&eval("=WEEKDAY(45306, 4)")), Some(ErrorKind::Generic));
    }

    #[test]
    fn test_now_and_today() {
        assert_eq!(eval("=TODAY()<=NOW()"), Value::Boolean(true));
        let elapsed = eval_number("=NOW()-TODAY()");
        assert!((0.0..1.0).contains(&elapsed));
        assert_eq!(format_of("=TODAY()").as_deref(), Some("m/d/yyyy"));
        assert_eq!(format_of("=NOW()").as_deref(), Some("m/d/yyyy hh:mm:ss a"));
    }
}
