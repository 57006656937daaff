//! Ordered search over mixed-type data
//!
//! Data can hold any mix of numbers, text, booleans, errors and blanks.
//! Only elements of the target's type take part in a search; the others are
//! skipped. Text is compared case- and accent-insensitively.

use std::cmp::Ordering;

use gridcalc_core::Value;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::criteria::wildcard_to_regex;
use crate::error::FormulaResult;

/// What counts as a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Equal values only
    Strict,
    /// Equal, else the largest smaller value
    NextSmaller,
    /// Equal, else the smallest greater value
    NextGreater,
    /// Text matched with `*`/`?` wildcards; other types strictly
    Wildcard,
}

/// Sort order assumed by [`dichotomic_search`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
enum Normalized {
    Number(f64),
    Text(String),
    Boolean(bool),
    Other,
}

impl Normalized {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => Normalized::Number(*n),
            Value::Text(s) => Normalized::Text(normalize_text(s.as_str())),
            Value::Boolean(b) => Normalized::Boolean(*b),
            Value::Empty | Value::Error(_) => Normalized::Other,
        }
    }

    fn target(value: &Value) -> FormulaResult<Self> {
        match value {
            Value::Error(e) => Err(e.clone().into()),
            Value::Empty => Ok(Normalized::Number(0.0)),
            other => Ok(Self::from_value(other)),
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Normalized::Number(a), Normalized::Number(b)) => a.partial_cmp(b),
            (Normalized::Text(a), Normalized::Text(b)) => Some(a.cmp(b)),
            (Normalized::Boolean(a), Normalized::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Lower-case and strip accents
pub fn normalize_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Binary search over data sorted in `order`
///
/// Each probe falls back towards the left bound to the closest element of
/// the target's type. For equal runs, [`SearchMode::Strict`] and descending
/// data find the first match; the approximate modes on ascending data find
/// the last.
pub fn dichotomic_search<F>(
    len: usize,
    mut value_at: F,
    target: &Value,
    mode: SearchMode,
    order: SortOrder,
) -> FormulaResult<Option<usize>>
where
    F: FnMut(usize) -> FormulaResult<Value>,
{
    let target = Normalized::target(target)?;
    if len == 0 {
        return Ok(None);
    }

    let mut exact = None;
    let mut smaller = None;
    let mut greater = None;
    let (mut lo, mut hi) = (0isize, len as isize - 1);

    while lo <= hi {
        let mid = (lo + hi) / 2;
        let mut probe = mid;
        let mut found = None;
        loop {
            let value = Normalized::from_value(&value_at(probe as usize)?);
            if let Some(ordering) = value.compare(&target) {
                found = Some(ordering);
                break;
            }
            if probe == lo {
                break;
            }
            probe -= 1;
        }
        let Some(ordering) = found else {
            lo = mid + 1;
            continue;
        };

        match (ordering, order) {
            (Ordering::Equal, _) => {
                exact = Some(probe as usize);
                if mode == SearchMode::Strict || mode == SearchMode::Wildcard || order == SortOrder::Descending
                {
                    hi = probe - 1;
                } else {
                    lo = mid + 1;
                }
            }
            (Ordering::Less, SortOrder::Ascending) => {
                smaller = Some(probe as usize);
                lo = mid + 1;
            }
            (Ordering::Less, SortOrder::Descending) => {
                smaller = Some(probe as usize);
                hi = probe - 1;
            }
            (Ordering::Greater, SortOrder::Ascending) => {
                greater = Some(probe as usize);
                hi = probe - 1;
            }
            (Ordering::Greater, SortOrder::Descending) => {
                greater = Some(probe as usize);
                lo = mid + 1;
            }
        }
    }

    Ok(match mode {
        SearchMode::Strict | SearchMode::Wildcard => exact,
        SearchMode::NextSmaller => exact.or(smaller),
        SearchMode::NextGreater => exact.or(greater),
    })
}

/// Scan the data once, front to back or back to front
///
/// Exact matches win immediately; otherwise the closest value of the
/// target's type in the direction of `mode`. Indices are always those of
/// the original data.
pub fn linear_search<F>(
    len: usize,
    mut value_at: F,
    target: &Value,
    mode: SearchMode,
    reverse: bool,
) -> FormulaResult<Option<usize>>
where
    F: FnMut(usize) -> FormulaResult<Value>,
{
    let normalized = Normalized::target(target)?;
    let pattern = match (mode, target) {
        (SearchMode::Wildcard, Value::Text(s)) => Some(wildcard_to_regex(s.as_str(), false)?),
        _ => None,
    };

    let mut best: Option<(usize, Normalized)> = None;
    for k in 0..len {
        let i = if reverse { len - 1 - k } else { k };
        let raw = value_at(i)?;
        if let Some(pattern) = &pattern {
            if let Value::Text(s) = &raw {
                if pattern.is_match(s.as_str()) {
                    return Ok(Some(i));
                }
            }
            continue;
        }

        let value = Normalized::from_value(&raw);
        let Some(ordering) = value.compare(&normalized) else {
            continue;
        };
        if ordering == Ordering::Equal {
            return Ok(Some(i));
        }
        let closer = match &best {
            None => true,
            Some((_, b)) => value.compare(b) == Some(ordering.reverse()),
        };
        match (ordering, mode) {
            (Ordering::Less, SearchMode::NextSmaller) | (Ordering::Greater, SearchMode::NextGreater)
                if closer =>
            {
                best = Some((i, value));
            }
            _ => {}
        }
    }
    Ok(best.map(|(i, _)| i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::ErrorKind;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn numbers(values: &[f64]) -> Vec<Value> {
        values.iter().map(|n| Value::Number(*n)).collect()
    }

    fn dicho(data: &[Value], target: Value, mode: SearchMode, order: SortOrder) -> Option<usize> {
        dichotomic_search(data.len(), |i| Ok(data[i].clone()), &target, mode, order).unwrap()
    }

    fn linear(data: &[Value], target: Value, mode: SearchMode, reverse: bool) -> Option<usize> {
        linear_search(data.len(), |i| Ok(data[i].clone()), &target, mode, reverse).unwrap()
    }

    #[test]
    fn test_next_smaller_ascending_takes_last_equal() {
        let data = numbers(&[3.0, 6.0, 6.0, 10.0]);
        assert_eq!(
            dicho(&data, 6.0.into(), SearchMode::NextSmaller, SortOrder::Ascending),
            Some(2)
        );
        assert_eq!(dicho(&data, 6.0.into(), SearchMode::Strict, SortOrder::Ascending), Some(1));
        assert_eq!(
            dicho(&data, 7.0.into(), SearchMode::NextSmaller, SortOrder::Ascending),
            Some(2)
        );
        assert_eq!(
            dicho(&data, 7.0.into(), SearchMode::NextGreater, SortOrder::Ascending),
            Some(3)
        );
        assert_eq!(dicho(&data, 1.0.into(), SearchMode::NextSmaller, SortOrder::Ascending), None);
        assert_eq!(dicho(&data, 7.0.into(), SearchMode::Strict, SortOrder::Ascending), None);
    }

    #[test]
    fn test_descending() {
        let data = numbers(&[10.0, 6.0, 6.0, 3.0]);
        assert_eq!(
            dicho(&data, 6.0.into(), SearchMode::NextGreater, SortOrder::Descending),
            Some(1)
        );
        assert_eq!(
            dicho(&data, 7.0.into(), SearchMode::NextGreater, SortOrder::Descending),
            Some(0)
        );
        assert_eq!(
            dicho(&data, 5.0.into(), SearchMode::NextSmaller, SortOrder::Descending),
            Some(3)
        );
    }

    #[test]
    fn test_mixed_types_are_skipped() {
        let data = vec![
            Value::Number(1.0),
            Value::text("a"),
            Value::Number(3.0),
            Value::Empty,
            Value::error(ErrorKind::NotAvailable),
            Value::Number(7.0),
        ];
        assert_eq!(dicho(&data, 3.0.into(), SearchMode::Strict, SortOrder::Ascending), Some(2));
        assert_eq!(
            dicho(&data, 5.0.into(), SearchMode::NextSmaller, SortOrder::Ascending),
            Some(2)
        );
        assert_eq!(dicho(&data, Value::text("A"), SearchMode::Strict, SortOrder::Ascending), Some(1));
    }

    #[test]
    fn test_text_normalization() {
        let data = vec![Value::text("Crème"), Value::text("Zoé")];
        assert_eq!(linear(&data, Value::text("creme"), SearchMode::Strict, false), Some(0));
        assert_eq!(linear(&data, Value::text("ZOE"), SearchMode::Strict, false), Some(1));
    }

    #[test]
    fn test_linear_closest_and_reverse() {
        let data = numbers(&[5.0, 1.0, 4.0, 4.0, 9.0]);
        assert_eq!(linear(&data, 3.0.into(), SearchMode::NextSmaller, false), Some(1));
        assert_eq!(linear(&data, 4.5.into(), SearchMode::NextSmaller, false), Some(2));
        assert_eq!(linear(&data, 4.5.into(), SearchMode::NextGreater, false), Some(0));
        assert_eq!(linear(&data, 4.0.into(), SearchMode::Strict, true), Some(3));
        assert_eq!(linear(&data, 2.0.into(), SearchMode::Strict, false), None);
    }

    #[test]
    fn test_wildcard() {
        let data = vec![Value::Number(1.0), Value::text("banana"), Value::text("apple")];
        assert_eq!(linear(&data, Value::text("a*"), SearchMode::Wildcard, false), Some(2));
        assert_eq!(linear(&data, Value::text("?anana"), SearchMode::Wildcard, false), Some(1));
        assert_eq!(linear(&data, Value::Number(1.0), SearchMode::Wildcard, false), Some(0));
    }

    #[test]
    fn test_error_target_fails() {
        let data = numbers(&[1.0]);
        let target = Value::error(ErrorKind::NotAvailable);
        let at = |i: usize| Ok(data[i].clone());
        assert!(dichotomic_search(1, at, &target, SearchMode::Strict, SortOrder::Ascending).is_err());
        assert!(linear_search(1, at, &target, SearchMode::Strict, false).is_err());
    }

    proptest! {
        #[test]
        fn prop_dichotomic_agrees_with_linear_on_sorted_data(
            mut data in proptest::collection::vec(-50i32..50, 0..40),
            target in -60i32..60,
        ) {
            data.sort();
            let values: Vec<Value> = data.iter().map(|n| Value::Number(*n as f64)).collect();
            let target = Value::Number(target as f64);
            for mode in [SearchMode::Strict, SearchMode::NextSmaller, SearchMode::NextGreater] {
                let d = dicho(&values, target.clone(), mode, SortOrder::Ascending);
                let l = linear(&values, target.clone(), mode, false);
                prop_assert_eq!(d.map(|i| values[i].clone()), l.map(|i| values[i].clone()));
            }
            let d = dicho(&values, target.clone(), SearchMode::Strict, SortOrder::Ascending);
            let l = linear(&values, target, SearchMode::Strict, false);
            prop_assert_eq!(d, l);
        }
    }
}
