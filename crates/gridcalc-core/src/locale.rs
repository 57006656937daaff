//! Locale conventions used when parsing and printing values

/// Order of the day, month and year components in a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    MonthDayYear,
    DayMonthYear,
    YearMonthDay,
}

/// Number and date conventions
///
/// The locale is threaded explicitly through every coercion; nothing reads
/// a process-wide default.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Locale {
    /// Locale code (e.g. `en_US`)
    pub code: String,
    /// Decimal separator
    pub decimal_separator: char,
    /// Thousands separator, if grouping is accepted when parsing
    pub thousands_separator: Option<char>,
    /// Separator between function arguments in formulas
    pub function_arg_separator: char,
    /// Date format (e.g. `m/d/yyyy`)
    pub date_format: String,
    /// Time format (e.g. `hh:mm:ss a`)
    pub time_format: String,
}

impl Locale {
    /// United States English
    pub fn en_us() -> Self {
        Self {
            code: "en_US".into(),
            decimal_separator: '.',
            thousands_separator: Some(','),
            function_arg_separator: ',',
            date_format: "m/d/yyyy".into(),
            time_format: "hh:mm:ss a".into(),
        }
    }

    /// French
    pub fn fr_fr() -> Self {
        Self {
            code: "fr_FR".into(),
            decimal_separator: ',',
            thousands_separator: Some('\u{202f}'),
            function_arg_separator: ';',
            date_format: "dd/mm/yyyy".into(),
            time_format: "hh:mm:ss".into(),
        }
    }

    /// Combined date and time format
    pub fn date_time_format(&self) -> String {
        format!("{} {}", self.date_format, self.time_format)
    }

    /// Component order of [`Locale::date_format`]
    pub fn date_order(&self) -> DateOrder {
        let first = self
            .date_format
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase());
        match first {
            Some('d') => DateOrder::DayMonthYear,
            Some('y') => DateOrder::YearMonthDay,
            _ => DateOrder::MonthDayYear,
        }
    }

    /// Parse a number written in this locale
    ///
    /// Accepts a sign, thousands grouping in groups of three, a decimal part,
    /// an exponent and a trailing `%`. Returns `None` for anything else,
    /// including the empty string.
    ///
    /// ```
    /// use gridcalc_core::Locale;
    ///
    /// let en = Locale::en_us();
    /// assert_eq!(en.parse_number("1,234.5"), Some(1234.5));
    /// assert_eq!(en.parse_number("50%"), Some(0.5));
    /// assert_eq!(Locale::fr_fr().parse_number("3,5"), Some(3.5));
    /// ```
    pub fn parse_number(&self, input: &str) -> Option<f64> {
        let mut s = input.trim();
        let mut percent = false;
        if let Some(rest) = s.strip_suffix('%') {
            s = rest.trim_end();
            percent = true;
        }

        let (negative, body) = match s.chars().next()? {
            '-' => (true, &s[1..]),
            '+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (mantissa, exponent) = match body.find(|c: char| c == 'e' || c == 'E') {
            Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
            None => (body, None),
        };

        let (int_part, frac_part) = match mantissa.split_once(self.decimal_separator) {
            Some((i, f)) => (i, Some(f)),
            None => (mantissa, None),
        };

        let int_digits = self.strip_grouping(int_part)?;
        let frac_digits = frac_part.unwrap_or("");
        if !frac_digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if int_digits.is_empty() && frac_digits.is_empty() {
            return None;
        }

        let mut normalized = String::with_capacity(body.len() + 2);
        if negative {
            normalized.push('-');
        }
        normalized.push_str(if int_digits.is_empty() { "0" } else { &int_digits });
        if !frac_digits.is_empty() {
            normalized.push('.');
            normalized.push_str(frac_digits);
        }
        if let Some(exp) = exponent {
            let digits = exp
                .strip_prefix(|c: char| c == '+' || c == '-')
                .unwrap_or(exp);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            normalized.push('e');
            normalized.push_str(exp);
        }

        let n: f64 = normalized.parse().ok()?;
        Some(if percent { n / 100.0 } else { n })
    }

    /// Print a number with this locale's decimal separator
    pub fn format_number(&self, n: f64) -> String {
        let s = crate::cell::format_number(n);
        if self.decimal_separator == '.' {
            s
        } else {
            s.replace('.', &self.decimal_separator.to_string())
        }
    }

    fn strip_grouping(&self, int_part: &str) -> Option<String> {
        let sep = match self.thousands_separator {
            Some(sep) if int_part.contains(sep) => sep,
            _ => {
                return int_part
                    .chars()
                    .all(|c| c.is_ascii_digit())
                    .then(|| int_part.to_string())
            }
        };

        let mut digits = String::with_capacity(int_part.len());
        for (i, group) in int_part.split(sep).enumerate() {
            let valid_len = if i == 0 {
                (1..=3).contains(&group.len())
            } else {
                group.len() == 3
            };
            if !valid_len || !group.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            digits.push_str(group);
        }
        Some(digits)
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::en_us()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_numbers() {
        let en = Locale::en_us();
        assert_eq!(en.parse_number("42"), Some(42.0));
        assert_eq!(en.parse_number("  -3.5 "), Some(-3.5));
        assert_eq!(en.parse_number("+.5"), Some(0.5));
        assert_eq!(en.parse_number("1e3"), Some(1000.0));
        assert_eq!(en.parse_number("2.5E-1"), Some(0.25));
        assert_eq!(en.parse_number("12%"), Some(0.12));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let en = Locale::en_us();
        assert_eq!(en.parse_number(""), None);
        assert_eq!(en.parse_number("abc"), None);
        assert_eq!(en.parse_number("1.2.3"), None);
        assert_eq!(en.parse_number("1e"), None);
        assert_eq!(en.parse_number("-"), None);
        assert_eq!(en.parse_number("12,34"), None);
    }

    #[test]
    fn test_parse_grouping() {
        let en = Locale::en_us();
        assert_eq!(en.parse_number("1,234,567.25"), Some(1234567.25));
        assert_eq!(en.parse_number("1234,567"), None);
    }

    #[test]
    fn test_french_locale() {
        let fr = Locale::fr_fr();
        assert_eq!(fr.parse_number("3,25"), Some(3.25));
        assert_eq!(fr.parse_number("3.25"), None);
        assert_eq!(fr.format_number(2.5), "2,5");
        assert_eq!(fr.date_order(), DateOrder::DayMonthYear);
        assert_eq!(Locale::en_us().date_order(), DateOrder::MonthDayYear);
    }
}
