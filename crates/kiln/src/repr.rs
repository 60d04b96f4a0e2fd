//! Human-readable rendering of values, as the language's `print` shows them.

use std::fmt::Write;

use crate::{
    heap::{Heap, HeapId},
    object::HeapData,
    types::Function,
    value::Value,
};

/// Significant digits used for numbers, as C's `%g`.
const NUMBER_PRECISION: i32 = 6;

/// Formats `n` the way C's `printf("%g", n)` does.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }

    // rounded to NUMBER_PRECISION significant digits; the exponent of the rounded
    // value picks between fixed and scientific notation
    let scientific = format!("{n:.5e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .expect("format_number: `{:e}` output always has an exponent");
    let exponent: i32 = exponent.parse().expect("format_number: exponent is an integer");

    if exponent < -4 || exponent >= NUMBER_PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let decimals = usize::try_from(NUMBER_PRECISION - 1 - exponent).unwrap_or(0);
        trim_fraction(&format!("{n:.decimals$}")).to_owned()
    }
}

/// Drops trailing zeros after the decimal point, and the point itself if bare.
fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

impl Heap {
    /// Renders `value` for display.
    ///
    /// With `expand` arrays show their elements (`[ 1, 2 ]`), otherwise they render as
    /// `<array>`. Expansion is one level deep: nested arrays stay `<array>`.
    #[must_use]
    pub fn format_value(&self, value: Value, expand: bool) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value, expand);
        out
    }

    /// Renders `values` expanded and separated by single spaces, as `log` prints them.
    #[must_use]
    pub fn format_values(&self, values: &[Value]) -> String {
        let mut out = String::new();
        for (i, &value) in values.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            self.write_value(&mut out, value, true);
        }
        out
    }

    fn write_value(&self, out: &mut String, value: Value, expand: bool) {
        match value {
            Value::Nil => out.push_str("nil"),
            Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&format_number(n)),
            Value::Obj(id) => self.write_object(out, id, expand),
        }
    }

    fn write_object(&self, out: &mut String, id: HeapId, expand: bool) {
        match self.get(id) {
            HeapData::Str(s) => out.push_str(&s.to_string_lossy()),
            HeapData::Native(_) => out.push_str("<native fn>"),
            HeapData::Function(function) => self.write_function(out, function),
            HeapData::Closure(closure) => self.write_function(out, self.function(closure.function())),
            HeapData::BoundMethod(bound) => {
                let closure = self.closure(bound.method());
                self.write_function(out, self.function(closure.function()));
            }
            HeapData::Upvalue(_) => out.push_str("upvalue"),
            HeapData::Class(class) => {
                self.write_name(out, class.name());
                out.push_str(" (class)");
            }
            HeapData::Instance(instance) => {
                self.write_name(out, self.class(instance.class()).name());
                out.push_str(" (instance)");
            }
            HeapData::Array(array) => {
                if !expand {
                    out.push_str("<array>");
                } else if array.is_empty() {
                    out.push_str("[]");
                } else {
                    out.push_str("[ ");
                    for (i, &element) in array.as_slice().iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_value(out, element, false);
                    }
                    out.push_str(" ]");
                }
            }
        }
    }

    fn write_function(&self, out: &mut String, function: &Function) {
        match function.name {
            Some(name) => {
                let _ = write!(out, "<fn {}> ({})", self.string(name).to_string_lossy(), function.id());
            }
            None => {
                let _ = write!(out, "<script> ({})", function.id());
            }
        }
    }

    fn write_name(&self, out: &mut String, name: Option<HeapId>) {
        match name {
            Some(name) => out.push_str(&self.string(name).to_string_lossy()),
            None => out.push_str("$anon"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_print_without_fraction() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-42.0), "-42");
        assert_eq!(format_number(100_000.0), "100000");
    }

    #[test]
    fn fractions_keep_six_significant_digits() {
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.0 / 3.0), "0.333333");
        assert_eq!(format_number(2.5e-4), "0.00025");
    }

    #[test]
    fn large_and_small_use_exponents() {
        assert_eq!(format_number(1_000_000.0), "1e+06");
        assert_eq!(format_number(1.5e20), "1.5e+20");
        assert_eq!(format_number(1e-5), "1e-05");
    }

    #[test]
    fn special_values() {
        assert_eq!(format_number(f64::NAN), "nan");
        assert_eq!(format_number(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "-0");
    }
}
