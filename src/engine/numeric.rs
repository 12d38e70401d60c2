//! Numeric helpers for the command engine.
//!
//! Exact factorial and Fibonacci results grow far beyond any machine word,
//! so they are computed on [`BigNat`], a little-endian vector of base-10^9
//! limbs that only supports the two operations those loops need.

use super::CommandError;
use std::cmp::Ordering;
use std::fmt;

/// Largest argument FACT computes; larger inputs are clamped
pub const FACT_LIMIT: i64 = 20_000;

/// Largest argument FIB computes; larger inputs are clamped
pub const FIB_LIMIT: i64 = 100_000;

const LIMB_BASE: u32 = 1_000_000_000;

/// Arbitrary-precision natural number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigNat {
    /// Least significant limb first; never empty, no leading zero limbs
    limbs: Vec<u32>,
}

impl BigNat {
    /// Create from a machine integer
    pub fn from_u64(mut value: u64) -> Self {
        let mut limbs = Vec::with_capacity(3);
        loop {
            limbs.push((value % u64::from(LIMB_BASE)) as u32);
            value /= u64::from(LIMB_BASE);
            if value == 0 {
                break;
            }
        }
        BigNat { limbs }
    }

    /// Multiply in place by a small factor
    pub fn mul_small(&mut self, factor: u32) {
        let base = u64::from(LIMB_BASE);
        let mut carry = 0u64;

        for limb in &mut self.limbs {
            let product = u64::from(*limb) * u64::from(factor) + carry;
            *limb = (product % base) as u32;
            carry = product / base;
        }

        while carry > 0 {
            self.limbs.push((carry % base) as u32);
            carry /= base;
        }

        self.normalize();
    }

    /// Add another number in place
    pub fn add_assign(&mut self, other: &BigNat) {
        if other.limbs.len() > self.limbs.len() {
            self.limbs.resize(other.limbs.len(), 0);
        }

        let mut carry = 0u32;
        for (i, limb) in self.limbs.iter_mut().enumerate() {
            let addend = other.limbs.get(i).copied().unwrap_or(0);
            if addend == 0 && carry == 0 && i >= other.limbs.len() {
                break;
            }

            let sum = *limb + addend + carry;
            if sum >= LIMB_BASE {
                *limb = sum - LIMB_BASE;
                carry = 1;
            } else {
                *limb = sum;
                carry = 0;
            }
        }

        if carry > 0 {
            self.limbs.push(carry);
        }
    }

    fn normalize(&mut self) {
        while self.limbs.len() > 1 && self.limbs.last() == Some(&0) {
            self.limbs.pop();
        }
    }
}

impl fmt::Display for BigNat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut limbs = self.limbs.iter().rev();
        if let Some(first) = limbs.next() {
            write!(f, "{first}")?;
        }
        for limb in limbs {
            write!(f, "{limb:09}")?;
        }
        Ok(())
    }
}

/// `n!`, with `n` clamped to [`FACT_LIMIT`]; anything below 2 yields 1
pub fn factorial(n: i64) -> BigNat {
    let n = n.min(FACT_LIMIT);
    let mut result = BigNat::from_u64(1);
    for i in 2..=n {
        // i <= FACT_LIMIT, always fits
        result.mul_small(i as u32);
    }
    result
}

/// The `n`-th Fibonacci number (0-indexed), with `n` clamped to [`FIB_LIMIT`]
pub fn fibonacci(n: i64) -> BigNat {
    let n = n.min(FIB_LIMIT);
    let mut a = BigNat::from_u64(0);
    let mut b = BigNat::from_u64(1);
    for _ in 0..n.max(0) {
        a.add_assign(&b);
        std::mem::swap(&mut a, &mut b);
    }
    a
}

/// Trial division up to the square root of `n`
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }

    // n <= i64::MAX, so f * f stays well inside u64 before the loop exits
    let n = n as u64;
    let mut f = 3u64;
    while f * f <= n {
        if n % f == 0 {
            return false;
        }
        f += 2;
    }
    true
}

/// A numeric token: integer unless it contains a `.`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Exact numeric order; equal values compare `Equal` whatever their kind
    fn numeric_cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (Number::Int(a), Number::Float(b)) => cmp_int_float(a, b),
            (Number::Float(a), Number::Int(b)) => cmp_int_float(b, a).reverse(),
            (Number::Float(a), Number::Float(b)) => {
                a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
            }
        }
    }
}

/// Compare an integer with a float without rounding the integer
fn cmp_int_float(int: i64, float: f64) -> Ordering {
    // 2^63, exactly representable
    const BOUND: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        return (int as f64).total_cmp(&float);
    }
    if float >= BOUND {
        return Ordering::Less;
    }
    if float < -BOUND {
        return Ordering::Greater;
    }

    let whole = float.trunc();
    int.cmp(&(whole as i64)).then_with(|| {
        let fraction = float - whole;
        if fraction > 0.0 {
            Ordering::Less
        } else if fraction < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

/// Render a float the way Python's `repr` does: `3.0`, `1e+16`, `1.5e-05`
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    // Debug keeps the decimal point on whole floats and switches to
    // exponent form at the same magnitudes as Python
    let debug = format!("{x:?}");
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => debug,
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => f.write_str(&format_float(*x)),
        }
    }
}

/// Split on commas or whitespace and parse every token.
pub fn parse_numbers(arg: &str) -> Result<Vec<Number>, CommandError> {
    arg.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            if token.contains('.') {
                token
                    .parse()
                    .map(Number::Float)
                    .map_err(|_| CommandError::InvalidNumber(token.to_string()))
            } else {
                token
                    .parse()
                    .map(Number::Int)
                    .map_err(|_| CommandError::InvalidInteger(token.to_string()))
            }
        })
        .collect()
}

/// Parse a single integer argument; an empty argument means 0.
pub fn parse_int(arg: &str) -> Result<i64, CommandError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Ok(0);
    }
    arg.parse()
        .map_err(|_| CommandError::InvalidInteger(arg.to_string()))
}

/// Like [`parse_int`], but a well-formed integer outside the `i64` range
/// saturates instead of failing. For arguments that are clamped anyway.
pub fn parse_saturating_int(arg: &str) -> Result<i64, CommandError> {
    parse_int(arg).or_else(|e| {
        let arg = arg.trim();
        let (negative, digits) = match arg.as_bytes().first() {
            Some(b'-') => (true, &arg[1..]),
            Some(b'+') => (false, &arg[1..]),
            _ => (false, arg),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(e);
        }
        Ok(if negative { i64::MIN } else { i64::MAX })
    })
}

/// Sum left to right; integers stay exact until a float joins in.
pub fn sum(numbers: &[Number]) -> Result<Number, CommandError> {
    numbers
        .iter()
        .try_fold(Number::Int(0), |acc, &n| match (acc, n) {
            (Number::Int(a), Number::Int(b)) => {
                a.checked_add(b).map(Number::Int).ok_or(CommandError::Overflow)
            }
            (a, b) => Ok(Number::Float(a.as_f64() + b.as_f64())),
        })
}

/// Ascending numeric order.
pub fn sorted(numbers: &[Number]) -> Vec<Number> {
    let mut numbers = numbers.to_vec();
    numbers.sort_by(Number::numeric_cmp);
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factorial() {
        assert_eq!(factorial(0).to_string(), "1");
        assert_eq!(factorial(1).to_string(), "1");
        assert_eq!(factorial(5).to_string(), "120");
        assert_eq!(factorial(12).to_string(), "479001600");
        assert_eq!(
            factorial(25).to_string(),
            "15511210043330985984000000"
        );
    }

    #[test]
    fn test_factorial_negative() {
        assert_eq!(factorial(-7).to_string(), "1");
    }

    #[test]
    fn test_factorial_limb_boundary() {
        // 13! = 6227020800 crosses the first limb
        assert_eq!(factorial(13).to_string(), "6227020800");
    }

    #[test]
    fn test_fibonacci() {
        assert_eq!(fibonacci(0).to_string(), "0");
        assert_eq!(fibonacci(1).to_string(), "1");
        assert_eq!(fibonacci(10).to_string(), "55");
        assert_eq!(fibonacci(20).to_string(), "6765");
        assert_eq!(fibonacci(100).to_string(), "354224848179261915075");
    }

    #[test]
    fn test_fibonacci_negative() {
        assert_eq!(fibonacci(-3).to_string(), "0");
    }

    #[test]
    fn test_bignat_display_pads_inner_limbs() {
        let mut n = BigNat::from_u64(1_000_000_000);
        assert_eq!(n.to_string(), "1000000000");
        n.add_assign(&BigNat::from_u64(7));
        assert_eq!(n.to_string(), "1000000007");
    }

    #[test]
    fn test_bignat_add_carry() {
        let mut n = BigNat::from_u64(999_999_999_999_999_999);
        n.add_assign(&BigNat::from_u64(1));
        assert_eq!(n.to_string(), "1000000000000000000");
    }

    #[test]
    fn test_bignat_mul_by_zero() {
        let mut n = BigNat::from_u64(123_456_789_012);
        n.mul_small(0);
        assert_eq!(n, BigNat::from_u64(0));
        assert_eq!(n.to_string(), "0");
    }

    #[test]
    fn test_is_prime() {
        assert!(!is_prime(-5));
        assert!(!is_prime(0));
        assert!(!is_prime(1));
        assert!(is_prime(2));
        assert!(is_prime(3));
        assert!(!is_prime(4));
        assert!(!is_prime(9));
        assert!(!is_prime(25));
        assert!(is_prime(97));
        assert!(is_prime(7919));
        assert!(!is_prime(7917));
        assert!(is_prime(1_000_000_007));
    }

    #[test]
    fn test_parse_numbers() {
        let numbers = parse_numbers("5,3, 9 1.5\t7").unwrap();
        assert_eq!(
            numbers,
            vec![
                Number::Int(5),
                Number::Int(3),
                Number::Int(9),
                Number::Float(1.5),
                Number::Int(7),
            ]
        );
        assert!(parse_numbers("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_numbers_invalid() {
        assert_eq!(
            parse_numbers("1 two 3"),
            Err(CommandError::InvalidInteger("two".to_string()))
        );
        assert_eq!(
            parse_numbers("1.2.3"),
            Err(CommandError::InvalidNumber("1.2.3".to_string()))
        );
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(" 42 "), Ok(42));
        assert_eq!(parse_int("-3"), Ok(-3));
        assert_eq!(parse_int(""), Ok(0));
        assert!(parse_int("4.5").is_err());
        assert!(parse_int("99999999999999999999").is_err());
    }

    #[test]
    fn test_parse_saturating_int() {
        assert_eq!(parse_saturating_int(" 42 "), Ok(42));
        assert_eq!(parse_saturating_int(""), Ok(0));
        assert_eq!(parse_saturating_int("100000000000000000000"), Ok(i64::MAX));
        assert_eq!(parse_saturating_int("+100000000000000000000"), Ok(i64::MAX));
        assert_eq!(parse_saturating_int("-100000000000000000000"), Ok(i64::MIN));
        assert_eq!(
            parse_saturating_int("1e30"),
            Err(CommandError::InvalidInteger("1e30".to_string()))
        );
        assert!(parse_saturating_int("-").is_err());
        assert!(parse_saturating_int("4.5").is_err());
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(Number::Float(3.0).to_string(), "3.0");
        assert_eq!(Number::Float(0.1).to_string(), "0.1");
        assert_eq!(Number::Float(1e16).to_string(), "1e+16");
        assert_eq!(Number::Float(1.5e-5).to_string(), "1.5e-05");
        assert_eq!(Number::Float(-2.5e100).to_string(), "-2.5e+100");
        assert_eq!(Number::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(Number::Float(f64::NAN).to_string(), "nan");
    }

    #[test]
    fn test_sum() {
        let numbers = parse_numbers("1 2 3 4 5").unwrap();
        assert_eq!(sum(&numbers).unwrap().to_string(), "15");

        let numbers = parse_numbers("1 2.5").unwrap();
        assert_eq!(sum(&numbers).unwrap().to_string(), "3.5");

        let numbers = parse_numbers("1.5 1.5").unwrap();
        assert_eq!(sum(&numbers).unwrap().to_string(), "3.0");

        assert_eq!(sum(&[]).unwrap().to_string(), "0");
    }

    #[test]
    fn test_sum_overflow() {
        let numbers = vec![Number::Int(i64::MAX), Number::Int(1)];
        assert_eq!(sum(&numbers), Err(CommandError::Overflow));
    }

    #[test]
    fn test_sorted() {
        let numbers = parse_numbers("5,3,9,1,7").unwrap();
        let rendered: Vec<String> = sorted(&numbers).iter().map(|n| n.to_string()).collect();
        assert_eq!(rendered.join(" "), "1 3 5 7 9");

        let numbers = parse_numbers("2 -1 0.5 2.0").unwrap();
        let rendered: Vec<String> = sorted(&numbers).iter().map(|n| n.to_string()).collect();
        assert_eq!(rendered.join(" "), "-1 0.5 2 2.0");
    }

    #[test]
    fn test_sorted_keeps_input_order_for_equal_values() {
        let render = |arg: &str| -> String {
            let numbers = parse_numbers(arg).unwrap();
            let rendered: Vec<String> = sorted(&numbers).iter().map(|n| n.to_string()).collect();
            rendered.join(" ")
        };
        assert_eq!(render("2 2.0 1"), "1 2 2.0");
        assert_eq!(render("2.0 2 1"), "1 2.0 2");
        assert_eq!(render("3 2.5 2 2.9"), "2 2.5 2.9 3");
        assert_eq!(render("-1.5 -1 -2"), "-2 -1.5 -1");
    }

    #[test]
    fn test_int_float_comparison_is_exact() {
        // i64::MAX rounds to 2^63 as a float but is strictly smaller
        assert_eq!(cmp_int_float(i64::MAX, 9_223_372_036_854_775_808.0), Ordering::Less);
        assert_eq!(cmp_int_float(i64::MIN, -9_223_372_036_854_775_808.0), Ordering::Equal);
        assert_eq!(cmp_int_float(0, -0.0), Ordering::Equal);
        assert_eq!(cmp_int_float(-1, -0.5), Ordering::Less);
        assert_eq!(cmp_int_float(1, 0.5), Ordering::Greater);
    }
}
