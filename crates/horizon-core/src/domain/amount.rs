//! Decimal arithmetic that fails instead of rounding.
//!
//! `rust_decimal` keeps at most 96 bits of mantissa and 28 fractional
//! digits; its checked operations only report overflow and silently round
//! anything that needs more digits. Money here must stay exact, so both
//! operations below compute the full-width result in `i128` and only accept
//! it when it fits a [`Decimal`] without dropping a non-zero digit.

use rust_decimal::Decimal;

/// `a + b`, or `None` if the exact sum is not representable.
///
/// The result keeps the larger of the two scales, as `Decimal` addition
/// does, unless only trailing zeros have to go to make it fit.
pub fn exact_add(a: Decimal, b: Decimal) -> Option<Decimal> {
    add_parts(a, b).or_else(|| add_parts(a.normalize(), b.normalize()))
}

/// `a * b`, or `None` if the exact product is not representable.
///
/// The result has scale `a.scale() + b.scale()` when that fits; a zero
/// operand yields [`Decimal::ZERO`].
pub fn exact_mul(a: Decimal, b: Decimal) -> Option<Decimal> {
    if a.is_zero() || b.is_zero() {
        return Some(Decimal::ZERO);
    }
    mul_parts(a, b).or_else(|| mul_parts(a.normalize(), b.normalize()))
}

fn add_parts(a: Decimal, b: Decimal) -> Option<Decimal> {
    let scale = a.scale().max(b.scale());
    let left = rescaled_mantissa(a, scale)?;
    let right = rescaled_mantissa(b, scale)?;
    fit(left.checked_add(right)?, scale)
}

fn mul_parts(a: Decimal, b: Decimal) -> Option<Decimal> {
    let mantissa = a.mantissa().checked_mul(b.mantissa())?;
    fit(mantissa, a.scale() + b.scale())
}

fn rescaled_mantissa(value: Decimal, scale: u32) -> Option<i128> {
    let factor = 10_i128.checked_pow(scale - value.scale())?;
    value.mantissa().checked_mul(factor)
}

/// Builds a decimal from `mantissa * 10^-scale`, shedding trailing zeros
/// only while the value does not fit yet.
fn fit(mut mantissa: i128, mut scale: u32) -> Option<Decimal> {
    loop {
        match Decimal::try_from_i128_with_scale(mantissa, scale) {
            Ok(value) => return Some(value),
            Err(_) if scale > 0 && mantissa % 10 == 0 => {
                mantissa /= 10;
                scale -= 1;
            }
            Err(_) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn decimal(value: &str) -> Decimal {
        Decimal::from_str_exact(value).expect("decimal")
    }

    #[test]
    fn sums_keep_the_wider_scale() {
        let sum = exact_add(decimal("0.61"), decimal("1.00")).expect("sum");
        let sum = exact_add(sum, decimal("0.39")).expect("sum");
        assert_eq!(sum.to_string(), "2.00");
    }

    #[test]
    fn sum_that_needs_more_than_28_digits_is_rejected() {
        let whole = decimal("79228162514264337593543950");
        let tiny = decimal("0.0001");
        assert_eq!(exact_add(whole, tiny), None);

        let whole = Decimal::MAX;
        assert_eq!(exact_add(whole, Decimal::ONE), None);
    }

    #[test]
    fn trailing_zeros_are_shed_to_make_a_sum_fit() {
        let whole = decimal("79228162514264337593543950");
        let zero_fraction = decimal("0.0000");
        assert_eq!(exact_add(whole, zero_fraction), Some(whole));
    }

    #[test]
    fn products_are_exact_or_rejected() {
        assert_eq!(
            exact_mul(decimal("2.00"), decimal("2")).map(|v| v.to_string()),
            Some("4.00".to_string())
        );
        assert_eq!(
            exact_mul(decimal("1.5"), decimal("2")).map(|v| v.to_string()),
            Some("3.0".to_string())
        );

        // 1218.7654321292345677641234566652 has 32 significant digits.
        assert_eq!(
            exact_mul(decimal("0.0000001234"), decimal("9876543210.123456789012345678")),
            None
        );
    }

    #[test]
    fn wei_scale_sums_times_small_prices_stay_exact() {
        let sum = decimal("1234.567890123456789012");
        let price = decimal("0.000042");
        let product = exact_mul(sum, price).expect("fits");
        assert_eq!(product.to_string(), "0.051851851385185185138504");
        assert_eq!(Decimal::from_str("0.051851851385185185138504").ok(), Some(product));

        let too_precise = decimal("0.0000000123456789");
        assert_eq!(exact_mul(sum, too_precise), None);
    }

    #[test]
    fn zero_operands_collapse_to_zero() {
        assert_eq!(exact_mul(Decimal::ZERO, decimal("3.5")), Some(Decimal::ZERO));
        assert_eq!(
            exact_mul(decimal("0.0"), decimal("3.5")).map(|v| v.to_string()),
            Some("0".to_string())
        );
    }
}
