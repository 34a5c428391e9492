// src/utils/precision.rs
use rust_decimal::Decimal;

/// Rounds a quantity DOWN to the nearest multiple of `step_size`.
/// Example: amount=10.999, step=1.0 -> 10.0
///
/// `None` when the step count does not fit in a `Decimal`.
pub fn normalize_quantity(amount: Decimal, step_size: Decimal) -> Option<Decimal> {
    if step_size.is_zero() {
        return Some(amount);
    }
    let steps = amount.checked_div(step_size)?.floor();
    Some(steps.checked_mul(step_size)?.normalize())
}

/// Quantity to buy when committing `allocation` of `buying_power` at `price`.
///
/// Returns `None` when the price is not positive, the arithmetic overflows,
/// or the result rounds to nothing, so a non-positive quantity can never be
/// submitted.
pub fn buy_quantity(
    buying_power: Decimal,
    allocation: Decimal,
    price: Decimal,
    step_size: Decimal,
) -> Option<Decimal> {
    if price <= Decimal::ZERO {
        return None;
    }
    let notional = buying_power.checked_mul(allocation)?;
    let qty = normalize_quantity(notional.checked_div(price)?, step_size)?;
    (qty > Decimal::ZERO).then_some(qty)
}
