//! Checked uint256 arithmetic and partial-amount helpers.
//!
//! Overflow, underflow and division by zero surface as
//! `Uint256BinOpError` instead of wrapping.

use alloy_primitives::U256;

use crate::errors::{BinOp, ZeroExError};

pub fn safe_add(a: U256, b: U256) -> Result<U256, ZeroExError> {
    a.checked_add(b).ok_or_else(|| ZeroExError::bin_op(BinOp::Addition, a, b))
}

pub fn safe_sub(a: U256, b: U256) -> Result<U256, ZeroExError> {
    a.checked_sub(b).ok_or_else(|| ZeroExError::bin_op(BinOp::Subtraction, a, b))
}

pub fn safe_mul(a: U256, b: U256) -> Result<U256, ZeroExError> {
    a.checked_mul(b).ok_or_else(|| ZeroExError::bin_op(BinOp::Multiplication, a, b))
}

pub fn safe_div(a: U256, b: U256) -> Result<U256, ZeroExError> {
    a.checked_div(b).ok_or_else(|| ZeroExError::bin_op(BinOp::Division, a, b))
}

/// `floor(numerator * target / denominator)`.
pub fn get_partial_amount_floor(
    numerator: U256,
    denominator: U256,
    target: U256,
) -> Result<U256, ZeroExError> {
    safe_div(safe_mul(numerator, target)?, denominator)
}

/// `ceil(numerator * target / denominator)`.
pub fn get_partial_amount_ceil(
    numerator: U256,
    denominator: U256,
    target: U256,
) -> Result<U256, ZeroExError> {
    let product = safe_mul(numerator, target)?;
    if denominator.is_zero() {
        return Err(ZeroExError::bin_op(BinOp::Division, product, denominator));
    }
    // (a + b - 1) / b
    safe_div(safe_add(product, denominator - U256::from(1u64))?, denominator)
}
