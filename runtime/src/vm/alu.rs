//! Word arithmetic shared by both machines.

use crate::bytecode::Word;
use crate::vm::{VMError, VMResult};

pub(crate) type BinaryFn = fn(Word, Word) -> VMResult<Word>;

pub(crate) fn add(a: Word, b: Word) -> VMResult<Word> {
    Ok(a.wrapping_add(b))
}

pub(crate) fn sub(a: Word, b: Word) -> VMResult<Word> {
    Ok(a.wrapping_sub(b))
}

pub(crate) fn mul(a: Word, b: Word) -> VMResult<Word> {
    Ok(a.wrapping_mul(b))
}

pub(crate) fn div(a: Word, b: Word) -> VMResult<Word> {
    if b == 0 {
        return Err(VMError::DivisionByZero);
    }
    Ok(a.wrapping_div(b))
}

pub(crate) fn rem(a: Word, b: Word) -> VMResult<Word> {
    if b == 0 {
        return Err(VMError::DivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

pub(crate) fn and(a: Word, b: Word) -> VMResult<Word> {
    Ok(a & b)
}

pub(crate) fn or(a: Word, b: Word) -> VMResult<Word> {
    Ok(a | b)
}

pub(crate) fn xor(a: Word, b: Word) -> VMResult<Word> {
    Ok(a ^ b)
}

pub(crate) fn gt(a: Word, b: Word) -> VMResult<Word> {
    Ok((a > b) as Word)
}

pub(crate) fn lt(a: Word, b: Word) -> VMResult<Word> {
    Ok((a < b) as Word)
}

pub(crate) fn eq(a: Word, b: Word) -> VMResult<Word> {
    Ok((a == b) as Word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_arithmetic() {
        assert_eq!(add(Word::MAX, 1).unwrap(), Word::MIN);
        assert_eq!(sub(Word::MIN, 1).unwrap(), Word::MAX);
        assert_eq!(mul(1 << 30, 4).unwrap(), 0);
        assert_eq!(div(Word::MIN, -1).unwrap(), Word::MIN);
        assert_eq!(rem(Word::MIN, -1).unwrap(), 0);
    }

    #[test]
    fn test_division_truncates_toward_zero() {
        assert_eq!(div(-7, 2).unwrap(), -3);
        assert_eq!(rem(-7, 2).unwrap(), -1);
        assert_eq!(rem(7, -2).unwrap(), 1);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(div(1, 0), Err(VMError::DivisionByZero));
        assert_eq!(rem(1, 0), Err(VMError::DivisionByZero));
    }

    #[test]
    fn test_comparisons_yield_zero_or_one() {
        assert_eq!(gt(3, 2).unwrap(), 1);
        assert_eq!(gt(2, 3).unwrap(), 0);
        assert_eq!(lt(2, 3).unwrap(), 1);
        assert_eq!(eq(4, 4).unwrap(), 1);
        assert_eq!(eq(4, 5).unwrap(), 0);
    }
}
