//! Constant-time comparison for sensitive values (keys, recipient ids, tags).
//! Use for all comparisons that could leak through timing side channels.

use subtle::ConstantTimeEq;

/// Constant-time equality for 32-byte arrays (e.g. keys, recipient ids).
#[inline(always)]
pub fn eq_32(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_32() {
        let a = [7u8; 32];
        let mut b = [7u8; 32];
        assert!(eq_32(&a, &b));
        b[31] ^= 1;
        assert!(!eq_32(&a, &b));
    }
}
