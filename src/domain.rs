//! Deterministic generation of the claimable domain: the first `n` primes.
//!
//! The sieve bound comes from the prime-counting asymptotic
//! `n (ln n + ln ln n)`, which bounds the `n`-th prime from above for `n >= 6`.
//! If a bound ever falls short the generator widens it rather than returning
//! fewer values.

use log::debug;

use crate::error::{ClaimError, Result};

/// Bound used for very small domains, where the asymptotic estimate is unsafe.
pub const SMALL_BOUND: usize = 30;

const MAX_WIDENINGS: usize = 8;

/// Estimates a sieve limit that contains at least `n` primes.
pub fn prime_bound(n: usize) -> usize {
    if n < 6 {
        return SMALL_BOUND;
    }
    let n_f = n as f64;
    (n_f * (n_f.ln() + n_f.ln().ln())) as usize
}

/// Sieves `[2, limit]` and returns the first `n` primes in ascending order.
///
/// Fails with [`ClaimError::InsufficientRange`] when the range holds fewer
/// than `n` primes.
pub fn sieve_primes(n: usize, limit: usize) -> Result<Vec<u64>> {
    let mut composite = vec![false; limit + 1];
    let mut primes = Vec::with_capacity(n);
    let mut p = 2usize;
    while p * p <= limit {
        if !composite[p] {
            let mut multiple = p * p;
            while multiple <= limit {
                composite[multiple] = true;
                multiple += p;
            }
        }
        p += 1;
    }
    for (candidate, &is_composite) in composite.iter().enumerate().skip(2) {
        if primes.len() == n {
            break;
        }
        if !is_composite {
            primes.push(candidate as u64);
        }
    }
    if primes.len() < n {
        return Err(ClaimError::InsufficientRange {
            requested: n,
            found: primes.len(),
            limit,
        });
    }
    Ok(primes)
}

/// Returns the first `n` primes.
///
/// The same `n` always yields the same sequence.  When the estimated bound is
/// too small the bound is doubled and the sieve rerun; after repeated
/// shortfalls the last [`ClaimError::InsufficientRange`] is returned.
pub fn generate_primes(n: usize) -> Result<Vec<u64>> {
    sieve_widening(n, prime_bound(n))
}

fn sieve_widening(n: usize, initial_limit: usize) -> Result<Vec<u64>> {
    let mut limit = initial_limit;
    let mut attempt = 0;
    loop {
        match sieve_primes(n, limit) {
            Ok(primes) => {
                debug!("generated {n} primes with sieve bound {limit}");
                return Ok(primes);
            }
            Err(err @ ClaimError::InsufficientRange { .. }) if attempt < MAX_WIDENINGS => {
                debug!("{err}; widening sieve bound");
                limit = limit.saturating_mul(2).max(SMALL_BOUND);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
