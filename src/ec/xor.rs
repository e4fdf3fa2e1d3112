//! XOR Parity Codec
//!
//! Single-parity codec (RAID5-style). Word size is irrelevant for XOR and
//! ignored.

use super::{check_erasures, check_line, ErasureCodec, WordSize};
use crate::error::{Error, Result};

/// Erasure codec computing one parity stripe as the XOR of all data stripes.
#[derive(Debug, Default, Clone, Copy)]
pub struct XorCodec;

impl XorCodec {
    pub fn new() -> Self {
        Self
    }
}

fn require_single_parity(m: usize) -> Result<()> {
    if m != 1 {
        return Err(Error::InvalidEcConfig(format!(
            "XOR parity supports exactly one parity stripe, got {}",
            m
        )));
    }
    Ok(())
}

fn xor_into(acc: &mut [u8], src: &[u8]) {
    for (a, s) in acc.iter_mut().zip(src) {
        *a ^= s;
    }
}

impl ErasureCodec for XorCodec {
    fn name(&self) -> &'static str {
        "xor"
    }

    fn encode(
        &self,
        k: usize,
        m: usize,
        _w: WordSize,
        data: &[&[u8]],
        coding: &mut [&mut [u8]],
    ) -> Result<()> {
        require_single_parity(m)?;
        check_line(k, m, data, coding)?;

        let parity = &mut *coding[0];
        parity.copy_from_slice(data[0]);
        for stripe in &data[1..] {
            xor_into(parity, stripe);
        }
        Ok(())
    }

    fn decode(
        &self,
        k: usize,
        m: usize,
        _w: WordSize,
        data: &mut [&mut [u8]],
        coding: &mut [&mut [u8]],
        erasures: &[usize],
    ) -> Result<()> {
        require_single_parity(m)?;
        let stripe_len = check_line(k, m, data, coding)?;
        check_erasures(k, m, erasures)?;

        let Some(&lost) = erasures.first() else {
            return Ok(());
        };

        // XOR of every surviving slot (data and parity) yields the lost one.
        let mut rebuilt = vec![0u8; stripe_len];
        for (slot, stripe) in data.iter().chain(coding.iter()).enumerate() {
            if slot != lost {
                xor_into(&mut rebuilt, stripe);
            }
        }

        if lost < k {
            data[lost].copy_from_slice(&rebuilt);
        } else {
            coding[0].copy_from_slice(&rebuilt);
        }
        Ok(())
    }
}
