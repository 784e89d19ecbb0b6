//! SafeWriter: the optional write-then-read-back verification wrapper
//! (spec §4.9).
//!
//! Nothing in the teacher crate self-verifies a write this way - `zenit_lvl`
//! trusts its own `NodeWriter` unconditionally - so this module has no
//! direct teacher counterpart; it's grounded on the spec's own state-machine
//! description (`Attempt(i) -> Verify -> (Ok | Attempt(i+1))`) and built the
//! way the rest of this crate is: free functions over `Read`/`Write`,
//! `thiserror` for the one new failure mode, `log` for the loud warning on
//! the broken-bundle escape hatch.
//!
//! Open Question resolution (spec §9 / DESIGN.md #4): the "slower reference
//! writer/reader" the spec allows for the last two attempts is the same
//! [`crate::writer::write`]/[`crate::reader::read`] pair as the first three;
//! this crate has one bundle codec, not two independently maintained ones.
//! The five-attempt shape and the "fast vs reference" framing are preserved
//! so the retry *policy* still matches the spec even though both phases
//! call through the same implementation.

use std::io::Cursor;

use crate::binary::StoreHandles;
use crate::bundle::Bundle;
use crate::config::CodecConfig;
use crate::error::EncodeError;
use crate::{reader, writer};

/// Number of attempts using the fast writer before escalating (spec §4.9:
/// "Retry with the fast writer up to three times").
const FAST_ATTEMPTS: u32 = 3;
/// Number of attempts using the (here, identical) reference writer after
/// the fast attempts are exhausted (spec §4.9: "two more attempts").
const REFERENCE_ATTEMPTS: u32 = 2;

/// Serializes `bundle`, re-reads it with the reference reader, and checks
/// for semantic equality; retries per spec §4.9 on mismatch. Returns the
/// bytes of whichever attempt finally verified - or, if `allow_broken_bundles`
/// is set and every attempt still mismatches, the bytes of the very last
/// attempt regardless.
pub fn write_verified(
    bundle: &Bundle,
    config: &CodecConfig,
    stores: &mut StoreHandles<'_>,
) -> Result<Vec<u8>, EncodeError> {
    let total_attempts = FAST_ATTEMPTS + REFERENCE_ATTEMPTS;
    let mut last_attempt: Option<Vec<u8>> = None;

    for attempt in 0..total_attempts {
        let phase = if attempt < FAST_ATTEMPTS { "fast" } else { "reference" };

        let mut buf = Vec::new();
        writer::write(&mut buf, bundle, config, stores)?;

        let mut cursor = Cursor::new(buf.clone());
        let verified = match reader::read(&mut cursor, bundle.id, config, None, stores) {
            Ok(read_back) => &read_back == bundle,
            Err(_) => false,
        };

        if verified {
            return Ok(buf);
        }

        log::warn!(
            "SafeWriter: {phase} attempt {} of {total_attempts} for bundle {} failed to round-trip",
            attempt + 1,
            bundle.id
        );
        last_attempt = Some(buf);
    }

    if config.allow_broken_bundles {
        log::warn!(
            "SafeWriter: bundle {} never verified after {total_attempts} attempts; \
             emitting the last attempt anyway because allow_broken_bundles is set",
            bundle.id
        );
        Ok(last_attempt.expect("loop runs at least once"))
    } else {
        Err(EncodeError::Internal(format!(
            "bundle {} failed to round-trip after {total_attempts} SafeWriter attempts",
            bundle.id
        )))
    }
}
