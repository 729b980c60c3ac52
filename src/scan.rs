//! 16-byte chunk classification for the splitter fast path.
//!
//! A chunk is "clean" when it contains none of the three characters the
//! splitter's state machine acts on (`<`, `>`, `/`); for a clean chunk the
//! only thing left to account for is its newline count. Inside long opening
//! tags almost every chunk is clean, which is what makes the fast path pay.
//!
//! The SSE2 path and the scalar path must agree bit-for-bit; the property
//! test at the bottom pins that.

use once_cell::sync::Lazy;

pub const CHUNK_WIDTH: usize = 16;

/// Returns the newline count iff the chunk contains none of `<`, `>`, `/`.
#[inline]
pub fn classify(chunk: &[u8; CHUNK_WIDTH]) -> Option<u32> {
    #[cfg(target_arch = "x86_64")]
    {
        if *SSE2_AVAILABLE {
            // SAFETY: guarded by the runtime feature probe above.
            return unsafe { classify_sse2(chunk) };
        }
    }
    classify_scalar(chunk)
}

pub fn classify_scalar(chunk: &[u8; CHUNK_WIDTH]) -> Option<u32> {
    let mut newlines = 0u32;
    for &byte in chunk {
        match byte {
            b'<' | b'>' | b'/' => return None,
            b'\n' => newlines += 1,
            _ => {}
        }
    }
    Some(newlines)
}

#[cfg(target_arch = "x86_64")]
static SSE2_AVAILABLE: Lazy<bool> = Lazy::new(|| std::is_x86_feature_detected!("sse2"));

#[cfg(not(target_arch = "x86_64"))]
#[allow(dead_code)]
static SSE2_AVAILABLE: Lazy<bool> = Lazy::new(|| false);

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn classify_sse2(chunk: &[u8; CHUNK_WIDTH]) -> Option<u32> {
    use std::arch::x86_64::*;

    let data = _mm_loadu_si128(chunk.as_ptr() as *const __m128i);
    let lt = _mm_cmpeq_epi8(data, _mm_set1_epi8(b'<' as i8));
    let gt = _mm_cmpeq_epi8(data, _mm_set1_epi8(b'>' as i8));
    let slash = _mm_cmpeq_epi8(data, _mm_set1_epi8(b'/' as i8));
    let lf = _mm_cmpeq_epi8(data, _mm_set1_epi8(b'\n' as i8));

    let sentinel_mask = _mm_movemask_epi8(_mm_or_si128(_mm_or_si128(lt, gt), slash));
    if sentinel_mask != 0 {
        return None;
    }
    Some((_mm_movemask_epi8(lf) as u32).count_ones())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_chunk_counts_newlines() {
        let chunk = *b"attr=\"1\" b=\"2\"\n ";
        assert_eq!(classify(&chunk), Some(1));
    }

    #[test]
    fn each_sentinel_disqualifies() {
        for sentinel in [b'<', b'>', b'/'] {
            for pos in 0..CHUNK_WIDTH {
                let mut chunk = [b'a'; CHUNK_WIDTH];
                chunk[pos] = sentinel;
                assert_eq!(classify(&chunk), None, "sentinel {sentinel} at {pos}");
            }
        }
    }

    #[test]
    fn all_newlines() {
        assert_eq!(classify(&[b'\n'; CHUNK_WIDTH]), Some(16));
    }

    #[test]
    fn simd_and_scalar_agree() {
        // Cheap deterministic byte generator; no external randomness needed.
        let mut seed = 0x2545f491_4f6cdd1du64;
        for _ in 0..4096 {
            let mut chunk = [0u8; CHUNK_WIDTH];
            for byte in chunk.iter_mut() {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                // Bias toward the interesting characters.
                *byte = match (seed >> 33) % 8 {
                    0 => b'<',
                    1 => b'>',
                    2 => b'/',
                    3 => b'\n',
                    _ => (seed >> 41) as u8,
                };
            }
            assert_eq!(classify(&chunk), classify_scalar(&chunk), "chunk {chunk:?}");
        }
    }
}
