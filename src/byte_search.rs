//! First-byte skip for the marker scanner.
//!
//! While no partial match is pending, the scanner only needs to know where
//! the next candidate first byte sits. SSE2 on x86_64, SWAR elsewhere.

/// Index of the first `needle` in `haystack`.
#[inline]
pub fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: SSE2 is part of the x86_64 baseline; loads stay inside `haystack`.
        unsafe { sse2::find_byte(haystack, needle) }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        swar::find_byte(haystack, needle)
    }
}

#[cfg(target_arch = "x86_64")]
mod sse2 {
    use core::arch::x86_64::{
        __m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
    };

    const LANES: usize = 16;

    #[inline]
    pub unsafe fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
        let wanted = _mm_set1_epi8(needle as i8);
        let ptr = haystack.as_ptr();
        let mut start = 0;

        while start + LANES <= haystack.len() {
            let lanes = _mm_loadu_si128(ptr.add(start).cast::<__m128i>());
            let mask = _mm_movemask_epi8(_mm_cmpeq_epi8(lanes, wanted)) as u32;
            if mask != 0 {
                return Some(start + mask.trailing_zeros() as usize);
            }
            start += LANES;
        }

        haystack[start..]
            .iter()
            .position(|&b| b == needle)
            .map(|i| start + i)
    }
}

#[cfg(any(not(target_arch = "x86_64"), test))]
mod swar {
    const LO: u64 = 0x0101_0101_0101_0101;
    const HI: u64 = 0x8080_8080_8080_8080;

    #[inline]
    pub fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
        let broadcast = LO.wrapping_mul(u64::from(needle));
        let words = haystack.chunks_exact(8);
        let tail = words.remainder();
        let tail_start = haystack.len() - tail.len();

        for (wi, word) in words.enumerate() {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(word);
            let xored = u64::from_le_bytes(bytes) ^ broadcast;
            let zero_lanes = xored.wrapping_sub(LO) & !xored & HI;
            if zero_lanes != 0 {
                return Some(wi * 8 + zero_lanes.trailing_zeros() as usize / 8);
            }
        }

        tail.iter()
            .position(|&b| b == needle)
            .map(|i| tail_start + i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(haystack: &[u8], needle: u8) -> Option<usize> {
        haystack.iter().position(|&b| b == needle)
    }

    #[test]
    fn test_find_byte_matches_naive() {
        let mut data = vec![0x20u8; 100];
        for pos in [0usize, 7, 8, 15, 16, 17, 63, 99] {
            data.fill(0x20);
            data[pos] = b'u';
            assert_eq!(find_byte(&data, b'u'), Some(pos), "pos {}", pos);
            assert_eq!(swar::find_byte(&data, b'u'), naive(&data, b'u'));
        }
    }

    #[test]
    fn test_first_of_many() {
        let data = b"xxxxxxxxxxxxxxxxxxxxuxxxxxxxxxxxxxxu";
        assert_eq!(find_byte(data, b'u'), Some(20));
        assert_eq!(swar::find_byte(data, b'u'), Some(20));
    }

    #[test]
    fn test_not_found_and_empty() {
        assert_eq!(find_byte(&[], b'u'), None);
        assert_eq!(find_byte(&[0u8; 33], b'u'), None);
        assert_eq!(swar::find_byte(&[0u8; 33], b'u'), None);
    }

    #[test]
    fn test_high_bit_bytes() {
        // SWAR borrow propagation must not report 0x80-range neighbours
        let mut data = vec![0x80u8; 40];
        data[37] = 0x75;
        assert_eq!(find_byte(&data, 0x75), Some(37));
        assert_eq!(swar::find_byte(&data, 0x75), Some(37));
    }
}
