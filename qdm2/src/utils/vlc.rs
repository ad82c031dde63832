//! Canonical variable-length code tables.
//!
//! Codes are assigned canonically from per-symbol lengths: symbols are
//! ordered by code length (ties keep table order) and receive consecutive
//! code values, left-shifted whenever the length grows. Decoding uses a
//! direct table indexed by the next `lookup_bits` bits; codes longer than
//! that dispatch into a second-level subtable.

use std::sync::LazyLock;

use log::debug;

use crate::utils::errors::VlcError;
use crate::utils::tables::{
    BAND_RUN_LENGTHS, BAND_RUN_SYMBOLS, NOISE_HIGH_LENGTHS, NOISE_HIGH_SYMBOLS, NOISE_LOW_BANDS,
    NOISE_LOW_LENGTHS, NOISE_LOW_SYMBOLS, TONE_COMMAND_LENGTHS, TONE_COMMAND_SYMBOLS,
    TONE_DURATION_LENGTHS, TONE_DURATION_SYMBOLS, TONE_LEVEL_LENGTHS, TONE_LEVEL_SYMBOLS,
};

const MAX_CODE_LEN: u8 = 24;

/// One slot of the lookup table.
///
/// A positive length marks a leaf holding a symbol; a negative length marks a
/// pointer to a subtable of `-len` bits starting at `value`; zero is unused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VlcEntry {
    value: i32,
    len: i8,
}

impl VlcEntry {
    const INVALID: Self = Self { value: 0, len: 0 };

    fn leaf(value: i32, len: u32) -> Self {
        Self {
            value,
            len: len as i8,
        }
    }

    fn subtable(offset: usize, bits: u32) -> Self {
        Self {
            value: offset as i32,
            len: -(bits as i8),
        }
    }

    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.len > 0
    }

    /// Code length of a leaf, in bits.
    #[inline(always)]
    pub fn code_len(&self) -> u32 {
        self.len.max(0) as u32
    }

    #[inline(always)]
    pub fn value(&self) -> i32 {
        self.value
    }

    #[inline(always)]
    pub fn subtable_bits(&self) -> Option<u32> {
        (self.len < 0).then(|| (-self.len) as u32)
    }
}

/// A code assigned to one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlcCode {
    pub symbol: i32,
    pub code: u32,
    pub len: u32,
}

#[derive(Debug)]
pub struct Vlc {
    name: &'static str,
    lookup_bits: u32,
    max_len: u32,
    table: Vec<VlcEntry>,
    codes: Vec<VlcCode>,
}

impl Vlc {
    /// Direct lookup width cap; longer codes go through a subtable.
    pub const MAX_LOOKUP_BITS: u32 = 6;

    pub fn from_lengths(
        name: &'static str,
        lengths: &[u8],
        symbols: &[i16],
    ) -> Result<Self, VlcError> {
        Self::with_lookup_bits(name, lengths, symbols, Self::MAX_LOOKUP_BITS)
    }

    pub fn with_lookup_bits(
        name: &'static str,
        lengths: &[u8],
        symbols: &[i16],
        max_lookup_bits: u32,
    ) -> Result<Self, VlcError> {
        if lengths.len() != symbols.len() {
            return Err(VlcError::LengthSymbolMismatch {
                table: name,
                lengths: lengths.len(),
                symbols: symbols.len(),
            });
        }

        let codes = assign_codes(name, lengths, symbols)?;
        let max_len = codes.iter().map(|c| c.len).max().unwrap_or(0);
        let lookup_bits = max_len.min(max_lookup_bits.max(1));

        let mut table = vec![VlcEntry::INVALID; 1 << lookup_bits];

        for c in codes.iter().filter(|c| c.len <= lookup_bits) {
            let shift = lookup_bits - c.len;
            let start = (c.code << shift) as usize;
            table[start..start + (1 << shift)].fill(VlcEntry::leaf(c.symbol, c.len));
        }

        // Second level: one subtable per distinct prefix of the long codes.
        let long_codes = codes
            .iter()
            .filter(|c| c.len > lookup_bits)
            .collect::<Vec<_>>();

        let mut prefixes = long_codes
            .iter()
            .map(|c| c.code >> (c.len - lookup_bits))
            .collect::<Vec<_>>();
        prefixes.sort_unstable();
        prefixes.dedup();

        for prefix in prefixes {
            let group = long_codes
                .iter()
                .filter(|c| c.code >> (c.len - lookup_bits) == prefix)
                .collect::<Vec<_>>();
            let sub_bits = group
                .iter()
                .map(|c| c.len - lookup_bits)
                .max()
                .unwrap_or(1);

            let offset = table.len();
            table.resize(offset + (1 << sub_bits), VlcEntry::INVALID);
            table[prefix as usize] = VlcEntry::subtable(offset, sub_bits);

            for c in group {
                let extra = c.len - lookup_bits;
                let suffix = c.code & ((1 << extra) - 1);
                let shift = sub_bits - extra;
                let start = offset + ((suffix << shift) as usize);
                table[start..start + (1 << shift)].fill(VlcEntry::leaf(c.symbol, extra));
            }
        }

        debug!(
            "VLC table {name}: {} codes, max length {max_len}, {} lookup slots",
            codes.len(),
            table.len()
        );

        Ok(Self {
            name,
            lookup_bits,
            max_len,
            table,
            codes,
        })
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline(always)]
    pub fn lookup_bits(&self) -> u32 {
        self.lookup_bits
    }

    pub fn max_len(&self) -> u32 {
        self.max_len
    }

    #[inline(always)]
    pub fn entry(&self, index: usize) -> VlcEntry {
        self.table.get(index).copied().unwrap_or(VlcEntry::INVALID)
    }

    pub fn codes(&self) -> &[VlcCode] {
        &self.codes
    }

    /// Code and length for `symbol`, if the table contains it.
    pub fn encode(&self, symbol: i32) -> Option<(u32, u32)> {
        self.codes
            .iter()
            .find(|c| c.symbol == symbol)
            .map(|c| (c.code, c.len))
    }
}

fn assign_codes(
    name: &'static str,
    lengths: &[u8],
    symbols: &[i16],
) -> Result<Vec<VlcCode>, VlcError> {
    let mut order = (0..lengths.len())
        .filter(|&i| lengths[i] != 0)
        .collect::<Vec<_>>();
    if order.is_empty() {
        return Err(VlcError::Empty { table: name });
    }
    order.sort_by_key(|&i| lengths[i]);

    let mut codes = Vec::with_capacity(order.len());
    let mut code = 0u32;
    let mut prev_len = lengths[order[0]];

    for i in order {
        let len = lengths[i];
        if len > MAX_CODE_LEN {
            return Err(VlcError::CodeTooLong { table: name, len });
        }

        code <<= len - prev_len;
        prev_len = len;

        if code >= 1 << len {
            return Err(VlcError::Oversubscribed { table: name });
        }

        codes.push(VlcCode {
            symbol: symbols[i] as i32,
            code,
            len: len as u32,
        });
        code += 1;
    }

    Ok(codes)
}

/// The process-wide set of code tables.
#[derive(Debug)]
pub struct VlcLibrary {
    pub noise_low: Vlc,
    pub noise_high: Vlc,
    pub tone_command: Vlc,
    pub band_run: Vlc,
    pub tone_level: Vlc,
    pub tone_duration: Vlc,
}

static LIBRARY: LazyLock<VlcLibrary> = LazyLock::new(VlcLibrary::build);

/// Returns the shared tables, building them on first use.
pub fn vlc_library() -> &'static VlcLibrary {
    &LIBRARY
}

impl VlcLibrary {
    fn build() -> Self {
        Self {
            noise_low: embedded("noise_low", &NOISE_LOW_LENGTHS, &NOISE_LOW_SYMBOLS),
            noise_high: embedded("noise_high", &NOISE_HIGH_LENGTHS, &NOISE_HIGH_SYMBOLS),
            tone_command: embedded("tone_command", &TONE_COMMAND_LENGTHS, &TONE_COMMAND_SYMBOLS),
            band_run: embedded("band_run", &BAND_RUN_LENGTHS, &BAND_RUN_SYMBOLS),
            tone_level: embedded("tone_level", &TONE_LEVEL_LENGTHS, &TONE_LEVEL_SYMBOLS),
            tone_duration: embedded(
                "tone_duration",
                &TONE_DURATION_LENGTHS,
                &TONE_DURATION_SYMBOLS,
            ),
        }
    }

    /// Noise delta table for a band.
    #[inline(always)]
    pub fn noise_delta(&self, band: usize) -> &Vlc {
        if band < NOISE_LOW_BANDS {
            &self.noise_low
        } else {
            &self.noise_high
        }
    }

    pub fn tables(&self) -> [&Vlc; 6] {
        [
            &self.noise_low,
            &self.noise_high,
            &self.tone_command,
            &self.band_run,
            &self.tone_level,
            &self.tone_duration,
        ]
    }
}

fn embedded(name: &'static str, lengths: &[u8], symbols: &[i16]) -> Vlc {
    Vlc::from_lengths(name, lengths, symbols)
        .unwrap_or_else(|e| panic!("embedded VLC table is not a prefix code: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bitstream_io::BsIoSliceReader;
    use crate::utils::errors::ErrorKind;
    use crate::utils::testing::BitWriter;

    fn roundtrip_all(vlc: &Vlc) {
        for c in vlc.codes() {
            let mut writer = BitWriter::default();
            writer.put_vlc(vlc, c.symbol);
            // trailing junk must not disturb the decode
            writer.put(0b1011, 4);
            let bytes = writer.into_bytes();

            let mut reader = BsIoSliceReader::from_slice(&bytes);
            let (symbol, len) = reader.get_vlc(vlc).unwrap();
            assert_eq!(symbol, c.symbol, "{}", vlc.name());
            assert_eq!(len, c.len, "{}", vlc.name());
            assert_eq!(reader.position(), c.len as u64);
        }
    }

    #[test]
    fn every_symbol_roundtrips() {
        for vlc in vlc_library().tables() {
            roundtrip_all(vlc);
        }
    }

    #[test]
    fn codes_are_prefix_free() {
        for vlc in vlc_library().tables() {
            let codes = vlc.codes();
            for (i, a) in codes.iter().enumerate() {
                for b in &codes[i + 1..] {
                    let (short, long) = if a.len <= b.len { (a, b) } else { (b, a) };
                    assert_ne!(
                        long.code >> (long.len - short.len),
                        short.code,
                        "{}: {:?} is a prefix of {:?}",
                        vlc.name(),
                        short,
                        long
                    );
                }
            }
        }
    }

    #[test]
    fn canonical_assignment() {
        let vlc = &vlc_library().tone_command;
        // add (len 1) = 0, end (len 2) = 10, refresh = 110, delete = 111
        assert_eq!(vlc.encode(1), Some((0b0, 1)));
        assert_eq!(vlc.encode(0), Some((0b10, 2)));
        assert_eq!(vlc.encode(2), Some((0b110, 3)));
        assert_eq!(vlc.encode(3), Some((0b111, 3)));
        assert_eq!(vlc.encode(4), None);
    }

    #[test]
    fn long_codes_use_subtables() {
        let vlc = &vlc_library().band_run;
        assert_eq!(vlc.max_len(), 8);
        assert_eq!(vlc.lookup_bits(), Vlc::MAX_LOOKUP_BITS);
        assert!(vlc.codes().iter().any(|c| c.len > vlc.lookup_bits()));
        roundtrip_all(vlc);

        let narrow =
            Vlc::with_lookup_bits("narrow", &TONE_LEVEL_LENGTHS, &TONE_LEVEL_SYMBOLS, 2).unwrap();
        assert_eq!(narrow.lookup_bits(), 2);
        roundtrip_all(&narrow);
    }

    #[test]
    fn incomplete_code_reports_invalid() {
        // 0 -> 5, 10 -> 7; the prefix 11 is unassigned.
        let vlc = Vlc::from_lengths("partial", &[1, 2], &[5, 7]).unwrap();
        let mut reader = BsIoSliceReader::from_slice(&[0b1100_0000]);
        let err = reader.get_vlc(&vlc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCode);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn rejects_bad_length_sets() {
        assert_eq!(
            Vlc::from_lengths("over", &[1, 1, 1], &[0, 1, 2]).unwrap_err(),
            VlcError::Oversubscribed { table: "over" }
        );
        assert!(matches!(
            Vlc::from_lengths("mismatch", &[1, 1], &[0]),
            Err(VlcError::LengthSymbolMismatch { .. })
        ));
        assert!(matches!(
            Vlc::from_lengths("empty", &[0, 0], &[0, 1]),
            Err(VlcError::Empty { .. })
        ));
    }

    #[test]
    fn truncated_code_at_end_of_buffer() {
        let vlc = &vlc_library().noise_low;
        // 1111 prefixes only 6- and 7-bit codes; just 4 bits remain.
        let mut reader = BsIoSliceReader::from_slice(&[0xFF]);
        reader.skip_n(4).unwrap();
        let err = reader.get_vlc(vlc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn library_is_shared() {
        assert!(std::ptr::eq(vlc_library(), vlc_library()));
        let handles = (0..4)
            .map(|_| std::thread::spawn(|| vlc_library() as *const VlcLibrary as usize))
            .collect::<Vec<_>>();
        let first = vlc_library() as *const VlcLibrary as usize;
        for handle in handles {
            assert_eq!(handle.join().unwrap(), first);
        }
    }
}
