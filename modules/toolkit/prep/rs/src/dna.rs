//! Nucleotide codes stored in the training records: A, C, G, T map to 0-3 regardless of case,
//! everything else maps to 4 and reads back as N.

use gentile_io_rs::records::MAX_NUCLEOTIDE_CODE;

const ALPHABET: &[u8; 5] = b"ACGTN";

#[inline]
pub fn encode(nucleotide: u8) -> u8 {
    match nucleotide {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => MAX_NUCLEOTIDE_CODE,
    }
}

#[inline]
pub fn decode(code: u8) -> u8 {
    ALPHABET[code.min(MAX_NUCLEOTIDE_CODE) as usize]
}

pub fn encode_into(sequence: &[u8], into: &mut Vec<u8>) {
    into.clear();
    into.extend(sequence.iter().map(|x| encode(*x)));
}

pub fn decode_into(codes: &[u8], into: &mut Vec<u8>) {
    into.clear();
    into.extend(codes.iter().map(|x| decode(*x)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut codes = Vec::new();
        encode_into(b"ACGTacgt", &mut codes);
        assert_eq!(codes, vec![0, 1, 2, 3, 0, 1, 2, 3]);

        let mut decoded = Vec::new();
        decode_into(&codes, &mut decoded);
        assert_eq!(decoded, b"ACGTACGT");
    }

    #[test]
    fn test_ambiguous() {
        let mut codes = Vec::new();
        encode_into(b"NnRYKM-.", &mut codes);
        assert!(codes.iter().all(|x| *x == 4));

        let mut decoded = Vec::new();
        decode_into(&codes, &mut decoded);
        assert_eq!(decoded, b"NNNNNNNN");
    }
}
