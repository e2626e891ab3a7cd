//! Delimiter sniffing

/// Candidate delimiters in tie-break priority order
pub const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Pick the candidate occurring most often in `line`.
///
/// Ties go to the earlier candidate; a line without any candidate yields `,`.
pub fn detect_delimiter(line: &str) -> u8 {
    let mut best = CANDIDATES[0];
    let mut best_count = 0;
    for candidate in CANDIDATES {
        let count = line.bytes().filter(|b| *b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}
