//! CSV sources shared by the token and address books.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use alloy_primitives::Address;
use csv::{ReaderBuilder, StringRecord};

/// Read every row of `reader` that has exactly `width` fields.
///
/// A parse error stops reading and keeps the rows read so far.
pub(crate) fn read_rows<R: Read>(name: &str, reader: R, has_headers: bool, width: usize) -> Vec<StringRecord> {
    let mut csv = ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv.records() {
        match record {
            Ok(row) if row.len() == width => rows.push(row),
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(source = name, error = %e, "Stopped reading master data file");
                break;
            }
        }
    }
    rows
}

/// Rows of the local cache file at `path`, or nothing if it does not exist yet.
pub(crate) fn read_cache(path: &Path, width: usize) -> Vec<StringRecord> {
    let name = path.display().to_string();
    match File::open(path) {
        Ok(file) => read_rows(&name, file, true, width),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::trace!(path = %name, "No local master data cache yet");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(path = %name, error = %e, "Local master data cache not read");
            Vec::new()
        }
    }
}

/// Parse a `0x`-prefixed 20-byte hex address. Anything else is rejected.
pub(crate) fn parse_address(s: &str) -> Option<Address> {
    let s = s.trim();
    if s.len() != 42 || !s.starts_with("0x") {
        return None;
    }
    Address::from_str(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_of_wrong_width_are_skipped() {
        let data = "a,b,c\n1,2,3\n1,2\n4,5,6\n";
        let rows = read_rows("test", data.as_bytes(), true, 3);
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "4");
    }

    #[test]
    fn headerless_rows() {
        let rows = read_rows("test", "1,x,y\n".as_bytes(), false, 3);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn address_parsing() {
        assert!(parse_address("0x71660c4005BA85c37ccec55d0C4493E66Fe775d3").is_some());
        assert!(parse_address(" 0x71660c4005ba85c37ccec55d0c4493e66fe775d3 ").is_some());
        assert!(parse_address("0xThisIsNotAValidToken").is_none());
        assert!(parse_address("71660c4005BA85c37ccec55d0C4493E66Fe775d3").is_none());
        assert!(parse_address("0xZZ660c4005BA85c37ccec55d0C4493E66Fe775d3").is_none());
    }

    #[test]
    fn missing_cache_is_empty() {
        let path = std::env::temp_dir().join("tokengraph-no-such-cache.csv");
        assert!(read_cache(&path, 5).is_empty());
    }
}
