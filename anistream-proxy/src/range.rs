//! Byte-range math for sources served outside plain HTTP.
//!
//! Vault reads stream raw bytes with no range headers of their own, so the
//! serving side parses the client's `Range` header here and computes
//! `Content-Range` / `Content-Length` locally from the file size it
//! already knows.

/// A parsed `Range: bytes=a-b` / `bytes=a-` header. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Parse the single-range forms `bytes=a-b` and `bytes=a-`. Multi-range
    /// and suffix forms are not served.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.strip_prefix("bytes=")?.trim();
        if spec.contains(',') {
            return None;
        }
        let (start, end) = spec.split_once('-')?;
        let start: u64 = start.trim().parse().ok()?;
        let end = match end.trim() {
            "" => None,
            e => {
                let e: u64 = e.parse().ok()?;
                if e < start {
                    return None;
                }
                Some(e)
            }
        };
        Some(Self { start, end })
    }

    /// Clamp against the file's total size, yielding concrete inclusive
    /// offsets. `None` when the range starts past the end of the file.
    #[must_use]
    pub fn resolve(&self, total_size: u64) -> Option<(u64, u64)> {
        if self.start >= total_size {
            return None;
        }
        let last = total_size - 1;
        Some((self.start, self.end.map_or(last, |e| e.min(last))))
    }
}

/// `Content-Range` value for a satisfied range.
#[must_use]
pub fn content_range(start: u64, end: u64, total_size: u64) -> String {
    format!("bytes {start}-{end}/{total_size}")
}

/// `Content-Length` for inclusive offsets.
#[must_use]
pub const fn content_length(start: u64, end: u64) -> u64 {
    end - start + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bounded_and_open_forms() {
        assert_eq!(
            ByteRange::parse("bytes=100-199"),
            Some(ByteRange {
                start: 100,
                end: Some(199)
            })
        );
        assert_eq!(
            ByteRange::parse("bytes=500-"),
            Some(ByteRange {
                start: 500,
                end: None
            })
        );
    }

    #[test]
    fn rejects_malformed_and_multi_range() {
        assert_eq!(ByteRange::parse("bytes=-500"), None);
        assert_eq!(ByteRange::parse("bytes=0-99,200-299"), None);
        assert_eq!(ByteRange::parse("items=0-1"), None);
        assert_eq!(ByteRange::parse("bytes=200-100"), None);
    }

    #[test]
    fn resolve_clamps_to_file_size() {
        let range = ByteRange {
            start: 900,
            end: Some(5000),
        };
        assert_eq!(range.resolve(1000), Some((900, 999)));

        let open = ByteRange {
            start: 0,
            end: None,
        };
        assert_eq!(open.resolve(1000), Some((0, 999)));
    }

    #[test]
    fn resolve_rejects_start_past_eof() {
        let range = ByteRange {
            start: 1000,
            end: None,
        };
        assert_eq!(range.resolve(1000), None);
    }

    #[test]
    fn header_math_for_a_window() {
        assert_eq!(content_range(100, 199, 1000), "bytes 100-199/1000");
        assert_eq!(content_length(100, 199), 100);
    }
}
