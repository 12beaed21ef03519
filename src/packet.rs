use crate::DESC_HEADER;
use std::cell::Cell;

const CRLF: &[u8] = b"\r\n";

/// A borrowed view of one received datagram
///
/// The view owns nothing: every accessor returns subslices of the buffer
/// it was constructed over, so nothing parsed here can outlive the
/// datagram. Leading spaces before the first line are skipped at
/// construction time.
///
/// Messages are CRLF-delimited US-ASCII text: a first line identifying
/// the message, then one `Name: value` header per line, then a blank
/// line. Bytes after the blank line are not part of any header.
pub struct Packet<'a> {
    buf: &'a [u8],
    max_line: Cell<Option<usize>>,
}

impl<'a> Packet<'a> {
    /// Wrap a received datagram
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        let start = buf.iter().position(|&b| b != b' ').unwrap_or(buf.len());
        Self {
            buf: &buf[start..],
            max_line: Cell::new(None),
        }
    }

    /// Is this datagram a search request?
    #[must_use]
    pub fn is_search_request(&self) -> bool {
        self.buf.starts_with(b"M-SEARCH")
    }

    /// Is this datagram a search response?
    ///
    /// Only the protocol-and-version prefix is examined; checking the
    /// status code is the caller's concern.
    #[must_use]
    pub fn is_search_response(&self) -> bool {
        self.buf.starts_with(b"HTTP/1.1")
    }

    /// Length in bytes of the longest line, computed on first use and
    /// memoized
    ///
    /// Lookups in this view borrow subslices and never copy a line, so
    /// nothing in this crate consumes the bound. It is for embedders
    /// that copy lines from [`Packet::lines`] into fixed-size storage
    /// and need to size that storage first.
    #[must_use]
    pub fn max_line_length(&self) -> usize {
        if let Some(n) = self.max_line.get() {
            return n;
        }
        let n = longest_line(self.buf);
        self.max_line.set(Some(n));
        n
    }

    /// Iterate over the lines of the message body
    ///
    /// Lines are yielded without their CRLF terminators. Iteration stops
    /// at the blank line ending the message, or at the first trailing
    /// fragment with no CRLF after it (which is not a line).
    #[must_use]
    pub fn lines(&self) -> Lines<'a> {
        Lines { rest: self.buf }
    }

    /// Look up a header by name
    ///
    /// A line carries header `name` iff it begins with exactly those
    /// bytes (matching is case-sensitive) followed by `:` or a space.
    /// The value is everything after the first `:` on the line, trimmed
    /// of leading and trailing spaces; it may be empty. If several lines
    /// carry the same name, the last value wins -- peers that emit a
    /// header twice observably get that behavior, so it is kept.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&'a str> {
        let name = name.as_bytes();
        let mut value = None;
        for line in self.lines() {
            if line.len() > name.len()
                && line.starts_with(name)
                && matches!(line[name.len()], b':' | b' ')
            {
                if let Some(colon) = line.iter().position(|&b| b == b':') {
                    if let Ok(v) = std::str::from_utf8(&line[colon + 1..]) {
                        value = Some(v.trim_matches(' '));
                    }
                }
            }
        }
        value
    }

    /// The display name carried in the `DESC` header
    ///
    /// Returns the text between `:name:` and the next `:` within the
    /// header value, or `None` if the header or either marker is absent.
    #[must_use]
    pub fn display_name(&self) -> Option<&'a str> {
        let desc = self.header_value(DESC_HEADER)?;
        let start = desc.find(":name:")? + ":name:".len();
        let rest = &desc[start..];
        let end = rest.find(':')?;
        Some(&rest[..end])
    }
}

/// Iterator over the lines of a [`Packet`], created by [`Packet::lines`]
pub struct Lines<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let end = find_crlf(self.rest)?;
        if end == 0 {
            return None;
        }
        let line = &self.rest[..end];
        let mut rest = &self.rest[end + CRLF.len()..];
        let start = rest.iter().position(|&b| b != b' ').unwrap_or(rest.len());
        rest = &rest[start..];
        self.rest = rest;
        Some(line)
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

fn longest_line(buf: &[u8]) -> usize {
    let mut longest = 0;
    let mut rest = buf;
    while let Some(n) = find_crlf(rest) {
        if n == 0 {
            return longest;
        }
        longest = longest.max(n);
        rest = &rest[n + CRLF.len()..];
    }
    longest.max(rest.len())
}
