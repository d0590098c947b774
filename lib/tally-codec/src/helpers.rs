use nom::{
    bytes::complete::take_while1,
    character::complete::u64 as parse_u64,
    combinator::map,
    error::{Error, ErrorKind},
    IResult, Parser as _,
};

/// Splits `input` at the first occurrence of `delimiter`.
///
/// The delimiter itself is consumed. When the delimiter is absent, the whole (non-empty) input forms the head and
/// the tail is empty; an empty input yields `None`.
#[inline]
pub fn split_at_delimiter(input: &[u8], delimiter: u8) -> Option<(&[u8], &[u8])> {
    match memchr::memchr(delimiter, input) {
        Some(index) => Some((&input[0..index], &input[index + 1..input.len()])),
        None => {
            if input.is_empty() {
                None
            } else {
                Some((input, &[]))
            }
        }
    }
}

/// Validates that the entire input is UTF-8, returning it as a string slice.
#[inline]
pub fn utf8(input: &[u8]) -> IResult<&[u8], &str> {
    match simdutf8::basic::from_utf8(input) {
        Ok(s) => Ok((&[], s)),
        Err(_) => Err(nom::Err::Error(Error::new(input, ErrorKind::Verify))),
    }
}

/// Parses a name composed of ASCII alphanumerics and the common separator characters.
#[inline]
pub fn ascii_alphanum_and_seps(input: &[u8]) -> IResult<&[u8], &str> {
    let valid_char = |c: u8| c.is_ascii_alphanumeric() || c == b' ' || c == b'_' || c == b'-' || c == b'.';
    map(take_while1(valid_char), |b| {
        // SAFETY: We know the bytes in `b` can only be comprised of ASCII characters, which ensures that it's valid
        // to interpret the bytes directly as UTF-8.
        unsafe { std::str::from_utf8_unchecked(b) }
    })
    .parse(input)
}

/// Parses a name composed of any printable ASCII character other than `:`.
#[inline]
pub fn permissive_metric_name(input: &[u8]) -> IResult<&[u8], &str> {
    let valid_char = |c: u8| c > 31 && c < 128 && c != b':';
    map(take_while1(valid_char), |b| {
        // SAFETY: We know the bytes in `b` can only be comprised of ASCII characters, which ensures that it's valid
        // to interpret the bytes directly as UTF-8.
        unsafe { std::str::from_utf8_unchecked(b) }
    })
    .parse(input)
}

/// Parses an epoch-seconds timestamp.
#[inline]
pub fn unix_timestamp(input: &[u8]) -> IResult<&[u8], u64> {
    parse_u64(input)
}

/// An unparsed, comma-separated tag list borrowed from the wire payload.
///
/// Iterating yields individual tag slices; canonicalization (sorting, deduplication, reserved tag extraction) is the
/// consumer's concern.
#[derive(Clone, Debug, Default)]
pub struct RawTags<'a>(&'a str);

impl<'a> RawTags<'a> {
    /// Creates a `RawTags` over the given raw tag list.
    pub fn new(raw: &'a str) -> Self {
        Self(raw)
    }

    /// Creates an empty `RawTags`.
    pub fn empty() -> Self {
        Self("")
    }

    /// Returns the underlying raw tag list.
    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

impl<'a> IntoIterator for RawTags<'a> {
    type Item = &'a str;
    type IntoIter = RawTagsIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        RawTagsIter {
            inner: self.0.split(','),
        }
    }
}

/// Iterator over the individual tags of a [`RawTags`].
pub struct RawTagsIter<'a> {
    inner: std::str::Split<'a, char>,
}

impl<'a> Iterator for RawTagsIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        for tag in self.inner.by_ref() {
            if !tag.is_empty() {
                return Some(tag);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_at_delimiter_basic() {
        assert_eq!(split_at_delimiter(b"a|b|c", b'|'), Some((&b"a"[..], &b"b|c"[..])));
        assert_eq!(split_at_delimiter(b"abc", b'|'), Some((&b"abc"[..], &b""[..])));
        assert_eq!(split_at_delimiter(b"", b'|'), None);
    }

    #[test]
    fn raw_tags_skips_empty_entries() {
        let tags = RawTags::new("a,,b,").into_iter().collect::<Vec<_>>();
        assert_eq!(tags, vec!["a", "b"]);

        let empty = RawTags::empty().into_iter().collect::<Vec<_>>();
        assert!(empty.is_empty());
    }
}
