//! A minimal ASN.1 DER reader and writer
//!
//! Only the small slice of DER needed for key material is implemented:
//! definite lengths, SEQUENCE, INTEGER, BIT STRING, OCTET STRING, NULL,
//! OBJECT IDENTIFIER, and context-specific tags. The reader enforces the
//! DER canonical form (minimal lengths, minimal INTEGER encodings, no
//! indefinite lengths), and the writer only produces it, so encoding is
//! deterministic.

use thiserror::Error;

/// SEQUENCE (constructed)
pub const SEQUENCE: u8 = 0x30;
/// INTEGER
pub const INTEGER: u8 = 0x02;
/// BIT STRING
pub const BIT_STRING: u8 = 0x03;
/// OCTET STRING
pub const OCTET_STRING: u8 = 0x04;
/// NULL
pub const NULL: u8 = 0x05;
/// OBJECT IDENTIFIER
pub const OBJECT_IDENTIFIER: u8 = 0x06;

/// A context-specific tag, `[n]`
#[must_use]
pub const fn context(n: u8, constructed: bool) -> u8 {
    0x80 | n | if constructed { 0x20 } else { 0 }
}

/// A failure to decode a DER structure
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Asn1Error {
    /// The input ended inside a tag, length, or value
    #[error("truncated DER input")]
    Truncated,

    /// A structure was fully read but bytes remain
    #[error("trailing data after DER structure")]
    TrailingData,

    /// Indefinite lengths are forbidden in DER
    #[error("indefinite length is not valid DER")]
    IndefiniteLength,

    /// A length used more octets than necessary
    #[error("non-minimal DER length")]
    NonMinimalLength,

    /// A length did not fit in `usize`
    #[error("DER length overflow")]
    LengthOverflow,

    /// A different tag was required at this position
    #[error("unexpected DER tag {found:#04x} (expected {expected:#04x})")]
    UnexpectedTag {
        /// The tag the structure requires
        expected: u8,
        /// The tag found in the input
        found: u8,
    },

    /// An INTEGER carried redundant leading octets
    #[error("non-minimal INTEGER encoding")]
    NonMinimalInteger,

    /// An INTEGER was negative where an unsigned value is required
    #[error("negative INTEGER where unsigned value required")]
    NegativeInteger,

    /// A BIT STRING had unused bits where none are permitted
    #[error("BIT STRING with unused bits")]
    UnusedBits,

    /// A value was empty where content is required
    #[error("empty DER value")]
    EmptyValue,
}

/// A cursor over a DER-encoded byte slice
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    input: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Begins reading at the start of `input`
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    /// Whether all input has been consumed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Requires that all input has been consumed
    ///
    /// # Errors
    ///
    /// Returns an error if bytes remain.
    pub fn finish(&self) -> Result<(), Asn1Error> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(Asn1Error::TrailingData)
        }
    }

    /// The tag of the next element, without consuming it
    #[must_use]
    pub fn peek_tag(&self) -> Option<u8> {
        self.input.first().copied()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Asn1Error> {
        if self.input.len() < n {
            return Err(Asn1Error::Truncated);
        }
        let (head, rest) = self.input.split_at(n);
        self.input = rest;
        Ok(head)
    }

    fn read_length(&mut self) -> Result<usize, Asn1Error> {
        let first = self.take(1)?[0];
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        if first == 0x80 {
            return Err(Asn1Error::IndefiniteLength);
        }

        let count = usize::from(first & 0x7f);
        if count > std::mem::size_of::<usize>() {
            return Err(Asn1Error::LengthOverflow);
        }
        let bytes = self.take(count)?;
        if bytes[0] == 0 {
            return Err(Asn1Error::NonMinimalLength);
        }

        let mut len = 0usize;
        for &b in bytes {
            len = (len << 8) | usize::from(b);
        }
        // lengths below 128 must use the short form
        if len < 0x80 {
            return Err(Asn1Error::NonMinimalLength);
        }
        Ok(len)
    }

    /// Reads the next tag-length-value element, returning tag and content
    ///
    /// # Errors
    ///
    /// Returns an error if the element is truncated or its length is not
    /// canonical DER.
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), Asn1Error> {
        let tag = self.take(1)?[0];
        let len = self.read_length()?;
        let content = self.take(len)?;
        Ok((tag, content))
    }

    /// Reads the next element, requiring the given tag
    ///
    /// # Errors
    ///
    /// Returns an error if the next element is malformed or differently
    /// tagged.
    pub fn expect(&mut self, tag: u8) -> Result<&'a [u8], Asn1Error> {
        let (found, content) = self.read_tlv()?;
        if found != tag {
            return Err(Asn1Error::UnexpectedTag {
                expected: tag,
                found,
            });
        }
        Ok(content)
    }

    /// Descends into a SEQUENCE, returning a reader over its content
    ///
    /// # Errors
    ///
    /// Returns an error if the next element is not a SEQUENCE.
    pub fn read_sequence(&mut self) -> Result<Reader<'a>, Asn1Error> {
        Ok(Reader::new(self.expect(SEQUENCE)?))
    }

    /// Reads an unsigned INTEGER, returning its big-endian magnitude
    ///
    /// The single sign-padding zero octet, when present, is stripped.
    ///
    /// # Errors
    ///
    /// Returns an error for negative, empty, or non-minimal encodings.
    pub fn read_uint(&mut self) -> Result<&'a [u8], Asn1Error> {
        let content = self.expect(INTEGER)?;
        match content {
            [] => Err(Asn1Error::EmptyValue),
            [0] => Ok(content),
            [0, second, ..] => {
                if second & 0x80 == 0 {
                    Err(Asn1Error::NonMinimalInteger)
                } else {
                    Ok(&content[1..])
                }
            }
            [first, ..] => {
                if first & 0x80 != 0 {
                    Err(Asn1Error::NegativeInteger)
                } else {
                    Ok(content)
                }
            }
        }
    }

    /// Reads an OBJECT IDENTIFIER, returning its raw content octets
    ///
    /// # Errors
    ///
    /// Returns an error if the element is malformed or empty.
    pub fn read_oid(&mut self) -> Result<&'a [u8], Asn1Error> {
        let content = self.expect(OBJECT_IDENTIFIER)?;
        if content.is_empty() {
            return Err(Asn1Error::EmptyValue);
        }
        Ok(content)
    }

    /// Reads a BIT STRING with no unused bits, returning its octets
    ///
    /// # Errors
    ///
    /// Returns an error if the element is malformed or has unused bits.
    pub fn read_bit_string(&mut self) -> Result<&'a [u8], Asn1Error> {
        let content = self.expect(BIT_STRING)?;
        match content.split_first() {
            Some((0, rest)) => Ok(rest),
            Some(_) => Err(Asn1Error::UnusedBits),
            None => Err(Asn1Error::EmptyValue),
        }
    }

    /// Reads an OCTET STRING
    ///
    /// # Errors
    ///
    /// Returns an error if the element is malformed or differently tagged.
    pub fn read_octet_string(&mut self) -> Result<&'a [u8], Asn1Error> {
        self.expect(OCTET_STRING)
    }

    /// Reads the next element only if it carries the given tag
    ///
    /// # Errors
    ///
    /// Returns an error if a matching element is malformed.
    pub fn read_optional(&mut self, tag: u8) -> Result<Option<&'a [u8]>, Asn1Error> {
        if self.peek_tag() == Some(tag) {
            Ok(Some(self.expect(tag)?))
        } else {
            Ok(None)
        }
    }
}

/// An append-only builder for canonical DER
#[derive(Debug, Default)]
pub struct Writer {
    out: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The encoded bytes
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.out
    }

    fn write_length(&mut self, len: usize) {
        if len < 0x80 {
            self.out.push(len as u8);
        } else {
            let bytes = len.to_be_bytes();
            let skip = bytes.iter().take_while(|&&b| b == 0).count();
            let significant = &bytes[skip..];
            self.out.push(0x80 | significant.len() as u8);
            self.out.extend_from_slice(significant);
        }
    }

    /// Appends a complete tag-length-value element
    pub fn write_tlv(&mut self, tag: u8, content: &[u8]) {
        self.out.push(tag);
        self.write_length(content.len());
        self.out.extend_from_slice(content);
    }

    /// Appends a SEQUENCE whose content is produced by `f`
    pub fn write_sequence(&mut self, f: impl FnOnce(&mut Writer)) {
        self.write_constructed(SEQUENCE, f);
    }

    /// Appends a constructed element with the given tag
    pub fn write_constructed(&mut self, tag: u8, f: impl FnOnce(&mut Writer)) {
        let mut inner = Writer::new();
        f(&mut inner);
        self.write_tlv(tag, &inner.out);
    }

    /// Appends an INTEGER holding the given unsigned big-endian magnitude
    ///
    /// Redundant leading zeros are stripped; a single zero octet is
    /// prepended when the high bit is set, per the INTEGER sign
    /// convention.
    pub fn write_uint(&mut self, magnitude: &[u8]) {
        let skip = magnitude.iter().take_while(|&&b| b == 0).count();
        let significant = &magnitude[skip..];

        if significant.is_empty() {
            self.write_tlv(INTEGER, &[0]);
        } else if significant[0] & 0x80 != 0 {
            let mut content = Vec::with_capacity(significant.len() + 1);
            content.push(0);
            content.extend_from_slice(significant);
            self.write_tlv(INTEGER, &content);
        } else {
            self.write_tlv(INTEGER, significant);
        }
    }

    /// Appends an OBJECT IDENTIFIER from its raw content octets
    pub fn write_oid(&mut self, oid: &[u8]) {
        self.write_tlv(OBJECT_IDENTIFIER, oid);
    }

    /// Appends a BIT STRING with no unused bits
    pub fn write_bit_string(&mut self, bits: &[u8]) {
        let mut content = Vec::with_capacity(bits.len() + 1);
        content.push(0);
        content.extend_from_slice(bits);
        self.write_tlv(BIT_STRING, &content);
    }

    /// Appends an OCTET STRING
    pub fn write_octet_string(&mut self, octets: &[u8]) {
        self.write_tlv(OCTET_STRING, octets);
    }

    /// Appends a NULL
    pub fn write_null(&mut self) {
        self.write_tlv(NULL, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_strips_and_pads() {
        let mut w = Writer::new();
        w.write_uint(&[0x00, 0x00, 0x80]);
        assert_eq!(w.into_vec(), vec![0x02, 0x02, 0x00, 0x80]);

        let mut w = Writer::new();
        w.write_uint(&[0x7f]);
        assert_eq!(w.into_vec(), vec![0x02, 0x01, 0x7f]);

        let mut w = Writer::new();
        w.write_uint(&[]);
        assert_eq!(w.into_vec(), vec![0x02, 0x01, 0x00]);
    }

    #[test]
    fn uint_round_trip() {
        let mut w = Writer::new();
        w.write_uint(&[0x01, 0x00, 0x01]);
        let der = w.into_vec();
        let mut r = Reader::new(&der);
        assert_eq!(r.read_uint().unwrap(), &[0x01, 0x00, 0x01]);
        r.finish().unwrap();
    }

    #[test]
    fn rejects_truncated_length() {
        let mut r = Reader::new(&[0x30, 0x82, 0x01]);
        assert_eq!(r.read_tlv(), Err(Asn1Error::Truncated));
    }

    #[test]
    fn rejects_truncated_value() {
        let mut r = Reader::new(&[0x04, 0x05, 0x01, 0x02]);
        assert_eq!(r.read_tlv(), Err(Asn1Error::Truncated));
    }

    #[test]
    fn rejects_indefinite_length() {
        let mut r = Reader::new(&[0x30, 0x80, 0x00, 0x00]);
        assert_eq!(r.read_tlv(), Err(Asn1Error::IndefiniteLength));
    }

    #[test]
    fn rejects_non_minimal_length() {
        // 0x81 0x05 encodes 5, which fits the short form
        let mut r = Reader::new(&[0x04, 0x81, 0x05, 1, 2, 3, 4, 5]);
        assert_eq!(r.read_tlv(), Err(Asn1Error::NonMinimalLength));
    }

    #[test]
    fn rejects_non_minimal_integer() {
        let mut r = Reader::new(&[0x02, 0x02, 0x00, 0x7f]);
        assert_eq!(r.read_uint(), Err(Asn1Error::NonMinimalInteger));
    }

    #[test]
    fn rejects_negative_integer() {
        let mut r = Reader::new(&[0x02, 0x01, 0x80]);
        assert_eq!(r.read_uint(), Err(Asn1Error::NegativeInteger));
    }

    #[test]
    fn long_form_length_round_trip() {
        let content = vec![0xab; 300];
        let mut w = Writer::new();
        w.write_octet_string(&content);
        let der = w.into_vec();
        assert_eq!(&der[..3], &[0x04, 0x82, 0x01]);

        let mut r = Reader::new(&der);
        assert_eq!(r.read_octet_string().unwrap(), &content[..]);
        r.finish().unwrap();
    }

    #[test]
    fn sequence_nesting() {
        let mut w = Writer::new();
        w.write_sequence(|w| {
            w.write_uint(&[1]);
            w.write_sequence(|w| w.write_null());
        });
        let der = w.into_vec();

        let mut outer = Reader::new(&der);
        let mut seq = outer.read_sequence().unwrap();
        outer.finish().unwrap();
        assert_eq!(seq.read_uint().unwrap(), &[1]);
        let mut inner = seq.read_sequence().unwrap();
        seq.finish().unwrap();
        inner.expect(NULL).unwrap();
        inner.finish().unwrap();
    }

    #[test]
    fn trailing_data_detected() {
        let r = Reader::new(&[0x00]);
        assert_eq!(r.finish(), Err(Asn1Error::TrailingData));
    }
}
