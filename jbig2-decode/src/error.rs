//! Error types for JBIG2 decoding.

use core::fmt;

/// The main error type for JBIG2 decoding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Errors related to reading/parsing data.
    Parse(ParseError),
    /// Errors related to file and page structure.
    Format(FormatError),
    /// Errors related to segment headers and references.
    Segment(SegmentError),
    /// Errors related to Huffman decoding.
    Huffman(HuffmanError),
    /// Errors related to region parameters.
    Region(RegionError),
    /// Errors related to template configuration.
    Template(TemplateError),
    /// Errors related to symbol handling.
    Symbol(SymbolError),
    /// Errors from the MMR decoder.
    Mmr(jbig2_mmr::DecodeError),
    /// A decoded value does not fit its target type.
    Overflow,
    /// A limit of the [`DecodeSettings`](crate::DecodeSettings) was exceeded.
    LimitExceeded,
    /// The stream uses a feature this decoder does not implement.
    Unsupported,
}

/// The broad category of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A header field holds a value outside of its legal range.
    MalformedHeader,
    /// A decoded quantity exceeds the representable range, or a safety limit.
    Overflow,
    /// A read was attempted past the end of the data.
    EndOfData,
    /// A segment refers to something that cannot be resolved, or uses a
    /// feature that has no decoder.
    UnsupportedReference,
}

/// Declares one error category together with its message table and the
/// conversion into [`DecodeError`].
macro_rules! error_category {
    (
        $(#[$meta:meta])*
        $name:ident => $wrapper:ident {
            $( $(#[$variant_meta:meta])* $variant:ident => $message:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$variant_meta])* $variant, )*
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $( Self::$variant => $message, )*
                })
            }
        }

        impl core::error::Error for $name {}

        impl From<$name> for DecodeError {
            fn from(e: $name) -> Self {
                Self::$wrapper(e)
            }
        }
    };
}

error_category! {
    /// Errors related to reading/parsing data.
    ParseError => Parse {
        /// Unexpected end of input.
        UnexpectedEof => "unexpected end of input",
    }
}

error_category! {
    /// Errors related to file and page structure.
    FormatError => Format {
        /// Reserved bits are not zero.
        ReservedBits => "reserved bits must be zero",
        /// A page has no page information segment.
        MissingPageInfo => "missing page information segment",
        /// A page of unknown height has no end of stripe segments.
        UnknownPageHeight => "page height unknown with no stripe segments",
        /// The requested page does not exist.
        MissingPage => "requested page does not exist",
    }
}

error_category! {
    /// Errors related to segment headers and references.
    SegmentError => Segment {
        /// Unknown or reserved segment type.
        UnknownType => "unknown or reserved segment type",
        /// Invalid referred-to segment count.
        InvalidReferredCount => "invalid referred-to segment count",
        /// A segment refers to a segment number not below its own.
        InvalidReference => "segment refers to a later segment",
        /// A referred-to segment does not exist.
        MissingReference => "referred-to segment does not exist",
        /// A referred-to segment has the wrong type.
        UnexpectedReferenceType => "referred-to segment has the wrong type",
        /// Segments refer to each other in a cycle.
        ReferenceCycle => "segment references form a cycle",
        /// An unknown-length region has no end marker.
        MissingEndMarker => "missing end marker for unknown-length region",
        /// A halftone region refers to no pattern dictionary.
        MissingPatternDictionary => "missing required pattern dictionary",
    }
}

error_category! {
    /// Errors related to Huffman decoding.
    HuffmanError => Huffman {
        /// Invalid Huffman code sequence.
        InvalidCode => "invalid Huffman code",
        /// Invalid Huffman table selection.
        InvalidSelection => "invalid Huffman table selection",
        /// Not enough referred custom tables.
        MissingTables => "not enough referred Huffman tables",
        /// An out-of-band value where a number is required.
        UnexpectedOob => "unexpected out-of-band value",
        /// A custom table has an invalid layout.
        InvalidTable => "invalid custom Huffman table",
    }
}

error_category! {
    /// Errors related to region parameters.
    RegionError => Region {
        /// Invalid combination operator value.
        InvalidCombinationOperator => "invalid combination operator",
        /// Region with an invalid dimension.
        InvalidDimension => "invalid dimension value",
        /// A gray-scale value selects a pattern that does not exist.
        GrayScaleOutOfRange => "gray-scale value exceeds pattern count",
    }
}

error_category! {
    /// Errors related to template configuration.
    TemplateError => Template {
        /// An invalid template value was used.
        Invalid => "invalid template value",
        /// An adaptive template pixel refers to a pixel not yet decoded.
        InvalidAtPixel => "invalid adaptive template pixel location",
    }
}

error_category! {
    /// Errors related to symbol handling.
    SymbolError => Symbol {
        /// No symbols available for a text region.
        NoSymbols => "no symbols available",
        /// More symbols or instances than announced.
        TooManySymbols => "too many symbols",
        /// Symbol ID out of valid range.
        OutOfRange => "symbol ID out of range",
        /// An out-of-band value where a number is required.
        UnexpectedOob => "unexpected out-of-band value",
        /// An invalid symbol was encountered.
        Invalid => "invalid symbol encountered",
    }
}

impl DecodeError {
    /// Return the broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        use jbig2_mmr::DecodeError as Mmr;

        match self {
            Self::Parse(ParseError::UnexpectedEof) | Self::Mmr(Mmr::UnexpectedEof) => {
                ErrorKind::EndOfData
            }
            Self::Overflow | Self::LimitExceeded | Self::Mmr(Mmr::Overflow) => ErrorKind::Overflow,
            Self::Segment(
                SegmentError::UnknownType
                | SegmentError::InvalidReference
                | SegmentError::MissingReference
                | SegmentError::UnexpectedReferenceType
                | SegmentError::ReferenceCycle
                | SegmentError::MissingPatternDictionary,
            )
            | Self::Huffman(HuffmanError::MissingTables)
            | Self::Symbol(SymbolError::NoSymbols)
            | Self::Format(FormatError::MissingPage | FormatError::MissingPageInfo)
            | Self::Unsupported => ErrorKind::UnsupportedReference,
            _ => ErrorKind::MalformedHeader,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Format(e) => write!(f, "{e}"),
            Self::Segment(e) => write!(f, "{e}"),
            Self::Huffman(e) => write!(f, "{e}"),
            Self::Region(e) => write!(f, "{e}"),
            Self::Template(e) => write!(f, "{e}"),
            Self::Symbol(e) => write!(f, "{e}"),
            Self::Mmr(e) => write!(f, "{e}"),
            Self::Overflow => f.write_str("arithmetic overflow"),
            Self::LimitExceeded => f.write_str("safety limit exceeded"),
            Self::Unsupported => f.write_str("unsupported feature"),
        }
    }
}

impl core::error::Error for DecodeError {}

impl From<jbig2_mmr::DecodeError> for DecodeError {
    fn from(e: jbig2_mmr::DecodeError) -> Self {
        Self::Mmr(e)
    }
}

/// Result type for JBIG2 decoding operations.
pub type Result<T> = core::result::Result<T, DecodeError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

macro_rules! err {
    ($err:expr) => {
        Err($err.into())
    };
}

pub(crate) use bail;
pub(crate) use err;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(
            DecodeError::from(ParseError::UnexpectedEof).kind(),
            ErrorKind::EndOfData
        );
        assert_eq!(
            DecodeError::from(SegmentError::UnknownType).kind(),
            ErrorKind::UnsupportedReference
        );
        assert_eq!(
            DecodeError::from(FormatError::ReservedBits).kind(),
            ErrorKind::MalformedHeader
        );
        assert_eq!(
            DecodeError::from(jbig2_mmr::DecodeError::Overflow).kind(),
            ErrorKind::Overflow
        );
        assert_eq!(DecodeError::LimitExceeded.kind(), ErrorKind::Overflow);
    }

    #[test]
    fn messages() {
        assert_eq!(
            DecodeError::from(SymbolError::TooManySymbols).to_string(),
            "too many symbols"
        );
        assert_eq!(
            DecodeError::from(RegionError::GrayScaleOutOfRange).to_string(),
            "gray-scale value exceeds pattern count"
        );
    }
}
