use bufrtables::FXY;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table Error: {0}")]
    Table(#[from] anyhow::Error),

    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("File is not a valid BUFR file: {0}")]
    Nom(String),

    #[error("Unsupported BUFR edition: {0}")]
    UnsupportedVersion(u8),

    #[error("Message at offset {offset} has no end section")]
    BadTerminator { offset: usize },

    #[error("Message at offset {offset} declares {declared} bytes but only {available} remain")]
    Truncated {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("Invalid descriptor structure at {fxy}: {reason}")]
    Structure { fxy: FXY, reason: String },

    #[error("Sequence {0} references itself")]
    CyclicSequence(FXY),

    #[error("Cannot classify delayed replication count descriptor {0}")]
    UnknownDelayedCount(FXY),

    #[error("Out of data: wanted {wanted} bits at bit {position}, {available} available")]
    OutOfBits {
        wanted: usize,
        position: usize,
        available: usize,
    },

    #[error("Decoded {consumed_bits} bits but Data section declares {declared_bytes} bytes")]
    SizeMismatch {
        consumed_bits: usize,
        declared_bytes: usize,
    },

    #[error("Data present bitmap error: {0}")]
    DataPresence(String),

    #[error("Compressed data error: {0}")]
    Compressed(String),

    #[error("Message has an incomplete schema: {0}")]
    IncompleteSchema(String),

    #[error("Config Error: {0}")]
    Config(String),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        Self::Nom(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A soft condition recorded on a message or tree instead of failing it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Warning {
    /// The End section was found one byte before the declared message end.
    ShortTerminator { offset: usize },
    /// No table entry for this descriptor; the tree node is flagged bad.
    MissingDescriptor(FXY),
    /// An operator this decoder does not implement.
    IgnoredOperator(FXY),
    /// Decoded size differs from the declared size within the tolerance.
    BitCountSlack {
        consumed_bits: usize,
        declared_bytes: usize,
    },
    /// A data-present marker with no bitmap in force.
    UnboundMarker(FXY),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::ShortTerminator { offset } => {
                write!(f, "message at offset {} is one byte short", offset)
            }
            Warning::MissingDescriptor(fxy) => write!(f, "descriptor {} not found in tables", fxy),
            Warning::IgnoredOperator(fxy) => write!(f, "operator {} ignored", fxy),
            Warning::BitCountSlack {
                consumed_bits,
                declared_bytes,
            } => write!(
                f,
                "decoded {} bits for a {} byte Data section",
                consumed_bits, declared_bytes
            ),
            Warning::UnboundMarker(fxy) => {
                write!(f, "{} has no data present bitmap in force", fxy)
            }
        }
    }
}
