use std::fmt::Display;

/// cinderdb errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The database directory does not exist and creation was not requested.
    NoDatabase,
    /// The database directory is locked by another owner.
    InUse,
    /// The database has already been closed.
    Closed,
    /// Close was attempted while transactions are outstanding.
    HasOpenTransactions,
    /// The segment writer was given an empty entry stream. The caller must
    /// discard the segment rather than materialize it.
    EmptySegment,
    /// A key of zero length was supplied on the write path.
    EmptyKey,
    /// A key longer than the maximum key size was supplied on the write path.
    KeyTooLarge(usize),
    /// A value too long to encode was supplied on the write path; its length
    /// would collide with or overflow the removed-key sentinel.
    ValueTooLarge(usize),
    /// A decoded key length field was out of range or inconsistent with the
    /// previous key in the block.
    InvalidKeyEncoding(String),
    /// A key block read returned fewer bytes than a full block.
    ShortRead,
    /// Temporary segment files were found at open, or a segment file pair is
    /// missing one side.
    CorruptState(String),
    /// A write was attempted on an immutable structure (disk segment, sealed
    /// memory segment).
    ReadOnly,
    /// A transaction was requested for a table the database was not opened
    /// with.
    UnknownTable(String),
    /// A table name is empty or contains characters that would break the
    /// segment file naming scheme.
    InvalidTableName(String),
    /// An IO error.
    IO(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NoDatabase => write!(f, "no database found"),
            Error::InUse => write!(f, "database in use"),
            Error::Closed => write!(f, "database closed"),
            Error::HasOpenTransactions => write!(f, "database has open transactions"),
            Error::EmptySegment => write!(f, "empty segment"),
            Error::EmptyKey => write!(f, "key is empty"),
            Error::KeyTooLarge(len) => write!(f, "key length {len} exceeds maximum"),
            Error::ValueTooLarge(len) => write!(f, "value length {len} exceeds maximum"),
            Error::InvalidKeyEncoding(msg) => write!(f, "invalid key encoding: {msg}"),
            Error::ShortRead => write!(f, "short read of key block"),
            Error::CorruptState(msg) => write!(f, "corrupt database state: {msg}"),
            Error::ReadOnly => write!(f, "write attempted on read-only segment"),
            Error::UnknownTable(name) => write!(f, "unknown table: {name}"),
            Error::InvalidTableName(msg) => write!(f, "invalid table name: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
        }
    }
}

/// A cinderdb Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}
