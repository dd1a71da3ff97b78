//! Custom `Error` and `Result` types for the Swift symbol codec.

use std::fmt;

/// Errors that can occur while demangling, printing or remangling a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The mangled symbol is not well-formed, or a node doesn't have the
    /// children its kind requires.
    Structural,

    /// The mangled symbol ends abruptly.
    TruncatedInput,

    /// Found a back reference that is out-of-bounds of the substitution
    /// table.
    UnknownBackReference,

    /// The production is valid but isn't supported by this implementation.
    UnsupportedConstruct,

    /// Found a standard substitution with an unknown letter.
    UnknownShorthand,

    /// An identifier's punycode payload couldn't be decoded.
    UnknownIdentifierEncoding,

    /// An overflow would occur when parsing an integer in a mangled symbol.
    Overflow,

    /// Encountered too much recursion when demangling symbol.
    TooMuchRecursion,
}

#[test]
fn size_of_error() {
    assert_eq!(
        std::mem::size_of::<Error>(),
        1,
        "We should keep the size of our Error type in check"
    );
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Structural => write!(f, "mangled symbol is not well-formed"),
            Error::TruncatedInput => write!(f, "mangled symbol ends abruptly"),
            Error::UnknownBackReference => {
                write!(
                    f,
                    "back reference that is out-of-bounds of the substitution table"
                )
            }
            Error::UnsupportedConstruct => {
                write!(f, "mangling is valid but isn't supported")
            }
            Error::UnknownShorthand => write!(f, "unknown standard substitution"),
            Error::UnknownIdentifierEncoding => {
                write!(f, "identifier uses an encoding that can't be decoded")
            }
            Error::Overflow => write!(
                f,
                "an overflow would occur when parsing an integer in a mangled symbol"
            ),
            Error::TooMuchRecursion => {
                write!(f, "encountered too much recursion when demangling symbol")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A demangling result of `T` or a [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
