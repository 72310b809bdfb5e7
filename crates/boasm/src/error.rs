//! Error types for encoding, function building, object I/O, and linking.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Any error produced by the assembler back-end or the linker.
///
/// Per-function errors accumulate on the [`FunctionBuilder`](crate::FunctionBuilder)
/// and surface when the body is realized; object-file and link errors are
/// returned eagerly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// The mnemonic is not part of the loaded instruction set.
    UnknownMnemonic {
        /// The mnemonic that was not recognized.
        mnemonic: String,
    },

    /// Every form of the mnemonic was tried and none accepted the operands.
    NoMatchingForm {
        /// The mnemonic whose forms were exhausted.
        mnemonic: String,
        /// Why the last candidate was rejected, when known.
        detail: String,
    },

    /// No register name matches the given spelling.
    UnknownRegister {
        /// The register spelling that failed to parse.
        name: String,
    },

    /// An integer does not fit the operand slot an emitter needed to fill.
    ImmediateOverflow {
        /// The offending value.
        value: i128,
        /// The slot width in bytes.
        width: u8,
    },

    /// No register of the needed width is free and none could be evicted.
    RegisterExhausted {
        /// The requested width in bits.
        width: u16,
    },

    /// A function, var, data blob, local, or type name is already taken
    /// within its scope.
    DuplicateName {
        /// The colliding name.
        name: String,
    },

    /// A label was defined twice within one function.
    DuplicateLabel {
        /// The colliding label.
        label: String,
    },

    /// An operand referenced a local or argument that was never declared.
    UnknownAllocation {
        /// The unknown local/argument name.
        name: String,
    },

    /// A specific register was requested but is blocked by a live holder.
    RegisterBusy {
        /// The register that could not be reserved.
        register: String,
    },

    /// Two input objects declare the same package.
    DuplicatePackage {
        /// The duplicated package name.
        package: String,
        /// The object file seen first.
        first: String,
        /// The object file seen second.
        second: String,
    },

    /// A relocation names a symbol that no function, var, or data defines.
    UnresolvedSymbol {
        /// The unknown symbol.
        symbol: String,
    },

    /// An object-file stream is malformed (truncated, oversized field, …).
    CorruptObject {
        /// What the reader tripped on.
        detail: String,
    },

    /// A file-system operation failed.
    Io {
        /// The underlying error message.
        detail: String,
    },

    /// Multiple errors collected while building one function.
    Multiple {
        /// The collected errors, in emission order.
        errors: Vec<Error>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownMnemonic { mnemonic } => {
                write!(f, "unknown mnemonic '{}'", mnemonic)
            }
            Error::NoMatchingForm { mnemonic, detail } => {
                if detail.is_empty() {
                    write!(f, "no matching form for '{}' with these operands", mnemonic)
                } else {
                    write!(
                        f,
                        "no matching form for '{}' with these operands: {}",
                        mnemonic, detail
                    )
                }
            }
            Error::UnknownRegister { name } => {
                write!(f, "no such register: {}", name)
            }
            Error::ImmediateOverflow { value, width } => {
                write!(
                    f,
                    "immediate value {} does not fit in {} byte(s)",
                    value, width
                )
            }
            Error::RegisterExhausted { width } => {
                write!(f, "no {}-bit register available for allocation", width)
            }
            Error::DuplicateName { name } => {
                write!(f, "name '{}' already declared", name)
            }
            Error::DuplicateLabel { label } => {
                write!(f, "label '{}' already exists", label)
            }
            Error::UnknownAllocation { name } => {
                write!(f, "no local or argument named '{}'", name)
            }
            Error::RegisterBusy { register } => {
                write!(f, "register {} is already in use", register)
            }
            Error::DuplicatePackage {
                package,
                first,
                second,
            } => {
                write!(
                    f,
                    "duplicate package '{}' in object files {} and {}",
                    package, first, second
                )
            }
            Error::UnresolvedSymbol { symbol } => {
                write!(f, "unresolved symbol '{}'", symbol)
            }
            Error::CorruptObject { detail } => {
                write!(f, "corrupt object file: {}", detail)
            }
            Error::Io { detail } => {
                write!(f, "i/o error: {}", detail)
            }
            Error::Multiple { errors } => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl Error {
    /// Fold a non-empty error list into one error: a single error stays
    /// itself, more than one becomes [`Error::Multiple`].
    pub fn from_list(mut errors: Vec<Error>) -> Error {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Error::Multiple { errors }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io {
            detail: e.to_string(),
        }
    }
}
