use std::fmt;
use std::ops::Range;

use miette::{miette, LabeledSpan, Report};

/// Location of a statement within the assembly source.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Span {
    /// 1-based line number.
    pub line: usize,
    /// Byte range of the statement text, comments excluded.
    pub range: Range<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    // Structural: assembly stops at the first of these
    MissingOrig,
    RepeatedOrig,
    MissingEnd,
    DuplicateLabel { label: String, first_line: usize },
    MalformedString(String),

    UnknownInstruction(String),
    InvalidLabel(String),
    BadRegister(String),
    BadLiteral(String),
    UnknownLabel(String),
    Overflow { value: i32, bits: u32 },
    OperandCount { expected: usize, found: usize },
    OutOfMemory { address: u32 },

    // Warnings
    IgnoredAfterEnd,
}

impl ErrorKind {
    /// Whether the assembler cannot continue after this error.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingOrig
                | Self::RepeatedOrig
                | Self::MissingEnd
                | Self::DuplicateLabel { .. }
                | Self::MalformedString(_)
        )
    }

    fn code(&self) -> &'static str {
        match self {
            Self::MissingOrig => "asm::missing_orig",
            Self::RepeatedOrig => "asm::repeated_orig",
            Self::MissingEnd => "asm::missing_end",
            Self::DuplicateLabel { .. } => "asm::duplicate_label",
            Self::MalformedString(_) => "asm::str_lit",
            Self::UnknownInstruction(_) => "asm::instruction",
            Self::InvalidLabel(_) => "asm::label",
            Self::BadRegister(_) => "asm::register",
            Self::BadLiteral(_) => "asm::bad_lit",
            Self::UnknownLabel(_) => "asm::unknown_label",
            Self::Overflow { .. } => "asm::overflow",
            Self::OperandCount { .. } => "asm::operands",
            Self::OutOfMemory { .. } => "asm::memory",
            Self::IgnoredAfterEnd => "asm::after_end",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            Self::MissingOrig => "programs must start with a directive like `.ORIG x3000`",
            Self::RepeatedOrig => "only one `.ORIG` is allowed per file",
            Self::MissingEnd => "terminate the program with `.END`",
            Self::DuplicateLabel { .. } => "labels are only allowed once per file",
            Self::MalformedString(_) => ".STRINGZ requires a string literal like \"hello\"",
            Self::UnknownInstruction(_) => "mnemonics are case-sensitive, e.g. `ADD` or `BRnz`",
            Self::InvalidLabel(_) => "labels start with a letter or `_` and contain only letters, digits and `_`",
            Self::BadRegister(_) => "registers are written `R0` to `R7`",
            Self::BadLiteral(_) => "literals are written `x3000`, `#-12` or `12`",
            Self::UnknownLabel(_) => "check the spelling of the label, and that it is defined before `.END`",
            Self::Overflow { .. } => "use a smaller value, or load the value from memory",
            Self::OperandCount { .. } => "operands are separated by commas",
            Self::OutOfMemory { .. } => "user programs must end below xFE00",
            Self::IgnoredAfterEnd => "remove the lines after `.END`",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOrig => write!(f, "Expected \".ORIG\""),
            Self::RepeatedOrig => write!(f, "Unexpected second \".ORIG\""),
            Self::MissingEnd => write!(f, "Expected \".END\" before end of file"),
            Self::DuplicateLabel { label, first_line } => write!(
                f,
                "Label \"{label}\" was already defined at line {first_line}"
            ),
            Self::MalformedString(found) => {
                write!(f, "Expected string constant, but \"{found}\" found instead")
            }
            Self::UnknownInstruction(found) => write!(f, "Unrecognized instruction \"{found}\""),
            Self::InvalidLabel(found) => write!(f, "Invalid label \"{found}\""),
            Self::BadRegister(found) => write!(f, "Expected register, found \"{found}\""),
            Self::BadLiteral(found) => write!(f, "Unrecognized literal \"{found}\""),
            Self::UnknownLabel(found) => write!(f, "Undefined label \"{found}\""),
            Self::Overflow { value, bits } => {
                write!(f, "Cannot represent {value} in a {bits}-bit field")
            }
            Self::OperandCount { expected, found } => write!(
                f,
                "Expected {expected} operand{} but {found} found",
                if *expected == 1 { "" } else { "s" }
            ),
            Self::OutOfMemory { address } => {
                write!(f, "Address x{address:04X} is past the end of user memory")
            }
            Self::IgnoredAfterEnd => write!(f, "The following code after \".END\" is ignored"),
        }
    }
}

/// A single assembler message tied to a source line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub span: Span,
    pub severity: Severity,
    pub kind: ErrorKind,
}

impl Diagnostic {
    pub fn error(span: Span, kind: ErrorKind) -> Self {
        Self {
            span,
            severity: Severity::Error,
            kind,
        }
    }

    pub fn warning(span: Span, kind: ErrorKind) -> Self {
        Self {
            span,
            severity: Severity::Warning,
            kind,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render against the source the diagnostic was produced from.
    pub fn report(&self, src: &str) -> Report {
        let severity = match self.severity {
            Severity::Warning => miette::Severity::Warning,
            Severity::Error => miette::Severity::Error,
        };
        let label = match self.severity {
            Severity::Warning => "ignored",
            Severity::Error => "here",
        };
        miette!(
            severity = severity,
            code = self.kind.code(),
            help = self.kind.help(),
            labels = vec![LabeledSpan::at(self.span.range.clone(), label)],
            "{}",
            self.kind,
        )
        .with_source_code(src.to_owned())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        write!(f, "{severity} at line {}: {}", self.span.line, self.kind)
    }
}
