//! Connection string error types.

use std::fmt;

use thiserror::Error;

/// A single problem found while parsing or validating a connection string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A token had no `=` separator.
    #[error("Incomplete specification: keyword '{keyword}' has no value (missing '=')")]
    MissingValue {
        /// The token as written.
        keyword: String,
    },

    /// An `=` appeared with no keyword in front of it.
    #[error("Empty keyword found (format: =value)")]
    EmptyKeyword,

    /// The same keyword appeared more than once.
    #[error("Duplicate keyword '{keyword}' found")]
    DuplicateKeyword {
        /// The repeated keyword as written.
        keyword: String,
    },

    /// The keyword is controlled by the driver.
    #[error(
        "Reserved keyword '{keyword}' is controlled by the driver and cannot be specified by the user"
    )]
    ReservedKeyword {
        /// The keyword as written.
        keyword: String,
    },

    /// The keyword is not in the allow-list.
    #[error("Unknown keyword '{keyword}' is not recognized")]
    UnknownKeyword {
        /// The keyword as written.
        keyword: String,
    },

    /// A braced value reached end of input without its closing `}`.
    #[error("Unclosed braced value for keyword '{keyword}' starting at position {position}")]
    UnclosedBrace {
        /// Keyword owning the value.
        keyword: String,
        /// Byte offset of the opening `{`.
        position: usize,
    },
}

impl ParseError {
    /// Whether this error stopped the scan.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnclosedBrace { .. })
    }

    /// The keyword this error refers to, if any.
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        match self {
            Self::EmptyKeyword => None,
            Self::MissingValue { keyword }
            | Self::DuplicateKeyword { keyword }
            | Self::ReservedKeyword { keyword }
            | Self::UnknownKeyword { keyword }
            | Self::UnclosedBrace { keyword, .. } => Some(keyword),
        }
    }
}

/// Every problem found in one connection string, in encounter order.
///
/// Never empty. When the scan stopped on an unclosed brace the list holds
/// only that error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    /// Wrap a list of errors. Returns `None` for an empty list.
    #[must_use]
    pub fn from_vec(errors: Vec<ParseError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// A single fatal error.
    #[must_use]
    pub fn fatal(error: ParseError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// The collected errors.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false`: [`ParseErrors::from_vec`] refuses an empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.errors.iter()
    }

    /// Whether parsing stopped early on a non-recoverable error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.errors.len() == 1 && self.errors[0].is_fatal()
    }

    /// Consume into the underlying list.
    #[must_use]
    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid connection string: ")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

impl<'a> IntoIterator for &'a ParseErrors {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_empty_is_none() {
        assert!(ParseErrors::from_vec(Vec::new()).is_none());
    }

    #[test]
    fn test_display_joins_messages() {
        let errors = ParseErrors::from_vec(vec![
            ParseError::EmptyKeyword,
            ParseError::DuplicateKeyword {
                keyword: "server".into(),
            },
        ])
        .unwrap();

        let text = errors.to_string();
        assert!(text.contains("Empty keyword"));
        assert!(text.contains("Duplicate keyword 'server'"));
        assert!(!errors.is_fatal());
    }

    #[test]
    fn test_fatal() {
        let errors = ParseErrors::fatal(ParseError::UnclosedBrace {
            keyword: "pwd".into(),
            position: 4,
        });
        assert!(errors.is_fatal());
        assert_eq!(errors.len(), 1);
        assert!(!errors.is_empty());
        assert_eq!(errors.errors()[0].keyword(), Some("pwd"));
    }
}
