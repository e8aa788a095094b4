// Copyright 2026 tiercache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::Display;

/// Cache configuration error.
///
/// Cache operations never fail; only building or reconfiguring the cache does.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Multiple error list.
    #[error(transparent)]
    Multiple(MultipleError),
    /// Invalid tier or cache configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Malformed filter pattern.
    #[error("invalid pattern {pattern:?}: {reason}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl Error {
    /// Combine multiple errors into one error.
    ///
    /// A single error is returned as is.
    pub fn multiple(mut errs: Vec<Error>) -> Self {
        if errs.len() == 1 {
            return errs.remove(0);
        }
        Self::Multiple(MultipleError(errs))
    }

    /// Shortcut for a [`Error::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shortcut for a [`Error::Pattern`].
    pub fn pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// A list of errors reported together.
#[derive(thiserror::Error, Debug)]
pub struct MultipleError(Vec<Error>);

impl MultipleError {
    /// The collected errors.
    pub fn errors(&self) -> &[Error] {
        &self.0
    }
}

impl Display for MultipleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "multiple errors: [")?;
        if let Some((last, errs)) = self.0.as_slice().split_last() {
            for err in errs {
                write!(f, "{}, ", err)?;
            }
            write!(f, "{}", last)?;
        }
        write!(f, "]")?;
        Ok(())
    }
}

/// Cache configuration result.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_display() {
        let err = Error::multiple(vec![Error::config("duplicate level 1"), Error::pattern("", "empty pattern")]);
        assert_eq!(
            err.to_string(),
            "multiple errors: [config error: duplicate level 1, invalid pattern \"\": empty pattern]"
        );

        let err = Error::multiple(vec![Error::config("capacity must be positive")]);
        assert!(matches!(err, Error::Config(_)));
    }
}
