//! Module for declaring compiler diagnostic error types.
//!
//! This module exports a macro [`declare_error_type`] that can be used to define a new error that
//! the compiler infrastructure can use as a diagnostic error.

/// Declare a new error type that can be used as a diagnostic error.
///
/// Every member is a struct that already derives `thiserror::Error` and `miette::Diagnostic`. The
/// generated enum forwards both the message and the diagnostic to the member, and gets a `From`
/// conversion for each member so that `?` works on the member errors directly.
///
/// ```ignore
/// declare_error_type! {
///     #[error("mir error: {0}")]
///     pub enum MirError {
///         /// A name was declared twice.
///         DuplicateName(DuplicateNameError),
///     }
/// }
/// ```
#[macro_export]
macro_rules! declare_error_type {
    {
        $(#[doc = $doc:expr])*
        #[error($msg:expr)]
        $vis:vis enum $type_name:ident {
            $(
                $(#[doc = $variant_doc:expr])*
                $name:ident($ty:ty),
            )*
        }
    } => {
        $(#[doc = $doc])*
        #[derive(thiserror::Error, miette::Diagnostic, Debug)]
        #[error($msg)]
        $vis enum $type_name {
            $(
                $(#[doc = $variant_doc])*
                #[error(transparent)]
                #[diagnostic(transparent)]
                $name(#[from] $ty),
            )*
        }
    }
}

#[cfg(test)]
mod tests {
    use miette::Diagnostic;
    use thiserror::Error;

    #[derive(Error, Diagnostic, Debug)]
    #[diagnostic(code(test::first), help("try the second one"))]
    #[error("first went wrong")]
    struct FirstError;

    #[derive(Error, Diagnostic, Debug)]
    #[diagnostic(code(test::second))]
    #[error("second went wrong: {reason}")]
    struct SecondError {
        reason: String,
    }

    declare_error_type! {
        /// Errors produced by the test fixture.
        #[error("test error: {0}")]
        enum TestError {
            /// The first error.
            First(FirstError),
            Second(SecondError),
        }
    }

    fn fails_with_second() -> Result<(), TestError> {
        Err(SecondError {
            reason: "because".to_owned(),
        })?;
        Ok(())
    }

    #[test]
    fn test_error_type_forwards_message_and_code() {
        let err = TestError::from(FirstError);
        assert_eq!(err.to_string(), "first went wrong");
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("test::first".to_owned())
        );
        assert_eq!(
            err.help().map(|h| h.to_string()),
            Some("try the second one".to_owned())
        );
    }

    #[test]
    fn test_error_type_converts_with_question_mark() {
        let err = fails_with_second().unwrap_err();
        assert!(matches!(err, TestError::Second(_)));
        assert_eq!(err.to_string(), "second went wrong: because");
    }
}
