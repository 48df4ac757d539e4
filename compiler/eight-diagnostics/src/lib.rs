//! Diagnostic helpers shared by the compiler crates.
//!
//! Errors are reported by returning them up to the driver, which hands them to miette. Two things
//! do not fit that flow and live here instead:
//!
//! - [`ice!`] aborts on an internal compiler error, a state that only a bug in the compiler can
//!   reach.
//! - [`report_warnings`] renders non-fatal diagnostics while the compilation carries on.

use miette::{Diagnostic, Report};
use std::io::Write;

#[macro_export]
macro_rules! ice {
    ($message:expr) => {{
        let message = $message;
        let file = file!();
        let line = line!();
        let column = column!();
        panic!(
            "internal compiler error ({}:{}:{}):\n{}",
            file, line, column, message
        )
    }};
}

/// Render each warning as a miette report into the given writer.
///
/// Returns the number of warnings written.
pub fn write_warnings<W, D, I>(out: &mut W, warnings: I) -> std::io::Result<usize>
where
    W: Write,
    D: Diagnostic + Send + Sync + 'static,
    I: IntoIterator<Item = D>,
{
    let mut count = 0;
    for warning in warnings {
        let report = Report::new(warning);
        writeln!(out, "{:?}", report)?;
        count += 1;
    }
    Ok(count)
}

/// Render each warning as a miette report on stderr.
pub fn report_warnings<D, I>(warnings: I) -> usize
where
    D: Diagnostic + Send + Sync + 'static,
    I: IntoIterator<Item = D>,
{
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    // Write errors count as zero warnings written.
    write_warnings(&mut handle, warnings).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::write_warnings;
    use eight_macros::assert_ok;
    use miette::Diagnostic;
    use thiserror::Error;

    #[derive(Error, Diagnostic, Debug)]
    #[diagnostic(code(test::unused), severity(Warning))]
    #[error("block {name} is never used")]
    struct UnusedWarning {
        name: String,
    }

    #[test]
    fn test_write_warnings_renders_every_warning() {
        let mut buf = Vec::new();
        let written = assert_ok!(write_warnings(
            &mut buf,
            vec![
                UnusedWarning {
                    name: "if.then".to_owned()
                },
                UnusedWarning {
                    name: "if.else".to_owned()
                },
            ]
        ));
        assert_eq!(written, 2);
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("block if.then is never used"));
        assert!(text.contains("block if.else is never used"));
    }

    #[test]
    #[should_panic(expected = "internal compiler error")]
    fn test_ice_panics_with_location() {
        ice!("unreachable state");
    }
}
