//! Assertion macros
//!
//! This module contains macros for performing assertions in tests. Notable macros defined in this
//! module are:
//!
//! - [`assert_ok!`]
//! - [`assert_err!`]
//! - [`assert_some!`]
//! - [`assert_none!`]
//! - [`assert_matches!`]
//! - [`assert_contains!`]
//!
//! This module is only available when the `assertion-macros` feature is enabled.

/// Assert that a `Result` is `Ok`, returning the value inside the `Ok` variant.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {{
        match $expr {
            ::std::result::Result::Ok(val) => val,
            ::std::result::Result::Err(err) => {
                panic!("assertion failed: Err({:?})", err);
            }
        }
    }};
}

/// Assert that a `Result` is `Err`, returning the error inside the `Err` variant.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {{
        match $expr {
            ::std::result::Result::Ok(val) => {
                panic!("assertion failed: Ok({:?})", val);
            }
            ::std::result::Result::Err(err) => err,
        }
    }};
}

/// Assert that an `Option` is `Some`, returning the value inside the `Some` variant.
#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {{
        match $expr {
            ::std::option::Option::Some(val) => val,
            ::std::option::Option::None => {
                panic!("assertion failed: None");
            }
        }
    }};
}

/// Assert that an `Option` is `None`.
#[macro_export]
macro_rules! assert_none {
    ($expr:expr) => {{
        if let ::std::option::Option::Some(val) = $expr {
            panic!("assertion failed: Some({:?})", val);
        };
    }};
}

/// Assert that an expression matches a pattern, evaluating to the output expression with the
/// pattern bindings in scope.
#[macro_export]
macro_rules! assert_matches {
    ($expr:expr, $ty:pat_param => $output:expr) => {{
        match $expr {
            $ty => $output,
            ref other => {
                panic!(
                    "assertion failed: expected {:?} to match {}",
                    other,
                    stringify!($ty)
                );
            }
        }
    }};
}

/// Assert that a string contains the given needle.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {{
        match (&$haystack, &$needle) {
            (haystack, needle) => {
                let haystack: &str = ::std::convert::AsRef::<str>::as_ref(haystack);
                let needle: &str = ::std::convert::AsRef::<str>::as_ref(needle);
                if !haystack.contains(needle) {
                    panic!(
                        "assertion failed: expected to find {:?} in:\n{}",
                        needle, haystack
                    );
                }
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    #[derive(Debug)]
    enum Shape {
        Square(u32),
        Circle,
    }

    #[test]
    fn test_std_result_assertions() {
        let result: Result<i32, &str> = Ok(42);
        assert_eq!(assert_ok!(result), 42);
        let result: Result<i32, &str> = Err("error");
        assert_eq!(assert_err!(result), "error");
    }

    #[test]
    fn test_std_option_assertions() {
        let option: Option<i32> = Some(42);
        assert_eq!(assert_some!(option), 42);
        let option: Option<i32> = None;
        assert_none!(option);
    }

    #[test]
    fn test_assert_matches_binds_output() {
        let side = assert_matches!(Shape::Square(4), Shape::Square(side) => side);
        assert_eq!(side, 4);
    }

    #[test]
    #[should_panic(expected = "to match")]
    fn test_assert_matches_mismatch() {
        assert_matches!(Shape::Circle, Shape::Square(_) => ());
    }

    #[test]
    fn test_assert_contains() {
        let text = String::from("mem.alloca i32, align 4");
        assert_contains!(text, "align 4");
    }

    #[test]
    #[should_panic(expected = "expected to find")]
    fn test_assert_contains_missing() {
        assert_contains!("branch exit", "ret");
    }

    #[test]
    #[should_panic]
    fn test_assert_some_none() {
        let option: Option<i32> = None;
        assert_some!(option);
    }
}
