use miette::Diagnostic;
use nom::bytes::complete::take_while;
use nom::character::complete::char;
use nom::combinator::{complete, fail, rest, verify};
use nom::IResult;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("failed to parse emit query {query:?}")]
    #[diagnostic(
        code(driver::invalid_query),
        help("queries have the form mir.fn.<function name>")
    )]
    InvalidQuery { query: String },
    #[error("emit query {query:?} matches no function in module {module}")]
    #[diagnostic(code(driver::unknown_function))]
    UnknownFunction { query: String, module: String },
}

/// A query for the output of the compiler.
///
/// Dumping an entire module can produce a lot of output. Textual passes accept queries instead, so
/// that only the entities of interest are printed.
///
/// The query syntax is loosely as follows. The `query` part is passed to the parser of the
/// namespace.
///
/// ```text
/// query     ::= namespace DOT category DOT query
/// namespace ::= identifier
/// category  ::= identifier
/// query     ::= any
/// ```
///
/// For example, the query `mir.fn.min` requests the MIR for the function named `min`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitQuery {
    Mir(MirEmitQuery),
}

impl EmitQuery {
    /// Parse a list of queries.
    pub fn from_queries<I, S>(queries: I) -> Result<Vec<Self>, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        queries
            .into_iter()
            .map(|query| {
                let query = query.as_ref();
                complete(Self::parse)(query)
                    .map(|(_, parsed)| parsed)
                    .map_err(|_| QueryError::InvalidQuery {
                        query: query.to_owned(),
                    })
            })
            .collect()
    }

    /// Parse a single query.
    fn parse(input: &str) -> IResult<&str, Self> {
        let (input, namespace) = take_while(|c: char| c != '.')(input)?;
        let (input, _) = char('.')(input)?;
        match namespace {
            "mir" => {
                let (input, query) = MirEmitQuery::parse(input)?;
                Ok((input, Self::Mir(query)))
            }
            _ => fail(input),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirEmitQuery {
    /// Emit the MIR for this function
    Function(String),
}

impl MirEmitQuery {
    /// Parse a `mir` namespace query.
    pub fn parse(input: &str) -> IResult<&str, Self> {
        let (input, category) = take_while(|c: char| c != '.')(input)?;
        let (input, _) = char('.')(input)?;
        match category {
            "fn" => Self::parse_function_query(input),
            _ => fail(input),
        }
    }

    /// Parse a `mir.fn` category query.
    fn parse_function_query(input: &str) -> IResult<&str, Self> {
        let (input, name) = verify(rest, |name: &str| !name.is_empty())(input)?;
        Ok((input, Self::Function(name.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use crate::query::{EmitQuery, MirEmitQuery, QueryError};
    use eight_macros::{assert_err, assert_matches, assert_ok};

    #[test]
    fn test_parse_mir_fn_query() {
        let query = EmitQuery::from_queries(["mir.fn.min"]);
        let query = assert_ok!(query);
        assert_eq!(query.len(), 1);
        let function_name =
            assert_matches!(&query[0], EmitQuery::Mir(MirEmitQuery::Function(p)) => p);
        assert_eq!(function_name, "min");
    }

    #[test]
    fn test_function_names_may_contain_dots() {
        let query = assert_ok!(EmitQuery::from_queries(["mir.fn.llvm.memcpy"]));
        assert_eq!(
            query,
            vec![EmitQuery::Mir(MirEmitQuery::Function("llvm.memcpy".to_owned()))]
        );
    }

    #[test]
    fn test_reject_malformed_queries() {
        for input in ["hir.fn.min", "mir.block.entry", "mir.fn.", "mir", ""] {
            let err = assert_err!(EmitQuery::from_queries([input]));
            assert_matches!(err, QueryError::InvalidQuery { query } => assert_eq!(query, input));
        }
    }
}
