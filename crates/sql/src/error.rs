use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of input while parsing {0}")]
    UnexpectedEof(&'static str),

    #[error("unexpected token {found:?}, expected {expected}")]
    UnexpectedToken { found: String, expected: &'static str },

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid numeric literal {0:?}")]
    InvalidNumber(String),

    #[error("unknown keyword or relation marker {0:?}")]
    UnknownRelation(String),

    #[error("empty statement")]
    EmptyStatement,
}
