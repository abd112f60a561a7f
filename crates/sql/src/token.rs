use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// Preserves the original casing of the literal text, per C9's
    /// "case-preserving for identifiers and literals".
    StringLit(String),
    IntLit(i64),
    Placeholder,
    Comma,
    LParen,
    RParen,
    Semicolon,
    Star,
    Dot,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Hand-rolled tokenizer (spec.md §6.1 grammar, SPEC_FULL.md §H "no registry
/// crate parses the K9db DDL extensions").
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut out = Vec::new();
        while let Some(tok) = self.next_token()? {
            out.push(tok);
        }
        Ok(out)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_whitespace();
        let Some(b) = self.peek() else { return Ok(None) };

        let tok = match b {
            b',' => { self.advance(); Token::Comma }
            b'(' => { self.advance(); Token::LParen }
            b')' => { self.advance(); Token::RParen }
            b';' => { self.advance(); Token::Semicolon }
            b'*' => { self.advance(); Token::Star }
            b'.' => { self.advance(); Token::Dot }
            b'?' => { self.advance(); Token::Placeholder }
            b'=' => { self.advance(); Token::Eq }
            b'!' if self.peek_at(1) == Some(b'=') => { self.pos += 2; Token::NotEq }
            b'<' if self.peek_at(1) == Some(b'>') => { self.pos += 2; Token::NotEq }
            b'<' if self.peek_at(1) == Some(b'=') => { self.pos += 2; Token::LtEq }
            b'<' => { self.advance(); Token::Lt }
            b'>' if self.peek_at(1) == Some(b'=') => { self.pos += 2; Token::GtEq }
            b'>' => { self.advance(); Token::Gt }
            b'\'' => self.read_string()?,
            b'-' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number()?,
            b if b.is_ascii_digit() => self.read_number()?,
            b if b.is_ascii_alphabetic() || b == b'_' => self.read_ident(),
            other => {
                return Err(ParseError::UnexpectedToken {
                    found: (other as char).to_string(),
                    expected: "a token",
                })
            }
        };
        Ok(Some(tok))
    }

    fn read_string(&mut self) -> Result<Token, ParseError> {
        self.advance(); // opening quote
        let start = self.pos;
        loop {
            match self.advance() {
                Some(b'\'') if self.peek() == Some(b'\'') => {
                    // escaped '' -> literal quote; keep scanning.
                    self.advance();
                }
                Some(b'\'') => {
                    let raw = &self.src[start..self.pos - 1];
                    return Ok(Token::StringLit(raw.replace("''", "'")));
                }
                Some(_) => {}
                None => return Err(ParseError::UnterminatedString),
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.advance();
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.advance();
        }
        let text = &self.src[start..self.pos];
        text.parse::<i64>()
            .map(Token::IntLit)
            .map_err(|_| ParseError::InvalidNumber(text.to_string()))
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.advance();
        }
        Token::Ident(self.src[start..self.pos].to_string())
    }
}
