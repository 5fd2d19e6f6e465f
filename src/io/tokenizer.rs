//! Whitespace tokenizer with a position-tracking cursor
//!
//! HLZ files carry no field names and no delimiters beyond whitespace. The
//! [`TokenCursor`] splits a file into its tokens once and hands them out in file
//! order, remembering the line each token was on so decoders can report where
//! a record starts or where the input ran out.
//!
//! ```
//! use hlz_importer::io::TokenCursor;
//!
//! let mut cursor = TokenCursor::new(b"0001 HLZ\n017");
//! assert_eq!(cursor.next_token("runningNumber").unwrap(), "0001");
//! assert_eq!(cursor.line(), 1);
//! assert_eq!(cursor.remaining(), 2);
//! ```

use crate::types::{ImportError, TokenPosition};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    line: usize,
}

/// Ordered, position-tracked view over the tokens of one file
///
/// Created per file and dropped after decode. Non-UTF-8 bytes are replaced,
/// since legacy producers write Latin-1 and decoders only care about field
/// count.
#[derive(Debug, Clone)]
pub struct TokenCursor {
    tokens: Vec<Token>,
    index: usize,
    last_line: usize,
}

impl TokenCursor {
    /// Tokenize raw file bytes
    pub fn new(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let tokens: Vec<Token> = text
            .lines()
            .enumerate()
            .flat_map(|(i, line)| {
                line.split_whitespace().map(move |t| Token {
                    text: t.to_string(),
                    line: i + 1,
                })
            })
            .collect();
        let last_line = text.lines().count().max(1);

        Self {
            tokens,
            index: 0,
            last_line,
        }
    }

    /// Take the next token
    ///
    /// # Errors
    ///
    /// Returns `TruncatedRecord` naming `expected_field` when the input is
    /// exhausted.
    pub fn next_token(&mut self, expected_field: &str) -> Result<String, ImportError> {
        match self.tokens.get(self.index) {
            Some(token) => {
                self.index += 1;
                Ok(token.text.clone())
            }
            None => Err(ImportError::truncated(expected_field, self.position())),
        }
    }

    /// Line of the token the next call will return
    ///
    /// Past the end of input this is the last line of the file.
    pub fn line(&self) -> usize {
        self.tokens
            .get(self.index)
            .map(|t| t.line)
            .unwrap_or(self.last_line)
    }

    /// Index of the next token in the whole stream
    pub fn offset(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> TokenPosition {
        TokenPosition {
            line: self.line(),
            offset: self.offset(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.index
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_in_file_order_across_lines() {
        let mut cursor = TokenCursor::new(b"a b\n  c\t d\n\ne");

        let mut seen = Vec::new();
        while !cursor.is_exhausted() {
            let line = cursor.line();
            seen.push((cursor.next_token("f").unwrap(), line));
        }

        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 1),
                ("c".to_string(), 2),
                ("d".to_string(), 2),
                ("e".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_next_past_end_is_truncated() {
        let mut cursor = TokenCursor::new(b"only\n");
        cursor.next_token("first").unwrap();

        let err = cursor.next_token("second").unwrap_err();
        assert_eq!(
            err,
            ImportError::truncated("second", TokenPosition { line: 1, offset: 1 })
        );
    }

    #[test]
    fn test_empty_input() {
        let mut cursor = TokenCursor::new(b"");
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.line(), 1);
        assert!(matches!(
            cursor.next_token("x"),
            Err(ImportError::TruncatedRecord { .. })
        ));
    }

    #[test]
    fn test_crlf_and_latin1_bytes() {
        let mut cursor = TokenCursor::new(b"M\xfcller 1\r\n2\r\n");
        assert_eq!(cursor.remaining(), 3);
        assert!(cursor.next_token("user").unwrap().starts_with('M'));
        cursor.next_token("a").unwrap();
        assert_eq!(cursor.line(), 2);
    }

    #[test]
    fn test_offset_counts_consumed_tokens() {
        let mut cursor = TokenCursor::new(b"1 2 3");
        cursor.next_token("a").unwrap();
        cursor.next_token("b").unwrap();
        assert_eq!(cursor.offset(), 2);
        assert_eq!(cursor.remaining(), 1);
    }
}
