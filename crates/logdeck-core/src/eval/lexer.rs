//! Tokenizer for the console language.

use super::Condition;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token start.
    pub offset: usize,
}

/// Longest first so `===` wins over `==` and `=`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "**=", "...", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "+=", "-=", "*=",
    "/=", "%=", "**", "=>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/",
    "%", "!", "=", "?", ":", ".",
];

pub struct Lexer<'src> {
    source: &'src str,
    position: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    fn rest(&self) -> &'src str {
        &self.source[self.position..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.position += c.len_utf8();
        Some(c)
    }

    /// Tokenizes the whole source. Newlines are kept as tokens so the parser
    /// can treat them as statement separators.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Condition> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn skip_trivia(&mut self) -> Result<bool, Condition> {
        let mut saw_newline = false;
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                let end = rest.find('\n').unwrap_or(rest.len());
                self.position += end;
            } else if rest.starts_with("/*") {
                let Some(end) = rest[2..].find("*/") else {
                    return Err(Condition::syntax("Invalid or unexpected token"));
                };
                saw_newline |= rest[..end + 2].contains('\n');
                self.position += end + 4;
            } else {
                match self.peek_char() {
                    Some('\n') => {
                        saw_newline = true;
                        self.advance();
                    }
                    Some(c) if c.is_whitespace() => {
                        self.advance();
                    }
                    _ => return Ok(saw_newline),
                }
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, Condition> {
        let newline_at = self.position;
        if self.skip_trivia()? {
            return Ok(Token {
                kind: TokenKind::Newline,
                offset: newline_at,
            });
        }

        let offset = self.position;
        let Some(c) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };

        let kind = match c {
            '"' | '\'' => self.scan_string(c)?,
            '`' => return Err(Condition::syntax("Template literals are not supported")),
            c if c.is_ascii_digit() => self.scan_number()?,
            '.' if self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) => {
                self.scan_number()?
            }
            c if is_ident_start(c) => self.scan_ident(),
            _ => self.scan_punct()?,
        };
        Ok(Token { kind, offset })
    }

    fn scan_string(&mut self, quote: char) -> Result<TokenKind, Condition> {
        self.advance();
        let mut out = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err(Condition::syntax("Invalid or unexpected token")),
                Some(c) if c == quote => return Ok(TokenKind::Str(out)),
                Some('\\') => match self.advance() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some('u') => out.push(self.scan_unicode_escape()?),
                    Some('x') => out.push(self.scan_hex_escape(2)?),
                    Some(other) => out.push(other),
                    None => return Err(Condition::syntax("Invalid or unexpected token")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn scan_unicode_escape(&mut self) -> Result<char, Condition> {
        if self.peek_char() == Some('{') {
            self.advance();
            let rest = self.rest();
            let end = rest
                .find('}')
                .ok_or_else(|| Condition::syntax("Invalid Unicode escape sequence"))?;
            let code = u32::from_str_radix(&rest[..end], 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Condition::syntax("Invalid Unicode escape sequence"))?;
            self.position += end + 1;
            return Ok(code);
        }
        self.scan_hex_escape(4)
    }

    fn scan_hex_escape(&mut self, digits: usize) -> Result<char, Condition> {
        let rest = self.rest();
        let hex = rest
            .get(..digits)
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| Condition::syntax("Invalid hexadecimal escape sequence"))?;
        let c = u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| Condition::syntax("Invalid hexadecimal escape sequence"))?;
        self.position += digits;
        Ok(c)
    }

    fn scan_number(&mut self) -> Result<TokenKind, Condition> {
        let rest = self.rest();
        if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            let len = hex.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(hex.len());
            let n = i64::from_str_radix(&hex[..len], 16)
                .map_err(|e| Condition::syntax(&format!("Invalid hexadecimal literal: {e}")))?;
            self.position += 2 + len;
            return Ok(TokenKind::Number(n as f64));
        }

        let bytes = rest.as_bytes();
        let mut end = 0;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'_') {
            end += 1;
        }
        if end < bytes.len() && bytes[end] == b'.' {
            end += 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
        if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut exp = end + 1;
            if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                exp += 1;
            }
            if exp < bytes.len() && bytes[exp].is_ascii_digit() {
                end = exp;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
            }
        }
        let text: String = rest[..end].chars().filter(|c| *c != '_').collect();
        let n = text
            .parse::<f64>()
            .map_err(|e| Condition::syntax(&format!("Invalid number literal: {e}")))?;
        self.position += end;
        if self.peek_char().is_some_and(is_ident_start) {
            return Err(Condition::syntax("Invalid or unexpected token"));
        }
        Ok(TokenKind::Number(n))
    }

    fn scan_ident(&mut self) -> TokenKind {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_ident_part(*c))
            .map_or(rest.len(), |(i, _)| i);
        self.position += len;
        TokenKind::Ident(rest[..len].to_string())
    }

    fn scan_punct(&mut self) -> Result<TokenKind, Condition> {
        let rest = self.rest();
        // `?.` followed by a digit is a conditional, as in `a?.5:1`.
        let found = PUNCTUATORS.iter().find(|p| {
            rest.starts_with(**p)
                && !(**p == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()))
        });
        match found {
            Some(p) => {
                self.position += p.len();
                Ok(TokenKind::Punct(p))
            }
            None => {
                let c = self.peek_char().unwrap_or_default();
                Err(Condition::syntax(&format!("Invalid or unexpected token '{c}'")))
            }
        }
    }
}

pub fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

pub fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenizes_operators_longest_first() {
        assert_eq!(
            kinds("a !== b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("!=="),
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_and_strings() {
        assert_eq!(
            kinds("1.5e2 0x10 'a\\nb'"),
            vec![
                TokenKind::Number(150.0),
                TokenKind::Number(16.0),
                TokenKind::Str("a\nb".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_newlines() {
        assert_eq!(
            kinds("1 // one\n2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Newline,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_syntax_error() {
        assert!(Lexer::new("'abc").tokenize().is_err());
    }
}
