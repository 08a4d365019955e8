/// A lexical token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
    /// Whether whitespace separates this token from the previous one.
    pub spaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    OpenParen,
    CloseParen,
    Comma,
    Colon,
    Word(String),
}

/// Operator keywords, recognized case-insensitively on bare words only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Xor,
    Not,
}

impl Token {
    pub fn keyword(&self) -> Option<Keyword> {
        let TokenKind::Word(word) = &self.kind else {
            return None;
        };
        [
            ("and", Keyword::And),
            ("or", Keyword::Or),
            ("xor", Keyword::Xor),
            ("not", Keyword::Not),
        ]
        .into_iter()
        .find(|(text, _)| word.eq_ignore_ascii_case(text))
        .map(|(_, keyword)| keyword)
    }
}

pub fn is_word_breaker(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | ',' | ':')
}

/// Split a raw search string into tokens.
///
/// Words are maximal runs of characters other than whitespace and the
/// punctuation `( ) , :`, so `not(travail)` yields `not`, `(`, `travail`,
/// `)`.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    let mut spaced = false;

    while let Some(&(position, ch)) = chars.peek() {
        if ch.is_whitespace() {
            spaced = true;
            chars.next();
            continue;
        }

        let kind = match ch {
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            _ => None,
        };

        let kind = match kind {
            Some(kind) => {
                chars.next();
                kind
            }
            None => {
                let mut end = input.len();
                while let Some(&(idx, c)) = chars.peek() {
                    if is_word_breaker(c) {
                        end = idx;
                        break;
                    }
                    chars.next();
                }
                TokenKind::Word(input[position..end].to_string())
            }
        };

        tokens.push(Token {
            kind,
            position,
            spaced,
        });
        spaced = false;
    }

    tokens
}
