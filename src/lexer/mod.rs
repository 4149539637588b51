use crate::lexer::cursor::Cursor;
use crate::symbol::{Span, SrcOffset};

pub mod cursor;

/// A 'light' token that only carries basic and easily derivable info
#[derive(Debug)]
pub struct LToken {
    pub kind: LTokenKind,
    pub len: usize,
}

impl LToken {
    pub fn new(kind: LTokenKind, len: usize) -> Self {
        LToken { kind, len }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LTokenKind {
    /// Mnemonic, register, literal or label. Told apart by the parser.
    Word,
    /// Ends a label declaration
    Colon,
    /// Runs to the end of the line
    Comment,
    /// Also includes commas
    Whitespace,
    Eof,
}

/// Token positioned within the whole source file.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: LTokenKind,
    pub span: Span,
}

/// Test if a character is considered to be whitespace.
pub(crate) fn is_whitespace(c: char) -> bool {
    // Operands may be separated by commas, spaces or both
    matches!(c, ' ' | '\t' | '\r' | '\n' | ',')
}

/// Test if a character starts a comment.
pub(crate) fn is_comment(c: char) -> bool {
    matches!(c, ';' | '@')
}

fn is_word(c: char) -> bool {
    !is_whitespace(c) && !is_comment(c) && c != ':'
}

/// Test if a word is usable as a label name.
pub(crate) fn is_ident(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some('a'..='z' | 'A'..='Z' | '_'))
        && chars.all(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_'))
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> LToken {
        let first_char = match self.bump() {
            Some(c) => c,
            None => return LToken::new(LTokenKind::Eof, 0),
        };
        let token_kind = match first_char {
            c if is_comment(c) => {
                self.take_while(|c| c != '\n');
                LTokenKind::Comment
            }
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                LTokenKind::Whitespace
            }
            ':' => LTokenKind::Colon,
            _ => {
                self.take_while(is_word);
                LTokenKind::Word
            }
        };
        let res = LToken::new(token_kind, self.pos_in_token());
        self.reset_pos();
        res
    }
}

/// Split one source line into tokens, dropping whitespace and comments.
///
/// `offs` is the position of the line within the source file so that spans point into the file.
pub fn tokenize_line(line: &str, offs: usize) -> Vec<Token> {
    let mut cursor = Cursor::new(line);
    let mut pos = offs;
    let mut toks = Vec::new();
    loop {
        let tok = cursor.advance_token();
        let span = Span::new(SrcOffset(pos), tok.len);
        pos += tok.len;
        match tok.kind {
            LTokenKind::Eof | LTokenKind::Comment => break,
            LTokenKind::Whitespace => continue,
            kind => toks.push(Token { kind, span }),
        }
    }
    toks
}
