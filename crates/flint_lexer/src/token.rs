use flint_span::Span;

/// A language token.
#[derive(Debug, Clone, Copy)]
pub struct Token {
    /// The token's type.
    pub kind: TokenKind,
    /// The span of the token in the text.
    pub span: Span,
    /// The 1-based source line the token starts on.
    pub line: usize,
}

impl Token {
    /// Create an EOF token.
    #[must_use]
    pub const fn eof(offset: usize, line: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::empty_at(offset),
            line,
        }
    }

    /// Check if the token is EOF.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Check if the token is an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::ErrorUnterminatedString | TokenKind::ErrorUnknownChar
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Parentheses
    /// Left parenthesis `(`.
    LeftParenthesis,
    /// Right parenthesis `)`.
    RightParenthesis,

    // Braces
    /// Left curly brace `{`.
    LeftBrace,
    /// Right curly brace `}`.
    RightBrace,

    // Miscellaneous
    /// Comma `,`.
    Comma,
    /// Dot `.`.
    Dot,
    /// Minus `-`.
    Minus,
    /// Plus `+`.
    Plus,
    /// Semicolon `;`.
    Semicolon,
    /// Asterisk `*`.
    Star,
    /// Exclamation mark `!`.
    Bang,
    /// Equals sign `=`.
    Equal,
    /// Less than `<`.
    LessThan,
    /// Greater than `>`.
    GreaterThan,
    /// Forward slash `/`.
    Slash,

    // Multi-character operators.
    /// Not equals `!=`.
    BangEqual,
    /// Equals equals `==`.
    EqualEqual,
    /// Less than or equals `<=`.
    LessThanEqual,
    /// Greater than or equals `>=`.
    GreaterThanEqual,

    // Literals
    /// Numeric literals.
    NumericLiteral,
    /// String literals.
    StringLiteral,
    /// Identifiers.
    Ident,

    // Keywords
    /// The `and` keyword.
    KeywordAnd,
    /// The `class` keyword.
    KeywordClass,
    /// The `else` keyword.
    KeywordElse,
    /// The `false` keyword.
    KeywordFalse,
    /// The `for` keyword.
    KeywordFor,
    /// The `fun` keyword.
    KeywordFun,
    /// The `if` keyword.
    KeywordIf,
    /// The `nil` keyword.
    KeywordNil,
    /// The `or` keyword.
    KeywordOr,
    /// The `print` keyword.
    KeywordPrint,
    /// The `return` keyword.
    KeywordReturn,
    /// The `super` keyword.
    KeywordSuper,
    /// The `this` keyword.
    KeywordThis,
    /// The `true` keyword.
    KeywordTrue,
    /// The `var` keyword.
    KeywordVar,
    /// The `while` keyword.
    KeywordWhile,

    /// End of file.
    Eof,

    // Error tokens.
    /// The error when a string runs into EOF without a closing quote.
    /// Multiline strings are allowed, so this can only happen once.
    ErrorUnterminatedString,
    /// The error when the text contains an unknown character.
    ErrorUnknownChar,
}

impl TokenKind {
    /// The message the parser reports when it trips over an error token.
    #[must_use]
    pub const fn error_message(self) -> Option<&'static str> {
        match self {
            Self::ErrorUnterminatedString => Some("unterminated string"),
            Self::ErrorUnknownChar => Some("unexpected character"),
            _ => None,
        }
    }

    /// The token's name, as printed by the tokenizer dump.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LeftParenthesis => "LEFT_PAREN",
            Self::RightParenthesis => "RIGHT_PAREN",
            Self::LeftBrace => "LEFT_BRACE",
            Self::RightBrace => "RIGHT_BRACE",
            Self::Comma => "COMMA",
            Self::Dot => "DOT",
            Self::Minus => "MINUS",
            Self::Plus => "PLUS",
            Self::Semicolon => "SEMICOLON",
            Self::Star => "STAR",
            Self::Bang => "BANG",
            Self::Equal => "EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::GreaterThan => "GREATER_THAN",
            Self::Slash => "SLASH",
            Self::BangEqual => "BANG_EQUAL",
            Self::EqualEqual => "EQUAL_EQUAL",
            Self::LessThanEqual => "LESS_EQUAL",
            Self::GreaterThanEqual => "GREATER_EQUAL",
            Self::NumericLiteral => "NUMBER",
            Self::StringLiteral => "STRING",
            Self::Ident => "IDENTIFIER",
            Self::KeywordAnd => "AND",
            Self::KeywordClass => "CLASS",
            Self::KeywordElse => "ELSE",
            Self::KeywordFalse => "FALSE",
            Self::KeywordFor => "FOR",
            Self::KeywordFun => "FUN",
            Self::KeywordIf => "IF",
            Self::KeywordNil => "NIL",
            Self::KeywordOr => "OR",
            Self::KeywordPrint => "PRINT",
            Self::KeywordReturn => "RETURN",
            Self::KeywordSuper => "SUPER",
            Self::KeywordThis => "THIS",
            Self::KeywordTrue => "TRUE",
            Self::KeywordVar => "VAR",
            Self::KeywordWhile => "WHILE",
            Self::Eof => "EOF",
            Self::ErrorUnterminatedString => "ERROR_UNTERMINATED_STRING",
            Self::ErrorUnknownChar => "ERROR_UNKNOWN_CHAR",
        }
    }
}
