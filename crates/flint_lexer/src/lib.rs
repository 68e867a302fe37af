mod lexer;
pub mod token;

pub use lexer::Lexer;

#[cfg(test)]
mod test {
    use crate::Lexer;
    use crate::token::{Token, TokenKind};

    fn scan_all(source: &str) -> (Lexer<'_>, Vec<Token>) {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        (lexer, tokens)
    }

    #[test]
    fn scans_operators_and_keywords() {
        let (_, tokens) = scan_all("var x = 1 <= 2;");
        let kinds: Vec<TokenKind> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::KeywordVar,
                TokenKind::Ident,
                TokenKind::Equal,
                TokenKind::NumericLiteral,
                TokenKind::LessThanEqual,
                TokenKind::NumericLiteral,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexemes_slice_the_source() {
        let (lexer, tokens) = scan_all("print \"hi\";");
        assert_eq!(lexer.lexeme(&tokens[0]), Some("print"));
        assert_eq!(lexer.lexeme(&tokens[1]), Some("\"hi\""));
    }

    #[test]
    fn tracks_lines_through_comments_and_strings() {
        let (_, tokens) = scan_all("// comment\nvar a = \"one\ntwo\";\nprint a;");
        let var = &tokens[0];
        assert_eq!(var.line, 2);
        // The string token is attributed to its opening line.
        let string = &tokens[3];
        assert_eq!(string.kind, TokenKind::StringLiteral);
        assert_eq!(string.line, 2);
        // The print statement follows the two-line string.
        let print = &tokens[5];
        assert_eq!(print.kind, TokenKind::KeywordPrint);
        assert_eq!(print.line, 4);
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let (_, tokens) = scan_all("\"dangling");
        assert!(tokens[0].is_error());
        assert_eq!(tokens[0].kind, TokenKind::ErrorUnterminatedString);
    }

    #[test]
    fn number_dot_without_digits_is_property_access() {
        let (_, tokens) = scan_all("1.foo");
        let kinds: Vec<TokenKind> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::NumericLiteral,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }
}
