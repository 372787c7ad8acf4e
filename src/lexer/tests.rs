#[cfg(test)]
mod lexer_tests {
    use crate::error::ErrorKind;
    use crate::lexer::token::TokenKind;
    use crate::lexer::tokenize;

    fn lex_ok(input: &str) -> Vec<TokenKind> {
        let result = tokenize(input);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|t| t.kind).collect()
    }

    fn lex_errors(input: &str) -> Vec<ErrorKind> {
        let result = tokenize(input);
        result.errors.into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn empty_input() {
        assert_eq!(lex_ok(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn blank_lines() {
        assert_eq!(
            lex_ok("\n\n"),
            vec![TokenKind::Newline, TokenKind::Newline, TokenKind::Eof]
        );
    }

    #[test]
    fn line_number_is_a_plain_number() {
        assert_eq!(
            lex_ok("10 PRINT"),
            vec![TokenKind::Number(10.0), TokenKind::Print, TokenKind::Eof]
        );
    }

    #[test]
    fn identifiers_with_type_suffix() {
        assert_eq!(
            lex_ok("A A$ A% ab12"),
            vec![
                TokenKind::Identifier("A".into()),
                TokenKind::Identifier("A$".into()),
                TokenKind::Identifier("A%".into()),
                TokenKind::Identifier("ab12".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_case_insensitive() {
        assert_eq!(
            lex_ok("print Print PRINT"),
            vec![
                TokenKind::Print,
                TokenKind::Print,
                TokenKind::Print,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn numeric_literals() {
        let kinds = lex_ok("1 3.14 .5 2E3 2.5E-2");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(3.14),
                TokenKind::Number(0.5),
                TokenKind::Number(2000.0),
                TokenKind::Number(0.025),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unary_minus_is_not_part_of_the_number() {
        assert_eq!(
            lex_ok("-5"),
            vec![TokenKind::Minus, TokenKind::Number(5.0), TokenKind::Eof]
        );
    }

    #[test]
    fn string_literal() {
        assert_eq!(
            lex_ok("\"hello world\""),
            vec![TokenKind::String("hello world".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert_eq!(lex_errors("\"hello"), vec![ErrorKind::UnterminatedString]);
    }

    #[test]
    fn unterminated_string_at_newline_is_an_error() {
        assert_eq!(
            lex_errors("\"hello\n world\""),
            vec![ErrorKind::UnterminatedString]
        );
    }

    #[test]
    fn rem_swallows_rest_of_line() {
        assert_eq!(
            lex_ok("REM this is : not three statements\n10 END"),
            vec![
                TokenKind::Rem("this is : not three statements".into()),
                TokenKind::Newline,
                TokenKind::Number(10.0),
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn colon_separates_statements() {
        assert_eq!(
            lex_ok("PRINT 1:PRINT 2"),
            vec![
                TokenKind::Print,
                TokenKind::Number(1.0),
                TokenKind::Colon,
                TokenKind::Print,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn relational_operators() {
        assert_eq!(
            lex_ok("< <= <> > >= ="),
            vec![
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::NotEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Equal,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn hash_for_file_numbers() {
        assert_eq!(
            lex_ok("PRINT #1, X"),
            vec![
                TokenKind::Print,
                TokenKind::Hash,
                TokenKind::Number(1.0),
                TokenKind::Comma,
                TokenKind::Identifier("X".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unexpected_character_is_an_error() {
        assert_eq!(lex_errors("@"), vec![ErrorKind::UnexpectedCharacter]);
    }

    #[test]
    fn builtin_function_names_are_plain_identifiers() {
        assert_eq!(
            lex_ok("ABS(X)"),
            vec![
                TokenKind::Identifier("ABS".into()),
                TokenKind::LParen,
                TokenKind::Identifier("X".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn spans_line_numbers() {
        let result = tokenize("PRINT\nINPUT");
        assert_eq!(result.tokens[0].span.line, 1);
        assert_eq!(result.tokens[2].span.line, 2);
    }

    #[test]
    fn spans_column_numbers() {
        let result = tokenize("  PRINT");
        assert_eq!(result.tokens[0].span.col, 3);
    }

    #[test]
    fn full_program_line() {
        let kinds = lex_ok("10 FOR I = 1 TO 10 STEP 2\n20 NEXT I\n");
        assert!(kinds.contains(&TokenKind::For));
        assert!(kinds.contains(&TokenKind::To));
        assert!(kinds.contains(&TokenKind::Step));
        assert!(kinds.contains(&TokenKind::Next));
        assert_eq!(kinds.last().unwrap(), &TokenKind::Eof);
    }

    #[test]
    fn multiple_errors_collected_in_one_pass() {
        let errors = lex_errors("@ \"unterminated");
        assert_eq!(errors.len(), 2);
    }
}
