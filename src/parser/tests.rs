#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::lexer::tokenize;
    use crate::parser::ast::{BinOp, Expr, StatementKind};
    use crate::parser::parse;

    fn parse_ok(input: &str) -> Vec<crate::parser::ast::Stmt> {
        let lexed = tokenize(input);
        assert!(lexed.errors.is_empty(), "lexer errors: {:?}", lexed.errors);
        let parsed = parse(&lexed.tokens);
        assert!(parsed.errors.is_empty(), "parser errors: {:?}", parsed.errors);
        parsed.statements
    }

    fn parse_errors(input: &str) -> Vec<ErrorKind> {
        let lexed = tokenize(input);
        let parsed = parse(&lexed.tokens);
        parsed.errors.into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn parses_implicit_let() {
        let stmts = parse_ok("10 X = 5\n");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].line_number, Some(10));
        match &stmts[0].kind {
            StatementKind::Let { var, value } => {
                assert_eq!(var, "X");
                assert_eq!(*value, Expr::Number(5.0));
            }
            other => panic!("expected Let, got {:?}", other),
        }
    }

    #[test]
    fn parses_array_assignment() {
        let stmts = parse_ok("10 A(1, 2) = 9\n");
        match &stmts[0].kind {
            StatementKind::ArrayAssign { target, value } => {
                assert_eq!(target.name, "A");
                assert_eq!(target.indices.len(), 2);
                assert_eq!(*value, Expr::Number(9.0));
            }
            other => panic!("expected ArrayAssign, got {:?}", other),
        }
    }

    #[test]
    fn colon_separates_statements_on_one_line() {
        let stmts = parse_ok("10 X = 1 : Y = 2\n");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].line_number, Some(10));
        assert_eq!(stmts[1].line_number, None);
    }

    #[test]
    fn expression_precedence_follows_the_climbing_table() {
        // 2 + 3 * 4 = 2 + (3 * 4), not (2 + 3) * 4.
        let stmts = parse_ok("10 X = 2 + 3 * 4\n");
        match &stmts[0].kind {
            StatementKind::Let { value, .. } => match value {
                Expr::Binary { op: BinOp::Add, lhs, rhs } => {
                    assert_eq!(**lhs, Expr::Number(2.0));
                    assert_eq!(**rhs, Expr::Binary {
                        op: BinOp::Mul,
                        lhs: Box::new(Expr::Number(3.0)),
                        rhs: Box::new(Expr::Number(4.0)),
                    });
                }
                other => panic!("expected an Add at the top, got {:?}", other),
            },
            other => panic!("expected Let, got {:?}", other),
        }
    }

    #[test]
    fn pow_is_right_associative() {
        let stmts = parse_ok("10 X = 2 ^ 3 ^ 2\n");
        match &stmts[0].kind {
            StatementKind::Let { value, .. } => match value {
                Expr::Binary { op: BinOp::Pow, lhs, rhs } => {
                    assert_eq!(**lhs, Expr::Number(2.0));
                    assert_eq!(**rhs, Expr::Binary {
                        op: BinOp::Pow,
                        lhs: Box::new(Expr::Number(3.0)),
                        rhs: Box::new(Expr::Number(2.0)),
                    });
                }
                other => panic!("expected a Pow at the top, got {:?}", other),
            },
            other => panic!("expected Let, got {:?}", other),
        }
    }

    #[test]
    fn builtin_name_becomes_a_call_not_an_array_access() {
        let stmts = parse_ok("10 X = ABS(-5)\n");
        match &stmts[0].kind {
            StatementKind::Let { value, .. } => {
                assert!(matches!(value, Expr::Call { name, .. } if name == "ABS"));
            }
            other => panic!("expected Let, got {:?}", other),
        }
    }

    #[test]
    fn non_builtin_name_becomes_an_array_access() {
        let stmts = parse_ok("10 X = SCORES(1)\n");
        match &stmts[0].kind {
            StatementKind::Let { value, .. } => {
                assert!(matches!(value, Expr::ArrayAccess { name, .. } if name == "SCORES"));
            }
            other => panic!("expected Let, got {:?}", other),
        }
    }

    #[test]
    fn fn_call_is_never_ambiguous_with_array_access() {
        let stmts = parse_ok("10 Y = FN SQUARE(5)\n");
        match &stmts[0].kind {
            StatementKind::Let { value, .. } => {
                assert!(matches!(value, Expr::FnCall { name, .. } if name == "SQUARE"));
            }
            other => panic!("expected Let, got {:?}", other),
        }
    }

    #[test]
    fn for_next_parses_as_flat_siblings() {
        let stmts = parse_ok("10 FOR I = 1 TO 10 STEP 2\n20 PRINT I\n30 NEXT I\n");
        assert!(matches!(stmts[0].kind, StatementKind::For { .. }));
        assert!(matches!(stmts[1].kind, StatementKind::Print { .. }));
        assert!(matches!(stmts[2].kind, StatementKind::Next { .. }));
    }

    #[test]
    fn single_line_if_then_else() {
        let stmts = parse_ok("10 IF X = 1 THEN Y = 2 ELSE Y = 3\n");
        match &stmts[0].kind {
            StatementKind::If { then_branch, else_branch, .. } => {
                assert_eq!(then_branch.len(), 1);
                assert_eq!(else_branch.as_ref().unwrap().len(), 1);
            }
            other => panic!("expected If, got {:?}", other),
        }
    }

    #[test]
    fn if_then_lineno_is_shorthand_for_goto() {
        let stmts = parse_ok("10 IF X = 1 THEN 100\n");
        match &stmts[0].kind {
            StatementKind::If { then_branch, .. } => {
                assert_eq!(then_branch.len(), 1);
                assert!(matches!(then_branch[0].kind, StatementKind::Goto(100)));
            }
            other => panic!("expected If, got {:?}", other),
        }
    }

    #[test]
    fn block_if_spans_multiple_lines_to_endif() {
        let stmts = parse_ok("10 IF X = 1 THEN\n20 Y = 2\n30 ELSE\n40 Y = 3\n50 ENDIF\n");
        match &stmts[0].kind {
            StatementKind::If { then_branch, else_branch, .. } => {
                assert_eq!(then_branch.len(), 1);
                assert_eq!(else_branch.as_ref().unwrap().len(), 1);
            }
            other => panic!("expected If, got {:?}", other),
        }
    }

    #[test]
    fn next_without_for_is_a_structural_error() {
        let errors = parse_errors("10 NEXT I\n");
        assert!(errors.contains(&ErrorKind::NextWithoutFor));
    }

    #[test]
    fn for_without_next_is_a_structural_error() {
        let errors = parse_errors("10 FOR I = 1 TO 10\n20 PRINT I\n");
        assert!(errors.contains(&ErrorKind::ForWithoutNext));
    }

    #[test]
    fn next_variable_mismatch_is_a_structural_error() {
        let errors = parse_errors("10 FOR I = 1 TO 10\n20 NEXT J\n");
        assert!(errors.contains(&ErrorKind::NextVariableMismatch));
    }

    #[test]
    fn do_loop_needs_a_condition_on_one_side() {
        let errors = parse_errors("10 DO\n20 X = 1\n30 LOOP\n");
        assert!(errors.contains(&ErrorKind::MissingTerminator));
    }

    #[test]
    fn do_loop_until_on_the_loop_side_is_fine() {
        let stmts = parse_ok("10 DO\n20 X = X + 1\n30 LOOP UNTIL X >= 3\n");
        assert!(matches!(stmts[0].kind, StatementKind::Do { cond: None }));
        assert!(matches!(stmts[2].kind, StatementKind::Loop { cond: Some(_) }));
    }

    #[test]
    fn for_inside_an_if_branch_is_rejected() {
        let errors = parse_errors("10 IF X = 1 THEN\n20 FOR I = 1 TO 5\n30 NEXT I\n40 ENDIF\n");
        assert!(!errors.is_empty());
    }

    #[test]
    fn data_statement_accepts_signed_numbers_and_strings() {
        let stmts = parse_ok("10 DATA 1, -2, \"hello\"\n");
        assert!(matches!(stmts[0].kind, StatementKind::Data(ref items) if items.len() == 3));
    }

    #[test]
    fn dim_parses_multiple_arrays() {
        let stmts = parse_ok("10 DIM A(10), B(5, 5)\n");
        match &stmts[0].kind {
            StatementKind::Dim { arrays } => {
                assert_eq!(arrays.len(), 2);
                assert_eq!(arrays[0].1.len(), 1);
                assert_eq!(arrays[1].1.len(), 2);
            }
            other => panic!("expected Dim, got {:?}", other),
        }
    }

    #[test]
    fn print_records_trailing_separator() {
        let stmts = parse_ok("10 PRINT X;\n");
        match &stmts[0].kind {
            StatementKind::Print { items, .. } => {
                assert_eq!(items.len(), 1);
                assert!(items[0].sep.is_some());
            }
            other => panic!("expected Print, got {:?}", other),
        }
    }

    #[test]
    fn line_graphics_statement_parses_box_style() {
        let stmts = parse_ok("10 LINE (0,0)-(10,10), 5, BF\n");
        match &stmts[0].kind {
            StatementKind::Graphics(crate::parser::ast::GraphicsStatement::Line { boxed, filled, .. }) => {
                assert!(*boxed);
                assert!(*filled);
            }
            other => panic!("expected a Line graphics statement, got {:?}", other),
        }
    }
}
