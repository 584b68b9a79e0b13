use crate::ast::*;
use crate::lexer::Token;
use crate::scope::{ScopeArena, ScopeId};

pub struct Parser {
    tokens: Vec<(Token, Position)>,
    pos: usize,
    scopes: ScopeArena,
    /// Line indent of each assignment being parsed, innermost last.
    statements: Vec<usize>,
}

#[derive(Debug, thiserror::Error)]
#[error("Parse error at {position}: {message}")]
pub struct ParseError {
    pub code: &'static str,
    pub position: Position,
    pub message: String,
}

type Result<T> = std::result::Result<T, ParseError>;

pub fn parse(tokens: Vec<(Token, Position)>) -> Result<Program> {
    Parser::new(tokens).parse_program()
}

/// `f (g a)` built right-recursively becomes `(f g) a`; groups are left alone.
fn apply(function: Spanned<Expr>, argument: Spanned<Expr>, scope: ScopeId) -> Spanned<Expr> {
    let pos = function.pos;
    match argument.node {
        Expr::Call { function: inner, argument: last } => {
            let head = apply(function, *inner, scope);
            Spanned::new(Expr::Call { function: Box::new(head), argument: last }, pos, scope)
        }
        node => {
            let argument = Spanned::new(node, argument.pos, argument.scope);
            Spanned::new(
                Expr::Call { function: Box::new(function), argument: Box::new(argument) },
                pos,
                scope,
            )
        }
    }
}

impl Parser {
    pub fn new(tokens: Vec<(Token, Position)>) -> Self {
        Parser { tokens, pos: 0, scopes: ScopeArena::new(), statements: Vec::new() }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    /// Position of the next token, or of the last one at end of input.
    fn peek_pos(&self) -> Position {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map(|(_, p)| *p)
            .unwrap_or(Position::NONE)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn describe_next(&self) -> String {
        self.peek().map_or_else(|| "end of input".to_string(), Token::describe)
    }

    fn expect(&mut self, expected: &Token, code: &'static str) -> Result<Position> {
        match self.peek() {
            Some(tok) if tok == expected => {
                let pos = self.peek_pos();
                self.advance();
                Ok(pos)
            }
            _ => Err(self.error(
                code,
                format!("expected {}, found {}", expected.describe(), self.describe_next()),
            )),
        }
    }

    fn expect_ident(&mut self, code: &'static str) -> Result<(String, Position)> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                let pos = self.peek_pos();
                self.advance();
                Ok((name, pos))
            }
            _ => Err(self.error(code, format!("expected a name, found {}", self.describe_next()))),
        }
    }

    fn error(&self, code: &'static str, message: String) -> ParseError {
        ParseError { code, position: self.peek_pos(), message }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// A token that opens a line at or left of the current statement's
    /// indent belongs to the next statement.
    fn at_statement_end(&self) -> bool {
        match (self.tokens.get(self.pos), self.statements.last()) {
            (None, _) => true,
            (Some((_, pos)), Some(&indent)) => pos.line_start && pos.indent <= indent,
            (Some(_), None) => false,
        }
    }

    fn starts_value(tok: &Token) -> bool {
        matches!(
            tok,
            Token::Ident(_) | Token::Number(_) | Token::LParen | Token::LBracket | Token::Dollar
        )
    }

    // ---- Assignments ----

    pub fn parse_program(mut self) -> Result<Program> {
        let mut assignments = Vec::new();
        while !self.at_end() {
            let assignment = self.parse_assignment(ScopeArena::GLOBALS)?;
            self.scopes.bind(ScopeArena::GLOBALS, &assignment.name);
            assignments.push(assignment);
        }
        Ok(Program { assignments, scopes: self.scopes })
    }

    fn parse_assignment(&mut self, enclosing: ScopeId) -> Result<Spanned<Assignment>> {
        let (name, pos) = self.expect_ident("FNT-P001")?;
        self.expect(&Token::Eq, "FNT-P002")?;
        let own = self.scopes.child(enclosing);

        self.statements.push(pos.indent);
        let value = self.parse_value(own);
        self.statements.pop();
        let value = value?;

        let mut wheres = Vec::new();
        match self.peek() {
            Some(Token::Semi) => {
                self.advance();
            }
            Some(Token::Where) => {
                self.advance();
                loop {
                    let clause = self.parse_assignment(own)?;
                    self.scopes.bind(own, &clause.name);
                    let same_line = clause.pos.line == pos.line;
                    let indent = clause.pos.indent;
                    wheres.push(clause);
                    if same_line || self.at_end() || self.peek_pos().indent != indent {
                        break;
                    }
                }
            }
            _ => {}
        }

        Ok(Spanned::new(Assignment { name, value, wheres, own_scope: own }, pos, enclosing))
    }

    // ---- Values ----

    fn parse_value(&mut self, scope: ScopeId) -> Result<Spanned<Expr>> {
        if self.at_statement_end() {
            return Err(self.error(
                "FNT-P003",
                format!("expected a value, found {}", self.describe_next()),
            ));
        }
        match self.peek() {
            Some(Token::LBracket) => self.parse_tuple(scope),
            Some(Token::Dollar) => {
                let pos = self.peek_pos();
                self.advance();
                let inner = self.parse_value(scope)?;
                Ok(Spanned::new(Expr::Group(Box::new(inner)), pos, scope))
            }
            _ => {
                let callee = self.parse_callable(scope)?;
                if !self.argument_follows(&callee) {
                    return Ok(callee);
                }
                let argument = self.parse_value(scope)?;
                Ok(apply(callee, argument, scope))
            }
        }
    }

    fn argument_follows(&self, callee: &Spanned<Expr>) -> bool {
        match self.tokens.get(self.pos) {
            Some((tok, pos)) => {
                Self::starts_value(tok) && pos.indent >= callee.pos.indent && !self.at_statement_end()
            }
            None => false,
        }
    }

    fn parse_callable(&mut self, scope: ScopeId) -> Result<Spanned<Expr>> {
        let pos = self.peek_pos();
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                if self.peek() != Some(&Token::Arrow) {
                    return Ok(Spanned::new(Expr::Var(name), pos, scope));
                }
                self.advance();
                let inner = self.scopes.child(scope);
                self.scopes.bind(inner, &name);
                let body = self.parse_value(inner)?;
                Ok(Spanned::new(Expr::Function { param: name, body: Box::new(body) }, pos, scope))
            }
            Some(Token::Number(n)) => {
                self.advance();
                Ok(Spanned::new(Expr::Number(n), pos, scope))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_value(scope)?;
                self.expect(&Token::RParen, "FNT-P004")?;
                Ok(Spanned::new(Expr::Group(Box::new(inner)), pos, scope))
            }
            _ => Err(self.error(
                "FNT-P003",
                format!("expected a value, found {}", self.describe_next()),
            )),
        }
    }

    fn parse_tuple(&mut self, scope: ScopeId) -> Result<Spanned<Expr>> {
        let pos = self.expect(&Token::LBracket, "FNT-P005")?;
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.advance();
            return Ok(Spanned::new(Expr::Tuple(items), pos, scope));
        }
        loop {
            items.push(self.parse_value(scope)?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RBracket) => {
                    self.advance();
                    return Ok(Spanned::new(Expr::Tuple(items), pos, scope));
                }
                _ => {
                    return Err(self.error(
                        "FNT-P005",
                        format!("expected ',' or ']' in tuple, found {}", self.describe_next()),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::scope::Resolution;

    fn parse_str(source: &str) -> Program {
        parse(lexer::lex(source).unwrap()).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        parse(lexer::lex(source).unwrap()).unwrap_err()
    }

    fn shape(source: &str) -> String {
        parse_str(source).assignments[0].value.node.to_string()
    }

    #[test]
    fn application_is_left_associative() {
        assert_eq!(shape("x = add a b"), "((add a) b)");
        assert_eq!(shape("x = f a b c"), "(((f a) b) c)");
    }

    #[test]
    fn parentheses_are_not_reassociated() {
        assert_eq!(shape("x = f (g a) b"), "((f (g a)) b)");
        let program = parse_str("x = f (g a)");
        let Expr::Call { argument, .. } = &program.assignments[0].value.node else {
            panic!("expected call");
        };
        assert!(matches!(argument.node, Expr::Group(_)));
    }

    #[test]
    fn dollar_groups_the_rest() {
        assert_eq!(shape("x = print $ add 1 2"), "(print ((add 1) 2))");
        assert_eq!(shape("x = print add 1 2"), "(((print add) 1) 2)");
    }

    #[test]
    fn tuples() {
        assert_eq!(shape("t = [1, add 1 2, []]"), "[1, ((add 1) 2), []]");
        assert_eq!(shape("t = []"), "[]");
    }

    #[test]
    fn functions_take_the_rest_as_body() {
        assert_eq!(shape("f = x => y => add x y"), "(x => (y => ((add x) y)))");
    }

    #[test]
    fn function_parameter_is_scoped_to_body() {
        let program = parse_str("f = x => x");
        let Expr::Function { body, .. } = &program.assignments[0].value.node else {
            panic!("expected function");
        };
        assert_eq!(
            program.scopes.resolve(body.scope, "x"),
            Some(Resolution::Dynamic { levels_up: 0, offset: 0 })
        );
        assert_eq!(program.scopes.resolve(program.assignments[0].value.scope, "x"), None);
    }

    #[test]
    fn new_line_at_statement_indent_starts_a_statement() {
        let program = parse_str("x = f\ny = 2\n");
        assert_eq!(program.assignments.len(), 2);
        assert_eq!(program.scopes.names(ScopeArena::GLOBALS), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn indented_line_continues_the_value() {
        assert_eq!(shape("main = print\n  (add 1 2)\n"), "(print ((add 1) 2))");
    }

    #[test]
    fn semicolon_ends_a_statement() {
        let program = parse_str("x = 1; y = 2");
        assert_eq!(program.assignments.len(), 2);
    }

    #[test]
    fn where_block_collects_aligned_clauses() {
        let src = "b = print (add k inner)\n  where\n    k = 2\n    inner = succ k\n      where\n        k = 40\nc = 1\n";
        let program = parse_str(src);
        assert_eq!(program.assignments.len(), 2);
        let b = &program.assignments[0];
        assert_eq!(b.wheres.len(), 2);
        assert_eq!(b.wheres[1].name, "inner");
        assert_eq!(b.wheres[1].wheres.len(), 1);
        assert_eq!(program.scopes.names(b.own_scope), &["k".to_string(), "inner".to_string()]);
        assert_eq!(program.scopes.names(b.wheres[1].own_scope), &["k".to_string()]);
        assert_eq!(b.scope, ScopeArena::GLOBALS);
    }

    #[test]
    fn where_on_owner_line_takes_one_clause() {
        let program = parse_str("a = print k where k = 1\nb = 2\n");
        assert_eq!(program.assignments.len(), 2);
        assert_eq!(program.assignments[0].wheres.len(), 1);
    }

    #[test]
    fn where_names_shadow_globals() {
        let program = parse_str("k = 1\na = k\n  where\n    k = 2\n");
        let a = &program.assignments[1];
        assert_eq!(
            program.scopes.resolve(a.value.scope, "k"),
            Some(Resolution::Dynamic { levels_up: 0, offset: 0 })
        );
    }

    #[test]
    fn error_missing_name() {
        let err = parse_err("= 5");
        assert_eq!(err.code, "FNT-P001");
        assert_eq!((err.position.line, err.position.column), (1, 1));
    }

    #[test]
    fn error_missing_equals() {
        assert_eq!(parse_err("x 5").code, "FNT-P002");
    }

    #[test]
    fn error_missing_value() {
        let err = parse_err("x =\ny = 2");
        assert_eq!(err.code, "FNT-P003");
        assert_eq!(err.position.line, 2);
    }

    #[test]
    fn error_unclosed_paren() {
        assert_eq!(parse_err("x = (add 1 2").code, "FNT-P004");
    }

    #[test]
    fn error_bad_tuple_separator() {
        assert_eq!(parse_err("x = [1; 2]").code, "FNT-P005");
    }
}
