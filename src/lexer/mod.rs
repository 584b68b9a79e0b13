use logos::Logos;
use num_bigint::BigInt;

use crate::ast::{Position, SourceMap};

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"#[^\n]*", allow_greedy = true))]
pub enum Token {
    #[token("where")]
    Where,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("=>")]
    Arrow,
    #[token("=")]
    Eq,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token("$")]
    Dollar,

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<BigInt>().ok())]
    Number(BigInt),
    #[regex(r"[_a-zA-Z][_a-zA-Z0-9]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    /// How the token reads in source, for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Where => "'where'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Arrow => "'=>'".to_string(),
            Token::Eq => "'='".to_string(),
            Token::Semi => "';'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Dollar => "'$'".to_string(),
            Token::Number(n) => format!("number {n}"),
            Token::Ident(name) => format!("name '{name}'"),
        }
    }
}

pub fn lex(source: &str) -> Result<Vec<(Token, Position)>, LexError> {
    let map = SourceMap::new(source);
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut last_line = 0;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let mut pos = map.position(span.start);
        match result {
            Ok(token) => {
                pos.line_start = pos.line != last_line;
                last_line = pos.line;
                tokens.push((token, pos));
            }
            Err(()) => {
                let snippet = source[span].to_string();
                return Err(LexError { suggestion: suggest_fix(&snippet), snippet, position: pos });
            }
        }
    }

    Ok(tokens)
}

fn suggest_fix(bad_token: &str) -> String {
    match bad_token {
        "-" | "->" => "Functions are written 'x => body'; subtraction is 'sub a b'.".to_string(),
        "\\" => "Functions are written 'x => body'.".to_string(),
        "{" | "}" => "Blocks are written with 'where' and indentation.".to_string(),
        "\"" | "'" => "There are no strings; values are integers, tuples and functions.".to_string(),
        "+" | "*" | "/" | "<" | ">" => {
            "Arithmetic is done with built-ins such as 'add', 'mult', 'div' and 'lt'.".to_string()
        }
        _ => format!(
            "Unexpected character(s): '{bad_token}'. Names are letters, digits and underscores."
        ),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Lex error at {position}: '{snippet}'. {suggestion}")]
pub struct LexError {
    pub position: Position,
    pub snippet: String,
    pub suggestion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    fn ident(name: &str) -> Token {
        Token::Ident(name.to_string())
    }

    #[test]
    fn lex_assignment_with_function() {
        assert_eq!(
            kinds("inc = n => add n 1"),
            vec![
                ident("inc"),
                Token::Eq,
                ident("n"),
                Token::Arrow,
                ident("add"),
                ident("n"),
                Token::Number(BigInt::from(1)),
            ]
        );
    }

    #[test]
    fn lex_punctuation() {
        assert_eq!(
            kinds("( ) [ ] ; , $"),
            vec![
                Token::LParen,
                Token::RParen,
                Token::LBracket,
                Token::RBracket,
                Token::Semi,
                Token::Comma,
                Token::Dollar,
            ]
        );
    }

    #[test]
    fn where_is_a_keyword_but_prefixes_are_names() {
        assert_eq!(kinds("where wherever _x"), vec![Token::Where, ident("wherever"), ident("_x")]);
    }

    #[test]
    fn negative_and_huge_numbers() {
        let toks = kinds("-7 123456789012345678901234567890");
        assert_eq!(toks[0], Token::Number(BigInt::from(-7)));
        assert_eq!(toks[1], Token::Number("123456789012345678901234567890".parse().unwrap()));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("x = 1 # the answer\n# whole line\ny = 2").len(), 6);
    }

    #[test]
    fn positions_track_layout() {
        let toks = lex("main = f\n  where\n    k = 1").unwrap();
        let (_, main) = &toks[0];
        assert_eq!((main.line, main.column, main.indent, main.line_start), (1, 1, 0, true));
        let (_, f) = &toks[2];
        assert!(!f.line_start);
        let (tok, wh) = &toks[3];
        assert_eq!(*tok, Token::Where);
        assert_eq!((wh.line, wh.column, wh.indent, wh.line_start), (2, 3, 2, true));
        let (_, k) = &toks[4];
        assert_eq!((k.line, k.indent, k.line_start), (3, 4, true));
    }

    #[test]
    fn unknown_character_reports_position() {
        let err = lex("x = a + b").unwrap_err();
        assert_eq!(err.snippet, "+");
        assert_eq!((err.position.line, err.position.column), (1, 7));
        assert!(err.suggestion.contains("add"));
    }
}
