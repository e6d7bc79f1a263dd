use logos::Logos;

/// Lexical element of one recipe line.
///
/// The grammar is line-oriented, so the lexer never sees a newline: the
/// parser feeds it one line at a time and numbers the lines itself.
/// Whitespace between tokens is insignificant.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\f]+")]
pub enum Token {
    #[token("<-")]
    Assign,

    #[token("->")]
    Arrow,

    #[token("+")]
    Plus,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    #[token(",")]
    Comma,

    #[token("!")]
    Bang,

    #[token("?")]
    Question,

    #[regex(r"[0-9]+", lex_int)]
    Int(u32),

    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", lex_owned)]
    Var(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", lex_owned)]
    Ident(String),

    #[regex(r#""[^"]*""#, lex_str_lit)]
    Str(String),

    /// Line comment, text after the `#` with surrounding whitespace removed.
    #[regex(r"#.*", lex_comment)]
    Comment(String),
}

fn lex_int(lex: &mut logos::Lexer<Token>) -> Option<u32> {
    lex.slice().parse().ok()
}

fn lex_owned(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice().to_string()
}

fn lex_str_lit(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();

    if cfg!(debug_assertions) {
        // Check start and end to be quotes.
        assert_eq!(slice.chars().next(), Some('"'));
        assert_eq!(slice.chars().last(), Some('"'));
    }

    // No escape sequences: everything between the quotes is literal.
    slice[1..slice.len() - 1].to_string()
}

fn lex_comment(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice().trim_start_matches('#').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(line: &str) -> Vec<Token> {
        Token::lexer(line)
            .map(|token| token.expect("line should lex"))
            .collect()
    }

    #[test]
    fn lexes_an_assignment() {
        use Token::*;

        let tokens = lex("!2 <- uppercase(1) -> join($foo, \"x\") + ?");
        assert_eq!(
            tokens,
            vec![
                Bang,
                Int(2),
                Assign,
                Ident("uppercase".into()),
                OpenParen,
                Int(1),
                CloseParen,
                Arrow,
                Ident("join".into()),
                OpenParen,
                Var("$foo".into()),
                Comma,
                Str("x".into()),
                CloseParen,
                Plus,
                Question,
            ]
        );
    }

    #[test]
    fn string_literals_keep_contents_verbatim() {
        let tokens = lex(r#"1 <- "a, (b) -> c""#);
        assert_eq!(
            tokens[2],
            Token::Str("a, (b) -> c".into()),
        );
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let tokens = lex("1 <- 1 # first name, trimmed");
        assert_eq!(
            tokens.last(),
            Some(&Token::Comment("first name, trimmed".into()))
        );
    }

    #[test]
    fn whitespace_is_insignificant() {
        assert_eq!(lex("1<-2"), lex("1 <- 2"));
    }

    #[test]
    fn stray_characters_do_not_lex() {
        let mut lexer = Token::lexer("1 <- 2 @ 3");
        assert!(lexer.any(|token| token.is_err()));
    }
}
