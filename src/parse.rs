use log::debug;
use logos::Logos;
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

use crate::lex::Token;
use crate::transform::{Argument, DeclareError, Operation, Target, Transformation, VarName};

/// Parse recipe text into a [`Transformation`].
///
/// One assignment per line, `target <- pipeline [# comment]`. Blank lines and
/// comment-only lines are skipped. The first malformed line aborts the parse;
/// the error carries that line's 1-based number.
pub fn parse(source: &str) -> Result<Transformation, ParseError> {
    let mut transformation = Transformation::new();
    for (index, line) in source.lines().enumerate() {
        parse_line(line, index as u32 + 1, &mut transformation)?;
    }
    debug!(
        "parsed recipe: {} columns, {} headers, {} variables",
        transformation.columns.len(),
        transformation.headers.len(),
        transformation.variables.len(),
    );
    Ok(transformation)
}

#[derive(Debug, Error)]
#[error("error - line {line}: {kind}")]
pub struct ParseError {
    pub line: u32,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Redeclared(#[from] DeclareError),

    #[error("unrecognized token `{0}`")]
    UnknownToken(String),

    #[error("expected a column number, header, or variable on the left of `<-`")]
    ExpectedTarget,

    #[error("expected a column number after `!`")]
    ExpectedHeaderNumber,

    #[error("column numbers start at 1")]
    ZeroColumn,

    #[error("expected `<-` after the target")]
    ExpectedAssign,

    #[error("expected an operation or value")]
    ExpectedTerm,

    #[error("expected a column number, variable, string, or `?` as argument")]
    ExpectedArgument,

    #[error("expected `)` to close the argument list")]
    UnclosedArguments,

    #[error("unexpected input after the pipeline")]
    TrailingInput,
}

fn parse_line(
    line: &str,
    line_no: u32,
    transformation: &mut Transformation,
) -> Result<(), ParseError> {
    let tokens = lex_line(line, line_no)?;
    if tokens.is_empty() || matches!(tokens.as_slice(), [Token::Comment(_)]) {
        return Ok(());
    }

    let mut cursor = Cursor::new(tokens, line_no);

    let target = cursor.target()?;
    transformation
        .declare(target.clone())
        .map_err(|e| cursor.fail(e.into()))?;

    if !cursor.eat(&Token::Assign) {
        return Err(cursor.fail(ParseErrorKind::ExpectedAssign));
    }

    // Pipeline: stages separated by `->`, each stage a `+`-chain of terms.
    loop {
        cursor.stage(&target, transformation)?;
        if !cursor.eat(&Token::Arrow) {
            break;
        }
    }

    match cursor.bump() {
        None => {}
        Some(Token::Comment(text)) if cursor.at_end() => {
            transformation.set_comment(&target, &text);
        }
        Some(_) => return Err(cursor.fail(ParseErrorKind::TrailingInput)),
    }
    Ok(())
}

fn lex_line(line: &str, line_no: u32) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Token::lexer(line);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(ParseError {
                    line: line_no,
                    kind: ParseErrorKind::UnknownToken(lexer.slice().to_string()),
                })
            }
        }
    }
    Ok(tokens)
}

struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
    line: u32,
}

impl Cursor {
    fn new(tokens: Vec<Token>, line: u32) -> Self {
        Self {
            tokens,
            pos: 0,
            line,
        }
    }

    fn fail(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            line: self.line,
            kind,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Advance past the expected token, or leave the cursor untouched.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn target(&mut self) -> Result<Target, ParseError> {
        match self.bump() {
            Some(Token::Bang) => match self.bump() {
                Some(Token::Int(n)) => Ok(Target::Header(self.column_number(n)?)),
                _ => Err(self.fail(ParseErrorKind::ExpectedHeaderNumber)),
            },
            Some(Token::Int(n)) => Ok(Target::Column(self.column_number(n)?)),
            Some(Token::Var(name)) => Ok(Target::Variable(self.var_name(name)?)),
            _ => Err(self.fail(ParseErrorKind::ExpectedTarget)),
        }
    }

    fn column_number(&self, n: u32) -> Result<u32, ParseError> {
        if n == 0 {
            Err(self.fail(ParseErrorKind::ZeroColumn))
        } else {
            Ok(n)
        }
    }

    fn var_name(&self, name: String) -> Result<VarName, ParseError> {
        // The lexer only produces well-formed variable tokens.
        VarName::new(name).map_err(|_| self.fail(ParseErrorKind::ExpectedTarget))
    }

    /// Parse one stage and lower it onto the target's pipeline. Every `+`
    /// becomes a deferring `join` (placeholder argument) followed by the
    /// term's own operation, so the next computed value concatenates instead
    /// of replacing.
    fn stage(
        &mut self,
        target: &Target,
        transformation: &mut Transformation,
    ) -> Result<(), ParseError> {
        let operation = self.term()?;
        transformation.push_operation(target, operation);

        while self.eat(&Token::Plus) {
            transformation.push_operation(
                target,
                Operation::new("join", [Argument::Placeholder]),
            );
            let operation = self.term()?;
            transformation.push_operation(target, operation);
        }
        Ok(())
    }

    /// A term is either a callable (`name` or `name(args)`) or a bare atom,
    /// which lowers to a `value` call carrying that atom.
    fn term(&mut self) -> Result<Operation, ParseError> {
        if let Some(Token::Ident(name)) = self.peek().cloned() {
            self.pos += 1;
            let args = if self.eat(&Token::OpenParen) {
                self.arguments()?
            } else {
                SmallVec::new()
            };
            return Ok(Operation { name, args });
        }

        let atom = self.atom_or(ParseErrorKind::ExpectedTerm)?;
        Ok(Operation {
            name: "value".to_string(),
            args: smallvec![atom],
        })
    }

    fn arguments(&mut self) -> Result<SmallVec<[Argument; 2]>, ParseError> {
        let mut args = SmallVec::new();
        if self.eat(&Token::CloseParen) {
            return Ok(args);
        }
        loop {
            args.push(self.atom()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if !self.eat(&Token::CloseParen) {
            return Err(self.fail(ParseErrorKind::UnclosedArguments));
        }
        Ok(args)
    }

    fn atom(&mut self) -> Result<Argument, ParseError> {
        self.atom_or(ParseErrorKind::ExpectedArgument)
    }

    fn atom_or(&mut self, missing: ParseErrorKind) -> Result<Argument, ParseError> {
        match self.peek().cloned() {
            Some(Token::Int(n)) => {
                self.pos += 1;
                Ok(Argument::Column(self.column_number(n)?))
            }
            Some(Token::Var(name)) => {
                self.pos += 1;
                Ok(Argument::Variable(self.var_name(name)?))
            }
            Some(Token::Str(text)) => {
                self.pos += 1;
                Ok(Argument::Literal(text))
            }
            Some(Token::Question) => {
                self.pos += 1;
                Ok(Argument::Placeholder)
            }
            _ => Err(self.fail(missing)),
        }
    }
}
