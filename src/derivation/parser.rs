//! Line-oriented parser for derivation scripts
//!
//! Every line is tokenized and parsed on its own. Names bound by an
//! enclosing scheme take the binder's kind; any other bare name gets the
//! kind its position calls for (lifetime after `&`, type elsewhere) and is
//! re-resolved against the environment when the script runs.

use super::{Command, Derivation, Step};
use crate::scheme::QuantifiedScheme;
use crate::types::{Kind, Quantifier, Relation, RelationOp, Scalar, Term, Variable};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Parse a whole script. Every malformed line is reported.
pub fn parse_derivation(source: &str) -> Result<Derivation, Vec<ParseError>> {
    let mut steps = Vec::new();
    let mut errors = Vec::new();

    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        let tokens = match tokenize(line, text) {
            Ok(tokens) => tokens,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        if tokens.is_empty() {
            continue;
        }

        let mut parser = LineParser::new(line, &tokens, text.chars().count() + 1);
        match parser.step() {
            Ok(step) => steps.push(step),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        Ok(Derivation { steps })
    } else {
        Err(errors)
    }
}

/// Parse a single scheme, e.g. `exists<lt I> => (&I i32)`
pub fn parse_scheme(text: &str) -> Result<QuantifiedScheme, ParseError> {
    let tokens = tokenize(1, text)?;
    let mut parser = LineParser::new(1, &tokens, text.chars().count() + 1);
    let scheme = parser.scheme()?;
    parser.finish()?;
    Ok(scheme)
}

// ===== Tokens =====

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Amp,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Eq,
    FatArrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Tok::Ident(name) => return write!(f, "`{}`", name),
            Tok::Amp => "&",
            Tok::Less => "<",
            Tok::Greater => ">",
            Tok::LessEq => "<=",
            Tok::GreaterEq => ">=",
            Tok::Eq => "=",
            Tok::FatArrow => "=>",
            Tok::LParen => "(",
            Tok::RParen => ")",
            Tok::LBrace => "{",
            Tok::RBrace => "}",
            Tok::Comma => ",",
        };
        write!(f, "`{}`", text)
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    column: usize,
}

fn tokenize(line: usize, text: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            while i < chars.len() && chars[i] == '\'' {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            tokens.push(Token {
                tok: Tok::Ident(name),
                column,
            });
            continue;
        }

        let (tok, width) = match (c, next) {
            ('<', Some('=')) => (Tok::LessEq, 2),
            // `exists<>=> ..` closes the binder list before the arrow
            ('>', Some('=')) if chars.get(i + 2) != Some(&'>') => (Tok::GreaterEq, 2),
            ('=', Some('>')) => (Tok::FatArrow, 2),
            ('<', _) => (Tok::Less, 1),
            ('>', _) => (Tok::Greater, 1),
            ('=', _) => (Tok::Eq, 1),
            ('&', _) => (Tok::Amp, 1),
            ('(', _) => (Tok::LParen, 1),
            (')', _) => (Tok::RParen, 1),
            ('{', _) => (Tok::LBrace, 1),
            ('}', _) => (Tok::RBrace, 1),
            (',', _) => (Tok::Comma, 1),
            _ => {
                return Err(ParseError {
                    line,
                    column,
                    message: format!("unexpected character `{}`", c),
                })
            }
        };
        tokens.push(Token { tok, column });
        i += width;
    }

    Ok(tokens)
}

// ===== Parser =====

struct LineParser<'a> {
    line: usize,
    tokens: &'a [Token],
    pos: usize,
    end_column: usize,
    /// Binders of the enclosing scheme levels, innermost last
    scope: Vec<Variable>,
}

impl<'a> LineParser<'a> {
    fn new(line: usize, tokens: &'a [Token], end_column: usize) -> Self {
        Self {
            line,
            tokens,
            pos: 0,
            end_column,
            scope: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn column(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.column)
            .unwrap_or(self.end_column)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            column: self.column(),
            message: message.into(),
        }
    }

    fn unexpected(&self, what: &str) -> ParseError {
        match self.peek() {
            Some(tok) => self.error(format!("expected {}, found {}", what, tok)),
            None => self.error(format!("expected {}, found end of line", what)),
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<(), ParseError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.unexpected(&tok.to_string()))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn finish(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(self.error(format!("unexpected {} after the end of the command", tok))),
        }
    }

    /// Comma-separated items up to `close`; the opening token is consumed
    fn list<T>(
        &mut self,
        close: Tok,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(close)?;
            return Ok(items);
        }
    }

    fn step(&mut self) -> Result<Step, ParseError> {
        let column = self.column();
        let keyword = self.ident("a command")?;
        let command = match keyword.as_str() {
            "instantiate" => Command::Instantiate(self.scheme()?),
            "expect" => Command::Expect(self.scheme()?),
            "bind" => {
                let var = self.variable(Kind::Ty)?;
                self.expect(Tok::Eq)?;
                let value = self.term(var.kind)?;
                Command::Bind { var, value }
            }
            "relate" => {
                let left = self.variable(Kind::Lt)?;
                let op = self.relation_op()?;
                let right = self.term(left.kind)?;
                Command::Relate { left, op, right }
            }
            "extract" => {
                self.expect(Tok::LParen)?;
                Command::Extract(self.list(Tok::RParen, |p| p.term(Kind::Ty))?)
            }
            other => {
                return Err(ParseError {
                    line: self.line,
                    column,
                    message: format!("unknown command `{}`", other),
                })
            }
        };
        self.finish()?;
        Ok(Step {
            line: self.line,
            column,
            command,
        })
    }

    fn quantifier(&mut self) -> Result<Quantifier, ParseError> {
        match self.peek() {
            Some(Tok::Ident(name)) if name == "forall" => {
                self.pos += 1;
                Ok(Quantifier::ForAll)
            }
            Some(Tok::Ident(name)) if name == "exists" => {
                self.pos += 1;
                Ok(Quantifier::Exists)
            }
            _ => Err(self.unexpected("`forall` or `exists`")),
        }
    }

    fn starts_scheme(&self) -> bool {
        matches!(self.peek(), Some(Tok::Ident(name)) if name == "forall" || name == "exists")
    }

    fn scheme(&mut self) -> Result<QuantifiedScheme, ParseError> {
        let quantifier = self.quantifier()?;
        self.expect(Tok::Less)?;
        let binders = self.list(Tok::Greater, |p| p.binder())?;

        let depth = self.scope.len();
        self.scope.extend(binders.iter().cloned());

        let result = self.scheme_rest(quantifier, binders);
        self.scope.truncate(depth);
        result
    }

    fn scheme_rest(
        &mut self,
        quantifier: Quantifier,
        binders: Vec<Variable>,
    ) -> Result<QuantifiedScheme, ParseError> {
        let constraints = if self.eat(&Tok::LBrace) {
            self.list(Tok::RBrace, |p| p.relation())?
        } else {
            Vec::new()
        };

        let scheme = QuantifiedScheme::new(quantifier, binders, constraints, Vec::new());
        if self.starts_scheme() {
            Ok(scheme.with_inner(self.scheme()?))
        } else if self.eat(&Tok::FatArrow) {
            self.expect(Tok::LParen)?;
            let terms = self.list(Tok::RParen, |p| p.term(Kind::Ty))?;
            Ok(scheme.with_terms(terms))
        } else {
            Ok(scheme)
        }
    }

    fn binder(&mut self) -> Result<Variable, ParseError> {
        let kind = match self.peek() {
            Some(Tok::Ident(name)) if name == "ty" => Kind::Ty,
            Some(Tok::Ident(name)) if name == "lt" => Kind::Lt,
            _ => return Err(self.unexpected("`ty` or `lt`")),
        };
        self.pos += 1;
        let name = self.name()?;
        Ok(Variable::new(name, kind))
    }

    fn relation(&mut self) -> Result<Relation, ParseError> {
        let left = self.variable(Kind::Lt)?;
        let op = self.relation_op()?;
        let right = self.term(left.kind)?;
        Ok(Relation::new(left, op, right))
    }

    fn relation_op(&mut self) -> Result<RelationOp, ParseError> {
        if self.eat(&Tok::LessEq) {
            Ok(RelationOp::LessEq)
        } else if self.eat(&Tok::GreaterEq) {
            Ok(RelationOp::GreaterEq)
        } else {
            Err(self.unexpected("`<=` or `>=`"))
        }
    }

    /// A variable name: not a keyword, not a scalar
    fn name(&mut self) -> Result<String, ParseError> {
        let column = self.column();
        let name = self.ident("a variable name")?;
        if is_reserved(&name) {
            return Err(ParseError {
                line: self.line,
                column,
                message: format!("`{}` cannot be used as a variable name", name),
            });
        }
        Ok(name)
    }

    fn variable(&mut self, default: Kind) -> Result<Variable, ParseError> {
        let name = self.name()?;
        Ok(self.scoped(name, default))
    }

    fn scoped(&self, name: String, default: Kind) -> Variable {
        let kind = self
            .scope
            .iter()
            .rev()
            .find(|v| v.name == name)
            .map(|v| v.kind)
            .unwrap_or(default);
        Variable::new(name, kind)
    }

    fn lifetime(&mut self) -> Result<Term, ParseError> {
        match self.peek() {
            Some(Tok::Ident(name)) if name == "static" => {
                self.pos += 1;
                Ok(Term::Static)
            }
            Some(Tok::Ident(_)) => Ok(Term::Var(self.variable(Kind::Lt)?)),
            _ => Err(self.unexpected("a lifetime")),
        }
    }

    fn term(&mut self, expected: Kind) -> Result<Term, ParseError> {
        match self.peek() {
            Some(Tok::Amp) => {
                self.pos += 1;
                let lifetime = self.lifetime()?;
                let referent = self.term(Kind::Ty)?;
                Ok(Term::reference(lifetime, referent))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                Ok(Term::Tuple(self.list(Tok::RParen, |p| p.term(Kind::Ty))?))
            }
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                if name == "static" {
                    return Ok(Term::Static);
                }
                if let Some(scalar) = Scalar::from_name(&name) {
                    return Ok(Term::Scalar(scalar));
                }
                if self.eat(&Tok::Less) {
                    let params = self.list(Tok::Greater, |p| p.term(Kind::Ty))?;
                    return Ok(Term::adt(name, params));
                }
                if is_reserved(&name) {
                    self.pos -= 1;
                    return Err(self.unexpected("a term"));
                }
                Ok(Term::Var(self.scoped(name, expected)))
            }
            _ => Err(self.unexpected("a term")),
        }
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, "forall" | "exists" | "static" | "ty" | "lt") || Scalar::from_name(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Derivation {
        match parse_derivation(source) {
            Ok(derivation) => derivation,
            Err(errors) => panic!("unexpected parse errors: {:?}", errors),
        }
    }

    fn parse_err(source: &str) -> Vec<ParseError> {
        parse_derivation(source).unwrap_err()
    }

    #[test]
    fn test_parse_commands() {
        let derivation = parse_ok(
            r#"
# reference derivation
instantiate exists<ty A, lt I>
bind A = &I i32
relate I >= static
extract (A, (i32, bool))
expect exists<lt I> { I >= static } => (&I i32, (i32, bool))
"#,
        );

        assert_eq!(derivation.steps.len(), 5);
        assert_eq!(derivation.steps[0].line, 3);
        assert_eq!(derivation.extraction_count(), 1);

        let keywords: Vec<_> = derivation.steps.iter().map(|s| s.command.keyword()).collect();
        assert_eq!(keywords, vec!["instantiate", "bind", "relate", "extract", "expect"]);

        match &derivation.steps[1].command {
            Command::Bind { var, value } => {
                assert_eq!(var, &Variable::ty("A"));
                assert_eq!(value, &Term::reference(Variable::lt("I").to_term(), Term::i32()));
            }
            other => panic!("expected bind, got {:?}", other),
        }
        match &derivation.steps[2].command {
            Command::Relate { left, op, right } => {
                assert_eq!(left, &Variable::lt("I"));
                assert_eq!(*op, RelationOp::GreaterEq);
                assert_eq!(right, &Term::Static);
            }
            other => panic!("expected relate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_scheme_round_trips_display() {
        for text in [
            "exists<lt J, lt I, lt K, lt L> { J <= K, I <= K, K <= L } => (&I i32, &J i32)",
            "forall<lt a> exists<lt I> { I >= a } => (&I i32)",
            "forall<ty T> => (Vec<T>, Unit<>, (T, &static str))",
            "exists<> => (i32)",
        ] {
            let scheme = parse_scheme(text).unwrap();
            assert_eq!(scheme.to_string(), text);
        }

        // Without `=>` the body is empty
        let scheme = parse_scheme("exists<lt I>").unwrap();
        assert!(scheme.terms().is_empty());
    }

    #[test]
    fn test_binder_kinds_flow_into_body() {
        let scheme = parse_scheme("forall<lt T> exists<ty X> { T <= static } => (Pair<T, X>)").unwrap();
        let free = scheme.free_vars();
        assert!(free.is_empty());

        let terms = scheme.terms();
        assert_eq!(
            terms[0],
            Term::adt("Pair", vec![Variable::lt("T").to_term(), Variable::ty("X").to_term()])
        );
    }

    #[test]
    fn test_empty_binders_before_arrow() {
        let scheme = parse_scheme("exists<>=> (i32)").unwrap();
        assert_eq!(scheme.binder_count(), 0);
        assert_eq!(scheme.terms(), &[Term::i32()]);
    }

    #[test]
    fn test_trailing_comment() {
        let derivation = parse_ok("relate I <= K # keep K above I");
        assert_eq!(derivation.steps.len(), 1);
    }

    #[test]
    fn test_unknown_command() {
        let errors = parse_err("  frobnicate A");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].column, 3);
        assert_eq!(errors[0].message, "unknown command `frobnicate`");
    }

    #[test]
    fn test_errors_on_several_lines() {
        let errors = parse_err("bind A = \nrelate I < K\nextract (A)\nbind i32 = A\n");
        assert_eq!(errors.len(), 3);

        assert_eq!((errors[0].line, errors[0].column), (1, 10));
        assert_eq!(errors[0].message, "expected a term, found end of line");

        assert_eq!((errors[1].line, errors[1].column), (2, 10));
        assert_eq!(errors[1].message, "expected `<=` or `>=`, found `<`");

        assert_eq!((errors[2].line, errors[2].column), (4, 6));
        assert_eq!(errors[2].message, "`i32` cannot be used as a variable name");
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        let errors = parse_err("extract (A) B");
        assert_eq!(errors[0].column, 13);
        assert_eq!(errors[0].message, "unexpected `B` after the end of the command");
    }

    #[test]
    fn test_unexpected_character() {
        let errors = parse_err("bind A = $");
        assert_eq!(errors[0].column, 10);
        assert_eq!(errors[0].to_string(), "1:10: unexpected character `$`");
    }
}
