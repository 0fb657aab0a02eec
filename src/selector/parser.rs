// ABOUTME: Recursive-descent parser for selector expressions.
// ABOUTME: Builds an AST of the allowed subset and rejects everything else up front.

use super::error::SelectorError;
use super::lexer::{Spanned, Token, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    StartsWith,
    EndsWith,
    Lower,
    Upper,
    Strip,
}

impl Method {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "startswith" => Some(Method::StartsWith),
            "endswith" => Some(Method::EndsWith),
            "lower" => Some(Method::Lower),
            "upper" => Some(Method::Upper),
            "strip" => Some(Method::Strip),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::StartsWith => "startswith",
            Method::EndsWith => "endswith",
            Method::Lower => "lower",
            Method::Upper => "upper",
            Method::Strip => "strip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Const),
    List(Vec<Expr>),
    Name(String),
    Subscript {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        target: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    Bool {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Words that open constructs outside the allowed subset.
const FORBIDDEN_KEYWORDS: &[(&str, &str)] = &[
    ("lambda", "lambda"),
    ("for", "comprehension"),
    ("if", "conditional expression"),
    ("else", "conditional expression"),
    ("yield", "yield"),
    ("await", "await"),
    ("import", "import"),
];

/// Deepest nesting accepted. Brackets, unary operators and each link of
/// an operator chain count one level.
pub const MAX_DEPTH: usize = 100;

pub fn parse(source: &str) -> Result<Expr, SelectorError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
        depth: 0,
    };

    if parser.tokens.is_empty() {
        return Err(SelectorError::syntax(0, "empty expression"));
    }

    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(parser.unexpected(token)),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    /// Claim `levels` more levels of nesting.
    fn descend(&mut self, levels: usize) -> Result<(), SelectorError> {
        if self.depth + levels > MAX_DEPTH {
            return Err(SelectorError::TooDeep(MAX_DEPTH));
        }
        self.depth += levels;
        Ok(())
    }

    /// Run `f` `levels` deeper, giving back every level claimed inside it.
    fn nested<T>(
        &mut self,
        levels: usize,
        f: impl FnOnce(&mut Self) -> Result<T, SelectorError>,
    ) -> Result<T, SelectorError> {
        let depth = self.depth;
        self.descend(levels)?;
        let result = f(self);
        self.depth = depth;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), SelectorError> {
        if self.eat(&expected) {
            return Ok(());
        }
        match self.peek().cloned() {
            Some(token) => Err(self.unexpected(&token)),
            None => Err(SelectorError::syntax(
                self.offset(),
                format!("expected {} before end of expression", what),
            )),
        }
    }

    fn unexpected(&self, token: &Token) -> SelectorError {
        match token {
            Token::Forbidden(what) => SelectorError::Forbidden(what.clone()),
            Token::Name(word) => match forbidden_keyword(word) {
                Some(what) => SelectorError::Forbidden(what.to_string()),
                None => SelectorError::syntax(self.offset(), format!("unexpected name '{}'", word)),
            },
            other => SelectorError::syntax(self.offset(), format!("unexpected {:?}", other)),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, SelectorError> {
        self.nested(1, Self::or_chain)
    }

    fn or_chain(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Op("or")) {
            self.descend(1)?;
            let right = self.and_expr()?;
            left = Expr::Bool {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, SelectorError> {
        self.nested(0, Self::and_chain)
    }

    fn and_chain(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.not_expr()?;
        while self.eat(&Token::Op("and")) {
            self.descend(1)?;
            let right = self.not_expr()?;
            left = Expr::Bool {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, SelectorError> {
        if self.eat(&Token::Op("not")) {
            let inner = self.nested(1, Self::not_expr)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SelectorError> {
        let first = self.arith()?;
        let mut rest = Vec::new();

        while let Some(op) = self.compare_op() {
            rest.push((op, self.arith()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek()? {
            Token::Op("==") => CompareOp::Eq,
            Token::Op("!=") => CompareOp::NotEq,
            Token::Op("<") => CompareOp::Lt,
            Token::Op("<=") => CompareOp::LtE,
            Token::Op(">") => CompareOp::Gt,
            Token::Op(">=") => CompareOp::GtE,
            Token::Op("in") => CompareOp::In,
            Token::Op("not") if self.peek_at(1) == Some(&Token::Op("in")) => {
                self.pos += 2;
                return Some(CompareOp::NotIn);
            }
            Token::Op("is") => {
                self.pos += 1;
                return Some(if self.eat(&Token::Op("not")) {
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                });
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr, SelectorError> {
        self.nested(0, Self::arith_chain)
    }

    fn arith_chain(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => BinaryOp::Add,
                Some(Token::Op("-")) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend(1)?;
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, SelectorError> {
        if self.eat(&Token::Op("-")) {
            let inner = self.nested(1, Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat(&Token::Op("+")) {
            return self.nested(1, Self::unary);
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, SelectorError> {
        self.nested(0, Self::postfix_chain)
    }

    fn postfix_chain(&mut self) -> Result<Expr, SelectorError> {
        let mut expr = self.atom()?;

        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.pos += 1;
                    self.descend(1)?;
                    let index = self.or_expr()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Subscript {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    self.descend(1)?;
                    let attribute = match self.advance() {
                        Some(Token::Name(name)) => name,
                        _ => {
                            return Err(SelectorError::syntax(
                                self.offset(),
                                "expected attribute name after '.'",
                            ));
                        }
                    };
                    let method = Method::from_name(&attribute)
                        .filter(|_| self.peek() == Some(&Token::LParen))
                        .ok_or_else(|| {
                            SelectorError::Forbidden(format!("attribute '{}'", attribute))
                        })?;
                    self.pos += 1;
                    let args = self.sequence(Token::RParen)?;
                    expr = Expr::Call {
                        target: Box::new(expr),
                        method,
                        args,
                    };
                }
                Some(Token::LParen) => {
                    return Err(SelectorError::Forbidden("function calls".to_string()));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn atom(&mut self) -> Result<Expr, SelectorError> {
        let offset = self.offset();
        let token = self.advance().ok_or_else(|| {
            SelectorError::syntax(offset, "unexpected end of expression")
        })?;

        match token {
            Token::Int(n) => Ok(Expr::Const(Const::Int(n))),
            Token::Float(f) => Ok(Expr::Const(Const::Float(f))),
            Token::Str(mut s) => {
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Const(Const::Str(s)))
            }
            Token::Name(name) => match name.as_str() {
                "True" => Ok(Expr::Const(Const::Bool(true))),
                "False" => Ok(Expr::Const(Const::Bool(false))),
                "None" => Ok(Expr::Const(Const::None)),
                word => match forbidden_keyword(word) {
                    Some(what) => Err(SelectorError::Forbidden(what.to_string())),
                    None => Ok(Expr::Name(name)),
                },
            },
            Token::LParen => {
                if self.eat(&Token::RParen) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.or_expr()?;
                if self.eat(&Token::RParen) {
                    return Ok(first);
                }
                if self.peek() != Some(&Token::Comma) {
                    let token = self.peek().cloned();
                    return Err(match token {
                        Some(token) => self.unexpected(&token),
                        None => SelectorError::syntax(self.offset(), "expected ')'"),
                    });
                }
                self.pos += 1;
                let mut items = vec![first];
                items.extend(self.sequence(Token::RParen)?);
                Ok(Expr::List(items))
            }
            Token::LBracket => Ok(Expr::List(self.sequence(Token::RBracket)?)),
            Token::Forbidden(what) => Err(SelectorError::Forbidden(what)),
            other => Err(SelectorError::syntax(
                offset,
                format!("unexpected {:?}", other),
            )),
        }
    }

    /// Comma separated expressions up to `close`, allowing a trailing comma.
    fn sequence(&mut self, close: Token) -> Result<Vec<Expr>, SelectorError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(self.or_expr()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, "closing bracket")?;
                return Ok(items);
            }
        }
    }
}

fn forbidden_keyword(word: &str) -> Option<&'static str> {
    FORBIDDEN_KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == word)
        .map(|(_, what)| *what)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    #[test]
    fn parses_is_not_none() {
        assert_eq!(
            parse("service is not None").unwrap(),
            Expr::Compare {
                first: name("service"),
                rest: vec![(CompareOp::IsNot, Expr::Const(Const::None))],
            }
        );
    }

    #[test]
    fn not_binds_looser_than_comparison() {
        let expr = parse("not name == 'a'").unwrap();
        assert!(matches!(expr, Expr::Not(inner) if matches!(*inner, Expr::Compare { .. })));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("a or b and c").unwrap();
        match expr {
            Expr::Bool {
                op: BoolOp::Or,
                right,
                ..
            } => assert!(matches!(*right, Expr::Bool { op: BoolOp::And, .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_method_call_on_subscript() {
        let expr = parse("service['image'].startswith('nginx')").unwrap();
        assert!(matches!(
            expr,
            Expr::Call {
                method: Method::StartsWith,
                ..
            }
        ));
    }

    #[test]
    fn tuples_and_lists() {
        assert_eq!(
            parse("(1, 2)").unwrap(),
            Expr::List(vec![Expr::Const(Const::Int(1)), Expr::Const(Const::Int(2))])
        );
        assert_eq!(parse("[]").unwrap(), Expr::List(vec![]));
        assert_eq!(parse("(5)").unwrap(), Expr::Const(Const::Int(5)));
    }

    #[test]
    fn rejects_lambda() {
        assert_eq!(
            parse("(lambda: 1)()").unwrap_err(),
            SelectorError::Forbidden("lambda".to_string())
        );
    }

    #[test]
    fn rejects_power_and_multiplication() {
        assert!(matches!(parse("2 ** 8"), Err(SelectorError::Forbidden(_))));
        assert!(matches!(parse("2 * 8"), Err(SelectorError::Forbidden(_))));
        assert!(matches!(parse("8 / 2"), Err(SelectorError::Forbidden(_))));
    }

    #[test]
    fn rejects_comprehensions() {
        assert_eq!(
            parse("[x for x in service]").unwrap_err(),
            SelectorError::Forbidden("comprehension".to_string())
        );
    }

    #[test]
    fn rejects_other_attributes_and_calls() {
        assert_eq!(
            parse("name.__class__").unwrap_err(),
            SelectorError::Forbidden("attribute '__class__'".to_string())
        );
        assert_eq!(
            parse("name.lower").unwrap_err(),
            SelectorError::Forbidden("attribute 'lower'".to_string())
        );
        assert_eq!(
            parse("len(name)").unwrap_err(),
            SelectorError::Forbidden("function calls".to_string())
        );
    }

    #[test]
    fn moderate_nesting_is_accepted() {
        let source = format!("{}name{} == 'a'", "(".repeat(20), ")".repeat(20));
        assert!(parse(&source).is_ok());
        assert!(parse(&vec!["name == 'a'"; 20].join(" or ")).is_ok());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let too_deep = [
            format!("{}1{}", "(".repeat(3_000), ")".repeat(3_000)),
            format!("{}1", "[".repeat(3_000)),
            format!("{}True", "not ".repeat(3_000)),
            format!("{}1", "- ".repeat(3_000)),
            vec!["True"; 3_000].join(" or "),
            vec!["1"; 3_000].join(" + "),
            format!("service{}", "['x']".repeat(3_000)),
        ];
        for source in &too_deep {
            assert_eq!(
                parse(source).unwrap_err(),
                SelectorError::TooDeep(MAX_DEPTH),
                "{}",
                &source[..40]
            );
        }
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(parse(""), Err(SelectorError::Syntax { .. })));
        assert!(matches!(parse("name =="), Err(SelectorError::Syntax { .. })));
        assert!(matches!(parse("(name"), Err(SelectorError::Syntax { .. })));
        assert!(matches!(parse("name name"), Err(SelectorError::Syntax { .. })));
    }
}
