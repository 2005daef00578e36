//! A small, closed-grammar expression language for `rules[].when`,
//! `exit_conditions[]` and `transitions[].when`.
//!
//! Deliberately not Turing-complete: literals, dotted name lookups into a
//! fixed namespace, comparisons, boolean/arithmetic operators, list
//! literals and calls to a whitelisted helper set. No attribute access
//! into arbitrary Rust values and no way to reach anything outside
//! [`EvalContext`].

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(a) => Value::List(a.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(_) => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected {0}")]
    Expected(String),
    #[error("unknown helper function '{0}'")]
    UnknownHelper(String),
    #[error("wrong argument count for helper '{0}'")]
    HelperArity(String),
    #[error("type error: {0}")]
    Type(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Num(f64),
    Str(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    In,
    True,
    False,
    Null,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ExprError::UnexpectedEnd);
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| ExprError::UnexpectedChar(c, start))?;
                tokens.push(Token::Num(n));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "none" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(ExprError::UnexpectedChar(other, i)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Expr>),
    Name(Vec<String>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, tok: &Token) -> Result<(), ExprError> {
        match self.next() {
            Some(t) if &t == tok => Ok(()),
            Some(t) => Err(ExprError::Expected(format!("{tok:?}, found {t:?}"))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.next();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => Some(CmpOp::Eq),
            Some(Token::Ne) => Some(CmpOp::Ne),
            Some(Token::Lt) => Some(CmpOp::Lt),
            Some(Token::Le) => Some(CmpOp::Le),
            Some(Token::Gt) => Some(CmpOp::Gt),
            Some(Token::Ge) => Some(CmpOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.next();
            let right = self.parse_additive()?;
            return Ok(Expr::Cmp(op, Box::new(left), Box::new(right)));
        }
        if matches!(self.peek(), Some(Token::In)) {
            self.next();
            let right = self.parse_additive()?;
            return Ok(Expr::In(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Some(ArithOp::Add),
                Some(Token::Minus) => Some(ArithOp::Sub),
                _ => None,
            };
            let Some(op) = op else { break };
            self.next();
            let right = self.parse_multiplicative()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Some(ArithOp::Mul),
                Some(Token::Slash) => Some(ArithOp::Div),
                _ => None,
            };
            let Some(op) = op else { break };
            self.next();
            let right = self.parse_unary()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.next();
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.next().ok_or(ExprError::UnexpectedEnd)? {
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Null => Ok(Expr::Null),
            Token::Num(n) => Ok(Expr::Num(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Token::RBracket)) {
                    items.push(self.parse_expr()?);
                    while matches!(self.peek(), Some(Token::Comma)) {
                        self.next();
                        items.push(self.parse_expr()?);
                    }
                }
                self.expect(&Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Token::Ident(name) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.next();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Token::RParen)) {
                        args.push(self.parse_expr()?);
                        while matches!(self.peek(), Some(Token::Comma)) {
                            self.next();
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(&Token::RParen)?;
                    return Ok(Expr::Call(name, args));
                }
                let mut path = vec![name];
                while matches!(self.peek(), Some(Token::Dot)) {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(part)) => path.push(part),
                        _ => return Err(ExprError::Expected("identifier after '.'".into())),
                    }
                }
                Ok(Expr::Name(path))
            }
            other => Err(ExprError::Expected(format!("expression, found {other:?}"))),
        }
    }
}

/// Parse `src` into an AST once; the result is cheap to re-evaluate against
/// many contexts (rules are parsed at workflow-activation time).
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::Expected("end of expression".into()));
    }
    Ok(expr)
}

/// The bounded set of names an expression may resolve, and the sole
/// authority for what `Name` and `Call` nodes may reach.
pub trait Namespace {
    fn resolve(&self, path: &[String]) -> Value;
    fn call_helper(&self, name: &str, args: &[Value]) -> Result<Value, ExprError>;
}

pub fn eval(expr: &Expr, ns: &dyn Namespace) -> Result<Value, ExprError> {
    Ok(match expr {
        Expr::Null => Value::Null,
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Num(n) => Value::Num(*n),
        Expr::Str(s) => Value::Str(s.clone()),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, ns)?);
            }
            Value::List(out)
        }
        Expr::Name(path) => ns.resolve(path),
        Expr::Not(inner) => Value::Bool(!eval(inner, ns)?.truthy()),
        Expr::Neg(inner) => match eval(inner, ns)? {
            Value::Num(n) => Value::Num(-n),
            other => return Err(ExprError::Type(format!("cannot negate {other}"))),
        },
        Expr::And(l, r) => {
            let left = eval(l, ns)?;
            if !left.truthy() {
                left
            } else {
                eval(r, ns)?
            }
        }
        Expr::Or(l, r) => {
            let left = eval(l, ns)?;
            if left.truthy() {
                left
            } else {
                eval(r, ns)?
            }
        }
        Expr::Cmp(op, l, r) => Value::Bool(compare(*op, &eval(l, ns)?, &eval(r, ns)?)),
        Expr::Arith(op, l, r) => arith(*op, &eval(l, ns)?, &eval(r, ns)?)?,
        Expr::In(item, list) => {
            let item = eval(item, ns)?;
            match eval(list, ns)? {
                Value::List(items) => Value::Bool(items.contains(&item)),
                Value::Str(s) => Value::Bool(item.as_str().map(|needle| s.contains(needle)).unwrap_or(false)),
                other => return Err(ExprError::Type(format!("cannot use 'in' against {other}"))),
            }
        }
        Expr::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, ns)?);
            }
            ns.call_helper(name, &values)?
        }
    })
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Num(a), Value::Num(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        },
        (Value::Str(a), Value::Str(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            _ => false,
        },
        _ => matches!(op, CmpOp::Ne),
    }
}

fn arith(op: ArithOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        if op == ArithOp::Add {
            return Ok(Value::Str(format!("{a}{b}")));
        }
    }
    let (Value::Num(a), Value::Num(b)) = (l, r) else {
        return Err(ExprError::Type(format!("cannot apply arithmetic to {l} and {r}")));
    };
    Ok(Value::Num(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestNs {
        vars: HashMap<String, Value>,
    }

    impl Namespace for TestNs {
        fn resolve(&self, path: &[String]) -> Value {
            self.vars.get(&path.join(".")).cloned().unwrap_or(Value::Null)
        }

        fn call_helper(&self, name: &str, args: &[Value]) -> Result<Value, ExprError> {
            match name {
                "command_contains" => {
                    let [haystack, needle] = args else { return Err(ExprError::HelperArity(name.into())) };
                    Ok(Value::Bool(haystack.as_str().unwrap_or("").contains(needle.as_str().unwrap_or(""))))
                }
                _ => Err(ExprError::UnknownHelper(name.into())),
            }
        }
    }

    fn ns(pairs: &[(&str, Value)]) -> TestNs {
        TestNs { vars: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect() }
    }

    #[test]
    fn test_simple_equality() {
        let expr = parse("tool == 'Edit'").unwrap();
        let namespace = ns(&[("tool", Value::Str("Edit".into()))]);
        assert_eq!(eval(&expr, &namespace).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_and_or_precedence() {
        let expr = parse("tool == 'Edit' or tool == 'Write' and phase_action_count > 2").unwrap();
        let namespace = ns(&[("tool", Value::Str("Edit".into())), ("phase_action_count", Value::Num(0.0))]);
        assert_eq!(eval(&expr, &namespace).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_member_access_dotted_name() {
        let expr = parse("args.path == 'plan.md'").unwrap();
        let namespace = ns(&[("args.path", Value::Str("plan.md".into()))]);
        assert_eq!(eval(&expr, &namespace).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_list_membership() {
        let expr = parse("tool in ['Edit', 'Write']").unwrap();
        let namespace = ns(&[("tool", Value::Str("Write".into()))]);
        assert_eq!(eval(&expr, &namespace).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_helper_call() {
        let expr = parse("command_contains(args.command, 'rm -rf')").unwrap();
        let namespace = ns(&[("args.command", Value::Str("rm -rf /".into()))]);
        assert_eq!(eval(&expr, &namespace).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unknown_helper_errors() {
        let expr = parse("nonexistent_helper(tool)").unwrap();
        let namespace = ns(&[("tool", Value::Str("Edit".into()))]);
        assert!(eval(&expr, &namespace).is_err());
    }

    #[test]
    fn test_not_and_negation() {
        let expr = parse("not (1 > 2)").unwrap();
        let namespace = ns(&[]);
        assert_eq!(eval(&expr, &namespace).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_arithmetic() {
        let expr = parse("phase_action_count + 1 >= 3").unwrap();
        let namespace = ns(&[("phase_action_count", Value::Num(2.0))]);
        assert_eq!(eval(&expr, &namespace).unwrap(), Value::Bool(true));
    }
}
