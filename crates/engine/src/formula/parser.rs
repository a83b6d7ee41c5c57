// Formula representation and grammar validation
// A Formula is built once by `Formula::parse` and never mutated; the
// token stream it stores has already passed every grammar rule, which
// is what lets the evaluator run without re-checking structure.

use std::fmt;

use ordered_float::OrderedFloat;

use super::tokenizer::tokenize;

/// One of the four infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }
}

/// A single validated formula token.
///
/// Numbers carry their parsed value, so `2.000` and `2.0` are the same
/// token; variables are stored post-normalization. Equality and hashing
/// follow from that.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Number(OrderedFloat<f64>),
    Variable(String),
    Op(BinOp),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n.into_inner()),
            Token::Variable(name) => write!(f, "{}", name),
            Token::Op(op) => write!(f, "{}", op.symbol()),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

/// Error for a formula string that violates the infix grammar or
/// contains an illegal or invalid variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaFormatError {
    /// Human-readable description of the rule that broke.
    pub message: String,
}

impl FormulaFormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FormulaFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FormulaFormatError {}

/// Returns true if `s` is a syntactically legal variable or cell name:
/// a letter or underscore followed by zero or more letters,
/// underscores, or digits.
pub fn is_legal_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// What the previous token was, for the adjacency rules.
#[derive(Clone, Copy, PartialEq)]
enum Prev {
    None,
    /// Operator or opening parenthesis: must be followed by an operand
    /// or another opening parenthesis.
    OpOrOpen,
    /// Number, variable, or closing parenthesis: must be followed by an
    /// operator or a closing parenthesis.
    Operand,
}

/// An immutable infix formula over non-negative numbers, variables,
/// parentheses, and the four arithmetic operators.
///
/// Two formulas are equal iff their canonical token streams are equal:
/// numeric tokens compare by parsed double value and variable tokens
/// compare post-normalization. Hashing is consistent with equality, and
/// `Display` renders the canonical space-free form, which re-parses to
/// an equal formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Formula {
    pub(crate) tokens: Vec<Token>,
    variables: Vec<String>,
}

impl Formula {
    /// Parse and validate a formula body (without any leading `=`).
    ///
    /// `normalize` converts every variable into canonical form before it
    /// is stored; `is_valid` then accepts or rejects the normalized
    /// name. Any grammar violation, illegal variable, or rejected
    /// variable fails with a `FormulaFormatError`; no partially-built
    /// formula ever escapes.
    pub fn parse<N, V>(text: &str, normalize: N, is_valid: V) -> Result<Formula, FormulaFormatError>
    where
        N: Fn(&str) -> String,
        V: Fn(&str) -> bool,
    {
        let mut tokens: Vec<Token> = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        let mut prev = Prev::None;
        let mut open_parens: u32 = 0;

        for raw in tokenize(text) {
            let token = classify(raw, &normalize, &is_valid)?;

            match &token {
                Token::Op(op) => match prev {
                    Prev::None => {
                        return Err(FormulaFormatError::new(
                            "formula cannot begin with an operator",
                        ));
                    }
                    Prev::OpOrOpen => {
                        return Err(FormulaFormatError::new(format!(
                            "operator '{}' cannot directly follow an operator or an opening parenthesis",
                            op.symbol(),
                        )));
                    }
                    Prev::Operand => {}
                },
                Token::LParen => {
                    if prev == Prev::Operand {
                        return Err(FormulaFormatError::new(
                            "an opening parenthesis cannot directly follow a number, a variable, or a closing parenthesis",
                        ));
                    }
                    open_parens += 1;
                }
                Token::RParen => {
                    match prev {
                        Prev::None => {
                            return Err(FormulaFormatError::new(
                                "formula cannot begin with a closing parenthesis",
                            ));
                        }
                        Prev::OpOrOpen => {
                            return Err(FormulaFormatError::new(
                                "a closing parenthesis cannot directly follow an operator or an opening parenthesis",
                            ));
                        }
                        Prev::Operand => {}
                    }
                    if open_parens == 0 {
                        return Err(FormulaFormatError::new(
                            "formula closes a parenthesis it never opened",
                        ));
                    }
                    open_parens -= 1;
                }
                Token::Number(_) | Token::Variable(_) => {
                    if prev == Prev::Operand {
                        return Err(FormulaFormatError::new(format!(
                            "'{}' can only follow an operator or an opening parenthesis",
                            token,
                        )));
                    }
                }
            }

            if let Token::Variable(name) = &token {
                if !variables.iter().any(|v| v == name) {
                    variables.push(name.clone());
                }
            }

            prev = match token {
                Token::Op(_) | Token::LParen => Prev::OpOrOpen,
                Token::Number(_) | Token::Variable(_) | Token::RParen => Prev::Operand,
            };
            tokens.push(token);
        }

        if tokens.is_empty() {
            return Err(FormulaFormatError::new("formula contains no tokens"));
        }
        if open_parens != 0 {
            return Err(FormulaFormatError::new(
                "number of opening parentheses does not match number of closing parentheses",
            ));
        }
        if prev != Prev::Operand {
            return Err(FormulaFormatError::new(
                "formula must end with a number, a variable, or a closing parenthesis",
            ));
        }

        Ok(Formula { tokens, variables })
    }

    /// The normalized variables this formula references, deduplicated,
    /// in order of first appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables.iter().map(String::as_str)
    }
}

impl fmt::Display for Formula {
    /// The canonical form: normalized tokens concatenated with no
    /// spaces. Feeding it back to `parse` yields an equal formula.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

/// Turn one raw token substring into a typed token, running variables
/// through normalization and the validity predicate.
fn classify<N, V>(raw: &str, normalize: &N, is_valid: &V) -> Result<Token, FormulaFormatError>
where
    N: Fn(&str) -> String,
    V: Fn(&str) -> bool,
{
    match raw {
        "(" => return Ok(Token::LParen),
        ")" => return Ok(Token::RParen),
        "+" => return Ok(Token::Op(BinOp::Add)),
        "-" => return Ok(Token::Op(BinOp::Sub)),
        "*" => return Ok(Token::Op(BinOp::Mul)),
        "/" => return Ok(Token::Op(BinOp::Div)),
        _ => {}
    }

    // The lexer only emits number-shaped tokens starting with a digit
    // or a dot; names like "inf" must classify as variables, so the
    // first character decides, not `f64::from_str`.
    let first = raw.chars().next().unwrap_or(' ');
    if first.is_ascii_digit() || first == '.' {
        let value: f64 = raw
            .parse()
            .map_err(|_| FormulaFormatError::new(format!("invalid number literal '{}'", raw)))?;
        if !value.is_finite() {
            return Err(FormulaFormatError::new(format!(
                "number literal '{}' overflows a double",
                raw
            )));
        }
        return Ok(Token::Number(OrderedFloat(value)));
    }

    if is_legal_name(raw) {
        let normalized = normalize(raw);
        if !is_valid(&normalized) {
            return Err(FormulaFormatError::new(format!(
                "variable '{}' normalizes to '{}', which is not a valid variable",
                raw, normalized
            )));
        }
        return Ok(Token::Variable(normalized));
    }

    Err(FormulaFormatError::new(format!(
        "unexpected token '{}' in formula",
        raw
    )))
}
