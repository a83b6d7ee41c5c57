// Formula lexer - splits a formula body into token substrings
// Recognized classes (longest match): parens, the four operators,
// variables (letter or underscore, then letters/underscores/digits),
// and float literals (decimal and exponent forms, no leading sign).
// Anything else comes through as a single unrecognized character for
// the parser to reject; the lexer itself never fails.

/// Iterator over the token substrings of a formula body.
///
/// Whitespace delimits tokens and is never part of one; no token is
/// empty. Source order is preserved.
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

/// Lex `input` into raw token substrings.
pub fn tokenize(input: &str) -> Tokenizer<'_> {
    Tokenizer { input, pos: 0 }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = &self.input[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();

        let first = trimmed.chars().next()?;
        let len = match first {
            '(' | ')' | '+' | '-' | '*' | '/' => first.len_utf8(),
            c if c.is_ascii_alphabetic() || c == '_' => scan_variable(trimmed),
            c if c.is_ascii_digit() || c == '.' => {
                match scan_number(trimmed) {
                    // A lone '.' starts nothing numeric.
                    0 => first.len_utf8(),
                    n => n,
                }
            }
            c => c.len_utf8(),
        };

        let start = self.pos;
        self.pos += len;
        Some(&self.input[start..start + len])
    }
}

fn scan_variable(s: &str) -> usize {
    s.find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(s.len())
}

/// Length of the longest float literal prefix of `s`, or 0 if there is
/// none. Accepts `12`, `12.`, `12.5`, `.5`, each with an optional
/// `[eE][+-]?digits` exponent. The exponent is only consumed when at
/// least one digit follows it, so `2e` lexes as `2` then `e`.
fn scan_number(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;

    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if i < b.len() && b[i] == b'.' {
        let mut j = i + 1;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        // "12." and ".5" are numbers; "." alone is not.
        if i > 0 || j > i + 1 {
            i = j;
        }
    }
    if i == 0 {
        return 0;
    }

    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_digits = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_digits {
            i = j;
        }
    }

    i
}
