use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Trailing input at position {0}")]
    TrailingInput(usize),
}

/// S-expression node.
///
/// Quoted strings are kept apart from bare symbols so that a file can be
/// written back with the same quoting it was read with.
#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom(String),
    Str(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn atom(s: impl Into<String>) -> Self {
        SExp::Atom(s.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        SExp::Str(s.into())
    }

    /// Text of an atom or quoted string.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(s) | SExp::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<SExp>> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    /// Head symbol of a list, e.g. `pad` for `(pad "1" smd ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()
            .and_then(|items| items.first())
            .and_then(|first| first.as_atom())
    }

    pub fn is_tagged(&self, tag: &str) -> bool {
        self.tag() == Some(tag)
    }

    /// Every child list tagged `key`, in order.
    pub fn get_all(&self, key: &str) -> Vec<&SExp> {
        self.as_list()
            .map(|items| items.iter().filter(|item| item.is_tagged(key)).collect())
            .unwrap_or_default()
    }

    /// First child list tagged `key`, returned whole.
    pub fn child(&self, key: &str) -> Option<&SExp> {
        self.as_list()?.iter().find(|item| item.is_tagged(key))
    }

    /// Position of the first child list tagged `key`.
    pub fn child_index(&self, key: &str) -> Option<usize> {
        self.as_list()?.iter().position(|item| item.is_tagged(key))
    }

    /// Follow a path of child indices from this node.
    pub fn at_path(&self, path: &[usize]) -> Option<&SExp> {
        let mut node = self;
        for &idx in path {
            node = node.as_list()?.get(idx)?;
        }
        Some(node)
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut SExp> {
        let mut node = self;
        for &idx in path {
            node = node.as_list_mut()?.get_mut(idx)?;
        }
        Some(node)
    }

    /// Indented rendering in the layout KiCad writes: a list that holds
    /// other lists puts each of them on its own line.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out.push('\n');
        out
    }

    fn write_pretty(&self, out: &mut String, depth: usize) {
        match self {
            SExp::List(items) if items.iter().any(|i| matches!(i, SExp::List(_))) => {
                out.push('(');
                let mut first = true;
                for item in items {
                    match item {
                        SExp::List(_) => {
                            out.push('\n');
                            out.push_str(&"  ".repeat(depth + 1));
                            item.write_pretty(out, depth + 1);
                        }
                        _ => {
                            if !first {
                                out.push(' ');
                            }
                            out.push_str(&item.to_string());
                        }
                    }
                    first = false;
                }
                out.push('\n');
                out.push_str(&"  ".repeat(depth));
                out.push(')');
            }
            other => out.push_str(&other.to_string()),
        }
    }
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Str(s) => write!(f, "\"{}\"", escape(s)),
            SExp::Atom(s) => {
                // Symbols that would not survive a re-read get quoted
                if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"') {
                    write!(f, "\"{}\"", escape(s))
                } else {
                    write!(f, "{}", s)
                }
            }
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Recursive-descent reader over the characters of one document.
pub struct SExpParser<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
}

impl<'a> SExpParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            pos: 0,
        }
    }

    /// Parse one expression; anything but whitespace after it is an error.
    pub fn parse(&mut self) -> Result<SExp, ParseError> {
        let sexp = self.parse_sexp()?;
        self.skip_whitespace();
        match self.chars.peek() {
            None => Ok(sexp),
            Some(_) => Err(ParseError::TrailingInput(self.pos)),
        }
    }

    fn parse_sexp(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();
        match self.chars.peek().copied() {
            None => Err(ParseError::UnexpectedEof),
            Some('(') => {
                self.bump();
                self.parse_list()
            }
            Some(')') => Err(ParseError::UnexpectedToken(format!(
                "unbalanced ')' at position {}",
                self.pos
            ))),
            Some('"') => {
                self.bump();
                self.parse_string()
            }
            Some(_) => Ok(self.parse_symbol()),
        }
    }

    /// Items up to the closing paren; the opening one is already consumed.
    fn parse_list(&mut self) -> Result<SExp, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.chars.peek() {
                None => return Err(ParseError::UnexpectedEof),
                Some(')') => {
                    self.bump();
                    return Ok(SExp::List(items));
                }
                Some(_) => items.push(self.parse_sexp()?),
            }
        }
    }

    fn parse_string(&mut self) -> Result<SExp, ParseError> {
        let mut s = String::new();
        loop {
            match self.bump().ok_or(ParseError::UnexpectedEof)? {
                '"' => return Ok(SExp::Str(s)),
                '\\' => match self.bump().ok_or(ParseError::UnexpectedEof)? {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    'r' => s.push('\r'),
                    other => s.push(other),
                },
                ch => s.push(ch),
            }
        }
    }

    /// A bare symbol; the caller has seen at least one symbol character.
    fn parse_symbol(&mut self) -> SExp {
        let mut s = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            s.push(ch);
            self.bump();
        }
        SExp::Atom(s)
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|ch| ch.is_whitespace()) {
            self.bump();
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.pos += 1;
        Some(ch)
    }
}
