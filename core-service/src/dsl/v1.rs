//! The 1.0 request dialect.
//!
//! ```text
//! request := cmd value* ['[' option (',' option)* ']'] ['#:' option (',' option)*] ['<<' WORD]
//! option  := name '=' value
//! value   := fuo-uri | "string" | 'string' | bare-word
//! ```
//!
//! Command options (inside brackets) become `--name=value` arguments,
//! request options (after `#:`) only accept `format`.
//!
//! Only a subset of the commands can be used with this dialect.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::RawRequest;
use crate::error::{Result, ServiceError};

/// Commands reachable from a 1.0 session. `set`, `help`, `sub` and `quit`
/// are kept so a session can switch back to 2.0 and leave.
pub const V1_COMMANDS: &[&str] = &[
    "play", "pause", "resume", "toggle", "stop", "next", "previous", "search", "show", "list",
    "clear", "remove", "add", "exec", "status", "set", "help", "sub", "quit",
];

const TOKEN_PATTERN: &str = concat!(
    r"(?P<ws>\s+)",
    r"|<<\s*(?P<heredoc>\w+)",
    r"|(?P<opts>#:)",
    r"|(?P<lbracket>\[)",
    r"|(?P<rbracket>\])",
    r"|(?P<comma>,)",
    r"|(?P<eq>=)",
    r"|(?P<furi>fuo://[^\s\[\],#]*)",
    r#"|"(?P<dq>(?:[^"\\]|\\.)*)""#,
    r"|'(?P<sq>(?:[^'\\]|\\.)*)'",
    r#"|(?P<bare>[^\s\[\],=#"']+)"#,
);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Value(String),
    Heredoc(String),
    OptsMarker,
    LBracket,
    RBracket,
    Comma,
    Eq,
}

fn token_regex() -> Result<&'static Regex> {
    static TOKEN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(TOKEN_PATTERN))
        .as_ref()
        .map_err(|err| ServiceError::Internal(anyhow::anyhow!("v1 lexer: {err}")))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn token_of(caps: &Captures<'_>) -> Option<Token> {
    if caps.name("ws").is_some() {
        None
    } else if let Some(word) = caps.name("heredoc") {
        Some(Token::Heredoc(word.as_str().to_string()))
    } else if caps.name("opts").is_some() {
        Some(Token::OptsMarker)
    } else if caps.name("lbracket").is_some() {
        Some(Token::LBracket)
    } else if caps.name("rbracket").is_some() {
        Some(Token::RBracket)
    } else if caps.name("comma").is_some() {
        Some(Token::Comma)
    } else if caps.name("eq").is_some() {
        Some(Token::Eq)
    } else if let Some(m) = caps.name("dq").or_else(|| caps.name("sq")) {
        Some(Token::Value(unescape(m.as_str())))
    } else {
        caps.name("furi")
            .or_else(|| caps.name("bare"))
            .map(|m| Token::Value(m.as_str().to_string()))
    }
}

fn tokenize(line: &str) -> Result<Vec<Token>> {
    let re = token_regex()?;
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < line.len() {
        let caps = re
            .captures_at(line, pos)
            .filter(|caps| caps.get(0).map(|m| m.start() == pos && m.end() > pos) == Some(true))
            .ok_or_else(|| {
                ServiceError::syntax(format!("unknown tokens at column {}: {}", pos, &line[pos..]))
            })?;
        if let Some(m) = caps.get(0) {
            pos = m.end();
        }
        tokens.extend(token_of(&caps));
    }
    Ok(tokens)
}

fn is_name(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Parser {
    tokens: std::vec::IntoIter<Token>,
    peeked: Option<Token>,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        self.peeked.take().or_else(|| self.tokens.next())
    }

    fn peek(&mut self) -> Option<&Token> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next();
        }
        self.peeked.as_ref()
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(ServiceError::syntax(format!(
                "expect {what}, got {}",
                describe(other.as_ref())
            ))),
        }
    }

    fn value(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Value(v)) => Ok(v),
            other => Err(ServiceError::syntax(format!(
                "expect a value, got {}",
                describe(other.as_ref())
            ))),
        }
    }

    fn options(&mut self, until: Option<Token>) -> Result<Vec<(String, String)>> {
        let mut options = Vec::new();
        loop {
            let name = self.value()?;
            if !is_name(&name) {
                return Err(ServiceError::syntax(format!("invalid option name '{name}'")));
            }
            self.expect(Token::Eq, "'='")?;
            options.push((name, self.value()?));
            match self.peek() {
                Some(Token::Comma) => {
                    self.next();
                }
                Some(token) if Some(token) == until.as_ref() => {
                    self.next();
                    return Ok(options);
                }
                _ if until.is_none() => return Ok(options),
                other => {
                    return Err(ServiceError::syntax(format!(
                        "expect ',' or ']', got {}",
                        describe(other)
                    )))
                }
            }
        }
    }
}

fn describe(token: Option<&Token>) -> String {
    match token {
        None => "end of line".to_string(),
        Some(Token::Value(v)) => format!("'{v}'"),
        Some(Token::Heredoc(w)) => format!("'<<{w}'"),
        Some(Token::OptsMarker) => "'#:'".to_string(),
        Some(Token::LBracket) => "'['".to_string(),
        Some(Token::RBracket) => "']'".to_string(),
        Some(Token::Comma) => "','".to_string(),
        Some(Token::Eq) => "'='".to_string(),
    }
}

pub fn parse(line: &str) -> Result<RawRequest> {
    let mut parser = Parser {
        tokens: tokenize(line)?.into_iter(),
        peeked: None,
    };

    let cmd = match parser.next() {
        Some(Token::Value(cmd)) if is_name(&cmd) => cmd,
        other => {
            return Err(ServiceError::syntax(format!(
                "expect a command name, got {}",
                describe(other.as_ref())
            )))
        }
    };
    if !V1_COMMANDS.contains(&cmd.as_str()) {
        return Err(ServiceError::syntax(format!(
            "command '{cmd}' is not available in rpc 1.0"
        )));
    }

    let mut argv = vec![cmd];
    while let Some(Token::Value(_)) = parser.peek() {
        argv.push(parser.value()?);
    }

    if parser.peek() == Some(&Token::LBracket) {
        parser.next();
        for (name, value) in parser.options(Some(Token::RBracket))? {
            argv.push(format!("--{}={}", name.replace('_', "-"), value));
        }
    }

    if parser.peek() == Some(&Token::OptsMarker) {
        parser.next();
        for (name, value) in parser.options(None)? {
            if name != "format" {
                return Err(ServiceError::syntax(format!(
                    "unknown request option '{name}'"
                )));
            }
            argv.push(format!("--format={value}"));
        }
    }

    let heredoc_word = match parser.next() {
        None => None,
        Some(Token::Heredoc(word)) => Some(word),
        Some(other) => {
            return Err(ServiceError::syntax(format!(
                "unknown tokens: {}",
                describe(Some(&other))
            )))
        }
    };
    if let Some(extra) = parser.next() {
        return Err(ServiceError::syntax(format!(
            "unknown tokens after heredoc: {}",
            describe(Some(&extra))
        )));
    }

    Ok(RawRequest { argv, heredoc_word })
}
