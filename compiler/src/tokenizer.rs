use regex::Regex;
use lazy_static::lazy_static;
use log::debug;
use crate::utils::{quote, error};
use crate::error::SchemaError;

lazy_static! {
    pub static ref TOKEN_REGEX: Regex = Regex::new(concat!(
        r"(",
        r"(?s:/\*.*?\*/)",                                         // block comment
        r"|//[^\n]*",                                              // line comment
        r"|\s+",
        r#"|"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#,             // string literal
        r"|[-+]?(?:0[xX][0-9A-Fa-f]+|\d+(?:\.\d*)?(?:[eE][-+]?\d+)?|\.\d+(?:[eE][-+]?\d+)?)\b", // number
        r"|\.?[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*", // (qualified) identifier
        r"|[=;{}\[\]<>,():\-+/]",
        r")"
    ))
    .unwrap();
    pub static ref WHITESPACE_RX: Regex = Regex::new(r"^(?s:(//.*|/\*.*\*/|\s+))$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text:   String,
    pub line:   usize,
    pub column: usize,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.text.is_empty()
    }
}

/// Splits schema text into tokens, dropping comments and whitespace.
/// The result always ends with an empty EOF token.
pub fn tokenize_schema(text: &str, file: &str) -> Result<Vec<Token>, SchemaError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    for mat in TOKEN_REGEX.find_iter(text) {
        let start = mat.start();
        let end   = mat.end();
        let part  = mat.as_str();

        if start > last_end {
            // Unexpected text between last_end and start
            let unexpected = &text[last_end..start];
            return Err(error(
                file,
                &format!("Syntax error: {}", quote(unexpected)),
                line,
                column,
            ));
        }

        if !WHITESPACE_RX.is_match(part) {
            tokens.push(Token {
                text: part.to_string(),
                line,
                column,
            });
        }

        // Update line/column
        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.split('\n').last() {
                column = last_line_part.chars().count() + 1;
            }
        } else {
            column += part.chars().count();
        }

        last_end = end;
    }

    if last_end != text.len() {
        let unexpected = &text[last_end..];
        return Err(error(
            file,
            &format!("Syntax error: {}", quote(unexpected)),
            line,
            column,
        ));
    }

    // Append EOF token
    tokens.push(Token {
        text: String::new(),
        line,
        column,
    });
    debug!("{}: {} tokens", file, tokens.len());
    Ok(tokens)
}
