use crate::{
    error::SchemaError,
    tokenizer::{tokenize_schema, Token},
    types::{
        EnumDef, EnumValue, Field, FieldType, Import, Label, Message, Method, Oneof, ScalarKind,
        SchemaFile, Service,
    },
    utils::{error, parse_int, quote, unquote},
};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER:     Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref TYPE_NAME:      Regex = Regex::new(r"^\.?[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap();
    static ref STRING_LITERAL: Regex = Regex::new(r#"^(".*"|'.*')$"#).unwrap();
}

/// Largest field number the wire format can carry (2^29 - 1).
pub const MAX_FIELD_NUMBER: i64 = 536_870_911;

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Turn malformed field statements into errors instead of skipping them.
    pub strict_fields: bool,
}

/// Parses one schema file. Never looks at other files.
pub fn parse_schema(text: &str, file: &str) -> Result<SchemaFile, SchemaError> {
    parse_schema_with(text, file, &ParseOptions::default())
}

pub fn parse_schema_with(
    text: &str,
    file: &str,
    options: &ParseOptions,
) -> Result<SchemaFile, SchemaError> {
    let tokens = tokenize_schema(text, file)?;
    let mut parser = Parser {
        tokens: &tokens,
        index: 0,
        file,
        options,
    };
    let schema = parser.parse_file()?;
    debug!(
        "{}: parsed {} messages, {} enums, {} services",
        file,
        schema.messages.len(),
        schema.enums.len(),
        schema.services.len()
    );
    Ok(schema)
}

struct Parser<'a> {
    tokens:  &'a [Token],
    index:   usize,
    file:    &'a str,
    options: &'a ParseOptions,
}

impl<'a> Parser<'a> {
    // The token list always ends with EOF, so indexes are clamped onto it.
    fn peek(&self, offset: usize) -> &'a Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.index + offset).min(last)]
    }

    fn current_token(&self) -> &'a Token {
        self.peek(0)
    }

    fn advance(&mut self) -> &'a Token {
        let tok = self.current_token();
        if !tok.is_eof() {
            self.index += 1;
        }
        tok
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.current_token().text == text {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<&'a Token, SchemaError> {
        if self.current_token().text == text {
            Ok(self.advance())
        } else {
            Err(self.expected(&quote(text)))
        }
    }

    fn expect_match(&mut self, test: &Regex, expected: &str) -> Result<&'a Token, SchemaError> {
        let tok = self.current_token();
        if !tok.is_eof() && test.is_match(&tok.text) {
            Ok(self.advance())
        } else {
            Err(self.expected(expected))
        }
    }

    fn expected(&self, expected: &str) -> SchemaError {
        let tok = self.current_token();
        let found = if tok.is_eof() { "end of file".to_string() } else { quote(&tok.text) };
        self.error_at(tok, &format!("Expected {} but found {}", expected, found))
    }

    fn unexpected_token(&self) -> SchemaError {
        let tok = self.current_token();
        self.error_at(tok, &format!("Unexpected token {}", quote(&tok.text)))
    }

    fn error_at(&self, tok: &Token, msg: &str) -> SchemaError {
        error(self.file, msg, tok.line, tok.column)
    }

    /// `keyword Name {` starts a nested block; anything else is a statement.
    fn opens_block(&self) -> bool {
        IDENTIFIER.is_match(&self.peek(1).text) && self.peek(2).text == "{"
    }

    /// Skips one statement: up to and including the `;` that ends it, or the
    /// balanced `{ ... }` block it opens. Stops before a `}` that closes the
    /// enclosing block.
    fn skip_statement(&mut self) -> Result<(), SchemaError> {
        let start = self.current_token();
        let mut depth = 0usize;
        loop {
            let tok = self.current_token();
            if tok.is_eof() {
                return Err(self.error_at(
                    start,
                    &format!("Unterminated statement starting with {}", quote(&start.text)),
                ));
            }
            match tok.text.as_str() {
                "{" => depth += 1,
                "}" if depth == 0 => return Ok(()),
                "}" => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                ";" if depth == 0 => {
                    self.advance();
                    return Ok(());
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn take_statement(&mut self) -> Result<&'a [Token], SchemaError> {
        let start = self.index;
        self.skip_statement()?;
        Ok(&self.tokens[start..self.index])
    }

    fn parse_file(&mut self) -> Result<SchemaFile, SchemaError> {
        let mut schema = SchemaFile::new(self.file);

        while !self.current_token().is_eof() {
            let tok = self.current_token();
            match tok.text.as_str() {
                ";" => {
                    self.advance();
                }
                "syntax" | "edition" => {
                    self.advance();
                    self.expect("=")?;
                    let version = self.expect_match(&STRING_LITERAL, "version string")?;
                    self.expect(";")?;
                    schema.syntax = Some(unquote(&version.text));
                }
                "package" => {
                    if schema.package.is_some() {
                        return Err(self.error_at(tok, "Multiple package definitions"));
                    }
                    self.advance();
                    let name = self.expect_match(&TYPE_NAME, "package name")?;
                    self.expect(";")?;
                    schema.package = Some(name.text.trim_start_matches('.').to_string());
                }
                "import" => {
                    self.advance();
                    let public = self.eat("public");
                    if !public {
                        self.eat("weak");
                    }
                    let path = self.expect_match(&STRING_LITERAL, "import path")?;
                    self.expect(";")?;
                    schema.imports.push(Import {
                        path: unquote(&path.text),
                        public,
                    });
                }
                "option" | "extend" => self.skip_statement()?,
                "message" => {
                    let message = self.parse_message()?;
                    schema.messages.push(message);
                }
                "enum" => {
                    let enum_def = self.parse_enum()?;
                    schema.enums.push(enum_def);
                }
                "service" => {
                    let service = self.parse_service()?;
                    schema.services.push(service);
                }
                _ => return Err(self.unexpected_token()),
            }
        }

        Ok(schema)
    }

    fn parse_message(&mut self) -> Result<Message, SchemaError> {
        self.expect("message")?;
        let name_tok = self.expect_match(&IDENTIFIER, "message name")?;
        self.expect("{")?;

        let mut message = Message {
            name:     name_tok.text.clone(),
            line:     name_tok.line,
            column:   name_tok.column,
            fields:   Vec::new(),
            oneofs:   Vec::new(),
            messages: Vec::new(),
            enums:    Vec::new(),
        };

        loop {
            let tok = self.current_token();
            if tok.is_eof() {
                return Err(self.error_at(
                    name_tok,
                    &format!("Unterminated message {}", quote(&name_tok.text)),
                ));
            }
            match tok.text.as_str() {
                "}" => {
                    self.advance();
                    break;
                }
                ";" => {
                    self.advance();
                }
                "message" if self.opens_block() => message.messages.push(self.parse_message()?),
                "enum" if self.opens_block() => message.enums.push(self.parse_enum()?),
                "oneof" if self.opens_block() => message.oneofs.push(self.parse_oneof()?),
                "option" | "reserved" | "extensions" | "extend" => self.skip_statement()?,
                _ => {
                    let stmt = self.take_statement()?;
                    if let Some(field) = self.field_statement(stmt, false)? {
                        message.fields.push(field);
                    }
                }
            }
        }

        Ok(message)
    }

    fn parse_oneof(&mut self) -> Result<Oneof, SchemaError> {
        self.expect("oneof")?;
        let name_tok = self.expect_match(&IDENTIFIER, "oneof name")?;
        self.expect("{")?;

        let mut fields = Vec::new();
        loop {
            let tok = self.current_token();
            if tok.is_eof() {
                return Err(self.error_at(
                    name_tok,
                    &format!("Unterminated oneof {}", quote(&name_tok.text)),
                ));
            }
            match tok.text.as_str() {
                "}" => {
                    self.advance();
                    break;
                }
                ";" => {
                    self.advance();
                }
                "option" => self.skip_statement()?,
                _ => {
                    let stmt = self.take_statement()?;
                    if let Some(field) = self.field_statement(stmt, true)? {
                        fields.push(field);
                    }
                }
            }
        }

        if fields.is_empty() {
            return Err(self.error_at(
                name_tok,
                &format!("Oneof {} has no fields", quote(&name_tok.text)),
            ));
        }

        Ok(Oneof {
            name: name_tok.text.clone(),
            fields,
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDef, SchemaError> {
        self.expect("enum")?;
        let name_tok = self.expect_match(&IDENTIFIER, "enum name")?;
        self.expect("{")?;

        let mut values = Vec::new();
        loop {
            let tok = self.current_token();
            if tok.is_eof() {
                return Err(self.error_at(
                    name_tok,
                    &format!("Unterminated enum {}", quote(&name_tok.text)),
                ));
            }
            match tok.text.as_str() {
                "}" => {
                    self.advance();
                    break;
                }
                ";" => {
                    self.advance();
                }
                "option" | "reserved" => self.skip_statement()?,
                _ => {
                    let stmt = self.take_statement()?;
                    match enum_value_from_tokens(stmt) {
                        Some(value) => values.push(value),
                        None => debug!(
                            "{}:{}: ignoring statement in enum {}",
                            self.file, tok.line, name_tok.text
                        ),
                    }
                }
            }
        }

        if values.is_empty() {
            return Err(self.error_at(
                name_tok,
                &format!("Enum {} must contain at least one value", quote(&name_tok.text)),
            ));
        }

        Ok(EnumDef {
            name:   name_tok.text.clone(),
            line:   name_tok.line,
            column: name_tok.column,
            values,
        })
    }

    fn parse_service(&mut self) -> Result<Service, SchemaError> {
        self.expect("service")?;
        let name_tok = self.expect_match(&IDENTIFIER, "service name")?;
        self.expect("{")?;

        let mut methods = Vec::new();
        loop {
            let tok = self.current_token();
            if tok.is_eof() {
                return Err(self.error_at(
                    name_tok,
                    &format!("Unterminated service {}", quote(&name_tok.text)),
                ));
            }
            match tok.text.as_str() {
                "}" => {
                    self.advance();
                    break;
                }
                ";" => {
                    self.advance();
                }
                "rpc" => {
                    let stmt = self.take_statement()?;
                    match method_from_tokens(stmt) {
                        Some(method) => methods.push(method),
                        None => warn!(
                            "{}:{}: skipping malformed rpc in service {}",
                            self.file, tok.line, name_tok.text
                        ),
                    }
                }
                _ => self.skip_statement()?,
            }
        }

        Ok(Service {
            name: name_tok.text.clone(),
            methods,
        })
    }

    /// Turns a field statement into a `Field`. A statement that does not have
    /// the field shape is skipped with a warning, or rejected in strict mode.
    fn field_statement(
        &self,
        stmt: &'a [Token],
        in_oneof: bool,
    ) -> Result<Option<Field>, SchemaError> {
        match field_from_tokens(stmt, in_oneof) {
            Ok(field) => Ok(Some(field)),
            Err(reason) => {
                let first = stmt.first().unwrap_or_else(|| self.current_token());
                let text = stmt
                    .iter()
                    .map(|t| t.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if self.options.strict_fields {
                    Err(self.error_at(
                        first,
                        &format!("Malformed field {}: {}", quote(&text), reason),
                    ))
                } else {
                    warn!(
                        "{}:{}: skipping malformed field {}: {}",
                        self.file,
                        first.line,
                        quote(&text),
                        reason
                    );
                    Ok(None)
                }
            }
        }
    }
}

fn strip_semicolon(stmt: &[Token]) -> &[Token] {
    match stmt.last() {
        Some(tok) if tok.text == ";" => &stmt[..stmt.len() - 1],
        _ => stmt,
    }
}

/// Splits `body [options]` at the first `[`.
fn split_options(stmt: &[Token]) -> (&[Token], &[Token]) {
    match stmt.iter().position(|t| t.text == "[") {
        Some(i) => (&stmt[..i], &stmt[i..]),
        None => (stmt, &stmt[stmt.len()..]),
    }
}

fn scalar_or_named(text: &str) -> FieldType {
    match ScalarKind::from_keyword(text) {
        Some(kind) => FieldType::Scalar(kind),
        None => FieldType::Named(text.to_string()),
    }
}

/// `map < K , V >`
fn map_type_from_tokens(toks: &[Token]) -> Result<(FieldType, usize), String> {
    let texts: Vec<&str> = toks.iter().take(6).map(|t| t.text.as_str()).collect();
    if texts.len() < 6 || texts[1] != "<" || texts[3] != "," || texts[5] != ">" {
        return Err("expected map<key, value>".to_string());
    }
    let key = ScalarKind::from_keyword(texts[2])
        .filter(|k| k.is_valid_map_key())
        .ok_or_else(|| format!("{} is not a valid map key type", quote(texts[2])))?;
    if texts[4] == "map" || !TYPE_NAME.is_match(texts[4]) {
        return Err(format!("{} is not a valid map value type", quote(texts[4])));
    }
    Ok((FieldType::Map(key, Box::new(scalar_or_named(texts[4]))), 6))
}

fn field_from_tokens(stmt: &[Token], in_oneof: bool) -> Result<Field, String> {
    let (body, options) = split_options(strip_semicolon(stmt));
    if body.len() < 3 {
        return Err(format!(
            "expected `type name = number` but found {} tokens",
            body.len()
        ));
    }

    let mut index = 0;
    let mut label = Label::Singular;
    match body[0].text.as_str() {
        "repeated" => {
            label = Label::Repeated;
            index = 1;
        }
        "optional" | "required" => index = 1,
        _ => {}
    }
    if in_oneof && index > 0 {
        return Err("oneof members cannot carry a label".to_string());
    }

    let type_tok = body.get(index).ok_or("missing field type")?;
    let (type_, consumed) =
        if type_tok.text == "map" && body.get(index + 1).map_or(false, |t| t.text == "<") {
            map_type_from_tokens(&body[index..])?
        } else if TYPE_NAME.is_match(&type_tok.text) {
            (scalar_or_named(&type_tok.text), 1)
        } else {
            return Err(format!("{} is not a type name", quote(&type_tok.text)));
        };
    index += consumed;

    if let FieldType::Map(..) = type_ {
        if label == Label::Repeated {
            return Err("map fields cannot be repeated".to_string());
        }
        if in_oneof {
            return Err("map fields cannot be oneof members".to_string());
        }
    }

    let rest = &body[index..];
    if rest.len() != 3 || rest[1].text != "=" {
        return Err("expected `name = number` after the type".to_string());
    }
    let name_tok = &rest[0];
    if !IDENTIFIER.is_match(&name_tok.text) {
        return Err(format!("{} is not a field name", quote(&name_tok.text)));
    }
    let number = parse_int(&rest[2].text)
        .ok_or_else(|| format!("field number {} is not an integer", quote(&rest[2].text)))?;
    if !(1..=MAX_FIELD_NUMBER).contains(&number) {
        return Err(format!("field number {} is out of range", number));
    }

    Ok(Field {
        name: name_tok.text.clone(),
        line: name_tok.line,
        column: name_tok.column,
        type_,
        number: number as i32,
        label,
        is_deprecated: is_deprecated(options),
    })
}

/// Looks for `deprecated = true` inside a `[ ... ]` option list.
fn is_deprecated(options: &[Token]) -> bool {
    options
        .windows(3)
        .any(|w| w[0].text == "deprecated" && w[1].text == "=" && w[2].text == "true")
}

fn enum_value_from_tokens(stmt: &[Token]) -> Option<EnumValue> {
    let (body, _) = split_options(strip_semicolon(stmt));
    if body.len() != 3 || !IDENTIFIER.is_match(&body[0].text) || body[1].text != "=" {
        return None;
    }
    let number = parse_int(&body[2].text)?;
    Some(EnumValue {
        name:   body[0].text.clone(),
        number: i32::try_from(number).ok()?,
    })
}

/// `rpc Name ( [stream] Input ) returns ( [stream] Output ) ...`
fn method_from_tokens(stmt: &[Token]) -> Option<Method> {
    let texts: Vec<&str> = stmt.iter().map(|t| t.text.as_str()).collect();
    let name = texts.get(1).filter(|t| IDENTIFIER.is_match(t))?;
    let (client_streaming, input_type, next) = rpc_argument(&texts, 2)?;
    if texts.get(next) != Some(&"returns") {
        return None;
    }
    let (server_streaming, output_type, _) = rpc_argument(&texts, next + 1)?;
    Some(Method {
        name: name.to_string(),
        input_type,
        output_type,
        client_streaming,
        server_streaming,
    })
}

fn rpc_argument(texts: &[&str], mut index: usize) -> Option<(bool, String, usize)> {
    if texts.get(index) != Some(&"(") {
        return None;
    }
    index += 1;
    let streaming =
        texts.get(index) == Some(&"stream") && texts.get(index + 1).map_or(false, |t| *t != ")");
    if streaming {
        index += 1;
    }
    let type_name = texts.get(index).filter(|t| TYPE_NAME.is_match(t))?;
    index += 1;
    if texts.get(index) != Some(&")") {
        return None;
    }
    Some((streaming, type_name.to_string(), index + 1))
}
