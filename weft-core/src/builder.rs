//! Contract builder seam
//!
//! The composed document and resolver table are handed to a
//! [`ContractBuilder`] which either accepts them or rejects the compile. The
//! default [`StructuralBuilder`] does not parse the contract grammar. It only
//! reads enough structure (object-like type names and their field heads) to
//! reject resolvers bound to types or fields the document never declares.

use crate::error::CompileError;
use crate::resolver::ResolverTable;
use indexmap::{IndexMap, IndexSet};

/// Type names and their field names, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    types: IndexMap<String, IndexSet<String>>,
}

impl Outline {
    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn has_field(&self, type_name: &str, field: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(|fields| fields.contains(field))
    }

    pub fn fields(&self, type_name: &str) -> impl Iterator<Item = &str> {
        self.types
            .get(type_name)
            .into_iter()
            .flat_map(|fields| fields.iter().map(String::as_str))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

/// Turns a composed document plus resolvers into an accepted contract
pub trait ContractBuilder: Send + Sync {
    fn build(&self, document: &str, resolvers: &ResolverTable) -> Result<Outline, CompileError>;
}

/// Accepts any document whose resolvers all point at declared fields
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralBuilder;

impl ContractBuilder for StructuralBuilder {
    fn build(&self, document: &str, resolvers: &ResolverTable) -> Result<Outline, CompileError> {
        let outline = outline(document);

        for (type_name, field, _) in resolvers.entries() {
            if !outline.has_type(&type_name) {
                return Err(CompileError::UnknownType(type_name));
            }
            if !outline.has_field(&type_name, &field) {
                return Err(CompileError::UnknownField { type_name, field });
            }
        }

        Ok(outline)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Punct(char),
}

/// Split a document into names and punctuation, dropping comments and
/// string literals (descriptions).
fn tokenize(document: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = document.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '"' => {
                let block = chars.peek() == Some(&'"') && {
                    let mut ahead = chars.clone();
                    ahead.next();
                    ahead.peek() == Some(&'"')
                };
                if block {
                    chars.next();
                    chars.next();
                    let mut quotes = 0;
                    for c in chars.by_ref() {
                        quotes = if c == '"' { quotes + 1 } else { 0 };
                        if quotes == 3 {
                            break;
                        }
                    }
                } else {
                    let mut escaped = false;
                    for c in chars.by_ref() {
                        match c {
                            '\\' if !escaped => escaped = true,
                            '"' if !escaped => break,
                            '\n' => break,
                            _ => escaped = false,
                        }
                    }
                }
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' => {
                let mut name = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '.' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            c if c.is_whitespace() || c == ',' => {}
            c => tokens.push(Token::Punct(c)),
        }
    }

    tokens
}

const DEFINITION_KEYWORDS: &[&str] = &[
    "type", "interface", "input", "enum", "scalar", "union", "schema", "directive", "extend",
];

fn is_name(token: Option<&Token>, expected: &str) -> bool {
    matches!(token, Some(Token::Name(n)) if n == expected)
}

/// Read type names and field heads of `type`, `interface` and `input`
/// definitions (including `extend` forms). Bodies of the same type declared
/// several times are unioned.
pub fn outline(document: &str) -> Outline {
    let tokens = tokenize(document);
    let mut outline = Outline::default();
    let mut i = 0;

    while i < tokens.len() {
        let opens_body = ["type", "interface", "input"]
            .iter()
            .any(|kw| is_name(tokens.get(i), kw));
        if !opens_body {
            i += 1;
            continue;
        }

        let Some(Token::Name(type_name)) = tokens.get(i + 1) else {
            i += 1;
            continue;
        };
        let type_name = type_name.clone();
        let fields = outline.types.entry(type_name).or_default();
        i += 2;

        // skip `implements ...` and directives up to the body
        let mut parens = 0usize;
        while let Some(token) = tokens.get(i) {
            match token {
                Token::Punct('(') => parens += 1,
                Token::Punct(')') => parens = parens.saturating_sub(1),
                Token::Punct('{') if parens == 0 => break,
                Token::Name(n) if parens == 0 && DEFINITION_KEYWORDS.contains(&n.as_str()) => break,
                _ => {}
            }
            i += 1;
        }
        if !matches!(tokens.get(i), Some(Token::Punct('{'))) {
            continue;
        }
        i += 1;

        let mut braces = 1usize;
        let mut parens = 0usize;
        while braces > 0 {
            let Some(token) = tokens.get(i) else { break };
            match token {
                Token::Punct('{') => braces += 1,
                Token::Punct('}') => braces -= 1,
                Token::Punct('(') => parens += 1,
                Token::Punct(')') => parens = parens.saturating_sub(1),
                Token::Name(name) if braces == 1 && parens == 0 => {
                    let previous = i.checked_sub(1).and_then(|p| tokens.get(p));
                    let after_directive = matches!(previous, Some(Token::Punct('@')));
                    let is_field = matches!(
                        tokens.get(i + 1),
                        Some(Token::Punct(':')) | Some(Token::Punct('('))
                    );
                    if is_field && !after_directive {
                        fields.insert(name.clone());
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    outline
}
