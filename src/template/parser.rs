use std::str::FromStr;

use crate::dialect::{ColumnType, Dialect};
use crate::error::SqlTemplateError;

use super::scanner::{Piece, Token, position, split, tokenize};

/// Prefix marking a placeholder as a dynamic-length list.
pub const LIST_MARKER: &str = "...";

/// One parsed template element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Arg(String),
    /// List placeholder; holds the base name without the marker.
    ListArg(String),
    Column(ColumnType),
    Now,
    Bool(bool),
    DefaultDateTime,
    Escape(String),
    DialectName,
    /// A bare dialect predicate, rendered as `true` or `false`.
    Predicate(Dialect),
    If {
        branches: Vec<(Condition, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Is(Dialect),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    #[must_use]
    pub fn holds(&self, dialect: Dialect) -> bool {
        match self {
            Condition::Is(d) => *d == dialect,
            Condition::Not(inner) => !inner.holds(dialect),
            Condition::And(all) => all.iter().all(|c| c.holds(dialect)),
            Condition::Or(any) => any.iter().any(|c| c.holds(dialect)),
        }
    }
}

/// An `if` block being filled in.
struct Frame {
    done: Vec<(Condition, Vec<Node>)>,
    /// `None` once the final `else` has been seen.
    cond: Option<Condition>,
    nodes: Vec<Node>,
    offset: usize,
}

impl Frame {
    fn close_branch(&mut self) {
        let nodes = std::mem::take(&mut self.nodes);
        if let Some(cond) = self.cond.take() {
            self.done.push((cond, nodes));
        }
    }

    fn finish(mut self) -> Node {
        let otherwise = if self.cond.is_none() {
            std::mem::take(&mut self.nodes)
        } else {
            self.close_branch();
            Vec::new()
        };
        Node::If {
            branches: self.done,
            otherwise,
        }
    }
}

/// Parse template source into nodes. Dialect independent.
///
/// # Errors
/// Returns `SqlTemplateError::TemplateError` for malformed actions, unknown directives,
/// empty argument names and unbalanced `if`/`else`/`end`.
pub fn parse(source: &str) -> Result<Vec<Node>, SqlTemplateError> {
    let mut root = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for piece in split(source)? {
        let (body, offset) = match piece {
            Piece::Text(text) => {
                target(&mut root, &mut stack).push(Node::Text(text.to_string()));
                continue;
            }
            Piece::Action { body, offset } => (body, offset),
        };
        if body.starts_with("/*") && body.ends_with("*/") {
            continue;
        }
        let fail = |msg: String| {
            SqlTemplateError::TemplateError(format!(
                "{msg} at {} in template:\n{source}",
                position(source, offset)
            ))
        };
        let tokens = tokenize(body).map_err(fail)?;

        match tokens.first() {
            Some(Token::Ident(word)) if word == "if" => {
                let cond = parse_condition_list(&tokens[1..]).map_err(fail)?;
                stack.push(Frame {
                    done: Vec::new(),
                    cond: Some(cond),
                    nodes: Vec::new(),
                    offset,
                });
            }
            Some(Token::Ident(word)) if word == "else" => {
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| fail("'else' without 'if'".into()))?;
                if frame.cond.is_none() {
                    return Err(fail("'else' after final 'else'".into()));
                }
                match tokens.get(1) {
                    Some(Token::Ident(word)) if word == "if" => {
                        let cond = parse_condition_list(&tokens[2..]).map_err(fail)?;
                        frame.close_branch();
                        frame.cond = Some(cond);
                    }
                    None => frame.close_branch(),
                    Some(_) => return Err(fail("unexpected tokens after 'else'".into())),
                }
            }
            Some(Token::Ident(word)) if word == "end" => {
                if tokens.len() > 1 {
                    return Err(fail("unexpected tokens after 'end'".into()));
                }
                let frame = stack
                    .pop()
                    .ok_or_else(|| fail("'end' without 'if'".into()))?;
                let node = frame.finish();
                target(&mut root, &mut stack).push(node);
            }
            _ => {
                let node = parse_directive(&tokens).map_err(fail)?;
                target(&mut root, &mut stack).push(node);
            }
        }
    }

    if let Some(frame) = stack.last() {
        return Err(SqlTemplateError::TemplateError(format!(
            "'if' at {} is never closed with 'end' in template:\n{source}",
            position(source, frame.offset)
        )));
    }
    Ok(root)
}

fn target<'a>(root: &'a mut Vec<Node>, stack: &'a mut [Frame]) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => &mut frame.nodes,
        None => root,
    }
}

fn parse_directive(tokens: &[Token]) -> Result<Node, String> {
    let Some(Token::Ident(word)) = tokens.first() else {
        return Err("expected a directive".to_string());
    };
    let args = &tokens[1..];

    let node = match word.as_str() {
        "arg" => {
            let name = single_string(word, args)?;
            return arg_node(name);
        }
        "varchar" => match args {
            [Token::Number(size)] => return Ok(Node::Column(ColumnType::Varchar(*size))),
            _ => return Err("varchar expects a single size argument".to_string()),
        },
        "escape" => {
            let name = single_string(word, args)?;
            if name.is_empty() {
                return Err("escape expects a non-empty identifier".to_string());
            }
            return Ok(Node::Escape(name.to_string()));
        }
        "bytes" => Node::Column(ColumnType::Bytes),
        "datetime" => Node::Column(ColumnType::DateTime),
        "text" => Node::Column(ColumnType::Text),
        "id" => Node::Column(ColumnType::Id),
        "int" => Node::Column(ColumnType::Integer),
        "bool" => Node::Column(ColumnType::Boolean),
        "NOW" => Node::Now,
        "TRUE" => Node::Bool(true),
        "FALSE" => Node::Bool(false),
        "default_datetime" => Node::DefaultDateTime,
        "db" => Node::DialectName,
        other => match Dialect::from_str(other) {
            Ok(dialect) if other == dialect.as_str() => Node::Predicate(dialect),
            _ => return Err(format!("unknown directive '{other}'")),
        },
    };

    if args.is_empty() {
        Ok(node)
    } else {
        Err(format!("'{word}' takes no arguments"))
    }
}

fn single_string<'t>(word: &str, args: &'t [Token]) -> Result<&'t str, String> {
    match args {
        [Token::Str(value)] => Ok(value),
        _ => Err(format!("'{word}' expects a single quoted string")),
    }
}

fn arg_node(name: &str) -> Result<Node, String> {
    if name.is_empty() {
        return Err("arguments must be named in sql statements".to_string());
    }
    match name.strip_prefix(LIST_MARKER) {
        Some("") => Err("list arguments must be named in sql statements".to_string()),
        Some(base) => Ok(Node::ListArg(base.to_string())),
        None => Ok(Node::Arg(name.to_string())),
    }
}

/// `if` accepts one condition; several bare terms are an error.
fn parse_condition_list(tokens: &[Token]) -> Result<Condition, String> {
    let (cond, rest) = parse_condition(tokens)?;
    if rest.is_empty() {
        Ok(cond)
    } else {
        Err("unexpected tokens after condition".to_string())
    }
}

fn parse_condition(tokens: &[Token]) -> Result<(Condition, &[Token]), String> {
    match tokens.first() {
        Some(Token::Ident(word)) if word == "not" => {
            let (inner, rest) = parse_term(&tokens[1..])?;
            Ok((Condition::Not(Box::new(inner)), rest))
        }
        Some(Token::Ident(word)) if word == "and" || word == "or" => {
            let mut terms = Vec::new();
            let mut rest = &tokens[1..];
            while !rest.is_empty() && rest[0] != Token::RParen {
                let (term, next) = parse_term(rest)?;
                terms.push(term);
                rest = next;
            }
            if terms.len() < 2 {
                return Err(format!("'{word}' needs at least two operands"));
            }
            let cond = if word == "and" {
                Condition::And(terms)
            } else {
                Condition::Or(terms)
            };
            Ok((cond, rest))
        }
        Some(_) => parse_term(tokens),
        None => Err("missing condition".to_string()),
    }
}

fn parse_term(tokens: &[Token]) -> Result<(Condition, &[Token]), String> {
    match tokens.first() {
        Some(Token::LParen) => {
            let (cond, rest) = parse_condition(&tokens[1..])?;
            match rest.first() {
                Some(Token::RParen) => Ok((cond, &rest[1..])),
                _ => Err("missing ')'".to_string()),
            }
        }
        Some(Token::Ident(word)) => match Dialect::from_str(word) {
            Ok(dialect) if word == dialect.as_str() => Ok((Condition::Is(dialect), &tokens[1..])),
            _ => Err(format!("unknown dialect predicate '{word}'")),
        },
        Some(other) => Err(format!("unexpected token {other:?} in condition")),
        None => Err("missing condition operand".to_string()),
    }
}
