use std::collections::HashSet;

use crate::dialect::{Dialect, param_name};
use crate::error::SqlTemplateError;

use super::parser::{LIST_MARKER, Node};

/// A piece of compiled statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Sql(String),
    /// A single named placeholder.
    Param(String),
    /// A dynamic list placeholder, keyed by its base name.
    List(String),
}

/// The dialect-specific result of compiling a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    dialect: Dialect,
    statement: String,
    arg_names: Vec<String>,
    fragments: Vec<Fragment>,
    has_list: bool,
}

impl Compiled {
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Final statement text. List placeholders show as `{{list "name"}}` until expanded.
    #[must_use]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Argument names in declaration order; list placeholders keep their `...` prefix.
    #[must_use]
    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    #[must_use]
    pub fn has_list(&self) -> bool {
        self.has_list
    }

    pub(crate) fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
}

/// Text shown in place of an unexpanded list placeholder.
#[must_use]
pub fn list_marker(base: &str) -> String {
    format!("{{{{list \"{base}\"}}}}")
}

struct Renderer {
    dialect: Dialect,
    fragments: Vec<Fragment>,
    arg_names: Vec<String>,
    seen: HashSet<String>,
    has_list: bool,
}

impl Renderer {
    fn push_sql(&mut self, text: &str) {
        if let Some(Fragment::Sql(last)) = self.fragments.last_mut() {
            last.push_str(text);
        } else {
            self.fragments.push(Fragment::Sql(text.to_string()));
        }
    }

    fn register(&mut self, name: String) -> Result<(), SqlTemplateError> {
        if !self.seen.insert(name.clone()) {
            return Err(SqlTemplateError::TemplateError(format!(
                "{name} already exists in the query arguments"
            )));
        }
        self.arg_names.push(name);
        Ok(())
    }

    fn walk(&mut self, nodes: &[Node]) -> Result<(), SqlTemplateError> {
        let dialect = self.dialect;
        for node in nodes {
            match node {
                Node::Text(text) => self.push_sql(text),
                Node::Arg(name) => {
                    self.register(name.clone())?;
                    self.fragments.push(Fragment::Param(name.clone()));
                }
                Node::ListArg(base) => {
                    self.register(format!("{LIST_MARKER}{base}"))?;
                    self.has_list = true;
                    self.fragments.push(Fragment::List(base.clone()));
                }
                Node::Column(column) => self.push_sql(&dialect.column_type(*column)),
                Node::Now => self.push_sql(dialect.now_literal()),
                Node::Bool(value) => self.push_sql(dialect.bool_literal(*value)),
                Node::DefaultDateTime => self.push_sql(dialect.default_datetime()),
                Node::Escape(word) => self.push_sql(&dialect.escape_identifier(word)),
                Node::DialectName => self.push_sql(dialect.as_str()),
                Node::Predicate(d) => self.push_sql(if *d == dialect { "true" } else { "false" }),
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let chosen = branches
                        .iter()
                        .find(|(cond, _)| cond.holds(dialect))
                        .map_or(otherwise.as_slice(), |(_, body)| body.as_slice());
                    self.walk(chosen)?;
                }
            }
        }
        Ok(())
    }
}

/// Render parsed nodes for `dialect`.
///
/// Only the taken branch of each conditional contributes text and arguments, so the same
/// name may appear in mutually exclusive branches.
///
/// # Errors
/// Returns `SqlTemplateError::TemplateError` if an argument name is declared twice.
pub fn render(nodes: &[Node], dialect: Dialect) -> Result<Compiled, SqlTemplateError> {
    let mut renderer = Renderer {
        dialect,
        fragments: Vec::new(),
        arg_names: Vec::new(),
        seen: HashSet::new(),
        has_list: false,
    };
    renderer.walk(nodes)?;
    if dialect.binds_by_name() {
        check_bound_names(&renderer.arg_names)?;
    }

    let mut fragments = renderer.fragments;
    trim_edges(&mut fragments);
    let statement = assemble(&fragments, dialect, |base, _| list_marker(base));

    Ok(Compiled {
        dialect,
        statement,
        arg_names: renderer.arg_names,
        fragments,
        has_list: renderer.has_list,
    })
}

/// Named dialects bind by the sanitised name, so distinct argument names must stay
/// distinct after sanitising, including every `base_N` a list can expand to.
fn check_bound_names(arg_names: &[String]) -> Result<(), SqlTemplateError> {
    let mut plain: Vec<(String, &str)> = Vec::new();
    let mut lists: Vec<(String, &str)> = Vec::new();
    for name in arg_names {
        let (bound, registry) = match name.strip_prefix(LIST_MARKER) {
            Some(base) => (param_name(base), &mut lists),
            None => (param_name(name), &mut plain),
        };
        if let Some((_, other)) = registry.iter().find(|(b, _)| *b == bound) {
            return Err(bind_collision(other, name, &bound));
        }
        registry.push((bound, name.as_str()));
    }

    for (bound, name) in &plain {
        for (prefix, list) in &lists {
            let member_index = bound
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_'));
            // list members are numbered without leading zeros
            if member_index
                .is_some_and(|idx| idx.parse::<usize>().is_ok_and(|i| i.to_string() == idx))
            {
                return Err(bind_collision(list, name, bound));
            }
        }
    }
    Ok(())
}

fn bind_collision(first: &str, second: &str, bound: &str) -> SqlTemplateError {
    SqlTemplateError::TemplateError(format!(
        "{first} and {second} would both bind as @{bound}"
    ))
}

fn trim_edges(fragments: &mut Vec<Fragment>) {
    if let Some(Fragment::Sql(first)) = fragments.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(Fragment::Sql(last)) = fragments.last_mut() {
        last.truncate(last.trim_end().len());
    }
    fragments.retain(|f| !matches!(f, Fragment::Sql(s) if s.is_empty()));
}

/// Join fragments into text, numbering placeholders in order.
///
/// `list` renders a list fragment given its base name and the running placeholder count,
/// returning the text and advancing the count itself when it emits placeholders.
pub(crate) fn assemble(
    fragments: &[Fragment],
    dialect: Dialect,
    mut list: impl FnMut(&str, &mut usize) -> String,
) -> String {
    let mut out = String::new();
    let mut position = 0;
    for fragment in fragments {
        match fragment {
            Fragment::Sql(text) => out.push_str(text),
            Fragment::Param(name) => {
                position += 1;
                out.push_str(&dialect.placeholder(name, position));
            }
            Fragment::List(base) => out.push_str(&list(base, &mut position)),
        }
    }
    out
}
