//! Template compilation in two passes.
//!
//! [`Template::parse`] turns source text into directive nodes without knowing the dialect;
//! [`Template::compile`] renders those nodes for one dialect into statement text plus the
//! ordered argument names. Neither pass touches shared state.
//!
//! ```rust
//! use sql_template::prelude::*;
//!
//! let template = Template::parse(
//!     r#"select * from users where name = {{arg "name"}} and active = {{TRUE}}"#,
//! )?;
//! let compiled = template.compile(Dialect::Postgres)?;
//! assert_eq!(compiled.statement(), "select * from users where name = $1 and active = true");
//! assert_eq!(compiled.arg_names(), ["name"]);
//! # Ok::<(), SqlTemplateError>(())
//! ```

mod parser;
mod render;
mod scanner;

pub use parser::{Condition, LIST_MARKER, Node};
pub use render::{Compiled, Fragment, list_marker};
pub(crate) use render::assemble;

use crate::dialect::Dialect;
use crate::error::SqlTemplateError;

/// Parsed, dialect-independent statement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template source.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::TemplateError` for malformed templates or unnamed arguments.
    pub fn parse(source: impl Into<String>) -> Result<Self, SqlTemplateError> {
        let source = source.into();
        let nodes = parser::parse(&source)?;
        Ok(Self { source, nodes })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Render for `dialect`.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::TemplateError` if an argument is declared twice in the
    /// branches selected for this dialect.
    pub fn compile(&self, dialect: Dialect) -> Result<Compiled, SqlTemplateError> {
        render::render(&self.nodes, dialect).map_err(|err| match err {
            SqlTemplateError::TemplateError(msg) => SqlTemplateError::TemplateError(format!(
                "{msg} in template:\n{}",
                self.source.trim()
            )),
            other => other,
        })
    }
}
