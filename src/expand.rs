use crate::binder::{Arg, list_item_name};
use crate::template::{Compiled, LIST_MARKER, assemble};

/// Statement text and argument order after list placeholders were sized for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expanded {
    pub statement: String,
    pub arg_names: Vec<String>,
}

/// Number of consecutive `base:0`, `base:1`, ... members present in `args`.
fn list_len(base: &str, args: &[Arg]) -> usize {
    let mut len = 0;
    while args.iter().any(|arg| arg.name == list_item_name(base, len)) {
        len += 1;
    }
    len
}

/// Size every list placeholder in `compiled` to the members supplied in `args`.
///
/// Always builds new values; `compiled` is shared between concurrent callers and is
/// never touched. A list with no members expands to nothing, so `in ()` is left for the
/// caller to avoid.
#[must_use]
pub fn expand(compiled: &Compiled, args: &[Arg]) -> Expanded {
    let dialect = compiled.dialect();

    let statement = assemble(compiled.fragments(), dialect, |base, position| {
        (0..list_len(base, args))
            .map(|i| {
                *position += 1;
                dialect.placeholder(&list_item_name(base, i), *position)
            })
            .collect::<Vec<_>>()
            .join(", ")
    });

    let mut arg_names = Vec::with_capacity(compiled.arg_names().len());
    for name in compiled.arg_names() {
        match name.strip_prefix(LIST_MARKER) {
            Some(base) => {
                arg_names.extend((0..list_len(base, args)).map(|i| list_item_name(base, i)));
            }
            None => arg_names.push(name.clone()),
        }
    }

    Expanded {
        statement,
        arg_names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::template::Template;

    fn compile(source: &str, dialect: Dialect) -> Compiled {
        Template::parse(source).unwrap().compile(dialect).unwrap()
    }

    const IN_QUERY: &str =
        r#"select * from docs where owner = {{arg "owner"}} and id in ({{arg "...ids"}}) and kind = {{arg "kind"}}"#;

    #[test]
    fn expands_in_suffix_order_and_continues_numbering() {
        let compiled = compile(IN_QUERY, Dialect::Postgres);
        let args = [
            Arg::new("ids:2", 30),
            Arg::new("kind", "memo"),
            Arg::new("ids:0", 10),
            Arg::new("owner", 1),
            Arg::new("ids:1", 20),
        ];
        let expanded = expand(&compiled, &args);
        assert_eq!(
            expanded.statement,
            "select * from docs where owner = $1 and id in ($2, $3, $4) and kind = $5"
        );
        assert_eq!(
            expanded.arg_names,
            ["owner", "ids:0", "ids:1", "ids:2", "kind"]
        );
    }

    #[test]
    fn positional_and_named_expansion() {
        let args = Arg::list("ids", [1, 2]);
        assert_eq!(
            expand(&compile(IN_QUERY, Dialect::Sqlite), &args).statement,
            "select * from docs where owner = ? and id in (?, ?) and kind = ?"
        );
        assert_eq!(
            expand(&compile(IN_QUERY, Dialect::Sqlserver), &args).statement,
            "select * from docs where owner = @owner and id in (@ids_0, @ids_1) and kind = @kind"
        );
    }

    #[test]
    fn empty_list_expands_to_nothing() {
        let compiled = compile(IN_QUERY, Dialect::Postgres);
        let expanded = expand(&compiled, &[Arg::new("owner", 1), Arg::new("kind", "x")]);
        assert_eq!(
            expanded.statement,
            "select * from docs where owner = $1 and id in () and kind = $2"
        );
        assert_eq!(expanded.arg_names, ["owner", "kind"]);
    }

    #[test]
    fn gaps_end_the_list() {
        let compiled = compile(IN_QUERY, Dialect::Mysql);
        let expanded = expand(&compiled, &[Arg::new("ids:0", 1), Arg::new("ids:2", 3)]);
        assert_eq!(expanded.arg_names, ["owner", "ids:0", "kind"]);
    }

    #[test]
    fn base_is_left_untouched() {
        let compiled = compile(IN_QUERY, Dialect::Postgres);
        let before = compiled.clone();
        let _ = expand(&compiled, &Arg::list("ids", [1, 2, 3, 4]));
        assert_eq!(compiled, before);
    }
}
