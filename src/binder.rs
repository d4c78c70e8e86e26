use crate::dialect::{Dialect, param_name};
use crate::types::Value;

/// A named argument supplied at call time.
///
/// ```rust
/// use sql_template::prelude::*;
///
/// let mut args = vec![Arg::new("group_id", 7)];
/// args.extend(Arg::list("ids", ["a", "b", "c"]));
/// assert_eq!(args[3].name, "ids:2");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub value: Value,
}

impl Arg {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Arguments for a list placeholder `{{arg "...name"}}`, named `name:0`, `name:1`, ...
    pub fn list<I>(name: &str, values: I) -> Vec<Arg>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Arg::new(list_item_name(name, i), value))
            .collect()
    }
}

/// Name of the `index`th member of list `base`.
#[must_use]
pub fn list_item_name(base: &str, index: usize) -> String {
    format!("{base}:{index}")
}

/// Values ready for the driver, in the order the statement expects them.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundParams {
    Positional(Vec<Value>),
    /// Values keyed by the placeholder name (without the `@`).
    Named(Vec<(String, Value)>),
}

impl BoundParams {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            BoundParams::Positional(values) => values.len(),
            BoundParams::Named(pairs) => pairs.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in statement order, dropping names.
    #[must_use]
    pub fn values(&self) -> Vec<&Value> {
        match self {
            BoundParams::Positional(values) => values.iter().collect(),
            BoundParams::Named(pairs) => pairs.iter().map(|(_, v)| v).collect(),
        }
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        match self {
            BoundParams::Positional(values) => values,
            BoundParams::Named(pairs) => pairs.into_iter().map(|(_, v)| v).collect(),
        }
    }
}

/// Bring a value into the canonical form every backend receives.
///
/// Zoned timestamps become UTC; everything else, including NULL standing in for an
/// absent timestamp, passes through.
#[must_use]
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::TimestampTz(dt) => Value::Timestamp(dt.naive_utc()),
        other => other.clone(),
    }
}

/// Order `args` to match `arg_names`.
///
/// The first supplied argument with a matching name wins. Declared names the caller
/// omitted bind nothing, leaving the driver to reject the statement; supplied names the
/// statement does not reference are ignored.
#[must_use]
pub fn bind(arg_names: &[String], args: &[Arg], dialect: Dialect) -> BoundParams {
    let matched = arg_names
        .iter()
        .filter_map(|name| args.iter().find(|arg| &arg.name == name));

    if dialect.binds_by_name() {
        BoundParams::Named(
            matched
                .map(|arg| (param_name(&arg.name), normalize(&arg.value)))
                .collect(),
        )
    } else {
        BoundParams::Positional(matched.map(|arg| normalize(&arg.value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn order_of_supplied_args_does_not_matter() {
        let declared = names(&["a", "b", "c"]);
        let in_order = [Arg::new("a", 1), Arg::new("b", 2), Arg::new("c", 3)];
        let shuffled = [Arg::new("b", 2), Arg::new("c", 3), Arg::new("a", 1)];
        for dialect in Dialect::ALL {
            assert_eq!(
                bind(&declared, &in_order, dialect),
                bind(&declared, &shuffled, dialect)
            );
        }
        assert_eq!(
            bind(&declared, &shuffled, Dialect::Postgres),
            BoundParams::Positional(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn named_dialects_keep_names() {
        let declared = names(&["id", "ids:0"]);
        let bound = bind(
            &declared,
            &[Arg::new("ids:0", "x"), Arg::new("id", 4)],
            Dialect::Sqlserver,
        );
        assert_eq!(
            bound,
            BoundParams::Named(vec![
                ("id".into(), Value::Int(4)),
                ("ids_0".into(), Value::Text("x".into())),
            ])
        );
    }

    #[test]
    fn missing_and_extra_args() {
        let declared = names(&["a", "b"]);
        let bound = bind(&declared, &[Arg::new("b", 2), Arg::new("z", 9)], Dialect::Sqlite);
        assert_eq!(bound, BoundParams::Positional(vec![Value::Int(2)]));
        assert_eq!(bound.len(), 1);
    }

    #[test]
    fn timestamps_are_normalized_to_utc() {
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let declared = names(&["at", "maybe", "none"]);
        let bound = bind(
            &declared,
            &[
                Arg::new("at", local),
                Arg::new("maybe", Some(Utc.from_utc_datetime(&expected))),
                Arg::new("none", None::<chrono::DateTime<Utc>>),
            ],
            Dialect::Mysql,
        );
        assert_eq!(
            bound.into_values(),
            vec![
                Value::Timestamp(expected),
                Value::Timestamp(expected),
                Value::Null
            ]
        );
    }

    #[test]
    fn list_helper_numbers_members() {
        let args = Arg::list("ids", vec![10_i64, 20, 30]);
        let got: Vec<_> = args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(got, ["ids:0", "ids:1", "ids:2"]);
        assert!(Arg::list("ids", Vec::<i64>::new()).is_empty());
    }
}
