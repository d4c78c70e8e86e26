use std::error::Error;

use chrono::{TimeZone, Utc};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::binder::BoundParams;
use crate::types::Value;

/// Postgres parameters in statement order.
pub struct Params {
    values: Vec<Value>,
}

impl Params {
    /// Named parameters keep their order; Postgres binds by position.
    #[must_use]
    pub fn convert(params: &BoundParams) -> Self {
        Self {
            values: params.clone().into_values(),
        }
    }

    #[must_use]
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect()
    }
}

fn out_of_range(what: &str, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("{what} out of range for column type {ty}").into()
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)
                    .map_err(|_| out_of_range("integer", ty))?
                    .to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)
                    .map_err(|_| out_of_range("integer", ty))?
                    .to_sql(ty, out),
                _ => (*i).to_sql(ty, out),
            },
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(f) if *ty == Type::FLOAT4 => (*f as f32).to_sql(ty, out),
            Value::Float(f) => (*f).to_sql(ty, out),
            Value::Text(s) => s.to_sql(ty, out),
            Value::Bool(b) => (*b).to_sql(ty, out),
            Value::Timestamp(dt) if *ty == Type::TIMESTAMPTZ => {
                Utc.from_utc_datetime(dt).to_sql(ty, out)
            }
            Value::Timestamp(dt) => dt.to_sql(ty, out),
            Value::TimestampTz(dt) if *ty == Type::TIMESTAMPTZ => dt.to_sql(ty, out),
            Value::TimestampTz(dt) => dt.naive_utc().to_sql(ty, out),
            Value::Null => Ok(IsNull::Yes),
            Value::Json(json) => json.to_sql(ty, out),
            Value::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}
