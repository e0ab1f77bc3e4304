//! Compiled statements handed to connections.

use crate::error::OmsResult;
use crate::value::{ParamType, Value};

/// SQL text plus ordered binds, produced by [`Grammar::compile_query`](super::Grammar::compile_query).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    /// Positional binds in placeholder order.
    pub params: Vec<Value>,
    /// Named binds (`:name` placeholders in raw statements).
    pub named: Vec<(String, Value)>,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Infer the bind type of every parameter.
    ///
    /// Fails on the first value that has no [`ParamType`], so nothing reaches the
    /// driver.
    pub fn prepare(self) -> OmsResult<PreparedQuery> {
        let params = self
            .params
            .into_iter()
            .map(|value| ParamType::of(&value).map(|ty| (value, ty)))
            .collect::<OmsResult<Vec<_>>>()?;
        let named = self
            .named
            .into_iter()
            .map(|(name, value)| ParamType::of(&value).map(|ty| (name, value, ty)))
            .collect::<OmsResult<Vec<_>>>()?;
        Ok(PreparedQuery {
            sql: self.sql,
            params,
            named,
        })
    }
}

/// Statement with typed binds, ready for a connection.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedQuery {
    pub sql: String,
    pub params: Vec<(Value, ParamType)>,
    pub named: Vec<(String, Value, ParamType)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OmsError;

    #[test]
    fn prepare_rejects_bool_before_io() {
        let mut compiled = CompiledQuery::new("SELECT ?");
        compiled.params.push(Value::Bool(true));
        assert!(matches!(compiled.prepare(), Err(OmsError::BindType(kind)) if kind == "bool"));
    }

    #[test]
    fn prepare_types_params() {
        let mut compiled = CompiledQuery::new("SELECT ?, ?");
        compiled.params = vec![Value::Int(1), Value::Float(2.5)];
        compiled.named = vec![("login".into(), Value::from("admin"))];
        let prepared = compiled.prepare().unwrap();
        assert_eq!(prepared.params[0].1, ParamType::Int);
        assert_eq!(prepared.params[1].1, ParamType::Str);
        assert_eq!(prepared.named[0].2, ParamType::Str);
    }
}
