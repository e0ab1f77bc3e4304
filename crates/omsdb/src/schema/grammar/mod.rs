//! Schema grammars.
//!
//! Each SQL grammar also implements [`SchemaGrammar`], reusing its identifier
//! quoting and placeholders for introspection and DDL statements.

mod microsoft;
mod mysql;
mod postgres;
mod sqlite;

use crate::error::{OmsError, OmsResult};
use crate::query::{AnsiGrammar, CompiledQuery, Grammar};
use crate::schema::{FieldDefinition, SchemaBuilder, SchemaQueryType};
use crate::value::{ParamList, Value};

/// Compiler for [`SchemaBuilder`] state.
pub trait SchemaGrammar: Grammar {
    /// Clause that makes a column auto-incrementing.
    fn auto_increment_clause(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }

    /// Whether an auto-incrementing primary key is declared on the column itself.
    fn inline_auto_increment_key(&self) -> bool {
        false
    }

    fn compile_schema_query(&self, query: &SchemaBuilder) -> OmsResult<CompiledQuery> {
        let mut params = ParamList::new();
        let prefix = query.prefix();
        let sql = match query.query_type() {
            SchemaQueryType::DropDatabase => {
                self.compile_drop_database(required(query.database(), "database")?)?
            }
            SchemaQueryType::Tables => {
                self.compile_tables(required(query.database(), "database")?, &mut params)
            }
            SchemaQueryType::Fields => self.compile_fields(
                required(query.database(), "database")?,
                &format!("{prefix}{}", required(query.table(), "table")?),
                &mut params,
            ),
            SchemaQueryType::CreateTable => self.compile_create_table(
                &self.compile_table(required(query.table(), "table")?, prefix),
                query.fields(),
            )?,
            SchemaQueryType::DropTable => format!(
                "DROP TABLE {}",
                self.compile_table(required(query.table(), "table")?, prefix)
            ),
            SchemaQueryType::Undefined => {
                return Err(OmsError::compile("schema query type is undefined"));
            }
        };
        Ok(CompiledQuery {
            sql,
            params: params.into_vec(),
            named: Vec::new(),
        })
    }

    fn compile_drop_database(&self, database: &str) -> OmsResult<String> {
        Ok(format!("DROP DATABASE {}", self.quote_part(database)))
    }

    /// Table names of `database`, returned in a `table_name` column.
    fn compile_tables(&self, database: &str, params: &mut ParamList) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = {}",
            self.compile_value(&Value::from(database), params)
        )
    }

    /// Column metadata of `table` (prefix already applied).
    fn compile_fields(&self, database: &str, table: &str, params: &mut ParamList) -> String {
        let database = self.compile_value(&Value::from(database), params);
        let table = self.compile_value(&Value::from(table), params);
        format!(
            "SELECT * FROM information_schema.columns WHERE table_schema = {database} AND table_name = {table}"
        )
    }

    fn compile_create_table(&self, table: &str, fields: &[FieldDefinition]) -> OmsResult<String> {
        if fields.is_empty() {
            return Err(OmsError::compile(format!("create table {table} without fields")));
        }
        let mut definitions: Vec<String> = fields.iter().map(|f| self.compile_field(f)).collect();
        let keys: Vec<String> = fields
            .iter()
            .filter(|f| f.primary && !(f.auto_increment && self.inline_auto_increment_key()))
            .map(|f| self.quote_part(&f.name))
            .collect();
        if !keys.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        Ok(format!("CREATE TABLE {table} ({})", definitions.join(", ")))
    }

    fn compile_field(&self, field: &FieldDefinition) -> String {
        let mut sql = format!("{} {}", self.quote_part(&field.name), field.data_type);
        if field.primary && field.auto_increment && self.inline_auto_increment_key() {
            sql.push_str(" PRIMARY KEY ");
            sql.push_str(self.auto_increment_clause());
            return sql;
        }
        sql.push_str(if field.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = &field.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.compile_literal(default));
        }
        if field.auto_increment {
            sql.push(' ');
            sql.push_str(self.auto_increment_clause());
        }
        if field.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }

    /// Inline SQL literal; DDL statements cannot take bind parameters.
    fn compile_literal(&self, value: &Value) -> String {
        let value = self.bind_value(value);
        match &value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => "0".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            _ => format!("'{}'", value.as_str().unwrap_or_default().replace('\'', "''")),
        }
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> OmsResult<&'a str> {
    value.ok_or_else(|| OmsError::compile(format!("schema query without {key}")))
}

impl SchemaGrammar for AnsiGrammar {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_escaping() {
        let g = AnsiGrammar::new();
        assert_eq!(g.compile_literal(&Value::from("it's")), "'it''s'");
        assert_eq!(g.compile_literal(&Value::Int(3)), "3");
        assert_eq!(g.compile_literal(&Value::Null), "NULL");
    }
}
