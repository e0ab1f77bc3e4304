//! Schema builder: table listing, field listing and DDL.
//!
//! ```ignore
//! let mut schema = SchemaBuilder::new(connection);
//! schema
//!     .create_table("accounts")?
//!     .field(FieldDefinition::new("id", "INTEGER").primary().auto_increment())
//!     .field(FieldDefinition::new("login", "VARCHAR(255)").unique());
//! schema.execute().await?;
//! ```

mod grammar;

pub use grammar::SchemaGrammar;

use crate::connection::{Connection, DatabaseStatus};
use crate::error::{OmsError, OmsResult};
use crate::log::trace_sql;
use crate::query::CompiledQuery;
use crate::row::QueryResult;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Schema statement kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SchemaQueryType {
    #[default]
    Undefined,
    DropDatabase,
    Tables,
    Fields,
    CreateTable,
    DropTable,
}

impl fmt::Display for SchemaQueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaQueryType::Undefined => "undefined",
            SchemaQueryType::DropDatabase => "drop database",
            SchemaQueryType::Tables => "tables",
            SchemaQueryType::Fields => "fields",
            SchemaQueryType::CreateTable => "create table",
            SchemaQueryType::DropTable => "drop table",
        };
        f.write_str(name)
    }
}

/// Column of a `CREATE TABLE` statement.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    /// Dialect type, emitted verbatim (`INTEGER`, `VARCHAR(255)`, ...).
    pub data_type: String,
    pub default: Option<Value>,
    pub nullable: bool,
    pub primary: bool,
    pub auto_increment: bool,
    pub unique: bool,
}

impl FieldDefinition {
    /// Non-null column without default.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            default: None,
            nullable: false,
            primary: false,
            auto_increment: false,
            unique: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Builder for schema statements, bound to one connection.
#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    connection: Arc<dyn Connection>,
    grammar: Arc<dyn SchemaGrammar>,
    prefix: String,
    query_type: SchemaQueryType,
    database: Option<String>,
    table: Option<String>,
    fields: Vec<FieldDefinition>,
}

impl SchemaBuilder {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        let grammar = connection.schema_grammar();
        let prefix = connection.prefix();
        Self {
            connection,
            grammar,
            prefix,
            query_type: SchemaQueryType::Undefined,
            database: None,
            table: None,
            fields: Vec::new(),
        }
    }

    pub fn query_type(&self) -> SchemaQueryType {
        self.query_type
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    fn set_type(&mut self, kind: SchemaQueryType) -> OmsResult<()> {
        if self.query_type != SchemaQueryType::Undefined && self.query_type != kind {
            return Err(OmsError::QueryType(format!(
                "cannot turn a {} schema query into {kind}",
                self.query_type
            )));
        }
        self.query_type = kind;
        Ok(())
    }

    pub fn drop_database(&mut self, database: &str) -> OmsResult<&mut Self> {
        self.set_type(SchemaQueryType::DropDatabase)?;
        self.database = Some(database.to_string());
        Ok(self)
    }

    /// List the tables of the connection's database.
    pub fn select_tables(&mut self) -> OmsResult<&mut Self> {
        self.set_type(SchemaQueryType::Tables)?;
        self.database = Some(self.connection.database());
        Ok(self)
    }

    /// List the columns of `table`.
    pub fn select_fields(&mut self, table: &str) -> OmsResult<&mut Self> {
        self.set_type(SchemaQueryType::Fields)?;
        self.database = Some(self.connection.database());
        self.table = Some(table.to_string());
        Ok(self)
    }

    pub fn create_table(&mut self, table: &str) -> OmsResult<&mut Self> {
        self.set_type(SchemaQueryType::CreateTable)?;
        self.table = Some(table.to_string());
        Ok(self)
    }

    pub fn field(&mut self, field: FieldDefinition) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn drop_table(&mut self, table: &str) -> OmsResult<&mut Self> {
        self.set_type(SchemaQueryType::DropTable)?;
        self.table = Some(table.to_string());
        Ok(self)
    }

    pub fn to_sql(&self) -> OmsResult<String> {
        Ok(self.compile()?.sql)
    }

    pub fn compile(&self) -> OmsResult<CompiledQuery> {
        self.grammar.compile_schema_query(self)
    }

    pub async fn execute(&self) -> OmsResult<QueryResult> {
        let prepared = self.compile()?.prepare()?;

        let status = self.connection.status();
        if status != DatabaseStatus::Ok {
            return Err(OmsError::connection(format!(
                "cannot execute on a connection with status {status:?}"
            )));
        }

        trace_sql(self.connection.db_type(), &prepared.sql, prepared.params.len());
        self.connection.run(&prepared).await
    }
}
