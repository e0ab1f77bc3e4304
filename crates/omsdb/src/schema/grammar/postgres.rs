use super::SchemaGrammar;
use crate::query::{Grammar, PostgresGrammar};
use crate::value::{ParamList, Value};

impl SchemaGrammar for PostgresGrammar {
    // `database` names the catalog; tables live in the current schema.
    fn compile_tables(&self, database: &str, params: &mut ParamList) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables WHERE table_catalog = {} AND table_schema = current_schema()",
            self.compile_value(&Value::from(database), params)
        )
    }

    fn compile_fields(&self, database: &str, table: &str, params: &mut ParamList) -> String {
        let database = self.compile_value(&Value::from(database), params);
        let table = self.compile_value(&Value::from(table), params);
        format!(
            "SELECT * FROM information_schema.columns WHERE table_catalog = {database} AND table_schema = current_schema() AND table_name = {table}"
        )
    }
}
