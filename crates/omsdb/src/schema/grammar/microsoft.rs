use super::SchemaGrammar;
use crate::query::{Grammar, MicrosoftGrammar};
use crate::value::{ParamList, Value};

impl SchemaGrammar for MicrosoftGrammar {
    fn auto_increment_clause(&self) -> &'static str {
        "IDENTITY(1,1)"
    }

    fn compile_tables(&self, database: &str, params: &mut ParamList) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables WHERE table_catalog = {}",
            self.compile_value(&Value::from(database), params)
        )
    }

    fn compile_fields(&self, database: &str, table: &str, params: &mut ParamList) -> String {
        let database = self.compile_value(&Value::from(database), params);
        let table = self.compile_value(&Value::from(table), params);
        format!(
            "SELECT * FROM information_schema.columns WHERE table_catalog = {database} AND table_name = {table}"
        )
    }
}
