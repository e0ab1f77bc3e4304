use super::SchemaGrammar;
use crate::query::MysqlGrammar;

impl SchemaGrammar for MysqlGrammar {
    fn auto_increment_clause(&self) -> &'static str {
        "AUTO_INCREMENT"
    }
}
