//! Scripted executor for tests and dry runs.
//!
//! Responses are matched by SQL fragment: the first rule whose fragment occurs
//! in the statement wins. Every statement is recorded, so callers can assert
//! exactly which queries were issued and in what order.

use super::{QueryError, QueryExecutor};
use crate::value::{TabularResult, Value};

#[derive(Debug, Clone)]
enum Response {
    Rows(TabularResult),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Rule {
    fragment: String,
    response: Response,
}

/// An executor that replays canned responses.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    rules: Vec<Rule>,
    calls: Vec<String>,
    registered: Vec<(String, String)>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `fragment` with `result`.
    pub fn respond(mut self, fragment: &str, result: TabularResult) -> Self {
        self.rules.push(Rule {
            fragment: fragment.to_string(),
            response: Response::Rows(result),
        });
        self
    }

    /// Answer statements containing `fragment` with a single count cell.
    pub fn respond_count(self, fragment: &str, count: i64) -> Self {
        self.respond(fragment, TabularResult::scalar("count_star()", Value::Int(count)))
    }

    /// Fail statements containing `fragment` with `message`.
    pub fn fail(mut self, fragment: &str, message: &str) -> Self {
        self.rules.push(Rule {
            fragment: fragment.to_string(),
            response: Response::Fail(message.to_string()),
        });
        self
    }

    /// Every statement executed so far, in order.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// `(name, pattern)` pairs passed to [`QueryExecutor::register`].
    pub fn registered(&self) -> &[(String, String)] {
        &self.registered
    }
}

impl QueryExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    fn execute(&mut self, sql: &str) -> Result<TabularResult, QueryError> {
        self.calls.push(sql.to_string());
        let rule = self.rules.iter().find(|r| sql.contains(&r.fragment));
        match rule.map(|r| &r.response) {
            Some(Response::Rows(result)) => Ok(result.clone()),
            Some(Response::Fail(message)) => Err(QueryError::new(message.clone())),
            None => Err(QueryError::new(format!("no scripted response for: {sql}"))),
        }
    }

    fn register(&mut self, name: &str, pattern: &str) -> Result<(), QueryError> {
        self.registered.push((name.to_string(), pattern.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        let mut exec = ScriptedExecutor::new()
            .respond_count("a/*.parquet", 5)
            .fail("parquet", "path not found");

        assert_eq!(exec.execute("SELECT COUNT(*) FROM 'a/*.parquet'").unwrap().count(), Some(5));
        assert!(exec.execute("SELECT COUNT(*) FROM 'b/*.parquet'").is_err());
        assert_eq!(exec.call_count(), 2);
    }

    #[test]
    fn unscripted_statement_fails() {
        let mut exec = ScriptedExecutor::new();
        let err = exec.execute("SELECT 1").unwrap_err();
        assert!(err.message.contains("no scripted response"));
        assert_eq!(exec.calls(), ["SELECT 1".to_string()]);
    }
}
