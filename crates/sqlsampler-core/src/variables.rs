//! Scenario variable store contract
//!
//! Later steps of a test scenario read what the engine publishes here. The
//! engine only relies on the read/write/remove contract of [`VariableStore`];
//! [`ScenarioVariables`] is a plain in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ResultSet, RowMap};

/// Rows collected under a results variable, shared with the store by reference
pub type SharedRows = Arc<Mutex<Vec<RowMap>>>;

/// An output cursor stored as-is
pub type SharedResultSet = Arc<Mutex<Box<dyn ResultSet>>>;

/// Non-textual value published into the store
#[derive(Clone)]
pub enum VariableObject {
    Rows(SharedRows),
    ResultSet(SharedResultSet),
}

impl VariableObject {
    pub fn as_rows(&self) -> Option<&SharedRows> {
        match self {
            VariableObject::Rows(rows) => Some(rows),
            VariableObject::ResultSet(_) => None,
        }
    }

    pub fn as_result_set(&self) -> Option<&SharedResultSet> {
        match self {
            VariableObject::ResultSet(rs) => Some(rs),
            VariableObject::Rows(_) => None,
        }
    }
}

impl std::fmt::Debug for VariableObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableObject::Rows(rows) => write!(f, "Rows({})", rows.lock().len()),
            VariableObject::ResultSet(rs) => write!(f, "ResultSet({})", rs.lock().describe()),
        }
    }
}

/// Variables scoped to the current execution context
pub trait VariableStore {
    /// Textual value of a variable; `None` when absent, NULL, or an object
    fn get(&self, name: &str) -> Option<String>;

    /// Store a textual value. `None` records a NULL, which is distinct from removal.
    fn put(&mut self, name: &str, value: Option<String>);

    fn put_object(&mut self, name: &str, value: VariableObject);

    fn get_object(&self, name: &str) -> Option<VariableObject>;

    fn remove(&mut self, name: &str);
}

#[derive(Debug, Clone)]
enum Entry {
    Text(Option<String>),
    Object(VariableObject),
}

/// In-memory variable store
#[derive(Debug, Default, Clone)]
pub struct ScenarioVariables {
    entries: HashMap<String, Entry>,
}

impl ScenarioVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a name is bound at all (including to NULL)
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted variable names, handy for assertions and debugging
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl VariableStore for ScenarioVariables {
    fn get(&self, name: &str) -> Option<String> {
        match self.entries.get(name)? {
            Entry::Text(text) => text.clone(),
            Entry::Object(_) => None,
        }
    }

    fn put(&mut self, name: &str, value: Option<String>) {
        self.entries.insert(name.to_string(), Entry::Text(value));
    }

    fn put_object(&mut self, name: &str, value: VariableObject) {
        self.entries.insert(name.to_string(), Entry::Object(value));
    }

    fn get_object(&self, name: &str) -> Option<VariableObject> {
        match self.entries.get(name)? {
            Entry::Object(object) => Some(object.clone()),
            Entry::Text(_) => None,
        }
    }

    fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_put_get_remove() {
        let mut vars = ScenarioVariables::new();
        vars.put("a", Some("1".into()));
        assert_eq!(vars.get("a").as_deref(), Some("1"));

        vars.remove("a");
        assert!(!vars.contains("a"));
        assert!(vars.is_empty());
    }

    #[test]
    fn test_null_is_bound_but_has_no_text() {
        let mut vars = ScenarioVariables::new();
        vars.put("n", None);
        assert!(vars.contains("n"));
        assert_eq!(vars.get("n"), None);
    }

    #[test]
    fn test_objects_are_shared_by_reference() {
        let mut vars = ScenarioVariables::new();
        let rows: SharedRows = Arc::new(Mutex::new(Vec::new()));
        vars.put_object("rows", VariableObject::Rows(rows.clone()));

        let mut row = RowMap::new();
        row.insert("ID".into(), Value::Int64(1));
        rows.lock().push(row);

        let stored = vars.get_object("rows").unwrap();
        assert_eq!(stored.as_rows().unwrap().lock().len(), 1);
        assert_eq!(vars.get("rows"), None);
    }
}
