use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

pub const STATUS_KEY: &str = "status";
pub const FAILED: &str = "failed";
pub const MSG_KEY: &str = "msg";
pub const TASK_KEY: &str = "task";
pub const STEP_KEY: &str = "step";

/// What one stage contributes to the accumulated result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PartialResult {
    values: IndexMap<String, Value>,
}

impl PartialResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expected stage failure: halts the pipeline without raising an error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new().fail(message)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.with(STATUS_KEY, FAILED).with(MSG_KEY, message.into())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_failed(&self) -> bool {
        self.values.get(STATUS_KEY).and_then(Value::as_str) == Some(FAILED)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Fill in `task` and `step` when the stage did not name itself.
    pub(crate) fn stamp(&mut self, task: &str, step: usize) {
        if !self.values.contains_key(TASK_KEY) {
            self.values.insert(TASK_KEY.to_string(), Value::from(task));
        }
        if !self.values.contains_key(STEP_KEY) {
            self.values.insert(STEP_KEY.to_string(), Value::from(step));
        }
    }
}

/// Accumulated result of a pipeline run. Never mutated in place: `merge` yields a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PipelineResult {
    values: IndexMap<String, Value>,
}

impl PipelineResult {
    pub fn initial(theme_code: &str, target_basket_id: Option<&str>) -> Self {
        let mut values = IndexMap::new();
        values.insert("theme_code".to_string(), Value::from(theme_code));
        values.insert(
            "target_basket_id".to_string(),
            target_basket_id.map(Value::from).unwrap_or(Value::Null),
        );
        PipelineResult { values }
    }

    /// Later keys overwrite earlier ones.
    pub fn merge(&self, partial: &PartialResult) -> PipelineResult {
        let mut values = self.values.clone();
        for (key, value) in partial.iter() {
            values.insert(key.clone(), value.clone());
        }
        PipelineResult { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn is_failed(&self) -> bool {
        self.get_str(STATUS_KEY) == Some(FAILED)
    }

    pub fn message(&self) -> Option<&str> {
        self.get_str(MSG_KEY)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}
