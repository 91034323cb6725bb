use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FLASH_KEY: &str = "_flash";

/// A flash message and its optional level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Value, Option<String>)", into = "(Value, Option<String>)")]
pub struct Flash {
    pub message: Value,
    pub level: Option<String>,
}

impl From<(Value, Option<String>)> for Flash {
    fn from((message, level): (Value, Option<String>)) -> Self {
        Self { message, level }
    }
}

impl From<Flash> for (Value, Option<String>) {
    fn from(flash: Flash) -> Self {
        (flash.message, flash.level)
    }
}

/// Session data that tracks whether it was changed since it was loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDict {
    data: Map<String, Value>,
    modified: bool,
    new: bool,
    sid: Option<String>,
}

impl SessionDict {
    /// An empty session that was not found in the request.
    pub fn new() -> Self {
        Self {
            new: true,
            ..Self::default()
        }
    }

    /// A session loaded from existing data.
    pub fn from_data(data: Map<String, Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Id of the session in external storage, if the backend uses one.
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Marks the session as saved.
    pub fn reset_modified(&mut self) {
        self.modified = false;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.modified = true;
        self.data.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    pub fn update(&mut self, values: Map<String, Value>) {
        if values.is_empty() {
            return;
        }
        self.modified = true;
        self.data.extend(values);
    }

    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.modified = true;
            self.data.clear();
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    pub fn add_flash(&mut self, message: impl Into<Value>, level: Option<&str>) {
        self.add_flash_to(FLASH_KEY, message, level);
    }

    pub fn add_flash_to(&mut self, key: &str, message: impl Into<Value>, level: Option<&str>) {
        let flash = Flash {
            message: message.into(),
            level: level.map(str::to_string),
        };
        let entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(flashes) => flashes.push(flash_value(flash)),
            other => *other = Value::Array(vec![flash_value(flash)]),
        }
        self.modified = true;
    }

    /// Flash messages are returned once, then removed.
    pub fn get_flashes(&mut self) -> Vec<Flash> {
        self.get_flashes_from(FLASH_KEY)
    }

    pub fn get_flashes_from(&mut self, key: &str) -> Vec<Flash> {
        // Reading an absent key must not mark the session as modified.
        match self.remove(key) {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

fn flash_value(flash: Flash) -> Value {
    let (message, level) = flash.into();
    Value::Array(vec![message, level.map_or(Value::Null, Value::String)])
}
