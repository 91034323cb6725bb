use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Json(Value),
    Binary(Vec<u8>),
}

impl Body {
    pub fn empty() -> Self {
        Body::Text(String::new())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Body::Text(text) => text.as_bytes().to_vec(),
            Body::Json(json) => json.to_string().into_bytes(),
            Body::Binary(bytes) => bytes.clone(),
        }
    }

    /// Body as text, lossily decoded when binary.
    pub fn to_text(&self) -> String {
        match self {
            Body::Text(text) => text.clone(),
            Body::Json(json) => json.to_string(),
            Body::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Text(text) => text.is_empty(),
            Body::Json(_) => false,
            Body::Binary(bytes) => bytes.is_empty(),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Value> for Body {
    fn from(json: Value) -> Self {
        Body::Json(json)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Binary(bytes)
    }
}
