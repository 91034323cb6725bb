use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;

use super::RuleError;

/// Characters left as-is when a value is placed in a URL path or fragment.
pub(crate) const URL_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/')
    .remove(b':');

pub fn url_quote(value: &str) -> String {
    utf8_percent_encode(value, URL_SAFE).to_string()
}

/// Placeholder types usable in rule patterns: `<name>`, `<int:name>`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Converter {
    String {
        minlength: usize,
        maxlength: Option<usize>,
    },
    Int,
    Float,
    Path,
    Any(Vec<String>),
    Regex(String),
}

impl Default for Converter {
    fn default() -> Self {
        Converter::String {
            minlength: 1,
            maxlength: None,
        }
    }
}

impl Converter {
    pub fn parse(name: Option<&str>, args: Option<&str>) -> Result<Self, RuleError> {
        let invalid = |reason: &str| RuleError::InvalidConverter {
            converter: name.unwrap_or("default").to_string(),
            reason: reason.to_string(),
        };

        match name {
            None | Some("default") | Some("string") | Some("unicode") => {
                let mut minlength = 1;
                let mut maxlength = None;
                for (key, value) in keyword_args(args.unwrap_or_default()) {
                    let value: usize = value.parse().map_err(|_| invalid("expected a number"))?;
                    match key.as_str() {
                        "minlength" => minlength = value,
                        "maxlength" => maxlength = Some(value),
                        "length" => {
                            minlength = value;
                            maxlength = Some(value);
                        }
                        _ => return Err(invalid("unknown argument")),
                    }
                }
                Ok(Converter::String {
                    minlength,
                    maxlength,
                })
            }
            Some("int") => Ok(Converter::Int),
            Some("float") => Ok(Converter::Float),
            Some("path") => Ok(Converter::Path),
            Some("any") => {
                let items: Vec<String> = positional_args(args.unwrap_or_default());
                if items.is_empty() {
                    return Err(invalid("any() needs at least one item"));
                }
                Ok(Converter::Any(items))
            }
            Some("regex") | Some("re") => {
                let pattern = positional_args(args.unwrap_or_default())
                    .into_iter()
                    .next()
                    .ok_or_else(|| invalid("regex() needs a pattern"))?;
                Ok(Converter::Regex(pattern))
            }
            Some(_) => Err(invalid("unknown converter")),
        }
    }

    /// Regular expression fragment matching one value, without groups.
    pub fn regex(&self) -> String {
        match self {
            Converter::String {
                minlength,
                maxlength,
            } => match maxlength {
                Some(max) => format!("[^/]{{{minlength},{max}}}"),
                None => format!("[^/]{{{minlength},}}"),
            },
            Converter::Int => r"\d+".to_string(),
            Converter::Float => r"\d+\.\d+".to_string(),
            Converter::Path => "[^/].*?".to_string(),
            Converter::Any(items) => format!(
                "(?:{})",
                items
                    .iter()
                    .map(|item| regex::escape(item))
                    .collect::<Vec<_>>()
                    .join("|")
            ),
            Converter::Regex(pattern) => format!("(?:{pattern})"),
        }
    }

    pub(crate) fn validator(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!("^(?:{})$", self.regex()))
    }
}

fn split_args(args: &str) -> Vec<String> {
    args.split(',')
        .map(|arg| arg.trim())
        .filter(|arg| !arg.is_empty())
        .map(|arg| arg.to_string())
        .collect()
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    value.to_string()
}

fn positional_args(args: &str) -> Vec<String> {
    let args = args.trim();
    // A single quoted argument may itself contain commas (regular expressions).
    if args.len() >= 2 && (args.starts_with('"') || args.starts_with('\'')) {
        let quote = &args[..1];
        if args.ends_with(quote) && !args[1..args.len() - 1].contains(quote) {
            return vec![unquote(args)];
        }
    }
    split_args(args).iter().map(|arg| unquote(arg)).collect()
}

fn keyword_args(args: &str) -> Vec<(String, String)> {
    split_args(args)
        .into_iter()
        .filter_map(|arg| {
            arg.split_once('=')
                .map(|(key, value)| (key.trim().to_string(), unquote(value)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_converters() {
        assert_eq!(Converter::parse(None, None).unwrap(), Converter::default());
        assert_eq!(Converter::parse(Some("int"), None).unwrap(), Converter::Int);
        assert_eq!(
            Converter::parse(Some("any"), Some("'about', help")).unwrap(),
            Converter::Any(vec!["about".to_string(), "help".to_string()])
        );
        assert_eq!(
            Converter::parse(Some("regex"), Some(r#""[a-z]{2,3}""#)).unwrap(),
            Converter::Regex("[a-z]{2,3}".to_string())
        );
        assert_eq!(
            Converter::parse(Some("string"), Some("length=2")).unwrap(),
            Converter::String {
                minlength: 2,
                maxlength: Some(2)
            }
        );
        assert!(Converter::parse(Some("bogus"), None).is_err());
    }

    #[test]
    fn test_validator() {
        let int = Converter::Int.validator().unwrap();
        assert!(int.is_match("42"));
        assert!(!int.is_match("4a"));

        let any = Converter::Any(vec!["a.b".to_string()]).validator().unwrap();
        assert!(any.is_match("a.b"));
        assert!(!any.is_match("axb"));
    }

    #[test]
    fn test_url_quote() {
        assert_eq!(url_quote("hello world/x:y"), "hello%20world/x:y");
        assert_eq!(url_quote("ação"), "a%C3%A7%C3%A3o");
    }
}
