// Helper functions exposed to metadata templates.
//
// Each helper has a plain Rust core that works on any lookup, plus a thin
// adapter taking `minijinja` values so it can be registered as a template
// function and filter.

use crate::date::{normalize_datestring, DateFormat, DateValue};
use crate::error::GeoMcfError;
use minijinja::value::{Rest, Value, ValueKind};
use minijinja::{Error, ErrorKind};
use serde_yaml::Mapping;

/// Language used when a section name carries no language suffix
pub const DEFAULT_LANGUAGE: &str = "en";

/// Primary and alternate-language values for one option.
#[derive(Debug, Clone, PartialEq)]
pub struct Localized<V> {
    pub primary: Option<V>,
    pub alternate: Option<V>,
}

/// Pick `<option>_<language>` if present, else the bare `<option>`. When an
/// alternate language is supplied, also pick `<option>_<alternate>`.
pub fn select_localized<V, F>(
    option: &str,
    language: &str,
    language_alternate: Option<&str>,
    lookup: F,
) -> Localized<V>
where
    F: Fn(&str) -> Option<V>,
{
    let primary = lookup(&format!("{option}_{language}")).or_else(|| lookup(option));
    let alternate = language_alternate.and_then(|alt| lookup(&format!("{option}_{alt}")));

    Localized { primary, alternate }
}

/// [`select_localized`] over a YAML section.
pub fn get_charstring<'a>(
    option: &str,
    section: &'a Mapping,
    language: &str,
    language_alternate: Option<&str>,
) -> Localized<&'a serde_yaml::Value> {
    select_localized(option, language, language_alternate, |key| section.get(key))
}

/// Language of a distribution section: the second `_`-separated segment of
/// its name (`distribution_fr` → `fr`), or `en`.
pub fn get_distribution_language(section: &str) -> String {
    section
        .split('_')
        .nth(1)
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

// Template adapters

/// `get_charstring(option, section, language, language_alternate=none)`
/// returns `[primary, alternate]`.
pub(crate) fn get_charstring_fn(
    option: &str,
    section: Value,
    language: &str,
    language_alternate: Option<&str>,
) -> Result<Value, Error> {
    if section.kind() != ValueKind::Map {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("get_charstring expects a mapping section, got {}", section.kind()),
        ));
    }

    let localized = select_localized(option, language, language_alternate, |key| {
        section
            .get_item(&Value::from(key))
            .ok()
            .filter(|value| !value.is_undefined())
    });

    Ok(Value::from(vec![
        localized.primary.unwrap_or_else(|| Value::from(())),
        localized.alternate.unwrap_or_else(|| Value::from(())),
    ]))
}

pub(crate) fn get_distribution_language_fn(section: &str) -> String {
    get_distribution_language(section)
}

/// `normalize_datestring(value, format="default")`
pub(crate) fn normalize_datestring_fn(value: Value, format: Option<&str>) -> Result<Value, Error> {
    let format = match format {
        Some(format) => format.parse::<DateFormat>().map_err(template_error)?,
        None => DateFormat::Default,
    };

    let input = match value.kind() {
        ValueKind::String => DateValue::parse_yaml(value.as_str().unwrap_or_default()),
        ValueKind::Number | ValueKind::Bool => DateValue::Text(value.to_string()),
        _ => {
            return Err(template_error(GeoMcfError::InvalidDate {
                value: value.to_string(),
            }))
        }
    };

    normalize_datestring(input, format)
        .map(Value::from)
        .map_err(template_error)
}

/// `zip(a, b, ...)`: rows of items taken pairwise, shortest input wins.
pub(crate) fn zip_fn(args: Rest<Value>) -> Result<Value, Error> {
    let mut columns = Vec::with_capacity(args.len());
    for arg in args.iter() {
        columns.push(arg.try_iter()?.collect::<Vec<_>>());
    }

    let len = columns.iter().map(Vec::len).min().unwrap_or(0);
    let rows: Vec<Value> = (0..len)
        .map(|i| Value::from(columns.iter().map(|c| c[i].clone()).collect::<Vec<_>>()))
        .collect();

    Ok(Value::from(rows))
}

/// Escape `& < > " '` for XML text and attribute content.
pub(crate) fn xml_escape_fn(value: Value) -> String {
    if value.is_none() || value.is_undefined() {
        return String::new();
    }
    quick_xml::escape::escape(value.to_string().as_str()).into_owned()
}

fn template_error(err: GeoMcfError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}
