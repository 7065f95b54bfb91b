//! Brace-delimited path templates, e.g.
//! `{year}/{network}/{station}/{channels}.D/{network}.{station}.{location}.{channels}.D.{year}.{jday:03d}`.
//!
//! A field is `{name}` or `{name:spec}`; `{{` and `}}` produce literal braces. Integer fields
//! accept an optional zero flag and width (`03d`, `03`, `4`). Datetime fields accept a
//! strftime spec (`%Y/%j`, `%Y%m%d`, ...) and render as `YYYY-MM-DD HH:MM:SS` without one.
use time::format_description::parse_strftime_borrowed;
use time::macros::format_description;
use time::OffsetDateTime;

use super::error::TemplateError;

/// A value that can be substituted into a template field
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(i64),
    DateTime(OffsetDateTime),
}

/// Substitute `fields` into `template`
pub fn format_template(
    template: &str,
    fields: &[(&str, FieldValue<'_>)],
) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    output.push('{');
                    continue;
                }
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(f) => field.push(f),
                        None => return Err(TemplateError::UnterminatedField(template.to_string())),
                    }
                }
                let (name, spec) = match field.split_once(':') {
                    Some((name, spec)) => (name, Some(spec)),
                    None => (field.as_str(), None),
                };
                let value = fields
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| {
                        TemplateError::UnknownField(template.to_string(), name.to_string())
                    })?;
                output.push_str(&render_field(name, value, spec)?);
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    output.push('}');
                } else {
                    return Err(TemplateError::UnmatchedBrace(template.to_string()));
                }
            }
            _ => output.push(c),
        }
    }
    Ok(output)
}

fn render_field(name: &str, value: FieldValue<'_>, spec: Option<&str>) -> Result<String, TemplateError> {
    let bad_spec = || TemplateError::BadSpec {
        field: name.to_string(),
        spec: spec.unwrap_or_default().to_string(),
    };
    match (value, spec) {
        (FieldValue::Text(text), None) => Ok(text.to_string()),
        (FieldValue::Text(text), Some("s")) => Ok(text.to_string()),
        (FieldValue::Integer(int), None) => Ok(int.to_string()),
        (FieldValue::Integer(int), Some(spec)) => {
            let digits = spec.strip_suffix('d').unwrap_or(spec);
            if digits.is_empty() {
                return Ok(int.to_string());
            }
            let width: usize = digits.parse().map_err(|_| bad_spec())?;
            if digits.starts_with('0') {
                Ok(format!("{int:0width$}"))
            } else {
                Ok(format!("{int:width$}"))
            }
        }
        (FieldValue::DateTime(datetime), None) => datetime
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .map_err(|_| bad_spec()),
        (FieldValue::DateTime(datetime), Some(spec)) => {
            let items = parse_strftime_borrowed(spec).map_err(|_| bad_spec())?;
            datetime.format(&items).map_err(|_| bad_spec())
        }
        _ => Err(bad_spec()),
    }
}
