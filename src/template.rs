//! User-id template engine.
//!
//! Templates are literal text mixed with `{{ source | filter ... }}`
//! placeholders. Sources: `role_name`, `display_name`, `unix_time` (seconds
//! since the epoch) and `random <n>` (`n` lowercase alphanumerics). Filters:
//! `truncate <n>`, `lowercase` and `uppercase`.
//!
//! `compile` is a pure function; role writes use it to validate templates up
//! front, issuance compiles again and renders. `unix_time` and `random` make
//! rendered ids unique per issuance, so a compiled template is never cached.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Upper bound for the `random <n>` source argument.
pub const MAX_RANDOM_LENGTH: usize = 256;

const RANDOM_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("placeholder opened at byte {0} is never closed")]
    UnclosedPlaceholder(usize),

    #[error("empty placeholder")]
    EmptyPlaceholder,

    #[error(r#"unknown source "{0}""#)]
    UnknownSource(String),

    #[error(r#"unknown filter "{0}""#)]
    UnknownFilter(String),

    #[error(r#""{keyword}" takes a single numeric argument, got "{argument}""#)]
    InvalidArgument { keyword: String, argument: String },

    #[error("system clock is before the unix epoch")]
    ClockBeforeEpoch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    RoleName,
    DisplayName,
    UnixTime,
    Random(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Truncate(usize),
    Lowercase,
    Uppercase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { source: Source, filters: Vec<Filter> },
}

/// A compiled user-id template, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdTemplate {
    segments: Vec<Segment>,
}

/// Metadata a template can reference when generating a user id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIdContext {
    pub display_name: String,
    pub role_name: String,
}

/// Compile a template string.
///
/// # Errors
/// Returns an error if a placeholder is unclosed or empty, names an unknown
/// source or filter, or carries a malformed argument.
pub fn compile(template: &str) -> Result<UserIdTemplate, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }

        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or(TemplateError::UnclosedPlaceholder(offset + open))?;

        segments.push(parse_placeholder(&after_open[..close])?);

        offset += open + 2 + close + 2;
        rest = &after_open[close + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }

    Ok(UserIdTemplate { segments })
}

fn parse_placeholder(body: &str) -> Result<Segment, TemplateError> {
    let mut parts = body.split('|');

    let source = parts.next().map(str::trim).unwrap_or_default();
    if source.is_empty() {
        return Err(TemplateError::EmptyPlaceholder);
    }

    let source = parse_source(source)?;

    let mut filters = Vec::new();
    for part in parts {
        filters.push(parse_filter(part.trim())?);
    }

    Ok(Segment::Placeholder { source, filters })
}

fn parse_source(spec: &str) -> Result<Source, TemplateError> {
    let mut words = spec.split_whitespace();
    let keyword = words.next().unwrap_or_default();
    let argument = words.next();

    match (keyword, argument) {
        ("role_name", None) => Ok(Source::RoleName),
        ("display_name", None) => Ok(Source::DisplayName),
        ("unix_time", None) => Ok(Source::UnixTime),
        ("random", argument) => {
            let length = parse_length("random", argument)?;
            if length == 0 || length > MAX_RANDOM_LENGTH {
                return Err(TemplateError::InvalidArgument {
                    keyword: "random".to_string(),
                    argument: argument.unwrap_or_default().to_string(),
                });
            }
            Ok(Source::Random(length))
        }
        _ => Err(TemplateError::UnknownSource(spec.to_string())),
    }
}

fn parse_filter(spec: &str) -> Result<Filter, TemplateError> {
    let mut words = spec.split_whitespace();
    let keyword = words.next().unwrap_or_default();
    let argument = words.next();

    match (keyword, argument) {
        ("lowercase", None) => Ok(Filter::Lowercase),
        ("uppercase", None) => Ok(Filter::Uppercase),
        ("truncate", argument) => Ok(Filter::Truncate(parse_length("truncate", argument)?)),
        _ => Err(TemplateError::UnknownFilter(spec.to_string())),
    }
}

fn parse_length(keyword: &str, argument: Option<&str>) -> Result<usize, TemplateError> {
    let raw = argument.ok_or_else(|| TemplateError::InvalidArgument {
        keyword: keyword.to_string(),
        argument: String::new(),
    })?;

    raw.parse().map_err(|_| TemplateError::InvalidArgument {
        keyword: keyword.to_string(),
        argument: raw.to_string(),
    })
}

impl UserIdTemplate {
    /// Render the template against the given metadata.
    ///
    /// # Errors
    /// Returns an error if the system clock reports a time before the unix
    /// epoch while rendering `unix_time`.
    pub fn render(&self, context: &UserIdContext) -> Result<String, TemplateError> {
        let mut output = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder { source, filters } => {
                    let mut value = render_source(source, context)?;
                    for filter in filters {
                        value = apply_filter(filter, value);
                    }
                    output.push_str(&value);
                }
            }
        }

        Ok(output)
    }
}

fn render_source(source: &Source, context: &UserIdContext) -> Result<String, TemplateError> {
    match source {
        Source::RoleName => Ok(context.role_name.clone()),
        Source::DisplayName => Ok(context.display_name.clone()),
        Source::UnixTime => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|_| TemplateError::ClockBeforeEpoch)?;
            Ok(now.as_secs().to_string())
        }
        Source::Random(length) => {
            let mut rng = rand::thread_rng();
            Ok((0..*length)
                .map(|_| RANDOM_ALPHABET[rng.gen_range(0..RANDOM_ALPHABET.len())] as char)
                .collect())
        }
    }
}

fn apply_filter(filter: &Filter, value: String) -> String {
    match filter {
        Filter::Truncate(length) => value.chars().take(*length).collect(),
        Filter::Lowercase => value.to_lowercase(),
        Filter::Uppercase => value.to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};

    fn context(role: &str, display: &str) -> UserIdContext {
        UserIdContext {
            role_name: role.to_string(),
            display_name: display.to_string(),
        }
    }

    #[test]
    fn renders_literals_and_metadata() -> Result<()> {
        let template = compile("v-{{role_name}}-{{display_name}}")?;
        let id = template.render(&context("ci", "deploy"))?;
        assert_eq!(id, "v-ci-deploy");
        Ok(())
    }

    #[test]
    fn filters_apply_in_order() -> Result<()> {
        let template = compile("{{role_name | truncate 3 | uppercase}}")?;
        let id = template.render(&context("release", ""))?;
        assert_eq!(id, "REL");
        Ok(())
    }

    #[test]
    fn lowercase_filter_folds_case() -> Result<()> {
        let template = compile("{{display_name | lowercase}}")?;
        let id = template.render(&context("", "Web-Token"))?;
        assert_eq!(id, "web-token");
        Ok(())
    }

    #[test]
    fn random_emits_requested_length() -> Result<()> {
        let template = compile("{{random 24}}")?;
        let id = template.render(&UserIdContext::default())?;
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        Ok(())
    }

    #[test]
    fn unix_time_is_numeric() -> Result<()> {
        let template = compile("{{unix_time}}")?;
        let id = template.render(&UserIdContext::default())?;
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit()));
        Ok(())
    }

    #[test]
    fn unclosed_placeholder_is_rejected() {
        let err = compile("v-{{role_name").expect_err("template must not compile");
        assert_eq!(err, TemplateError::UnclosedPlaceholder(2));
    }

    #[test]
    fn unknown_source_is_rejected() -> Result<()> {
        match compile("{{team_name}}") {
            Err(TemplateError::UnknownSource(source)) => {
                assert_eq!(source, "team_name");
                Ok(())
            }
            other => bail!("expected unknown source error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_filter_is_rejected() -> Result<()> {
        match compile("{{role_name | reverse}}") {
            Err(TemplateError::UnknownFilter(filter)) => {
                assert_eq!(filter, "reverse");
                Ok(())
            }
            other => bail!("expected unknown filter error, got {other:?}"),
        }
    }

    #[test]
    fn random_requires_a_sane_length() {
        assert!(compile("{{random}}").is_err());
        assert!(compile("{{random 0}}").is_err());
        assert!(compile("{{random 9999}}").is_err());
        assert!(compile("{{random abc}}").is_err());
    }

    #[test]
    fn empty_placeholder_is_rejected() {
        assert_eq!(compile("{{ }}"), Err(TemplateError::EmptyPlaceholder));
    }
}
