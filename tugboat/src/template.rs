use std::collections::HashMap;

use tera::{Context, Tera, Value};

use crate::{git::GitInfo, Result};

/// The values tags, source images and manifest names can refer to.
#[derive(Debug, Clone, Default)]
pub struct TemplateFields {
    pub image_name: String,
    pub version: String,
    pub git: GitInfo,
}

/// Formats the current UTC time, e.g. `{{ time(format="[year][month][day]") }}`.
fn format_time(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let format = match args.get("format") {
        Some(Value::String(format)) => format.as_str(),
        Some(_) => return Err("`time` expects `format` to be a string".into()),
        None => "[year]-[month]-[day]T[hour]:[minute]:[second]Z",
    };
    let description = time::format_description::parse(format)
        .map_err(|error| tera::Error::msg(format!("invalid time format {format:?}: {error}")))?;
    let now = time::OffsetDateTime::now_utc()
        .format(&description)
        .map_err(|error| tera::Error::msg(format!("failed to format the time: {error}")))?;
    Ok(Value::String(now))
}

pub struct Templater {
    tera: Tera,
    context: Context,
}

impl Templater {
    pub fn new(fields: &TemplateFields) -> Self {
        let mut tera = Tera::default();
        tera.register_function("time", format_time);

        let mut context = Context::new();
        context.insert("ImageName", &fields.image_name);
        context.insert("Version", &fields.version);
        context.insert("Tag", &fields.git.tag);
        context.insert("Branch", &fields.git.branch);
        context.insert("Commit", &fields.git.short_commit);
        context.insert("ShortCommit", &fields.git.short_commit);
        context.insert("FullCommit", &fields.git.full_commit);

        Self { tera, context }
    }

    /// Renders `input`. Strings without template tags are returned as they are.
    pub fn apply(&mut self, input: &str) -> Result<String> {
        if !input.contains("{{") && !input.contains("{%") {
            return Ok(input.to_owned());
        }

        self.tera.render_str(input, &self.context).map_err(|error| {
            // The interesting part of a tera error is usually its innermost source.
            let mut message = format!("failed to render {input:?}");
            let mut source = std::error::Error::source(&error);
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }
            message.into()
        })
    }

    pub fn apply_all(&mut self, inputs: &[String]) -> Result<Vec<String>> {
        inputs.iter().map(|input| self.apply(input)).collect()
    }
}
