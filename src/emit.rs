// SPDX-FileCopyrightText: 2026 buildver contributors
//
// SPDX-License-Identifier: MIT

use std::io;

use serde;
use serde_json;

use crate::version::VersionDescriptor;

/// Output format for emitted build variables.
#[derive(serde::Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmitFormat {
    /// One NAME=value line per variable.
    #[default]
    Env,
    /// A single JSON object.
    Json,
}

/// Build-time variables projected from a decoded version descriptor.
#[derive(Debug, PartialEq)]
pub struct BuildVars {
    major: u64,
    minor: u64,
    patch: u64,
    commit: String,
    clean: bool,
}

impl BuildVars {
    pub fn from_descriptor(desc: &VersionDescriptor) -> Self {
        BuildVars {
            major: desc.major,
            minor: desc.minor,
            patch: desc.patch,
            commit: desc.commit.clone().unwrap_or_default(),
            clean: !desc.dirty,
        }
    }

    fn named(&self, prefix: &str) -> Vec<(String, serde_json::Value)> {
        vec![
            (
                format!("{}VERSION_MAJOR", prefix),
                serde_json::json!(self.major),
            ),
            (
                format!("{}VERSION_MINOR", prefix),
                serde_json::json!(self.minor),
            ),
            (
                format!("{}VERSION_PATCH", prefix),
                serde_json::json!(self.patch),
            ),
            (
                format!("{}VERSION_COMMIT", prefix),
                serde_json::json!(self.commit),
            ),
            (
                format!("{}VERSION_CLEAN", prefix),
                serde_json::json!(self.clean),
            ),
        ]
    }

    /// Renders the variables in the requested format. Booleans come out as
    /// lowercase true/false in both formats.
    pub fn render(&self, prefix: &str, format: EmitFormat) -> String {
        match format {
            EmitFormat::Env => self
                .named(prefix)
                .iter()
                .map(|(name, value)| match value {
                    serde_json::Value::String(s) => format!("{}={}\n", name, s),
                    other => format!("{}={}\n", name, other),
                })
                .collect(),
            EmitFormat::Json => {
                let vars: serde_json::Map<String, serde_json::Value> =
                    self.named(prefix).into_iter().collect();
                let mut rendered = serde_json::to_string_pretty(&serde_json::Value::Object(vars))
                    .expect("variable map should serialize");
                rendered.push('\n');
                rendered
            }
        }
    }
}

/// Writes build variables for the given descriptor. An absent descriptor
/// means the build proceeds with no version metadata, nothing is written.
pub fn emit<W: io::Write>(
    out: &mut W,
    desc: Option<&VersionDescriptor>,
    prefix: &str,
    format: EmitFormat,
) -> io::Result<()> {
    let desc = match desc {
        Some(desc) => desc,
        None => {
            log::debug!("no version descriptor, nothing to emit");
            return Ok(());
        }
    };

    write!(out, "{}", BuildVars::from_descriptor(desc).render(prefix, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> VersionDescriptor {
        VersionDescriptor {
            major: 1,
            minor: 4,
            patch: 2,
            commit: Some("abcdef012345".to_string()),
            dirty: true,
        }
    }

    #[test]
    fn test_render_env() {
        let vars = BuildVars::from_descriptor(&descriptor());
        assert_eq!(
            vars.render("", EmitFormat::Env),
            "VERSION_MAJOR=1\n\
             VERSION_MINOR=4\n\
             VERSION_PATCH=2\n\
             VERSION_COMMIT=abcdef012345\n\
             VERSION_CLEAN=false\n"
        );
    }

    #[test]
    fn test_render_env_with_prefix() {
        let vars = BuildVars::from_descriptor(&descriptor());
        let rendered = vars.render("OPENEAW_", EmitFormat::Env);
        assert!(rendered.starts_with("OPENEAW_VERSION_MAJOR=1\n"));
        assert!(rendered.contains("OPENEAW_VERSION_CLEAN=false\n"));
    }

    #[test]
    fn test_render_env_clean() {
        let desc = VersionDescriptor {
            dirty: false,
            ..descriptor()
        };
        let vars = BuildVars::from_descriptor(&desc);
        assert!(vars
            .render("", EmitFormat::Env)
            .contains("VERSION_CLEAN=true\n"));
    }

    #[test]
    fn test_render_json() {
        let vars = BuildVars::from_descriptor(&descriptor());
        let rendered = vars.render("", EmitFormat::Json);
        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).expect("unexpected JSON parse error");
        assert_eq!(
            parsed,
            serde_json::json!({
                "VERSION_MAJOR": 1,
                "VERSION_MINOR": 4,
                "VERSION_PATCH": 2,
                "VERSION_COMMIT": "abcdef012345",
                "VERSION_CLEAN": false,
            })
        );
    }

    #[test]
    fn test_emit_without_descriptor_writes_nothing() {
        let mut out = Vec::new();
        emit(&mut out, None, "", EmitFormat::Env).expect("unexpected emit error");
        assert!(out.is_empty());
    }

    #[test]
    fn test_emit_descriptor_without_metadata() {
        // commit renders as an empty string when the descriptor has none
        let desc = VersionDescriptor {
            major: 1,
            minor: 0,
            patch: 0,
            commit: None,
            dirty: false,
        };
        let mut out = Vec::new();
        emit(&mut out, Some(&desc), "", EmitFormat::Env).expect("unexpected emit error");
        let rendered = String::from_utf8(out).expect("expected UTF-8 output");
        assert!(rendered.contains("VERSION_COMMIT=\n"));
        assert!(rendered.contains("VERSION_CLEAN=true\n"));
    }
}
