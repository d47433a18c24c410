//! Strict text templates for solver input files.
//!
//! Placeholders are resolved against a [`Parameters`] store. A placeholder with no
//! matching parameter fails the render and names the missing variable.

use crate::error::ApiError;
use crate::params::Parameters;
use minijinja::{Environment, ErrorKind, UndefinedBehavior, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Names provided by the template engine itself, never reported as missing
const BUILTIN_NAMES: &[&str] = &["range", "dict", "debug", "namespace", "loop", "self", "super"];

const TEMPLATE_NAME: &str = "input";

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env
}

/// A template read and syntax-checked up front
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    source: String,
}

impl Template {
    /// Read and validate the template at `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| ApiError::io(path, e))?;
        Self::from_source(path, source)
    }

    /// Validate `source`; `path` is only used to label errors and name outputs
    pub fn from_source(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self, ApiError> {
        let template = Self {
            path: path.into(),
            source: source.into(),
        };
        {
            let env = environment();
            env.template_from_named_str(TEMPLATE_NAME, &template.source)
                .map_err(|e| template.error(e))?;
        }
        Ok(template)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the template, used when rendering in place of a fixed name
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| TEMPLATE_NAME.to_string())
    }

    /// Variables the template reads that `params` does not provide
    pub fn missing_variables(&self, params: &Parameters) -> Vec<String> {
        let env = environment();
        let Ok(tmpl) = env.template_from_named_str(TEMPLATE_NAME, &self.source) else {
            return Vec::new();
        };
        tmpl.undeclared_variables(false)
            .into_iter()
            .filter(|name| !params.contains_key(name) && !BUILTIN_NAMES.contains(&name.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Render against `params`
    pub fn render(&self, params: &Parameters) -> Result<String, ApiError> {
        let env = environment();
        let tmpl = env
            .template_from_named_str(TEMPLATE_NAME, &self.source)
            .map_err(|e| self.error(e))?;
        let context = Value::from_serialize(&params.to_plain_json());
        tmpl.render(context).map_err(|e| {
            if e.kind() == ErrorKind::UndefinedError {
                let names = self.missing_variables(params);
                if !names.is_empty() {
                    return ApiError::UndefinedVariable {
                        template: self.path.clone(),
                        names,
                    };
                }
            }
            self.error(e)
        })
    }

    /// Render against `params` and write the text to `dest`
    pub fn render_to(&self, params: &Parameters, dest: &Path) -> Result<(), ApiError> {
        let text = self.render(params)?;
        fs::write(dest, text).map_err(|e| ApiError::io(dest, e))
    }

    fn error(&self, err: minijinja::Error) -> ApiError {
        let detail = err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| err.kind().to_string());
        let message = match err.line() {
            Some(line) => format!("{} (line {})", detail, line),
            None => detail,
        };
        ApiError::TemplateError {
            template: self.path.clone(),
            message,
        }
    }
}
