//! View rendering.
//!
//! ferrule does not own a template language. [`Renderer`] is the seam; the
//! bundled [`Templates`] implementation uses minijinja and loads views from
//! `<resources_dir>/<template_prefix>/<view>.<extension>`.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};

use minijinja::{Environment, ErrorKind};
use tracing::warn;

use crate::config::TemplateConfig;
use crate::error::Error;
use crate::response::ViewBag;

/// Turns a view name and a bag of values into a page.
pub trait Renderer: Send + Sync {
    fn render(&self, view: &str, bag: &ViewBag) -> Result<String, Error>;
}

/// File-backed minijinja templates.
///
/// Views may `{% extends %}` and `{% include %}` each other by view name.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new(config: &TemplateConfig) -> Self {
        let root = config.template_dir();
        let extension = config.extension.clone();
        let mut env = Environment::new();
        env.set_loader(move |view| {
            let Some(path) = view_path(&root, view, &extension) else {
                warn!(view, "attempted path traversal outside the template directory");
                return Ok(None);
            };
            match std::fs::read_to_string(&path) {
                Ok(source) => Ok(Some(source)),
                Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
                Err(e) => Err(minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template {}", path.display()),
                )
                .with_source(e)),
            }
        });
        Self { env }
    }
}

impl Renderer for Templates {
    fn render(&self, view: &str, bag: &ViewBag) -> Result<String, Error> {
        let template = self.env.get_template(view).map_err(|e| Error::Render(e.to_string()))?;
        template.render(bag.to_map()).map_err(|e| Error::Render(e.to_string()))
    }
}

/// Maps a view name to a file below `root`, or `None` if it would escape it.
fn view_path(root: &Path, view: &str, extension: &str) -> Option<PathBuf> {
    let relative = Path::new(view);
    if view.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(format!("{view}.{extension}")))
}
