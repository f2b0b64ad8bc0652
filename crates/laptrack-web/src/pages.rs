//! HTML page rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/`) on
//! first use, so the venue can restyle the admin pages without
//! recompiling.

use std::path::Path;

use minijinja::{Environment, path_loader};
use serde::Serialize;

use crate::error::WebError;

/// Team list page.
pub const TEAMS_TEMPLATE: &str = "teams.html";

/// Single team page.
pub const TEAM_TEMPLATE: &str = "team.html";

/// Template environment for the admin pages.
#[derive(Debug)]
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    /// Serve templates out of `templates_dir`.
    pub fn new(templates_dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(templates_dir.as_ref()));
        Self { env }
    }

    /// Render the named template with `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Template`] if the template is missing or fails
    /// to render.
    pub fn render(&self, name: &str, ctx: impl Serialize) -> Result<String, WebError> {
        self.env
            .get_template(name)
            .map_err(|e| WebError::Template(format!("missing template {name}: {e}")))?
            .render(ctx)
            .map_err(|e| WebError::Template(format!("{name} render failed: {e}")))
    }
}
