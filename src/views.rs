use std::sync::Arc;

use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;

use crate::{error::AppError, locals::Locals};

pub const LAYOUT: &str = "layouts/main.html";
pub const INDEX: &str = "index.html";
pub const ERROR: &str = "error.html";
pub const NOT_FOUND: &str = "404.html";
pub const LOGIN: &str = "auth/login.html";
pub const STUDENT_DASHBOARD: &str = "student/dashboard.html";
pub const FACULTY_DASHBOARD: &str = "faculty/dashboard.html";
pub const SUPERVISOR_DASHBOARD: &str = "supervisor/dashboard.html";

// Compiled into the binary so a deployment is a single file.
const TEMPLATES: [(&str, &str); 8] = [
    (LAYOUT, include_str!("../views/layouts/main.html")),
    (INDEX, include_str!("../views/index.html")),
    (ERROR, include_str!("../views/error.html")),
    (NOT_FOUND, include_str!("../views/404.html")),
    (LOGIN, include_str!("../views/auth/login.html")),
    (STUDENT_DASHBOARD, include_str!("../views/student/dashboard.html")),
    (FACULTY_DASHBOARD, include_str!("../views/faculty/dashboard.html")),
    (SUPERVISOR_DASHBOARD, include_str!("../views/supervisor/dashboard.html")),
];

#[derive(Serialize)]
struct ViewContext<'a, T: Serialize> {
    #[serde(flatten)]
    locals: &'a Locals,
    #[serde(flatten)]
    page: T,
}

/// Views
///
/// The template environment. Every page template extends `layouts/main.html`,
/// which renders the flash messages and the navigation for the current user.
/// `.html` templates are auto-escaped.
#[derive(Clone, Debug)]
pub struct Views {
    env: Arc<Environment<'static>>,
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env: Arc::new(env) })
    }

    /// Renders `name` with the request locals plus page-specific values.
    /// Page values shadow locals of the same name.
    pub fn render<T: Serialize>(
        &self,
        name: &str,
        locals: &Locals,
        page: T,
    ) -> Result<Html<String>, AppError> {
        let template = self.env.get_template(name)?;
        let html = template.render(ViewContext { locals, page })?;
        Ok(Html(html))
    }
}
