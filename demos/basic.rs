//! Minimal portico app: an API controller, a page controller, global
//! request logging and CORS.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/
//!   curl http://localhost:3000/
//!   curl -X OPTIONS -i http://localhost:3000/api/
//!   curl -X POST http://localhost:3000/api/echo -d '{"message":"hi"}'

use std::path::Path;

use portico::middleware::{MiddlewareRegistry, Next, from_fn};
use portico::{
    Action, BoxError, Config, Controller, Descriptor, Error, Request, Response, Router, Server,
    TemplateRenderer,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tera::{Context, Tera};

#[derive(Serialize)]
struct ApiResponse<'a> {
    result: bool,
    message: &'a str,
}

#[derive(Deserialize)]
struct EchoInput {
    message: String,
}

// GET /api/, POST /api/echo
struct IndexController;

impl IndexController {
    fn home(&self, _req: &mut Request, res: &mut Response) -> Result<(), Error> {
        res.json(&ApiResponse { result: true, message: "Welcome to portico" })
    }

    fn echo(&self, req: &mut Request, res: &mut Response) -> Result<(), Error> {
        let input: EchoInput = req.json()?;
        res.json(&ApiResponse { result: true, message: &input.message })
    }
}

impl Controller for IndexController {
    fn describe(&self) -> Descriptor<Self> {
        Descriptor::new()
            .middleware(["timing"])
            .action(Action::new("home", Self::home).get("/"))
            .action(Action::new("echo", Self::echo).doc(r#"@Route("POST", "/echo")"#))
    }
}

// GET /
struct MainController;

impl MainController {
    fn index(&self, _req: &mut Request, res: &mut Response) -> Result<(), Error> {
        res.send_template("home.html", &json!({ "title": "portico" }))
    }
}

impl Controller for MainController {
    fn describe(&self) -> Descriptor<Self> {
        Descriptor::new().action(Action::new("index", Self::index).get("/"))
    }
}

/// Tera templates loaded from `TEMPLATE_DIR`, or a single built-in page when
/// no directory is configured.
struct TeraTemplates {
    tera: Tera,
}

impl TeraTemplates {
    fn load(dir: Option<&Path>) -> Result<Self, BoxError> {
        let tera = match dir {
            Some(dir) => Tera::new(&format!("{}/**/*", dir.display()))?,
            None => {
                let mut tera = Tera::default();
                tera.add_raw_template("home.html", "<h1>{{ title }}</h1>")?;
                tera
            }
        };
        Ok(Self { tera })
    }
}

impl TemplateRenderer for TeraTemplates {
    fn render(&self, name: &str, params: &serde_json::Value) -> Result<String, BoxError> {
        let context = Context::from_serialize(params)?;
        Ok(self.tera.render(name, &context)?)
    }
}

fn timing(req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), Error> {
    let start = std::time::Instant::now();
    let outcome = next.run(req, res);
    res.set_header("x-elapsed-us", &start.elapsed().as_micros().to_string());
    outcome
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::load()?;
    let templates = TeraTemplates::load(config.template_dir.as_deref()).map_err(Error::handler)?;

    let registry = MiddlewareRegistry::with_builtins().register_with("timing", || from_fn(timing));

    let app = Router::with_registry(registry)
        .global("log")?
        .global("cors")?
        .register(IndexController, "api")?
        .register_root(MainController)?
        .renderer(templates)
        .build();

    Server::from_config(&config).serve(app).await
}
