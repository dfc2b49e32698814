//! A small pathmux application.
//!
//! ```text
//! cargo run --example hello
//! curl -i localhost:8080/blog            # 301 to /blog/
//! curl localhost:8080/users/alice/
//! curl localhost:8080/archive/2013/hello-world/
//! curl 'localhost:8080/api/status/?callback=show'
//! ```
//!
//! Set `PATHMUX_UNIX_SOCKET=/tmp/pathmux.sock` to serve on a Unix socket
//! instead of TCP.

use pathmux::context::Context;
use pathmux::http::{Method, StatusCode};
use pathmux::server::{self, Server};
use pathmux::{Dispatcher, rest};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Status {
    version: &'static str,
    healthy: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut dispatcher = Dispatcher::new();
    dispatcher.error_hook(|ctx: &mut Context, code: u16| {
        if code != 404 {
            return false;
        }
        ctx.response_mut().write_header(StatusCode::NOT_FOUND);
        ctx.write(format!("nothing at {}\n", ctx.request().path()));
        true
    });

    dispatcher
        .static_router("/blog/")
        .get(|ctx: &mut Context| ctx.write("all posts\n"))
        .post(|ctx: &mut Context| {
            ctx.response_mut().write_header(StatusCode::CREATED);
            ctx.write("created\n");
        });

    dispatcher.pattern_route(
        r"^/users/(?P<name>[a-z]+)/$",
        |ctx: &mut Context| {
            let greeting = format!("hello, {}\n", ctx.param("name").unwrap_or_default());
            ctx.write(greeting);
        },
        &[Method::Get, Method::Head],
    )?;

    dispatcher
        .positional_router(r"^/archive/(\d{4})/([a-z0-9-]+)/$")?
        .get(|ctx: &mut Context, year: &str, slug: &str| {
            ctx.write(format!("{slug}, published {year}\n"));
        })?;

    dispatcher.static_route(
        "/api/status/",
        rest::wrap(|_: &mut Context| {
            let status = Status {
                version: pathmux::VERSION,
                healthy: true,
            };
            (StatusCode::OK, Some(status))
        }),
        &[Method::Get],
    );

    dispatcher.static_route(
        "/panic/",
        |_: &mut Context| panic!("this handler always fails"),
        &[Method::Get],
    );

    let server = match std::env::var("PATHMUX_UNIX_SOCKET") {
        #[cfg(unix)]
        Ok(path) => Server::new(server::unix_listener(path, 0o660).await?),
        _ => Server::new(server::http_listener("127.0.0.1", 8080).await?),
    };
    server.serve(dispatcher).await?;
    Ok(())
}
