//! Minimal upstream for trying the proxy locally.
//!
//! Serves `/health` and answers every other path with its own name.

use std::net::SocketAddr;

use axum::{extract::State, http::Uri, routing::get, Router};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mock-backend")]
struct Args {
    #[arg(short, long, default_value_t = 8081)]
    port: u16,

    /// Name echoed in every response.
    #[arg(short, long, default_value = "backend")]
    name: String,
}

async fn echo(State(name): State<String>, uri: Uri) -> String {
    format!("{} handled {}\n", name, uri)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .fallback(echo)
        .with_state(args.name.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    println!("{} is listening on http://{}", args.name, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
