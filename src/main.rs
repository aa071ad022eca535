use std::net::SocketAddr;

use anyhow::{Context, Result};

use todolist::db::Database;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let port: u16 = match std::env::var("PORT") {
        Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
        Err(_) => 5000,
    };
    let db_path = std::env::var("TODOLIST_DB").unwrap_or_else(|_| "todos.db".to_string());

    // Serving with a broken backing store would be worse than not serving.
    let db = Database::open(&db_path)
        .with_context(|| format!("opening todo store at {db_path}"))?;

    let app = todolist::router(db);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, store = %db_path, "todolist listening");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
