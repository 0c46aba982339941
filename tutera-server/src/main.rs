use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let ax = tutera_server::build()?;

    let host = ax.app.get("http.host").unwrap_or_else(|| "127.0.0.1".to_string());
    let port = ax.app.get("http.port").unwrap_or_else(|| "3030".to_string());
    let addr = format!("{host}:{port}");

    tracing::info!(
        backend = %ax.app.get("backend.url").unwrap_or_default(),
        root_domain = %ax.app.get("edge.rootDomain").unwrap_or_default(),
        "starting tutera server on http://{addr}"
    );

    ax.listen(addr).await?;

    Ok(())
}
