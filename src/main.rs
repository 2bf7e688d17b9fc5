#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = redink::run_worker().await {
        eprintln!("redink-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
