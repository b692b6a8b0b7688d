#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = markwise_rust::run_worker().await {
        eprintln!("markwise-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
