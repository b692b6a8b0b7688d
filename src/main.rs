#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = markwise_rust::run().await {
        eprintln!("markwise-api fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
