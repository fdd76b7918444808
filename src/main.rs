#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examdesk::run().await {
        eprintln!("examdesk fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
