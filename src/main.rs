//! Stempel - CLI Entry Point

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stempel::run().await
}
