#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lacquer_client::run().await
}
