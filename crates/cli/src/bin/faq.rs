use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    faq_cli::main_entry().await
}
