#[tokio::main]
async fn main() {
    if let Err(err) = ja_api::run().await {
        tracing::error!(error = %err, "ja-api failed");
        eprintln!("ja-api failed: {err}");
        std::process::exit(1);
    }
}
