use trinonce_miner::daemon::Daemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trinonce_miner::tracing::init_journald_or_stdout();
    Daemon::new().run().await
}
