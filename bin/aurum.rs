use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

use aurum::{JsonlSink, MetricsSink, Registry, RpcReader, Settings, Treasury};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    let settings =
        Settings::new().context("Failed to load config.yaml. Please ensure it exists and is valid")?;

    let registry = Arc::new(
        Registry::load(&settings.chain.registry)
            .with_context(|| format!("Failed to load registry {}", settings.chain.registry))?,
    );
    info!(
        "registry loaded for chain {}: {} tokens, {} treasury wallets",
        registry.chain,
        registry.tokens().count(),
        registry.treasury_wallets.len()
    );

    let reader = Arc::new(
        RpcReader::new(&settings.chain.rpc_url).context("Failed to construct RPC reader")?,
    );
    let treasury = Treasury::new(registry, reader);
    let mut sink = JsonlSink::create(Path::new(&settings.run.output))?;

    let cancellation_token = CancellationToken::new();
    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal (Ctrl+C), finishing current block...");
            signal_token.cancel();
        }
    });

    let step = settings.run.block_step.max(1);
    let mut block = settings.run.start_block;

    // Strictly sequential: a block's snapshot must fully commit before the
    // next block starts consuming accumulated history.
    while block <= settings.run.end_block {
        if cancellation_token.is_cancelled() {
            info!("stopping before block {block}");
            break;
        }

        let snapshot = treasury
            .process_block(block)
            .await
            .with_context(|| format!("valuation failed at block {block}"))?;
        sink.emit(&snapshot)
            .with_context(|| format!("failed to emit block {block}"))?;

        block += step;
    }

    info!("done");
    Ok(())
}
