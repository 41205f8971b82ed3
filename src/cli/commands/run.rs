//! Full pipeline run.

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::pipeline;

/// Enrich every configured catalog (optionally only some languages)
pub fn cmd_run(rt: &Runtime, config: &Config, languages: &[String]) -> anyhow::Result<()> {
    rt.block_on(async {
        let cancel = CancellationToken::new();
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling - waiting for in-flight tracks to stop...");
                on_ctrl_c.cancel();
            }
        });

        println!(
            "Enriching catalogs with {} workers...",
            config.pipeline.concurrency
        );
        let summary = pipeline::run_catalogs(config, languages, cancel).await?;

        println!();
        println!("{}", summary);
        Ok::<(), anyhow::Error>(())
    })
}
