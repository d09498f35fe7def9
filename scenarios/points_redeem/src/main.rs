use http_load_tunnel_runner::prelude::*;

fn main() -> LoadTunnelResult<()> {
    let summary = run(points_redeem::scenario(init()))?;

    if !summary.passed() {
        let failed = summary
            .failed_thresholds()
            .map(|t| format!("{}: {}", t.metric, t.expression))
            .collect::<Vec<_>>();
        anyhow::bail!("Thresholds failed: {}", failed.join(", "));
    }

    Ok(())
}
