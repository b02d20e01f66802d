use std::path::Path;
use std::process::Command;

use reel_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tool("ffmpeg")?;
    ensure_tool("ffprobe")?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    let probe = path.join(format!(".selfcheck-{}", uuid::Uuid::new_v4()));
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_tool(tool: &str) -> anyhow::Result<()> {
    let output = Command::new(tool)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", tool, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("{} -version failed: {:?}", tool, output.status));
    }
    Ok(())
}
