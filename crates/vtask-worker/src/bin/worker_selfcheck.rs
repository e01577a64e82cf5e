use std::path::Path;

use vtask_media::{check_ffmpeg, check_whisper, check_ytdlp, MediaConfig};
use vtask_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();
    let media = MediaConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;

    check_ffmpeg(&media.ffmpeg_bin).map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    check_ytdlp(&media.ytdlp_bin).map_err(|e| anyhow::anyhow!("yt-dlp not available: {}", e))?;
    check_whisper(&media.whisper_bin).map_err(|e| anyhow::anyhow!("whisper not available: {}", e))?;
    if !media.whisper_model.exists() {
        return Err(anyhow::anyhow!(
            "whisper model not found at {}",
            media.whisper_model.display()
        ));
    }

    ensure_env_present(&[
        "REDIS_URL",
        "R2_ENDPOINT_URL",
        "R2_ACCESS_KEY_ID",
        "R2_SECRET_ACCESS_KEY",
        "R2_BUCKET_NAME",
    ])?;
    if config.translation_model_id.is_none() {
        println!("worker-selfcheck: warning: TRANSLATION_MODEL_ID not set, translation disabled");
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
