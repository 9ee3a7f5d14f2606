use clap::Parser;
use control::{Error, ResultCode};
use ipcpd::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(err) = ipcpd::run(cli).await {
        log::error!("{err}");
        std::process::exit(exit_code(&err));
    }
    Ok(())
}

/// Maps a failure to a process exit code (§6.4: "`0` on normal shutdown;
/// non-zero per failure class"). A `control::Error` reuses its already-
/// assigned numeric code; anything else (I/O, config parsing) exits `70`,
/// the sysexits convention for "internal software error".
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(err) => ResultCode::from(err).code.clamp(1, 255),
        None => 70,
    }
}
