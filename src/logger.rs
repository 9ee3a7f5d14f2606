use crate::config::Log;

/// Install the global logger at the level named in the configuration. A log
/// path is accepted but `simple_logger` only ever writes to stderr; a file
/// path is validated (parent directory must exist) so a bad config fails
/// fast at startup rather than silently dropping log output later.
pub fn init(log: &Log) -> anyhow::Result<()> {
    if let Some(path) = &log.path {
        let path = std::path::Path::new(path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                anyhow::bail!("log path parent directory does not exist: {}", parent.display());
            }
        }
    }

    simple_logger::init_with_level(log.level.as_level())?;
    Ok(())
}
