use std::path::Path;

use anyhow::Context as _;
use rigview::ViewerConfig;

fn config_from_arg(arg: Option<String>) -> anyhow::Result<ViewerConfig> {
    let Some(arg) = arg else {
        return Ok(ViewerConfig::default());
    };
    if let Some(config) = ViewerConfig::preset(&arg) {
        return Ok(config);
    }
    let path = Path::new(&arg);
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("`{arg}` is neither a preset (robot, character) nor a readable config file"))?;
    Ok(ViewerConfig::from_json(&json)?)
}

fn main() -> anyhow::Result<()> {
    let config = config_from_arg(std::env::args().nth(1))?;
    rigview::run(config)
}
