//! Writes an 800x600 RGB image, green on the left and red on the right,
//! through the capture encoder into `FRAMEGRAB_OUT_DIR`.

use anyhow::{Context, Result};

use framegrab_demos::{DemoSettings, green_red_halves};

use framegrab_engine::capture::encode_and_save;
use framegrab_engine::logging::{init_logging, LoggingConfig};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let path = DemoSettings::from_env()?.out_dir.join("write_png.png");
    let stride = WIDTH as usize * 3;

    encode_and_save(&green_red_halves(WIDTH, HEIGHT), WIDTH, HEIGHT, 3, stride, &path)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}
