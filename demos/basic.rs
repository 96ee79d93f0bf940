use std::thread;
use std::time::Duration;

use progmeter::{BarConfig, ProgressBar, ProgressIterator};

fn main() -> Result<(), progmeter::ConfigError> {
    // Wrapped iterator, total taken from its length.
    for _ in (0..200).progress() {
        thread::sleep(Duration::from_millis(5));
    }

    // Byte counter with binary prefixes and a postfix.
    let pb = ProgressBar::with_config(
        BarConfig::from_env()?
            .desc("download")
            .total(231_231_231.0)
            .unit("B")
            .unit_scale(true)
            .unit_divisor(1024),
    )?;
    let mut downloaded = 0u64;
    while downloaded < 231_231_231 {
        let chunk = 223_211.min(231_231_231 - downloaded);
        downloaded += chunk;
        pb.inc(chunk);
        thread::sleep(Duration::from_millis(2));
    }
    pb.set_postfix("verified");
    pb.close();

    // Counter with no known end.
    let pb = ProgressBar::unbounded();
    for i in 0..500 {
        if i % 100 == 0 {
            pb.println(format!("checkpoint {}", i));
        }
        pb.inc(1);
        thread::sleep(Duration::from_millis(3));
    }
    pb.close();
    Ok(())
}
