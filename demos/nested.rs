use std::thread;
use std::time::Duration;

use rand::Rng;

use progmeter::{BarConfig, ProgressBar};

fn main() -> Result<(), progmeter::ConfigError> {
    let mut rng = rand::rng();

    let epochs = ProgressBar::with_config(BarConfig::default().desc("epoch").total(4.0).position(0))?;
    for epoch in 0..4 {
        let steps = rng.random_range(50..150);
        let batches = ProgressBar::with_config(
            BarConfig::default()
                .desc(format!("batch {}", epoch))
                .total(steps as f64)
                .position(1)
                .leave(false),
        )?;
        for _ in 0..steps {
            batches.set_postfix_items([("loss", rng.random_range(0.0..1.0f64))]);
            batches.inc(1);
            thread::sleep(Duration::from_millis(rng.random_range(5..25)));
        }
        batches.close();
        epochs.inc(1);
    }
    epochs.close();
    Ok(())
}
