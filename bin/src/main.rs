use backlight_watch::{Backlight, BacklightBuilder, BacklightError, Button, ClickEvent, Update};

use clap::{ArgGroup, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Report and adjust the brightness of a sysfs backlight
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
            ArgGroup::new("action")
                .required(true)
                .args(["get", "set", "inc", "dec", "watch"]),
        ))]
struct Args {
    /// Backlight device under /sys/class/backlight. Defaults to the configured device.
    #[arg(long, value_name = "name")]
    device: Option<String>,

    /// Print the current brightness as a percentage of the maximum.
    #[arg(long)]
    get: bool,

    /// Write a raw brightness value, in device units.
    #[arg(long, value_name = "raw", allow_negative_numbers = true)]
    set: Option<i64>,

    /// Increase brightness by one step (1% of the maximum, at least one unit).
    #[arg(long)]
    inc: bool,

    /// Decrease brightness by one step.
    #[arg(long)]
    dec: bool,

    /// Print every brightness change until interrupted.
    /// Lines reading `up` or `down` on stdin adjust the brightness.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), BacklightError> {
    env_logger::init();
    let args = Args::parse();

    let mut builder = BacklightBuilder::new();
    if let Some(device) = &args.device {
        builder = builder.with_device(device);
    }
    let module = builder.build().await?;

    if args.watch {
        return watch(module).await;
    }

    let mut backlight = Backlight::new(module.devices_path(), module.device_id());
    if let Some(set) = args.set {
        return backlight.set_brightness(set).await;
    }

    backlight.refresh().await?;
    let state = backlight.state();
    if args.get {
        println!("{}", state.percent());
    } else {
        let button = if args.inc {
            Button::ScrollUp
        } else {
            Button::ScrollDown
        };
        if let Some(target) = state.adjusted(button) {
            backlight.set_brightness(target).await?;
        }
    }

    Ok(())
}

async fn watch(module: backlight_watch::BacklightModule) -> Result<(), BacklightError> {
    let (updates_tx, mut updates) = mpsc::channel(16);
    let (commands_tx, commands) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let button = match line.trim() {
                "up" => Button::ScrollUp,
                "down" => Button::ScrollDown,
                other => {
                    log::warn!("unknown command {other:?}, expected `up` or `down`");
                    continue;
                }
            };
            if commands_tx.send(ClickEvent::from(button)).await.is_err() {
                break;
            }
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update {
                Update::Output(output) => println!("{output}"),
                Update::Error(err) => eprintln!("error: {err}"),
            }
        }
    });

    let res = module.run(updates_tx, commands, cancel).await;
    // run has dropped its sender, so the printer drains and exits
    let _ = printer.await;
    res
}
