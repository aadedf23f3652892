use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use libdaq_device::{ChannelSelection, Device};
use libdaq_transport::Transport;
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, open_device, parse_duration, AcquireArgs};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_batch, print_stats, OutputFormat};

pub fn run(args: AcquireArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let selection = if args.all {
        ChannelSelection::All
    } else {
        ChannelSelection::Single(args.channel)
    };

    let device = open_device(&args.device)?;
    device
        .connect()
        .map_err(|err| device_error("connect failed", err))?;
    device
        .initialize()
        .map_err(|err| device_error("initialize failed", err))?;
    device
        .configure(args.rate, args.voltage)
        .map_err(|err| device_error("configure failed", err))?;
    device
        .select_channels(selection)
        .map_err(|err| device_error("select channel failed", err))?;
    device
        .start_acquisition()
        .map_err(|err| device_error("start failed", err))?;

    let stopper = device.clone();
    install_ctrlc_handler(move || {
        info!("interrupt received; stopping acquisition");
        if let Err(err) = stopper.stop_acquisition() {
            warn!(error = %err, "stop on interrupt failed");
        }
    })?;

    let timer = duration.map(|after| stop_after(device.clone(), after));
    let mut printed = 0usize;
    let mut outcome = Ok(SUCCESS);

    let stream = device
        .samples()
        .map_err(|err| device_error("sample stream unavailable", err))?;
    for batch in stream {
        let batch = match batch {
            Ok(batch) => batch,
            Err(err) => {
                outcome = Err(device_error("acquisition failed", err));
                break;
            }
        };
        print_batch(&batch, format, args.average);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }
    if let Some(timer) = timer {
        timer.cancel();
    }

    // No-op when the stream already ended through a stop or a fault.
    if let Err(err) = device.stop_acquisition() {
        warn!(error = %err, "stop failed");
    }
    print_stats(&device.acquisition_stats(), format);
    if let Err(err) = device.disconnect() {
        warn!(error = %err, "disconnect failed");
    }

    outcome
}

/// Stops acquisition on `device` once `after` has elapsed, even while the
/// stream is blocked waiting on a quiet device.
struct StopTimer {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

impl StopTimer {
    fn cancel(self) {
        drop(self.cancel);
        if self.handle.join().is_err() {
            warn!("duration timer panicked");
        }
    }
}

fn stop_after<T: Transport + 'static>(device: Device<T>, after: Duration) -> StopTimer {
    let (cancel, cancelled) = mpsc::channel::<()>();
    let handle = thread::spawn(move || match cancelled.recv_timeout(after) {
        Err(RecvTimeoutError::Timeout) => {
            info!(?after, "duration elapsed; stopping acquisition");
            if let Err(err) = device.stop_acquisition() {
                warn!(error = %err, "stop after duration failed");
            }
        }
        Ok(()) | Err(RecvTimeoutError::Disconnected) => debug!("duration timer cancelled"),
    });
    StopTimer { cancel, handle }
}
