use crate::cmd::EmulateArgs;
use crate::exit::CliResult;

#[cfg(unix)]
pub fn run(args: EmulateArgs) -> CliResult<i32> {
    use std::io::ErrorKind;
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::UnixListener;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use libdaq_device::simulator::serve;
    use libdaq_device::{Faults, SimulatedDaq122};
    use tracing::{info, warn};

    use crate::cmd::install_ctrlc_handler;
    use crate::exit::{io_error, SUCCESS};

    if let Ok(meta) = std::fs::symlink_metadata(&args.socket) {
        if meta.file_type().is_socket() {
            std::fs::remove_file(&args.socket)
                .map_err(|err| io_error("failed removing stale socket", err))?;
        }
    }

    let listener = UnixListener::bind(&args.socket).map_err(|err| io_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("listener setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    install_ctrlc_handler(move || flag.store(false, Ordering::SeqCst))?;

    info!(socket = %args.socket.display(), paced = !args.unpaced, "emulator listening");

    while running.load(Ordering::SeqCst) {
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(25));
                continue;
            }
            Err(err) => return Err(io_error("accept failed", err)),
        };
        stream
            .set_nonblocking(false)
            .map_err(|err| io_error("connection setup failed", err))?;
        info!("host connected");

        let sim = SimulatedDaq122::new()
            .paced(!args.unpaced)
            .with_faults(Faults {
                garbage_every: args.garbage_every,
                corrupt_every: args.corrupt_every,
                ..Faults::default()
            });
        match serve(sim, stream, &running) {
            Ok(()) => info!("host disconnected"),
            Err(err) => warn!(error = %err, "host session ended with error"),
        }

        if args.once {
            break;
        }
    }

    let _ = std::fs::remove_file(&args.socket);
    Ok(SUCCESS)
}

#[cfg(not(unix))]
pub fn run(args: EmulateArgs) -> CliResult<i32> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        format!(
            "emulate --socket {} requires a Unix platform",
            args.socket.display()
        ),
    ))
}
