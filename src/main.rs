use bulkxfer::{
    install_signal_handler, log, parse_args, resolve_config, set_log_file, Operations,
    PROGRAM_NAME, PROGRAM_VERSION,
};
use std::process;
use std::sync::mpsc;

/// Exit code for any failed step, including cancellation
const EXIT_FAILURE: i32 = 1;
/// Exit code for unusable settings
const EXIT_CONFIG: i32 = 2;

fn fail(message: &str, code: i32) -> ! {
    let _ = log(&format!("Error: {}", message));
    eprintln!("Error: {}", message);
    process::exit(code);
}

fn main() {
    let args = parse_args();
    if let Some(log_file) = &args.log_file {
        set_log_file(log_file);
    }

    let _ = log(&format!("{} version {} started", PROGRAM_NAME, PROGRAM_VERSION));

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => fail(&e.to_string(), EXIT_CONFIG),
    };
    let operations = match Operations::new(config) {
        Ok(operations) => operations,
        Err(e) => fail(&e.to_string(), EXIT_FAILURE),
    };

    if let Err(e) = install_signal_handler(operations.cancel_token()) {
        let _ = log(&format!("Failed to install signal handler: {}", e));
    }

    let init = operations.init();
    if !init.succeeded {
        fail(&init.message, EXIT_FAILURE);
    }

    let upload = operations.upload(&args.file, args.single_file);
    if !upload.succeeded {
        fail(&upload.message, EXIT_FAILURE);
    }
    println!("{}", upload.message);

    let (tx, rx) = mpsc::channel();
    operations.download(
        &args.location,
        args.remove,
        Box::new(move |succeeded, message| {
            let _ = tx.send((succeeded, message));
        }),
    );

    match rx.recv() {
        Ok((true, message)) => {
            let _ = log(&message);
            println!("{}", message);
        }
        Ok((false, message)) => fail(&message, EXIT_FAILURE),
        Err(_) => fail("Download ended without a result", EXIT_FAILURE),
    }
}
