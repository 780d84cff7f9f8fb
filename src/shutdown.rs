use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::logging::log;

/// Cancellation flag shared between the caller and the poll timer
///
/// Cloning yields a handle to the same flag. Waiters blocked in
/// [`CancelToken::wait_timeout`] wake up as soon as [`CancelToken::cancel`]
/// is called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes every pending wait
    pub fn cancel(&self) {
        let (flag, cond) = &*self.inner;
        match flag.lock() {
            Ok(mut cancelled) => *cancelled = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
        cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        match flag.lock() {
            Ok(cancelled) => *cancelled,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Sleeps for `timeout` unless cancelled first
    ///
    /// A timeout too large to represent as a deadline waits until cancelled.
    ///
    /// # Returns
    /// `true` if the full timeout elapsed, `false` if cancellation was requested
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cond) = &*self.inner;
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = match flag.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !*cancelled {
            cancelled = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    match cond.wait_timeout(cancelled, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => match cond.wait(cancelled) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                },
            };
        }
        false
    }
}

/// Cancels `token` on SIGINT or SIGTERM
///
/// The handler thread only flips the token; the pending poll wait notices it
/// and reports the cancellation through the download callback.
pub fn install_signal_handler(token: CancelToken) -> io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let name = match sig {
                SIGTERM => "SIGTERM",
                _ => "SIGINT",
            };
            let _ = log(&format!("Received {}, cancelling", name));
            token.cancel();
        }
    });

    Ok(())
}
