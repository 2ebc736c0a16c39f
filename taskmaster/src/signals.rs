//! Turn process signals into [`SchedulerEvent`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::executor::SchedulerEvent;

/// Exit status used when the user interrupts the run
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Forward SIGUSR1 (and SIGINFO where it exists) as status requests.
///
/// Must be called from inside a tokio runtime.
#[cfg(unix)]
pub fn listen_for_status_requests(tx: UnboundedSender<SchedulerEvent>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1())?;
    #[cfg(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    let mut info = signal(SignalKind::from_raw(libc::SIGINFO))?;

    tokio::spawn(async move {
        loop {
            #[cfg(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly"
            ))]
            let received = tokio::select! {
                r = usr1.recv() => r,
                r = info.recv() => r,
            };
            #[cfg(not(any(
                target_os = "macos",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly"
            )))]
            let received = usr1.recv().await;

            if received.is_none() {
                break;
            }
            debug!("status requested");
            if tx.send(SchedulerEvent::StatusRequest).is_err() {
                break;
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn listen_for_status_requests(_tx: UnboundedSender<SchedulerEvent>) -> std::io::Result<()> {
    Ok(())
}

/// Record one Ctrl-C. The first press is forwarded to the scheduler and
/// returns true; any later press returns false.
fn forward_interrupt(pressed: &AtomicBool, tx: &UnboundedSender<SchedulerEvent>) -> bool {
    if pressed.swap(true, Ordering::SeqCst) {
        return false;
    }
    // A closed channel means the run is already over.
    let _ = tx.send(SchedulerEvent::Interrupt);
    true
}

/// Route Ctrl-C to the scheduler. A second Ctrl-C exits at once with 130.
pub fn install_interrupt_handler(tx: UnboundedSender<SchedulerEvent>) -> Result<(), ctrlc::Error> {
    let pressed = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler(move || {
        if forward_interrupt(&pressed, &tx) {
            warn!("interrupt received, waiting for running targets (Ctrl-C again to quit)");
        } else {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_forward_interrupt_only_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pressed = AtomicBool::new(false);

        assert!(forward_interrupt(&pressed, &tx));
        assert!(!forward_interrupt(&pressed, &tx));

        assert_eq!(rx.try_recv().unwrap(), SchedulerEvent::Interrupt);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_forward_interrupt_after_run_finished() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let pressed = AtomicBool::new(false);
        assert!(forward_interrupt(&pressed, &tx));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigusr1_becomes_status_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        listen_for_status_requests(tx).unwrap();

        unsafe {
            libc::kill(libc::getpid(), libc::SIGUSR1);
        }

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(SchedulerEvent::StatusRequest));
    }
}
