//! Termination-signal hook.
//!
//! Stores opened with `install_signal_handler` register their persistence
//! gate here. The first registration starts a `touchdb-shutdown` thread that
//! waits for SIGTERM or SIGINT (Ctrl-C on platforms without unix signals).
//! On signal it acquires every live gate, which waits for any dump in
//! progress and keeps new ones from starting, then exits the process.

use crate::core::{DbError, Result};
use crate::storage::PersistGate;
use crate::storage::gate::GateState;
use lazy_static::lazy_static;
use log::{error, info};
use std::sync::{Mutex, Weak};
use std::thread;

/// Exit status used after a signal-triggered shutdown.
pub const SHUTDOWN_EXIT_CODE: i32 = 0;

lazy_static! {
    static ref REGISTERED_GATES: Mutex<Vec<Weak<Mutex<GateState>>>> = Mutex::new(Vec::new());
    static ref LISTENER_STARTED: Mutex<bool> = Mutex::new(false);
}

/// Register `gate` with the shutdown hook, starting the listener thread on
/// first use. Gates of dropped stores are pruned on the next registration.
pub fn register(gate: &PersistGate) -> Result<()> {
    {
        let mut gates = REGISTERED_GATES.lock()?;
        gates.retain(|weak| weak.strong_count() > 0);
        gates.push(gate.downgrade());
    }
    start_listener()
}

fn start_listener() -> Result<()> {
    let mut started = LISTENER_STARTED.lock()?;
    if *started {
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DbError::IoError(format!("Failed to build signal runtime: {}", e)))?;

    let termination = {
        let _enter = runtime.enter();
        termination_signal()
    };
    let termination = match termination {
        Ok(termination) => termination,
        Err(e) => {
            runtime.shutdown_background();
            return Err(e);
        }
    };

    thread::Builder::new()
        .name("touchdb-shutdown".to_string())
        .spawn(move || {
            runtime.block_on(termination.recv());
            shutdown_after_persistence();
        })
        .map_err(|e| DbError::IoError(format!("Failed to spawn shutdown thread: {}", e)))?;

    *started = true;
    Ok(())
}

#[cfg(unix)]
struct Termination {
    terminate: Option<tokio::signal::unix::Signal>,
    interrupt: Option<tokio::signal::unix::Signal>,
}

/// Installs the SIGTERM and SIGINT listeners up front so a signal that
/// arrives before the thread polls them is not lost. Fails only if neither
/// could be installed.
#[cfg(unix)]
fn termination_signal() -> Result<Termination> {
    use tokio::signal::unix::{SignalKind, signal};

    let install = |kind: SignalKind, name: &str| match signal(kind) {
        Ok(signal) => Some(signal),
        Err(e) => {
            error!("Unable to install {} handler: {}", name, e);
            None
        }
    };

    let terminate = install(SignalKind::terminate(), "SIGTERM");
    let interrupt = install(SignalKind::interrupt(), "SIGINT");
    if terminate.is_none() && interrupt.is_none() {
        return Err(DbError::IoError(
            "Failed to install SIGTERM and SIGINT handlers".to_string(),
        ));
    }

    Ok(Termination {
        terminate,
        interrupt,
    })
}

#[cfg(unix)]
async fn recv_or_pending(signal: Option<tokio::signal::unix::Signal>) {
    match signal {
        Some(mut signal) => {
            signal.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(unix)]
impl Termination {
    async fn recv(self) {
        tokio::select! {
            _ = recv_or_pending(self.terminate) => {},
            _ = recv_or_pending(self.interrupt) => {},
        }
    }
}

#[cfg(not(unix))]
struct Termination;

#[cfg(not(unix))]
fn termination_signal() -> Result<Termination> {
    Ok(Termination)
}

#[cfg(not(unix))]
impl Termination {
    async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

fn shutdown_after_persistence() -> ! {
    let gates: Vec<PersistGate> = REGISTERED_GATES
        .lock()
        .map(|gates| gates.iter().filter_map(PersistGate::upgrade).collect())
        .unwrap_or_else(|poisoned| {
            error!("Shutdown gate registry poisoned, waiting on remaining gates");
            poisoned.into_inner().iter().filter_map(PersistGate::upgrade).collect()
        });

    info!(
        "Termination requested, waiting for {} store(s) to finish persisting",
        gates.len()
    );

    // Guards stay held until exit so no dump can start after this point.
    let _held: Vec<_> = gates.iter().map(PersistGate::acquire).collect();

    info!("Persistence idle, exiting");
    std::process::exit(SHUTDOWN_EXIT_CODE)
}
