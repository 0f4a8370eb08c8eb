use log::{error, info};
use tokio::{select, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Turns process signals into monitor events: SIGINT and SIGTERM cancel
/// `shutdown`, SIGHUP sends a reload request.
pub fn spawn(shutdown: CancellationToken, reloads: mpsc::Sender<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = listen(&shutdown, &reloads).await {
            error!("Could not listen for signals: {e}");
        }
    })
}

#[cfg(unix)]
async fn listen(shutdown: &CancellationToken, reloads: &mpsc::Sender<()>) -> Result<(), Error> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        select! {
            () = shutdown.cancelled() => break,
            _ = terminate.recv() => {
                info!("received SIGTERM, exiting");
                shutdown.cancel();
                break;
            }
            _ = interrupt.recv() => {
                info!("received SIGINT, exiting");
                shutdown.cancel();
                break;
            }
            _ = hangup.recv() => {
                info!("received SIGHUP, reloading configuration");
                if reloads.send(()).await.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn listen(shutdown: &CancellationToken, _reloads: &mpsc::Sender<()>) -> Result<(), Error> {
    select! {
        () = shutdown.cancelled() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("received Ctrl-C, exiting");
            shutdown.cancel();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let (reloads, _reloads_rx) = mpsc::channel(1);
        let handle = spawn(shutdown.clone(), reloads);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("signal listener did not stop")
            .unwrap();
    }
}
