use crate::core::events::HostEvent;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn host_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} hosts {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Drives a host progress bar from orchestrator events until the sender
/// side is dropped. Hidden when `visible` is false.
pub fn spawn(total: usize, visible: bool, mut events: mpsc::UnboundedReceiver<HostEvent>) -> JoinHandle<()> {
    let pb = if visible {
        host_bar(total)
    } else {
        ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden())
    };

    tokio::spawn(async move {
        let mut failed = 0usize;
        while let Some(event) = events.recv().await {
            match event {
                HostEvent::Started(address) => pb.set_message(format!("scanning {}", address)),
                HostEvent::Finished {
                    address,
                    failed: host_failed,
                    services,
                } => {
                    if host_failed {
                        failed += 1;
                        pb.println(format!("  {} failed", address));
                    } else {
                        pb.println(format!("  {} done, {} service(s)", address, services));
                    }
                    pb.inc(1);
                }
            }
        }
        pb.finish_with_message(if failed == 0 {
            "complete".to_string()
        } else {
            format!("complete, {} failed", failed)
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Address;

    #[tokio::test]
    async fn test_consumes_events_until_sender_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn(2, false, rx);

        let address = Address::new(10, 0, 0, 1);
        tx.send(HostEvent::Started(address)).unwrap();
        tx.send(HostEvent::Finished { address, failed: false, services: 3 }).unwrap();
        drop(tx);

        handle.await.unwrap();
    }
}
