use std::time::Duration;

use tokio::time::Instant;

use super::*;

/// How long the poll timer sleeps while polling is stopped. The branch is
/// disabled then, so the value only has to be finite.
const IDLE_TIMER: Duration = Duration::from_secs(3600);

impl SessionController {
    /// Own the controller on the current task until every command sender is
    /// dropped. Backend events, commands and the metrics timer are all
    /// handled here, one at a time.
    pub async fn run(mut self, mut commands: CommandReceiver) {
        log::info!("Session controller running as {}", self.identity.username());

        let mut armed = self.poller.interval();
        let poll_timer = tokio::time::sleep(armed.unwrap_or(IDLE_TIMER));
        tokio::pin!(poll_timer);

        loop {
            let polling = armed.is_some();

            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Some(event) => {
                            self.handle_event(event);
                            self.process_pending_events();
                        }
                        None => {
                            log::warn!("Event queue closed, stopping session controller");
                            break;
                        }
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            log::info!("All session handles dropped, stopping session controller");
                            break;
                        }
                    }
                }
                _ = &mut poll_timer, if polling => {
                    self.poll_metrics().await;
                    let period = self.poller.interval().unwrap_or(IDLE_TIMER);
                    poll_timer.as_mut().reset(Instant::now() + period);
                }
            }

            // Re-arm when polling starts, stops or changes cadence.
            let interval = self.poller.interval();
            if interval != armed {
                armed = interval;
                poll_timer
                    .as_mut()
                    .reset(Instant::now() + interval.unwrap_or(IDLE_TIMER));
            }
        }

        self.poller.stop();
    }
}
