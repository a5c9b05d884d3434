use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backlight::{Backlight, BacklightState};
use crate::errors::*;
use crate::event::{ClickEvent, Update};
use crate::watcher::is_content_change;

make_log_macro!(debug, "watch");
make_log_macro!(info, "watch");

pub(crate) type Formatter<O> = Arc<dyn Fn(&BacklightState) -> O + Send + Sync>;

/// Owns the live [`Backlight`] and relays its state to the renderer.
pub(crate) struct WatchLoop<O> {
    backlight: Backlight,
    watched: PathBuf,
    format: Formatter<O>,
    updates: mpsc::Sender<Update<O>>,
}

impl<O> WatchLoop<O> {
    pub(crate) fn new(
        backlight: Backlight,
        format: Formatter<O>,
        updates: mpsc::Sender<Update<O>>,
    ) -> Self {
        Self {
            watched: backlight.read_brightness_file().to_path_buf(),
            backlight,
            format,
            updates,
        }
    }

    /// Publish the initial state, then react to events and commands until
    /// cancelled or failed. A fatal error is reported to the renderer before
    /// being returned.
    pub(crate) async fn run<S>(
        mut self,
        mut events: S,
        mut commands: mpsc::Receiver<ClickEvent>,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        S: Stream<Item = notify::Result<notify::Event>> + Unpin,
    {
        let mut commands_open = true;

        let mut flow = self.refresh_and_publish().await;
        while let Ok(ControlFlow::Continue(())) = flow {
            flow = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("{}: cancelled", self.backlight.state().device_id);
                    Ok(ControlFlow::Break(()))
                }
                event = events.next() => match event {
                    Some(Ok(event)) => self.handle_event(event).await,
                    Some(Err(err)) => Err(err.into()),
                    None => Err(BacklightError::SubscriptionClosed),
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("command channel closed");
                        commands_open = false;
                        Ok(ControlFlow::Continue(()))
                    }
                },
            };
        }

        match flow {
            Err(err) => {
                info!("{}: stopping: {err}", self.backlight.state().device_id);
                // The renderer may already be gone; the caller still gets the error.
                let _ = self.updates.send(Update::Error(err.clone())).await;
                Err(err)
            }
            _ => Ok(()),
        }
    }

    async fn handle_event(&mut self, event: notify::Event) -> Result<ControlFlow<()>> {
        if !is_content_change(&event, &self.watched) {
            debug!("ignoring {:?}", event);
            return Ok(ControlFlow::Continue(()));
        }
        self.refresh_and_publish().await
    }

    /// Issue at most one write. The resulting change event drives the next publish.
    async fn handle_command(&mut self, command: ClickEvent) -> Result<ControlFlow<()>> {
        let Some(target) = self.backlight.state().adjusted(command.button) else {
            debug!("ignoring {:?}", command);
            return Ok(ControlFlow::Continue(()));
        };

        match self.backlight.set_brightness(target).await {
            Ok(()) => Ok(ControlFlow::Continue(())),
            Err(err) => {
                debug!("adjustment failed: {err}");
                Ok(self.send(Update::Error(err)).await)
            }
        }
    }

    async fn refresh_and_publish(&mut self) -> Result<ControlFlow<()>> {
        self.backlight.refresh().await?;
        let output = (self.format)(self.backlight.state());
        Ok(self.send(Update::Output(output)).await)
    }

    async fn send(&self, update: Update<O>) -> ControlFlow<()> {
        if self.updates.send(update).await.is_err() {
            info!("renderer dropped its receiver");
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::event::Button;
    use crate::util::fixture::FakeSysfs;

    use std::time::Duration;

    use futures::SinkExt;
    use futures::channel::mpsc as fmpsc;
    use notify::EventKind;
    use notify::event::{DataChange, ModifyKind};
    use tokio::task::JoinHandle;

    const TIMEOUT: Duration = Duration::from_secs(5);

    type Events = fmpsc::Sender<notify::Result<notify::Event>>;

    struct Harness {
        sysfs: FakeSysfs,
        events: Events,
        commands: mpsc::Sender<ClickEvent>,
        updates: mpsc::Receiver<Update<String>>,
        cancel: CancellationToken,
        task: JoinHandle<Result<()>>,
    }

    impl Harness {
        fn start(max: &str, actual: &str) -> Self {
            let sysfs = FakeSysfs::new("intel_backlight", max, actual);
            let backlight = Backlight::new(sysfs.root(), "intel_backlight");
            let format: Formatter<String> = Arc::new(|s: &BacklightState| format!("{}%", s.percent()));

            let (events, events_rx) = fmpsc::channel(16);
            let (commands, commands_rx) = mpsc::channel(16);
            let (updates_tx, updates) = mpsc::channel(16);
            let cancel = CancellationToken::new();

            let watch = WatchLoop::new(backlight, format, updates_tx);
            let task = tokio::spawn(watch.run(events_rx, commands_rx, cancel.clone()));

            Self {
                sysfs,
                events,
                commands,
                updates,
                cancel,
                task,
            }
        }

        async fn next(&mut self) -> Update<String> {
            tokio::time::timeout(TIMEOUT, self.updates.recv())
                .await
                .expect("timed out waiting for an update")
                .expect("update channel closed")
        }

        async fn next_output(&mut self) -> String {
            match self.next().await {
                Update::Output(output) => output,
                Update::Error(err) => panic!("unexpected error {err}"),
            }
        }

        async fn modified(&mut self) {
            let event = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)))
                .add_path(self.sysfs.file(FILE_BRIGHTNESS));
            self.events.send(Ok(event)).await.unwrap();
        }

        async fn wait_for_write(&self, expected: &str) {
            let deadline = tokio::time::Instant::now() + TIMEOUT;
            while self.sysfs.read(FILE_BRIGHTNESS_WRITE) != expected {
                assert!(tokio::time::Instant::now() < deadline, "write never happened");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        /// Cancel and make sure nothing else was published.
        async fn finish(mut self) -> Result<()> {
            self.cancel.cancel();
            let res = self.task.await.unwrap();
            assert!(self.updates.try_recv().is_err(), "unexpected extra update");
            res
        }
    }

    #[tokio::test]
    async fn publishes_initial_state() {
        let mut h = Harness::start("937\n", "468\n");
        assert_eq!(h.next_output().await, "50%");
        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn one_publish_per_change_in_order() {
        let mut h = Harness::start("200\n", "20\n");
        assert_eq!(h.next_output().await, "10%");

        for (raw, expected) in [("40\n", "20%"), ("41\n", "21%"), ("200\n", "100%"), ("0", "0%")] {
            h.sysfs.write(FILE_BRIGHTNESS, raw);
            h.modified().await;
            assert_eq!(h.next_output().await, expected);
        }
        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn unchanged_value_is_still_published() {
        let mut h = Harness::start("100\n", "30\n");
        assert_eq!(h.next_output().await, "30%");
        h.modified().await;
        h.modified().await;
        assert_eq!(h.next_output().await, "30%");
        assert_eq!(h.next_output().await, "30%");
        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn unrelated_events_are_ignored() {
        let mut h = Harness::start("100\n", "30\n");
        assert_eq!(h.next_output().await, "30%");

        let other = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)))
            .add_path(h.sysfs.file(FILE_MAX_BRIGHTNESS));
        h.events.send(Ok(other)).await.unwrap();
        let metadata = notify::Event::new(EventKind::Modify(ModifyKind::Metadata(
            notify::event::MetadataKind::Any,
        )))
        .add_path(h.sysfs.file(FILE_BRIGHTNESS));
        h.events.send(Ok(metadata)).await.unwrap();

        // a real change afterwards is the only thing published
        h.sysfs.write(FILE_BRIGHTNESS, "31\n");
        h.modified().await;
        assert_eq!(h.next_output().await, "31%");
        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn scroll_writes_once_without_publishing() {
        let mut h = Harness::start("937\n", "50\n");
        assert_eq!(h.next_output().await, "5%");

        h.commands.send(Button::ScrollUp.into()).await.unwrap();
        h.wait_for_write("59").await;

        // still the old reading until the change notification arrives
        h.commands.send(Button::ScrollDown.into()).await.unwrap();
        h.wait_for_write("41").await;

        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn scroll_uses_refreshed_state() {
        let mut h = Harness::start("50\n", "10\n");
        assert_eq!(h.next_output().await, "20%");

        h.sysfs.write(FILE_BRIGHTNESS, "0\n");
        h.modified().await;
        assert_eq!(h.next_output().await, "0%");

        h.commands.send(Button::ScrollDown.into()).await.unwrap();
        h.wait_for_write("-1").await;
        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn scroll_at_integer_limit_keeps_running() {
        let mut h = Harness::start("100\n", "9223372036854775807\n");
        h.next_output().await;

        h.commands.send(Button::ScrollUp.into()).await.unwrap();
        h.wait_for_write("9223372036854775807").await;

        h.sysfs.write(FILE_BRIGHTNESS, "40\n");
        h.modified().await;
        assert_eq!(h.next_output().await, "40%");
        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn other_buttons_are_ignored() {
        let mut h = Harness::start("100\n", "30\n");
        assert_eq!(h.next_output().await, "30%");

        for button in [Button::Left, Button::Right, Button::Middle, Button::ScrollLeft] {
            h.commands.send(button.into()).await.unwrap();
        }
        h.commands.send(Button::ScrollUp.into()).await.unwrap();
        // commands are handled in order, so the scroll lands last
        h.wait_for_write("31").await;
        assert_eq!(h.sysfs.read(FILE_BRIGHTNESS_WRITE), "31");
        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn failed_write_is_reported_and_not_fatal() {
        let mut h = Harness::start("100\n", "30\n");
        assert_eq!(h.next_output().await, "30%");
        h.sysfs.break_writes();

        h.commands.send(Button::ScrollUp.into()).await.unwrap();
        match h.next().await {
            Update::Error(err @ BacklightError::Write { .. }) => assert!(!err.is_fatal()),
            other => panic!("unexpected {other:?}"),
        }

        h.sysfs.write(FILE_BRIGHTNESS, "32\n");
        h.modified().await;
        assert_eq!(h.next_output().await, "32%");
        h.finish().await.unwrap();
    }

    #[tokio::test]
    async fn failed_refresh_is_fatal() {
        let mut h = Harness::start("100\n", "30\n");
        assert_eq!(h.next_output().await, "30%");

        h.sysfs.write(FILE_BRIGHTNESS, "N/A");
        h.modified().await;
        match h.next().await {
            Update::Error(BacklightError::Read { path, .. }) => {
                assert_eq!(path, h.sysfs.file(FILE_BRIGHTNESS));
            }
            other => panic!("unexpected {other:?}"),
        }
        let res = h.task.await.unwrap();
        assert!(matches!(res, Err(BacklightError::Read { .. })));
        assert!(h.updates.recv().await.is_none());
    }

    #[tokio::test]
    async fn initial_read_failure_publishes_nothing() {
        let mut h = Harness::start("100\n", "garbage\n");
        assert!(matches!(h.next().await, Update::Error(BacklightError::Read { .. })));
        assert!(h.task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn subscription_error_is_fatal() {
        let mut h = Harness::start("100\n", "30\n");
        assert_eq!(h.next_output().await, "30%");

        h.events
            .send(Err(notify::Error::generic("inotify queue overflow")))
            .await
            .unwrap();
        assert!(matches!(h.next().await, Update::Error(BacklightError::Subscription(_))));
        assert!(matches!(h.task.await.unwrap(), Err(BacklightError::Subscription(_))));
    }

    #[tokio::test]
    async fn closed_subscription_is_fatal() {
        let mut h = Harness::start("100\n", "30\n");
        assert_eq!(h.next_output().await, "30%");

        h.events.close_channel();
        assert!(matches!(h.next().await, Update::Error(BacklightError::SubscriptionClosed)));
        assert!(matches!(h.task.await.unwrap(), Err(BacklightError::SubscriptionClosed)));
    }

    #[tokio::test]
    async fn closed_command_channel_keeps_watching() {
        let Harness {
            sysfs,
            mut events,
            commands,
            mut updates,
            cancel,
            task,
        } = Harness::start("100\n", "30\n");
        drop(commands);
        assert!(matches!(updates.recv().await, Some(Update::Output(o)) if o == "30%"));

        sysfs.write(FILE_BRIGHTNESS, "70\n");
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)))
            .add_path(sysfs.file(FILE_BRIGHTNESS));
        events.send(Ok(event)).await.unwrap();
        assert!(matches!(updates.recv().await, Some(Update::Output(o)) if o == "70%"));

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn dropped_renderer_stops_the_loop() {
        let Harness {
            sysfs,
            mut events,
            updates,
            task,
            ..
        } = Harness::start("100\n", "30\n");
        drop(updates);

        let event = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)))
            .add_path(sysfs.file(FILE_BRIGHTNESS));
        // the loop may already be gone by the time this is sent
        let _ = events.send(Ok(event)).await;
        assert!(tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().is_ok());
    }
}
