pub(crate) use futures::channel::mpsc::Receiver;
use futures::{SinkExt, channel::mpsc::channel};
use notify::{Config, Event, EventKind, RecursiveMode, Result};
use notify::event::ModifyKind;
pub(crate) use notify::{INotifyWatcher, Watcher};

use std::path::Path;

make_log_macro!(debug, "watcher");

/// Subscribe to inotify events for a single file.
///
/// The watcher must be kept alive for as long as events are wanted. The
/// notify thread blocks when the channel is full, so no event is dropped.
pub fn file_watcher<P: AsRef<Path>>(path: P) -> Result<(INotifyWatcher, Receiver<Result<Event>>)> {
    let (mut tx, rx) = channel(1);

    let mut inotify_watcher = INotifyWatcher::new(
        move |res: Result<Event>| {
            futures::executor::block_on(async {
                if tx.send(res).await.is_err() {
                    debug!("receiver gone, dropping event");
                }
            });
        },
        Config::default(),
    )?;

    inotify_watcher.watch(path.as_ref(), RecursiveMode::NonRecursive)?;
    debug!("watching {}", path.as_ref().display());

    Ok((inotify_watcher, rx))
}

/// Whether `event` reports new contents written to `path`.
pub fn is_content_change(event: &Event, path: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
    ) && event.paths.iter().any(|p| p == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, AccessMode, DataChange, MetadataKind};

    #[test]
    fn only_data_changes_on_the_watched_file_count() {
        let path = Path::new("/sys/class/backlight/intel_backlight/actual_brightness");
        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any)));

        assert!(is_content_change(&modify.clone().add_path(path.into()), path));
        assert!(!is_content_change(
            &modify.clone().add_path("/sys/class/backlight/other/actual_brightness".into()),
            path
        ));
        assert!(!is_content_change(&modify, path));
        assert!(!is_content_change(
            &Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)))
                .add_path(path.into()),
            path
        ));
        assert!(!is_content_change(
            &Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)))
                .add_path(path.into()),
            path
        ));
    }
}
