use std::path::{Path, PathBuf};
use std::sync::mpsc;

use chrono::NaiveDate;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::store::{batch_date, profile_source_id, TODAY_FILE};

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    BatchArrived { date: NaiveDate },
    ProfileChanged { source_id: String },
}

pub fn classify_event(event: &Event) -> Option<WatchEvent> {
    match event.kind {
        EventKind::Modify(_) | EventKind::Create(_) => event.paths.iter().find_map(|p| classify_path(p)),
        _ => None,
    }
}

fn classify_path(path: &Path) -> Option<WatchEvent> {
    let name = path.file_name()?.to_str()?;
    if name == TODAY_FILE {
        let dir = path.parent()?.file_name()?.to_str()?;
        return batch_date(dir).map(|date| WatchEvent::BatchArrived { date });
    }
    profile_source_id(name).map(|id| WatchEvent::ProfileChanged {
        source_id: id.to_string(),
    })
}

/// Watches `<data_dir>/Files` recursively and forwards classified events.
pub fn create_watcher(
    tx: mpsc::Sender<WatchEvent>,
    data_dir: &Path,
) -> Result<RecommendedWatcher, notify::Error> {
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            if let Some(watch_event) = classify_event(&event) {
                let _ = tx.send(watch_event);
            }
        }
    })?;
    let root: PathBuf = data_dir.join("Files");
    watcher.watch(&root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};

    fn make_event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        Event {
            kind,
            paths,
            attrs: Default::default(),
        }
    }

    #[test]
    fn classify_batch_create() {
        let path = PathBuf::from("/data/Files/2025-09-08_20_00_UTC/files.json");
        let event = make_event(EventKind::Create(CreateKind::File), vec![path]);
        assert_eq!(
            classify_event(&event),
            Some(WatchEvent::BatchArrived {
                date: NaiveDate::from_ymd_opt(2025, 9, 8).unwrap()
            })
        );
    }

    #[test]
    fn classify_profile_modify() {
        let path = PathBuf::from("/data/Files/datasource_cvs/220504_native.md");
        let event = make_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec![path],
        );
        assert_eq!(
            classify_event(&event),
            Some(WatchEvent::ProfileChanged {
                source_id: "220504".into()
            })
        );
    }

    #[test]
    fn classify_ignores_delete() {
        let path = PathBuf::from("/data/Files/2025-09-08_20_00_UTC/files.json");
        let event = make_event(EventKind::Remove(RemoveKind::File), vec![path]);
        assert!(classify_event(&event).is_none());
    }

    #[test]
    fn classify_ignores_unrelated_files() {
        let event = make_event(
            EventKind::Create(CreateKind::File),
            vec![
                PathBuf::from("/data/Files/2025-09-08_20_00_UTC/files_last_weekday.json"),
                PathBuf::from("/data/Files/misc/files.json"),
                PathBuf::from("/tmp/notes.txt"),
            ],
        );
        assert!(classify_event(&event).is_none());
    }

    #[test]
    fn create_watcher_on_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Files")).unwrap();
        let (tx, _rx) = mpsc::channel();
        assert!(create_watcher(tx, dir.path()).is_ok());
    }
}
