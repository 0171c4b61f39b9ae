//! On-disk journal behavior.

use statejournal_core::{
    Config, CoreError, EpochSeq, ObjectId, Value, Workspace,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use tempfile::tempdir;

fn append_raw(path: &std::path::Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

#[test]
fn commits_survive_reopen() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("journal");

    let (users, settings) = {
        let mut ws = Workspace::open(&path).unwrap();
        let users = ws.create_dict();
        let settings = ws.create_dict();
        ws.load_dict(users).unwrap().set(1, Value::Int(100)).unwrap();
        ws.load_dict(users).unwrap().set(2, Value::ObjRef(settings)).unwrap();
        ws.load_dict(settings).unwrap().set(7, Value::Null).unwrap();
        ws.set_root_object_id(users);
        ws.commit().unwrap();

        ws.load_dict(users).unwrap().remove(1).unwrap();
        ws.commit().unwrap();
        (users, settings)
    };

    let mut ws = Workspace::open(&path).unwrap();
    assert_eq!(ws.epoch_seq(), EpochSeq::new(2));
    assert_eq!(ws.root_object_id(), users);
    assert_eq!(ws.next_object_id(), ObjectId::new(18));
    assert_eq!(
        ws.load_dict(users).unwrap().entries().unwrap(),
        vec![(2, Value::ObjRef(settings))]
    );
    assert_eq!(ws.load_dict(settings).unwrap().get(7).unwrap(), Some(&Value::Null));

    // ids are never reused after a restart
    assert_eq!(ws.create_dict(), ObjectId::new(18));
}

#[test]
fn journal_directory_layout() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("journal");

    let ws = Workspace::open(&path).unwrap();
    assert_eq!(ws.path(), Some(path.as_path()));
    assert!(path.join("LOCK").exists());
    assert_eq!(fs::read(path.join("data.log")).unwrap(), b"SJD1");
    assert_eq!(fs::read(path.join("meta.log")).unwrap(), b"SJM1");
}

#[test]
fn second_writer_is_locked_out() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("journal");

    let _first = Workspace::open(&path).unwrap();
    assert!(matches!(
        Workspace::open(&path),
        Err(CoreError::JournalLocked)
    ));
}

#[test]
fn missing_journal_without_create() {
    let temp = tempdir().unwrap();
    let config = Config::default().create_if_missing(false);

    assert!(matches!(
        Workspace::open_with_config(&temp.path().join("absent"), config),
        Err(CoreError::JournalNotFound { .. })
    ));
}

#[test]
fn torn_meta_tail_is_ignored_and_cut() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("journal");

    {
        let mut ws = Workspace::open(&path).unwrap();
        let id = ws.create_dict();
        ws.load_dict(id).unwrap().set(1, Value::Int(1)).unwrap();
        ws.commit().unwrap();
    }
    let meta_len = fs::metadata(path.join("meta.log")).unwrap().len();
    append_raw(&path.join("meta.log"), &[0x02, 0x00, 0x00, 0x00, 0x13]);

    let mut ws = Workspace::open(&path).unwrap();
    assert_eq!(ws.epoch_seq(), EpochSeq::new(1));
    assert_eq!(fs::metadata(path.join("meta.log")).unwrap().len(), meta_len);

    ws.load_dict(ObjectId::new(16)).unwrap().set(2, Value::Int(2)).unwrap();
    ws.commit().unwrap();
    drop(ws);

    let mut ws = Workspace::open(&path).unwrap();
    assert_eq!(ws.epoch_seq(), EpochSeq::new(2));
    assert_eq!(ws.load_dict(ObjectId::new(16)).unwrap().len().unwrap(), 2);
}

#[test]
fn torn_data_tail_is_cut() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("journal");

    let tail = {
        let mut ws = Workspace::open(&path).unwrap();
        ws.create_dict();
        ws.commit().unwrap();
        ws.data_tail()
    };
    append_raw(&path.join("data.log"), &[0xAB; 10]);

    let ws = Workspace::open(&path).unwrap();
    assert_eq!(ws.data_tail(), tail);
    assert_eq!(fs::metadata(path.join("data.log")).unwrap().len(), tail);
}

#[test]
fn damaged_committed_frame_is_reported() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("journal");

    {
        let mut ws = Workspace::open(&path).unwrap();
        let id = ws.create_dict();
        ws.load_dict(id).unwrap().set(1, Value::Int(1)).unwrap();
        ws.commit().unwrap();
    }

    // flip a payload byte of the first object frame
    let data_path = path.join("data.log");
    let mut bytes = fs::read(&data_path).unwrap();
    bytes[4 + 8 + 9] ^= 0xFF;
    fs::write(&data_path, &bytes).unwrap();

    assert!(matches!(
        Workspace::open(&path),
        Err(CoreError::ChecksumMismatch { offset: 4, .. })
    ));

    // without verification the damage only shows when the object is read
    let config = Config::default().verify_on_open(false);
    let mut ws = Workspace::open_with_config(&path, config).unwrap();
    assert!(matches!(
        ws.load_dict(ObjectId::new(16)),
        Err(CoreError::ChecksumMismatch { .. })
    ));
}

#[test]
fn foreign_file_is_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("journal");
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("data.log"), b"not a journal").unwrap();

    assert!(matches!(
        Workspace::open(&path),
        Err(CoreError::InvalidFormat { .. })
    ));
}

#[test]
fn many_commits_keep_one_chain_per_object() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("journal");

    {
        let mut ws = Workspace::open_with_config(&path, Config::default().sync_on_commit(false))
            .unwrap();
        let id = ws.create_dict();
        for i in 0..50u64 {
            ws.load_dict(id).unwrap().set(i % 7, Value::Int(i as i64)).unwrap();
            ws.commit().unwrap();
        }
    }

    let mut ws = Workspace::open(&path).unwrap();
    assert_eq!(ws.epoch_seq(), EpochSeq::new(50));
    let entries = ws.load_dict(ObjectId::new(16)).unwrap().entries().unwrap();
    assert_eq!(entries.len(), 7);
    assert_eq!(entries[0], (0, Value::Int(49)));
    assert_eq!(entries[6], (6, Value::Int(48)));
}
