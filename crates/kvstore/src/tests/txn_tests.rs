use super::helpers::{kv, open_store};
use crate::*;
use anyhow::Result;
use tempfile::tempdir;

#[test]
fn reads_see_own_writes_before_commit() -> Result<()> {
    let mut base = MemStore::new();
    base.set(b"k".to_vec(), b"base".to_vec())?;

    let mut txn = base.begin();
    txn.set(b"k".to_vec(), b"overlay".to_vec())?;
    txn.set(b"new".to_vec(), b"1".to_vec())?;
    assert_eq!(txn.get(b"k")?, Some(b"overlay".to_vec()));
    assert_eq!(txn.pending(), 2);
    txn.commit()?;

    assert_eq!(base.get(b"k")?, Some(b"overlay".to_vec()));
    assert_eq!(base.get(b"new")?, Some(b"1".to_vec()));
    Ok(())
}

#[test]
fn dropped_transaction_leaves_base_untouched() -> Result<()> {
    let mut base = MemStore::new();
    base.set(b"k".to_vec(), b"v".to_vec())?;
    {
        let mut txn = base.begin();
        txn.delete(b"k".to_vec())?;
        txn.set(b"other".to_vec(), b"x".to_vec())?;
        assert!(txn.get(b"k")?.is_none());
        txn.abort();
    }
    assert_eq!(base.get(b"k")?, Some(b"v".to_vec()));
    assert!(base.get(b"other")?.is_none());
    Ok(())
}

#[test]
fn scan_merges_overlay_over_base() -> Result<()> {
    let mut base = MemStore::new();
    base.set(b"p/a".to_vec(), b"1".to_vec())?;
    base.set(b"p/b".to_vec(), b"2".to_vec())?;

    let mut txn = base.begin();
    txn.delete(b"p/a".to_vec())?;
    txn.set(b"p/b".to_vec(), b"20".to_vec())?;
    txn.set(b"p/c".to_vec(), b"3".to_vec())?;
    txn.set(b"q/z".to_vec(), b"out".to_vec())?;

    assert_eq!(txn.scan_prefix(b"p/")?, vec![kv("p/b", "20"), kv("p/c", "3")]);
    Ok(())
}

#[test]
fn commit_is_one_wal_batch() -> Result<()> {
    let dir = tempdir()?;
    let mut store = open_store(dir.path())?;
    {
        let mut txn = store.begin();
        txn.set(b"a".to_vec(), b"1".to_vec())?;
        txn.set(b"b".to_vec(), b"2".to_vec())?;
        txn.delete(b"a".to_vec())?;
        txn.commit()?;
    }
    assert_eq!(store.seq(), 1);
    assert!(store.get(b"a")?.is_none());
    Ok(())
}

#[test]
fn empty_commit_does_not_touch_the_log() -> Result<()> {
    let dir = tempdir()?;
    let mut store = open_store(dir.path())?;
    store.begin().commit()?;
    assert_eq!(store.seq(), 0);
    Ok(())
}

#[test]
fn invalid_write_is_rejected_inside_transaction() -> Result<()> {
    let mut base = MemStore::new();
    let mut txn = base.begin();
    assert!(txn.set(Vec::new(), b"v".to_vec()).is_err());
    assert_eq!(txn.pending(), 0);
    Ok(())
}

#[test]
fn nested_transactions_commit_outward() -> Result<()> {
    let mut base = MemStore::new();
    {
        let mut outer = base.begin();
        {
            let mut inner = outer.begin();
            inner.set(b"k".to_vec(), b"v".to_vec())?;
            inner.commit()?;
        }
        assert_eq!(outer.get(b"k")?, Some(b"v".to_vec()));
        outer.commit()?;
    }
    assert_eq!(base.get(b"k")?, Some(b"v".to_vec()));
    Ok(())
}
