//! Concurrent per-file device operations

use std::future::Future;

use futures_util::future::join_all;

use livesync_core::prelude::*;
use livesync_core::{FileOpFailure, LocalToDeviceFile};

/// Run `op` for every file concurrently.
///
/// A failing file never stops its siblings. All failures are collected into a
/// single [`Error::FileOperations`].
pub async fn for_each_file<'a, F, Fut>(files: &'a [LocalToDeviceFile], op: F) -> Result<()>
where
    F: Fn(&'a LocalToDeviceFile) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let results = join_all(files.iter().map(|file| {
        let fut = op(file);
        async move { (file, fut.await) }
    }))
    .await;

    let failures: Vec<FileOpFailure> = results
        .into_iter()
        .filter_map(|(file, result)| {
            result
                .err()
                .map(|e| FileOpFailure::new(file.device_path(), e.to_string()))
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::file_operations(failures))
    }
}

/// Combine the outcome of several file passes into one result.
///
/// Per-file failures from every pass end up in a single
/// [`Error::FileOperations`]; any other error is returned as is.
pub fn merge_file_results(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(()) => {}
            Err(Error::FileOperations { failures: more }) => failures.extend(more),
            Err(e) => return Err(e),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::file_operations(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn files(names: &[&str]) -> Vec<LocalToDeviceFile> {
        names
            .iter()
            .map(|n| {
                LocalToDeviceFile::resolve(&Path::new("/p/app").join(n), Path::new("/p/app"), "app")
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let files = files(&["a.css", "b.css"]);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for_each_file(&files, move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_do_not_block_siblings() {
        let files = files(&["a.css", "bad.css", "c.css", "worse.css"]);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let err = for_each_file(&files, move |file| {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if file.device_path().contains("bad") || file.device_path().contains("worse") {
                    Err(Error::device("denied"))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match err {
            Error::FileOperations { failures } => {
                let paths: Vec<_> = failures.iter().map(|f| f.path.as_str()).collect();
                assert_eq!(paths, vec!["app/bad.css", "app/worse.css"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_is_ok() {
        for_each_file(&[], |_| async { Err(Error::device("never called")) })
            .await
            .unwrap();
    }

    #[test]
    fn test_merge_collects_failures_from_every_pass() {
        let err = merge_file_results([
            Err(Error::file_operations(vec![FileOpFailure::new("app/old.css", "gone")])),
            Ok(()),
            Err(Error::file_operations(vec![FileOpFailure::new("app/new.css", "denied")])),
        ])
        .unwrap_err();

        match err {
            Error::FileOperations { failures } => {
                let paths: Vec<_> = failures.iter().map(|f| f.path.as_str()).collect();
                assert_eq!(paths, vec!["app/old.css", "app/new.css"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_merge_all_ok() {
        merge_file_results([Ok(()), Ok(())]).unwrap();
    }
}
