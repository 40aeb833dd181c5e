//! Full paginated enumeration of a bucket

use crate::error::{Error, Result};
use crate::traits::{ListOptions, ObjectRecord, ObjectStore};

/// Default listing page size
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// List every object under `prefix`, following continuation cursors
///
/// Pages are requested in provider order until the endpoint reports no more
/// pages. Listing is never retried here: any page failure aborts with
/// `Error::Connection` because a partial listing cannot be trusted.
pub async fn list_all_objects(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    page_size: i32,
) -> Result<Vec<ObjectRecord>> {
    let mut objects = Vec::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let options = ListOptions {
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            max_keys: Some(page_size),
            continuation_token: continuation_token.take(),
        };

        let page = store
            .list_objects(bucket, options)
            .await
            .map_err(|e| match e {
                Error::Connection(msg) => Error::Connection(msg),
                other => Error::Connection(format!("listing {bucket} failed: {other}")),
            })?;
        pages += 1;

        objects.extend(page.items);

        match page.continuation_token {
            Some(token) if page.truncated => continuation_token = Some(token),
            _ => break,
        }
    }

    tracing::debug!(bucket, prefix, pages, objects = objects.len(), "Listing complete");
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ListResult, MockObjectStore};
    use mockall::Sequence;

    fn page(keys: &[&str], next: Option<&str>) -> ListResult {
        ListResult {
            items: keys.iter().map(|k| ObjectRecord::new(*k, 10, "e")).collect(),
            truncated: next.is_some(),
            continuation_token: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_follows_continuation_cursor() {
        let mut store = MockObjectStore::new();
        let mut seq = Sequence::new();

        store
            .expect_list_objects()
            .withf(|bucket, opts| {
                bucket == "src"
                    && opts.continuation_token.is_none()
                    && opts.prefix.as_deref() == Some("photos/")
                    && opts.max_keys == Some(2)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&["photos/a", "photos/b"], Some("t1"))));
        store
            .expect_list_objects()
            .withf(|_, opts| opts.continuation_token.as_deref() == Some("t1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&["photos/c"], None)));

        let objects = list_all_objects(&store, "src", "photos/", 2).await.unwrap();
        let keys: Vec<_> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["photos/a", "photos/b", "photos/c"]);
    }

    #[tokio::test]
    async fn test_empty_bucket_is_not_an_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .withf(|_, opts| opts.prefix.is_none())
            .times(1)
            .returning(|_, _| Ok(ListResult::default()));

        let objects = list_all_objects(&store, "src", "", DEFAULT_PAGE_SIZE)
            .await
            .unwrap();
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn test_page_failure_aborts_without_retry() {
        let mut store = MockObjectStore::new();
        let mut seq = Sequence::new();
        store
            .expect_list_objects()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(page(&["a"], Some("t1"))));
        store
            .expect_list_objects()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(Error::Transfer("503 Service Unavailable".into())));

        let err = list_all_objects(&store, "src", "", 1).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
