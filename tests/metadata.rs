use std::{
    collections::HashMap,
    io::ErrorKind,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use reqwest::Url;
use similar_asserts::assert_eq;

use webdisk::{
    escape::escape_for_file_name,
    fetch::{Fetch, FetchError},
    metadata::MetadataStorage,
    object_storage::WebObjectStorage,
    query::QueryScope,
    web::StaticFilesMetadata,
    ErrorCode,
};

const BASE: &str = "https://h/r";

/// A server holding a fixed set of `.index` listings.  Records every requested URL.
#[derive(Default)]
struct FakeServer {
    listings: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FakeServer {
    fn new(listings: &[(&str, &str)]) -> Self {
        Self {
            listings: listings
                .iter()
                .map(|(dir, body)| {
                    let url = if dir.is_empty() {
                        format!("{BASE}/.index")
                    } else {
                        format!("{BASE}/{dir}/.index")
                    };
                    (url, body.to_string())
                })
                .collect(),
            ..Default::default()
        }
    }
}

impl Fetch for FakeServer {
    fn get(&self, url: &Url) -> Result<Option<Vec<u8>>, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(self
            .listings
            .get(url.as_str())
            .map(|body| body.as_bytes().to_vec()))
    }
}

struct Unreachable;

impl Fetch for Unreachable {
    fn get(&self, _url: &Url) -> Result<Option<Vec<u8>>, FetchError> {
        Err(FetchError::Io(std::io::Error::new(
            ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }
}

fn metadata_at(base: &str, fetcher: impl Fetch + 'static) -> StaticFilesMetadata {
    let url = Url::parse(base).unwrap();
    StaticFilesMetadata::new(Arc::new(
        WebObjectStorage::new(url, Box::new(fetcher)).unwrap(),
    ))
}

fn metadata(fetcher: impl Fetch + 'static) -> StaticFilesMetadata {
    metadata_at(BASE, fetcher)
}

fn table_server() -> Arc<FakeServer> {
    Arc::new(FakeServer::new(&[("t", "a.bin\t0\t100\n")]))
}

#[test]
fn test_cold_lookup() {
    let server = table_server();
    let metadata = metadata(Arc::clone(&server));

    assert!(metadata.object_storage().index().is_empty());
    assert!(metadata.exists("t/a.bin"));
    // the file has an extension, so its directory was the one fetched
    assert_eq!(
        *server.requests.lock().unwrap(),
        vec![format!("{BASE}/t/.index")]
    );
    assert!(metadata.is_file("t/a.bin").unwrap());
    assert!(!metadata.is_directory("t/a.bin").unwrap());
    assert_eq!(metadata.file_size("t/a.bin").unwrap(), 100);
}

#[test]
fn test_ancestor_synthesis() {
    let metadata = metadata(table_server());
    assert!(metadata.exists("t/a.bin"));

    assert!(metadata.exists("t"));
    assert!(metadata.is_directory("t").unwrap());
    assert!(!metadata.is_file("t").unwrap());
    assert_eq!(metadata.list_directory(""), ["t", "t/a.bin"]);
    assert_eq!(metadata.iterate_directory("t").unwrap().collect::<Vec<_>>(), ["t/a.bin"]);
    assert_eq!(metadata.iterate_directory("t/").unwrap().collect::<Vec<_>>(), ["t/a.bin"]);

    // the root isn't listed itself, but exists because something below it does
    assert!(metadata.exists(""));
    assert_eq!(metadata.path(), "");
    assert_eq!(
        metadata.file_size("").unwrap_err().code(),
        ErrorCode::FileDoesntExist
    );
}

#[test]
fn test_object_key() {
    let metadata = metadata(table_server());
    let objects = metadata.storage_objects("t/a.bin").unwrap();
    assert_eq!(objects.len(), 1);

    let object = &objects[0];
    assert_eq!(object.remote_path, format!("/t/{}.bin", escape_for_file_name("a")));
    assert_eq!(object.bytes_size, 100);
    assert!(object.is_remote);
    assert_eq!(object.url().as_str(), format!("{BASE}{}", object.remote_path));
    assert_eq!(object.storage.url().as_str(), BASE);
}

#[test]
fn test_object_key_escapes_stem() {
    let server = Arc::new(FakeServer::new(&[(
        "store/part",
        "n.null.bin\t0\t8\ncount.txt\t0\t1\nprimary\t0\t4\n",
    )]));
    let metadata = metadata(server);

    let key = |path: &str| metadata.storage_objects(path).unwrap()[0].remote_path.clone();
    assert_eq!(key("store/part/n.null.bin"), "/store/part/n%2Enull.bin");
    assert_eq!(key("store/part/count.txt"), "/store/part/count.txt");
    assert_eq!(key("store/part/primary"), "/store/part/primary");

    // a static server decodes the URL back into the server-side name
    let object = &metadata.storage_objects("store/part/n.null.bin").unwrap()[0];
    assert_eq!(
        object.url().as_str(),
        format!("{BASE}/store/part/n%252Enull.bin")
    );
}

#[test]
fn test_object_url_is_what_gets_fetched() {
    let server = Arc::new(FakeServer::new(&[("t", "n.null.bin\t0\t2\n")]));
    let metadata = metadata(Arc::clone(&server));

    let object = &metadata.storage_objects("t/n.null.bin").unwrap()[0];
    server.requests.lock().unwrap().clear();
    // nothing is served there, but the request is what matters
    assert!(object.storage.read_object(object).is_err());
    assert_eq!(
        *server.requests.lock().unwrap(),
        [object.url().to_string()]
    );
}

#[test]
fn test_base_url_with_query() {
    let base = "https://h/r?sig=abc";
    let server = Arc::new(FakeServer {
        listings: HashMap::from([(
            "https://h/r/t/.index?sig=abc".to_string(),
            "a.bin\t0\t100\n".to_string(),
        )]),
        ..Default::default()
    });
    let metadata = metadata_at(base, Arc::clone(&server));

    assert!(metadata.exists("t/a.bin"));
    assert_eq!(
        *server.requests.lock().unwrap(),
        ["https://h/r/t/.index?sig=abc"]
    );

    let object = &metadata.storage_objects("t/a.bin").unwrap()[0];
    assert_eq!(object.remote_path, "/t/a.bin");
    assert_eq!(object.url().as_str(), "https://h/r/t/a.bin?sig=abc");
}

/// Every directory lists a subdirectory linking back to itself.
struct SelfLinked;

impl Fetch for SelfLinked {
    fn get(&self, _url: &Url) -> Result<Option<Vec<u8>>, FetchError> {
        Ok(Some(b"loop\t1\n".to_vec()))
    }
}

#[test]
fn test_cyclic_listing() {
    let metadata = metadata(SelfLinked);

    // outside of a query the tree is simply cut off
    assert!(metadata.exists("t"));
    assert!(metadata.is_directory("t/loop/loop").unwrap());

    let _scope = QueryScope::enter();
    let err = metadata.iterate_directory("v").unwrap_err();
    assert_eq!(err.code(), ErrorCode::NetworkError);
    assert!(err.to_string().contains("levels deep"), "{err}");
}

#[test]
fn test_read_only_rejection() {
    let metadata = metadata(table_server());
    assert_eq!(metadata.file_size("t/a.bin").unwrap(), 100);

    let mut transaction = metadata.create_transaction();
    assert_eq!(
        transaction
            .write_string_to_file("t/a.bin", "x")
            .unwrap_err()
            .code(),
        ErrorCode::NotAllowed
    );
    assert_eq!(metadata.file_size("t/a.bin").unwrap(), 100);
}

#[test]
fn test_transaction_policy() {
    let metadata = metadata(table_server());
    assert!(metadata.exists("t/a.bin"));
    let before = metadata.list_directory("");

    let mut tx = metadata.create_transaction();
    let not_allowed = [
        tx.write_string_to_file("t/a.bin", "x"),
        tx.set_last_modified("t/a.bin", SystemTime::now()),
        tx.unlink_file("t/a.bin"),
        tx.remove_recursive("t"),
        tx.remove_directory("t"),
        tx.move_file("t/a.bin", "t/b.bin"),
        tx.move_directory("t", "u"),
        tx.replace_file("t/a.bin", "t/b.bin"),
        tx.set_read_only("t/a.bin"),
        tx.create_hard_link("t/a.bin", "t/b.bin"),
        tx.add_blob_to_metadata("t/a.bin", "blob", 1),
        tx.unlink_metadata("t/a.bin"),
    ];
    for result in not_allowed {
        assert_eq!(result.unwrap_err().code(), ErrorCode::NotAllowed);
    }
    assert_eq!(
        tx.chmod("t/a.bin", 0o644).unwrap_err().code(),
        ErrorCode::NotImplemented
    );

    tx.create_directory("t/new").unwrap();
    tx.create_directory_recursive("t/new/deeper").unwrap();
    tx.create_empty_metadata_file("t/new.bin").unwrap();
    tx.create_metadata_file("t/new.bin", "blob", 10).unwrap();
    tx.commit().unwrap();

    let reads = tx.storage_for_non_transactional_reads();
    assert_eq!(reads.file_size("t/a.bin").unwrap(), 100);
    drop(tx);

    assert_eq!(metadata.list_directory(""), before);
}

#[test]
fn test_noop_mutations() {
    let metadata = metadata(table_server());
    assert!(metadata.exists("t/a.bin"));

    let mut transaction = metadata.create_transaction();
    transaction.create_directory("t/new").unwrap();
    transaction.commit().unwrap();
    assert!(!metadata.exists("t/new"));
}

#[test]
fn test_network_failure() {
    let metadata = metadata(Unreachable);

    // background work: degrade silently
    assert_eq!(metadata.iterate_directory("x").unwrap().count(), 0);
    assert!(!metadata.exists("x"));
    assert!(!metadata.exists("x/a.bin"));
    assert!(!metadata.initialize_if_needed("x", None).unwrap());

    // explicit policy wins over the context
    assert_eq!(
        metadata
            .initialize_if_needed("x", Some(true))
            .unwrap_err()
            .code(),
        ErrorCode::NetworkError
    );

    let _scope = QueryScope::enter();
    let err = metadata.iterate_directory("x").unwrap_err();
    assert_eq!(err.code(), ErrorCode::NetworkError);
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(
        metadata.file_size("x/a.bin").unwrap_err().code(),
        ErrorCode::NetworkError
    );
    // exists() never escalates
    assert!(!metadata.exists("x"));
    assert!(!metadata.initialize_if_needed("x", Some(false)).unwrap());
}

#[test]
fn test_empty_index() {
    let metadata = metadata(Arc::new(FakeServer::default()));
    for path in ["", "t", "t/a.bin", "/"] {
        assert!(!metadata.exists(path));
    }
    assert!(metadata.list_directory("").is_empty());

    let err = metadata.is_file("t/a.bin").unwrap_err();
    assert_eq!(err.code(), ErrorCode::FileDoesntExist);
    assert!(err.to_string().starts_with("There is no path t/a.bin"));
}

#[test]
fn test_missing_file_lists_known_files_in_debug() {
    let metadata = metadata(table_server());
    let err = metadata.file_size("t/b.bin").unwrap_err();
    if cfg!(debug_assertions) {
        assert_eq!(
            err.to_string(),
            "There is no path t/b.bin (available files: t, t/a.bin)"
        );
    } else {
        assert_eq!(err.to_string(), "There is no path t/b.bin");
    }
}

#[test]
fn test_list_vs_iterate() {
    let server = Arc::new(FakeServer::new(&[
        ("", "store\t1\n"),
        ("store", "p1\t1\np2\t1\n"),
        ("store/p1", "a.bin\t0\t1\n"),
        ("store/p2", "b.bin\t0\t2\nproj\t1\n"),
        ("store/p2/proj", "c.bin\t0\t3\n"),
    ]));
    let metadata = metadata(server);

    assert_eq!(
        metadata.iterate_directory("").unwrap().collect::<Vec<_>>(),
        ["store"]
    );
    assert_eq!(
        metadata.iterate_directory("store/p2").unwrap().collect::<Vec<_>>(),
        ["store/p2/b.bin", "store/p2/proj"]
    );
    assert_eq!(
        metadata.list_directory("store/p2"),
        ["store/p2", "store/p2/b.bin", "store/p2/proj", "store/p2/proj/c.bin"]
    );
    assert_eq!(metadata.last_modified("store"), SystemTime::UNIX_EPOCH);
    assert_eq!(metadata.last_changed("store"), 0);
    assert_eq!(metadata.hardlink_count("store/p1/a.bin"), 1);
    assert_eq!(
        metadata.read_file_to_string("store/p1/a.bin").unwrap_err().code(),
        ErrorCode::NotAllowed
    );
    assert_eq!(
        metadata
            .serialized_metadata(&["store/p1/a.bin".to_string()])
            .unwrap_err()
            .code(),
        ErrorCode::NotImplemented
    );
}

#[test]
fn test_snapshot_iterator() {
    let server = Arc::new(FakeServer::new(&[("t", "a.bin\t0\t1\n"), ("u", "b.bin\t0\t2\n")]));
    let metadata = metadata(server);

    let iter = metadata.iterate_directory("t").unwrap();
    // grow the index while the iterator is alive
    assert!(metadata.exists("u/b.bin"));
    assert_eq!(iter.collect::<Vec<_>>(), ["t/a.bin"]);
}

#[test]
fn test_invariants() {
    let server = Arc::new(FakeServer::new(&[
        ("", "db\t1\n"),
        ("db", "t1\t1\nt2\t1\n"),
        ("db/t1", "all_1_1_0\t1\nformat_version.txt\t0\t1\n"),
        ("db/t1/all_1_1_0", "data.bin\t0\t42\nchecksums.txt\t0\t7\n"),
        ("db/t2", ""),
    ]));
    let metadata = metadata(server);

    let paths = [
        "",
        "db",
        "db/t1",
        "db/t2",
        "db/t1/all_1_1_0",
        "db/t1/all_1_1_0/data.bin",
        "db/t1/format_version.txt",
        "db/t3",
        "db/t1/missing.bin",
        "zzz",
    ];
    let mut seen_true = vec![];

    // a cold pass, then a pass after loading everything: nothing that existed may disappear
    for round in 0..2 {
        for path in paths {
            let exists = metadata.exists(path);
            if seen_true.contains(&path) {
                assert!(exists, "{path} stopped existing in round {round}");
            }
            if exists {
                seen_true.push(path);
            }
        }
        metadata.assert_exists("").unwrap();
    }

    let keys = metadata.list_directory("");
    for key in &keys {
        // exactly one classification for indexed paths
        let file = metadata.is_file(key).unwrap();
        let dir = metadata.is_directory(key).unwrap();
        assert!(file != dir, "{key}");

        // every ancestor exists
        let mut ancestor = key.as_str();
        while let Some(pos) = ancestor.rfind('/') {
            ancestor = &ancestor[..pos];
            assert!(metadata.exists(ancestor), "{ancestor} (from {key})");
        }

        if file {
            let object = &metadata.storage_objects(key).unwrap()[0];
            assert_eq!(format!("{BASE}{}", object.remote_path), object.url().as_str());
            assert!(object.url().as_str().starts_with(BASE));
        }
    }
    assert!(keys.contains(&"db/t2".to_string()));
    assert!(!metadata.exists("db/t3"));
}
