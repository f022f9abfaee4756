use std::fs;
use std::io::Write;
use tempfile::TempDir;

use prodquery_core::corpus::CorpusLoader;
use prodquery_core::types::DuplicatePolicy;
use prodquery_core::Error;

#[test]
fn load_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("P1.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Router X supports WiFi 6").unwrap();

    let docs = CorpusLoader::new().load(dir).expect("load");

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "P1");
    assert_eq!(docs[0].content, "Router X supports WiFi 6\n", "content is the full text");
    assert!(docs[0].path.ends_with("P1.txt"));
}

#[test]
fn load_is_ordered_and_filters_extensions() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("P3.txt"), "Router X price is $99").unwrap();
    fs::write(dir.join("P1.txt"), "Router X supports WiFi 6").unwrap();
    fs::write(dir.join("P2.TXT"), "Battery Y lasts 10 hours").unwrap();
    fs::write(dir.join("notes.md"), "not part of the catalog").unwrap();

    let docs = CorpusLoader::new().load(dir).expect("load");
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2", "P3"]);
}

#[test]
fn empty_directory_is_an_empty_corpus() {
    let tmp = TempDir::new().unwrap();
    let docs = CorpusLoader::new().load(tmp.path()).expect("load");
    assert!(docs.is_empty());
}

#[test]
fn whitespace_only_files_are_skipped() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("blank.txt"), "  \n\t\n").unwrap();
    fs::write(tmp.path().join("P1.txt"), "Router X supports WiFi 6").unwrap();
    let docs = CorpusLoader::new().load(tmp.path()).expect("load");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "P1");
}

#[test]
fn missing_directory_is_corpus_not_found() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist");
    let err = CorpusLoader::new().load(&missing).unwrap_err();
    assert!(matches!(err, Error::CorpusNotFound { .. }), "got {err:?}");
}

#[test]
fn regular_file_is_corpus_not_found() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("P1.txt");
    fs::write(&file, "Router X").unwrap();
    let err = CorpusLoader::new().load(&file).unwrap_err();
    assert!(matches!(err, Error::CorpusNotFound { .. }), "got {err:?}");
}

#[test]
fn invalid_utf8_fails_the_load() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("P1.txt"), "Router X supports WiFi 6").unwrap();
    fs::write(tmp.path().join("P9.txt"), [b'o', b'k', 0xff, b'!']).unwrap();
    let err = CorpusLoader::new().load(tmp.path()).unwrap_err();
    match err {
        Error::Encoding(msg) => assert!(msg.contains("P9.txt"), "message should name the file: {msg}"),
        other => panic!("expected Encoding, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn symlinked_files_are_loaded() {
    let store = TempDir::new().unwrap();
    let corpus = TempDir::new().unwrap();
    fs::write(store.path().join("P1.txt"), "Router X supports WiFi 6").unwrap();
    std::os::unix::fs::symlink(store.path().join("P1.txt"), corpus.path().join("P1.txt")).unwrap();
    let docs = CorpusLoader::new().load(corpus.path()).expect("load");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "P1");
    assert_eq!(docs[0].content, "Router X supports WiFi 6");
}

fn duplicate_fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("a")).unwrap();
    fs::create_dir_all(tmp.path().join("b")).unwrap();
    fs::write(tmp.path().join("a/P1.txt"), "first router description").unwrap();
    fs::write(tmp.path().join("P2.txt"), "Battery Y lasts 10 hours").unwrap();
    fs::write(tmp.path().join("b/P1.txt"), "second router description").unwrap();
    tmp
}

#[test]
fn duplicate_ids_last_loaded_wins() {
    let tmp = duplicate_fixture();
    let docs = CorpusLoader::new().load(tmp.path()).expect("load");

    let p1: Vec<_> = docs.iter().filter(|d| d.id == "P1").collect();
    assert_eq!(p1.len(), 1, "ids stay unique in the loaded corpus");
    assert_eq!(p1[0].content, "second router description");
    assert_eq!(docs.len(), 2);
}

#[test]
fn duplicate_ids_rejected_when_configured() {
    let tmp = duplicate_fixture();
    let err = CorpusLoader::new()
        .with_duplicate_policy(DuplicatePolicy::Reject)
        .load(tmp.path())
        .unwrap_err();
    match err {
        Error::DuplicateDocumentId { id, first, second } => {
            assert_eq!(id, "P1");
            assert!(first.ends_with("a/P1.txt"));
            assert!(second.ends_with("b/P1.txt"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn load_limited_reads_first_files_only() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "alpha bravo").unwrap();
    fs::write(tmp.path().join("b.txt"), "charlie delta").unwrap();

    let docs = CorpusLoader::new().load_limited(tmp.path(), 1).expect("load limited");
    assert_eq!(docs.len(), 1, "limited to one source document");
    assert_eq!(docs[0].id, "a");
}
