//! Round trips through fjall-backed caches opened from locators

use kvdump::archive::WriterOptions;
use kvdump::commands::{self, Command, ExportCommand, ImportCommand, ListOptions, ShowMode};
use kvdump::store::{self, Locator, StoreConnector};
use kvdump::transfer::ExportOptions;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn locator(temp_dir: &TempDir, keyspace: &str, cache: &str) -> Locator {
    format!("fjall://{}/{}/{}", temp_dir.path().display(), keyspace, cache)
        .parse()
        .unwrap()
}

async fn execute(command: Command, store: &dyn StoreConnector) -> String {
    let mut out = Vec::new();
    commands::execute(&command, store, &mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn test_export_import_between_caches() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("people.kvda");

    let mut expected = BTreeMap::new();
    for i in 0..300 {
        expected.insert(
            bytes::Bytes::from(format!("person:{:03}", i)),
            bytes::Bytes::from(format!("name-{}", i)),
        );
    }

    {
        let source = store::connect(&locator(&temp_dir, "source", "people"), 31).unwrap();
        source.bulk_put(&expected).await.unwrap();
        source.sync().await.unwrap();

        let export = Command::Export(ExportCommand {
            file: archive.clone(),
            writer: WriterOptions::default(),
            transfer: ExportOptions {
                batch_limit: 50,
                ..ExportOptions::default()
            },
        });
        assert_eq!(execute(export, source.as_ref()).await, "Entry count: 300\n");
    }

    let target = store::connect(&locator(&temp_dir, "target", "people_copy"), 31).unwrap();
    let import = Command::Import(ImportCommand {
        file: archive,
        batch_limit: 64,
    });
    assert_eq!(execute(import, target.as_ref()).await, "Imported: 300 entries\n");
    assert_eq!(target.size(None).await.unwrap(), 300);

    let keys: Vec<bytes::Bytes> = expected.keys().cloned().collect();
    let fetched = target.bulk_get(&keys).await.unwrap();
    for (key, value) in fetched {
        assert_eq!(value.as_ref(), expected.get(&key));
    }
}

#[tokio::test]
async fn test_list_entries_from_local_cache() {
    let temp_dir = TempDir::new().unwrap();
    let cache = store::connect(&locator(&temp_dir, "store", "colors"), 1).unwrap();

    let mut pairs = BTreeMap::new();
    pairs.insert(bytes::Bytes::from("blue"), bytes::Bytes::from("#0000ff"));
    pairs.insert(bytes::Bytes::from("red"), bytes::Bytes::from("#ff0000"));
    cache.bulk_put(&pairs).await.unwrap();

    let list = Command::List(ListOptions {
        show: ShowMode::Entries,
        predicate: Some("key != 'red'".parse().unwrap()),
        ..ListOptions::default()
    });
    assert_eq!(execute(list, cache.as_ref()).await, "blue --> #0000ff\n");
}
