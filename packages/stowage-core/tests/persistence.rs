//! Integration tests running the same scenarios against both backends.

use std::path::Path;

use ntest::timeout;
use tempfile::tempdir;

use stowage_core::{BackendKind, Database, Predicate, StoreConfig, StoreError};
use stowage_types::{
    enum_field, CodecError, DeclaredType, FieldDef, FieldValue, Filter, Record, Uuid, Value,
};

const BACKENDS: [BackendKind; 2] = [BackendKind::Sqlite, BackendKind::FlatFile];

#[derive(Debug, Clone, PartialEq, Default)]
struct Player {
    id: i32,
    name: String,
    active: bool,
}

impl Record for Player {
    const NAME: &'static str = "Player";

    fn fields() -> Vec<FieldDef<Self>> {
        vec![
            FieldDef::new("Id", |p: &Player| &p.id, |p| &mut p.id)
                .primary_key()
                .auto_increment(),
            FieldDef::new("Name", |p: &Player| &p.name, |p| &mut p.name),
            FieldDef::new("Active", |p: &Player| &p.active, |p| &mut p.active),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Shape {
    #[default]
    Circle,
    Square,
    Triangle,
}

enum_field!(Shape {
    Circle = 0,
    Square = 4,
    Triangle = 3
});

#[derive(Debug, Clone, PartialEq, Default)]
struct Sample {
    id: i64,
    shape: Shape,
    token: Uuid,
    small: i8,
    tiny: u8,
    short: i16,
    ushort: u16,
    medium: i32,
    umedium: u32,
    large: u64,
    ratio: f32,
    precise: f64,
    flag: bool,
    label: String,
    note: Option<String>,
    limit: Option<u32>,
}

impl Record for Sample {
    const NAME: &'static str = "Sample";

    fn fields() -> Vec<FieldDef<Self>> {
        vec![
            FieldDef::new("Id", |s: &Sample| &s.id, |s| &mut s.id).primary_key(),
            FieldDef::new("Shape", |s: &Sample| &s.shape, |s| &mut s.shape),
            FieldDef::new("Token", |s: &Sample| &s.token, |s| &mut s.token),
            FieldDef::new("Small", |s: &Sample| &s.small, |s| &mut s.small),
            FieldDef::new("Tiny", |s: &Sample| &s.tiny, |s| &mut s.tiny),
            FieldDef::new("Short", |s: &Sample| &s.short, |s| &mut s.short),
            FieldDef::new("UShort", |s: &Sample| &s.ushort, |s| &mut s.ushort),
            FieldDef::new("Medium", |s: &Sample| &s.medium, |s| &mut s.medium),
            FieldDef::new("UMedium", |s: &Sample| &s.umedium, |s| &mut s.umedium),
            FieldDef::new("Large", |s: &Sample| &s.large, |s| &mut s.large),
            FieldDef::new("Ratio", |s: &Sample| &s.ratio, |s| &mut s.ratio),
            FieldDef::new("Precise", |s: &Sample| &s.precise, |s| &mut s.precise),
            FieldDef::new("Flag", |s: &Sample| &s.flag, |s| &mut s.flag),
            FieldDef::new("Label", |s: &Sample| &s.label, |s| &mut s.label),
            FieldDef::new("Note", |s: &Sample| &s.note, |s| &mut s.note),
            FieldDef::new("Limit", |s: &Sample| &s.limit, |s| &mut s.limit),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Decimal(String);

impl FieldValue for Decimal {
    const DECLARED: DeclaredType = DeclaredType::Named("Decimal");

    fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        String::from_value(value).map(Decimal)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Invoice {
    id: i32,
    amount: Decimal,
}

impl Record for Invoice {
    const NAME: &'static str = "Invoice";

    fn fields() -> Vec<FieldDef<Self>> {
        vec![
            FieldDef::new("Id", |i: &Invoice| &i.id, |i| &mut i.id).primary_key(),
            FieldDef::new("Amount", |i: &Invoice| &i.amount, |i| &mut i.amount),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Event {
    message: String,
}

impl Record for Event {
    const NAME: &'static str = "Event";

    fn fields() -> Vec<FieldDef<Self>> {
        vec![FieldDef::new("Message", |e: &Event| &e.message, |e| &mut e.message)]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Item {
    id: i32,
    tag: String,
}

impl Record for Item {
    const NAME: &'static str = "Item";

    fn fields() -> Vec<FieldDef<Self>> {
        vec![
            FieldDef::new("Id", |i: &Item| &i.id, |i| &mut i.id).primary_key(),
            FieldDef::new("Tag", |i: &Item| &i.tag, |i| &mut i.tag),
        ]
    }
}

/// Same table name as `Item`, with an assigned key and an optional tag.
#[derive(Debug, Clone, PartialEq, Default)]
struct ItemV2 {
    id: i32,
    tag: Option<String>,
}

impl Record for ItemV2 {
    const NAME: &'static str = "Item";

    fn fields() -> Vec<FieldDef<Self>> {
        vec![
            FieldDef::new("Id", |i: &ItemV2| &i.id, |i| &mut i.id)
                .primary_key()
                .auto_increment(),
            FieldDef::new("Tag", |i: &ItemV2| &i.tag, |i| &mut i.tag),
        ]
    }
}

fn open(kind: BackendKind, dir: &Path) -> Database {
    let config = StoreConfig {
        flat_file_sync: false,
        ..StoreConfig::with_data_dir(dir)
    };
    Database::create(kind, "game", &config).unwrap()
}

fn sample(id: i64) -> Sample {
    Sample {
        id,
        shape: Shape::Square,
        token: Uuid::from_u128(0xfeed_beef_u128 + id as u128),
        small: -100,
        tiny: 250,
        short: -30_000,
        ushort: 60_000,
        medium: i32::MIN,
        umedium: u32::MAX,
        large: 1 << 40,
        ratio: 0.1,
        precise: std::f64::consts::PI,
        flag: true,
        label: "héllo \"world\"".to_string(),
        note: None,
        limit: Some(7),
    }
}

#[timeout(5000)]
#[test]
fn test_player_example() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());
        db.create_table::<Player>().unwrap();

        let assigned = db
            .insert(&Player {
                id: 0,
                name: "alpha".to_string(),
                active: true,
            })
            .unwrap();
        assert_eq!(assigned, Some(1), "backend {}", kind);

        let found: Option<Player> = db.find(Filter::eq("Id", 1)).unwrap();
        assert_eq!(
            found,
            Some(Player {
                id: 1,
                name: "alpha".to_string(),
                active: true,
            }),
            "backend {}",
            kind
        );
    }
}

#[timeout(5000)]
#[test]
fn test_round_trip_all_field_types() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());
        db.create_table::<Sample>().unwrap();

        let first = sample(10);
        let mut second = sample(11);
        second.note = Some(String::new());
        second.limit = None;
        second.shape = Shape::Triangle;

        assert_eq!(db.insert(&first).unwrap(), None);
        assert_eq!(db.insert(&second).unwrap(), None);

        let found: Option<Sample> = db.find(Filter::eq("Id", 10i64)).unwrap();
        assert_eq!(found, Some(first), "backend {}", kind);

        let found: Option<Sample> = db.find(Filter::eq("Id", 11i64)).unwrap();
        assert_eq!(found, Some(second), "backend {}", kind);
    }
}

#[timeout(5000)]
#[test]
fn test_find_on_empty_table() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());
        db.create_table::<Player>().unwrap();

        let found: Option<Player> = db.find(Filter::All).unwrap();
        assert_eq!(found, None, "backend {}", kind);

        let found: Option<Player> = db.find(Predicate::test(|p: &Player| p.active)).unwrap();
        assert_eq!(found, None, "backend {}", kind);
    }
}

#[timeout(5000)]
#[test]
fn test_find_returns_first_in_insertion_order() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());
        db.create_table::<Player>().unwrap();

        for (name, active) in [("a", false), ("b", true), ("c", true)] {
            db.insert(&Player {
                name: name.to_string(),
                active,
                ..Default::default()
            })
            .unwrap();
        }

        let found: Option<Player> = db.find(Filter::eq("Active", true)).unwrap();
        assert_eq!(found.map(|p| p.name), Some("b".to_string()), "backend {}", kind);

        let found: Option<Player> = db
            .find(Predicate::test(|p: &Player| p.name.as_str() > "a" && p.id > 2))
            .unwrap();
        assert_eq!(found.map(|p| p.name), Some("c".to_string()), "backend {}", kind);

        let found: Option<Player> = db
            .find(Filter::eq("Name", "a".to_string()).or(Filter::gt("Id", 2)))
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(1), "backend {}", kind);
    }
}

#[timeout(5000)]
#[test]
fn test_update_by_primary_key() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());
        db.create_table::<Player>().unwrap();
        db.insert(&Player {
            name: "alpha".to_string(),
            ..Default::default()
        })
        .unwrap();

        let renamed = Player {
            id: 1,
            name: "omega".to_string(),
            active: true,
        };
        assert_eq!(db.update(&renamed).unwrap(), 1, "backend {}", kind);

        let found: Option<Player> = db.find(Filter::eq("Id", 1)).unwrap();
        assert_eq!(found, Some(renamed), "backend {}", kind);
    }
}

#[timeout(5000)]
#[test]
fn test_update_of_missing_key_diverges_between_backends() {
    let ghost = Player {
        id: 99,
        name: "ghost".to_string(),
        active: false,
    };

    let temp_dir = tempdir().unwrap();
    let db = open(BackendKind::Sqlite, temp_dir.path());
    db.create_table::<Player>().unwrap();
    assert!(matches!(
        db.update(&ghost),
        Err(StoreError::RecordNotFound { .. })
    ));

    let temp_dir = tempdir().unwrap();
    let db = open(BackendKind::FlatFile, temp_dir.path());
    db.create_table::<Player>().unwrap();
    assert_eq!(db.update(&ghost).unwrap(), 0);
    let found: Option<Player> = db.find(Filter::All).unwrap();
    assert_eq!(found, None);
}

#[timeout(5000)]
#[test]
fn test_update_without_key_field_diverges_between_backends() {
    let event = Event {
        message: "boot".to_string(),
    };

    let temp_dir = tempdir().unwrap();
    let db = open(BackendKind::Sqlite, temp_dir.path());
    db.create_table::<Event>().unwrap();
    db.insert(&event).unwrap();
    assert!(matches!(
        db.update(&event),
        Err(StoreError::MissingPrimaryKey { .. })
    ));

    let temp_dir = tempdir().unwrap();
    let db = open(BackendKind::FlatFile, temp_dir.path());
    db.create_table::<Event>().unwrap();
    db.insert(&event).unwrap();
    assert_eq!(db.update(&event).unwrap(), 0);
}

#[timeout(5000)]
#[test]
fn test_unsupported_field_type_leaves_no_artifact() {
    let temp_dir = tempdir().unwrap();
    let db = open(BackendKind::FlatFile, temp_dir.path());
    assert!(matches!(
        db.create_table::<Invoice>(),
        Err(StoreError::UnsupportedFieldType { ref field, .. }) if field == "Amount"
    ));
    assert!(!temp_dir.path().join("Invoice.fdb").exists());

    let temp_dir = tempdir().unwrap();
    let db = open(BackendKind::Sqlite, temp_dir.path());
    assert!(matches!(
        db.create_table::<Invoice>(),
        Err(StoreError::UnsupportedFieldType { .. })
    ));
    drop(db);

    let conn = rusqlite::Connection::open(temp_dir.path().join("game.sqlite3")).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'Invoice'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 0);
}

#[timeout(5000)]
#[test]
fn test_operations_on_missing_table() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());

        assert!(
            matches!(
                db.insert(&Player::default()),
                Err(StoreError::TableNotFound { .. })
            ),
            "backend {}",
            kind
        );
        assert!(
            matches!(
                db.find::<Player>(Filter::All),
                Err(StoreError::TableNotFound { .. })
            ),
            "backend {}",
            kind
        );
    }
}

#[timeout(5000)]
#[test]
fn test_unknown_filter_field() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());
        db.create_table::<Player>().unwrap();

        assert!(
            matches!(
                db.find::<Player>(Filter::eq("Score", 1)),
                Err(StoreError::UnknownField { ref field, .. }) if field == "Score"
            ),
            "backend {}",
            kind
        );
    }
}

#[timeout(5000)]
#[test]
fn test_data_survives_reopen() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        {
            let db = open(kind, temp_dir.path());
            db.create_table::<Player>().unwrap();
            db.insert(&Player {
                name: "kept".to_string(),
                active: true,
                ..Default::default()
            })
            .unwrap();
        }

        let db = open(kind, temp_dir.path());
        db.create_table::<Player>().unwrap();
        assert_eq!(db.insert(&Player::default()).unwrap(), Some(2), "backend {}", kind);

        let found: Option<Player> = db.find(Filter::eq("Name", "kept".to_string())).unwrap();
        assert_eq!(found.map(|p| p.id), Some(1), "backend {}", kind);
    }
}

#[timeout(5000)]
#[test]
fn test_storage_paths() {
    let temp_dir = tempdir().unwrap();

    let db = open(BackendKind::Sqlite, temp_dir.path());
    db.create_table::<Player>().unwrap();
    assert!(temp_dir.path().join("game.sqlite3").exists());

    let db = open(BackendKind::FlatFile, temp_dir.path());
    assert!(!temp_dir.path().join("Player.fdb").exists());
    db.create_table::<Player>().unwrap();
    assert!(temp_dir.path().join("Player.fdb").exists());
}

#[timeout(5000)]
#[test]
fn test_invalid_base_path() {
    let temp_dir = tempdir().unwrap();
    let file_path = temp_dir.path().join("not-a-dir");
    std::fs::write(&file_path, b"x").unwrap();

    for kind in BACKENDS {
        let config = StoreConfig::with_data_dir(&file_path);
        assert!(
            matches!(
                Database::create(kind, "game", &config),
                Err(StoreError::InvalidBasePath { .. })
            ),
            "backend {}",
            kind
        );
    }
}

#[test]
fn test_closure_predicate_over_decoded_records() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    for kind in BACKENDS {
        let db = Database::create(
            kind,
            "shapes",
            &StoreConfig::with_data_dir(temp_dir.path().join(kind.to_string())),
        )?;
        db.create_table::<Sample>()?;
        for id in 1..=3 {
            let mut record = sample(id);
            record.shape = if id == 2 { Shape::Circle } else { Shape::Square };
            db.insert(&record)?;
        }

        let found: Option<Sample> = db.find(Predicate::test(|s: &Sample| s.shape == Shape::Circle))?;
        assert_eq!(found.map(|s| s.id), Some(2), "backend {}", kind);
    }
    Ok(())
}

#[timeout(5000)]
#[test]
fn test_changed_key_and_null_flags_rejected() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        {
            let db = open(kind, temp_dir.path());
            db.create_table::<Item>().unwrap();
            db.insert(&Item {
                id: 1,
                tag: "first".to_string(),
            })
            .unwrap();
        }

        let db = open(kind, temp_dir.path());
        assert!(
            matches!(
                db.create_table::<ItemV2>(),
                Err(StoreError::SchemaMismatch { .. })
            ),
            "backend {}",
            kind
        );
        db.create_table::<Item>().unwrap();
        let found: Option<Item> = db.find(Filter::eq("Id", 1)).unwrap();
        assert_eq!(found.map(|item| item.tag), Some("first".to_string()));
    }
}

#[timeout(5000)]
#[test]
fn test_types_sharing_a_name_keep_their_own_schema() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());

        assert_eq!(db.schema::<Item>().unwrap().auto_increment_field(), None);
        let v2 = db.schema::<ItemV2>().unwrap();
        assert!(v2.auto_increment_field().is_some(), "backend {}", kind);
        assert!(v2.field("Tag").unwrap().nullable, "backend {}", kind);

        db.create_table::<Item>().unwrap();
        assert!(
            matches!(
                db.create_table::<ItemV2>(),
                Err(StoreError::SchemaMismatch { .. })
            ),
            "backend {}",
            kind
        );
    }
}

#[timeout(5000)]
#[test]
fn test_duplicate_primary_key_is_write_error() {
    for kind in BACKENDS {
        let temp_dir = tempdir().unwrap();
        let db = open(kind, temp_dir.path());
        db.create_table::<Sample>().unwrap();
        db.insert(&sample(7)).unwrap();

        assert!(
            matches!(
                db.insert(&sample(7)),
                Err(StoreError::StorageWrite { .. })
            ),
            "backend {}",
            kind
        );
        let mut second = sample(8);
        second.label = "second".to_string();
        db.insert(&second).unwrap();
        let found: Option<Sample> = db.find(Filter::eq("Id", 8)).unwrap();
        assert_eq!(found, Some(second), "backend {}", kind);
    }
}
