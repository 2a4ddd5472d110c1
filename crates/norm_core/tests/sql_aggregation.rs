use norm_core::db::open_db_in_memory;
use norm_core::{group, lookup, new_view, Context, ErrorKind, Keyable, ScanShape, StoreConfig};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Author {
    id: i64,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Book {
    id: i64,
    author_id: i64,
    title: String,
}

impl Keyable<i64> for Author {
    fn key(&self) -> i64 {
        self.id
    }
}

impl Keyable<i64> for Book {
    fn key(&self) -> i64 {
        self.author_id
    }
}

#[derive(Debug, Clone, Serialize)]
struct NoArgs {}

#[derive(Debug, Clone, Serialize)]
struct MinId {
    min_id: i64,
}

fn setup() -> Connection {
    let conn = open_db_in_memory(&StoreConfig::default()).unwrap();
    conn.execute_batch(
        "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
        CREATE TABLE books (
            id INTEGER PRIMARY KEY,
            author_id INTEGER NOT NULL,
            title TEXT NOT NULL
        );
        INSERT INTO authors (id, name) VALUES (1, 'ada'), (2, 'brian'), (3, 'carol');
        INSERT INTO books (id, author_id, title) VALUES
            (10, 1, 'engines'),
            (11, 3, 'compilers'),
            (12, 1, 'notes'),
            (13, 4, 'orphan');",
    )
    .unwrap();
    conn
}

#[test]
fn lookup_joins_sql_views_in_left_order() {
    let conn = setup();
    let authors = new_view::<Vec<Author>, MinId>(
        &conn,
        ScanShape::Rows,
        "SELECT id, name FROM authors WHERE id >= {{ .A.min_id }} ORDER BY id;",
    );
    let books = new_view::<Vec<Book>, NoArgs>(
        &conn,
        ScanShape::Rows,
        "SELECT id, author_id, title FROM books ORDER BY id;",
    );

    let merged = lookup(&Context::new(), &authors, &MinId { min_id: 1 }, &books, &NoArgs {}).unwrap();

    let left: Vec<&str> = merged.iter().map(|m| m.left.name.as_str()).collect();
    assert_eq!(left, vec!["ada", "brian", "carol"]);

    let ada: Vec<&str> = merged[0].right.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(ada, vec!["engines", "notes"]);
    assert!(merged[1].right.is_empty());
    assert_eq!(merged[1].right.capacity(), 0);
    assert_eq!(merged[2].right.len(), 1);
    assert_eq!(merged[2].right[0].title, "compilers");
}

#[test]
fn lookup_attributes_failures_to_their_side() {
    let conn = setup();
    let authors = new_view::<Vec<Author>, NoArgs>(
        &conn,
        ScanShape::Rows,
        "SELECT id, name FROM authors ORDER BY id;",
    );
    let broken_books = new_view::<Vec<Book>, NoArgs>(
        &conn,
        ScanShape::Rows,
        "SELECT id, author_id, title FROM missing_books;",
    );
    let broken_authors = new_view::<Vec<Author>, NoArgs>(
        &conn,
        ScanShape::Rows,
        "SELECT id, name FROM authors WHERE id = {{ .A.id }};",
    );
    let ctx = Context::new();

    let err = lookup(&ctx, &authors, &NoArgs {}, &broken_books, &NoArgs {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RightFetch);
    assert_eq!(err.root().kind(), ErrorKind::Prepare);

    let err = lookup(&ctx, &broken_authors, &NoArgs {}, &broken_books, &NoArgs {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LeftFetch);
    assert_eq!(err.root().kind(), ErrorKind::TemplateCompile);
}

#[test]
fn group_partitions_sql_rows_by_key() {
    let conn = setup();
    let books = new_view::<Vec<Book>, NoArgs>(
        &conn,
        ScanShape::Rows,
        "SELECT id, author_id, title FROM books ORDER BY id;",
    );

    let groups = group(&Context::new(), &books, &NoArgs {}).unwrap();

    assert_eq!(groups.len(), 3);
    let ids: Vec<i64> = groups[&1].iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![10, 12]);
    assert_eq!(groups[&3].len(), 1);
    assert_eq!(groups[&4][0].title, "orphan");
    assert!(!groups.contains_key(&2));
}

#[test]
fn group_over_empty_result_is_empty() {
    let conn = setup();
    let books = new_view::<Vec<Book>, MinId>(
        &conn,
        ScanShape::Rows,
        "SELECT id, author_id, title FROM books WHERE id >= {{ .A.min_id }};",
    );

    let groups = group(&Context::new(), &books, &MinId { min_id: 1000 }).unwrap();
    assert!(groups.is_empty());
}
