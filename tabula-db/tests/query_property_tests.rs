//! Property-Based Tests for Deferred Queries
//!
//! Ordering, pagination, projection and predicate evaluation, plus the
//! insert/select round-trip for arbitrary schemas.

use proptest::prelude::*;
use tabula_core::{row, ColumnSpec, LikePattern, Row, RowData, Schema, Value};
use tabula_db::{Database, Table};
use tabula_test_utils::assertions::*;
use tabula_test_utils::fixtures::*;
use tabula_test_utils::generators::*;
use tabula_test_utils::MemoryBackend;
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn numbers_schema() -> Schema {
    Schema::builder()
        .column("n", ColumnSpec::integer())
        .column("label", ColumnSpec::text())
        .build()
        .unwrap()
}

async fn numbers_table(values: &[i64]) -> Table {
    let db = Database::with_config("queries", MemoryBackend::new(), lazy_config()).unwrap();
    let table = db.for_table("numbers", numbers_schema()).await.unwrap();
    if !values.is_empty() {
        let rows: Vec<RowData> = values
            .iter()
            .map(|n| row! { "n" => *n, "label" => format!("item-{}", n) })
            .collect();
        table.insert(rows).await.unwrap();
    }
    table
}

fn column(rows: &[Row], name: &str) -> Vec<Value> {
    rows.iter().map(|r| r.get(name).unwrap_or(Value::Null)).collect()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Integer).collect()
}

// ============================================================================
// EXAMPLES
// ============================================================================

#[tokio::test]
async fn test_order_ascending_and_descending() {
    let table = numbers_table(&[3, 1, 2]).await;

    let asc = table.query().order("n", true).get().await.unwrap();
    assert_eq!(column(&asc, "n"), ints(&[1, 2, 3]));

    let desc = table.query().order("n", false).get().await.unwrap();
    assert_eq!(column(&desc, "n"), ints(&[3, 2, 1]));

    let last = table.query().order("n", true).last().await.unwrap();
    assert_eq!(last.and_then(|r| r.get("n")), Some(Value::Integer(3)));
    let first_desc = table.query().sort("n", false).first().await.unwrap();
    assert_eq!(first_desc.and_then(|r| r.get("n")), Some(Value::Integer(3)));
}

#[tokio::test]
async fn test_skip_take_order_independent() {
    let table = numbers_table(&[1, 2, 3, 4, 5]).await;

    let a = table.query().order("n", true).skip(1).take(2).get().await.unwrap();
    let b = table.query().take(2).order("n", true).skip(1).get().await.unwrap();
    assert_eq!(column(&a, "n"), ints(&[2, 3]));
    assert_eq!(a, b);

    assert_eq!(table.query().skip(4).take(10).length().await.unwrap(), 1);
    assert!(table.query().skip(5).get().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_projection_keeps_rowid() {
    let table = numbers_table(&[7]).await;
    let rows = table.query().columns(["label"]).get().await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("label"), Some(Value::from("item-7")));
    assert_eq!(rows[0].get("n"), None);
    assert_eq!(rows[0].rowid, 1);
}

#[tokio::test]
async fn test_predicates() {
    let table = numbers_table(&[1, 2, 3, 4, 5]).await;

    let between = table.query().filter("n", "between", (2, 4)).unwrap();
    assert_eq!(between.count().await.unwrap(), 3);

    let not_in = table.query().filter("n", "not in", vec![1, 5]).unwrap();
    assert_eq!(not_in.count().await.unwrap(), 3);

    let like = table
        .query()
        .filter("label", "LIKE", LikePattern::new("item-_").unwrap())
        .unwrap();
    assert_eq!(like.count().await.unwrap(), 5);

    let combined = table
        .query()
        .filter("n", ">", 1)
        .unwrap()
        .r#where("n", "<=", 3)
        .unwrap();
    assert_eq!(column(&combined.get().await.unwrap(), "n"), ints(&[2, 3]));
    assert!(combined.exists().await.unwrap());
}

#[tokio::test]
async fn test_order_float_column_with_nan() {
    let schema = Schema::builder()
        .column("x", ColumnSpec::float())
        .build()
        .unwrap();
    let db = Database::with_config("queries", MemoryBackend::new(), lazy_config()).unwrap();
    let table = db.for_table("floats", schema).await.unwrap();
    let rows: Vec<RowData> = (0..200)
        .map(|i| {
            let x = if i % 3 == 0 { f64::NAN } else { (200 - i) as f64 };
            row! { "x" => x }
        })
        .collect();
    table.insert(rows).await.unwrap();

    let ordered = table.query().order("x", true).get().await.unwrap();
    assert_eq!(ordered.len(), 200);
    let xs: Vec<f64> = ordered
        .iter()
        .map(|r| match r.get("x") {
            Some(Value::Float(f)) => f,
            other => panic!("Expected a float, got: {:?}", other),
        })
        .collect();
    let (numbers, nans): (Vec<f64>, Vec<f64>) = xs.iter().copied().partition(|f| !f.is_nan());
    assert_eq!(nans.len(), 67);
    assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
    assert!(xs[numbers.len()..].iter().all(|f| f.is_nan()));

    let first = table.query().order("x", true).first().await.unwrap();
    assert_eq!(first.and_then(|r| r.get("x")), Some(Value::Float(1.0)));
}

#[tokio::test]
async fn test_invalid_queries() {
    let table = numbers_table(&[1]).await;

    assert_invalid_argument(&table.query().filter("n", "~", 1));
    assert_invalid_argument(&table.query().filter("n", "between", 1));
    assert_invalid_argument(&table.query().filter("label", "=", 1).unwrap().get().await);

    let unknown = table.query().filter("nope", "=", 1).unwrap().get().await;
    assert!(matches!(
        unknown,
        Err(tabula_core::TabulaError::Query(tabula_core::QueryError::UnknownColumn { .. }))
    ));
    let unknown_order = table.query().order("nope", true).get().await;
    assert!(unknown_order.is_err());
}

#[tokio::test]
async fn test_max_take() {
    let db = Database::with_config(
        "queries",
        MemoryBackend::new(),
        lazy_config().with_max_take(10),
    )
    .unwrap();
    let table = db.for_table("numbers", numbers_schema()).await.unwrap();

    assert!(table.query().take(10).get().await.is_ok());
    assert_invalid_argument(&table.query().take(11).get().await);
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Ordered results are sorted and hold every inserted value.
    #[test]
    fn prop_order_sorts(values in prop::collection::vec(-1000i64..1000, 0..20), ascending in any::<bool>()) {
        let rt = test_runtime()?;
        let got = rt.block_on(async {
            let table = numbers_table(&values).await;
            table.query().order("n", ascending).get().await
        }).map_err(|e| TestCaseError::fail(e.to_string()))?;

        let mut expected = values.clone();
        expected.sort();
        if !ascending {
            expected.reverse();
        }
        prop_assert_eq!(column(&got, "n"), ints(&expected));
    }

    /// A page is the matching slice of the full ordered result.
    #[test]
    fn prop_pagination_slices(
        values in prop::collection::vec(0i64..100, 0..20),
        skip in 0usize..25,
        take in 0usize..25,
    ) {
        let rt = test_runtime()?;
        let (page, all, len) = rt.block_on(async {
            let table = numbers_table(&values).await;
            let page = table.query().order("n", true).skip(skip).take(take).get().await?;
            let all = table.query().order("n", true).get().await?;
            let len = table.query().skip(skip).take(take).length().await?;
            Ok::<_, tabula_core::TabulaError>((page, all, len))
        }).map_err(|e| TestCaseError::fail(e.to_string()))?;

        let expected: Vec<Row> = all.into_iter().skip(skip).take(take).collect();
        prop_assert_eq!(len, expected.len());
        prop_assert_eq!(page, expected);
    }

    /// Whatever validates for a schema reads back as it was stored.
    #[test]
    fn prop_insert_select_round_trip((schema, data) in arb_schema_and_row()) {
        let rt = test_runtime()?;
        let (inserted, read) = rt.block_on(async {
            let db = Database::with_config("roundtrip", MemoryBackend::new(), lazy_config())?;
            let table = db.for_table("t", schema).await?;
            let inserted = table.insert(data).await?.into_vec();
            let read = table.query().get().await?;
            Ok::<_, tabula_core::TabulaError>((inserted, read))
        }).map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(inserted, read);
    }
}
