use deposit::common::ManualClock;
use deposit::deposit::Deposit;
use deposit::errors::DepositResult;
use deposit::schema::{Schema, TableSchema};
use deposit::store::indexed::IndexedFactory;
use deposit::store::AdapterKind;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// Start of the simulated clock in every test context.
pub const CLOCK_START: i64 = 1_700_000_000_000;

/// Runs `test` against a context created by `before`, then hands the context to `after`.
///
/// `after` runs even when the test returns an error, so stores are always closed.
pub fn run_test<B, T, A>(before: B, test: T, after: A)
where
    B: Fn() -> DepositResult<TestContext>,
    T: Fn(TestContext) -> DepositResult<()>,
    A: Fn(TestContext) -> DepositResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(err) => panic!("Before run failed: {:?}", err),
    };
    let kind = ctx.kind();
    let test_result = test(ctx.clone());
    let after_result = after(ctx);

    if let Err(err) = test_result {
        panic!("Test failed on the {} adapter: {:?}", kind, err);
    }
    if let Err(err) = after_result {
        panic!("After run failed on the {} adapter: {:?}", kind, err);
    }
}

/// Runs `test` once per adapter kind, each with a fresh context.
pub fn run_on_both<T>(test: T)
where
    T: Fn(TestContext) -> DepositResult<()>,
{
    for kind in [AdapterKind::Flat, AdapterKind::Indexed] {
        run_test(|| create_test_context(kind), &test, cleanup);
    }
}

#[derive(Clone)]
pub struct TestContext {
    kind: AdapterKind,
    deposit: Deposit,
    clock: ManualClock,
    factory: IndexedFactory,
    // keeps the fjall directory alive for the lifetime of the context
    _dir: Option<Arc<TempDir>>,
}

impl TestContext {
    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    pub fn deposit(&self) -> Deposit {
        self.deposit.clone()
    }

    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    /// The isolated factory backing the indexed adapter of this context.
    pub fn factory(&self) -> IndexedFactory {
        self.factory.clone()
    }
}

/// Tables shared by the integration suites.
pub fn test_schema() -> Schema {
    Schema::new()
        .table("users", TableSchema::new("id").index("city"))
        .table("items", TableSchema::new("id").index("category"))
        .table("accounts", TableSchema::new("id"))
        .table("ledger", TableSchema::new("id"))
}

pub fn create_test_context(kind: AdapterKind) -> DepositResult<TestContext> {
    let clock = ManualClock::new(CLOCK_START);
    let factory = IndexedFactory::new();
    let builder = Deposit::builder()
        .namespace("int-test")
        .schema(test_schema())
        .adapter_kind(kind)
        .clock(clock.clone())
        .indexed_factory(factory.clone());

    let (builder, dir) = match kind {
        AdapterKind::Flat => with_key_value_store(builder)?,
        AdapterKind::Indexed => (builder, None),
    };
    let deposit = builder.open()?;
    deposit.connect()?;

    Ok(TestContext {
        kind,
        deposit,
        clock,
        factory,
        _dir: dir,
    })
}

#[cfg(feature = "fjall")]
fn with_key_value_store(
    builder: deposit::deposit_builder::DepositBuilder,
) -> DepositResult<(deposit::deposit_builder::DepositBuilder, Option<Arc<TempDir>>)> {
    use deposit_fjall_adapter::FjallKeyValueStore;

    let dir = tempfile::tempdir()?;
    let store = FjallKeyValueStore::with_config()
        .low_memory_preset()
        .db_path(&dir.path().to_string_lossy())
        .build()?;
    Ok((builder.key_value_store(store), Some(Arc::new(dir))))
}

#[cfg(not(feature = "fjall"))]
fn with_key_value_store(
    builder: deposit::deposit_builder::DepositBuilder,
) -> DepositResult<(deposit::deposit_builder::DepositBuilder, Option<Arc<TempDir>>)> {
    use deposit::store::flat::InMemoryKeyValueStore;

    Ok((builder.key_value_store(InMemoryKeyValueStore::new()), None))
}

pub fn cleanup(ctx: TestContext) -> DepositResult<()> {
    ctx.deposit().close()
}

/// Three items across two categories.
pub fn items() -> Vec<Value> {
    vec![
        json!({"id": 1, "price": 10, "category": "tools", "name": "Hammer"}),
        json!({"id": 2, "price": 5, "category": "garden", "name": "Rake"}),
        json!({"id": 3, "price": 20, "category": "tools", "name": "Drill"}),
    ]
}

/// Ids of `records`, in order.
pub fn ids(records: &[Value]) -> Vec<Value> {
    records.iter().map(|record| record["id"].clone()).collect()
}
