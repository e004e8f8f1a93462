//! Basic pool usage.
//!
//! Uses the in-memory connections from `sqlpool-testing`, so it runs without
//! a database:
//!
//! ```bash
//! RUST_LOG=sqlpool=debug cargo run -p sqlpool --example basic
//! ```

use std::thread;
use std::time::Duration;

use sqlpool::{Connection, IsolationLevel, Pool, PoolError};
use sqlpool_testing::MockFactory;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("sqlpool=info".parse()?),
        )
        .init();

    let factory = MockFactory::new();
    let pool = Pool::builder(factory.clone())
        .url("mock://localhost/inventory")
        .username("app")
        .password("secret")
        .max_active_connections(4)
        .max_idle_connections(2)
        .max_checkout_time(Duration::from_secs(5))
        .ping_enabled(true)
        .ping_query("SELECT 1")
        .ping_connections_not_used_for(Duration::from_secs(60))
        .build()?;

    {
        let mut conn = pool.get()?;
        conn.set_transaction_isolation(IsolationLevel::Serializable)?;
        conn.execute("UPDATE stock SET reserved = reserved + 1 WHERE sku = 'A-1'")?;
        println!("connection {} checked out", conn.id());
        // Dropping the handle returns the connection to the pool.
    }

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let pool = pool.clone();
            thread::spawn(move || -> Result<(), PoolError> {
                let mut conn = pool.get()?;
                conn.execute(&format!("SELECT * FROM orders WHERE worker = {worker}"))?;
                thread::sleep(Duration::from_millis(20));
                conn.close()
            })
        })
        .collect();
    for worker in workers {
        if let Err(e) = worker.join().map_err(|_| "worker panicked")? {
            eprintln!("worker failed: {e}");
        }
    }

    println!("{:?}", pool.status());
    println!("{}", pool.metrics());

    pool.close();
    println!(
        "opened {} connections, {} still open",
        factory.opened(),
        factory.open_count()
    );
    Ok(())
}
