// tests/budget_concurrency.rs
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use satire_desk::budget::TokenBudget;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_consumers_never_overdraw() {
    let budget = Arc::new(TokenBudget::new(20, 10));
    let granted = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let b = budget.clone();
        let g = granted.clone();
        handles.push(tokio::spawn(async move {
            tokio::task::yield_now().await;
            if b.try_consume(1) {
                g.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(granted.load(Ordering::SeqCst), 20);
    assert_eq!(budget.remaining(), 0);
    assert!(!budget.try_consume(1));
}

#[test]
fn threads_taking_multiple_tokens() {
    let budget = Arc::new(TokenBudget::new(10, 1));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let b = budget.clone();
            std::thread::spawn(move || b.try_consume(3))
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count() as u32;
    assert_eq!(wins, 3);
    assert_eq!(budget.remaining(), 1);

    budget.reset_daily();
    assert_eq!(budget.remaining(), 10);
}
