mod common;

use common::{assert_chain_invariants, difficulty};
use minechain_core::{
    chain, default_payloads, Attempt, Coordinator, Ledger, Miner, MiningConfig, SearchMode,
};
use rand::{distributions::Alphanumeric, Rng};
use std::{collections::HashSet, sync::Arc, thread};

#[test]
fn test_default_pool_builds_valid_chain() -> anyhow::Result<()> {
    let config = MiningConfig::default().with_difficulty(difficulty(2));
    let report = Coordinator::new(config).run_default()?;

    assert_eq!(report.chain.len(), 6);
    assert_chain_invariants(&report.chain, difficulty(2));

    let payloads: HashSet<&str> = report.chain[1..].iter().map(|b| b.payload.as_str()).collect();
    let expected = default_payloads(5);
    let expected: HashSet<&str> = expected.iter().map(String::as_str).collect();
    assert_eq!(payloads, expected);
    Ok(())
}

#[test]
fn test_no_duplicate_index_under_contention() -> anyhow::Result<()> {
    // Many workers at a trivial difficulty collide often.
    let mut rng = rand::thread_rng();
    let payloads: Vec<String> = (0..16)
        .map(|_| (&mut rng).sample_iter(&Alphanumeric).take(12).map(char::from).collect())
        .collect();

    let config = MiningConfig::default().with_difficulty(difficulty(1));
    let report = Coordinator::new(config).run(payloads.clone())?;

    assert_eq!(report.chain.len(), 1 + payloads.len());
    assert_chain_invariants(&report.chain, difficulty(1));

    let indices: HashSet<u64> = report.chain.iter().map(|b| b.index).collect();
    assert_eq!(indices.len(), report.chain.len());
    let claimed: HashSet<u64> = report.reports.iter().map(|r| r.block.index).collect();
    assert_eq!(claimed.len(), payloads.len());
    Ok(())
}

#[test]
fn test_parallel_search_mode_pool() -> anyhow::Result<()> {
    let config = MiningConfig::default()
        .with_difficulty(difficulty(2))
        .with_search_mode(SearchMode::Parallel);
    let report = Coordinator::new(config).run(["X", "Y", "Z"])?;
    assert_eq!(report.chain.len(), 4);
    assert!(chain::verify(&report.chain, difficulty(2)).is_ok());
    Ok(())
}

#[test]
fn test_snapshots_during_mining_are_prefixes() -> anyhow::Result<()> {
    let ledger = Arc::new(Ledger::new(difficulty(2)));

    let miners: Vec<_> = (1..=6)
        .map(|id| {
            let miner = Miner::new(id, format!("payload-{id}"), Arc::clone(&ledger));
            thread::spawn(move || miner.run())
        })
        .collect();

    let mut seen = Vec::new();
    while seen.len() < 50 {
        let snap = ledger.snapshot();
        assert_chain_invariants(&snap, difficulty(2));
        seen.push(snap);
        thread::yield_now();
    }

    for miner in miners {
        miner.join().expect("miner thread")?;
    }

    let last = ledger.snapshot();
    assert_eq!(last.len(), 7);
    for snap in seen {
        assert!(snap.len() <= last.len());
        assert_eq!(&last[..snap.len()], &snap[..]);
    }
    assert_eq!(ledger.snapshot(), last);
    Ok(())
}

#[test]
fn test_two_worker_scenario_serialized() -> anyhow::Result<()> {
    let ledger = Arc::new(Ledger::new(difficulty(1)));
    assert_eq!(ledger.tip().hash.to_string(), "0".repeat(64));

    let mut x = Miner::new(1, "X", Arc::clone(&ledger));
    let mut y = Miner::new(2, "Y", Arc::clone(&ledger));

    // Both search against genesis; X lands first, Y must rebuild on X.
    let x_block = x.prepare()?;
    let y_stale = y.prepare()?;
    assert_eq!(x.submit(x_block.clone())?, Attempt::Accepted(x_block.clone()));
    assert!(matches!(y.submit(y_stale)?, Attempt::Rejected(_)));
    let y_block = y.prepare()?;
    assert_eq!(y_block.index, 2);
    assert_eq!(y_block.prev_hash, x_block.hash);
    assert!(matches!(y.submit(y_block)?, Attempt::Accepted(_)));

    let snap = ledger.snapshot();
    assert_eq!(snap.len(), 3);
    assert_eq!(snap[1].payload, "X");
    assert_eq!(snap[2].payload, "Y");
    assert!(snap[1].hash.to_hex().starts_with('0'));
    assert!(snap[2].hash.to_hex().starts_with('0'));
    assert_chain_invariants(&snap, difficulty(1));
    Ok(())
}
