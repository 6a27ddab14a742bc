use anyhow::{Context, Result};
use ledger_core::{AccountId, Block, Ledger, LedgerConfig, ProofMode, Transaction};

const DEMO_ROUNDS: u64 = 100_000;
const DEMO_ZERO_BITS: u64 = 16;

fn submit(ledger: &Ledger, tx: Transaction) {
    println!("[TRANSACTION] From: {} To: {} Amount: {}", tx.from, tx.to, tx.amount);
    ledger.submit(tx);
}

fn mine(ledger: &Ledger, miner: AccountId) -> Result<()> {
    println!("[MINING STARTED]");
    let mined = ledger.mine_cycle(miner)?;
    println!(
        "[MINING FINISHED] Block: {} Hash: {} ({} attempts, {:?})",
        mined.block.header.index,
        mined.block.hash_hex(),
        mined.report.attempts,
        mined.report.elapsed
    );
    Ok(())
}

fn report(ledger: &Ledger) -> Result<()> {
    println!("{}", ledger.render()?);
    match ledger.verify() {
        Ok(()) => println!("valid: true"),
        Err(fault) => println!("valid: false ({fault})"),
    }
    Ok(())
}

/// Mines two blocks, then forges block 1 and shows that validation catches it.
pub fn run(difficulty: Option<u64>, reward: u64, pow: ProofMode) -> Result<()> {
    let difficulty = difficulty.unwrap_or(match pow {
        ProofMode::Rounds => DEMO_ROUNDS,
        ProofMode::LeadingZeroBits => DEMO_ZERO_BITS,
    });
    let config = LedgerConfig {
        difficulty,
        reward,
        proof: pow,
    };
    let ledger = Ledger::new(&config)?;

    let miner = AccountId::random();
    let (address1, address2, address3) =
        (AccountId::random(), AccountId::random(), AccountId::random());

    submit(&ledger, Transaction::new(address1, address2, 10));
    mine(&ledger, miner)?;

    submit(&ledger, Transaction::new(address1, address3, 20));
    submit(&ledger, Transaction::new(address2, address3, 30));
    mine(&ledger, miner)?;

    report(&ledger)?;

    println!("[TAMPERING ATTEMPT]");
    let genesis = ledger.block(0).context("ledger has no genesis block")?;
    let forged = Block::new(Some(&genesis), vec![Transaction::new(address1, miner, 40)]);
    ledger.overwrite_block(1, forged)?;

    report(&ledger)
}
