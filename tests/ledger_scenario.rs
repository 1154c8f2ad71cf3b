//! End-to-end ledger scenarios
//!
//! Drive a `Ledger` through payments, double spends, orphan transactions
//! and competing chains with fixed timestamps.

use minichain::consensus::{calculate_block_reward, retarget, Block, BlockHeader, ValidationError};
use minichain::constants::PROTOCOL_VERSION;
use minichain::crypto::{double_hash, Hash};
use minichain::mempool::PoolAdmission;
use minichain::mining::mine_nonce;
use minichain::node::GenesisSpec;
use minichain::storage::{BlockAdmission, ChainIndex, KeepReason, Ledger, ReplaceOutcome, COINBASE_MEMO};
use minichain::validation::{Transaction, TxInput, TxOutput};
use minichain::wallet::{create_transaction, KeyPair, TransferRequest};

const T0: u64 = 1_600_000_000_000;
const STEP: u64 = 10_000;

fn ledger_for(owner: &KeyPair) -> Ledger {
    Ledger::with_genesis(&GenesisSpec {
        recipient: owner.pubkey_hash(),
        timestamp: T0,
        bits: 2,
        ..GenesisSpec::default()
    })
}

/// Sealed block on top of `prefix` with a correct coinbase
fn block_on(prefix: &[Block], recipient: Hash, txs: Vec<Transaction>, timestamp: u64) -> Block {
    let previous = prefix.last().unwrap();
    let id = previous.id + 1;
    let fees = ChainIndex::from_chain(prefix).total_fees(&txs).unwrap();

    let mut all = vec![Transaction::coinbase(
        recipient,
        id,
        calculate_block_reward(id) + fees,
        COINBASE_MEMO,
        timestamp,
    )];
    all.extend(txs);

    let bits = retarget(id, timestamp, prefix).unwrap();
    let header = BlockHeader::new(PROTOCOL_VERSION, previous.hash(), Hash::zero(), timestamp, bits, 0);
    let mut block = Block::new(id, header, all);
    block.header.merkle_root = block.compute_merkle_root().unwrap();
    block.header.nonce = mine_nonce(&block.header);
    block
}

/// Hand-built spend of one output
fn spend(owner: &KeyPair, previous: Hash, index: i64, to: Hash, value: u64, timestamp: u64) -> Transaction {
    let input = TxInput {
        previous_transaction_hash: previous,
        output_index: index,
        signature: Vec::new(),
        sender_public_key: owner.public_key,
    };
    let output = TxOutput {
        recipient_public_key_hash: to,
        value,
    };
    let mut tx = Transaction::new(vec![input], vec![output], "", timestamp);
    let message = tx.signing_message(&[owner.pubkey_hash()]);
    tx.inputs[0].signature = owner.sign(&message);
    tx
}

#[test]
fn test_payment_scenario() {
    let k0 = KeyPair::generate();
    let k1 = KeyPair::generate();
    let miner = double_hash(b"miner");
    let mut ledger = ledger_for(&k0);

    assert_eq!(ledger.balance(&k0.pubkey_hash()), 50);

    // block 1 pays another 50 to K0
    let b1 = block_on(&ledger.chain(), k0.pubkey_hash(), vec![], T0 + STEP);
    ledger.add_block(b1, T0 + STEP).unwrap();
    assert_eq!(ledger.balance(&k0.pubkey_hash()), 100);

    // 30 to K1 with a fee of 1 spends the genesis output
    let tx = create_transaction(
        &k0,
        TransferRequest::one(k1.pubkey_hash(), 30, 1),
        &ledger.chain(),
        "first payment",
        T0 + STEP + 1,
    )
    .unwrap();
    let genesis_coinbase = ledger.genesis().transactions[0].hash();
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.inputs[0].previous_transaction_hash, genesis_coinbase);
    assert_eq!(tx.outputs[0].value, 30);
    assert_eq!(tx.outputs[1].value, 19);
    assert_eq!(tx.outputs[1].recipient_public_key_hash, k0.pubkey_hash());

    let now = T0 + 2 * STEP;
    assert_eq!(
        ledger.add_transaction(tx.clone(), now),
        Ok(PoolAdmission::Accepted(tx.hash()))
    );

    let mut b2 = ledger.assemble_block(miner, now);
    assert_eq!(b2.transactions[0].outputs[0].value, 51);
    b2.header.nonce = mine_nonce(&b2.header);
    assert!(matches!(
        ledger.add_block(b2, now),
        Ok(BlockAdmission::Appended { height: 2, .. })
    ));

    assert_eq!(ledger.balance(&k1.pubkey_hash()), 30);
    assert_eq!(ledger.balance(&k0.pubkey_hash()), 69);
    assert_eq!(ledger.balance(&miner), 51);
    assert!(ledger.pool().is_empty());
}

#[test]
fn test_consumed_output_never_accepted_again() {
    let k0 = KeyPair::generate();
    let k1 = KeyPair::generate();
    let mut ledger = ledger_for(&k0);
    let genesis_coinbase = ledger.genesis().transactions[0].hash();

    let first = spend(&k0, genesis_coinbase, 0, k1.pubkey_hash(), 50, T0 + 1);
    let second = spend(&k0, genesis_coinbase, 0, k1.pubkey_hash(), 49, T0 + 2);
    let now = T0 + STEP;

    // two pool entries may not claim the same output
    assert!(matches!(ledger.add_transaction(first.clone(), now), Ok(PoolAdmission::Accepted(_))));
    assert!(matches!(
        ledger.add_transaction(second.clone(), now),
        Err(ValidationError::DoubleSpend { output_index: 0, .. })
    ));

    let b1 = block_on(&ledger.chain(), k0.pubkey_hash(), vec![first], T0 + STEP);
    ledger.add_block(b1, now).unwrap();

    // once on chain, the output is spent for the pool
    assert!(matches!(
        ledger.add_transaction(second.clone(), now),
        Err(ValidationError::DoubleSpend { .. })
    ));

    // and for later blocks
    let b2 = block_on(&ledger.chain(), k0.pubkey_hash(), vec![second], T0 + 2 * STEP);
    assert!(matches!(
        ledger.add_block(b2, T0 + 2 * STEP),
        Err(ValidationError::DoubleSpend { .. })
    ));
    assert_eq!(ledger.height(), 1);
}

#[test]
fn test_orphan_transaction_promoted() {
    let k0 = KeyPair::generate();
    let k1 = KeyPair::generate();
    let k2 = KeyPair::generate();
    let mut ledger = ledger_for(&k0);
    let genesis_coinbase = ledger.genesis().transactions[0].hash();

    let parent = spend(&k0, genesis_coinbase, 0, k1.pubkey_hash(), 45, T0 + 1);
    let child = spend(&k1, parent.hash(), 0, k2.pubkey_hash(), 40, T0 + 2);
    let now = T0 + STEP;

    assert_eq!(
        ledger.add_transaction(child.clone(), now),
        Ok(PoolAdmission::Orphaned(child.hash()))
    );
    assert!(matches!(ledger.add_transaction(parent.clone(), now), Ok(PoolAdmission::Accepted(_))));
    assert_eq!(ledger.pool().orphans(), &[child.clone()]);

    let mut b1 = ledger.assemble_block(k0.pubkey_hash(), now);
    assert_eq!(b1.transactions.len(), 2);
    b1.header.nonce = mine_nonce(&b1.header);
    ledger.add_block(b1, now).unwrap();

    assert_eq!(ledger.pool().valid(), &[child.clone()]);
    assert!(ledger.pool().orphans().is_empty());
    assert_eq!(ledger.balance(&k1.pubkey_hash()), 45);
}

#[test]
fn test_heavier_branch_wins_at_equal_length() {
    let k0 = KeyPair::generate();
    let mut ledger = ledger_for(&k0);
    let g = ledger.chain().to_vec();
    let (miner_a, miner_b) = (double_hash(b"a"), double_hash(b"b"));

    // main chain keeps bits at 2
    let a1 = block_on(&g, miner_a, vec![], T0 + STEP);
    let a2 = block_on(&[g[0].clone(), a1.clone()], miner_a, vec![], T0 + 2 * STEP);
    ledger.add_block(a1, T0 + STEP).unwrap();
    ledger.add_block(a2.clone(), T0 + 2 * STEP).unwrap();
    assert_eq!(ledger.cumulative_difficulty(), 12);

    // fast branch retargets to 3 bits at height 2
    let b1 = block_on(&g, miner_b, vec![], T0 + 2_000);
    let b2 = block_on(&[g[0].clone(), b1.clone()], miner_b, vec![], T0 + 4_000);
    assert_eq!(b2.header.bits, 3);

    let now = T0 + 2 * STEP;
    assert!(matches!(ledger.add_block(b1, now), Ok(BlockAdmission::Branched { .. })));
    assert_eq!(ledger.tip().hash(), a2.hash());

    assert_eq!(
        ledger.add_block(b2.clone(), now),
        Ok(BlockAdmission::Reorganized { height: 2, hash: b2.hash() })
    );
    assert_eq!(ledger.tip().hash(), b2.hash());
    assert_eq!(ledger.cumulative_difficulty(), 16);
    assert_eq!(ledger.balance(&miner_a), 0);
    assert_eq!(ledger.balance(&miner_b), 100);
}

#[test]
fn test_heavier_invalid_chain_kept_out() {
    let k0 = KeyPair::generate();
    let k1 = KeyPair::generate();
    let mut ledger = ledger_for(&k0);
    let g = ledger.chain().to_vec();
    let genesis_coinbase = g[0].transactions[0].hash();

    let a1 = block_on(&g, double_hash(b"a"), vec![], T0 + STEP);
    ledger.add_block(a1.clone(), T0 + STEP).unwrap();
    let weight = ledger.cumulative_difficulty();

    let first = spend(&k0, genesis_coinbase, 0, k1.pubkey_hash(), 50, T0 + 1);
    let second = spend(&k0, genesis_coinbase, 0, k1.pubkey_hash(), 50, T0 + 2);
    let b1 = block_on(&g, k0.pubkey_hash(), vec![first], T0 + STEP);
    let prefix = [g[0].clone(), b1.clone()];
    let now = T0 + 2 * STEP;

    // block 2 re-sealed over a merkle root that does not match its body
    let mut tampered = block_on(&prefix, k0.pubkey_hash(), vec![], T0 + 2 * STEP);
    tampered.header.merkle_root = double_hash(b"not the body");
    tampered.header.nonce = mine_nonce(&tampered.header);
    let outcome = ledger.replace_chain(vec![g[0].clone(), b1.clone(), tampered], now);
    assert_eq!(
        outcome,
        ReplaceOutcome::Kept(KeepReason::Invalid(ValidationError::InvalidMerkleRoot))
    );

    // block 2 spends the genesis output a second time
    let double = block_on(&prefix, k0.pubkey_hash(), vec![second], T0 + 2 * STEP);
    let outcome = ledger.replace_chain(vec![g[0].clone(), b1, double], now);
    assert!(matches!(
        outcome,
        ReplaceOutcome::Kept(KeepReason::Invalid(ValidationError::DoubleSpend { .. }))
    ));

    assert_eq!(ledger.height(), 1);
    assert_eq!(ledger.tip().hash(), a1.hash());
    assert_eq!(ledger.cumulative_difficulty(), weight);
    assert_eq!(ledger.balance(&k1.pubkey_hash()), 0);
}

#[test]
fn test_orphan_blocks_arriving_in_reverse() {
    let k0 = KeyPair::generate();
    let mut ledger = ledger_for(&k0);
    let miner = double_hash(b"miner");

    let mut chain = ledger.chain().to_vec();
    for step in 1..=4 {
        let block = block_on(&chain, miner, vec![], T0 + step * STEP);
        chain.push(block);
    }

    let now = T0 + 4 * STEP;
    for block in chain[2..].iter().rev() {
        assert!(matches!(
            ledger.add_block(block.clone(), now),
            Ok(BlockAdmission::Orphaned { .. })
        ));
    }
    assert_eq!(ledger.orphan_blocks().len(), 3);

    assert!(matches!(
        ledger.add_block(chain[1].clone(), now),
        Ok(BlockAdmission::Appended { height: 1, connected: 3, .. })
    ));
    assert_eq!(ledger.height(), 4);
    assert_eq!(ledger.chain().as_slice(), chain.as_slice());
    assert!(ledger.orphan_blocks().is_empty());
}
