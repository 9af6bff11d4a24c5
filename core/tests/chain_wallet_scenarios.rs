//! End-to-end scenarios driving `BlockChain` and `Wallet` together, with no
//! network I/O: blocks are built in-process and fed straight to
//! `BlockChain::add`, and the chain's events are applied to the wallet the
//! same way `svp_node`'s event loop does.

use std::collections::HashMap;

use btpc_core::blockchain::{
    calculate_merkle_root, Block, BlockChain, BlockHeader, ChainEvent, NetworkParams, OutPoint,
    Transaction, TransactionInput, TransactionOutput,
};
use btpc_core::consensus::DifficultyTarget;
use btpc_core::crypto::{Hash, PrivateKey, Script};
use btpc_core::wallet::{BlockType, DeadTransactionEvent, Wallet};
use btpc_core::wire::WireEncode;

const UNIT_BITS: u32 = 0x207fffff;
const NOW: u64 = 4_000_000_000;

fn mined_header(prev: Hash, time: u32, merkle: Hash) -> BlockHeader {
    let mut header = BlockHeader::new(1, prev, merkle, time, UNIT_BITS, 0);
    let target = DifficultyTarget::from_bits(UNIT_BITS);
    while !target.validates_hash(&header.hash()) {
        header.nonce += 1;
    }
    header
}

fn block_with(prev: Hash, time: u32, txs: Vec<Transaction>) -> Block {
    let merkle = calculate_merkle_root(&txs).unwrap();
    Block::new(mined_header(prev, time, merkle), txs)
}

fn coinbase_block(prev: Hash, time: u32, value: u64, recipient_hash160: [u8; 20]) -> Block {
    block_with(prev, time, vec![Transaction::coinbase(value, recipient_hash160)])
}

/// A single-input, single-output transaction spending `(funding_txid, 0)`,
/// signed by `key`, paying `value` to `to_hash160`.
fn spend(funding_txid: Hash, key: &PrivateKey, value: u64, to_hash160: [u8; 20]) -> Transaction {
    let mut tx = Transaction {
        version: 1,
        inputs: vec![TransactionInput {
            previous_output: OutPoint::new(funding_txid, 0),
            script_sig: Script::new(),
            sequence: 0xffffffff,
        }],
        outputs: vec![TransactionOutput {
            value,
            script_pubkey: Script::pay_to_pubkey_hash(to_hash160),
        }],
        lock_time: 0,
    };
    let sighash = Hash::double_sha256(&tx.encode_to_vec());
    let signature = key.sign(&sighash);
    tx.inputs[0].script_sig = Script::unlock_p2pkh(&signature, &key.public_key());
    tx
}

/// Feed one block to the chain, then drive its outcome into the wallet: a
/// best-chain connection credits its transactions immediately, a side-chain
/// connection buffers them, and a reorg replays the winning branch forward.
/// Mirrors `svp_node::apply_block` without any peer/network involvement.
fn apply(
    chain: &mut BlockChain,
    wallet: &mut Wallet,
    block_cache: &mut HashMap<Hash, Block>,
    block: Block,
) -> (ChainEvent, Vec<DeadTransactionEvent>) {
    let hash = block.hash();
    block_cache.insert(hash, block.clone());
    let event = chain.add(block.clone(), NOW).expect("block should be valid");

    let dead = match &event {
        ChainEvent::Connected(h) => block
            .transactions
            .iter()
            .flat_map(|tx| wallet.receive(tx.clone(), *h, BlockType::BestChain))
            .collect(),
        ChainEvent::SideChain(h) => {
            for tx in &block.transactions {
                wallet.receive(tx.clone(), *h, BlockType::SideChain);
            }
            Vec::new()
        }
        ChainEvent::Reorganized(reorg) => {
            let old_chain: Vec<Block> = reorg
                .disconnected
                .iter()
                .filter_map(|h| block_cache.get(h).cloned())
                .collect();
            let new_chain: Vec<Block> = reorg
                .connected
                .iter()
                .filter_map(|h| block_cache.get(h).cloned())
                .collect();
            wallet.reorganize(&old_chain, &new_chain)
        }
        ChainEvent::Orphan | ChainEvent::Duplicate => Vec::new(),
    };

    (event, dead)
}

#[test]
fn basic_spend_yields_a_change_output_back_to_the_sender() {
    let params = NetworkParams::unit_tests();
    let genesis_hash = params.genesis().hash();
    let mut chain = BlockChain::new(params);
    let mut wallet = Wallet::new();
    let mut cache = HashMap::new();

    let key = PrivateKey::generate();
    wallet.add_key(key.clone());

    let funding = coinbase_block(genesis_hash, 1_735_344_600, 100_000_000, key.public_key().hash160());
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, funding);
    assert!(matches!(event, ChainEvent::Connected(_)));
    assert_eq!(wallet.available_balance(), 100_000_000);

    let recipient = PrivateKey::generate().public_key().hash160();
    let send = wallet.create_send(recipient, 50_000_000, None).unwrap();
    assert_eq!(send.inputs.len(), 1);
    assert_eq!(send.outputs[0].value, 50_000_000);
    assert_eq!(send.outputs[1].value, 50_000_000);
}

#[test]
fn side_chain_receipt_does_not_inflate_the_balance() {
    let params = NetworkParams::unit_tests();
    let genesis_hash = params.genesis().hash();
    let mut chain = BlockChain::new(params);
    let mut wallet = Wallet::new();
    let mut cache = HashMap::new();

    let key = PrivateKey::generate();
    wallet.add_key(key.clone());

    let best = coinbase_block(genesis_hash, 1_735_344_600, 100_000_000, key.public_key().hash160());
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, best);
    assert!(matches!(event, ChainEvent::Connected(_)));

    // A sibling block at the same height carries equal work and loses the
    // first-seen tie-break, so it attaches as a side chain.
    let side = coinbase_block(genesis_hash, 1_735_344_600, 50_000_000, key.public_key().hash160());
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, side);
    assert!(matches!(event, ChainEvent::SideChain(_)));

    assert_eq!(wallet.available_balance(), 100_000_000);
    assert_eq!(chain.height(), 1);
}

#[test]
fn spend_then_confirm_separates_available_from_estimated_until_confirmed() {
    let params = NetworkParams::unit_tests();
    let genesis_hash = params.genesis().hash();
    let mut chain = BlockChain::new(params);
    let mut wallet = Wallet::new();
    let mut cache = HashMap::new();

    let key = PrivateKey::generate();
    wallet.add_key(key.clone());

    let block1 = coinbase_block(genesis_hash, 1_735_344_600, 500_000_000, key.public_key().hash160());
    let block1_hash = block1.hash();
    apply(&mut chain, &mut wallet, &mut cache, block1);

    let block2 = coinbase_block(block1_hash, 1_735_345_200, 50_000_000, key.public_key().hash160());
    let block2_hash = block2.hash();
    apply(&mut chain, &mut wallet, &mut cache, block2);
    assert_eq!(wallet.available_balance(), 550_000_000);

    let change_hash160 = key.public_key().hash160();
    let send = wallet.create_send(PrivateKey::generate().public_key().hash160(), 100_000_000, Some(change_hash160)).unwrap();
    let send_txid = send.txid();
    wallet.confirm_send(send.clone());

    assert_eq!(wallet.estimated_balance(), 450_000_000);
    assert_ne!(wallet.available_balance(), wallet.estimated_balance());

    // The send confirms in block 3, alongside its own filler coinbase.
    let filler = Transaction::coinbase(100_000, PrivateKey::generate().public_key().hash160());
    let block3 = block_with(block2_hash, 1_735_345_800, vec![filler, send]);
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, block3);
    assert!(matches!(event, ChainEvent::Connected(_)));

    assert_eq!(wallet.available_balance(), 450_000_000);
    assert!(!wallet.pending().contains(&send_txid));
}

#[test]
fn a_replacement_confirming_first_kills_the_original_send() {
    let params = NetworkParams::unit_tests();
    let genesis_hash = params.genesis().hash();
    let mut chain = BlockChain::new(params);
    let mut wallet = Wallet::new();
    let mut cache = HashMap::new();

    let key = PrivateKey::generate();
    wallet.add_key(key.clone());

    let funding = coinbase_block(genesis_hash, 1_735_344_600, 100_000_000, key.public_key().hash160());
    let funding_hash = funding.hash();
    apply(&mut chain, &mut wallet, &mut cache, funding);
    assert_eq!(wallet.available_balance(), 100_000_000);

    let m = PrivateKey::generate().public_key().hash160();
    let send1 = wallet.create_send(m, 50_000_000, None).unwrap();
    let send1_txid = send1.txid();
    wallet.confirm_send(send1);

    let m2 = PrivateKey::generate().public_key().hash160();
    let send2 = wallet.create_send(m2, 50_000_000, None).unwrap();
    let send2_txid = send2.txid();
    assert_ne!(send1_txid, send2_txid);

    let filler = Transaction::coinbase(100_000, PrivateKey::generate().public_key().hash160());
    let block2 = block_with(funding_hash, 1_735_345_200, vec![filler, send2]);
    let (event, dead) = apply(&mut chain, &mut wallet, &mut cache, block2);
    assert!(matches!(event, ChainEvent::Connected(_)));

    assert_eq!(
        dead,
        vec![DeadTransactionEvent {
            dead: send1_txid,
            replacement: send2_txid,
        }]
    );
    assert_eq!(wallet.dead().len(), 1);
    assert_eq!(wallet.pending().len(), 0);
}

#[test]
fn an_orphan_connects_once_its_whole_ancestry_arrives_out_of_order() {
    let params = NetworkParams::unit_tests();
    let genesis_hash = params.genesis().hash();
    let mut chain = BlockChain::new(params);
    let mut wallet = Wallet::new();
    let mut cache = HashMap::new();

    let key = PrivateKey::generate();
    wallet.add_key(key.clone());

    let mut hash = genesis_hash;
    let mut blocks = Vec::new();
    for i in 0..5u32 {
        let block = coinbase_block(hash, 1_735_344_600 + i * 600, 100_000_000, key.public_key().hash160());
        hash = block.hash();
        blocks.push(block);
    }
    let h5 = blocks[4].hash();

    // h5 arrives first with no known ancestor: buffered as an orphan.
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, blocks[4].clone());
    assert_eq!(event, ChainEvent::Orphan);
    assert_eq!(chain.height(), 0);

    // h1..h4 arrive next, draining the orphan set one link at a time.
    for block in blocks.into_iter().take(4) {
        apply(&mut chain, &mut wallet, &mut cache, block);
    }

    assert_eq!(chain.height(), 5);
    assert_eq!(chain.tip().hash(), h5);
    assert_eq!(wallet.available_balance(), 500_000_000);
}

#[test]
fn a_reorg_moves_the_old_branchs_transactions_to_pending_and_replays_the_new_one() {
    let params = NetworkParams::unit_tests();
    let genesis_hash = params.genesis().hash();
    let mut chain = BlockChain::new(params);
    let mut wallet = Wallet::new();
    let mut cache = HashMap::new();

    let wallet_key = PrivateKey::generate();
    wallet.add_key(wallet_key.clone());
    let wallet_hash160 = wallet_key.public_key().hash160();

    let funder_a = PrivateKey::generate();
    let funder_b2 = PrivateKey::generate();
    let stranger = || PrivateKey::generate().public_key().hash160();

    // Main chain: G-A-B-C, with A funding a spend to our wallet in C.
    let block_a = coinbase_block(genesis_hash, 1_735_344_600, 100_000_000, funder_a.public_key().hash160());
    let block_a_hash = block_a.hash();
    let funding_a_txid = block_a.transactions[0].txid();
    apply(&mut chain, &mut wallet, &mut cache, block_a);

    let block_b = coinbase_block(block_a_hash, 1_735_345_200, 100_000, stranger());
    let block_b_hash = block_b.hash();
    apply(&mut chain, &mut wallet, &mut cache, block_b);

    let spend_c = spend(funding_a_txid, &funder_a, 100_000_000, wallet_hash160);
    let spend_c_txid = spend_c.txid();
    let filler_c = Transaction::coinbase(100_000, stranger());
    let block_c = block_with(block_b_hash, 1_735_345_800, vec![filler_c, spend_c]);
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, block_c);
    assert!(matches!(event, ChainEvent::Connected(_)));
    assert_eq!(wallet.available_balance(), 100_000_000);

    // Side branch off A: B'-C'-D', with B' funding a spend to our wallet in
    // C', ending one block heavier than C.
    let block_b2 = coinbase_block(block_a_hash, 1_735_345_200, 200_000_000, funder_b2.public_key().hash160());
    let block_b2_hash = block_b2.hash();
    let funding_b2_txid = block_b2.transactions[0].txid();
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, block_b2);
    assert!(matches!(event, ChainEvent::SideChain(_)));

    let spend_c2 = spend(funding_b2_txid, &funder_b2, 200_000_000, wallet_hash160);
    let spend_c2_txid = spend_c2.txid();
    let filler_c2 = Transaction::coinbase(100_000, stranger());
    let block_c2 = block_with(block_b2_hash, 1_735_345_800, vec![filler_c2, spend_c2]);
    let block_c2_hash = block_c2.hash();
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, block_c2);
    assert!(matches!(event, ChainEvent::SideChain(_)));

    let block_d2 = coinbase_block(block_c2_hash, 1_735_346_400, 100_000, stranger());
    let (event, _) = apply(&mut chain, &mut wallet, &mut cache, block_d2);
    let reorg = match event {
        ChainEvent::Reorganized(reorg) => reorg,
        other => panic!("expected a reorg, got {other:?}"),
    };
    assert_eq!(reorg.fork_point, block_a_hash);

    // C's spend returns to pending; C's is no longer reachable as our best
    // chain, and C2's spend has taken its place as the confirmed coin.
    assert!(wallet.pending().contains(&spend_c_txid));
    assert!(wallet.unspent().contains(&spend_c2_txid));
    assert_eq!(wallet.available_balance(), 200_000_000);
    assert_eq!(wallet.estimated_balance(), 300_000_000);
}
