//! 内存链：解码并验签原始交易，按选择器模拟代币/NFT 合约状态

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ethers::{
    abi::{self, ParamType, Token},
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, NameOrAddress, H256, U256},
    utils::{get_contract_address, id, keccak256},
};
use ironmint::infrastructure::{ChainReceipt, ChainRpc};

pub const CHAIN_ID: u64 = 31337;

#[derive(Default)]
struct ContractState {
    owner: Address,
    balances: HashMap<Address, U256>,
    token_owners: HashMap<U256, Address>,
    next_token_id: U256,
}

struct PendingTx {
    hash: H256,
    from: Address,
    to: Option<Address>,
    data: Vec<u8>,
    nonce: u64,
}

#[derive(Default)]
struct ChainState {
    block_number: u64,
    nonces: HashMap<Address, u64>,
    pending: Vec<PendingTx>,
    receipts: HashMap<H256, ChainReceipt>,
    contracts: HashMap<Address, ContractState>,
}

pub struct MockChain {
    state: Mutex<ChainState>,
    auto_mine: AtomicBool,
    revert_next: AtomicBool,
    calls: AtomicUsize,
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = id(signature);
    [hash[0], hash[1], hash[2], hash[3]]
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                block_number: 1,
                ..Default::default()
            }),
            auto_mine: AtomicBool::new(true),
            revert_next: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// 交易进入 pending，需手动 `mine()`
    pub fn manual() -> Self {
        let chain = Self::new();
        chain.auto_mine.store(false, Ordering::SeqCst);
        chain
    }

    pub fn revert_next(&self) {
        self.revert_next.store(true, Ordering::SeqCst);
    }

    /// RPC 调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// 打包所有 pending 交易到一个新区块
    pub fn mine(&self) {
        let mut state = self.state.lock().unwrap();
        let pending = std::mem::take(&mut state.pending);
        state.block_number += 1;
        for tx in pending {
            let reverted = self.revert_next.swap(false, Ordering::SeqCst);
            Self::execute(&mut state, tx, reverted);
        }
    }

    /// 额外出块（推进确认数）
    pub fn advance_blocks(&self, n: u64) {
        self.state.lock().unwrap().block_number += n;
    }

    pub fn balance_of(&self, contract: Address, holder: Address) -> U256 {
        let state = self.state.lock().unwrap();
        state
            .contracts
            .get(&contract)
            .and_then(|c| c.balances.get(&holder).copied())
            .unwrap_or_default()
    }

    pub fn owner_of(&self, contract: Address, token_id: U256) -> Option<Address> {
        let state = self.state.lock().unwrap();
        state
            .contracts
            .get(&contract)
            .and_then(|c| c.token_owners.get(&token_id).copied())
    }

    pub fn is_contract(&self, address: Address) -> bool {
        self.state.lock().unwrap().contracts.contains_key(&address)
    }

    fn execute(state: &mut ChainState, tx: PendingTx, force_revert: bool) {
        let block_number = state.block_number;
        let mut contract_address = None;

        let ok = !force_revert
            && match tx.to {
                None => {
                    let address = get_contract_address(tx.from, tx.nonce);
                    let mut contract = ContractState {
                        owner: tx.from,
                        ..Default::default()
                    };
                    // 4 字节字节码后跟 uint256 构造参数时视为初始供应量
                    if tx.data.len() >= 36 {
                        let supply = U256::from_big_endian(&tx.data[4..36]);
                        contract.balances.insert(tx.from, supply);
                    }
                    state.contracts.insert(address, contract);
                    contract_address = Some(address);
                    true
                }
                Some(to) => match state.contracts.get_mut(&to) {
                    Some(contract) => Self::apply_call(contract, tx.from, &tx.data).is_ok(),
                    None => false,
                },
            };

        state.receipts.insert(
            tx.hash,
            ChainReceipt {
                transaction_hash: tx.hash,
                block_number: Some(block_number),
                block_hash: Some(H256::from_low_u64_be(block_number)),
                status: Some(if ok { 1 } else { 0 }),
                gas_used: Some(U256::from(21_000u64)),
                contract_address: if ok { contract_address } else { None },
            },
        );
    }

    fn apply_call(contract: &mut ContractState, from: Address, data: &[u8]) -> Result<()> {
        if data.len() < 4 {
            bail!("missing selector");
        }
        let (sel, args) = data.split_at(4);

        if sel == selector("transfer(address,uint256)") {
            let tokens = abi::decode(&[ParamType::Address, ParamType::Uint(256)], args)?;
            let (to, amount) = match (&tokens[0], &tokens[1]) {
                (Token::Address(to), Token::Uint(amount)) => (*to, *amount),
                _ => bail!("bad args"),
            };
            let from_balance = contract.balances.get(&from).copied().unwrap_or_default();
            if from_balance < amount {
                bail!("insufficient balance");
            }
            contract.balances.insert(from, from_balance - amount);
            *contract.balances.entry(to).or_default() += amount;
            Ok(())
        } else if sel == selector("safeMint(address)") || sel == selector("mint(address)") {
            let tokens = abi::decode(&[ParamType::Address], args)?;
            let to = match &tokens[0] {
                Token::Address(to) => *to,
                _ => bail!("bad args"),
            };
            if from != contract.owner {
                bail!("caller is not the owner");
            }
            let token_id = contract.next_token_id;
            contract.token_owners.insert(token_id, to);
            contract.next_token_id = token_id + 1;
            Ok(())
        } else if sel == selector("safeTransferFrom(address,address,uint256)") {
            let tokens = abi::decode(
                &[ParamType::Address, ParamType::Address, ParamType::Uint(256)],
                args,
            )?;
            let (owner, to, token_id) = match (&tokens[0], &tokens[1], &tokens[2]) {
                (Token::Address(o), Token::Address(t), Token::Uint(id)) => (*o, *t, *id),
                _ => bail!("bad args"),
            };
            match contract.token_owners.get(&token_id) {
                Some(current) if *current == owner && owner == from => {
                    contract.token_owners.insert(token_id, to);
                    Ok(())
                }
                _ => bail!("not owner nor approved"),
            }
        } else {
            bail!("unknown selector")
        }
    }

    fn view(contract: &ContractState, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 4 {
            bail!("missing selector");
        }
        let (sel, args) = data.split_at(4);

        if sel == selector("owner()") {
            Ok(abi::encode(&[Token::Address(contract.owner)]))
        } else if sel == selector("balanceOf(address)") {
            let tokens = abi::decode(&[ParamType::Address], args)?;
            let holder = match &tokens[0] {
                Token::Address(a) => *a,
                _ => bail!("bad args"),
            };
            let balance = contract.balances.get(&holder).copied().unwrap_or_default();
            Ok(abi::encode(&[Token::Uint(balance)]))
        } else if sel == selector("ownerOf(uint256)") {
            let tokens = abi::decode(&[ParamType::Uint(256)], args)?;
            let token_id = match &tokens[0] {
                Token::Uint(id) => *id,
                _ => bail!("bad args"),
            };
            match contract.token_owners.get(&token_id) {
                Some(owner) => Ok(abi::encode(&[Token::Address(*owner)])),
                None => bail!("execution reverted: invalid token ID"),
            }
        } else {
            bail!("execution reverted: unknown selector")
        }
    }

    fn target(tx: &TypedTransaction) -> Option<Address> {
        match tx.to() {
            Some(NameOrAddress::Address(a)) => Some(*a),
            _ => None,
        }
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CHAIN_ID)
    }

    async fn block_number(&self) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().block_number)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state.nonces.get(&address).copied().unwrap_or(0))
    }

    async fn gas_price(&self) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(1_000_000_000u64))
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(100_000u64))
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let to = Self::target(tx).ok_or_else(|| anyhow!("eth_call without target"))?;
        let data = tx.data().map(|d| d.to_vec()).unwrap_or_default();

        let state = self.state.lock().unwrap();
        let contract = state
            .contracts
            .get(&to)
            .ok_or_else(|| anyhow!("no contract at {:?}", to))?;
        Self::view(contract, &data).map(Bytes::from)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let rlp = rlp::Rlp::new(raw.as_ref());
        let (tx, signature) = TypedTransaction::decode_signed(&rlp)
            .map_err(|e| anyhow!("invalid raw transaction: {}", e))?;
        let from = signature
            .recover(tx.sighash())
            .map_err(|e| anyhow!("invalid signature: {}", e))?;

        match tx.chain_id() {
            Some(id) if id.as_u64() == CHAIN_ID => {}
            other => bail!("invalid chain id {:?}", other),
        }

        let nonce = tx
            .nonce()
            .map(|n| n.as_u64())
            .ok_or_else(|| anyhow!("missing nonce"))?;
        let hash = H256::from(keccak256(raw.as_ref()));

        {
            let mut state = self.state.lock().unwrap();
            let expected = state.nonces.get(&from).copied().unwrap_or(0);
            if nonce != expected {
                bail!("nonce too low: expected {}, got {}", expected, nonce);
            }
            state.nonces.insert(from, expected + 1);
            state.pending.push(PendingTx {
                hash,
                from,
                to: Self::target(&tx),
                data: tx.data().map(|d| d.to_vec()).unwrap_or_default(),
                nonce,
            });
        }

        if self.auto_mine.load(Ordering::SeqCst) {
            self.mine();
        }
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<ChainReceipt>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().receipts.get(&hash).cloned())
    }
}
