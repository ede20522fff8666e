//! In-memory ledger.
//!
//! A single-process stand-in for a node and the settlement contract, used for
//! development and by the test suites. It keeps native and token balances,
//! applies `sendEth`, `sendToken`, `withdrawToken` and the relayed withdrawal
//! calls, and emits `Announcement` logs exactly as the contract would.
//!
//! Every transaction is mined into its own block.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};

use shade_core::abi;
use shade_core::constants::{DEFAULT_GAS_LIMIT, NATIVE_TOKEN};
use shade_core::error::{Result, ShadeError};
use shade_core::traits::{LedgerReader, TransactionSubmitter};
use shade_core::types::{
    BlockTag, ChainConfig, LogFilter, RawLog, TransactionRequest, TxHandle, TxOrigin,
};
use shade_crypto::{keccak256, recover_withdraw_signer, KeyPair, RecoverableSignature, WithdrawAuthorization};

/// Timestamp of block 0.
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Seconds between blocks.
const BLOCK_TIME: u64 = 12;

/// In-memory ledger with a settlement contract deployed at `contract`.
///
/// # Thread Safety
///
/// Reads are lock-free. Transactions are applied one at a time.
#[derive(Debug)]
pub struct MemoryLedger {
    chain_id: u64,
    contract: Address,
    /// Native balances
    balances: DashMap<Address, U256>,
    /// Token balances: (holder, token) → amount
    token_balances: DashMap<(Address, Address), U256>,
    /// Tokens held by the contract for stealth addresses: (stealth, token) → amount
    token_payments: DashMap<(Address, Address), U256>,
    /// Emitted logs, in order
    logs: RwLock<Vec<RawLog>>,
    /// Transaction hash → sender
    senders: DashMap<B256, Address>,
    block_number: AtomicU64,
    nonce: AtomicU64,
    gas_price: RwLock<U256>,
    toll: RwLock<U256>,
    /// Serializes transaction application
    tx_lock: Mutex<()>,
}

impl MemoryLedger {
    /// Creates a ledger for a chain, starting at the chain's deployment block.
    pub fn new(chain: &ChainConfig) -> Self {
        Self {
            chain_id: chain.chain_id,
            contract: chain.contract_address,
            balances: DashMap::new(),
            token_balances: DashMap::new(),
            token_payments: DashMap::new(),
            logs: RwLock::new(Vec::new()),
            senders: DashMap::new(),
            block_number: AtomicU64::new(chain.start_block),
            nonce: AtomicU64::new(0),
            gas_price: RwLock::new(U256::ZERO),
            toll: RwLock::new(U256::ZERO),
            tx_lock: Mutex::new(()),
        }
    }

    /// Chain ID used when verifying relayed withdrawals.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Settlement contract address.
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Credits native balance.
    pub fn fund(&self, address: Address, amount: U256) {
        *self.balances.entry(address).or_insert(U256::ZERO) += amount;
    }

    /// Credits token balance.
    pub fn mint_token(&self, holder: Address, token: Address, amount: U256) {
        *self.token_balances.entry((holder, token)).or_insert(U256::ZERO) += amount;
    }

    /// Token balance of a holder.
    pub fn token_balance(&self, holder: Address, token: Address) -> U256 {
        self.token_balances
            .get(&(holder, token))
            .map(|v| *v)
            .unwrap_or(U256::ZERO)
    }

    /// Tokens the contract holds for a stealth address.
    pub fn token_payment(&self, stealth: Address, token: Address) -> U256 {
        self.token_payments
            .get(&(stealth, token))
            .map(|v| *v)
            .unwrap_or(U256::ZERO)
    }

    /// Sets the gas price.
    pub fn set_gas_price(&self, price: U256) {
        *self.gas_price.write() = price;
    }

    /// Sets the per-payment toll.
    pub fn set_toll(&self, toll: U256) {
        *self.toll.write() = toll;
    }

    /// Number of logs emitted so far.
    pub fn log_count(&self) -> usize {
        self.logs.read().len()
    }

    fn native_balance(&self, address: &Address) -> U256 {
        self.balances.get(address).map(|v| *v).unwrap_or(U256::ZERO)
    }

    fn debit(&self, address: Address, amount: U256) -> Result<()> {
        let available = self.native_balance(&address);
        if available < amount {
            return Err(ShadeError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        self.balances.insert(address, available - amount);
        Ok(())
    }

    fn debit_token(&self, holder: Address, token: Address, amount: U256) -> Result<()> {
        let available = self.token_balance(holder, token);
        if available < amount {
            return Err(ShadeError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        self.token_balances.insert((holder, token), available - amount);
        Ok(())
    }

    fn verify_origin(origin: &TxOrigin) -> Result<()> {
        if let TxOrigin::Stealth { address, key } = origin {
            let signer = KeyPair::from_private_bytes(key.as_array())?;
            if signer.address() != *address {
                return Err(ShadeError::SignatureError(format!(
                    "key does not control {}",
                    address.to_checksum(None)
                )));
            }
        }
        Ok(())
    }

    fn block_timestamp_of(number: u64) -> u64 {
        GENESIS_TIMESTAMP + number * BLOCK_TIME
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Contract calls
    // ───────────────────────────────────────────────────────────────────────────

    fn execute_contract(&self, from: Address, value: U256, data: &[u8]) -> Result<Vec<abi::Announcement>> {
        if data.len() < 4 {
            return Err(ShadeError::Rpc("call data has no function selector".into()));
        }
        let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];
        let toll = *self.toll.read();

        match selector {
            abi::sendEthCall::SELECTOR => {
                let call = abi::sendEthCall::abi_decode(data, true)?;
                if call.toll_commitment != toll {
                    return Err(ShadeError::Rpc("execution reverted: toll has changed".into()));
                }
                if value <= toll {
                    return Err(ShadeError::Rpc("execution reverted: must pay more than the toll".into()));
                }
                let amount = value - toll;
                self.fund(call.receiver, amount);
                Ok(vec![abi::Announcement {
                    receiver: call.receiver,
                    amount,
                    token: NATIVE_TOKEN,
                    pkx: call.pkx,
                    ciphertext: call.ciphertext,
                }])
            }
            abi::sendTokenCall::SELECTOR => {
                let call = abi::sendTokenCall::abi_decode(data, true)?;
                if value != toll {
                    return Err(ShadeError::Rpc("execution reverted: must pay the exact toll".into()));
                }
                if !self.token_payment(call.receiver, call.token).is_zero() {
                    return Err(ShadeError::Rpc("execution reverted: cannot reuse a stealth address".into()));
                }
                self.debit_token(from, call.token, call.amount)?;
                self.token_payments.insert((call.receiver, call.token), call.amount);
                Ok(vec![abi::Announcement {
                    receiver: call.receiver,
                    amount: call.amount,
                    token: call.token,
                    pkx: call.pkx,
                    ciphertext: call.ciphertext,
                }])
            }
            abi::withdrawTokenCall::SELECTOR => {
                let call = abi::withdrawTokenCall::abi_decode(data, true)?;
                let amount = self.take_payment(from, call.token)?;
                self.mint_token(call.acceptor, call.token, amount);
                Ok(Vec::new())
            }
            abi::withdrawTokenOnBehalfCall::SELECTOR => {
                let call = abi::withdrawTokenOnBehalfCall::abi_decode(data, true)?;
                let authorization = WithdrawAuthorization::new(
                    self.chain_id,
                    self.contract,
                    call.acceptor,
                    call.token,
                    call.sponsor,
                    call.sponsor_fee,
                );
                let signature = RecoverableSignature {
                    r: call.r,
                    s: call.s,
                    v: call.v,
                };
                self.relay_withdraw(call.stealth_address, &authorization, &signature)?;
                Ok(Vec::new())
            }
            abi::withdrawTokenAndCallOnBehalfCall::SELECTOR => {
                let call = abi::withdrawTokenAndCallOnBehalfCall::abi_decode(data, true)?;
                let authorization = WithdrawAuthorization::new(
                    self.chain_id,
                    self.contract,
                    call.acceptor,
                    call.token,
                    call.sponsor,
                    call.sponsor_fee,
                )
                .with_hook(call.hook, call.data.clone());
                let signature = RecoverableSignature {
                    r: call.r,
                    s: call.s,
                    v: call.v,
                };
                self.relay_withdraw(call.stealth_address, &authorization, &signature)?;
                Ok(Vec::new())
            }
            other => Err(ShadeError::Rpc(format!(
                "execution reverted: unknown selector 0x{}",
                hex::encode(other)
            ))),
        }
    }

    fn take_payment(&self, stealth: Address, token: Address) -> Result<U256> {
        let amount = self.token_payment(stealth, token);
        if amount.is_zero() {
            return Err(ShadeError::Rpc("execution reverted: no balance to withdraw".into()));
        }
        self.token_payments.insert((stealth, token), U256::ZERO);
        Ok(amount)
    }

    fn relay_withdraw(
        &self,
        stealth: Address,
        authorization: &WithdrawAuthorization,
        signature: &RecoverableSignature,
    ) -> Result<()> {
        let signer = recover_withdraw_signer(authorization, signature)
            .map_err(|e| ShadeError::Rpc(format!("execution reverted: {e}")))?;
        if signer != stealth {
            return Err(ShadeError::Rpc("execution reverted: invalid signature".into()));
        }
        let amount = self.token_payment(stealth, authorization.token);
        if amount <= authorization.sponsor_fee {
            return Err(ShadeError::Rpc("execution reverted: fee exceeds amount".into()));
        }
        self.take_payment(stealth, authorization.token)?;
        self.mint_token(
            authorization.acceptor,
            authorization.token,
            amount - authorization.sponsor_fee,
        );
        self.mint_token(authorization.sponsor, authorization.token, authorization.sponsor_fee);
        Ok(())
    }

    fn read_contract(&self, data: &[u8]) -> Result<Bytes> {
        if data.len() < 4 {
            return Err(ShadeError::Rpc("call data has no function selector".into()));
        }
        let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];
        match selector {
            abi::tollCall::SELECTOR => Ok(Bytes::from(self.toll.read().abi_encode())),
            abi::tokenPaymentsCall::SELECTOR => {
                let call = abi::tokenPaymentsCall::abi_decode(data, true)?;
                let amount = self.token_payment(call.stealth_address, call.token);
                Ok(Bytes::from(amount.abi_encode()))
            }
            other => Err(ShadeError::Rpc(format!(
                "execution reverted: unknown selector 0x{}",
                hex::encode(other)
            ))),
        }
    }
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn balance_of(&self, address: Address) -> Result<U256> {
        Ok(self.native_balance(&address))
    }

    async fn gas_price(&self) -> Result<U256> {
        Ok(*self.gas_price.read())
    }

    #[instrument(skip(self, filter), fields(from = filter.from_block))]
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>> {
        let to_block = match filter.to_block {
            BlockTag::Number(n) => n,
            BlockTag::Latest => self.block_number.load(Ordering::SeqCst),
        };
        let logs: Vec<RawLog> = self
            .logs
            .read()
            .iter()
            .filter(|log| {
                log.address == filter.address
                    && log.topics.first() == Some(&filter.event_signature)
                    && log.block_number >= filter.from_block
                    && log.block_number <= to_block
            })
            .cloned()
            .collect();
        debug!(count = logs.len(), "Matched logs");
        Ok(logs)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.block_number.load(Ordering::SeqCst))
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64> {
        if number > self.block_number.load(Ordering::SeqCst) {
            return Err(ShadeError::Rpc(format!("block {number} not found")));
        }
        Ok(Self::block_timestamp_of(number))
    }

    async fn transaction_sender(&self, hash: B256) -> Result<Address> {
        self.senders
            .get(&hash)
            .map(|sender| *sender)
            .ok_or_else(|| ShadeError::Rpc(format!("transaction {hash} not found")))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        if to == self.contract {
            return self.read_contract(&data);
        }
        // Any other address is treated as a token contract.
        if data.len() >= 4 && data[..4] == abi::balanceOfCall::SELECTOR {
            let call = abi::balanceOfCall::abi_decode(&data, true)?;
            return Ok(Bytes::from(self.token_balance(call.owner, to).abi_encode()));
        }
        Err(ShadeError::Rpc(format!("no contract at {}", to.to_checksum(None))))
    }
}

#[async_trait]
impl TransactionSubmitter for MemoryLedger {
    #[instrument(skip(self, request), fields(from = %request.origin.address(), to = %request.to))]
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHandle> {
        Self::verify_origin(&request.origin)?;
        let from = request.origin.address();

        let _guard = self.tx_lock.lock();

        let gas_price = request.gas_price.unwrap_or(*self.gas_price.read());
        let gas_limit = request.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT);
        let gas_cost = gas_price.saturating_mul(U256::from(gas_limit));
        let required = request.value.saturating_add(gas_cost);
        let available = self.native_balance(&from);
        if available < required {
            return Err(ShadeError::InsufficientFunds { required, available });
        }

        let events = if request.to == self.contract {
            self.execute_contract(from, request.value, &request.data)?
        } else {
            self.fund(request.to, request.value);
            Vec::new()
        };
        self.debit(from, required)?;

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let hash = B256::from(keccak256(&[from.as_slice(), &nonce.to_be_bytes()].concat()));
        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;
        self.senders.insert(hash, from);

        let mut logs = self.logs.write();
        for (log_index, event) in events.iter().enumerate() {
            let data = event.encode_log_data();
            logs.push(RawLog {
                address: self.contract,
                topics: data.topics().to_vec(),
                data: data.data.clone(),
                block_number,
                transaction_hash: hash,
                log_index: log_index as u64,
            });
        }
        debug!(%hash, block_number, events = events.len(), "Applied transaction");

        Ok(TxHandle {
            hash,
            from,
            to: request.to,
            value: request.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_crypto::sign_withdraw;

    fn chain() -> ChainConfig {
        ChainConfig::new(1337, Address::repeat_byte(0xC0), 100, None).unwrap()
    }

    fn send_eth(receiver: Address, toll: U256) -> Bytes {
        abi::sendEthCall {
            receiver,
            toll_commitment: toll,
            pkx: B256::repeat_byte(1),
            ciphertext: B256::repeat_byte(2),
        }
        .abi_encode()
        .into()
    }

    fn stealth_origin(key: &KeyPair) -> TxOrigin {
        TxOrigin::Stealth {
            address: key.address(),
            key: key.secret_bytes().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_send_eth_emits_announcement() {
        let ledger = MemoryLedger::new(&chain());
        let sender = Address::repeat_byte(0x01);
        let receiver = Address::repeat_byte(0x02);
        ledger.fund(sender, U256::from(1_000u64));
        ledger.set_toll(U256::from(10u64));

        let request = TransactionRequest::new(TxOrigin::Account(sender), ledger.contract())
            .value(U256::from(110u64))
            .data(send_eth(receiver, U256::from(10u64)));
        let handle = ledger.send_transaction(request).await.unwrap();

        assert_eq!(ledger.balance_of(receiver).await.unwrap(), U256::from(100u64));
        assert_eq!(ledger.balance_of(sender).await.unwrap(), U256::from(890u64));
        assert_eq!(ledger.transaction_sender(handle.hash).await.unwrap(), sender);

        let filter = LogFilter {
            address: ledger.contract(),
            event_signature: abi::Announcement::SIGNATURE_HASH,
            from_block: 100,
            to_block: BlockTag::Latest,
        };
        let logs = ledger.get_logs(&filter).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, 101);

        let decoded = abi::Announcement::decode_raw_log(logs[0].topics.iter().copied(), &logs[0].data, true).unwrap();
        assert_eq!(decoded.receiver, receiver);
        assert_eq!(decoded.amount, U256::from(100u64));
        assert_eq!(decoded.token, NATIVE_TOKEN);
    }

    #[tokio::test]
    async fn test_stale_toll_reverts() {
        let ledger = MemoryLedger::new(&chain());
        let sender = Address::repeat_byte(0x01);
        ledger.fund(sender, U256::from(1_000u64));
        ledger.set_toll(U256::from(10u64));

        let request = TransactionRequest::new(TxOrigin::Account(sender), ledger.contract())
            .value(U256::from(110u64))
            .data(send_eth(Address::repeat_byte(0x02), U256::ZERO));
        assert!(ledger.send_transaction(request).await.is_err());
        assert_eq!(ledger.balance_of(sender).await.unwrap(), U256::from(1_000u64));
    }

    #[tokio::test]
    async fn test_gas_is_charged() {
        let ledger = MemoryLedger::new(&chain());
        let from = Address::repeat_byte(0x01);
        ledger.fund(from, U256::from(300_000u64));
        ledger.set_gas_price(U256::from(10u64));

        let request = TransactionRequest::new(TxOrigin::Account(from), Address::repeat_byte(0x02))
            .value(U256::from(90_000u64));
        ledger.send_transaction(request).await.unwrap();
        assert_eq!(ledger.balance_of(from).await.unwrap(), U256::ZERO);

        let request = TransactionRequest::new(TxOrigin::Account(from), Address::repeat_byte(0x02))
            .value(U256::from(1u64));
        assert!(matches!(
            ledger.send_transaction(request).await,
            Err(ShadeError::InsufficientFunds { .. })
        ));
    }

    #[tokio::test]
    async fn test_stealth_origin_must_match_key() {
        let ledger = MemoryLedger::new(&chain());
        let key = KeyPair::generate();
        let origin = TxOrigin::Stealth {
            address: Address::repeat_byte(0x05),
            key: key.secret_bytes().unwrap(),
        };
        let request = TransactionRequest::new(origin, Address::repeat_byte(0x02));
        assert!(matches!(
            ledger.send_transaction(request).await,
            Err(ShadeError::SignatureError(_))
        ));
    }

    #[tokio::test]
    async fn test_token_payment_and_withdraw() {
        let ledger = MemoryLedger::new(&chain());
        let token = Address::repeat_byte(0x70);
        let sender = Address::repeat_byte(0x01);
        let stealth = KeyPair::generate();
        let acceptor = Address::repeat_byte(0x0A);
        ledger.mint_token(sender, token, U256::from(500u64));

        let data: Bytes = abi::sendTokenCall {
            receiver: stealth.address(),
            token,
            amount: U256::from(500u64),
            pkx: B256::repeat_byte(1),
            ciphertext: B256::repeat_byte(2),
        }
        .abi_encode()
        .into();
        let request = TransactionRequest::new(TxOrigin::Account(sender), ledger.contract()).data(data);
        ledger.send_transaction(request).await.unwrap();
        assert_eq!(ledger.token_payment(stealth.address(), token), U256::from(500u64));

        let call = abi::tokenPaymentsCall {
            stealth_address: stealth.address(),
            token,
        };
        let raw = ledger.call(ledger.contract(), call.abi_encode().into()).await.unwrap();
        assert_eq!(U256::from_be_slice(&raw), U256::from(500u64));

        let data: Bytes = abi::withdrawTokenCall { acceptor, token }.abi_encode().into();
        let request = TransactionRequest::new(stealth_origin(&stealth), ledger.contract()).data(data);
        ledger.send_transaction(request).await.unwrap();

        assert!(ledger.token_payment(stealth.address(), token).is_zero());
        assert_eq!(ledger.token_balance(acceptor, token), U256::from(500u64));
    }

    #[tokio::test]
    async fn test_relayed_withdraw_checks_signature() {
        let ledger = MemoryLedger::new(&chain());
        let token = Address::repeat_byte(0x70);
        let stealth = KeyPair::generate();
        let acceptor = Address::repeat_byte(0x0A);
        let sponsor = Address::repeat_byte(0x0B);
        ledger.token_payments.insert((stealth.address(), token), U256::from(100u64));

        let authorization = WithdrawAuthorization::new(
            ledger.chain_id(),
            ledger.contract(),
            acceptor,
            token,
            sponsor,
            U256::from(5u64),
        );
        let signature = sign_withdraw(&stealth, &authorization).unwrap();
        let call = |sig: RecoverableSignature| -> Bytes {
            abi::withdrawTokenOnBehalfCall {
                stealth_address: stealth.address(),
                acceptor,
                token,
                sponsor,
                sponsor_fee: U256::from(5u64),
                v: sig.v,
                r: sig.r,
                s: sig.s,
            }
            .abi_encode()
            .into()
        };

        let forged = sign_withdraw(&KeyPair::generate(), &authorization).unwrap();
        let request = TransactionRequest::new(TxOrigin::Account(sponsor), ledger.contract()).data(call(forged));
        assert!(ledger.send_transaction(request).await.is_err());

        let request = TransactionRequest::new(TxOrigin::Account(sponsor), ledger.contract()).data(call(signature));
        ledger.send_transaction(request).await.unwrap();
        assert_eq!(ledger.token_balance(acceptor, token), U256::from(95u64));
        assert_eq!(ledger.token_balance(sponsor, token), U256::from(5u64));
    }

    #[tokio::test]
    async fn test_token_balance_read() {
        let ledger = MemoryLedger::new(&chain());
        let token = Address::repeat_byte(0x70);
        ledger.mint_token(Address::repeat_byte(0x01), token, U256::from(42u64));

        let data = abi::balanceOfCall {
            owner: Address::repeat_byte(0x01),
        }
        .abi_encode();
        let result = ledger.call(token, Bytes::from(data)).await.unwrap();
        assert_eq!(
            abi::balanceOfCall::abi_decode_returns(&result, true).unwrap()._0,
            U256::from(42u64)
        );

        let unknown = ledger.call(token, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])).await;
        assert!(matches!(unknown, Err(ShadeError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_toll_read() {
        let ledger = MemoryLedger::new(&chain());
        ledger.set_toll(U256::from(42u64));
        let raw = ledger
            .call(ledger.contract(), abi::tollCall {}.abi_encode().into())
            .await
            .unwrap();
        assert_eq!(U256::from_be_slice(&raw), U256::from(42u64));
    }
}
