//! The SHADE client.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use tracing::{info, instrument, warn};

use shade_core::abi;
use shade_core::error::{Result, ShadeError};
use shade_core::traits::{
    IndexerTransport, LedgerReader, MessageSigner, RecipientDirectory, TransactionSubmitter,
};
use shade_core::types::{LookupOptions, TransactionRequest, TxHandle, TxOrigin};
use shade_core::NATIVE_TOKEN;
use shade_crypto::{
    recover_withdraw_signer, sign_withdraw, Denylist, KeyPair, RandomNumber, RecoverableSignature,
    WithdrawAuthorization,
};
use shade_scanner::{EventSource, ScanOverrides, ScanReport, Scanner};
use shade_stealth::{ShadeKeys, StealthPayment, StealthPaymentBuilder};

use crate::config::{ProtocolConfig, SendOptions, WithdrawOptions};

/// Outcome of a payment.
#[derive(Clone, Debug)]
pub struct SendReceipt {
    /// Submitted transaction
    pub tx: TxHandle,
    /// Stealth public key the funds went to
    pub stealth_key: KeyPair,
    /// Random number used for the payment
    pub random_number: RandomNumber,
}

/// Protocol client bound to one chain.
///
/// Holds immutable configuration and shared collaborators; every operation
/// is a single async call and nothing waits for confirmations.
pub struct ShadeProtocol {
    config: ProtocolConfig,
    ledger: Arc<dyn LedgerReader>,
    submitter: Arc<dyn TransactionSubmitter>,
    directory: Arc<dyn RecipientDirectory>,
    scanner: Scanner,
    denylist: Denylist,
}

impl std::fmt::Debug for ShadeProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadeProtocol")
            .field("chain_id", &self.config.chain.chain_id)
            .field("contract", &self.config.chain.contract_address)
            .field("denylist", &self.denylist.len())
            .finish()
    }
}

/// Builder for [`ShadeProtocol`].
pub struct ShadeProtocolBuilder {
    config: ProtocolConfig,
    ledger: Option<Arc<dyn LedgerReader>>,
    submitter: Option<Arc<dyn TransactionSubmitter>>,
    directory: Option<Arc<dyn RecipientDirectory>>,
    indexer: Option<Arc<dyn IndexerTransport>>,
    denylist: Denylist,
}

impl ShadeProtocolBuilder {
    /// Starts a builder.
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            config,
            ledger: None,
            submitter: None,
            directory: None,
            indexer: None,
            denylist: Denylist::default(),
        }
    }

    /// Ledger reads.
    pub fn ledger(mut self, ledger: Arc<dyn LedgerReader>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Transaction submission.
    pub fn submitter(mut self, submitter: Arc<dyn TransactionSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Recipient key lookup.
    pub fn directory(mut self, directory: Arc<dyn RecipientDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Indexer transport for scans.
    pub fn indexer(mut self, indexer: Arc<dyn IndexerTransport>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Addresses payments must never land on.
    pub fn denylist(mut self, denylist: Denylist) -> Self {
        self.denylist = denylist;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    /// `Config` if the ledger, submitter or directory is missing.
    pub fn build(self) -> Result<ShadeProtocol> {
        let ledger = self
            .ledger
            .ok_or_else(|| ShadeError::Config("a ledger reader is required".into()))?;
        let submitter = self
            .submitter
            .ok_or_else(|| ShadeError::Config("a transaction submitter is required".into()))?;
        let directory = self
            .directory
            .ok_or_else(|| ShadeError::Config("a recipient directory is required".into()))?;

        let mut source = EventSource::new(self.config.chain.clone(), ledger.clone())
            .with_config(self.config.scanner.clone());
        if let Some(indexer) = self.indexer {
            source = source.with_indexer(indexer);
        }
        let scanner = Scanner::new(source, ledger.clone(), self.config.scanner.clone());

        Ok(ShadeProtocol {
            config: self.config,
            ledger,
            submitter,
            directory,
            scanner,
            denylist: self.denylist,
        })
    }
}

fn check_balance(available: U256, required: U256) -> Result<()> {
    if available < required {
        return Err(ShadeError::InsufficientFunds { required, available });
    }
    Ok(())
}

impl ShadeProtocol {
    /// Starts a builder.
    pub fn builder(config: ProtocolConfig) -> ShadeProtocolBuilder {
        ShadeProtocolBuilder::new(config)
    }

    /// Client configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn contract(&self) -> Address {
        self.config.chain.contract_address
    }

    /// Current per-payment toll.
    pub async fn toll(&self) -> Result<U256> {
        let data = self
            .ledger
            .call(self.contract(), Bytes::from(abi::tollCall {}.abi_encode()))
            .await?;
        Ok(abi::tollCall::abi_decode_returns(&data, true)?._0)
    }

    /// ERC-20 balance of `holder`.
    pub async fn token_balance(&self, token: Address, holder: Address) -> Result<U256> {
        let data = self
            .ledger
            .call(token, Bytes::from(abi::balanceOfCall { owner: holder }.abi_encode()))
            .await?;
        Ok(abi::balanceOfCall::abi_decode_returns(&data, true)?._0)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Sending
    // ───────────────────────────────────────────────────────────────────────────

    /// Resolves a recipient and prepares a payment without submitting it.
    #[instrument(skip(self))]
    pub async fn prepare_stealth_payment(
        &self,
        recipient: &str,
        lookup: LookupOptions,
    ) -> Result<StealthPayment> {
        let keys = self.directory.resolve(recipient, lookup).await?;
        StealthPaymentBuilder::new()
            .recipient(keys)
            .denylist(self.denylist.clone())
            .max_attempts(self.config.max_stealth_attempts)
            .build()
    }

    /// Pays `amount` of `token` from `sender` to a recipient's fresh stealth address.
    ///
    /// # Errors
    /// - `InputValidation` for a zero amount or malformed recipient
    /// - `DirectoryLookup` if the recipient has no published keys
    /// - `UnsafeAddress` if every stealth attempt was denylisted
    /// - `InsufficientFunds` if `sender` cannot cover the toll and the amount,
    ///   checked before anything is submitted
    #[instrument(skip(self, options), fields(chain_id = self.config.chain.chain_id))]
    pub async fn send(
        &self,
        sender: Address,
        recipient: &str,
        token: Address,
        amount: U256,
        options: SendOptions,
    ) -> Result<SendReceipt> {
        if amount.is_zero() {
            return Err(ShadeError::InputValidation("amount must be positive".into()));
        }
        let payment = self.prepare_stealth_payment(recipient, options.lookup).await?;
        self.send_payment(sender, &payment, token, amount, options).await
    }

    /// Submits an already prepared payment.
    #[instrument(skip(self, payment, options), fields(stealth = %payment.stealth_address))]
    pub async fn send_payment(
        &self,
        sender: Address,
        payment: &StealthPayment,
        token: Address,
        amount: U256,
        options: SendOptions,
    ) -> Result<SendReceipt> {
        if amount.is_zero() {
            return Err(ShadeError::InputValidation("amount must be positive".into()));
        }
        let toll = self.toll().await?;
        let balance = self.ledger.balance_of(sender).await?;

        let (value, data) = if token == NATIVE_TOKEN {
            let value = amount
                .checked_add(toll)
                .ok_or_else(|| ShadeError::InputValidation("amount plus toll overflows".into()))?;
            check_balance(balance, value)?;
            let call = abi::sendEthCall {
                receiver: payment.stealth_address,
                toll_commitment: toll,
                pkx: payment.pkx(),
                ciphertext: payment.ciphertext(),
            };
            (value, call.abi_encode())
        } else {
            check_balance(balance, toll)?;
            check_balance(self.token_balance(token, sender).await?, amount)?;
            let call = abi::sendTokenCall {
                receiver: payment.stealth_address,
                token,
                amount,
                pkx: payment.pkx(),
                ciphertext: payment.ciphertext(),
            };
            (toll, call.abi_encode())
        };

        let mut request = TransactionRequest::new(TxOrigin::Account(sender), self.contract())
            .value(value)
            .data(data);
        request.gas_price = options.gas_price;
        request.gas_limit = options.gas_limit;

        let tx = self.submitter.send_transaction(request).await?;
        info!(hash = %tx.hash, %token, %amount, "Sent stealth payment");

        Ok(SendReceipt {
            tx,
            stealth_key: payment.stealth_key.clone(),
            random_number: payment.random_number.clone(),
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Withdrawing
    // ───────────────────────────────────────────────────────────────────────────

    /// Withdraws everything held at a stealth address to `destination`.
    ///
    /// Native funds are sent directly from the stealth address, less the gas
    /// cost. Tokens are released by the settlement contract.
    ///
    /// # Errors
    /// `InvalidKey` without a private scalar; `InsufficientFunds` if the gas
    /// cost exceeds the native balance.
    #[instrument(skip(self, stealth, options), fields(stealth = %stealth.address()))]
    pub async fn withdraw(
        &self,
        stealth: &KeyPair,
        token: Address,
        destination: Address,
        options: WithdrawOptions,
    ) -> Result<TxHandle> {
        let key = stealth
            .secret_bytes()
            .ok_or_else(|| ShadeError::InvalidKey("stealth private key required to withdraw".into()))?;
        let origin = TxOrigin::Stealth {
            address: stealth.address(),
            key,
        };

        let request = if token == NATIVE_TOKEN {
            let balance = self.ledger.balance_of(stealth.address()).await?;
            let gas_price = match options.gas_price {
                Some(price) => price,
                None => self.ledger.gas_price().await?,
            };
            let gas_cost = gas_price.saturating_mul(U256::from(options.gas_limit));
            check_balance(balance, gas_cost)?;

            TransactionRequest::new(origin, destination)
                .value(balance - gas_cost)
                .gas_price(gas_price)
                .gas_limit(options.gas_limit)
        } else {
            let call = abi::withdrawTokenCall {
                acceptor: destination,
                token,
            };
            let mut request = TransactionRequest::new(origin, self.contract()).data(call.abi_encode());
            request.gas_price = options.gas_price;
            request
        };

        let tx = self.submitter.send_transaction(request).await?;
        info!(hash = %tx.hash, %token, %destination, "Submitted withdrawal");
        Ok(tx)
    }

    /// Signs a relayed withdrawal for this client's chain and contract.
    pub fn sign_withdraw(
        &self,
        stealth: &KeyPair,
        acceptor: Address,
        token: Address,
        sponsor: Address,
        sponsor_fee: U256,
        hook: Option<(Address, Bytes)>,
    ) -> Result<(WithdrawAuthorization, RecoverableSignature)> {
        let mut authorization = WithdrawAuthorization::new(
            self.config.chain.chain_id,
            self.contract(),
            acceptor,
            token,
            sponsor,
            sponsor_fee,
        );
        if let Some((hook, data)) = hook {
            authorization = authorization.with_hook(hook, data);
        }
        let signature = sign_withdraw(stealth, &authorization)?;
        Ok((authorization, signature))
    }

    /// Relays a signed withdrawal on behalf of `stealth_address`.
    ///
    /// The signature is checked locally first so a bad authorization never
    /// costs the relayer gas.
    ///
    /// # Errors
    /// `InputValidation` if the authorization targets another chain or
    /// contract; `SignatureError` if it was not signed by `stealth_address`.
    #[instrument(skip(self, authorization, signature))]
    pub async fn withdraw_on_behalf(
        &self,
        relayer: Address,
        stealth_address: Address,
        authorization: &WithdrawAuthorization,
        signature: &RecoverableSignature,
    ) -> Result<TxHandle> {
        if authorization.chain_id != self.config.chain.chain_id {
            return Err(ShadeError::InputValidation(format!(
                "authorization is for chain {}, client is on chain {}",
                authorization.chain_id, self.config.chain.chain_id
            )));
        }
        if authorization.contract != self.contract() {
            return Err(ShadeError::InputValidation(format!(
                "authorization targets contract {}",
                authorization.contract.to_checksum(None)
            )));
        }
        let signer = recover_withdraw_signer(authorization, signature)?;
        if signer != stealth_address {
            return Err(ShadeError::SignatureError(format!(
                "authorization was signed by {}, not {}",
                signer.to_checksum(None),
                stealth_address.to_checksum(None)
            )));
        }

        let data = if authorization.has_hook() {
            abi::withdrawTokenAndCallOnBehalfCall {
                stealth_address,
                acceptor: authorization.acceptor,
                token: authorization.token,
                sponsor: authorization.sponsor,
                sponsor_fee: authorization.sponsor_fee,
                hook: authorization.hook,
                data: authorization.hook_data.clone(),
                v: signature.v,
                r: signature.r,
                s: signature.s,
            }
            .abi_encode()
        } else {
            abi::withdrawTokenOnBehalfCall {
                stealth_address,
                acceptor: authorization.acceptor,
                token: authorization.token,
                sponsor: authorization.sponsor,
                sponsor_fee: authorization.sponsor_fee,
                v: signature.v,
                r: signature.r,
                s: signature.s,
            }
            .abi_encode()
        };

        let request = TransactionRequest::new(TxOrigin::Account(relayer), self.contract()).data(data);
        let tx = self.submitter.send_transaction(request).await?;
        info!(hash = %tx.hash, %stealth_address, "Relayed withdrawal");
        Ok(tx)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Receiving
    // ───────────────────────────────────────────────────────────────────────────

    /// Finds every payment to the holder of `viewing`.
    pub async fn scan(
        &self,
        spending_public: &KeyPair,
        viewing: &KeyPair,
        overrides: ScanOverrides,
    ) -> Result<ScanReport> {
        self.scanner.scan(spending_public, viewing, overrides).await
    }

    /// Derives the user's keys from a wallet signature.
    pub async fn generate_private_keys(&self, signer: &dyn MessageSigner) -> Result<ShadeKeys> {
        if signer.chain_id() != self.config.chain.chain_id {
            warn!(
                signer_chain = signer.chain_id(),
                client_chain = self.config.chain.chain_id,
                "Signer and client are on different chains"
            );
        }
        shade_stealth::generate_private_keys(signer).await
    }
}
