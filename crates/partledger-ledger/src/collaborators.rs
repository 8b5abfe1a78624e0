//! External capabilities the ledger consults but does not own.
//!
//! Role storage, pause and clearing switches, allowances, operator
//! approvals, wallet recovery, and nonce bookkeeping all live outside the
//! accounting core. The ledger sees them through the small traits below,
//! combined into [`Collaborators`].
//!
//! [`InMemoryCollaborators`] is a complete in-process implementation used
//! by embedders that have no other backing store, and by the tests.

use std::collections::{HashMap, HashSet};

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use partledger_types::{Address, PartledgerError, Result, Role};
use rust_decimal::Decimal;

/// `hasRole(account, role)`.
pub trait RoleRegistry {
    fn has_role(&self, account: &Address, role: Role) -> bool;
}

/// Token-wide boolean switches.
pub trait TokenGates {
    fn is_paused(&self) -> bool;
    fn is_clearing_active(&self) -> bool;
    fn is_controllable(&self) -> bool;
    fn are_partitions_protected(&self) -> bool;
}

/// Spending allowances granted by holders.
pub trait AllowanceBook {
    fn allowance(&self, holder: &Address, spender: &Address) -> Decimal;

    /// # Errors
    /// `InsufficientAllowance` if the allowance is below `amount`.
    fn consume_allowance(&mut self, holder: &Address, spender: &Address, amount: Decimal)
    -> Result<()>;

    /// # Errors
    /// `ArithmeticOverflow` if the allowance cannot grow by `amount`.
    fn restore_allowance(&mut self, holder: &Address, spender: &Address, amount: Decimal)
    -> Result<()>;
}

pub trait OperatorRegistry {
    fn is_operator_for(&self, operator: &Address, holder: &Address) -> bool;
}

/// `verify(signer, message, signature) -> bool`.
pub trait SignatureVerifier {
    fn verify_signature(&self, signer: &Address, message: &[u8], signature: &[u8]) -> bool;
}

pub trait WalletRecovery {
    fn is_recovered(&self, address: &Address) -> bool;
}

/// Per-holder replay counters for signed authorizations.
pub trait NonceRegistry {
    fn next_nonce(&self, holder: &Address) -> u64;

    /// # Errors
    /// `WrongNonce` if `nonce` is not the holder's next nonce.
    fn consume_nonce(&mut self, holder: &Address, nonce: u64) -> Result<()>;
}

/// Everything the ledger needs from the outside world.
pub trait Collaborators:
    RoleRegistry
    + TokenGates
    + AllowanceBook
    + OperatorRegistry
    + SignatureVerifier
    + WalletRecovery
    + NonceRegistry
{
}

impl<T> Collaborators for T where
    T: RoleRegistry
        + TokenGates
        + AllowanceBook
        + OperatorRegistry
        + SignatureVerifier
        + WalletRecovery
        + NonceRegistry
{
}

// =====================================================================
// Ed25519
// =====================================================================

/// Verifies ed25519 signatures, treating the signer address as the
/// public key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify_signature(&self, signer: &Address, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &sig).is_ok()
    }
}

// =====================================================================
// In-memory implementation
// =====================================================================

/// All collaborator capabilities backed by plain maps and flags.
///
/// Tokens start unpaused, outside clearing, controllable, and with
/// unprotected partitions.
#[derive(Debug, Clone)]
pub struct InMemoryCollaborators {
    roles: HashSet<(Address, Role)>,
    paused: bool,
    clearing_active: bool,
    controllable: bool,
    partitions_protected: bool,
    /// `(holder, spender) → remaining allowance`
    allowances: HashMap<(Address, Address), Decimal>,
    /// `(operator, holder)`
    operators: HashSet<(Address, Address)>,
    recovered: HashSet<Address>,
    nonces: HashMap<Address, u64>,
    verifier: Ed25519Verifier,
}

impl InMemoryCollaborators {
    #[must_use]
    pub fn new() -> Self {
        Self {
            roles: HashSet::new(),
            paused: false,
            clearing_active: false,
            controllable: true,
            partitions_protected: false,
            allowances: HashMap::new(),
            operators: HashSet::new(),
            recovered: HashSet::new(),
            nonces: HashMap::new(),
            verifier: Ed25519Verifier,
        }
    }

    pub fn grant_role(&mut self, account: Address, role: Role) {
        self.roles.insert((account, role));
    }

    pub fn revoke_role(&mut self, account: Address, role: Role) {
        self.roles.remove(&(account, role));
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_clearing_active(&mut self, active: bool) {
        self.clearing_active = active;
    }

    pub fn set_controllable(&mut self, controllable: bool) {
        self.controllable = controllable;
    }

    pub fn set_partitions_protected(&mut self, protected: bool) {
        self.partitions_protected = protected;
    }

    /// Set the allowance `holder` grants `spender`, replacing any previous value.
    pub fn approve(&mut self, holder: Address, spender: Address, amount: Decimal) {
        self.allowances.insert((holder, spender), amount);
    }

    pub fn authorize_operator(&mut self, operator: Address, holder: Address) {
        self.operators.insert((operator, holder));
    }

    pub fn revoke_operator(&mut self, operator: Address, holder: Address) {
        self.operators.remove(&(operator, holder));
    }

    pub fn mark_recovered(&mut self, address: Address) {
        self.recovered.insert(address);
    }
}

impl Default for InMemoryCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleRegistry for InMemoryCollaborators {
    fn has_role(&self, account: &Address, role: Role) -> bool {
        self.roles.contains(&(*account, role))
    }
}

impl TokenGates for InMemoryCollaborators {
    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_clearing_active(&self) -> bool {
        self.clearing_active
    }

    fn is_controllable(&self) -> bool {
        self.controllable
    }

    fn are_partitions_protected(&self) -> bool {
        self.partitions_protected
    }
}

impl AllowanceBook for InMemoryCollaborators {
    fn allowance(&self, holder: &Address, spender: &Address) -> Decimal {
        self.allowances
            .get(&(*holder, *spender))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn consume_allowance(
        &mut self,
        holder: &Address,
        spender: &Address,
        amount: Decimal,
    ) -> Result<()> {
        let available = self.allowance(holder, spender);
        if available < amount {
            return Err(PartledgerError::InsufficientAllowance {
                needed: amount,
                available,
            });
        }
        self.allowances
            .insert((*holder, *spender), available - amount);
        Ok(())
    }

    fn restore_allowance(
        &mut self,
        holder: &Address,
        spender: &Address,
        amount: Decimal,
    ) -> Result<()> {
        let restored = self
            .allowance(holder, spender)
            .checked_add(amount)
            .ok_or_else(|| PartledgerError::overflow("restoring allowance"))?;
        self.allowances.insert((*holder, *spender), restored);
        Ok(())
    }
}

impl OperatorRegistry for InMemoryCollaborators {
    fn is_operator_for(&self, operator: &Address, holder: &Address) -> bool {
        self.operators.contains(&(*operator, *holder))
    }
}

impl SignatureVerifier for InMemoryCollaborators {
    fn verify_signature(&self, signer: &Address, message: &[u8], signature: &[u8]) -> bool {
        self.verifier.verify_signature(signer, message, signature)
    }
}

impl WalletRecovery for InMemoryCollaborators {
    fn is_recovered(&self, address: &Address) -> bool {
        self.recovered.contains(address)
    }
}

impl NonceRegistry for InMemoryCollaborators {
    fn next_nonce(&self, holder: &Address) -> u64 {
        self.nonces.get(holder).copied().unwrap_or(0)
    }

    fn consume_nonce(&mut self, holder: &Address, nonce: u64) -> Result<()> {
        let expected = self.next_nonce(holder);
        if nonce != expected {
            return Err(PartledgerError::WrongNonce {
                holder: *holder,
                expected,
                actual: nonce,
            });
        }
        let next = expected
            .checked_add(1)
            .ok_or_else(|| PartledgerError::overflow("nonce counter"))?;
        self.nonces.insert(*holder, next);
        Ok(())
    }
}
