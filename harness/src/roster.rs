//! Positional assignment of derived identities to the fixed test roles.
//!
//! Roles are bound by index into the address book's key list, so reordering
//! the generated accounts silently reassigns them.

use std::fmt;

use crate::error::{HarnessError, HarnessResult};
use crate::identity::{Identity, NetworkType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Account,
    Account2,
    Account3,
    MultisigAccount,
    CosignAccount1,
    CosignAccount2,
    CosignAccount3,
    CosignAccount4,
    HarvestingAccount,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Account,
        Role::Account2,
        Role::Account3,
        Role::MultisigAccount,
        Role::CosignAccount1,
        Role::CosignAccount2,
        Role::CosignAccount3,
        Role::CosignAccount4,
        Role::HarvestingAccount,
    ];

    /// Position of the role's key in the address book.
    pub const fn index(self) -> usize {
        match self {
            Role::Account => 0,
            Role::Account2 => 1,
            Role::Account3 => 2,
            Role::MultisigAccount => 3,
            Role::CosignAccount1 => 4,
            Role::CosignAccount2 => 5,
            Role::CosignAccount3 => 6,
            Role::CosignAccount4 => 7,
            Role::HarvestingAccount => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Role::Account => "account",
            Role::Account2 => "account2",
            Role::Account3 => "account3",
            Role::MultisigAccount => "multisigAccount",
            Role::CosignAccount1 => "cosignAccount1",
            Role::CosignAccount2 => "cosignAccount2",
            Role::CosignAccount3 => "cosignAccount3",
            Role::CosignAccount4 => "cosignAccount4",
            Role::HarvestingAccount => "harvestingAccount",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const REQUIRED_IDENTITIES: usize = Role::ALL.len();

#[derive(Clone, Debug)]
pub struct Roster {
    pub accounts: Vec<Identity>,
    pub account: Identity,
    pub account2: Identity,
    pub account3: Identity,
    pub multisig_account: Identity,
    pub cosign_account1: Identity,
    pub cosign_account2: Identity,
    pub cosign_account3: Identity,
    pub cosign_account4: Identity,
    pub harvesting_account: Identity,
}

impl Roster {
    /// Derives one identity per key, preserving order, and binds the roles.
    ///
    /// Fails before deriving anything if fewer than nine keys are supplied.
    pub fn derive(private_keys: &[String], network_type: NetworkType) -> HarnessResult<Self> {
        if private_keys.len() < REQUIRED_IDENTITIES {
            return Err(HarnessError::InsufficientIdentities {
                required: REQUIRED_IDENTITIES,
                available: private_keys.len(),
            });
        }

        let accounts = private_keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                Identity::from_private_key(key, network_type)
                    .map_err(|source| HarnessError::InvalidPrivateKey { index, source })
            })
            .collect::<HarnessResult<Vec<_>>>()?;

        let role = |role: Role| accounts[role.index()].clone();
        Ok(Self {
            account: role(Role::Account),
            account2: role(Role::Account2),
            account3: role(Role::Account3),
            multisig_account: role(Role::MultisigAccount),
            cosign_account1: role(Role::CosignAccount1),
            cosign_account2: role(Role::CosignAccount2),
            cosign_account3: role(Role::CosignAccount3),
            cosign_account4: role(Role::CosignAccount4),
            harvesting_account: role(Role::HarvestingAccount),
            accounts,
        })
    }

    pub fn get(&self, role: Role) -> &Identity {
        match role {
            Role::Account => &self.account,
            Role::Account2 => &self.account2,
            Role::Account3 => &self.account3,
            Role::MultisigAccount => &self.multisig_account,
            Role::CosignAccount1 => &self.cosign_account1,
            Role::CosignAccount2 => &self.cosign_account2,
            Role::CosignAccount3 => &self.cosign_account3,
            Role::CosignAccount4 => &self.cosign_account4,
            Role::HarvestingAccount => &self.harvesting_account,
        }
    }

    pub fn cosigners(&self) -> [&Identity; 4] {
        [
            &self.cosign_account1,
            &self.cosign_account2,
            &self.cosign_account3,
            &self.cosign_account4,
        ]
    }

    pub fn network_type(&self) -> NetworkType {
        self.account.network_type()
    }
}
