//! Irreversible destruction of the treasury's full token balance.
//!
//! The burn instruction must be issued under whichever token program owns
//! the mint, so the standard is probed first and the matching instruction
//! builder used.

use std::sync::Arc;

use anyhow::{Context, Result};
use solana_client::rpc_client::RpcClient;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;

use crate::chain::{self, TokenStandard};
use crate::ledger::{ActivityKind, BotStatus, Ledger};

#[derive(Debug, Clone, PartialEq)]
pub enum BurnOutcome {
    Burned { amount: f64, signature: String },
    /// Benign: the token account is empty (or absent).
    NothingToBurn,
}

pub struct Burner {
    rpc: Arc<RpcClient>,
    wallet: Arc<Keypair>,
    ledger: Arc<Ledger>,
    token_mint: Pubkey,
}

impl Burner {
    pub fn new(
        rpc: Arc<RpcClient>,
        wallet: Arc<Keypair>,
        ledger: Arc<Ledger>,
        token_mint: Pubkey,
    ) -> Self {
        Self {
            rpc,
            wallet,
            ledger,
            token_mint,
        }
    }

    /// Burns the entire current token balance of the treasury account.
    pub async fn burn_all(&self) -> Result<BurnOutcome> {
        self.ledger.set_status(BotStatus::Burning);

        let standard = TokenStandard::detect(&self.rpc, &self.token_mint)?;
        self.ledger.record_activity(
            ActivityKind::Info,
            format!("Preparing burn ({})", standard.name()),
            None,
        );

        let owner = self.wallet.pubkey();
        let token_account = chain::associated_token_address(&owner, &self.token_mint, standard);

        let balance = self
            .rpc
            .get_token_account_balance(&token_account)
            .context("Failed to read token balance")?;
        let raw_amount: u64 = balance.amount.parse().unwrap_or(0);

        if raw_amount == 0 {
            self.ledger
                .record_activity(ActivityKind::Info, "No tokens to burn", None);
            return Ok(BurnOutcome::NothingToBurn);
        }

        let ui_amount = balance
            .ui_amount
            .unwrap_or_else(|| chain::from_base_units(raw_amount, balance.decimals));
        self.ledger.record_activity(
            ActivityKind::Info,
            format!("Burning {:.2} tokens...", ui_amount),
            None,
        );

        let instruction =
            build_burn_instruction(standard, &token_account, &self.token_mint, &owner, raw_amount)?;

        let recent_blockhash = self
            .rpc
            .get_latest_blockhash()
            .context("Failed to fetch blockhash for burn")?;
        let tx = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&owner),
            &[self.wallet.as_ref()],
            recent_blockhash,
        );

        let signature = chain::submit_and_confirm_legacy(&self.rpc, &tx)?;

        self.ledger.record_activity(
            ActivityKind::Burn,
            format!("Burned {:.2} tokens", ui_amount),
            Some(signature.to_string()),
        );

        Ok(BurnOutcome::Burned {
            amount: ui_amount,
            signature: signature.to_string(),
        })
    }
}

fn build_burn_instruction(
    standard: TokenStandard,
    token_account: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<Instruction> {
    let instruction = match standard {
        TokenStandard::Legacy => spl_token::instruction::burn(
            &spl_token::id(),
            token_account,
            mint,
            authority,
            &[],
            amount,
        )
        .context("Failed to build burn instruction")?,
        TokenStandard::Token2022 => spl_token_2022::instruction::burn(
            &spl_token_2022::id(),
            token_account,
            mint,
            authority,
            &[],
            amount,
        )
        .context("Failed to build Token-2022 burn instruction")?,
    };
    Ok(instruction)
}
