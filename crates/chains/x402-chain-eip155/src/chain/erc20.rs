use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use alloy_sol_types::sol;
use async_trait::async_trait;

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
);

/// Reads ERC-20 balances. Implemented for every alloy [`Provider`].
#[async_trait]
pub trait Erc20BalanceReader {
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, String>;
}

#[async_trait]
impl<P: Provider + Send + Sync> Erc20BalanceReader for P {
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, String> {
        let contract = IERC20::new(token, self);
        contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| format!("balanceOf({owner}) on {token}: {e}"))
    }
}
