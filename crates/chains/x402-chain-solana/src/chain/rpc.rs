use solana_account::Account;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_message::Hash;
use solana_pubkey::Pubkey;

/// The slice of the Solana JSON-RPC API the adapter needs.
///
/// Implemented for anything that derefs to a nonblocking [`RpcClient`]
/// (`RpcClient` itself, `Arc<RpcClient>`, ...). Tests plug in an in-memory fake.
pub trait RpcClientLike {
    fn get_account(
        &self,
        pubkey: &Pubkey,
    ) -> impl Future<Output = Result<Account, ClientError>> + Send;

    /// `Ok(None)` when the account does not exist.
    fn get_account_if_exists(
        &self,
        pubkey: &Pubkey,
    ) -> impl Future<Output = Result<Option<Account>, ClientError>> + Send;

    fn get_latest_blockhash(&self) -> impl Future<Output = Result<Hash, ClientError>> + Send;

    /// Raw token amount held by a token account, as returned by `getTokenAccountBalance`.
    fn get_token_account_balance(
        &self,
        pubkey: &Pubkey,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;
}

impl<Container: AsRef<RpcClient> + Sync> RpcClientLike for Container {
    fn get_account(
        &self,
        pubkey: &Pubkey,
    ) -> impl Future<Output = Result<Account, ClientError>> + Send {
        RpcClient::get_account(self.as_ref(), pubkey)
    }

    fn get_account_if_exists(
        &self,
        pubkey: &Pubkey,
    ) -> impl Future<Output = Result<Option<Account>, ClientError>> + Send {
        async move {
            let response = RpcClient::get_account_with_commitment(
                self.as_ref(),
                pubkey,
                CommitmentConfig::confirmed(),
            )
            .await?;
            Ok(response.value)
        }
    }

    fn get_latest_blockhash(&self) -> impl Future<Output = Result<Hash, ClientError>> + Send {
        RpcClient::get_latest_blockhash(self.as_ref())
    }

    fn get_token_account_balance(
        &self,
        pubkey: &Pubkey,
    ) -> impl Future<Output = Result<String, ClientError>> + Send {
        async move {
            let balance = RpcClient::get_token_account_balance(self.as_ref(), pubkey).await?;
            Ok(balance.amount)
        }
    }
}
